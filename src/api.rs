// Ledger HTTP API - REST routes over the ledger service (axum)
//
// Handlers only translate: JSON in, service call on the blocking pool,
// JSON or mapped error out.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use anyhow::Context;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, info_span};
use uuid::Uuid;

use crate::entities::{Account, NewAccount, TransferRecord};
use crate::error::LedgerError;
use crate::service::LedgerService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<LedgerService>,
}

impl AppState {
    pub fn new(ledger: LedgerService) -> Self {
        AppState {
            ledger: Arc::new(ledger),
        }
    }
}

// ============================================================================
// Request / Response shapes
// ============================================================================

/// Body of POST /v1/transfer
#[derive(Debug, Serialize, Deserialize)]
pub struct TransferRequest {
    pub from_account: String,
    pub to_account: String,
    pub amount: Decimal,
}

#[derive(Debug, Serialize)]
pub struct TransferResponse {
    pub status: &'static str,
    pub request_id: Uuid,
    pub transfer: TransferRecord,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

/// Ledger error on its way out as an HTTP response
#[derive(Debug)]
pub struct ApiError(LedgerError);

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            error!(code = self.0.code(), "Request failed: {:?}", self.0);
        }

        let body = ErrorBody {
            error: self.0.to_string(),
            code: self.0.code(),
        };
        (status, Json(body)).into_response()
    }
}

/// Run a synchronous ledger call on the blocking pool
async fn blocking<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&LedgerService) -> crate::error::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let ledger = Arc::clone(&state.ledger);
    tokio::task::spawn_blocking(move || f(&ledger))
        .await
        .map_err(LedgerError::store)?
        .map_err(ApiError)
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: crate::VERSION,
    })
}

/// POST /v1/clients - Create an account
async fn create_client(
    State(state): State<AppState>,
    Json(account): Json<NewAccount>,
) -> Result<Json<Account>, ApiError> {
    let created = blocking(&state, move |ledger| ledger.create_account(account)).await?;
    Ok(Json(created))
}

/// GET /v1/clients - List all accounts (balances as JSON numbers)
async fn list_clients(State(state): State<AppState>) -> Result<Json<Vec<Account>>, ApiError> {
    let accounts = blocking(&state, |ledger| ledger.list_accounts()).await?;
    Ok(Json(accounts))
}

/// GET /v1/clients/:account_num - Get one account
async fn get_client(
    State(state): State<AppState>,
    Path(account_num): Path<String>,
) -> Result<Json<Account>, ApiError> {
    let account = blocking(&state, move |ledger| ledger.get_account(&account_num)).await?;
    Ok(Json(account))
}

/// POST /v1/transfer - Move funds between two accounts
async fn transfer_funds(
    State(state): State<AppState>,
    Json(request): Json<TransferRequest>,
) -> Result<Json<TransferResponse>, ApiError> {
    let request_id = Uuid::new_v4();
    let span = info_span!("transfer", %request_id);

    let transfer = blocking(&state, move |ledger| {
        let _entered = span.enter();
        ledger.transfer_funds(&request.from_account, &request.to_account, request.amount)
    })
    .await?;

    Ok(Json(TransferResponse {
        status: "transfer successful",
        request_id,
        transfer,
    }))
}

/// GET /v1/transfers/:account_num - Transfer history, newest first
async fn transfer_history(
    State(state): State<AppState>,
    Path(account_num): Path<String>,
) -> Result<Json<Vec<TransferRecord>>, ApiError> {
    let history = blocking(&state, move |ledger| ledger.get_transfer_history(&account_num)).await?;
    Ok(Json(history))
}

// ============================================================================
// Router
// ============================================================================

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/clients", post(create_client).get(list_clients))
        .route("/clients/:account_num", get(get_client))
        .route("/transfer", post(transfer_funds))
        .route("/transfers/:account_num", get(transfer_history))
        .with_state(state);

    Router::new()
        .route("/api/health", get(health_check))
        .nest("/v1", v1_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Server
// ============================================================================

/// Bind and serve until Ctrl+C
pub async fn serve(ledger: LedgerService, bind_addr: &str) -> anyhow::Result<()> {
    let app = router(AppState::new(ledger));

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind to address {}", bind_addr))?;

    info!("Server running on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server stopped with an error")?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown requested");
    }
}
