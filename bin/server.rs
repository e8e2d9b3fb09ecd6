// Ledger Transfer - Web Server
// REST API with Axum over the SQLite ledger

use anyhow::Result;
use ledger_transfer::api;
use ledger_transfer::logging::init_logging;
use ledger_transfer::{AppConfig, LedgerService};
use std::path::PathBuf;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Optional config file as the only argument
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = AppConfig::load(config_path.as_deref())?;

    init_logging(&config);
    info!(version = ledger_transfer::VERSION, "Ledger Transfer - Web Server");

    let ledger = LedgerService::open(&config)?;

    api::serve(ledger, &config.bind_addr).await
}
