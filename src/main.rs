use anyhow::Result;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::PathBuf;

// Use library instead of local modules
use ledger_transfer::logging::init_logging;
use ledger_transfer::{load_accounts_csv, AppConfig, CommitMode, LedgerService, TransferRecord};

#[derive(Parser, Debug)]
#[command(name = "ledger", version, about = "Funds-transfer ledger: accounts, transfers, history")]
struct Cli {
    /// YAML config file (LEDGER_* environment variables override it)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database file
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// sequential (reference behaviour) or atomic
    #[arg(long, global = true)]
    commit_mode: Option<CommitMode>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server
    Serve {
        /// Listen address (e.g. 0.0.0.0:8080)
        #[arg(long)]
        bind: Option<String>,
    },
    /// Create the database schema
    Init,
    /// Seed accounts from a CSV file (name,account_num,balance)
    Import { csv: PathBuf },
    /// List all accounts
    Accounts,
    /// Show one account
    Account { account_num: String },
    /// Move funds between two accounts
    Transfer {
        from: String,
        to: String,
        amount: Decimal,
    },
    /// Transfer history of an account, newest first
    History { account_num: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    if let Some(mode) = cli.commit_mode {
        config.commit_mode = mode;
    }

    init_logging(&config);

    match cli.command {
        Command::Serve { bind } => {
            if let Some(bind) = bind {
                config.bind_addr = bind;
            }
            run_server(&config)
        }
        Command::Init => run_init(&config),
        Command::Import { csv } => run_import(&config, &csv),
        Command::Accounts => run_accounts(&config),
        Command::Account { account_num } => run_account(&config, &account_num),
        Command::Transfer { from, to, amount } => run_transfer(&config, &from, &to, amount),
        Command::History { account_num } => run_history(&config, &account_num),
    }
}

#[cfg(feature = "server")]
fn run_server(config: &AppConfig) -> Result<()> {
    let ledger = LedgerService::open(config)?;
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(ledger_transfer::api::serve(ledger, &config.bind_addr))
}

#[cfg(not(feature = "server"))]
fn run_server(_config: &AppConfig) -> Result<()> {
    eprintln!("❌ Server mode not available!");
    eprintln!("   Rebuild with: cargo build --features server");
    std::process::exit(1);
}

fn run_init(config: &AppConfig) -> Result<()> {
    println!("🔧 Setting up database...");
    LedgerService::open(config)?;
    println!("✓ Database initialized at {}", config.db_path.display());
    Ok(())
}

fn run_import(config: &AppConfig, csv_path: &std::path::Path) -> Result<()> {
    let ledger = LedgerService::open(config)?;

    println!("📂 Loading CSV...");
    let accounts = load_accounts_csv(csv_path)?;
    println!("✓ Loaded {} accounts from CSV", accounts.len());

    println!("💾 Inserting accounts...");
    let summary = ledger.import_accounts(accounts)?;
    println!("✓ Inserted: {} accounts", summary.inserted);
    println!("✓ Skipped duplicates: {}", summary.duplicates);
    if summary.invalid > 0 {
        println!("⚠ Skipped invalid rows: {}", summary.invalid);
    }

    println!("✓ Ledger now holds {} accounts", ledger.list_accounts()?.len());
    Ok(())
}

fn run_accounts(config: &AppConfig) -> Result<()> {
    let ledger = LedgerService::open(config)?;
    let accounts = ledger.list_accounts()?;

    if accounts.is_empty() {
        println!("No accounts yet.");
        return Ok(());
    }

    println!("{:<16} {:<24} {:>16}", "ACCOUNT", "NAME", "BALANCE");
    for account in &accounts {
        println!(
            "{:<16} {:<24} {:>16}",
            account.account_number, account.name, account.balance
        );
    }
    println!("\nTotal balance: {}", ledger.registry().total_balance()?);
    Ok(())
}

fn run_account(config: &AppConfig, account_num: &str) -> Result<()> {
    let ledger = LedgerService::open(config)?;
    let account = ledger.get_account(account_num)?;
    println!("{}", serde_json::to_string_pretty(&account)?);
    Ok(())
}

fn run_transfer(config: &AppConfig, from: &str, to: &str, amount: Decimal) -> Result<()> {
    let ledger = LedgerService::open(config)?;
    let record = ledger.transfer_funds(from, to, amount)?;
    println!("✅ transfer successful");
    print_record(&record);
    Ok(())
}

fn run_history(config: &AppConfig, account_num: &str) -> Result<()> {
    let ledger = LedgerService::open(config)?;
    let history = ledger.get_transfer_history(account_num)?;

    if history.is_empty() {
        println!("No transfers for account {}.", account_num);
        return Ok(());
    }

    for record in &history {
        print_record(record);
    }
    Ok(())
}

fn print_record(record: &TransferRecord) {
    println!(
        "#{:<6} {}  {} -> {}  {:>12}  {}",
        record.id,
        record.created_at.to_rfc3339(),
        record.from_account_number,
        record.to_account_number,
        record.amount,
        record.status
    );
}
