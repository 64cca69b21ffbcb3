use clap::Parser;
use miette::{IntoDiagnostic, Result};
use settlement_engine::application::currency::CurrencyConverter;
use settlement_engine::application::effects::EffectDispatcher;
use settlement_engine::application::registry::Registry;
use settlement_engine::application::settlement::SettlementEngine;
use settlement_engine::config::Config;
use settlement_engine::domain::ports::LedgerStoreRef;
use settlement_engine::infrastructure::audit::TracingAuditSink;
use settlement_engine::infrastructure::exchange_rates::HttpRateProvider;
use settlement_engine::infrastructure::in_memory::InMemoryLedger;
use settlement_engine::infrastructure::notifications::{InAppNotifier, LogSmsGateway};
#[cfg(feature = "storage-rocksdb")]
use settlement_engine::infrastructure::rocksdb::RocksDBLedger;
use settlement_engine::interfaces::csv::account_writer::AccountWriter;
use settlement_engine::interfaces::csv::command_reader::CommandReader;
use settlement_engine::interfaces::csv::command_runner::CommandRunner;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input commands CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env().into_diagnostic()?;

    // stdout carries only the CSV snapshot
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_writer(io::stderr)
        .init();

    let store = open_store(cli.db_path)?;

    let provider = HttpRateProvider::new(&config.exchange_rate_url, config.exchange_rate_timeout)
        .into_diagnostic()?;
    let converter = Arc::new(CurrencyConverter::with_ttl(
        Arc::new(provider),
        config.exchange_rate_ttl,
    ));
    let notifier = Arc::new(InAppNotifier::new(
        store.clone(),
        Arc::new(LogSmsGateway::new(config.sms_sender.clone())),
    ));
    let effects = EffectDispatcher::new(notifier, Arc::new(TracingAuditSink));
    let engine = SettlementEngine::new(store.clone(), converter, effects.clone());
    let registry = Registry::new(store.clone(), effects);
    let runner = CommandRunner::new(store, engine, registry);

    let file = File::open(cli.input).into_diagnostic()?;
    let reader = CommandReader::new(file);
    for command in reader.commands() {
        match command {
            Ok(command) => {
                if let Err(e) = runner.run(&command).await {
                    eprintln!("Error processing command: {}", e);
                }
            }
            Err(e) => {
                eprintln!("Error reading command: {}", e);
            }
        }
    }

    let rows = runner.account_rows().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = AccountWriter::new(stdout.lock());
    writer.write_accounts(rows).into_diagnostic()?;

    Ok(())
}

#[cfg(feature = "storage-rocksdb")]
fn open_store(db_path: Option<PathBuf>) -> Result<LedgerStoreRef> {
    match db_path {
        Some(path) => Ok(Arc::new(RocksDBLedger::open(path).into_diagnostic()?)),
        None => Ok(Arc::new(InMemoryLedger::new())),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_store(db_path: Option<PathBuf>) -> Result<LedgerStoreRef> {
    if db_path.is_some() {
        eprintln!(
            "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(Arc::new(InMemoryLedger::new()))
}
