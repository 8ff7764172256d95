use chrono::NaiveDate;
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use payalloc::application::service::AllocationService;
use payalloc::domain::ports::LedgerStoreBox;
use payalloc::infrastructure::in_memory::InMemoryLedgerStore;
use payalloc::interfaces::csv::document_reader::DocumentReader;
use payalloc::interfaces::csv::payment_reader::PaymentReader;
use payalloc::interfaces::csv::writer::LedgerWriter;
use payalloc::telemetry;
use std::fs::File;
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Invoices and bills CSV file
    documents: PathBuf,

    /// Payments and receipts CSV file, applied in file order
    payments: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "PAYALLOC_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Day used to derive overdue statuses (defaults to today)
    #[arg(long)]
    as_of: Option<NaiveDate>,

    /// Also write a per-payment summary CSV to this path
    #[arg(long)]
    payments_out: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, env = "PAYALLOC_LOG", default_value = "info")]
    log_level: String,
}

#[cfg(feature = "storage-rocksdb")]
fn open_store(db_path: Option<PathBuf>) -> Result<LedgerStoreBox> {
    use payalloc::infrastructure::rocksdb::RocksDBStore;

    match db_path {
        Some(path) => Ok(Box::new(RocksDBStore::open(path).into_diagnostic()?)),
        None => Ok(Box::new(InMemoryLedgerStore::new())),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_store(db_path: Option<PathBuf>) -> Result<LedgerStoreBox> {
    if db_path.is_some() {
        tracing::warn!(
            "Persistent storage requested via --db-path, but the 'storage-rocksdb' feature \
             is not enabled; falling back to in-memory storage"
        );
    }
    Ok(Box::new(InMemoryLedgerStore::new()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing(&cli.log_level);

    let service = AllocationService::new(open_store(cli.db_path)?);

    let file = File::open(&cli.documents).into_diagnostic()?;
    for doc_result in DocumentReader::new(file).documents() {
        match doc_result {
            Ok(doc) => {
                let id = doc.id.clone();
                if let Err(e) = service.register_document(doc).await {
                    tracing::warn!(document = %id, "Document rejected: {e}");
                }
            }
            Err(e) => tracing::warn!("Error reading document: {e}"),
        }
    }

    let file = File::open(&cli.payments).into_diagnostic()?;
    for payment_result in PaymentReader::new(file).payments() {
        match payment_result {
            Ok(request) => {
                let id = request.id.clone();
                if let Err(e) = service.record_payment(request).await {
                    tracing::warn!(payment = %id, "Payment rejected: {e}");
                }
            }
            Err(e) => tracing::warn!("Error reading payment: {e}"),
        }
    }

    let as_of = cli
        .as_of
        .unwrap_or_else(|| chrono::Local::now().date_naive());

    let documents = service.documents().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = LedgerWriter::new(stdout.lock());
    writer
        .write_documents(&documents, as_of)
        .into_diagnostic()?;

    if let Some(path) = cli.payments_out {
        let file = File::create(path).into_diagnostic()?;
        let payments = service.payments().await.into_diagnostic()?;
        LedgerWriter::new(file)
            .write_payments(&payments)
            .into_diagnostic()?;
    }

    Ok(())
}
