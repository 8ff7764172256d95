use crate::domain::document::{DocumentKind, DocumentStatus, MonetaryDocument};
use crate::error::{LedgerError, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

/// One row of a documents CSV.
///
/// An empty `balance_due` means nothing has been paid yet; an empty
/// `status` means the document is open.
#[derive(Debug, Deserialize)]
struct DocumentRecord {
    id: String,
    counterparty: String,
    kind: DocumentKind,
    total: Decimal,
    balance_due: Option<Decimal>,
    status: Option<DocumentStatus>,
    due_date: Option<NaiveDate>,
}

impl TryFrom<DocumentRecord> for MonetaryDocument {
    type Error = LedgerError;

    fn try_from(record: DocumentRecord) -> Result<Self> {
        let mut document =
            MonetaryDocument::new(record.id, record.counterparty, record.kind, record.total);
        document.balance_due = record.balance_due.unwrap_or(record.total);
        document.status = record.status.unwrap_or(DocumentStatus::Open);
        document.due_date = record.due_date;
        document.validate()?;
        Ok(document)
    }
}

/// Reads invoices and bills from a CSV source.
///
/// Expects the header `id, counterparty, kind, total, balance_due, status, due_date`.
pub struct DocumentReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> DocumentReader<R> {
    /// Creates a new `DocumentReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily reads and validates documents, one `Result` per row.
    pub fn documents(self) -> impl Iterator<Item = Result<MonetaryDocument>> {
        self.reader.into_deserialize().map(|result| {
            let record: DocumentRecord = result?;
            MonetaryDocument::try_from(record)
        })
    }
}
