use crate::domain::payment::{Allocation, Deductions, PaymentDirection, PaymentRequest};
use crate::error::{LedgerError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;
use std::str::FromStr;

#[derive(Debug, Deserialize)]
struct PaymentRecord {
    payment: String,
    counterparty: String,
    direction: PaymentDirection,
    gross: Decimal,
    bank_charges: Option<Decimal>,
    tax_withheld: Option<Decimal>,
    allocations: Option<String>,
}

/// Parses `INV-1:60.00;INV-2:40.00` into ordered allocations.
pub fn parse_allocations(field: &str) -> Result<Vec<Allocation>> {
    field
        .split(';')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            let (document, amount) = part.rsplit_once(':').ok_or_else(|| {
                LedgerError::ValidationError(format!("allocation `{part}` is not DOCUMENT:AMOUNT"))
            })?;
            let amount = Decimal::from_str(amount.trim()).map_err(|e| {
                LedgerError::ValidationError(format!("allocation `{part}`: {e}"))
            })?;
            Ok(Allocation::new(document.trim(), amount))
        })
        .collect()
}

impl TryFrom<PaymentRecord> for PaymentRequest {
    type Error = LedgerError;

    fn try_from(record: PaymentRecord) -> Result<Self> {
        let requested = match record.allocations.as_deref() {
            Some(field) => parse_allocations(field)?,
            None => Vec::new(),
        };
        Ok(PaymentRequest {
            id: record.payment.into(),
            counterparty: record.counterparty.into(),
            direction: record.direction,
            gross_amount: record.gross,
            deductions: Deductions::new(
                record.bank_charges.unwrap_or_default(),
                record.tax_withheld.unwrap_or_default(),
            ),
            requested,
        })
    }
}

/// Reads payments and receipts from a CSV source.
///
/// Expects the header
/// `payment, counterparty, direction, gross, bank_charges, tax_withheld, allocations`.
pub struct PaymentReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> PaymentReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily reads payment requests in file order.
    pub fn payments(self) -> impl Iterator<Item = Result<PaymentRequest>> {
        self.reader.into_deserialize().map(|result| {
            let record: PaymentRecord = result?;
            PaymentRequest::try_from(record)
        })
    }
}
