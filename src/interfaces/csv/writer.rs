use crate::domain::document::MonetaryDocument;
use crate::domain::money::round_minor;
use crate::domain::payment::PaymentEvent;
use crate::error::Result;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct DocumentRow<'a> {
    id: &'a str,
    counterparty: &'a str,
    kind: &'a str,
    total: Decimal,
    balance_due: Decimal,
    status: &'a str,
}

#[derive(Serialize)]
struct PaymentRow<'a> {
    payment: &'a str,
    counterparty: &'a str,
    gross: Decimal,
    net: Decimal,
    allocated: Decimal,
    unused: Decimal,
}

/// Writes the ledger's final state as CSV.
pub struct LedgerWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> LedgerWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    /// One row per document, with the status it displays on `today`.
    pub fn write_documents(
        &mut self,
        documents: &[MonetaryDocument],
        today: NaiveDate,
    ) -> Result<()> {
        for doc in documents {
            self.writer.serialize(DocumentRow {
                id: doc.id.as_str(),
                counterparty: doc.counterparty.as_str(),
                kind: doc.kind.as_str(),
                total: round_minor(doc.total_amount),
                balance_due: round_minor(doc.balance_due),
                status: doc.display_status(today).as_str(),
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }

    /// One row per recorded payment, showing the credit it left unused.
    pub fn write_payments(&mut self, payments: &[PaymentEvent]) -> Result<()> {
        for payment in payments {
            self.writer.serialize(PaymentRow {
                payment: payment.id.as_str(),
                counterparty: payment.counterparty.as_str(),
                gross: round_minor(payment.gross_amount),
                net: payment.net_amount,
                allocated: round_minor(payment.allocated_amount()),
                unused: round_minor(payment.unused_amount),
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
