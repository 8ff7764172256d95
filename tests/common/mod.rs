#![allow(dead_code)]

use rust_decimal::Decimal;
use std::fs::File;
use std::io::{Error, Write};
use std::path::Path;
use tempfile::NamedTempFile;

pub const DOCUMENT_HEADER: &str = "id, counterparty, kind, total, balance_due, status, due_date";
pub const PAYMENT_HEADER: &str =
    "payment, counterparty, direction, gross, bank_charges, tax_withheld, allocations";

/// Writes `header` followed by `rows` to a temporary CSV file.
pub fn csv_file(header: &str, rows: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{header}").unwrap();
    for row in rows {
        writeln!(file, "{row}").unwrap();
    }
    file
}

/// Open invoices of 100.00 for one customer, each paid off by
/// `installments` equal receipts.
pub fn generate_installments(
    documents: &Path,
    payments: &Path,
    invoices: usize,
    installments: u32,
) -> Result<(), Error> {
    let mut docs = csv::Writer::from_writer(File::create(documents)?);
    docs.write_record(["id", "counterparty", "kind", "total", "balance_due", "status", "due_date"])?;
    for i in 1..=invoices {
        let id = format!("INV-{i:06}");
        docs.write_record([id.as_str(), "CUST-1", "invoice", "100.00", "", "open", ""])?;
    }
    docs.flush()?;

    let share = (Decimal::ONE_HUNDRED / Decimal::from(installments))
        .round_dp(2)
        .to_string();
    let mut pays = csv::Writer::from_writer(File::create(payments)?);
    pays.write_record([
        "payment",
        "counterparty",
        "direction",
        "gross",
        "bank_charges",
        "tax_withheld",
        "allocations",
    ])?;
    let mut seq = 0;
    for _ in 0..installments {
        for i in 1..=invoices {
            seq += 1;
            let id = format!("RCPT-{seq:08}");
            let allocation = format!("INV-{i:06}:{share}");
            pays.write_record([
                id.as_str(),
                "CUST-1",
                "received",
                share.as_str(),
                "",
                "",
                allocation.as_str(),
            ])?;
        }
    }
    pays.flush()?;
    Ok(())
}
