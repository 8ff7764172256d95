use super::document::{CounterpartyId, DocumentId, DocumentKind};
use super::money;
use crate::error::AmountError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(String);

impl PaymentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PaymentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for PaymentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for PaymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum PaymentDirection {
    /// A customer receipt, applied to invoices.
    Received,
    /// A vendor payment, applied to bills.
    Made,
}

impl PaymentDirection {
    /// The kind of document this direction of payment settles.
    pub fn document_kind(&self) -> DocumentKind {
        match self {
            PaymentDirection::Received => DocumentKind::Invoice,
            PaymentDirection::Made => DocumentKind::Bill,
        }
    }
}

/// Amounts withheld from the gross before anything reaches the ledger.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Copy, Default)]
pub struct Deductions {
    pub bank_charges: Decimal,
    pub tax_withheld: Decimal,
}

impl Deductions {
    pub fn new(bank_charges: Decimal, tax_withheld: Decimal) -> Self {
        Self {
            bank_charges,
            tax_withheld,
        }
    }

    pub fn total(&self) -> Result<Decimal, AmountError> {
        money::checked_add(self.bank_charges, self.tax_withheld)
    }
}

/// Part of a payment applied to one document.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Allocation {
    pub document: DocumentId,
    pub amount: Decimal,
}

impl Allocation {
    pub fn new(document: impl Into<DocumentId>, amount: Decimal) -> Self {
        Self {
            document: document.into(),
            amount,
        }
    }
}

/// A payment as submitted by the caller, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRequest {
    pub id: PaymentId,
    pub counterparty: CounterpartyId,
    pub direction: PaymentDirection,
    pub gross_amount: Decimal,
    pub deductions: Deductions,
    pub requested: Vec<Allocation>,
}

impl PaymentRequest {
    /// Per-document requested amounts. A document listed twice gets the sum
    /// of its lines.
    pub fn requested_amounts(&self) -> Result<HashMap<DocumentId, Decimal>, AmountError> {
        let mut amounts: HashMap<DocumentId, Decimal> = HashMap::new();
        for allocation in &self.requested {
            let entry = amounts.entry(allocation.document.clone()).or_default();
            *entry = money::checked_add(*entry, allocation.amount)?;
        }
        Ok(amounts)
    }
}

/// A validated payment or receipt, as recorded by the ledger.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct PaymentEvent {
    pub id: PaymentId,
    pub counterparty: CounterpartyId,
    pub direction: PaymentDirection,
    pub gross_amount: Decimal,
    pub deductions: Deductions,
    /// `gross_amount - deductions`, rounded to the minor unit.
    pub net_amount: Decimal,
    /// Applied amounts in document order.
    pub allocations: Vec<Allocation>,
    /// The part of the net amount left as credit for the counterparty.
    pub unused_amount: Decimal,
}

impl PaymentEvent {
    pub fn allocated_amount(&self) -> Decimal {
        self.net_amount - self.unused_amount
    }

    /// `allocated + unused == net` with nothing over-applied.
    pub fn is_reconciled(&self) -> bool {
        if self.unused_amount < Decimal::ZERO {
            return false;
        }
        money::checked_sum(self.allocations.iter().map(|a| &a.amount))
            .and_then(|allocated| money::checked_add(allocated, self.unused_amount))
            .is_ok_and(|total| total == self.net_amount)
    }
}
