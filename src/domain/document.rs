use super::money::Amount;
use crate::error::{AllocationError, LedgerError};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an invoice or bill, e.g. `INV-0001`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DocumentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of the customer or vendor a document is issued to or by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CounterpartyId(String);

impl CounterpartyId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CounterpartyId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for CounterpartyId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for CounterpartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// Receivable, settled by payments received from a customer.
    Invoice,
    /// Payable, settled by payments made to a vendor.
    Bill,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Invoice => "invoice",
            DocumentKind::Bill => "bill",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Draft,
    Open,
    PartiallyPaid,
    Paid,
    /// Display-only; see [`MonetaryDocument::display_status`].
    Overdue,
    Void,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Draft => "draft",
            DocumentStatus::Open => "open",
            DocumentStatus::PartiallyPaid => "partially_paid",
            DocumentStatus::Paid => "paid",
            DocumentStatus::Overdue => "overdue",
            DocumentStatus::Void => "void",
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An invoice, bill or similar payable/receivable record.
///
/// `balance_due` only moves through [`MonetaryDocument::apply`], which keeps
/// `0 <= balance_due <= total_amount` and so bounds the cumulative amount
/// ever applied to the document by its total.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct MonetaryDocument {
    pub id: DocumentId,
    pub counterparty: CounterpartyId,
    pub kind: DocumentKind,
    /// The document's full value.
    pub total_amount: Decimal,
    /// Remaining unpaid amount.
    pub balance_due: Decimal,
    pub status: DocumentStatus,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

impl MonetaryDocument {
    /// Creates a draft document with nothing applied yet.
    pub fn new(
        id: impl Into<DocumentId>,
        counterparty: impl Into<CounterpartyId>,
        kind: DocumentKind,
        total_amount: Decimal,
    ) -> Self {
        Self {
            id: id.into(),
            counterparty: counterparty.into(),
            kind,
            total_amount,
            balance_due: total_amount,
            status: DocumentStatus::Draft,
            due_date: None,
        }
    }

    pub fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    /// Checks the amount invariants of a document coming from outside the ledger.
    pub fn validate(&self) -> Result<(), LedgerError> {
        for value in [self.total_amount, self.balance_due] {
            Amount::new(value)
                .map_err(|e| LedgerError::ValidationError(format!("{}: {e}", self.id)))?;
        }
        if self.balance_due > self.total_amount {
            return Err(LedgerError::ValidationError(format!(
                "{}: balance due {} is outside 0..={}",
                self.id, self.balance_due, self.total_amount
            )));
        }
        if self.status == DocumentStatus::Paid && !self.balance_due.is_zero() {
            return Err(LedgerError::ValidationError(format!(
                "{}: paid document still has {} due",
                self.id, self.balance_due
            )));
        }
        Ok(())
    }

    /// Cumulative amount applied over the document's lifetime.
    pub fn applied_amount(&self) -> Decimal {
        self.total_amount - self.balance_due
    }

    /// Whether payments may be applied. Draft, paid and void documents are excluded.
    pub fn is_allocatable(&self) -> bool {
        matches!(
            self.status,
            DocumentStatus::Open | DocumentStatus::PartiallyPaid | DocumentStatus::Overdue
        )
    }

    /// The balance an allocation may draw on: `balance_due`, or zero when
    /// the document is not allocatable.
    pub fn allocatable_balance(&self) -> Decimal {
        if self.is_allocatable() {
            self.balance_due
        } else {
            Decimal::ZERO
        }
    }

    /// Applies part of a payment to this document.
    pub fn apply(&mut self, amount: Decimal) -> Result<(), AllocationError> {
        let balance = self.allocatable_balance();
        if amount < Decimal::ZERO || amount > balance {
            return Err(AllocationError::ExceedsBalance {
                document: self.id.clone(),
                requested: amount,
                balance,
            });
        }
        let amount = Amount::new(amount)?;
        if amount.is_zero() {
            return Ok(());
        }

        self.balance_due -= amount.value();
        self.status = if self.balance_due.is_zero() {
            DocumentStatus::Paid
        } else {
            DocumentStatus::PartiallyPaid
        };
        Ok(())
    }

    /// Issues a draft, making it open for payment.
    pub fn issue(&mut self) -> Result<(), LedgerError> {
        if self.status != DocumentStatus::Draft {
            return Err(LedgerError::ValidationError(format!(
                "{} is {} and cannot be issued",
                self.id, self.status
            )));
        }
        self.status = DocumentStatus::Open;
        Ok(())
    }

    /// Voids a document that has not received any payment.
    pub fn void(&mut self) -> Result<(), LedgerError> {
        if matches!(self.status, DocumentStatus::Paid | DocumentStatus::Void) {
            return Err(LedgerError::ValidationError(format!(
                "{} is {} and cannot be voided",
                self.id, self.status
            )));
        }
        if self.applied_amount() > Decimal::ZERO {
            return Err(LedgerError::ValidationError(format!(
                "{} has {} applied and cannot be voided",
                self.id,
                self.applied_amount()
            )));
        }
        self.status = DocumentStatus::Void;
        Ok(())
    }

    /// Status as shown to a user on `today`.
    ///
    /// An open or partially paid document past its due date with a balance
    /// left reads as overdue. The stored status is never changed to overdue.
    pub fn display_status(&self, today: NaiveDate) -> DocumentStatus {
        match self.status {
            DocumentStatus::Open | DocumentStatus::PartiallyPaid | DocumentStatus::Overdue => {
                let past_due = self.due_date.is_some_and(|due| due < today);
                if past_due && self.balance_due > Decimal::ZERO {
                    DocumentStatus::Overdue
                } else if self.status == DocumentStatus::Overdue {
                    DocumentStatus::Open
                } else {
                    self.status
                }
            }
            other => other,
        }
    }
}
