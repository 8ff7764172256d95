use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::document::DocumentId;

/// The kind of an [`AllocationError`], for callers that branch on the
/// failure without caring about the amounts involved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationErrorKind {
    ExceedsBalance,
    ExceedsNetAmount,
    NegativeNet,
    UnknownDocument,
    InvalidAmount,
}

/// Why a value was refused as an [`Amount`](crate::domain::money::Amount).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AmountError {
    #[error("amount {0} must not be negative")]
    Negative(Decimal),
    #[error("amount {0} is finer than the currency's minor unit")]
    SubMinorUnit(Decimal),
    #[error("amount arithmetic overflowed")]
    Overflow,
}

/// Rejections produced by the allocation engine.
///
/// These are always returned to the caller; the engine never corrects or
/// clamps a request on its own.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AllocationError {
    #[error("allocation of {requested} to {document} exceeds its balance due of {balance}")]
    ExceedsBalance {
        document: DocumentId,
        requested: Decimal,
        balance: Decimal,
    },
    #[error("requested allocations total {requested} but only {net} is available")]
    ExceedsNetAmount { requested: Decimal, net: Decimal },
    #[error("deductions of {deductions} exceed the gross amount of {gross}")]
    NegativeNet { gross: Decimal, deductions: Decimal },
    #[error("allocation targets unknown document {document}")]
    UnknownDocument { document: DocumentId },
    #[error(transparent)]
    InvalidAmount(#[from] AmountError),
}

impl AllocationError {
    pub fn kind(&self) -> AllocationErrorKind {
        match self {
            Self::ExceedsBalance { .. } => AllocationErrorKind::ExceedsBalance,
            Self::ExceedsNetAmount { .. } => AllocationErrorKind::ExceedsNetAmount,
            Self::NegativeNet { .. } => AllocationErrorKind::NegativeNet,
            Self::UnknownDocument { .. } => AllocationErrorKind::UnknownDocument,
            Self::InvalidAmount(_) => AllocationErrorKind::InvalidAmount,
        }
    }
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error(transparent)]
    Allocation(#[from] AllocationError),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Document {0} not found")]
    DocumentNotFound(DocumentId),
    #[error("Document {0} already exists")]
    DuplicateDocument(DocumentId),
    #[error("Payment {0} was already recorded")]
    DuplicatePayment(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

impl From<AmountError> for LedgerError {
    fn from(err: AmountError) -> Self {
        LedgerError::Allocation(err.into())
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for LedgerError {
    fn from(err: rocksdb::Error) -> Self {
        LedgerError::InternalError(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
