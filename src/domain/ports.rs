use super::document::{CounterpartyId, DocumentId, MonetaryDocument};
use super::payment::{PaymentEvent, PaymentId};
use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Inserts or replaces a document.
    async fn store(&self, document: MonetaryDocument) -> Result<()>;
    /// Inserts a document whose id is not taken yet.
    ///
    /// Fails with [`LedgerError::DuplicateDocument`](crate::error::LedgerError::DuplicateDocument)
    /// otherwise, leaving the existing document untouched.
    async fn insert(&self, document: MonetaryDocument) -> Result<()>;
    async fn get(&self, id: &DocumentId) -> Result<Option<MonetaryDocument>>;
    /// All documents of one counterparty, sorted by id.
    async fn by_counterparty(
        &self,
        counterparty: &CounterpartyId,
    ) -> Result<Vec<MonetaryDocument>>;
    async fn all(&self) -> Result<Vec<MonetaryDocument>>;
}

/// Read side of the payment history. Events are only written through
/// [`LedgerStore::commit_payment`].
#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn get(&self, id: &PaymentId) -> Result<Option<PaymentEvent>>;
    async fn exists(&self, id: &PaymentId) -> Result<bool>;
    async fn all(&self) -> Result<Vec<PaymentEvent>>;
}

/// The storage backend of a ledger: documents, payment history, and the one
/// write that touches both.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    fn documents(&self) -> &dyn DocumentStore;
    fn payments(&self) -> &dyn PaymentStore;

    /// Stores `payment` and the documents it settled in a single write.
    ///
    /// Either everything lands or nothing does. A payment id already in the
    /// history fails with
    /// [`LedgerError::DuplicatePayment`](crate::error::LedgerError::DuplicatePayment),
    /// so concurrent commits of the same id record it at most once.
    async fn commit_payment(
        &self,
        payment: PaymentEvent,
        documents: Vec<MonetaryDocument>,
    ) -> Result<()>;
}

pub type LedgerStoreBox = Box<dyn LedgerStore>;

pub type LedgerStoreFactory = Box<dyn Fn() -> LedgerStoreBox + Send + Sync>;
