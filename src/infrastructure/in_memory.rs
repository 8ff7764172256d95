use crate::domain::document::{CounterpartyId, DocumentId, MonetaryDocument};
use crate::domain::payment::{PaymentEvent, PaymentId};
use crate::domain::ports::{DocumentStore, LedgerStore, PaymentStore};
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory store for invoices and bills.
///
/// Uses `Arc<RwLock<HashMap<DocumentId, MonetaryDocument>>>`; clones share
/// the same map.
#[derive(Default, Clone)]
pub struct InMemoryDocumentStore {
    documents: Arc<RwLock<HashMap<DocumentId, MonetaryDocument>>>,
}

impl InMemoryDocumentStore {
    /// Creates a new, empty in-memory document store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn store(&self, document: MonetaryDocument) -> Result<()> {
        let mut documents = self.documents.write().await;
        documents.insert(document.id.clone(), document);
        Ok(())
    }

    async fn insert(&self, document: MonetaryDocument) -> Result<()> {
        let mut documents = self.documents.write().await;
        match documents.entry(document.id.clone()) {
            Entry::Occupied(_) => Err(LedgerError::DuplicateDocument(document.id)),
            Entry::Vacant(slot) => {
                slot.insert(document);
                Ok(())
            }
        }
    }

    async fn get(&self, id: &DocumentId) -> Result<Option<MonetaryDocument>> {
        let documents = self.documents.read().await;
        Ok(documents.get(id).cloned())
    }

    async fn by_counterparty(
        &self,
        counterparty: &CounterpartyId,
    ) -> Result<Vec<MonetaryDocument>> {
        let documents = self.documents.read().await;
        let mut matching: Vec<MonetaryDocument> = documents
            .values()
            .filter(|doc| &doc.counterparty == counterparty)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(matching)
    }

    async fn all(&self) -> Result<Vec<MonetaryDocument>> {
        let documents = self.documents.read().await;
        let mut all: Vec<MonetaryDocument> = documents.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }
}

/// A thread-safe in-memory store for recorded payments.
#[derive(Default, Clone)]
pub struct InMemoryPaymentStore {
    payments: Arc<RwLock<HashMap<PaymentId, PaymentEvent>>>,
}

impl InMemoryPaymentStore {
    /// Creates a new, empty in-memory payment store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn get(&self, id: &PaymentId) -> Result<Option<PaymentEvent>> {
        let payments = self.payments.read().await;
        Ok(payments.get(id).cloned())
    }

    async fn exists(&self, id: &PaymentId) -> Result<bool> {
        let payments = self.payments.read().await;
        Ok(payments.contains_key(id))
    }

    async fn all(&self) -> Result<Vec<PaymentEvent>> {
        let payments = self.payments.read().await;
        let mut all: Vec<PaymentEvent> = payments.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }
}

/// Documents and payments held in memory, committed together.
///
/// A commit holds the payment map's write lock, then the document map's, for
/// the whole update; readers see the ledger either before or after it.
#[derive(Default, Clone)]
pub struct InMemoryLedgerStore {
    documents: InMemoryDocumentStore,
    payments: InMemoryPaymentStore,
}

impl InMemoryLedgerStore {
    /// Creates a new, empty in-memory ledger.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    fn documents(&self) -> &dyn DocumentStore {
        &self.documents
    }

    fn payments(&self) -> &dyn PaymentStore {
        &self.payments
    }

    async fn commit_payment(
        &self,
        payment: PaymentEvent,
        documents: Vec<MonetaryDocument>,
    ) -> Result<()> {
        let mut payments = self.payments.payments.write().await;
        if payments.contains_key(&payment.id) {
            return Err(LedgerError::DuplicatePayment(payment.id.to_string()));
        }

        let mut stored = self.documents.documents.write().await;
        for document in documents {
            stored.insert(document.id.clone(), document);
        }
        payments.insert(payment.id.clone(), payment);
        Ok(())
    }
}
