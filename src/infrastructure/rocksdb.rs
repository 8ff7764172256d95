use crate::domain::document::{CounterpartyId, DocumentId, MonetaryDocument};
use crate::domain::payment::{PaymentEvent, PaymentId};
use crate::domain::ports::{DocumentStore, LedgerStore, PaymentStore};
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for storing invoices and bills.
pub const CF_DOCUMENTS: &str = "documents";
/// Column Family for storing recorded payments.
pub const CF_PAYMENTS: &str = "payments";

/// A persistent store implementation using RocksDB.
///
/// Documents and payments live in separate Column Families, keyed by their
/// identifiers and serialized as JSON.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
/// Writes that must not overwrite an existing key check for it under
/// `write_lock`, which clones share as well.
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

fn internal(message: String) -> LedgerError {
    LedgerError::InternalError(Box::new(std::io::Error::other(message)))
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at `path`, creating the
    /// "documents" and "payments" column families if missing.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_documents = ColumnFamilyDescriptor::new(CF_DOCUMENTS, Options::default());
        let cf_payments = ColumnFamilyDescriptor::new(CF_PAYMENTS, Options::default());

        let db = DB::open_cf_descriptors(&opts, path, vec![cf_documents, cf_payments])?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn put<T: Serialize>(&self, cf_name: &str, key: &str, value: &T) -> Result<()> {
        let mut batch = WriteBatch::default();
        self.stage(&mut batch, cf_name, key, value)?;
        self.db.write(batch)?;
        Ok(())
    }

    /// Adds a put to `batch` without writing it.
    fn stage<T: Serialize>(
        &self,
        batch: &mut WriteBatch,
        cf_name: &str,
        key: &str,
        value: &T,
    ) -> Result<()> {
        let cf = self
            .db
            .cf_handle(cf_name)
            .ok_or_else(|| internal(format!("{cf_name} column family not found")))?;
        let bytes = serde_json::to_vec(value)
            .map_err(|e| internal(format!("Serialization error: {e}")))?;
        batch.put_cf(&cf, key.as_bytes(), bytes);
        Ok(())
    }

    fn contains(&self, cf_name: &str, key: &str) -> Result<bool> {
        let cf = self
            .db
            .cf_handle(cf_name)
            .ok_or_else(|| internal(format!("{cf_name} column family not found")))?;
        // Check the key without deserializing the value
        let result = self.db.get_pinned_cf(&cf, key.as_bytes())?;
        Ok(result.is_some())
    }

    fn fetch<T: DeserializeOwned>(&self, cf_name: &str, key: &str) -> Result<Option<T>> {
        let cf = self
            .db
            .cf_handle(cf_name)
            .ok_or_else(|| internal(format!("{cf_name} column family not found")))?;
        match self.db.get_cf(&cf, key.as_bytes())? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| internal(format!("Deserialization error: {e}"))),
            None => Ok(None),
        }
    }

    /// Every value of a column family, in key order.
    fn scan<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self
            .db
            .cf_handle(cf_name)
            .ok_or_else(|| internal(format!("{cf_name} column family not found")))?;

        let mut values = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_key, value) =
                item.map_err(|e| internal(format!("RocksDB iteration error: {e}")))?;
            let decoded = serde_json::from_slice(&value)
                .map_err(|e| internal(format!("Deserialization error: {e}")))?;
            values.push(decoded);
        }
        Ok(values)
    }
}

#[async_trait]
impl DocumentStore for RocksDBStore {
    async fn store(&self, document: MonetaryDocument) -> Result<()> {
        self.put(CF_DOCUMENTS, document.id.as_str(), &document)
    }

    async fn insert(&self, document: MonetaryDocument) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if self.contains(CF_DOCUMENTS, document.id.as_str())? {
            return Err(LedgerError::DuplicateDocument(document.id));
        }
        self.put(CF_DOCUMENTS, document.id.as_str(), &document)
    }

    async fn get(&self, id: &DocumentId) -> Result<Option<MonetaryDocument>> {
        self.fetch(CF_DOCUMENTS, id.as_str())
    }

    async fn by_counterparty(
        &self,
        counterparty: &CounterpartyId,
    ) -> Result<Vec<MonetaryDocument>> {
        let documents: Vec<MonetaryDocument> = self.scan(CF_DOCUMENTS)?;
        Ok(documents
            .into_iter()
            .filter(|doc| &doc.counterparty == counterparty)
            .collect())
    }

    async fn all(&self) -> Result<Vec<MonetaryDocument>> {
        self.scan(CF_DOCUMENTS)
    }
}

#[async_trait]
impl PaymentStore for RocksDBStore {
    async fn get(&self, id: &PaymentId) -> Result<Option<PaymentEvent>> {
        self.fetch(CF_PAYMENTS, id.as_str())
    }

    async fn exists(&self, id: &PaymentId) -> Result<bool> {
        self.contains(CF_PAYMENTS, id.as_str())
    }

    async fn all(&self) -> Result<Vec<PaymentEvent>> {
        self.scan(CF_PAYMENTS)
    }
}

#[async_trait]
impl LedgerStore for RocksDBStore {
    fn documents(&self) -> &dyn DocumentStore {
        self
    }

    fn payments(&self) -> &dyn PaymentStore {
        self
    }

    /// Documents and the event go into one `WriteBatch`, which RocksDB
    /// applies atomically.
    async fn commit_payment(
        &self,
        payment: PaymentEvent,
        documents: Vec<MonetaryDocument>,
    ) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if self.contains(CF_PAYMENTS, payment.id.as_str())? {
            return Err(LedgerError::DuplicatePayment(payment.id.to_string()));
        }

        let mut batch = WriteBatch::default();
        for document in &documents {
            self.stage(&mut batch, CF_DOCUMENTS, document.id.as_str(), document)?;
        }
        self.stage(&mut batch, CF_PAYMENTS, payment.id.as_str(), &payment)?;
        self.db.write(batch)?;
        Ok(())
    }
}
