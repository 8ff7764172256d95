use crate::domain::allocation::{allocate, compute_net_amount};
use crate::domain::document::{CounterpartyId, DocumentId, DocumentStatus, MonetaryDocument};
use crate::domain::money::Amount;
use crate::domain::payment::{PaymentEvent, PaymentRequest};
use crate::domain::ports::LedgerStoreBox;
use crate::error::{LedgerError, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// A document with an unpaid balance, as seen on a given day.
#[derive(Debug, Clone, PartialEq)]
pub struct OutstandingDocument {
    pub document: MonetaryDocument,
    pub status: DocumentStatus,
}

/// Records payments against invoices and bills.
///
/// `AllocationService` owns the storage backend and runs the allocation
/// engine between reading a counterparty's documents and writing them back.
/// That read-validate-write cycle holds a per-counterparty lock, so two
/// payments for the same customer or vendor never validate against the same
/// stale balance.
pub struct AllocationService {
    store: LedgerStoreBox,
    /// Holds an entry only while some task uses it, plus the most recent one.
    locks: Mutex<HashMap<CounterpartyId, Arc<Mutex<()>>>>,
}

impl AllocationService {
    /// Creates a new `AllocationService`.
    ///
    /// # Arguments
    ///
    /// * `store` - The store for documents and recorded payments.
    pub fn new(store: LedgerStoreBox) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn lock_for(&self, counterparty: &CounterpartyId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        // Entries referenced by the map alone have no holder or waiter.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(counterparty.clone()).or_default().clone()
    }

    /// Adds a new document to the ledger.
    pub async fn register_document(&self, document: MonetaryDocument) -> Result<()> {
        document.validate()?;

        let (id, status) = (document.id.clone(), document.status);
        self.store.documents().insert(document).await?;
        tracing::debug!(document = %id, status = %status, "document registered");
        Ok(())
    }

    /// Moves a draft document to open.
    pub async fn issue_document(&self, id: &DocumentId) -> Result<MonetaryDocument> {
        self.update_document(id, MonetaryDocument::issue).await
    }

    /// Voids a document that has not been paid against.
    pub async fn void_document(&self, id: &DocumentId) -> Result<MonetaryDocument> {
        self.update_document(id, MonetaryDocument::void).await
    }

    async fn update_document<F>(
        &self,
        id: &DocumentId,
        transition: F,
    ) -> Result<MonetaryDocument>
    where
        F: FnOnce(&mut MonetaryDocument) -> Result<()>,
    {
        let counterparty = self
            .store
            .documents()
            .get(id)
            .await?
            .ok_or_else(|| LedgerError::DocumentNotFound(id.clone()))?
            .counterparty;

        let lock = self.lock_for(&counterparty).await;
        let _guard = lock.lock().await;

        // Re-read under the lock; a payment may have landed in between.
        let mut document = self
            .store
            .documents()
            .get(id)
            .await?
            .ok_or_else(|| LedgerError::DocumentNotFound(id.clone()))?;
        transition(&mut document)?;
        self.store.documents().store(document.clone()).await?;
        tracing::info!(document = %document.id, status = %document.status, "document updated");
        Ok(document)
    }

    /// Validates a payment and applies it to the counterparty's documents.
    ///
    /// The settled documents and the payment event are committed in one
    /// write. On any error nothing is written, so a failed payment can be
    /// resubmitted under the same id.
    pub async fn record_payment(&self, request: PaymentRequest) -> Result<PaymentEvent> {
        for value in [
            request.gross_amount,
            request.deductions.bank_charges,
            request.deductions.tax_withheld,
        ] {
            Amount::new(value)?;
        }

        let lock = self.lock_for(&request.counterparty).await;
        let _guard = lock.lock().await;

        // commit_payment re-checks atomically; this only skips the work.
        if self.store.payments().exists(&request.id).await? {
            return Err(LedgerError::DuplicatePayment(request.id.to_string()));
        }

        let net_amount = compute_net_amount(request.gross_amount, request.deductions.total()?)?;

        let kind = request.direction.document_kind();
        let mut documents: Vec<MonetaryDocument> = self
            .store
            .documents()
            .by_counterparty(&request.counterparty)
            .await?
            .into_iter()
            .filter(|doc| doc.kind == kind)
            .collect();

        let outcome = allocate(net_amount, &documents, &request.requested_amounts()?)?;

        let mut updated = Vec::with_capacity(outcome.applied.len());
        for allocation in &outcome.applied {
            let position = documents
                .iter()
                .position(|doc| doc.id == allocation.document)
                .ok_or_else(|| LedgerError::DocumentNotFound(allocation.document.clone()))?;
            let mut document = documents.swap_remove(position);
            document.apply(allocation.amount)?;
            updated.push(document);
        }

        let event = PaymentEvent {
            id: request.id,
            counterparty: request.counterparty,
            direction: request.direction,
            gross_amount: request.gross_amount,
            deductions: request.deductions,
            net_amount,
            allocations: outcome.applied,
            unused_amount: outcome.unused_amount,
        };
        self.store.commit_payment(event.clone(), updated).await?;

        tracing::info!(
            payment = %event.id,
            counterparty = %event.counterparty,
            net = %event.net_amount,
            allocated = %event.allocated_amount(),
            unused = %event.unused_amount,
            "payment recorded"
        );
        Ok(event)
    }

    /// Documents of `counterparty` that can still take payments, with the
    /// status they display on `today`.
    pub async fn outstanding(
        &self,
        counterparty: &CounterpartyId,
        today: NaiveDate,
    ) -> Result<Vec<OutstandingDocument>> {
        let documents = self.store.documents().by_counterparty(counterparty).await?;
        Ok(documents
            .into_iter()
            .filter(|doc| doc.is_allocatable() && doc.balance_due > Decimal::ZERO)
            .map(|document| OutstandingDocument {
                status: document.display_status(today),
                document,
            })
            .collect())
    }

    /// All documents, sorted by id.
    pub async fn documents(&self) -> Result<Vec<MonetaryDocument>> {
        self.store.documents().all().await
    }

    /// All recorded payments, sorted by id.
    pub async fn payments(&self) -> Result<Vec<PaymentEvent>> {
        self.store.payments().all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::document::DocumentKind;
    use crate::domain::payment::{Allocation, Deductions, PaymentDirection, PaymentId};
    use crate::domain::ports::{DocumentStore, LedgerStore, PaymentStore};
    use crate::error::{AllocationError, AllocationErrorKind, AmountError};
    use crate::infrastructure::in_memory::InMemoryLedgerStore;
    use async_trait::async_trait;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn service() -> AllocationService {
        AllocationService::new(Box::new(InMemoryLedgerStore::new()))
    }

    /// Fails the next commit, then behaves like the ledger it wraps.
    struct FlakyLedger {
        inner: InMemoryLedgerStore,
        fail_next_commit: AtomicBool,
    }

    #[async_trait]
    impl LedgerStore for FlakyLedger {
        fn documents(&self) -> &dyn DocumentStore {
            self.inner.documents()
        }

        fn payments(&self) -> &dyn PaymentStore {
            self.inner.payments()
        }

        async fn commit_payment(
            &self,
            payment: PaymentEvent,
            documents: Vec<MonetaryDocument>,
        ) -> Result<()> {
            if self.fail_next_commit.swap(false, Ordering::SeqCst) {
                return Err(LedgerError::InternalError("disk full".into()));
            }
            self.inner.commit_payment(payment, documents).await
        }
    }

    async fn open_invoice(service: &AllocationService, id: &str, total: Decimal) {
        let doc = MonetaryDocument::new(id, "CUST-1", DocumentKind::Invoice, total);
        service.register_document(doc).await.unwrap();
        service.issue_document(&DocumentId::from(id)).await.unwrap();
    }

    fn receipt(id: &str, gross: Decimal, allocations: &[(&str, Decimal)]) -> PaymentRequest {
        PaymentRequest {
            id: PaymentId::from(id),
            counterparty: CounterpartyId::from("CUST-1"),
            direction: PaymentDirection::Received,
            gross_amount: gross,
            deductions: Deductions::default(),
            requested: allocations
                .iter()
                .map(|(doc, amount)| Allocation::new(*doc, *amount))
                .collect(),
        }
    }

    async fn balance(service: &AllocationService, id: &str) -> Decimal {
        service
            .documents()
            .await
            .unwrap()
            .into_iter()
            .find(|d| d.id.as_str() == id)
            .unwrap()
            .balance_due
    }

    #[tokio::test]
    async fn test_record_payment_updates_balances() {
        let service = service();
        open_invoice(&service, "INV-A", dec!(60)).await;
        open_invoice(&service, "INV-B", dec!(50)).await;

        let event = service
            .record_payment(receipt(
                "RCPT-1",
                dec!(100.00),
                &[("INV-A", dec!(60)), ("INV-B", dec!(40))],
            ))
            .await
            .unwrap();

        assert_eq!(event.unused_amount, dec!(0.00));
        assert!(event.is_reconciled());

        let docs = service.documents().await.unwrap();
        assert_eq!(docs[0].status, DocumentStatus::Paid);
        assert_eq!(docs[0].balance_due, dec!(0));
        assert_eq!(docs[1].status, DocumentStatus::PartiallyPaid);
        assert_eq!(docs[1].balance_due, dec!(10));
    }

    #[tokio::test]
    async fn test_record_payment_with_deductions() {
        let service = service();
        open_invoice(&service, "INV-A", dec!(200)).await;

        let mut request = receipt("RCPT-1", dec!(100.00), &[("INV-A", dec!(90))]);
        request.deductions = Deductions::new(dec!(2.50), dec!(2.50));
        let event = service.record_payment(request).await.unwrap();

        assert_eq!(event.net_amount, dec!(95.00));
        assert_eq!(event.unused_amount, dec!(5.00));
        assert_eq!(balance(&service, "INV-A").await, dec!(110));
    }

    #[tokio::test]
    async fn test_rejected_payment_writes_nothing() {
        let service = service();
        open_invoice(&service, "INV-A", dec!(60)).await;
        open_invoice(&service, "INV-B", dec!(60)).await;

        let err = service
            .record_payment(receipt(
                "RCPT-1",
                dec!(50.00),
                &[("INV-A", dec!(30)), ("INV-B", dec!(30))],
            ))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Allocation(ref e) if e.kind() == AllocationErrorKind::ExceedsNetAmount
        ));

        assert_eq!(balance(&service, "INV-A").await, dec!(60));
        assert_eq!(balance(&service, "INV-B").await, dec!(60));
        assert!(service.payments().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_commit_writes_nothing_and_retry_applies_once() {
        let ledger = InMemoryLedgerStore::new();
        let service = AllocationService::new(Box::new(FlakyLedger {
            inner: ledger.clone(),
            fail_next_commit: AtomicBool::new(true),
        }));
        open_invoice(&service, "INV-A", dec!(100)).await;

        let request = receipt("RCPT-1", dec!(40), &[("INV-A", dec!(40))]);
        let err = service.record_payment(request.clone()).await.unwrap_err();
        assert!(matches!(err, LedgerError::InternalError(_)));
        assert_eq!(balance(&service, "INV-A").await, dec!(100));
        assert!(service.payments().await.unwrap().is_empty());

        service.record_payment(request.clone()).await.unwrap();
        assert_eq!(balance(&service, "INV-A").await, dec!(60));

        let err = service.record_payment(request).await.unwrap_err();
        assert!(matches!(err, LedgerError::DuplicatePayment(_)));
        assert_eq!(balance(&service, "INV-A").await, dec!(60));
        assert_eq!(ledger.payments().all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_record_payment_rejects_invalid_amounts() {
        let service = service();
        open_invoice(&service, "INV-A", dec!(60.00)).await;

        let err = service
            .record_payment(receipt("RCPT-1", dec!(100.00), &[("INV-A", dec!(59.996))]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Allocation(ref e) if e.kind() == AllocationErrorKind::InvalidAmount
        ));

        let mut request = receipt("RCPT-2", dec!(10.00), &[]);
        request.deductions = Deductions::new(dec!(-1.00), dec!(0));
        let err = service.record_payment(request).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Allocation(AllocationError::InvalidAmount(AmountError::Negative(_)))
        ));

        let err = service
            .record_payment(receipt(
                "RCPT-3",
                Decimal::MAX,
                &[("INV-A", Decimal::MAX), ("INV-A", Decimal::MAX)],
            ))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Allocation(AllocationError::InvalidAmount(AmountError::Overflow))
        ));

        assert_eq!(balance(&service, "INV-A").await, dec!(60.00));
        assert!(service.payments().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_payment_ids() {
        let service = service();
        open_invoice(&service, "INV-A", dec!(100)).await;

        service
            .record_payment(receipt("RCPT-1", dec!(10), &[("INV-A", dec!(10))]))
            .await
            .unwrap();
        let err = service
            .record_payment(receipt("RCPT-1", dec!(10), &[("INV-A", dec!(10))]))
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::DuplicatePayment(_)));
        assert_eq!(balance(&service, "INV-A").await, dec!(90));
    }

    #[tokio::test]
    async fn test_payment_direction_limits_documents() {
        let service = service();
        open_invoice(&service, "INV-A", dec!(100)).await;

        let mut request = receipt("PAY-1", dec!(10), &[("INV-A", dec!(10))]);
        request.direction = PaymentDirection::Made;
        let err = service.record_payment(request).await.unwrap_err();

        assert!(matches!(
            err,
            LedgerError::Allocation(ref e) if e.kind() == AllocationErrorKind::UnknownDocument
        ));
    }

    #[tokio::test]
    async fn test_draft_and_void_documents_reject_payments() {
        let service = service();
        let draft = MonetaryDocument::new("INV-D", "CUST-1", DocumentKind::Invoice, dec!(10));
        service.register_document(draft).await.unwrap();
        open_invoice(&service, "INV-V", dec!(10)).await;
        service
            .void_document(&DocumentId::from("INV-V"))
            .await
            .unwrap();

        for doc in ["INV-D", "INV-V"] {
            let err = service
                .record_payment(receipt(&format!("R-{doc}"), dec!(10), &[(doc, dec!(1))]))
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                LedgerError::Allocation(ref e) if e.kind() == AllocationErrorKind::ExceedsBalance
            ));
        }
    }

    #[tokio::test]
    async fn test_register_duplicate_document() {
        let service = service();
        open_invoice(&service, "INV-A", dec!(100)).await;
        let again = MonetaryDocument::new("INV-A", "CUST-1", DocumentKind::Invoice, dec!(5));
        assert!(matches!(
            service.register_document(again).await,
            Err(LedgerError::DuplicateDocument(_))
        ));
    }

    #[tokio::test]
    async fn test_void_paid_document_rejected() {
        let service = service();
        open_invoice(&service, "INV-A", dec!(10)).await;
        service
            .record_payment(receipt("RCPT-1", dec!(10), &[("INV-A", dec!(10))]))
            .await
            .unwrap();

        let err = service
            .void_document(&DocumentId::from("INV-A"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::ValidationError(_)));

        let err = service
            .void_document(&DocumentId::from("INV-404"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::DocumentNotFound(_)));
    }

    #[tokio::test]
    async fn test_outstanding_reports_overdue() {
        let service = service();
        let due = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
        let doc = MonetaryDocument::new("INV-A", "CUST-1", DocumentKind::Invoice, dec!(10))
            .with_due_date(due);
        service.register_document(doc).await.unwrap();
        service
            .issue_document(&DocumentId::from("INV-A"))
            .await
            .unwrap();
        open_invoice(&service, "INV-B", dec!(5)).await;
        service
            .record_payment(receipt("RCPT-1", dec!(5), &[("INV-B", dec!(5))]))
            .await
            .unwrap();

        let today = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let outstanding = service
            .outstanding(&CounterpartyId::from("CUST-1"), today)
            .await
            .unwrap();

        assert_eq!(outstanding.len(), 1);
        assert_eq!(outstanding[0].document.id.as_str(), "INV-A");
        assert_eq!(outstanding[0].status, DocumentStatus::Overdue);
    }

    #[tokio::test]
    async fn test_cumulative_applied_never_exceeds_total() {
        let service = service();
        open_invoice(&service, "INV-A", dec!(100.00)).await;
        open_invoice(&service, "INV-B", dec!(250.00)).await;

        let mut rng = StdRng::seed_from_u64(42);
        for i in 0..200 {
            let a = Decimal::new(rng.gen_range(0..5_000), 2);
            let b = Decimal::new(rng.gen_range(0..5_000), 2);
            let gross = Decimal::new(rng.gen_range(0..12_000), 2);
            let _ = service
                .record_payment(receipt(
                    &format!("RCPT-{i}"),
                    gross,
                    &[("INV-A", a), ("INV-B", b)],
                ))
                .await;
        }

        let docs = service.documents().await.unwrap();
        let payments = service.payments().await.unwrap();
        for doc in &docs {
            let applied: Decimal = payments
                .iter()
                .flat_map(|p| &p.allocations)
                .filter(|a| a.document == doc.id)
                .map(|a| a.amount)
                .sum();
            assert_eq!(applied, doc.applied_amount());
            assert!(applied <= doc.total_amount);
            assert!(doc.balance_due >= Decimal::ZERO);
        }
        assert!(payments.iter().all(PaymentEvent::is_reconciled));
    }

    #[tokio::test]
    async fn test_concurrent_payments_do_not_over_allocate() {
        let service = Arc::new(service());
        open_invoice(&service, "INV-A", dec!(100)).await;

        let mut handles = Vec::new();
        for i in 0..10 {
            let service = Arc::clone(&service);
            handles.push(tokio::spawn(async move {
                let request = receipt(&format!("RCPT-{i}"), dec!(30), &[("INV-A", dec!(30))]);
                service.record_payment(request).await
            }));
        }

        let mut succeeded = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                succeeded += 1;
            }
        }

        assert_eq!(succeeded, 3);
        assert_eq!(balance(&service, "INV-A").await, dec!(10));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_same_payment_id_across_counterparties_recorded_once() {
        let service = Arc::new(service());
        for customer in ["CUST-1", "CUST-2"] {
            let doc = MonetaryDocument::new(
                format!("INV-{customer}"),
                customer,
                DocumentKind::Invoice,
                dec!(100),
            );
            let id = doc.id.clone();
            service.register_document(doc).await.unwrap();
            service.issue_document(&id).await.unwrap();
        }

        let mut handles = Vec::new();
        for i in 0..20 {
            for customer in ["CUST-1", "CUST-2"] {
                let service = Arc::clone(&service);
                handles.push(tokio::spawn(async move {
                    let mut request = receipt(
                        &format!("RCPT-{i}"),
                        dec!(1),
                        &[(format!("INV-{customer}").as_str(), dec!(1))],
                    );
                    request.counterparty = CounterpartyId::from(customer);
                    service.record_payment(request).await
                }));
            }
        }

        let mut succeeded = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(err) => assert!(matches!(err, LedgerError::DuplicatePayment(_))),
            }
        }
        assert_eq!(succeeded, 20);

        let payments = service.payments().await.unwrap();
        assert_eq!(payments.len(), 20);
        for doc in service.documents().await.unwrap() {
            let applied: Decimal = payments
                .iter()
                .flat_map(|p| &p.allocations)
                .filter(|a| a.document == doc.id)
                .map(|a| a.amount)
                .sum();
            assert_eq!(applied, doc.applied_amount());
        }
    }

    #[tokio::test]
    async fn test_idle_counterparty_locks_are_dropped() {
        let service = service();
        for i in 0..50 {
            let lock = service.lock_for(&CounterpartyId::from(format!("C-{i}"))).await;
            let _guard = lock.lock().await;
        }
        assert_eq!(service.locks.lock().await.len(), 1);

        let held = service.lock_for(&CounterpartyId::from("A")).await;
        let again = service.lock_for(&CounterpartyId::from("A")).await;
        assert!(Arc::ptr_eq(&held, &again));
        drop(again);

        service.lock_for(&CounterpartyId::from("B")).await;
        assert_eq!(service.locks.lock().await.len(), 2);

        drop(held);
        service.lock_for(&CounterpartyId::from("C")).await;
        assert_eq!(service.locks.lock().await.len(), 1);
    }
}
