#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use crate::approval::document::PdfRenderer;
    use crate::approval::executor::{ApprovalWorkflow, NotificationOutcome, NotifyFailurePolicy};
    use crate::approval::state_machine::ApprovalState;
    use crate::error::{
        ApprovalError, DocumentError, NotificationError, StoreError, StoreOperation,
    };
    use crate::models::invoice::{Invoice, InvoiceFilter, InvoiceKey, InvoiceStatus, InvoiceUpdate};
    use crate::stores::{
        ApprovalEvent, DocumentStore, InvoiceStore, LocalDocumentStore, MemoryDocumentStore,
        MemoryInvoiceStore, MemoryNotificationSink, NotificationSink,
    };

    const FILES: &str = "https://files.example.com/invoices";

    /// Invoice store that fails updates carrying a document link.
    struct LinkRejectingStore(MemoryInvoiceStore);

    #[async_trait]
    impl InvoiceStore for LinkRejectingStore {
        async fn query(&self, filter: &InvoiceFilter) -> Result<Vec<Invoice>, StoreError> {
            self.0.query(filter).await
        }

        async fn update(&self, key: &InvoiceKey, fields: &InvoiceUpdate) -> Result<(), StoreError> {
            if fields.pdf_url.is_some() {
                return Err(StoreError::new(StoreOperation::Update, "column pdf_url is read-only"));
            }
            self.0.update(key, fields).await
        }

        async fn delete(&self, key: &InvoiceKey) -> Result<(), StoreError> {
            self.0.delete(key).await
        }

        async fn phone_numbers(&self) -> Result<Vec<String>, StoreError> {
            self.0.phone_numbers().await
        }
    }

    /// Invoice store whose updates always fail.
    struct OfflineStore(MemoryInvoiceStore);

    #[async_trait]
    impl InvoiceStore for OfflineStore {
        async fn query(&self, filter: &InvoiceFilter) -> Result<Vec<Invoice>, StoreError> {
            self.0.query(filter).await
        }

        async fn update(&self, _key: &InvoiceKey, _fields: &InvoiceUpdate) -> Result<(), StoreError> {
            Err(StoreError::new(StoreOperation::Update, "connection refused"))
        }

        async fn delete(&self, _key: &InvoiceKey) -> Result<(), StoreError> {
            Err(StoreError::new(StoreOperation::Delete, "connection refused"))
        }

        async fn phone_numbers(&self) -> Result<Vec<String>, StoreError> {
            self.0.phone_numbers().await
        }
    }

    /// Document store failing the first `failures` uploads.
    struct FlakyDocumentStore {
        inner: MemoryDocumentStore,
        failures: AtomicUsize,
    }

    impl FlakyDocumentStore {
        fn new(inner: MemoryDocumentStore, failures: usize) -> Self {
            Self {
                inner,
                failures: AtomicUsize::new(failures),
            }
        }
    }

    #[async_trait]
    impl DocumentStore for FlakyDocumentStore {
        async fn upload(
            &self,
            name: &str,
            bytes: Vec<u8>,
            content_type: &str,
        ) -> Result<(), DocumentError> {
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(DocumentError::Upload {
                    name: name.to_string(),
                    cause: "storage unavailable".into(),
                });
            }
            self.inner.upload(name, bytes, content_type).await
        }

        async fn public_url(&self, name: &str) -> Result<String, DocumentError> {
            self.inner.public_url(name).await
        }
    }

    /// Document store whose uploads never finish in time.
    struct StalledDocumentStore;

    #[async_trait]
    impl DocumentStore for StalledDocumentStore {
        async fn upload(&self, _name: &str, _bytes: Vec<u8>, _content_type: &str) -> Result<(), DocumentError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }

        async fn public_url(&self, name: &str) -> Result<String, DocumentError> {
            Ok(format!("{}/{}", FILES, name))
        }
    }

    /// Notification sink that always rejects.
    struct RejectingSink;

    #[async_trait]
    impl NotificationSink for RejectingSink {
        async fn notify(&self, _event: &ApprovalEvent) -> Result<(), NotificationError> {
            Err(NotificationError::Rejected(503))
        }
    }

    fn key() -> InvoiceKey {
        InvoiceKey::new("5550100", "INV-7")
    }

    /// Draft invoice holding the two rows Bolt (10 x 2.50) and Nut (5 x 1).
    fn stored_invoice() -> Invoice {
        Invoice {
            dealer: "acme traders".to_string(),
            invoice_date: "12 mar 2024".to_string(),
            product_names: Some(json!("[\"Bolt\",\"Nut\"]")),
            descriptions: Some(json!("[\"\",\"hex\"]")),
            quantities: Some(json!("[\"10\",\"5\"]")),
            units: Some(json!("[\"pcs\",\"pcs\"]")),
            rates: Some(json!("[\"2.50\",\"1\"]")),
            pdf_url: Some("https://files.example.com/invoices/old.pdf".to_string()),
            ..Invoice::draft(key())
        }
    }

    async fn seeded_store() -> (MemoryInvoiceStore, Invoice) {
        let store = MemoryInvoiceStore::new();
        store.insert(stored_invoice()).await;
        let invoice = store.get(&key()).await.expect("Invoice should be stored");
        (store, invoice)
    }

    fn workflow(
        invoices: Arc<dyn InvoiceStore>,
        documents: Arc<dyn DocumentStore>,
        notifier: Arc<dyn NotificationSink>,
    ) -> ApprovalWorkflow {
        ApprovalWorkflow::new(invoices, documents, notifier, Arc::new(PdfRenderer))
    }

    /// Test a full approval.
    ///
    /// This test verifies that:
    /// 1. The invoice is stored as approved with the computed total
    /// 2. The document is uploaded under the invoice's document name
    /// 3. The public link is stored on the invoice
    /// 4. The notification carries the total and link
    #[tokio::test]
    async fn test_approval_runs_every_step() {
        let (store, invoice) = seeded_store().await;
        let documents = MemoryDocumentStore::new(FILES);
        let sink = MemoryNotificationSink::new();
        let workflow = workflow(
            Arc::new(store.clone()),
            Arc::new(documents.clone()),
            Arc::new(sink.clone()),
        );

        let report = workflow.approve(&invoice).await.expect("Approval should succeed");

        let expected_url = "https://files.example.com/invoices/invoice_5550100_INV-7.pdf";
        assert_eq!(report.state, ApprovalState::Notified);
        assert_eq!(report.status, InvoiceStatus::Approved);
        assert_eq!(report.total, Decimal::new(30, 0));
        assert_eq!(report.pdf_url, expected_url);
        assert_eq!(report.notification, NotificationOutcome::Delivered);

        let stored = store.get(&key()).await.unwrap();
        assert_eq!(stored.status, InvoiceStatus::Approved);
        assert_eq!(stored.total, Decimal::new(30, 0));
        assert_eq!(stored.amount, Decimal::new(30, 0));
        assert_eq!(stored.pdf_url.as_deref(), Some(expected_url));

        let pdf = documents
            .get("invoice_5550100_INV-7.pdf")
            .await
            .expect("Document should be uploaded");
        assert!(pdf.starts_with(b"%PDF"));

        let events = sink.events().await;
        assert_eq!(
            events,
            vec![ApprovalEvent::invoice_approved(&key(), Decimal::new(30, 0), expected_url)]
        );
    }

    /// Test an upload failure followed by a retry.
    ///
    /// The invoice stays approved with its previous link after the failed
    /// upload. Running the approval again completes it.
    #[tokio::test]
    async fn test_upload_failure_leaves_stale_link_until_retry() {
        let (store, invoice) = seeded_store().await;
        let documents = MemoryDocumentStore::new(FILES);
        let sink = MemoryNotificationSink::new();
        let workflow = workflow(
            Arc::new(store.clone()),
            Arc::new(FlakyDocumentStore::new(documents.clone(), 1)),
            Arc::new(sink.clone()),
        );

        let err = workflow.approve(&invoice).await.unwrap_err();
        assert!(matches!(err, ApprovalError::Upload(DocumentError::Upload { .. })));
        assert_eq!(err.phase(), "upload");
        assert_eq!(err.halted_at(), ApprovalState::DocumentRendered);

        let stored = store.get(&key()).await.unwrap();
        assert_eq!(stored.status, InvoiceStatus::Approved);
        assert_eq!(stored.total, Decimal::new(30, 0));
        assert_eq!(
            stored.pdf_url.as_deref(),
            Some("https://files.example.com/invoices/old.pdf")
        );
        assert_eq!(documents.len().await, 0);
        assert!(sink.events().await.is_empty());

        let report = workflow.approve(&stored).await.expect("Retry should succeed");
        assert_eq!(report.state, ApprovalState::Notified);
        assert_eq!(
            store.get(&key()).await.unwrap().pdf_url.as_deref(),
            Some("https://files.example.com/invoices/invoice_5550100_INV-7.pdf")
        );
        assert_eq!(documents.len().await, 1);
        assert_eq!(sink.events().await.len(), 1);
    }

    #[tokio::test]
    async fn test_status_failure_changes_nothing() {
        let (store, invoice) = seeded_store().await;
        let documents = MemoryDocumentStore::new(FILES);
        let workflow = workflow(
            Arc::new(OfflineStore(store.clone())),
            Arc::new(documents.clone()),
            Arc::new(MemoryNotificationSink::new()),
        );

        let err = workflow.approve(&invoice).await.unwrap_err();
        assert!(matches!(err, ApprovalError::StatusPersistence(_)));
        assert!(!err.leaves_partial_approval());

        assert_eq!(store.get(&key()).await.unwrap().status, InvoiceStatus::Draft);
        assert_eq!(documents.len().await, 0);
    }

    #[tokio::test]
    async fn test_link_failure_keeps_uploaded_document() {
        let (store, invoice) = seeded_store().await;
        let documents = MemoryDocumentStore::new(FILES);
        let workflow = workflow(
            Arc::new(LinkRejectingStore(store.clone())),
            Arc::new(documents.clone()),
            Arc::new(MemoryNotificationSink::new()),
        );

        let err = workflow.approve(&invoice).await.unwrap_err();
        assert!(matches!(err, ApprovalError::LinkPersistence(_)));
        assert_eq!(err.phase(), "link");

        let stored = store.get(&key()).await.unwrap();
        assert_eq!(stored.status, InvoiceStatus::Approved);
        assert_eq!(
            stored.pdf_url.as_deref(),
            Some("https://files.example.com/invoices/old.pdf")
        );
        assert_eq!(documents.len().await, 1);
    }

    #[tokio::test]
    async fn test_ignored_notification_failure_still_approves() {
        let (store, invoice) = seeded_store().await;
        let workflow = workflow(
            Arc::new(store.clone()),
            Arc::new(MemoryDocumentStore::new(FILES)),
            Arc::new(RejectingSink),
        );

        let report = workflow.approve(&invoice).await.expect("Approval should succeed");
        assert_eq!(report.state, ApprovalState::LinkPersisted);
        assert!(matches!(report.notification, NotificationOutcome::Failed { .. }));
        assert!(store.get(&key()).await.unwrap().pdf_url.is_some());
    }

    #[tokio::test]
    async fn test_notification_failure_fails_when_configured() {
        let (store, invoice) = seeded_store().await;
        let workflow = workflow(
            Arc::new(store.clone()),
            Arc::new(MemoryDocumentStore::new(FILES)),
            Arc::new(RejectingSink),
        )
        .with_notify_failure_policy(NotifyFailurePolicy::Fail);

        let err = workflow.approve(&invoice).await.unwrap_err();
        assert!(matches!(
            err,
            ApprovalError::Notification(NotificationError::Rejected(503))
        ));
        assert_eq!(err.phase(), "notify");

        // Everything before the notification stays in effect.
        let stored = store.get(&key()).await.unwrap();
        assert_eq!(stored.status, InvoiceStatus::Approved);
        assert_eq!(
            stored.pdf_url.as_deref(),
            Some("https://files.example.com/invoices/invoice_5550100_INV-7.pdf")
        );
    }

    #[tokio::test]
    async fn test_stalled_upload_times_out() {
        let (store, invoice) = seeded_store().await;
        let workflow = workflow(
            Arc::new(store.clone()),
            Arc::new(StalledDocumentStore),
            Arc::new(MemoryNotificationSink::new()),
        )
        .with_step_timeout(Duration::from_millis(50));

        let err = workflow.approve(&invoice).await.unwrap_err();
        assert!(matches!(
            err,
            ApprovalError::Upload(DocumentError::Timeout { .. })
        ));
        assert_eq!(store.get(&key()).await.unwrap().status, InvoiceStatus::Approved);
    }

    #[tokio::test]
    async fn test_approving_invoice_without_rows() {
        let store = MemoryInvoiceStore::new();
        store.insert(Invoice::draft(key())).await;
        let invoice = store.get(&key()).await.unwrap();
        let workflow = workflow(
            Arc::new(store.clone()),
            Arc::new(MemoryDocumentStore::new(FILES)),
            Arc::new(MemoryNotificationSink::new()),
        );

        let report = workflow.approve(&invoice).await.expect("Approval should succeed");
        assert_eq!(report.total, Decimal::ZERO);
        assert_eq!(store.get(&key()).await.unwrap().amount, Decimal::ZERO);
    }

    /// Invoice numbers containing `/` approve against the local document
    /// store, and the stored link resolves to the uploaded file.
    #[tokio::test]
    async fn test_approving_invoice_number_with_slashes() {
        let slashed = InvoiceKey::new("5550100", "INV/2024/7");
        let store = MemoryInvoiceStore::new();
        store
            .insert(Invoice {
                quantities: Some(json!("[\"2\"]")),
                rates: Some(json!("[\"4\"]")),
                ..Invoice::draft(slashed.clone())
            })
            .await;
        let invoice = store.get(&slashed).await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let documents = LocalDocumentStore::new(dir.path(), "http://localhost:3000/documents")
            .await
            .unwrap();
        let workflow = workflow(
            Arc::new(store.clone()),
            Arc::new(documents),
            Arc::new(MemoryNotificationSink::new()),
        );

        let report = workflow.approve(&invoice).await.expect("Approval should succeed");
        assert_eq!(report.state, ApprovalState::Notified);
        assert_eq!(
            report.pdf_url,
            "http://localhost:3000/documents/invoice_5550100_INV%252F2024%252F7.pdf"
        );
        assert!(dir.path().join("invoice_5550100_INV%2F2024%2F7.pdf").is_file());
        assert_eq!(
            store.get(&slashed).await.unwrap().pdf_url.as_deref(),
            Some(report.pdf_url.as_str())
        );
    }

    #[tokio::test]
    async fn test_approving_oversized_amounts() {
        let store = MemoryInvoiceStore::new();
        store
            .insert(Invoice {
                product_names: Some(json!("[\"Big\",\"Bigger\"]")),
                quantities: Some(json!("[\"1e15\",\"5e28\"]")),
                rates: Some(json!("[\"1e15\",\"1\"]")),
                ..Invoice::draft(key())
            })
            .await;
        let invoice = store.get(&key()).await.unwrap();
        let workflow = workflow(
            Arc::new(store.clone()),
            Arc::new(MemoryDocumentStore::new(FILES)),
            Arc::new(MemoryNotificationSink::new()),
        );

        let report = workflow.approve(&invoice).await.expect("Approval should succeed");
        assert_eq!(report.total, Decimal::MAX);
        assert_eq!(store.get(&key()).await.unwrap().amount, Decimal::MAX);
    }

    #[test]
    fn test_notify_failure_policy_parsing() {
        assert_eq!("ignore".parse::<NotifyFailurePolicy>().unwrap(), NotifyFailurePolicy::Ignore);
        assert_eq!(" FAIL ".parse::<NotifyFailurePolicy>().unwrap(), NotifyFailurePolicy::Fail);
        assert!("retry".parse::<NotifyFailurePolicy>().is_err());
    }
}
