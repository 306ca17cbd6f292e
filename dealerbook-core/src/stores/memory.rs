use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{DocumentError, NotificationError, StoreError};
use crate::models::invoice::{Invoice, InvoiceFilter, InvoiceKey, InvoiceOrder, InvoiceUpdate};
use crate::stores::{ApprovalEvent, DocumentStore, InvoiceStore, NotificationSink};

/// In-memory invoice store.
///
/// Row ids are assigned on insert. Updates and deletes apply to every
/// invoice matching the key, the way a keyed `UPDATE` does.
#[derive(Clone, Default)]
pub struct MemoryInvoiceStore {
    invoices: Arc<RwLock<Vec<Invoice>>>,
}

impl MemoryInvoiceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an invoice, assigning the next row id. Returns the row id.
    pub async fn insert(&self, mut invoice: Invoice) -> i64 {
        let mut invoices = self.invoices.write().await;
        let row_id = invoices.iter().filter_map(|i| i.row_id).max().unwrap_or(0) + 1;
        invoice.row_id = Some(row_id);
        invoices.push(invoice);
        row_id
    }

    /// Snapshot of the stored invoice for `key`, if any.
    pub async fn get(&self, key: &InvoiceKey) -> Option<Invoice> {
        let invoices = self.invoices.read().await;
        invoices
            .iter()
            .find(|i| i.phone_number == key.phone_number && i.invoice_number == key.invoice_number)
            .cloned()
    }
}

#[async_trait]
impl InvoiceStore for MemoryInvoiceStore {
    async fn query(&self, filter: &InvoiceFilter) -> Result<Vec<Invoice>, StoreError> {
        let invoices = self.invoices.read().await;
        let mut found: Vec<Invoice> = invoices.iter().filter(|i| filter.matches(i)).cloned().collect();
        if filter.order == InvoiceOrder::RowIdDescending {
            found.sort_by(|a, b| b.row_id.cmp(&a.row_id));
        }
        Ok(found)
    }

    async fn update(&self, key: &InvoiceKey, fields: &InvoiceUpdate) -> Result<(), StoreError> {
        let filter = InvoiceFilter::by_key(key);
        let mut invoices = self.invoices.write().await;
        for invoice in invoices.iter_mut().filter(|i| filter.matches(i)) {
            invoice.apply(fields);
        }
        Ok(())
    }

    async fn delete(&self, key: &InvoiceKey) -> Result<(), StoreError> {
        let filter = InvoiceFilter::by_key(key);
        self.invoices.write().await.retain(|i| !filter.matches(i));
        Ok(())
    }

    async fn phone_numbers(&self) -> Result<Vec<String>, StoreError> {
        let invoices = self.invoices.read().await;
        let phones: BTreeSet<String> = invoices
            .iter()
            .filter(|i| !i.phone_number.is_empty())
            .map(|i| i.phone_number.clone())
            .collect();
        Ok(phones.into_iter().collect())
    }
}

/// In-memory document store with overwrite semantics.
#[derive(Clone)]
pub struct MemoryDocumentStore {
    base_url: String,
    documents: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryDocumentStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            documents: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    pub async fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.documents.read().await.get(name).cloned()
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn upload(
        &self,
        name: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), DocumentError> {
        self.documents.write().await.insert(name.to_string(), bytes);
        Ok(())
    }

    async fn public_url(&self, name: &str) -> Result<String, DocumentError> {
        Ok(format!("{}/{}", self.base_url.trim_end_matches('/'), name))
    }
}

/// Notification sink that records every event it receives.
#[derive(Clone, Default)]
pub struct MemoryNotificationSink {
    events: Arc<RwLock<Vec<ApprovalEvent>>>,
}

impl MemoryNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<ApprovalEvent> {
        self.events.read().await.clone()
    }
}

#[async_trait]
impl NotificationSink for MemoryNotificationSink {
    async fn notify(&self, event: &ApprovalEvent) -> Result<(), NotificationError> {
        self.events.write().await.push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::invoice::InvoiceStatus;
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn test_insert_query_update_delete() {
        let store = MemoryInvoiceStore::new();
        let first = store.insert(Invoice::draft(InvoiceKey::new("5550100", "INV-1"))).await;
        let second = store.insert(Invoice::draft(InvoiceKey::new("5550100", "INV-2"))).await;
        store.insert(Invoice::draft(InvoiceKey::new("5550199", "INV-1"))).await;
        assert_eq!((first, second), (1, 2));

        let newest_first = store
            .query(&InvoiceFilter {
                phone_number: Some("5550100".to_string()),
                order: InvoiceOrder::RowIdDescending,
                ..InvoiceFilter::default()
            })
            .await
            .unwrap();
        let numbers: Vec<&str> = newest_first.iter().map(|i| i.invoice_number.as_str()).collect();
        assert_eq!(numbers, vec!["INV-2", "INV-1"]);

        let key = InvoiceKey::new("5550100", "INV-1");
        store
            .update(&key, &InvoiceUpdate::approval(Decimal::new(12, 0)))
            .await
            .unwrap();
        let updated = store.get(&key).await.unwrap();
        assert_eq!(updated.status, InvoiceStatus::Approved);
        assert_eq!(updated.amount, Decimal::new(12, 0));

        store.delete(&key).await.unwrap();
        assert!(store.get(&key).await.is_none());
        assert_eq!(store.phone_numbers().await.unwrap(), vec!["5550100", "5550199"]);
    }

    #[tokio::test]
    async fn test_document_store_overwrites() {
        let store = MemoryDocumentStore::new("https://files.example.com/");
        store.upload("a.pdf", vec![1], "application/pdf").await.unwrap();
        store.upload("a.pdf", vec![2], "application/pdf").await.unwrap();

        assert_eq!(store.get("a.pdf").await, Some(vec![2]));
        assert_eq!(store.len().await, 1);
        assert_eq!(
            store.public_url("a.pdf").await.unwrap(),
            "https://files.example.com/a.pdf"
        );
    }
}
