use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DocumentError, NotificationError, StoreError};
use crate::models::invoice::{Invoice, InvoiceFilter, InvoiceKey, InvoiceUpdate};

pub mod documents;
pub mod memory;
pub mod notify;
pub mod pg;

pub use documents::{HttpObjectStore, LocalDocumentStore};
pub use memory::{MemoryDocumentStore, MemoryInvoiceStore, MemoryNotificationSink};
pub use notify::{DisabledNotificationSink, WebhookNotificationSink};
pub use pg::PgInvoiceStore;

/// Content type of every rendered invoice document.
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Persistence for invoices.
#[async_trait]
pub trait InvoiceStore: Send + Sync {
    /// Returns the invoices matching the filter.
    async fn query(&self, filter: &InvoiceFilter) -> Result<Vec<Invoice>, StoreError>;

    /// Applies the set fields of `fields` to the invoice identified by `key`.
    async fn update(&self, key: &InvoiceKey, fields: &InvoiceUpdate) -> Result<(), StoreError>;

    /// Deletes the invoice identified by `key`.
    async fn delete(&self, key: &InvoiceKey) -> Result<(), StoreError>;

    /// Distinct phone numbers that own at least one invoice.
    async fn phone_numbers(&self) -> Result<Vec<String>, StoreError>;
}

/// Object storage for rendered documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Stores `bytes` under `name`, replacing any existing document.
    async fn upload(&self, name: &str, bytes: Vec<u8>, content_type: &str)
        -> Result<(), DocumentError>;

    /// Public retrieval URL of the document stored under `name`.
    async fn public_url(&self, name: &str) -> Result<String, DocumentError>;
}

/// Approval event delivered to the notification sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalEvent {
    pub event: String,
    pub invoice_number: String,
    pub phone_number: String,
    pub total: Decimal,
    pub pdf_url: String,
}

impl ApprovalEvent {
    pub const INVOICE_APPROVED: &'static str = "invoice_approved";

    pub fn invoice_approved(key: &InvoiceKey, total: Decimal, pdf_url: impl Into<String>) -> Self {
        Self {
            event: Self::INVOICE_APPROVED.to_string(),
            invoice_number: key.invoice_number.clone(),
            phone_number: key.phone_number.clone(),
            total,
            pdf_url: pdf_url.into(),
        }
    }
}

/// External system told about approvals.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, event: &ApprovalEvent) -> Result<(), NotificationError>;
}
