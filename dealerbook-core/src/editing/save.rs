use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::approval::executor::DEFAULT_STEP_TIMEOUT;
use crate::editing::session::EditSession;
use crate::error::{SaveError, StoreError, StoreOperation};
use crate::lines::codec::encode;
use crate::lines::totals::{format_fixed, total};
use crate::models::invoice::{Invoice, InvoiceFilter, InvoiceUpdate};
use crate::models::line_item::LineItem;
use crate::stores::InvoiceStore;

/// Writes edit sessions back to the invoice store.
pub struct SaveWorkflow {
    invoices: Arc<dyn InvoiceStore>,
    timeout: Duration,
}

impl SaveWorkflow {
    pub fn new(invoices: Arc<dyn InvoiceStore>) -> Self {
        Self {
            invoices,
            timeout: DEFAULT_STEP_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Commits a session as a draft.
    ///
    /// Blank rows are dropped, the remaining rows are re-encoded and the total
    /// recomputed. Header, rows, total and amount are written in a single
    /// update keyed by the session's original identity, and the status is
    /// forced back to `DRAFT` even when the invoice was approved. The stored
    /// document link is left untouched.
    ///
    /// # Returns
    ///
    /// Returns the invoice read back from the store after the update, so a
    /// document link written by a concurrent approval is reported as stored.
    /// If that read fails the invoice is rebuilt from the session instead.
    ///
    /// On failure the session can be committed again. A timed-out write may
    /// still have reached the store; committing again writes the same fields.
    pub async fn commit(&self, session: &EditSession) -> Result<Invoice, SaveError> {
        let key = session.key();
        let rows: Vec<LineItem> = session
            .rows()
            .iter()
            .filter(|row| !row.is_blank())
            .cloned()
            .collect();
        let encoded = encode(&rows);
        let total = total(&rows);

        let update = InvoiceUpdate::draft(session.header().clone(), encoded, total);
        let outcome = tokio::time::timeout(self.timeout, self.invoices.update(key, &update)).await;
        let result = match outcome {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout {
                operation: StoreOperation::Update,
                timeout: self.timeout,
            }),
        };

        if let Err(e) = result {
            error!("Failed to save invoice {}: {}", key, e);
            return Err(SaveError::Persistence(e));
        }

        info!(
            "Saved invoice {} as draft ({} row(s), total {})",
            key,
            rows.len(),
            format_fixed(total)
        );

        let mut saved = Invoice::draft(key.clone());
        saved.row_id = session.row_id();
        saved.pdf_url = session.pdf_url().map(str::to_string);
        saved.apply(&update);

        let filter = InvoiceFilter::by_key(&saved.key());
        match tokio::time::timeout(self.timeout, self.invoices.query(&filter)).await {
            Ok(Ok(found)) => match found.into_iter().next() {
                Some(stored) => Ok(stored),
                None => {
                    warn!("Saved invoice {} could not be read back", saved.key());
                    Ok(saved)
                }
            },
            Ok(Err(e)) => {
                warn!("Failed to read back saved invoice {}: {}", saved.key(), e);
                Ok(saved)
            }
            Err(_) => {
                warn!("Timed out reading back saved invoice {}", saved.key());
                Ok(saved)
            }
        }
    }
}
