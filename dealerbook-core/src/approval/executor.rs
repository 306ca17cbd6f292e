use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::approval::document::{DocumentRenderer, InvoiceDocument};
use crate::approval::state_machine::{
    ApprovalAction, ApprovalState, ApprovalStateMachine, Transition,
};
use crate::error::{
    ApprovalError, ConfigError, DocumentError, NotificationError, StoreError, StoreOperation,
};
use crate::lines::codec::decode;
use crate::lines::totals::{format_fixed, total};
use crate::models::invoice::{Invoice, InvoiceKey, InvoiceStatus, InvoiceUpdate};
use crate::models::line_item::LineItem;
use crate::stores::{ApprovalEvent, DocumentStore, InvoiceStore, NotificationSink};

/// Bound applied to every external call made by the workflow.
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(30);

/// What to do when the approval notification cannot be delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyFailurePolicy {
    /// Log the failure and report the approval as successful
    #[default]
    Ignore,

    /// Report the approval as failed in the notify phase
    Fail,
}

impl FromStr for NotifyFailurePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ignore" => Ok(NotifyFailurePolicy::Ignore),
            "fail" => Ok(NotifyFailurePolicy::Fail),
            _ => Err(ConfigError::Invalid {
                key: "NOTIFY_FAILURE_POLICY",
                value: s.to_string(),
            }),
        }
    }
}

/// Result of the notification step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NotificationOutcome {
    Delivered,
    Failed { reason: String },
}

/// Summary of a successful approval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalReport {
    /// Identifier of this approval run, as it appears in the logs
    pub run_id: Uuid,

    pub key: InvoiceKey,

    /// Final state: `Notified`, or `LinkPersisted` when a failed
    /// notification was ignored
    pub state: ApprovalState,

    pub status: InvoiceStatus,
    pub total: Decimal,
    pub pdf_url: String,
    pub notification: NotificationOutcome,
    pub completed_at: DateTime<Utc>,
}

/// Values produced by earlier steps and consumed by later ones.
#[derive(Default)]
struct Progress {
    document: Vec<u8>,
    pdf_url: String,
    notification: Option<NotificationOutcome>,
}

/// Executor for the invoice approval workflow.
///
/// Drives the approval state machine, running each step against the injected
/// collaborators. Steps run strictly one after another. A failed step stops
/// the run without undoing earlier steps, so the invoice can be left approved
/// with a stale or missing document link. Every step overwrites what a
/// previous run wrote, which makes rerunning a failed approval safe.
pub struct ApprovalWorkflow {
    invoices: Arc<dyn InvoiceStore>,
    documents: Arc<dyn DocumentStore>,
    notifier: Arc<dyn NotificationSink>,
    renderer: Arc<dyn DocumentRenderer>,
    notify_failure_policy: NotifyFailurePolicy,
    step_timeout: Duration,
}

impl ApprovalWorkflow {
    /// Creates a new approval workflow.
    ///
    /// # Arguments
    ///
    /// * `invoices` - Store holding the invoices
    /// * `documents` - Store receiving the rendered documents
    /// * `notifier` - Sink told about each approval
    /// * `renderer` - Renderer producing the document bytes
    pub fn new(
        invoices: Arc<dyn InvoiceStore>,
        documents: Arc<dyn DocumentStore>,
        notifier: Arc<dyn NotificationSink>,
        renderer: Arc<dyn DocumentRenderer>,
    ) -> Self {
        Self {
            invoices,
            documents,
            notifier,
            renderer,
            notify_failure_policy: NotifyFailurePolicy::default(),
            step_timeout: DEFAULT_STEP_TIMEOUT,
        }
    }

    pub fn with_notify_failure_policy(mut self, policy: NotifyFailurePolicy) -> Self {
        self.notify_failure_policy = policy;
        self
    }

    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = timeout;
        self
    }

    /// Approves an invoice as currently read from the store.
    ///
    /// This function:
    /// 1. Materializes the rows and computes the total
    /// 2. Stores status `APPROVED` with the frozen total
    /// 3. Renders the approved document
    /// 4. Uploads it under the invoice's document name
    /// 5. Stores the document's public link on the invoice
    /// 6. Notifies the external system
    ///
    /// # Errors
    ///
    /// Returns the `ApprovalError` of the first step that failed. Steps that
    /// succeeded before it stay in effect.
    pub async fn approve(&self, invoice: &Invoice) -> Result<ApprovalReport, ApprovalError> {
        let run_id = Uuid::new_v4();
        let key = invoice.key();
        let rows = decode(invoice);
        let total = total(&rows);

        info!(
            "Approval {} started for invoice {} ({} row(s), total {})",
            run_id,
            key,
            rows.len(),
            format_fixed(total)
        );

        let mut state = ApprovalStateMachine::initial_state();
        let mut progress = Progress::default();

        while let Some((next_state, action)) = ApprovalStateMachine::transition(state) {
            let step = match action {
                ApprovalAction::PersistStatus => self.persist_status(&key, total).await,
                ApprovalAction::RenderDocument => self
                    .render_document(invoice, &rows)
                    .map(|bytes| progress.document = bytes),
                ApprovalAction::UploadDocument => {
                    let bytes = std::mem::take(&mut progress.document);
                    self.upload_document(&key, bytes).await
                }
                ApprovalAction::PersistLink => self
                    .persist_link(&key)
                    .await
                    .map(|url| progress.pdf_url = url),
                ApprovalAction::Notify => {
                    let event = ApprovalEvent::invoice_approved(&key, total, &progress.pdf_url);
                    match self.notify(&event).await {
                        Ok(()) => {
                            progress.notification = Some(NotificationOutcome::Delivered);
                            Ok(())
                        }
                        Err(e) if self.notify_failure_policy == NotifyFailurePolicy::Ignore => {
                            warn!(
                                "Approval {}: notification for invoice {} failed and was ignored: {}",
                                run_id, key, e
                            );
                            progress.notification = Some(NotificationOutcome::Failed {
                                reason: e.to_string(),
                            });
                            break;
                        }
                        Err(e) => Err(ApprovalError::Notification(e)),
                    }
                }
            };

            if let Err(e) = step {
                error!(
                    "Approval {} for invoice {} halted in state {} during {}: {}",
                    run_id, key, state, action, e
                );
                if e.leaves_partial_approval() {
                    warn!(
                        "Invoice {} is stored as APPROVED but its document link may be stale or missing",
                        key
                    );
                }
                return Err(e);
            }

            info!(
                "Approval {} for invoice {}: {} -> {} ({})",
                run_id, key, state, next_state, action
            );
            state = next_state;
        }

        info!(
            "Approval {} finished for invoice {} in state {} ({})",
            run_id, key, state, progress.pdf_url
        );

        Ok(ApprovalReport {
            run_id,
            key,
            state,
            status: InvoiceStatus::Approved,
            total,
            pdf_url: progress.pdf_url,
            notification: progress
                .notification
                .unwrap_or(NotificationOutcome::Delivered),
            completed_at: Utc::now(),
        })
    }

    /// Runs `call` bounded by the step timeout.
    async fn bounded<T, E>(
        &self,
        call: impl Future<Output = Result<T, E>>,
        on_timeout: impl FnOnce(Duration) -> E,
    ) -> Result<T, E> {
        match tokio::time::timeout(self.step_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(on_timeout(self.step_timeout)),
        }
    }

    async fn persist_status(&self, key: &InvoiceKey, total: Decimal) -> Result<(), ApprovalError> {
        let update = InvoiceUpdate::approval(total);
        self.bounded(self.invoices.update(key, &update), |timeout| {
            StoreError::Timeout {
                operation: StoreOperation::Update,
                timeout,
            }
        })
        .await
        .map_err(ApprovalError::StatusPersistence)
    }

    fn render_document(&self, invoice: &Invoice, rows: &[LineItem]) -> Result<Vec<u8>, ApprovalError> {
        let mut approved = invoice.display_normalized();
        approved.status = InvoiceStatus::Approved;

        let document = InvoiceDocument::build(&approved, rows);
        self.renderer.render(&document).map_err(ApprovalError::Render)
    }

    async fn upload_document(&self, key: &InvoiceKey, bytes: Vec<u8>) -> Result<(), ApprovalError> {
        let name = key.document_name();
        let content_type = self.renderer.content_type();
        self.bounded(self.documents.upload(&name, bytes, content_type), |timeout| {
            DocumentError::Timeout {
                name: name.clone(),
                timeout,
            }
        })
        .await
        .map_err(ApprovalError::Upload)
    }

    async fn persist_link(&self, key: &InvoiceKey) -> Result<String, ApprovalError> {
        let name = key.document_name();
        let url = self
            .bounded(self.documents.public_url(&name), |timeout| DocumentError::Timeout {
                name: name.clone(),
                timeout,
            })
            .await
            .map_err(ApprovalError::LinkResolution)?;

        let update = InvoiceUpdate::document_link(url.clone());
        self.bounded(self.invoices.update(key, &update), |timeout| {
            StoreError::Timeout {
                operation: StoreOperation::Update,
                timeout,
            }
        })
        .await
        .map_err(ApprovalError::LinkPersistence)?;

        Ok(url)
    }

    async fn notify(&self, event: &ApprovalEvent) -> Result<(), NotificationError> {
        self.bounded(self.notifier.notify(event), NotificationError::Timeout)
            .await
    }
}
