use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::approval::state_machine::ApprovalState;

/// Boxed error used as the `cause` of collaborator failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Invoice store operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOperation {
    Query,
    Update,
    Delete,
    PhoneNumbers,
}

impl fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreOperation::Query => write!(f, "query"),
            StoreOperation::Update => write!(f, "update"),
            StoreOperation::Delete => write!(f, "delete"),
            StoreOperation::PhoneNumbers => write!(f, "phone_numbers"),
        }
    }
}

/// Failure reported by an `InvoiceStore`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invoice store {operation} failed: {cause}")]
    Operation {
        operation: StoreOperation,
        #[source]
        cause: BoxError,
    },

    #[error("invoice store {operation} timed out after {timeout:?}")]
    Timeout {
        operation: StoreOperation,
        timeout: Duration,
    },
}

impl StoreError {
    pub fn new(operation: StoreOperation, cause: impl Into<BoxError>) -> Self {
        StoreError::Operation {
            operation,
            cause: cause.into(),
        }
    }

    pub fn operation(&self) -> StoreOperation {
        match self {
            StoreError::Operation { operation, .. } | StoreError::Timeout { operation, .. } => {
                *operation
            }
        }
    }
}

/// Failure reported by a `DocumentStore`.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("upload of {name} failed: {cause}")]
    Upload {
        name: String,
        #[source]
        cause: BoxError,
    },

    #[error("public url for {name} unavailable: {cause}")]
    PublicUrl {
        name: String,
        #[source]
        cause: BoxError,
    },

    #[error("document store call for {name} timed out after {timeout:?}")]
    Timeout { name: String, timeout: Duration },
}

/// Failure reported by a `NotificationSink`.
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("notification delivery failed: {0}")]
    Delivery(#[source] BoxError),

    #[error("notification rejected with HTTP status {0}")]
    Rejected(u16),

    #[error("notification timed out after {0:?}")]
    Timeout(Duration),
}

/// Failure reported by a `DocumentRenderer`.
#[derive(Debug, Error)]
#[error("document rendering failed: {0}")]
pub struct RenderError(pub String);

/// Errors raised by `EditSession` operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("row index {index} is out of range for {len} row(s)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("unknown field: {0}")]
    UnknownField(String),
}

/// Errors raised by the save workflow.
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("saving invoice draft failed: {0}")]
    Persistence(#[source] StoreError),
}

/// Errors raised by the approval workflow.
///
/// Every variant names the phase that failed. Steps that succeeded before the
/// failure are not rolled back, so the stored invoice may already read
/// `APPROVED` while its document link is stale or missing.
#[derive(Debug, Error)]
pub enum ApprovalError {
    #[error("approval status could not be persisted: {0}")]
    StatusPersistence(#[source] StoreError),

    #[error("invoice document could not be rendered: {0}")]
    Render(#[source] RenderError),

    #[error("invoice document upload failed: {0}")]
    Upload(#[source] DocumentError),

    #[error("document link could not be resolved: {0}")]
    LinkResolution(#[source] DocumentError),

    #[error("document link could not be persisted: {0}")]
    LinkPersistence(#[source] StoreError),

    #[error("approval notification failed: {0}")]
    Notification(#[source] NotificationError),
}

impl ApprovalError {
    /// Short name of the failed phase, as reported to operators.
    pub fn phase(&self) -> &'static str {
        match self {
            ApprovalError::StatusPersistence(_) => "status",
            ApprovalError::Render(_) => "render",
            ApprovalError::Upload(_) => "upload",
            ApprovalError::LinkResolution(_) | ApprovalError::LinkPersistence(_) => "link",
            ApprovalError::Notification(_) => "notify",
        }
    }

    /// The state the workflow had reached when it halted.
    pub fn halted_at(&self) -> ApprovalState {
        match self {
            ApprovalError::StatusPersistence(_) => ApprovalState::Initiated,
            ApprovalError::Render(_) => ApprovalState::StatusPersisted,
            ApprovalError::Upload(_) => ApprovalState::DocumentRendered,
            ApprovalError::LinkResolution(_) | ApprovalError::LinkPersistence(_) => {
                ApprovalState::DocumentUploaded
            }
            ApprovalError::Notification(_) => ApprovalState::LinkPersisted,
        }
    }

    /// Whether the stored invoice may already show `APPROVED` without a fresh link.
    pub fn leaves_partial_approval(&self) -> bool {
        !matches!(self, ApprovalError::StatusPersistence(_))
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}
