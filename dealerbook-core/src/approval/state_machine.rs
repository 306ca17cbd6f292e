use serde::{Deserialize, Serialize};
use std::fmt;

/// Approval state enumeration representing the stages of invoice approval.
///
/// The state machine progresses through these states:
/// - Initiated: totals computed, nothing written yet
/// - StatusPersisted: invoice stored as approved with its frozen total
/// - DocumentRendered: invoice document produced in memory
/// - DocumentUploaded: document stored under the invoice's document name
/// - LinkPersisted: public document link stored on the invoice
/// - Notified: external system informed (terminal state)
///
/// A failed step leaves the workflow in the state it had reached; earlier
/// steps are never undone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalState {
    Initiated,
    StatusPersisted,
    DocumentRendered,
    DocumentUploaded,
    LinkPersisted,
    Notified,
}

impl fmt::Display for ApprovalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApprovalState::Initiated => write!(f, "initiated"),
            ApprovalState::StatusPersisted => write!(f, "status_persisted"),
            ApprovalState::DocumentRendered => write!(f, "document_rendered"),
            ApprovalState::DocumentUploaded => write!(f, "document_uploaded"),
            ApprovalState::LinkPersisted => write!(f, "link_persisted"),
            ApprovalState::Notified => write!(f, "notified"),
        }
    }
}

/// Side effect performed to leave a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalAction {
    /// Write status, total and amount to the invoice store
    PersistStatus,

    /// Render the approved invoice document
    RenderDocument,

    /// Upload the document, overwriting any previous one
    UploadDocument,

    /// Resolve the public link and write it to the invoice store
    PersistLink,

    /// Send the approval event to the notification sink
    Notify,
}

impl fmt::Display for ApprovalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApprovalAction::PersistStatus => write!(f, "persist_status"),
            ApprovalAction::RenderDocument => write!(f, "render_document"),
            ApprovalAction::UploadDocument => write!(f, "upload_document"),
            ApprovalAction::PersistLink => write!(f, "persist_link"),
            ApprovalAction::Notify => write!(f, "notify"),
        }
    }
}

/// Trait for state transitions in the approval state machine.
pub trait Transition {
    /// Determines the action that leaves `current_state` and the state
    /// reached once it succeeds.
    ///
    /// # Returns
    ///
    /// Returns `None` for the terminal state.
    fn transition(current_state: ApprovalState) -> Option<(ApprovalState, ApprovalAction)>;

    /// Gets the state every approval starts in.
    fn initial_state() -> ApprovalState {
        ApprovalState::Initiated
    }
}

/// Default implementation of the Transition trait for invoice approval.
///
/// The steps run strictly in order:
/// Initiated -> StatusPersisted -> DocumentRendered -> DocumentUploaded
/// -> LinkPersisted -> Notified
pub struct ApprovalStateMachine;

impl Transition for ApprovalStateMachine {
    fn transition(current_state: ApprovalState) -> Option<(ApprovalState, ApprovalAction)> {
        match current_state {
            ApprovalState::Initiated => {
                Some((ApprovalState::StatusPersisted, ApprovalAction::PersistStatus))
            }
            ApprovalState::StatusPersisted => {
                Some((ApprovalState::DocumentRendered, ApprovalAction::RenderDocument))
            }
            ApprovalState::DocumentRendered => {
                Some((ApprovalState::DocumentUploaded, ApprovalAction::UploadDocument))
            }
            ApprovalState::DocumentUploaded => {
                Some((ApprovalState::LinkPersisted, ApprovalAction::PersistLink))
            }
            ApprovalState::LinkPersisted => Some((ApprovalState::Notified, ApprovalAction::Notify)),
            ApprovalState::Notified => None,
        }
    }
}
