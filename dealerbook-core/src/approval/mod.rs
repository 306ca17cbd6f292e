pub mod document;
pub mod executor;
pub mod state_machine;

#[cfg(test)]
mod tests;

pub use document::{DocumentRenderer, InvoiceDocument, PdfRenderer};
pub use executor::{
    ApprovalReport, ApprovalWorkflow, NotificationOutcome, NotifyFailurePolicy,
    DEFAULT_STEP_TIMEOUT,
};
pub use state_machine::{ApprovalAction, ApprovalState, ApprovalStateMachine, Transition};
