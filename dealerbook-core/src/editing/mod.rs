pub mod save;
pub mod session;

pub use save::SaveWorkflow;
pub use session::EditSession;
