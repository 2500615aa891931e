pub mod collection;
pub mod status;

pub use collection::EmailCollection;
pub use status::{OperationGuard, OperationKind, OperationState, StatusSnapshot};
