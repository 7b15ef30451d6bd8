mod coordinator;
mod payload;
mod queue;

pub use coordinator::{REFRESH_PATH, RefreshCoordinator, RefreshState};
pub use payload::{RefreshGrant, RefreshRequest};
pub use queue::{Drained, PendingRequest, RefreshResult, RequestQueue};
