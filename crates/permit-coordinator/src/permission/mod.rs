//! Permission request queue.
//!
//! Keeps exactly one platform dialog in flight and routes its answer back to
//! every caller that asked for the same permissions.

mod coordinator;
mod pending;
mod types;

pub use coordinator::PermissionCoordinator;
pub use pending::{PendingRequest, PermissionSet, ResultReceiver};
pub use types::{
    HostError, PermissionError, PlatformResponse, QueueSnapshot, RequestSummary,
};
