//! permit Coordinator Library
//!
//! Request coordination for runtime permissions:
//! - A single queue that keeps one platform dialog in flight at a time
//! - Fan-out of one platform answer to every matching caller
//! - Rationale handling with nested one-permission sub-requests
//! - Host binding for the surface that owns the platform dialog

pub mod host;
pub mod permission;
pub mod rationale;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use host::{PermissionHost, PromptSurface};
pub use permission::{
    HostError, PermissionCoordinator, PermissionError, PermissionSet, PlatformResponse,
    QueueSnapshot, ResultReceiver,
};
pub use rationale::{ConfirmCallback, RationaleHandler, RationaleHandlerBuilder, RationalePresenter};
