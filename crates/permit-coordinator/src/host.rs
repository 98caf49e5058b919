//! Host container binding.
//!
//! Only a prompt surface may launch the platform permission dialog and
//! receive its answer. The host creates and attaches one on demand; the
//! coordinator keeps it while requests are outstanding and detaches it once
//! the queue drains.

use std::sync::Arc;

use permit_core::Permission;

use crate::permission::HostError;

/// The UI container that can host a prompt surface.
///
/// Concrete adapters exist per UI framework and are chosen when the
/// coordinator is built.
pub trait PermissionHost: Send + Sync {
    /// Create a surface and attach it to the UI tree.
    ///
    /// Called only when the coordinator holds no surface.
    fn attach(&self) -> Result<Arc<dyn PromptSurface>, HostError>;
}

/// Invisible surface that owns the platform dialog.
pub trait PromptSurface: Send + Sync {
    /// Launch the platform dialog for `permissions`.
    ///
    /// Must return without waiting for the user. The answer is delivered
    /// later through
    /// [`PermissionCoordinator::on_platform_response`](crate::PermissionCoordinator::on_platform_response).
    fn dispatch(&self, permissions: &[Permission], request_code: i32);

    /// Remove the surface from the UI tree.
    fn detach(&self);
}
