//! Synchronous platform queries the core depends on.

use crate::catalog::Permission;

/// Read-only view of the platform's permission state.
pub trait PermissionPlatform: Send + Sync {
    /// Whether `permission` is currently granted.
    fn is_granted(&self, permission: Permission) -> bool;

    /// The platform's "should explain" signal for `permission`.
    fn should_show_rationale(&self, permission: Permission) -> bool;

    /// Send the user to the app's system settings page, where permanently
    /// denied permissions can still be granted by hand.
    fn open_app_settings(&self) {}
}

/// `true` if every permission in `permissions` is currently granted.
pub fn is_all_granted(platform: &dyn PermissionPlatform, permissions: &[Permission]) -> bool {
    permissions.iter().all(|p| platform.is_granted(*p))
}
