//! Rationale oracle.
//!
//! The platform's "should explain" signal starts out `false`, turns `true`
//! after the first denial and drops back to `false` once the user picks
//! "don't ask again". Seeing it fall back to `false` after it was `true` is
//! the only reliable permanent-denial signal, so every `true` is persisted.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::catalog::Permission;
use crate::platform::PermissionPlatform;
use crate::prefs::FlagStore;

const KEY_SHOULD_SHOW_RATIONALE: &str = "show_rationale_";

/// Flag key under which the "rationale was shown" bit for `permission` lives.
pub fn rationale_flag_key(permission: Permission) -> String {
    format!("{KEY_SHOULD_SHOW_RATIONALE}_{}", permission.key())
}

/// Answers whether a rationale is due and whether a permission is gone for good.
pub trait RationaleOracle: Send + Sync {
    /// Whether an explanation should be shown before asking for `permission`.
    ///
    /// Refreshes the durable flag as a side effect.
    fn should_show_rationale(&self, permission: Permission) -> bool;

    /// Whether the user has permanently denied `permission`.
    fn is_permanently_denied(&self, permission: Permission) -> bool;
}

/// Oracle backed by the live platform signal and a durable flag store.
pub struct PlatformRationaleOracle {
    platform: Arc<dyn PermissionPlatform>,
    flags: Arc<dyn FlagStore>,
}

impl PlatformRationaleOracle {
    pub fn new(platform: Arc<dyn PermissionPlatform>, flags: Arc<dyn FlagStore>) -> Self {
        Self { platform, flags }
    }
}

impl RationaleOracle for PlatformRationaleOracle {
    fn should_show_rationale(&self, permission: Permission) -> bool {
        let should_show = self.platform.should_show_rationale(permission);
        if should_show
            && let Err(e) = self.flags.set(&rationale_flag_key(permission), true)
        {
            warn!(%permission, error = %e, "Failed to persist rationale flag");
        }
        should_show
    }

    fn is_permanently_denied(&self, permission: Permission) -> bool {
        let shown_before = self
            .flags
            .get(&rationale_flag_key(permission))
            .unwrap_or(false);
        let denied = shown_before
            && !self.platform.is_granted(permission)
            && !self.should_show_rationale(permission);
        if denied {
            debug!(%permission, "Permission is permanently denied");
        }
        denied
    }
}
