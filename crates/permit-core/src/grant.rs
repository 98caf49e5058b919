//! Grant outcome classification.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::Permission;
use crate::rationale::RationaleOracle;

/// Resolved status of one permission after a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantOutcome {
    Granted,
    Denied,
    /// The platform will not prompt again; only the settings page can grant it.
    PermanentlyDenied,
}

impl GrantOutcome {
    /// Classify a raw platform grant flag.
    ///
    /// Permanent denial is checked first and wins over the raw flag.
    pub fn classify(permission: Permission, granted: bool, oracle: &dyn RationaleOracle) -> Self {
        if oracle.is_permanently_denied(permission) {
            return Self::PermanentlyDenied;
        }
        if granted { Self::Granted } else { Self::Denied }
    }

    pub const fn is_granted(self) -> bool {
        matches!(self, Self::Granted)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Granted => "granted",
            Self::Denied => "denied",
            Self::PermanentlyDenied => "permanently_denied",
        }
    }
}

impl fmt::Display for GrantOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    struct FixedOracle {
        permanently_denied: bool,
    }

    impl RationaleOracle for FixedOracle {
        fn should_show_rationale(&self, _permission: Permission) -> bool {
            false
        }

        fn is_permanently_denied(&self, _permission: Permission) -> bool {
            self.permanently_denied
        }
    }

    #[test]
    fn raw_flag_decides_when_not_permanently_denied() {
        let oracle = FixedOracle {
            permanently_denied: false,
        };
        assert_eq!(
            GrantOutcome::classify(Permission::Camera, true, &oracle),
            GrantOutcome::Granted
        );
        assert_eq!(
            GrantOutcome::classify(Permission::Camera, false, &oracle),
            GrantOutcome::Denied
        );
    }

    #[test]
    fn permanent_denial_overrides_raw_flag() {
        let oracle = FixedOracle {
            permanently_denied: true,
        };
        assert_eq!(
            GrantOutcome::classify(Permission::Camera, false, &oracle),
            GrantOutcome::PermanentlyDenied
        );
        assert_eq!(
            GrantOutcome::classify(Permission::Camera, true, &oracle),
            GrantOutcome::PermanentlyDenied
        );
    }
}
