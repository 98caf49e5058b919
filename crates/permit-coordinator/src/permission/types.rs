//! Coordinator types.

use permit_core::{Permission, PermissionResult};

use super::pending::PermissionSet;

/// Raw answer from the platform dialog.
///
/// `permissions` and `grants` are correlated by position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformResponse {
    /// Request code the dialog was launched with.
    pub request_code: i32,
    /// Platform keys, in the order the platform reports them.
    pub permissions: Vec<String>,
    /// Grant flag per key.
    pub grants: Vec<bool>,
}

impl PlatformResponse {
    pub fn new(request_code: i32, permissions: &[Permission], grants: &[bool]) -> Self {
        Self {
            request_code,
            permissions: permissions.iter().map(|p| p.key().to_string()).collect(),
            grants: grants.to_vec(),
        }
    }

    /// Parsed permissions. Unknown keys become [`Permission::Unknown`].
    pub fn parsed_permissions(&self) -> Vec<Permission> {
        self.permissions.iter().map(|k| Permission::parse(k)).collect()
    }
}

/// Point-in-time view of the queue, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSnapshot {
    /// The in-flight request, if any.
    pub current: Option<RequestSummary>,
    /// Waiting requests in dispatch order.
    pub queued: Vec<RequestSummary>,
    /// Whether a prompt surface is attached.
    pub surface_attached: bool,
}

impl QueueSnapshot {
    pub const fn is_idle(&self) -> bool {
        self.current.is_none() && self.queued.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSummary {
    pub permissions: PermissionSet,
    pub request_code: i32,
    pub waiters: usize,
}

/// Failure to attach a prompt surface.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HostError {
    #[error("No UI container available to host the permission prompt")]
    NoContainer,

    #[error("Failed to attach prompt surface: {0}")]
    Attach(String),
}

/// Coordinator errors.
#[derive(Debug, thiserror::Error)]
pub enum PermissionError {
    #[error("Host unavailable: {0}")]
    HostUnavailable(#[from] HostError),

    #[error("No rationale message registered for {permission}")]
    MissingRationaleMessage { permission: Permission },

    #[error("Rationale for {permission} was dismissed without an answer")]
    RationaleDismissed { permission: Permission },

    #[error("Owner was destroyed while a rationale was pending")]
    OwnerDestroyed,

    #[error("Request for [{permissions}] was dropped before it resolved")]
    RequestDropped { permissions: PermissionSet },

    #[error("Not all permissions were granted: {result}")]
    NotGranted { result: PermissionResult },

    #[error(transparent)]
    Core(#[from] permit_core::Error),
}
