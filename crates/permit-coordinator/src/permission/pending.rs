//! Pending permission requests.
//!
//! A pending request owns the waiters that asked for the same permission
//! set. Duplicate submissions attach another waiter instead of creating a
//! second platform dialog.

use std::collections::BTreeSet;
use std::fmt;

use tokio::sync::oneshot;
use tracing::{debug, warn};

use permit_core::{Permission, PermissionResult};

use super::types::{HostError, PermissionError};

type Waiter = oneshot::Sender<Result<PermissionResult, PermissionError>>;

/// Ordered permission set, free of duplicates.
///
/// Keeps insertion order for dispatch. Equality used for request matching
/// is order-insensitive, see [`PermissionSet::same_permissions`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PermissionSet(Vec<Permission>);

impl PermissionSet {
    pub fn new(permissions: impl IntoIterator<Item = Permission>) -> Self {
        let mut seen = BTreeSet::new();
        Self(
            permissions
                .into_iter()
                .filter(|p| seen.insert(*p))
                .collect(),
        )
    }

    /// Content equality, ignoring order.
    pub fn same_permissions(&self, other: &[Permission]) -> bool {
        let mine: BTreeSet<Permission> = self.0.iter().copied().collect();
        let theirs: BTreeSet<Permission> = other.iter().copied().collect();
        mine == theirs
    }

    pub fn as_slice(&self) -> &[Permission] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = Permission> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&[Permission]> for PermissionSet {
    fn from(permissions: &[Permission]) -> Self {
        Self::new(permissions.iter().copied())
    }
}

impl fmt::Display for PermissionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.iter().map(Permission::short_name).collect();
        write!(f, "{}", names.join(", "))
    }
}

/// A request waiting for (or holding) the platform dialog.
#[derive(Debug)]
pub struct PendingRequest {
    /// Permissions asked for.
    pub permissions: PermissionSet,
    /// Bookkeeping code passed to the platform. Never used for matching.
    pub request_code: i32,
    waiters: Vec<Waiter>,
}

impl PendingRequest {
    /// Create a request with its first waiter.
    pub fn new(permissions: PermissionSet, request_code: i32) -> (Self, ResultReceiver) {
        let mut request = Self {
            permissions,
            request_code,
            waiters: Vec::new(),
        };
        let receiver = request.attach();
        (request, receiver)
    }

    /// Attach another waiter.
    pub fn attach(&mut self) -> ResultReceiver {
        let (tx, rx) = oneshot::channel();
        self.waiters.push(tx);
        ResultReceiver {
            permissions: self.permissions.clone(),
            rx,
        }
    }

    pub fn waiter_count(&self) -> usize {
        self.waiters.len()
    }

    /// Deliver `result` to every waiter, in attach order.
    pub fn resolve(self, result: &PermissionResult) {
        let count = self.waiters.len();
        for waiter in self.waiters {
            if waiter.send(Ok(result.clone())).is_err() {
                debug!(request_code = self.request_code, "Waiter went away before the result");
            }
        }
        debug!(
            request_code = self.request_code,
            waiters = count,
            "Resolved pending request"
        );
    }

    /// Fail every waiter with a host error.
    pub fn fail(self, error: &HostError) {
        warn!(
            request_code = self.request_code,
            permissions = %self.permissions,
            error = %error,
            "Failing pending request"
        );
        for waiter in self.waiters {
            let _ = waiter.send(Err(PermissionError::HostUnavailable(error.clone())));
        }
    }
}

/// Receiving end of a submission.
#[derive(Debug)]
pub struct ResultReceiver {
    permissions: PermissionSet,
    rx: oneshot::Receiver<Result<PermissionResult, PermissionError>>,
}

impl ResultReceiver {
    /// Wait for the platform response.
    ///
    /// Fails with [`PermissionError::RequestDropped`] if the coordinator was
    /// reset before the request resolved.
    pub async fn wait(self) -> Result<PermissionResult, PermissionError> {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(PermissionError::RequestDropped {
                permissions: self.permissions,
            }),
        }
    }

    /// Non-blocking poll, mostly useful in tests.
    pub fn try_take(&mut self) -> Option<Result<PermissionResult, PermissionError>> {
        self.rx.try_recv().ok()
    }

    /// Wrap an already-known result.
    pub(crate) fn ready(permissions: PermissionSet, result: PermissionResult) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(Ok(result));
        Self { permissions, rx }
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use permit_core::GrantOutcome;
    use Permission::{Camera, ReadContacts, RecordAudio};

    #[test]
    fn set_drops_duplicates_and_keeps_order() {
        let set = PermissionSet::new([RecordAudio, Camera, RecordAudio]);
        assert_eq!(set.as_slice(), &[RecordAudio, Camera]);
    }

    #[test]
    fn matching_ignores_order() {
        let set = PermissionSet::new([Camera, RecordAudio]);
        assert!(set.same_permissions(&[RecordAudio, Camera]));
        assert!(!set.same_permissions(&[Camera]));
        assert!(!set.same_permissions(&[Camera, RecordAudio, ReadContacts]));
    }

    #[test]
    fn display_uses_short_names() {
        let set = PermissionSet::new([Camera, RecordAudio]);
        assert_eq!(set.to_string(), "CAMERA, RECORD_AUDIO");
    }

    #[tokio::test]
    async fn resolve_reaches_every_waiter() {
        let (mut request, first) = PendingRequest::new(PermissionSet::new([Camera]), 20);
        let second = request.attach();
        assert_eq!(request.waiter_count(), 2);

        let result = PermissionResult::single(Camera, GrantOutcome::Granted);
        request.resolve(&result);

        assert_eq!(first.wait().await.unwrap(), result);
        assert_eq!(second.wait().await.unwrap(), result);
    }

    #[tokio::test]
    async fn dropped_request_reports_to_waiter() {
        let (request, receiver) = PendingRequest::new(PermissionSet::new([Camera]), 20);
        drop(request);

        let err = receiver.wait().await.unwrap_err();
        assert!(matches!(err, PermissionError::RequestDropped { .. }));
    }

    #[tokio::test]
    async fn fail_reports_host_error() {
        let (request, receiver) = PendingRequest::new(PermissionSet::new([Camera]), 20);
        request.fail(&HostError::NoContainer);

        let err = receiver.wait().await.unwrap_err();
        assert!(matches!(
            err,
            PermissionError::HostUnavailable(HostError::NoContainer)
        ));
    }
}
