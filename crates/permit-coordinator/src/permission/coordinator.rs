//! Permission request coordinator.
//!
//! Serializes permission requests so at most one platform dialog is ever
//! outstanding, folds duplicate requests into the in-flight one and fans the
//! single platform answer out to every waiter.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use permit_core::config::RequestConfig;
use permit_core::platform::{self, PermissionPlatform};
use permit_core::{Permission, PermissionResult, RationaleOracle};

use crate::host::{PermissionHost, PromptSurface};
use crate::rationale::RationaleHandler;

use super::pending::{PendingRequest, PermissionSet, ResultReceiver};
use super::types::{HostError, PermissionError, PlatformResponse, QueueSnapshot, RequestSummary};

#[derive(Default)]
struct QueueState {
    current: Option<PendingRequest>,
    queue: VecDeque<PendingRequest>,
    surface: Option<Arc<dyn PromptSurface>>,
}

/// Owns the request queue for one process.
///
/// Build one at the composition root and share it behind an [`Arc`].
pub struct PermissionCoordinator {
    state: Mutex<QueueState>,
    host: Arc<dyn PermissionHost>,
    platform: Arc<dyn PermissionPlatform>,
    oracle: Arc<dyn RationaleOracle>,
    requests: RequestConfig,
}

impl PermissionCoordinator {
    /// Create a coordinator with default request codes.
    pub fn new(
        host: Arc<dyn PermissionHost>,
        platform: Arc<dyn PermissionPlatform>,
        oracle: Arc<dyn RationaleOracle>,
    ) -> Self {
        Self::with_request_config(host, platform, oracle, RequestConfig::default())
    }

    /// Create a coordinator with configured default request codes.
    pub fn with_request_config(
        host: Arc<dyn PermissionHost>,
        platform: Arc<dyn PermissionPlatform>,
        oracle: Arc<dyn RationaleOracle>,
        requests: RequestConfig,
    ) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            host,
            platform,
            oracle,
            requests,
        }
    }

    pub fn oracle(&self) -> &dyn RationaleOracle {
        self.oracle.as_ref()
    }

    /// `true` if every permission is currently granted. Bypasses the queue.
    pub fn is_all_granted(&self, permissions: &[Permission]) -> bool {
        platform::is_all_granted(self.platform.as_ref(), permissions)
    }

    /// Open the app's system settings page.
    pub fn open_app_settings(&self) {
        self.platform.open_app_settings();
    }

    /// Queue a request and return a receiver for its result.
    ///
    /// Matches the in-flight request by permission content; a match attaches
    /// another waiter and no new dialog is launched.
    pub async fn submit(
        &self,
        permissions: &[Permission],
        request_code: i32,
    ) -> Result<ResultReceiver, PermissionError> {
        let permissions = PermissionSet::from(permissions);
        debug!(%permissions, request_code, "Submitting permission request");

        if permissions.is_empty() {
            return Ok(ResultReceiver::ready(
                permissions,
                PermissionResult::default(),
            ));
        }

        // Refresh the durable flags so permanent denial is detected later.
        for permission in permissions.iter() {
            self.oracle.should_show_rationale(permission);
        }

        let mut state = self.state.lock().await;

        if let Some(current) = state.current.as_mut()
            && current.permissions.same_permissions(permissions.as_slice())
        {
            debug!(
                %permissions,
                request_code = current.request_code,
                "Attached to in-flight request"
            );
            return Ok(current.attach());
        }

        let (mut request, receiver) = PendingRequest::new(permissions, request_code);

        match state.current.as_ref().map(|c| c.request_code) {
            None => {
                if let Err((request, e)) = self.perform(&mut state, request) {
                    drop(state);
                    error!(permissions = %request.permissions, error = %e, "Cannot dispatch request");
                    return Err(PermissionError::HostUnavailable(e));
                }
            }
            Some(current_code) => {
                if current_code == request.request_code {
                    request.request_code = request.request_code.wrapping_add(1);
                }
                debug!(
                    permissions = %request.permissions,
                    request_code = request.request_code,
                    position = state.queue.len(),
                    "Request queued behind in-flight request"
                );
                state.queue.push_back(request);
            }
        }

        Ok(receiver)
    }

    /// Handle the platform's answer to the in-flight request.
    ///
    /// Stale or spurious answers are logged and dropped.
    pub async fn on_platform_response(&self, response: PlatformResponse) {
        let permissions = response.parsed_permissions();
        let mut state = self.state.lock().await;

        let Some(current) = state.current.as_ref() else {
            warn!(
                request_code = response.request_code,
                "Platform response arrived with no pending request"
            );
            return;
        };

        if !current.permissions.same_permissions(&permissions)
            || permissions.len() != response.grants.len()
        {
            warn!(
                expected = %current.permissions,
                received = ?response.permissions,
                "Platform response does not match the pending request"
            );
            return;
        }

        let Some(current) = state.current.take() else {
            return;
        };

        let result =
            PermissionResult::from_platform(&permissions, &response.grants, self.oracle.as_ref());
        info!(
            request_code = current.request_code,
            waiters = current.waiter_count(),
            %result,
            "Permission request resolved"
        );
        current.resolve(&result);

        self.dispatch_next(&mut state);
    }

    /// Drop all pending requests and detach the surface.
    ///
    /// Waiters of dropped requests receive [`PermissionError::RequestDropped`].
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        let dropped = state.queue.len() + usize::from(state.current.is_some());
        state.current = None;
        state.queue.clear();
        Self::forget_surface(&mut state);
        info!(dropped, "Coordinator reset");
    }

    pub async fn snapshot(&self) -> QueueSnapshot {
        let state = self.state.lock().await;
        let summary = |r: &PendingRequest| RequestSummary {
            permissions: r.permissions.clone(),
            request_code: r.request_code,
            waiters: r.waiter_count(),
        };
        QueueSnapshot {
            current: state.current.as_ref().map(summary),
            queued: state.queue.iter().map(summary).collect(),
            surface_attached: state.surface.is_some(),
        }
    }

    /// Ask for `permissions` and wait for the combined result.
    ///
    /// With a rationale handler the queue's duplicate matching is bypassed
    /// and the handler drives its own sub-requests.
    pub async fn ask_for_permissions(
        &self,
        permissions: &[Permission],
        request_code: i32,
        rationale: Option<&RationaleHandler>,
    ) -> Result<PermissionResult, PermissionError> {
        if let Some(handler) = rationale {
            return handler
                .request_permissions(self, permissions, request_code)
                .await;
        }
        self.submit(permissions, request_code).await?.wait().await
    }

    /// [`ask_for_permissions`](Self::ask_for_permissions) with the configured default code.
    pub async fn ask(
        &self,
        permissions: &[Permission],
        rationale: Option<&RationaleHandler>,
    ) -> Result<PermissionResult, PermissionError> {
        self.ask_for_permissions(permissions, self.requests.ask_code, rationale)
            .await
    }

    /// Callback flavour of [`ask_for_permissions`](Self::ask_for_permissions).
    ///
    /// The callback never fires if the request fails or is abandoned.
    pub fn ask_for_permissions_with<F>(
        self: &Arc<Self>,
        permissions: Vec<Permission>,
        request_code: i32,
        rationale: Option<RationaleHandler>,
        callback: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(PermissionResult) + Send + 'static,
    {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            match coordinator
                .ask_for_permissions(&permissions, request_code, rationale.as_ref())
                .await
            {
                Ok(result) => callback(result),
                Err(e) => warn!(error = %e, "Permission request ended without a result"),
            }
        })
    }

    /// Run `action` only if every requested permission is granted.
    pub async fn run_with_permissions<T>(
        &self,
        permissions: &[Permission],
        request_code: i32,
        rationale: Option<&RationaleHandler>,
        action: impl FnOnce(&PermissionResult) -> T,
    ) -> Result<Option<T>, PermissionError> {
        let result = self
            .ask_for_permissions(permissions, request_code, rationale)
            .await?;
        if result.is_all_granted(permissions)? {
            Ok(Some(action(&result)))
        } else {
            debug!(%result, "Skipping action, not all permissions granted");
            Ok(None)
        }
    }

    /// [`run_with_permissions`](Self::run_with_permissions) with the configured default code.
    pub async fn run<T>(
        &self,
        permissions: &[Permission],
        rationale: Option<&RationaleHandler>,
        action: impl FnOnce(&PermissionResult) -> T,
    ) -> Result<Option<T>, PermissionError> {
        self.run_with_permissions(permissions, self.requests.run_code, rationale, action)
            .await
    }

    /// [`ask_for_permissions`](Self::ask_for_permissions) under the configured await code.
    pub async fn await_result(
        &self,
        permissions: &[Permission],
        rationale: Option<&RationaleHandler>,
    ) -> Result<PermissionResult, PermissionError> {
        self.ask_for_permissions(permissions, self.requests.await_code, rationale)
            .await
    }

    /// [`await_permissions_granted`](Self::await_permissions_granted) with the configured default code.
    pub async fn await_granted(
        &self,
        permissions: &[Permission],
        rationale: Option<&RationaleHandler>,
    ) -> Result<PermissionResult, PermissionError> {
        self.await_permissions_granted(permissions, self.requests.await_granted_code, rationale)
            .await
    }

    /// Like [`ask_for_permissions`](Self::ask_for_permissions), but anything
    /// short of a full grant is an error carrying the result.
    pub async fn await_permissions_granted(
        &self,
        permissions: &[Permission],
        request_code: i32,
        rationale: Option<&RationaleHandler>,
    ) -> Result<PermissionResult, PermissionError> {
        let result = self
            .ask_for_permissions(permissions, request_code, rationale)
            .await?;
        if result.is_all_granted(permissions)? {
            Ok(result)
        } else {
            Err(PermissionError::NotGranted { result })
        }
    }

    /// Install `request` as current and launch its dialog.
    fn perform(
        &self,
        state: &mut QueueState,
        request: PendingRequest,
    ) -> Result<(), (PendingRequest, HostError)> {
        let surface = match self.ensure_surface(state) {
            Ok(surface) => surface,
            Err(e) => return Err((request, e)),
        };

        info!(
            permissions = %request.permissions,
            request_code = request.request_code,
            "Dispatching permission request"
        );
        let permissions = request.permissions.clone();
        let request_code = request.request_code;
        state.current = Some(request);
        surface.dispatch(permissions.as_slice(), request_code);
        Ok(())
    }

    fn dispatch_next(&self, state: &mut QueueState) {
        while let Some(next) = state.queue.pop_front() {
            debug!(
                permissions = %next.permissions,
                remaining = state.queue.len(),
                "Executing next request in the queue"
            );
            match self.perform(state, next) {
                Ok(()) => return,
                Err((request, e)) => request.fail(&e),
            }
        }

        debug!("Nothing more in the queue, forgetting the prompt surface");
        Self::forget_surface(state);
    }

    fn ensure_surface(
        &self,
        state: &mut QueueState,
    ) -> Result<Arc<dyn PromptSurface>, HostError> {
        if let Some(surface) = &state.surface {
            debug!("Re-using prompt surface");
            return Ok(Arc::clone(surface));
        }
        let surface = self.host.attach()?;
        debug!("Attached new prompt surface");
        state.surface = Some(Arc::clone(&surface));
        Ok(surface)
    }

    fn forget_surface(state: &mut QueueState) {
        if let Some(surface) = state.surface.take() {
            surface.detach();
            debug!("Detached prompt surface");
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::{MockHost, MockPlatform, Responder};
    use permit_core::{MemoryFlagStore, PlatformRationaleOracle};
    use Permission::{Camera, ReadContacts, RecordAudio};

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter("permit_coordinator=debug")
            .try_init();
    }

    fn coordinator(
        requests: RequestConfig,
    ) -> (PermissionCoordinator, Arc<MockHost>, Arc<MockPlatform>) {
        init_tracing();
        let (host, _rx) = MockHost::new();
        let platform = MockPlatform::new();
        let oracle = Arc::new(PlatformRationaleOracle::new(
            platform.clone(),
            Arc::new(MemoryFlagStore::new()),
        ));
        let coordinator = PermissionCoordinator::with_request_config(
            host.clone(),
            platform.clone(),
            oracle,
            requests,
        );
        (coordinator, host, platform)
    }

    #[tokio::test]
    async fn ask_uses_configured_code() {
        let requests = RequestConfig {
            ask_code: 7,
            ..RequestConfig::default()
        };
        let (coordinator, host, _) = coordinator(requests);

        let pending = coordinator.ask(&[Camera], None);
        tokio::pin!(pending);
        // Drive the submission far enough to dispatch, then stop
        tokio::select! {
            biased;
            _ = &mut pending => panic!("request resolved without a response"),
            () = tokio::task::yield_now() => {}
        }

        assert_eq!(host.dispatches()[0].request_code, 7);
    }

    #[tokio::test]
    async fn every_colliding_code_is_bumped_against_current_only() {
        let (coordinator, _, _) = coordinator(RequestConfig::default());

        let _a = coordinator.submit(&[Camera], 20).await.unwrap();
        let _b = coordinator.submit(&[RecordAudio], 20).await.unwrap();
        let _c = coordinator.submit(&[ReadContacts], 21).await.unwrap();

        let snapshot = coordinator.snapshot().await;
        let codes: Vec<i32> = snapshot.queued.iter().map(|r| r.request_code).collect();
        assert_eq!(codes, vec![21, 21]);
        assert!(snapshot.surface_attached);
    }

    #[tokio::test]
    async fn duplicates_of_queued_requests_are_queued_again() {
        let (coordinator, host, _) = coordinator(RequestConfig::default());

        let _a = coordinator.submit(&[Camera], 20).await.unwrap();
        let _b = coordinator.submit(&[RecordAudio], 30).await.unwrap();
        let _c = coordinator.submit(&[RecordAudio], 30).await.unwrap();

        let snapshot = coordinator.snapshot().await;
        assert_eq!(snapshot.queued.len(), 2);
        assert_eq!(snapshot.current.unwrap().waiters, 1);
        assert_eq!(host.dispatches().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_permissions_in_one_request_collapse() {
        let (coordinator, host, _) = coordinator(RequestConfig::default());

        let _a = coordinator.submit(&[Camera, Camera], 20).await.unwrap();
        assert_eq!(host.dispatches()[0].permissions, vec![Camera]);
    }

    #[tokio::test]
    async fn colliding_code_wraps_at_the_top_of_the_range() {
        let (coordinator, _, _) = coordinator(RequestConfig::default());

        let _a = coordinator.submit(&[Camera], i32::MAX).await.unwrap();
        let _b = coordinator.submit(&[RecordAudio], i32::MAX).await.unwrap();

        let snapshot = coordinator.snapshot().await;
        assert_eq!(snapshot.queued[0].request_code, i32::MIN);
    }

    #[tokio::test]
    async fn default_codes_follow_config() {
        let requests = RequestConfig {
            ask_code: 1,
            run_code: 2,
            await_code: 3,
            await_granted_code: 4,
        };
        let (host, rx) = MockHost::new();
        let platform = MockPlatform::new();
        let oracle = Arc::new(PlatformRationaleOracle::new(
            platform.clone(),
            Arc::new(MemoryFlagStore::new()),
        ));
        let coordinator = Arc::new(PermissionCoordinator::with_request_config(
            host.clone(),
            platform.clone(),
            oracle,
            requests,
        ));
        let _responder = Responder::new()
            .allow(&[Camera])
            .spawn(coordinator.clone(), rx);

        coordinator.ask(&[Camera], None).await.unwrap();
        let ran = coordinator.run(&[Camera], None, |_| true).await.unwrap();
        assert_eq!(ran, Some(true));
        coordinator.await_result(&[Camera], None).await.unwrap();
        coordinator.await_granted(&[Camera], None).await.unwrap();

        let codes: Vec<i32> = host.dispatches().iter().map(|d| d.request_code).collect();
        assert_eq!(codes, vec![1, 2, 3, 4]);
    }

    #[test]
    fn open_app_settings_reaches_platform() {
        let (coordinator, _, platform) = coordinator(RequestConfig::default());
        coordinator.open_app_settings();
        assert!(platform.settings_opened());
    }
}
