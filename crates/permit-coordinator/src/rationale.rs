//! Rationale handler.
//!
//! Splits a request into permissions that can be asked for directly and
//! permissions that need an explanation first. The direct ones go out as a
//! single request; the rest are walked one at a time, each behind its own
//! rationale prompt. All partial results are merged and delivered once.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use permit_core::result::fold_result;
use permit_core::{GrantOutcome, Permission, PermissionResult, RationaleOracle};

use crate::permission::{PermissionCoordinator, PermissionError, PermissionSet};

/// Concrete rationale UI (dialog, snackbar, terminal prompt...).
pub trait RationalePresenter: Send + Sync {
    /// Show `message` for `permission` and answer through `confirm` once the
    /// user decides. Must not block.
    fn show_rationale(&self, permission: Permission, message: &str, confirm: ConfirmCallback);

    /// The owner went away while a prompt was visible.
    fn on_destroy(&self) {}
}

/// One-shot answer to a rationale prompt.
#[derive(Debug)]
pub struct ConfirmCallback {
    permission: Permission,
    tx: oneshot::Sender<bool>,
}

impl ConfirmCallback {
    pub const fn permission(&self) -> Permission {
        self.permission
    }

    /// `true` continues to the platform dialog, `false` records a denial.
    pub fn respond(self, confirmed: bool) {
        if self.tx.send(confirmed).is_err() {
            debug!(permission = %self.permission, "Rationale answer arrived after the handler stopped");
        }
    }

    pub fn confirm(self) {
        self.respond(true);
    }

    pub fn deny(self) {
        self.respond(false);
    }
}

/// Rationale configuration shared by every request that uses it.
///
/// Each call to [`request_permissions`](Self::request_permissions) keeps its
/// own progress, so one handler can serve overlapping requests.
#[derive(Clone)]
pub struct RationaleHandler {
    presenter: Arc<dyn RationalePresenter>,
    messages: Arc<BTreeMap<Permission, String>>,
    oracle: Option<Arc<dyn RationaleOracle>>,
    owner: Option<CancellationToken>,
}

impl fmt::Debug for RationaleHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RationaleHandler")
            .field("messages", &self.messages)
            .field("custom_oracle", &self.oracle.is_some())
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

impl RationaleHandler {
    pub fn builder(presenter: Arc<dyn RationalePresenter>) -> RationaleHandlerBuilder {
        RationaleHandlerBuilder {
            presenter,
            messages: BTreeMap::new(),
            oracle: None,
            owner: None,
        }
    }

    /// Run the rationale protocol and return the merged result.
    pub async fn request_permissions(
        &self,
        coordinator: &PermissionCoordinator,
        permissions: &[Permission],
        request_code: i32,
    ) -> Result<PermissionResult, PermissionError> {
        let oracle: &dyn RationaleOracle = match &self.oracle {
            Some(oracle) => oracle.as_ref(),
            None => coordinator.oracle(),
        };

        let permissions = PermissionSet::from(permissions);
        let mut needs_rationale = Vec::new();
        let mut simple = Vec::new();
        for permission in permissions.iter() {
            if oracle.should_show_rationale(permission) || oracle.is_permanently_denied(permission)
            {
                needs_rationale.push(permission);
            } else {
                simple.push(permission);
            }
        }
        debug!(
            needs_rationale = needs_rationale.len(),
            simple = simple.len(),
            "Partitioned rationale request"
        );

        let simple_result = if simple.is_empty() {
            debug!("No simple permissions to request");
            None
        } else {
            Some(coordinator.submit(&simple, request_code).await?.wait().await?)
        };

        let mut rationale_result: Option<PermissionResult> = None;
        for permission in needs_rationale {
            let partial = self
                .resolve_with_rationale(coordinator, oracle, permission, request_code)
                .await?;
            rationale_result = Some(fold_result(rationale_result, partial));
        }

        let result = match (simple_result, rationale_result) {
            (Some(simple), Some(rationale)) => simple + rationale,
            (Some(only), None) | (None, Some(only)) => only,
            (None, None) => PermissionResult::default(),
        };
        debug!(%result, "Rationale request finished");
        Ok(result)
    }

    async fn resolve_with_rationale(
        &self,
        coordinator: &PermissionCoordinator,
        oracle: &dyn RationaleOracle,
        permission: Permission,
        request_code: i32,
    ) -> Result<PermissionResult, PermissionError> {
        if oracle.is_permanently_denied(permission) {
            info!(%permission, "Permission is permanently denied, skipping rationale");
            return Ok(PermissionResult::single(
                permission,
                GrantOutcome::PermanentlyDenied,
            ));
        }

        let message = self
            .messages
            .get(&permission)
            .ok_or(PermissionError::MissingRationaleMessage { permission })?;

        debug!(%permission, "Showing rationale");
        if self.prompt(permission, message).await? {
            debug!(%permission, "Rationale confirmed");
            coordinator
                .submit(&[permission], request_code)
                .await?
                .wait()
                .await
        } else {
            debug!(%permission, "Rationale denied");
            Ok(PermissionResult::single(permission, GrantOutcome::Denied))
        }
    }

    async fn prompt(&self, permission: Permission, message: &str) -> Result<bool, PermissionError> {
        if let Some(owner) = &self.owner
            && owner.is_cancelled()
        {
            self.presenter.on_destroy();
            return Err(PermissionError::OwnerDestroyed);
        }

        let (tx, rx) = oneshot::channel();
        self.presenter
            .show_rationale(permission, message, ConfirmCallback { permission, tx });

        let answer = match &self.owner {
            Some(owner) => {
                tokio::select! {
                    biased;
                    answer = rx => answer,
                    () = owner.cancelled() => {
                        info!(%permission, "Owner destroyed while rationale was showing");
                        self.presenter.on_destroy();
                        return Err(PermissionError::OwnerDestroyed);
                    }
                }
            }
            None => rx.await,
        };

        answer.map_err(|_| PermissionError::RationaleDismissed { permission })
    }
}

/// Builder for [`RationaleHandler`].
pub struct RationaleHandlerBuilder {
    presenter: Arc<dyn RationalePresenter>,
    messages: BTreeMap<Permission, String>,
    oracle: Option<Arc<dyn RationaleOracle>>,
    owner: Option<CancellationToken>,
}

impl RationaleHandlerBuilder {
    /// Register the rationale message for `permission`.
    #[must_use]
    pub fn on_permission(mut self, permission: Permission, message: impl Into<String>) -> Self {
        self.messages.insert(permission, message.into());
        self
    }

    /// Register several messages, e.g. from configuration.
    #[must_use]
    pub fn messages<I, S>(mut self, messages: I) -> Self
    where
        I: IntoIterator<Item = (Permission, S)>,
        S: Into<String>,
    {
        self.messages
            .extend(messages.into_iter().map(|(p, m)| (p, m.into())));
        self
    }

    /// Use this oracle instead of the coordinator's.
    #[must_use]
    pub fn oracle(mut self, oracle: Arc<dyn RationaleOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// Abort pending prompts once `owner` is cancelled.
    #[must_use]
    pub fn owner(mut self, owner: CancellationToken) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn build(self) -> RationaleHandler {
        RationaleHandler {
            presenter: self.presenter,
            messages: Arc::new(self.messages),
            oracle: self.oracle,
            owner: self.owner,
        }
    }
}
