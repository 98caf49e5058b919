//! Test doubles for the host, the platform and rationale UI.
//!
//! Compiled for this crate's tests and for dependents that enable the
//! `test-utils` feature.

#![allow(clippy::missing_panics_doc)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use permit_core::{Permission, PermissionPlatform};

use crate::host::{PermissionHost, PromptSurface};
use crate::permission::{HostError, PermissionCoordinator, PlatformResponse};
use crate::rationale::{ConfirmCallback, RationalePresenter};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Platform with scripted grant state and "should explain" signals.
#[derive(Debug, Default)]
pub struct MockPlatform {
    granted: Mutex<HashSet<Permission>>,
    explain: Mutex<HashSet<Permission>>,
    settings_opened: AtomicBool,
}

impl MockPlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_granted(&self, permission: Permission, granted: bool) {
        let mut set = lock(&self.granted);
        if granted {
            set.insert(permission);
        } else {
            set.remove(&permission);
        }
    }

    /// Make the platform ask for an explanation for `permission`.
    pub fn show_rationale_for(&self, permission: Permission, show: bool) {
        let mut set = lock(&self.explain);
        if show {
            set.insert(permission);
        } else {
            set.remove(&permission);
        }
    }

    pub fn settings_opened(&self) -> bool {
        self.settings_opened.load(Ordering::SeqCst)
    }
}

impl PermissionPlatform for MockPlatform {
    fn is_granted(&self, permission: Permission) -> bool {
        lock(&self.granted).contains(&permission)
    }

    fn should_show_rationale(&self, permission: Permission) -> bool {
        lock(&self.explain).contains(&permission)
    }

    fn open_app_settings(&self) {
        self.settings_opened.store(true, Ordering::SeqCst);
    }
}

/// One dialog launched through a [`MockSurface`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub permissions: Vec<Permission>,
    pub request_code: i32,
}

#[derive(Debug, Default)]
struct HostLog {
    dispatches: Vec<Dispatch>,
    attached: usize,
    detached: usize,
}

/// Host that records every attach, detach and dispatch.
///
/// Dispatches are also forwarded over a channel so a test (or a
/// [`Responder`]) can answer them.
#[derive(Debug)]
pub struct MockHost {
    log: Arc<Mutex<HostLog>>,
    tx: mpsc::UnboundedSender<Dispatch>,
    fail_attach: AtomicBool,
}

impl MockHost {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Dispatch>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let host = Arc::new(Self {
            log: Arc::new(Mutex::new(HostLog::default())),
            tx,
            fail_attach: AtomicBool::new(false),
        });
        (host, rx)
    }

    /// Make every following attach fail with [`HostError::NoContainer`].
    pub fn fail_attach(&self, fail: bool) {
        self.fail_attach.store(fail, Ordering::SeqCst);
    }

    pub fn dispatches(&self) -> Vec<Dispatch> {
        lock(&self.log).dispatches.clone()
    }

    pub fn attach_count(&self) -> usize {
        lock(&self.log).attached
    }

    pub fn detach_count(&self) -> usize {
        lock(&self.log).detached
    }
}

impl PermissionHost for MockHost {
    fn attach(&self) -> Result<Arc<dyn PromptSurface>, HostError> {
        if self.fail_attach.load(Ordering::SeqCst) {
            return Err(HostError::NoContainer);
        }
        lock(&self.log).attached += 1;
        Ok(Arc::new(MockSurface {
            log: Arc::clone(&self.log),
            tx: self.tx.clone(),
        }))
    }
}

/// Surface handed out by [`MockHost`].
#[derive(Debug)]
pub struct MockSurface {
    log: Arc<Mutex<HostLog>>,
    tx: mpsc::UnboundedSender<Dispatch>,
}

impl PromptSurface for MockSurface {
    fn dispatch(&self, permissions: &[Permission], request_code: i32) {
        let dispatch = Dispatch {
            permissions: permissions.to_vec(),
            request_code,
        };
        lock(&self.log).dispatches.push(dispatch.clone());
        let _ = self.tx.send(dispatch);
    }

    fn detach(&self) {
        lock(&self.log).detached += 1;
    }
}

/// Answers dispatched dialogs with scripted grants.
///
/// Unscripted permissions are denied. Grants are mirrored into the
/// [`MockPlatform`] when one is attached, the way a real device would
/// remember them.
#[derive(Debug, Default)]
pub struct Responder {
    grants: HashMap<Permission, bool>,
    platform: Option<Arc<MockPlatform>>,
}

impl Responder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn allow(mut self, permissions: &[Permission]) -> Self {
        for p in permissions {
            self.grants.insert(*p, true);
        }
        self
    }

    #[must_use]
    pub fn deny(mut self, permissions: &[Permission]) -> Self {
        for p in permissions {
            self.grants.insert(*p, false);
        }
        self
    }

    #[must_use]
    pub fn platform(mut self, platform: Arc<MockPlatform>) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Build the response for one dispatch.
    pub fn respond_to(&self, dispatch: &Dispatch) -> PlatformResponse {
        let grants: Vec<bool> = dispatch
            .permissions
            .iter()
            .map(|p| self.grants.get(p).copied().unwrap_or(false))
            .collect();
        if let Some(platform) = &self.platform {
            for (p, granted) in dispatch.permissions.iter().zip(&grants) {
                platform.set_granted(*p, *granted);
            }
        }
        PlatformResponse::new(dispatch.request_code, &dispatch.permissions, &grants)
    }

    /// Answer every dispatch from `rx` until the channel closes.
    pub fn spawn(
        self,
        coordinator: Arc<PermissionCoordinator>,
        mut rx: mpsc::UnboundedReceiver<Dispatch>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(dispatch) = rx.recv().await {
                let response = self.respond_to(&dispatch);
                coordinator.on_platform_response(response).await;
            }
        })
    }
}

/// How a [`ScriptedPresenter`] answers a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RationaleAnswer {
    Confirm,
    Deny,
    /// Keep the prompt open forever.
    Hold,
}

/// Rationale UI that answers from a script and records what it showed.
#[derive(Debug, Default)]
pub struct ScriptedPresenter {
    answers: Mutex<HashMap<Permission, RationaleAnswer>>,
    shown: Mutex<Vec<(Permission, String)>>,
    held: Mutex<Vec<ConfirmCallback>>,
    destroyed: AtomicBool,
}

impl ScriptedPresenter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Script the answer for `permissions`. Unscripted prompts are denied.
    pub fn answer(&self, permissions: &[Permission], answer: RationaleAnswer) {
        let mut answers = lock(&self.answers);
        for p in permissions {
            answers.insert(*p, answer);
        }
    }

    pub fn shown(&self) -> Vec<(Permission, String)> {
        lock(&self.shown).clone()
    }

    pub fn was_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Answer the oldest held prompt.
    pub fn release_held(&self, confirmed: bool) -> bool {
        let mut held = lock(&self.held);
        if held.is_empty() {
            return false;
        }
        held.remove(0).respond(confirmed);
        true
    }
}

impl RationalePresenter for ScriptedPresenter {
    fn show_rationale(&self, permission: Permission, message: &str, confirm: ConfirmCallback) {
        lock(&self.shown).push((permission, message.to_string()));
        let answer = lock(&self.answers)
            .get(&permission)
            .copied()
            .unwrap_or(RationaleAnswer::Deny);
        match answer {
            RationaleAnswer::Confirm => confirm.confirm(),
            RationaleAnswer::Deny => confirm.deny(),
            RationaleAnswer::Hold => lock(&self.held).push(confirm),
        }
    }

    fn on_destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
    }
}
