//! Terminal host for the coordinator.
//!
//! Dialogs are forwarded over a channel to [`run_dialogs`], which asks the
//! user on a blocking thread and feeds the answers back as platform
//! responses. Rationale prompts run the same way.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use permit_coordinator::{
    ConfirmCallback, HostError, PermissionCoordinator, PermissionHost, PlatformResponse,
    PromptSurface, RationalePresenter,
};
use permit_core::Permission;

use crate::device::{DeviceGrant, SimulatedDevice};
use crate::prompt::{self, DialogAnswer, ScriptedAnswers};

/// A platform dialog waiting to be shown.
#[derive(Debug, Clone)]
pub struct DialogRequest {
    pub permissions: Vec<Permission>,
    pub request_code: i32,
}

/// Host whose surface is the terminal.
#[derive(Debug)]
pub struct TerminalHost {
    tx: mpsc::UnboundedSender<DialogRequest>,
}

impl TerminalHost {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DialogRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl PermissionHost for TerminalHost {
    fn attach(&self) -> Result<Arc<dyn PromptSurface>, HostError> {
        if self.tx.is_closed() {
            return Err(HostError::NoContainer);
        }
        debug!("Attached terminal surface");
        Ok(Arc::new(TerminalSurface {
            tx: self.tx.clone(),
        }))
    }
}

struct TerminalSurface {
    tx: mpsc::UnboundedSender<DialogRequest>,
}

impl PromptSurface for TerminalSurface {
    fn dispatch(&self, permissions: &[Permission], request_code: i32) {
        let request = DialogRequest {
            permissions: permissions.to_vec(),
            request_code,
        };
        if self.tx.send(request).is_err() {
            warn!(request_code, "Dialog loop stopped, request will not be answered");
        }
    }

    fn detach(&self) {
        debug!("Detached terminal surface");
    }
}

/// Answer dialogs until the host goes away.
pub async fn run_dialogs(
    coordinator: Arc<PermissionCoordinator>,
    device: Arc<SimulatedDevice>,
    mut rx: mpsc::UnboundedReceiver<DialogRequest>,
    answers: ScriptedAnswers,
) {
    while let Some(request) = rx.recv().await {
        let permissions = request.permissions.clone();
        let dialog_device = Arc::clone(&device);
        let grants = match tokio::task::spawn_blocking(move || {
            answer_dialog(&dialog_device, &permissions, answers.dialog)
        })
        .await
        {
            Ok(Ok(grants)) => grants,
            Ok(Err(e)) => {
                warn!(error = %e, "Dialog failed, treating as denied");
                vec![false; request.permissions.len()]
            }
            Err(e) => {
                warn!(error = %e, "Dialog task panicked, treating as denied");
                vec![false; request.permissions.len()]
            }
        };

        coordinator
            .on_platform_response(PlatformResponse::new(
                request.request_code,
                &request.permissions,
                &grants,
            ))
            .await;
    }
    debug!("Dialog loop finished");
}

/// Ask about each permission in turn, like the platform dialog does.
fn answer_dialog(
    device: &SimulatedDevice,
    permissions: &[Permission],
    scripted: Option<DialogAnswer>,
) -> anyhow::Result<Vec<bool>> {
    permissions
        .iter()
        .map(|&permission| {
            let answer = match device.grant(permission) {
                DeviceGrant::Granted => DialogAnswer::Allow,
                // No dialog once the user said "don't ask again"
                DeviceGrant::DeniedForever => DialogAnswer::Never,
                current => prompt::platform_dialog(permission, current, scripted)?,
            };
            Ok(device.record(permission, answer)?.is_granted())
        })
        .collect()
}

/// Rationale prompts on the terminal.
#[derive(Debug, Default)]
pub struct TerminalPresenter {
    scripted: Option<bool>,
}

impl TerminalPresenter {
    pub const fn new(scripted: Option<bool>) -> Self {
        Self { scripted }
    }
}

impl RationalePresenter for TerminalPresenter {
    fn show_rationale(&self, permission: Permission, message: &str, confirm: ConfirmCallback) {
        let message = message.to_string();
        let scripted = self.scripted;
        tokio::task::spawn_blocking(move || {
            match prompt::confirm_rationale(permission, &message, scripted) {
                Ok(confirmed) => confirm.respond(confirmed),
                Err(e) => {
                    warn!(%permission, error = %e, "Rationale prompt failed");
                    drop(confirm);
                }
            }
        });
    }

    fn on_destroy(&self) {
        debug!("Rationale prompt abandoned");
    }
}
