//! Wiring of the coordinator, the simulated device and the terminal host.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tokio::task::JoinHandle;
use tracing::debug;

use permit_coordinator::PermissionCoordinator;
use permit_core::{Config, JsonFlagStore, PlatformRationaleOracle};

use crate::device::SimulatedDevice;
use crate::prompt::ScriptedAnswers;
use crate::terminal::{TerminalHost, run_dialogs};

const DEVICE_FILE: &str = "device.json";

/// Files holding durable state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    pub flags: PathBuf,
    pub device: PathBuf,
}

impl StatePaths {
    /// Resolve paths from overrides first, then config. The device file sits
    /// next to the flag file unless given explicitly.
    pub fn resolve(
        config: &Config,
        flags: Option<PathBuf>,
        device: Option<PathBuf>,
    ) -> anyhow::Result<Self> {
        let flags = flags
            .or_else(|| config.storage.resolved_flags_path())
            .context("Cannot determine where to store permission flags, pass --flags")?;
        let device = device.unwrap_or_else(|| device_path_for(&flags));
        Ok(Self { flags, device })
    }
}

fn device_path_for(flags: &Path) -> PathBuf {
    flags.with_file_name(DEVICE_FILE)
}

/// A running coordinator bound to the terminal.
pub struct Session {
    pub config: Config,
    pub coordinator: Arc<PermissionCoordinator>,
    pub device: Arc<SimulatedDevice>,
    pub flags: Arc<JsonFlagStore>,
    pub answers: ScriptedAnswers,
    dialogs: JoinHandle<()>,
}

impl Session {
    /// Open the state files and start the dialog loop.
    pub fn start(config: Config, paths: &StatePaths, answers: ScriptedAnswers) -> anyhow::Result<Self> {
        let device = Arc::new(SimulatedDevice::open(&paths.device)?);
        let flags = Arc::new(JsonFlagStore::open(&paths.flags)?);
        let oracle = Arc::new(PlatformRationaleOracle::new(device.clone(), flags.clone()));
        let (host, rx) = TerminalHost::new();
        let coordinator = Arc::new(PermissionCoordinator::with_request_config(
            Arc::new(host),
            device.clone(),
            oracle,
            config.requests,
        ));
        let dialogs = tokio::spawn(run_dialogs(
            Arc::clone(&coordinator),
            Arc::clone(&device),
            rx,
            answers,
        ));
        debug!(
            flags = %paths.flags.display(),
            device = %paths.device.display(),
            "Session started"
        );

        Ok(Self {
            config,
            coordinator,
            device,
            flags,
            answers,
            dialogs,
        })
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.dialogs.abort();
    }
}
