//! Simulated device.
//!
//! Tracks per-permission grant state the way a phone does and persists it to
//! a JSON file so consecutive `permit` invocations see the same device.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use permit_core::{Permission, PermissionPlatform};

use crate::prompt::DialogAnswer;

/// Grant state of one permission on the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceGrant {
    #[default]
    NotRequested,
    Granted,
    /// Denied once; the platform now asks for an explanation.
    Denied,
    /// Denied with "don't ask again"; the dialog is no longer shown.
    DeniedForever,
}

impl DeviceGrant {
    pub const fn is_granted(self) -> bool {
        matches!(self, Self::Granted)
    }

    /// State after the user answers the platform dialog.
    ///
    /// "Don't ask again" is only offered after a first denial, so it counts
    /// as a plain denial the first time round.
    pub const fn after(self, answer: DialogAnswer) -> Self {
        match (answer, self) {
            (DialogAnswer::Allow, _) => Self::Granted,
            (DialogAnswer::Deny, _) | (DialogAnswer::Never, Self::NotRequested | Self::Granted) => {
                Self::Denied
            }
            (DialogAnswer::Never, Self::Denied | Self::DeniedForever) => Self::DeniedForever,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotRequested => "not requested",
            Self::Granted => "granted",
            Self::Denied => "denied",
            Self::DeniedForever => "denied forever",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct DeviceFile {
    #[serde(default)]
    permissions: BTreeMap<Permission, DeviceGrant>,
}

impl DeviceFile {
    fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read device state {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse device state {}", path.display()))
    }

    fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write device state {}", path.display()))
    }
}

/// File-backed device implementing [`PermissionPlatform`].
#[derive(Debug)]
pub struct SimulatedDevice {
    path: PathBuf,
    state: Mutex<DeviceFile>,
}

impl SimulatedDevice {
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let state = DeviceFile::load(&path)?;
        debug!(path = %path.display(), known = state.permissions.len(), "Opened device state");
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    fn lock(&self) -> MutexGuard<'_, DeviceFile> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn grant(&self, permission: Permission) -> DeviceGrant {
        self.lock()
            .permissions
            .get(&permission)
            .copied()
            .unwrap_or_default()
    }

    /// Permissions the device has a record for.
    pub fn known(&self) -> Vec<Permission> {
        self.lock().permissions.keys().copied().collect()
    }

    /// Apply a dialog answer and persist the new state.
    pub fn record(&self, permission: Permission, answer: DialogAnswer) -> anyhow::Result<DeviceGrant> {
        let mut state = self.lock();
        let before = state.permissions.get(&permission).copied().unwrap_or_default();
        let after = before.after(answer);
        let mut next = state.clone();
        next.permissions.insert(permission, after);
        next.save(&self.path)?;
        *state = next;
        debug!(%permission, from = before.as_str(), to = after.as_str(), "Device state changed");
        Ok(after)
    }

    /// Forget every decision.
    pub fn reset(&self) -> anyhow::Result<()> {
        let mut state = self.lock();
        DeviceFile::default().save(&self.path)?;
        state.permissions.clear();
        Ok(())
    }
}

impl PermissionPlatform for SimulatedDevice {
    fn is_granted(&self, permission: Permission) -> bool {
        self.grant(permission).is_granted()
    }

    fn should_show_rationale(&self, permission: Permission) -> bool {
        self.grant(permission) == DeviceGrant::Denied
    }

    fn open_app_settings(&self) {
        info!(
            path = %self.path.display(),
            "Settings: edit the device state file to change permanently denied permissions"
        );
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use Permission::{Camera, RecordAudio};

    #[test]
    fn lifecycle_follows_the_platform() {
        let dir = tempfile::tempdir().unwrap();
        let device = SimulatedDevice::open(dir.path().join("device.json")).unwrap();

        assert!(!device.should_show_rationale(Camera));

        device.record(Camera, DialogAnswer::Deny).unwrap();
        assert!(device.should_show_rationale(Camera));
        assert!(!device.is_granted(Camera));

        device.record(Camera, DialogAnswer::Never).unwrap();
        assert!(!device.should_show_rationale(Camera));
        assert_eq!(device.grant(Camera), DeviceGrant::DeniedForever);

        device.record(Camera, DialogAnswer::Allow).unwrap();
        assert!(device.is_granted(Camera));
    }

    #[test]
    fn never_on_first_ask_is_a_plain_denial() {
        assert_eq!(
            DeviceGrant::NotRequested.after(DialogAnswer::Never),
            DeviceGrant::Denied
        );
    }

    #[test]
    fn state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("device.json");
        {
            let device = SimulatedDevice::open(&path).unwrap();
            device.record(RecordAudio, DialogAnswer::Allow).unwrap();
        }

        let device = SimulatedDevice::open(&path).unwrap();
        assert!(device.is_granted(RecordAudio));
        assert_eq!(device.known(), vec![RecordAudio]);

        device.reset().unwrap();
        let device = SimulatedDevice::open(&path).unwrap();
        assert!(device.known().is_empty());
    }

    #[test]
    fn failed_write_keeps_previous_state() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();

        let device = SimulatedDevice::open(blocker.join("device.json")).unwrap();
        assert!(device.record(Camera, DialogAnswer::Allow).is_err());
        assert_eq!(device.grant(Camera), DeviceGrant::NotRequested);
    }

    #[test]
    fn corrupt_state_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(SimulatedDevice::open(&path).is_err());
    }
}
