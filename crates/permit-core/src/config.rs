//! Configuration resolution for permit.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/permit/settings.json)
//! 3. Project config (.permit/settings.json)
//! 4. Environment variables
//! 5. CLI arguments (highest priority, applied by the caller)

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::catalog::Permission;
use crate::error::{Error, Result};

/// Complete permit configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub requests: RequestConfig,
    #[serde(default)]
    pub rationale: RationaleConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Default request codes per entry point.
///
/// Codes are only used for bookkeeping; they never affect matching.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RequestConfig {
    pub ask_code: i32,
    pub run_code: i32,
    pub await_code: i32,
    pub await_granted_code: i32,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            ask_code: 20,
            run_code: 40,
            await_code: 60,
            await_granted_code: 80,
        }
    }
}

/// Rationale messages, keyed by permission.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RationaleConfig {
    #[serde(default)]
    pub messages: BTreeMap<Permission, String>,
}

/// Where durable state lives.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// Rationale flag file. Defaults to [`default_flags_path`].
    pub flags_path: Option<PathBuf>,
}

impl StorageConfig {
    pub fn resolved_flags_path(&self) -> Option<PathBuf> {
        self.flags_path.clone().or_else(default_flags_path)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// One config file. Only the fields present in the file are set.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ConfigLayer {
    requests: RequestLayer,
    rationale: RationaleConfig,
    storage: StorageConfig,
    logging: LoggingLayer,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
struct RequestLayer {
    ask_code: Option<i32>,
    run_code: Option<i32>,
    await_code: Option<i32>,
    await_granted_code: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct LoggingLayer {
    level: Option<String>,
    json: Option<bool>,
}

/// Load configuration with hierarchical resolution.
pub fn load_config(project_dir: Option<&Path>) -> Result<Config> {
    let mut config = Config::default();

    // Load global config
    if let Some(global_path) = global_config_path()
        && global_path.exists()
    {
        let global = load_config_file(&global_path)?;
        merge_config(&mut config, global);
    }

    // Load project config
    if let Some(dir) = project_dir {
        let project_path = dir.join(".permit").join("settings.json");
        if project_path.exists() {
            let project = load_config_file(&project_path)?;
            merge_config(&mut config, project);
        }
    }

    apply_env_overrides(&mut config);

    Ok(config)
}

fn config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(".config")))
            .map(|p| p.join("permit"))
    }
    #[cfg(target_os = "macos")]
    {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join("Library/Application Support/permit"))
    }
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .ok()
            .map(|h| PathBuf::from(h).join(".permit"))
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        None
    }
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("settings.json"))
}

/// Default location of the rationale flag file.
pub fn default_flags_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("flags.json"))
}

fn load_config_file(path: &Path) -> Result<ConfigLayer> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

fn merge_config(base: &mut Config, overlay: ConfigLayer) {
    let requests = overlay.requests;
    if let Some(code) = requests.ask_code {
        base.requests.ask_code = code;
    }
    if let Some(code) = requests.run_code {
        base.requests.run_code = code;
    }
    if let Some(code) = requests.await_code {
        base.requests.await_code = code;
    }
    if let Some(code) = requests.await_granted_code {
        base.requests.await_granted_code = code;
    }

    // Messages accumulate; later layers override per permission
    base.rationale.messages.extend(overlay.rationale.messages);

    if overlay.storage.flags_path.is_some() {
        base.storage.flags_path = overlay.storage.flags_path;
    }

    if let Some(level) = overlay.logging.level {
        base.logging.level = level;
    }
    if let Some(json) = overlay.logging.json {
        base.logging.json = json;
    }
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(val) = std::env::var("PERMIT_LOG_LEVEL") {
        config.logging.level = val;
    }
    if let Ok(val) = std::env::var("PERMIT_LOG_JSON") {
        config.logging.json = matches!(val.as_str(), "1" | "true" | "yes");
    }
    if let Ok(val) = std::env::var("PERMIT_FLAGS_PATH") {
        config.storage.flags_path = Some(PathBuf::from(val));
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_request_codes() {
        let config = Config::default();
        assert_eq!(config.requests.ask_code, 20);
        assert_eq!(config.requests.run_code, 40);
        assert_eq!(config.requests.await_code, 60);
        assert_eq!(config.requests.await_granted_code, 80);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"rationale":{"messages":{"android.permission.CAMERA":"We need the camera"}}}"#,
        )
        .unwrap();

        let mut config = Config::default();
        merge_config(&mut config, load_config_file(&path).unwrap());
        assert_eq!(config.requests, RequestConfig::default());
        assert_eq!(
            config.rationale.messages.get(&Permission::Camera).map(String::as_str),
            Some("We need the camera")
        );
    }

    #[test]
    fn partial_sections_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"requests":{"ask_code":7},"logging":{"level":"debug"}}"#,
        )
        .unwrap();

        let mut config = Config::default();
        merge_config(&mut config, load_config_file(&path).unwrap());
        assert_eq!(config.requests.ask_code, 7);
        assert_eq!(config.requests.run_code, 40);
        assert_eq!(config.logging.level, "debug");
        assert!(!config.logging.json);

        let direct: Config = serde_json::from_str(r#"{"requests":{"ask_code":7}}"#).unwrap();
        assert_eq!(direct.requests.await_granted_code, 80);
    }

    #[test]
    fn later_layer_keeps_unset_fields() {
        let mut config = Config::default();
        merge_config(
            &mut config,
            serde_json::from_str(r#"{"requests":{"ask_code":7},"logging":{"level":"debug"}}"#)
                .unwrap(),
        );
        merge_config(
            &mut config,
            serde_json::from_str(
                r#"{"rationale":{"messages":{"android.permission.CAMERA":"camera"}}}"#,
            )
            .unwrap(),
        );

        assert_eq!(config.requests.ask_code, 7);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.rationale.messages.len(), 1);
    }

    #[test]
    fn merge_keeps_base_messages() {
        let mut base = Config::default();
        base.rationale
            .messages
            .insert(Permission::Camera, "camera".to_string());
        let mut overlay = ConfigLayer::default();
        overlay
            .rationale
            .messages
            .insert(Permission::RecordAudio, "mic".to_string());
        overlay.storage.flags_path = Some(PathBuf::from("/tmp/flags.json"));

        merge_config(&mut base, overlay);

        assert_eq!(base.rationale.messages.len(), 2);
        assert_eq!(base.storage.flags_path, Some(PathBuf::from("/tmp/flags.json")));
    }

    #[test]
    fn project_config_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let settings = dir.path().join(".permit");
        std::fs::create_dir_all(&settings).unwrap();
        std::fs::write(
            settings.join("settings.json"),
            r#"{"requests":{"ask_code":7,"run_code":8,"await_code":9,"await_granted_code":10}}"#,
        )
        .unwrap();

        let config = load_config(Some(dir.path())).unwrap();
        assert_eq!(config.requests.ask_code, 7);
    }

    #[test]
    fn malformed_project_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let settings = dir.path().join(".permit");
        std::fs::create_dir_all(&settings).unwrap();
        std::fs::write(settings.join("settings.json"), "{").unwrap();

        assert!(matches!(
            load_config(Some(dir.path())),
            Err(Error::Config(_))
        ));
    }
}
