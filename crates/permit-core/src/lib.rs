//! `permit` Core Library
//!
//! Shared building blocks for the permission coordinator:
//! - Permission catalog with total key parsing
//! - Grant outcome classification and the result aggregate
//! - Rationale oracle backed by durable flags
//! - Configuration resolution and tracing setup

pub mod catalog;
pub mod config;
pub mod error;
pub mod grant;
pub mod platform;
pub mod prefs;
pub mod rationale;
pub mod result;
pub mod tracing_init;

pub use catalog::Permission;
pub use config::Config;
pub use error::{Error, Result};
pub use grant::GrantOutcome;
pub use platform::PermissionPlatform;
pub use prefs::{FlagStore, JsonFlagStore, MemoryFlagStore};
pub use rationale::{PlatformRationaleOracle, RationaleOracle};
pub use result::PermissionResult;
