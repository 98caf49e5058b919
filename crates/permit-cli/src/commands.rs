//! CLI subcommands.
//!
//! User-facing output uses writeln! to the given writer (stdout in the binary).

use std::io::Write;
use std::sync::Arc;

use anyhow::bail;
use clap::Subcommand;
use tracing::info;

use permit_coordinator::RationaleHandler;
use permit_core::{FlagStore, GrantOutcome, Permission, PermissionResult};

use crate::device::DeviceGrant;
use crate::session::Session;
use crate::terminal::TerminalPresenter;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Ask for one or more permissions
    Ask {
        /// Permission names, e.g. CAMERA or android.permission.CAMERA
        #[arg(required = true)]
        permissions: Vec<String>,
        /// Explain permissions the device flags before asking again
        #[arg(long)]
        rationale: bool,
        /// Request code (defaults to the configured ask code)
        #[arg(long)]
        code: Option<i32>,
    },
    /// Show the device state of permissions (all known ones by default)
    Status {
        permissions: Vec<String>,
    },
    /// Forget every decision and rationale flag
    Reset,
}

/// Execute a subcommand.
pub async fn run(session: &Session, command: Command, out: &mut impl Write) -> anyhow::Result<()> {
    match command {
        Command::Ask {
            permissions,
            rationale,
            code,
        } => {
            let permissions = parse_permissions(&permissions)?;
            ask(session, &permissions, rationale, code, out).await?;
        }
        Command::Status { permissions } => {
            let permissions = parse_permissions(&permissions)?;
            status(session, &permissions, out)?;
        }
        Command::Reset => reset(session, out).await?,
    }
    Ok(())
}

/// Resolve names to permissions. Unknown names are an error.
pub fn parse_permissions(names: &[String]) -> anyhow::Result<Vec<Permission>> {
    names
        .iter()
        .map(|name| match Permission::lookup(name) {
            Permission::Unknown => bail!("Unknown permission: {name}"),
            permission => Ok(permission),
        })
        .collect()
}

fn rationale_message(session: &Session, permission: Permission) -> String {
    session
        .config
        .rationale
        .messages
        .get(&permission)
        .cloned()
        .unwrap_or_else(|| format!("{} is needed for this feature to work.", permission.short_name()))
}

/// Ask for `permissions` and print the outcome of each.
pub async fn ask(
    session: &Session,
    permissions: &[Permission],
    rationale: bool,
    code: Option<i32>,
    out: &mut impl Write,
) -> anyhow::Result<PermissionResult> {
    let code = code.unwrap_or(session.config.requests.ask_code);
    let handler = rationale.then(|| {
        RationaleHandler::builder(Arc::new(TerminalPresenter::new(session.answers.rationale)))
            .messages(
                permissions
                    .iter()
                    .map(|&p| (p, rationale_message(session, p))),
            )
            .build()
    });

    let result = session
        .coordinator
        .ask_for_permissions(permissions, code, handler.as_ref())
        .await?;

    for permission in permissions {
        writeln!(out, "{:<24} {}", permission.short_name(), result.outcome(*permission)?)?;
    }
    if !result.permanently_denied().is_empty() {
        writeln!(
            out,
            "\nSome permissions are permanently denied. Enable them in the app settings."
        )?;
        session.coordinator.open_app_settings();
    }
    info!(%result, "Ask finished");
    Ok(result)
}

/// Print what the device and the flag store know about `permissions`.
pub fn status(session: &Session, permissions: &[Permission], out: &mut impl Write) -> anyhow::Result<()> {
    let permissions = if permissions.is_empty() {
        session.device.known()
    } else {
        permissions.to_vec()
    };
    if permissions.is_empty() {
        writeln!(out, "No permissions requested yet.")?;
        return Ok(());
    }

    let oracle = session.coordinator.oracle();
    for permission in permissions {
        let device = session.device.grant(permission);
        let label = if oracle.is_permanently_denied(permission) {
            GrantOutcome::PermanentlyDenied.as_str()
        } else if device == DeviceGrant::Denied {
            "denied (rationale due)"
        } else {
            device.as_str()
        };
        writeln!(out, "{:<24} {label}", permission.short_name())?;
    }
    Ok(())
}

/// Drop pending requests and wipe durable state.
pub async fn reset(session: &Session, out: &mut impl Write) -> anyhow::Result<()> {
    session.coordinator.reset().await;
    session.device.reset()?;
    session.flags.clear()?;
    writeln!(out, "Device state cleared.")?;
    Ok(())
}
