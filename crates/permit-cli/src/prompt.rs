use anyhow::Result;
use clap::ValueEnum;
use dialoguer::{Confirm, Select};

use permit_core::Permission;

use crate::device::DeviceGrant;

/// Answer to the simulated platform dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DialogAnswer {
    Allow,
    Deny,
    /// Deny and don't ask again.
    Never,
}

/// Fixed answers for non-interactive runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptedAnswers {
    pub dialog: Option<DialogAnswer>,
    pub rationale: Option<bool>,
}

/// Show the platform permission dialog.
pub fn platform_dialog(
    permission: Permission,
    current: DeviceGrant,
    scripted: Option<DialogAnswer>,
) -> Result<DialogAnswer> {
    if let Some(answer) = scripted {
        return Ok(answer);
    }

    let mut items = vec!["Allow", "Deny"];
    if current == DeviceGrant::Denied {
        items.push("Deny & don't ask again");
    }
    let selection = Select::new()
        .with_prompt(format!("Allow access to {}?", permission.short_name()))
        .items(&items)
        .default(0)
        .interact()?;

    Ok(match selection {
        0 => DialogAnswer::Allow,
        1 => DialogAnswer::Deny,
        _ => DialogAnswer::Never,
    })
}

/// Explain why `permission` is needed. Returns `true` to go on to the dialog.
pub fn confirm_rationale(permission: Permission, message: &str, scripted: Option<bool>) -> Result<bool> {
    if let Some(answer) = scripted {
        return Ok(answer);
    }
    let confirmed = Confirm::new()
        .with_prompt(format!("{message}\nAsk for {} again?", permission.short_name()))
        .default(true)
        .interact()?;
    Ok(confirmed)
}
