#![allow(clippy::unwrap_used)] // Integration tests use unwrap for brevity

//! End-to-end runs of the CLI commands against a simulated device.
//!
//! Every session uses scripted answers, so nothing touches the terminal.

use std::path::Path;

use permit_cli::commands::{self, Command};
use permit_cli::device::DeviceGrant;
use permit_cli::prompt::{DialogAnswer, ScriptedAnswers};
use permit_cli::session::{Session, StatePaths};
use permit_core::{Config, GrantOutcome, Permission};

use Permission::{Camera, RecordAudio};

fn session(dir: &Path, dialog: Option<DialogAnswer>, rationale: Option<bool>) -> Session {
    let paths = StatePaths {
        flags: dir.join("flags.json"),
        device: dir.join("device.json"),
    };
    Session::start(
        Config::default(),
        &paths,
        ScriptedAnswers { dialog, rationale },
    )
    .unwrap()
}

async fn ask(session: &Session, permissions: &[Permission], rationale: bool) -> (GrantOutcome, String) {
    let mut out = Vec::new();
    let result = commands::ask(session, permissions, rationale, None, &mut out)
        .await
        .unwrap();
    (
        result.outcome(permissions[0]).unwrap(),
        String::from_utf8(out).unwrap(),
    )
}

#[tokio::test]
async fn allow_is_remembered_across_sessions() {
    let dir = tempfile::tempdir().unwrap();

    let first = session(dir.path(), Some(DialogAnswer::Allow), None);
    let (outcome, out) = ask(&first, &[Camera], false).await;
    assert_eq!(outcome, GrantOutcome::Granted);
    assert!(out.contains("CAMERA"));
    assert!(out.contains("granted"));
    drop(first);

    // Already granted: the dialog is skipped even with a scripted denial
    let second = session(dir.path(), Some(DialogAnswer::Deny), None);
    assert!(second.coordinator.is_all_granted(&[Camera]));
    let (outcome, _) = ask(&second, &[Camera], false).await;
    assert_eq!(outcome, GrantOutcome::Granted);
}

#[tokio::test]
async fn deny_then_never_becomes_permanent() {
    let dir = tempfile::tempdir().unwrap();

    let first = session(dir.path(), Some(DialogAnswer::Deny), None);
    let (outcome, _) = ask(&first, &[Camera], false).await;
    assert_eq!(outcome, GrantOutcome::Denied);
    assert_eq!(first.device.grant(Camera), DeviceGrant::Denied);
    drop(first);

    let second = session(dir.path(), Some(DialogAnswer::Never), None);
    let (outcome, out) = ask(&second, &[Camera], false).await;
    assert_eq!(outcome, GrantOutcome::PermanentlyDenied);
    assert!(out.contains("permanently denied"));
    drop(second);

    // With a rationale handler the permission is reported without any prompt
    let third = session(dir.path(), Some(DialogAnswer::Allow), Some(true));
    let (outcome, _) = ask(&third, &[Camera], true).await;
    assert_eq!(outcome, GrantOutcome::PermanentlyDenied);
    assert_eq!(third.device.grant(Camera), DeviceGrant::DeniedForever);
}

#[tokio::test]
async fn declined_rationale_keeps_denial() {
    let dir = tempfile::tempdir().unwrap();

    let first = session(dir.path(), Some(DialogAnswer::Deny), None);
    ask(&first, &[RecordAudio], false).await;
    drop(first);

    let second = session(dir.path(), Some(DialogAnswer::Allow), Some(false));
    let (outcome, _) = ask(&second, &[RecordAudio], true).await;
    assert_eq!(outcome, GrantOutcome::Denied);
    assert_eq!(second.device.grant(RecordAudio), DeviceGrant::Denied);
    drop(second);

    let third = session(dir.path(), Some(DialogAnswer::Allow), Some(true));
    let (outcome, _) = ask(&third, &[RecordAudio], true).await;
    assert_eq!(outcome, GrantOutcome::Granted);
}

#[tokio::test]
async fn status_and_reset() {
    let dir = tempfile::tempdir().unwrap();
    let session = session(dir.path(), Some(DialogAnswer::Deny), None);
    ask(&session, &[Camera], false).await;

    let mut out = Vec::new();
    commands::run(&session, Command::Status { permissions: vec![] }, &mut out)
        .await
        .unwrap();
    let out = String::from_utf8(out).unwrap();
    assert!(out.contains("CAMERA"));
    assert!(out.contains("rationale due"));

    let mut out = Vec::new();
    commands::run(&session, Command::Reset, &mut out).await.unwrap();
    assert!(session.device.known().is_empty());

    let mut out = Vec::new();
    commands::status(&session, &[], &mut out).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "No permissions requested yet.\n");
}

#[test]
fn unknown_permission_names_are_rejected() {
    let parsed = commands::parse_permissions(&["camera".to_string(), "RECORD_AUDIO".to_string()])
        .unwrap();
    assert_eq!(parsed, vec![Camera, RecordAudio]);

    assert!(commands::parse_permissions(&["TELEPORT".to_string()]).is_err());
}
