mod helpers;

use std::fs;
use std::process::Command;

use camino::Utf8PathBuf;
use helpers::{ScriptedExecutor, context, passthrough_utilities, utf8_dir, write_file};
use rsbackup::BackupError;
use rsbackup::adapter::{Adapter, SvnSyncConfig};
use rsbackup::bootstrap::{BootstrapState, ensure_initialized};
use rsbackup::executor::{ExecutionResult, RealCommandExecutor};
use tempfile::tempdir;

fn config(mirror: Utf8PathBuf) -> SvnSyncConfig {
    SvnSyncConfig {
        username: Some("jimmy".into()),
        password: Some("secret".into()),
        host: Some("foo.com".into()),
        repo_path: Some("/my/repo".into()),
        path: Some(mirror),
        ..Default::default()
    }
}

fn not_a_working_copy(path: &Utf8PathBuf) -> ExecutionResult {
    ExecutionResult::exited(1, "", format!("svn: '{}' is not a working copy\n", path))
}

fn missing_repository(path: &Utf8PathBuf) -> ExecutionResult {
    ExecutionResult::exited(
        1,
        "",
        format!(
            "svnlook: E000002: Can't open file '{}/format': No such file or directory\n",
            path
        ),
    )
}

fn has_utility(name: &str) -> bool {
    which::which(name).is_ok()
}

#[test]
fn uninitialized_mirror_runs_init_sequence_then_sync() {
    let tmp = tempdir().unwrap();
    let mirror = utf8_dir(&tmp).join("my/repo");
    let executor = ScriptedExecutor::new()
        .respond("probe", not_a_working_copy(&mirror))
        .respond(
            "remote_init",
            ExecutionResult::exited(0, "Copied properties for revision 0.\n", ""),
        )
        .respond("sync", ExecutionResult::exited(0, "Committed revision 1.\n", ""));
    let utilities = passthrough_utilities();
    let dump_dir = utf8_dir(&tmp);
    let ctx = context(&executor, &utilities, &dump_dir, None);

    config(mirror.clone()).perform(&ctx).expect("perform should succeed");

    assert_eq!(
        executor.actions(),
        vec!["probe", "create", "write_hook", "chmod_hook", "remote_init", "sync"]
    );
    let hook = mirror.join("hooks/pre-revprop-change");
    assert_eq!(
        executor.command_lines(),
        vec![
            format!("svnlook uuid '{}'", mirror),
            format!("svnadmin create '{}'", mirror),
            format!("echo '#!/bin/sh' > '{}'", hook),
            format!("chmod +x '{}'", hook),
            format!(
                "svnsync init file://{} http://foo.com:80/my/repo {}",
                mirror, "--source-username jimmy --source-password secret"
            ),
            format!(
                "svnsync sync file://{} {}",
                mirror, "--source-username jimmy --source-password secret --non-interactive"
            ),
        ]
    );
    assert!(mirror.is_dir(), "mirror directory is created before probing");
}

#[test]
fn empty_mirror_directory_is_initialized() {
    let tmp = tempdir().unwrap();
    let mirror = utf8_dir(&tmp).join("mirror");
    let executor = ScriptedExecutor::new()
        .respond("probe", missing_repository(&mirror))
        .respond(
            "remote_init",
            ExecutionResult::exited(0, "Copied properties for revision 0.\n", ""),
        );
    let utilities = passthrough_utilities();
    let dump_dir = utf8_dir(&tmp);
    let ctx = context(&executor, &utilities, &dump_dir, None);

    config(mirror).perform(&ctx).expect("perform should succeed");

    assert_eq!(
        executor.actions(),
        vec!["probe", "create", "write_hook", "chmod_hook", "remote_init", "sync"]
    );
}

#[test]
fn existing_repository_is_not_reinitialized() {
    let tmp = tempdir().unwrap();
    let mirror = utf8_dir(&tmp).join("mirror");
    write_file(&mirror, "format", b"5\n");
    fs::create_dir_all(mirror.join("db")).unwrap();
    let executor = ScriptedExecutor::new().respond(
        "probe",
        ExecutionResult::exited(0, "3f9a8c1e-5b2d-4e7a-9c3b-1d2e3f4a5b6c\n", ""),
    );
    let utilities = passthrough_utilities();
    let dump_dir = utf8_dir(&tmp);
    let ctx = context(&executor, &utilities, &dump_dir, None);

    config(mirror).perform(&ctx).expect("perform should succeed");

    assert_eq!(executor.actions(), vec!["probe", "sync"]);
}

#[test]
fn real_repository_reads_as_initialized() {
    if !has_utility("svnadmin") || !has_utility("svnlook") {
        eprintln!("svnadmin/svnlook not available; skipping");
        return;
    }

    let tmp = tempdir().unwrap();
    let mirror = utf8_dir(&tmp).join("mirror");
    let created = Command::new("svnadmin")
        .arg("create")
        .arg(mirror.as_str())
        .status()
        .unwrap();
    assert!(created.success());

    let cfg = config(mirror);
    let utilities = passthrough_utilities();
    let executor = RealCommandExecutor { dry_run: false };
    let state = ensure_initialized(&cfg.mirror(&utilities), &executor).unwrap();
    assert_eq!(state, BootstrapState::Initialized);
}

#[test]
fn silent_sync_failure_is_reported() {
    let tmp = tempdir().unwrap();
    let mirror = utf8_dir(&tmp).join("mirror");
    let executor = ScriptedExecutor::new().respond("sync", ExecutionResult::exited(1, "", ""));
    let utilities = passthrough_utilities();
    let dump_dir = utf8_dir(&tmp);
    let ctx = context(&executor, &utilities, &dump_dir, None);

    let err = config(mirror).perform(&ctx).expect_err("non-zero silent exit must fail");
    assert!(
        matches!(&err, BackupError::ToolReportedFailure { action, .. } if action == "sync"),
        "got {:?}",
        err
    );
}

#[test]
fn silent_init_step_crash_stops_sequence() {
    let tmp = tempdir().unwrap();
    let mirror = utf8_dir(&tmp).join("mirror");
    let executor = ScriptedExecutor::new()
        .respond("probe", missing_repository(&mirror))
        .respond("chmod_hook", ExecutionResult::exited(1, "", ""));
    let utilities = passthrough_utilities();
    let dump_dir = utf8_dir(&tmp);
    let ctx = context(&executor, &utilities, &dump_dir, None);

    config(mirror).perform(&ctx).expect_err("chmod failure aborts");
    assert_eq!(executor.actions(), vec!["probe", "create", "write_hook", "chmod_hook"]);
}

#[test]
fn initialized_mirror_skips_init() {
    let tmp = tempdir().unwrap();
    let mirror = utf8_dir(&tmp).join("mirror");
    let executor = ScriptedExecutor::new();
    let utilities = passthrough_utilities();
    let dump_dir = utf8_dir(&tmp);
    let ctx = context(&executor, &utilities, &dump_dir, None);

    config(mirror).perform(&ctx).expect("perform should succeed");

    assert_eq!(executor.actions(), vec!["probe", "sync"]);
}

#[test]
fn unrecognized_probe_failure_is_ambiguous() {
    let tmp = tempdir().unwrap();
    let mirror = utf8_dir(&tmp).join("mirror");
    let executor = ScriptedExecutor::new().respond(
        "probe",
        ExecutionResult::exited(1, "", "svn: E000013: Can't open file: Permission denied\n"),
    );
    let utilities = passthrough_utilities();
    let dump_dir = utf8_dir(&tmp);
    let ctx = context(&executor, &utilities, &dump_dir, None);

    let err = config(mirror.clone()).perform(&ctx).expect_err("must refuse to guess");
    match &err {
        BackupError::BootstrapAmbiguous { target, output, .. } => {
            assert_eq!(target, mirror.as_str());
            assert!(output.contains("Permission denied"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(executor.actions(), vec!["probe"]);
}

#[test]
fn failed_init_step_stops_sequence() {
    let tmp = tempdir().unwrap();
    let mirror = utf8_dir(&tmp).join("mirror");
    let executor = ScriptedExecutor::new()
        .respond("probe", not_a_working_copy(&mirror))
        .respond(
            "create",
            ExecutionResult::exited(1, "", "svnadmin: E165002: path exists and is non-empty\n"),
        );
    let utilities = passthrough_utilities();
    let dump_dir = utf8_dir(&tmp);
    let ctx = context(&executor, &utilities, &dump_dir, None);

    let err = config(mirror).perform(&ctx).expect_err("create failure aborts");
    assert!(
        matches!(&err, BackupError::ToolReportedFailure { action, .. } if action == "create"),
        "got {:?}",
        err
    );
    assert_eq!(executor.actions(), vec!["probe", "create"]);
}

#[test]
fn remote_init_without_marker_fails_before_sync() {
    let tmp = tempdir().unwrap();
    let mirror = utf8_dir(&tmp).join("mirror");
    let executor = ScriptedExecutor::new()
        .respond("probe", not_a_working_copy(&mirror))
        .respond(
            "remote_init",
            ExecutionResult::exited(0, "", "svnsync: E170013: Unable to connect to a repository\n"),
        );
    let utilities = passthrough_utilities();
    let dump_dir = utf8_dir(&tmp);
    let ctx = context(&executor, &utilities, &dump_dir, None);

    config(mirror).perform(&ctx).expect_err("init failure aborts");
    assert_eq!(
        executor.actions(),
        vec!["probe", "create", "write_hook", "chmod_hook", "remote_init"]
    );
}

#[test]
fn sync_error_marker_fails() {
    let tmp = tempdir().unwrap();
    let mirror = utf8_dir(&tmp).join("mirror");
    let executor = ScriptedExecutor::new().respond(
        "sync",
        ExecutionResult::exited(0, "", "svnsync: E000111: Connection refused\n"),
    );
    let utilities = passthrough_utilities();
    let dump_dir = utf8_dir(&tmp);
    let ctx = context(&executor, &utilities, &dump_dir, None);

    let err = config(mirror).perform(&ctx).expect_err("sync error must fail");
    assert!(matches!(err, BackupError::ToolReportedFailure { .. }));
}

#[test]
fn bootstrap_reports_observed_state() {
    let tmp = tempdir().unwrap();
    let mirror = utf8_dir(&tmp).join("mirror");
    let cfg = config(mirror.clone());
    let utilities = passthrough_utilities();

    let executor = ScriptedExecutor::new();
    let state = ensure_initialized(&cfg.mirror(&utilities), &executor).unwrap();
    assert_eq!(state, BootstrapState::Initialized);

    let executor = ScriptedExecutor::new()
        .respond("probe", not_a_working_copy(&mirror))
        .respond(
            "remote_init",
            ExecutionResult::exited(0, "Copied properties for revision 0.\n", ""),
        );
    let state = ensure_initialized(&cfg.mirror(&utilities), &executor).unwrap();
    assert_eq!(state, BootstrapState::Uninitialized);
    assert_eq!(executor.calls().len(), 5);
}
