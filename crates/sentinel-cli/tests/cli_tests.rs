use std::path::Path;
use std::process::{Command, Output};

use sentinel_vcs::contract::{commit_file, init_git_repo};
use tempfile::tempdir;

const REQUIRED: [&str; 7] = [
    "RS_REQUIRED_PROCESS",
    "RS_API_URL",
    "SERVICE_URL",
    "RS_DEPLOY_TOKEN",
    "GITHUB_TOKEN",
    "GITHUB_REPOSITORY",
    "RS_CONFIG",
];

/// The binary with a scrubbed release environment, run in `dir`.
fn sentinel(dir: &Path, metrics: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_release-sentinel"));
    cmd.current_dir(dir)
        .env("RS_METRICS_DIR", metrics)
        .env("RUST_LOG", "warn")
        .env_remove("RS_ALERT_WEBHOOK")
        .env_remove("RS_SKIP_GIT_CHECKS")
        .env_remove("ENV")
        .env_remove("VERSION");
    for key in REQUIRED {
        cmd.env_remove(key);
    }
    cmd
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).to_string()
}

#[test]
fn unknown_environment_exits_one() {
    let dir = tempdir().unwrap();
    let out = sentinel(dir.path(), dir.path())
        .args(["gate", "--env", "production", "--version", "v1.0.0"])
        .output()
        .unwrap();

    assert_eq!(out.status.code(), Some(1));
    assert!(stdout(&out).contains("invalid environment: production"));
    let metrics = std::fs::read_to_string(dir.path().join("release_sentinel.prom")).unwrap();
    assert!(metrics.contains("release_sentinel_status{result=\"blocked\",env=\"production\"} 0"));
}

#[test]
fn missing_token_exits_one_with_key_named() {
    let dir = tempdir().unwrap();
    let work = dir.path().join("work");
    std::fs::create_dir_all(&work).unwrap();
    init_git_repo(&work, "main").unwrap();

    let out = sentinel(&work, dir.path())
        .env("RS_REQUIRED_PROCESS", "init")
        .env("RS_API_URL", "http://127.0.0.1:9/health")
        .env("GITHUB_REPOSITORY", "acme/shop")
        .args(["gate", "--env", "dev", "--version", "v1.0.0"])
        .output()
        .unwrap();

    assert_eq!(out.status.code(), Some(1));
    assert!(stdout(&out).contains("missing required configuration: RS_DEPLOY_TOKEN"));
}

#[test]
fn env_and_version_can_come_from_environment() {
    let dir = tempdir().unwrap();
    let out = sentinel(dir.path(), dir.path())
        .env("ENV", "dev")
        .env("VERSION", "1.0")
        .env("RS_SKIP_GIT_CHECKS", "true")
        .arg("gate")
        .output()
        .unwrap();

    assert_eq!(out.status.code(), Some(1));
    assert!(stdout(&out).contains("invalid version format: 1.0"));
}

#[test]
fn broken_settings_file_exits_one() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("sentinel.toml");
    std::fs::write(&config, "retry = \"often\"\n").unwrap();

    let out = sentinel(dir.path(), dir.path())
        .arg("--config")
        .arg(&config)
        .args(["gate", "--env", "dev", "--version", "v1.0.0"])
        .output()
        .unwrap();

    assert_eq!(out.status.code(), Some(1));
    assert!(stdout(&out).contains("Release BLOCKED (config)"));
    let metrics = std::fs::read_to_string(dir.path().join("release_sentinel.prom")).unwrap();
    assert!(metrics.contains("release_sentinel_status{result=\"blocked\",env=\"dev\"} 0"));
}

#[test]
fn bad_flag_value_still_writes_metrics() {
    let dir = tempdir().unwrap();
    let metrics = dir.path().join("metrics");

    let out = sentinel(dir.path(), &metrics)
        .env("RS_SKIP_GIT_CHECKS", "maybe")
        .args(["gate", "--env", "stage", "--version", "v1.0.0"])
        .output()
        .unwrap();

    assert_eq!(out.status.code(), Some(1));
    assert!(stdout(&out).contains("RS_SKIP_GIT_CHECKS"));
    let text = std::fs::read_to_string(metrics.join("release_sentinel.prom")).unwrap();
    assert!(text.contains("result=\"blocked\",env=\"stage\""));
}

#[test]
fn notes_lists_commits() {
    let dir = tempdir().unwrap();
    init_git_repo(dir.path(), "main").unwrap();
    commit_file(dir.path(), "a.txt", "a", "add a").unwrap();

    let out = sentinel(dir.path(), dir.path()).args(["notes", "--version", "v0.2.0"]).output().unwrap();

    assert!(out.status.success());
    let text = stdout(&out);
    assert!(text.starts_with("## Changes in v0.2.0\n"));
    assert!(text.contains(" add a\n"));
    assert!(text.contains(" init\n"));
}

#[cfg(unix)]
#[test]
fn failed_rollback_exits_three() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let bin = dir.path().join("bin");
    std::fs::create_dir_all(&bin).unwrap();
    let kubectl = bin.join("kubectl");
    std::fs::write(&kubectl, "#!/bin/sh\necho 'error: deployment \"web\" not found' >&2\nexit 1\n").unwrap();
    std::fs::set_permissions(&kubectl, std::fs::Permissions::from_mode(0o755)).unwrap();
    let path = format!("{}:{}", bin.display(), std::env::var("PATH").unwrap_or_default());

    let out = sentinel(dir.path(), dir.path())
        .env("PATH", path)
        .env("KUBECONFIG", "/nonexistent/kubeconfig")
        .args(["rollback", "--deployment", "web"])
        .output()
        .unwrap();

    assert_eq!(out.status.code(), Some(3));
    let text = stdout(&out);
    assert!(text.contains("deployment/web in default"));
    assert!(!text.contains("/nonexistent/kubeconfig"));
}
