//! Integration tests for the feedly-client binary

use assert_cmd::Command;
use tempfile::TempDir;

fn feedly_client() -> Command {
    Command::cargo_bin("feedly-client").unwrap()
}

#[test]
fn test_help_lists_subcommands() {
    let output = feedly_client().arg("--help").output().unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["setup-auth", "list-streams", "stream-entries", "export-iocs"] {
        assert!(stdout.contains(command), "missing {command} in help");
    }
}

#[test]
fn test_unknown_export_format_is_rejected() {
    feedly_client()
        .args(["export-iocs", "--format", "xml"])
        .assert()
        .failure();
}

#[test]
fn test_missing_token_exits_with_error() {
    let token_dir = TempDir::new().unwrap();

    feedly_client()
        .args(["--token-dir", token_dir.path().to_str().unwrap(), "list-streams"])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn test_setup_auth_stores_token() {
    let token_dir = TempDir::new().unwrap();

    feedly_client()
        .args([
            "--token-dir",
            token_dir.path().to_str().unwrap(),
            "setup-auth",
            "--token",
            "abc123",
        ])
        .assert()
        .success();

    let stored = std::fs::read_to_string(token_dir.path().join("access.token")).unwrap();
    assert_eq!(stored.trim(), "abc123");
}

#[test]
fn test_setup_auth_keeps_existing_token_without_overwrite() {
    let token_dir = TempDir::new().unwrap();
    std::fs::write(token_dir.path().join("access.token"), "old").unwrap();

    feedly_client()
        .args([
            "--token-dir",
            token_dir.path().to_str().unwrap(),
            "setup-auth",
            "--token",
            "new",
        ])
        .assert()
        .success();

    let stored = std::fs::read_to_string(token_dir.path().join("access.token")).unwrap();
    assert_eq!(stored, "old");
}
