//! Integration tests for file-backed credentials

use feedly_client::session::{setup_auth, Auth, AuthError};
use tempfile::TempDir;

#[test]
fn test_setup_then_load() {
    let dir = TempDir::new().unwrap();
    let token_dir = dir.path().join("feedly");

    assert!(setup_auth(&token_dir, " my-token \n", false).unwrap());
    let auth = Auth::from_dir(&token_dir).unwrap();

    assert_eq!(auth.auth_token(), Some("my-token"));
    assert_eq!(auth.refresh_token(), None);
    assert!(auth.is_file_backed());
}

#[test]
fn test_setup_does_not_overwrite_by_default() {
    let dir = TempDir::new().unwrap();
    setup_auth(dir.path(), "first", false).unwrap();

    assert!(!setup_auth(dir.path(), "second", false).unwrap());
    assert_eq!(Auth::from_dir(dir.path()).unwrap().auth_token(), Some("first"));

    assert!(setup_auth(dir.path(), "second", true).unwrap());
    assert_eq!(Auth::from_dir(dir.path()).unwrap().auth_token(), Some("second"));
}

#[test]
fn test_refresh_token_is_optional() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("access.token"), "a").unwrap();
    std::fs::write(dir.path().join("refresh.token"), "r\n").unwrap();

    let auth = Auth::from_dir(dir.path()).unwrap();
    assert_eq!(auth.refresh_token(), Some("r"));
}

#[test]
fn test_missing_directory_and_file() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        Auth::from_dir(dir.path().join("nope")),
        Err(AuthError::MissingDirectory(_))
    ));
    assert!(matches!(
        Auth::from_dir(dir.path()),
        Err(AuthError::Read { .. })
    ));
}
