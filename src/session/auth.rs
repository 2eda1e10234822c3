//! Credentials and file-backed token storage
//!
//! A token directory holds `access.token` (required) and `refresh.token`
//! (optional), both plain text. When a session refreshes a file-backed
//! credential the new access token is written back to `access.token`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::session::config::{DEFAULT_CLIENT_ID, DEFAULT_CLIENT_SECRET};

/// Access token file name inside a token directory
pub const ACCESS_TOKEN_FILE: &str = "access.token";
/// Refresh token file name inside a token directory
pub const REFRESH_TOKEN_FILE: &str = "refresh.token";

/// Errors from credential storage
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Token directory does not exist
    #[error("token directory {0} does not exist")]
    MissingDirectory(PathBuf),

    /// Token file missing or unreadable
    #[error("failed to read {path}: {source}")]
    Read {
        /// File that could not be read
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },

    /// Token file could not be written
    #[error("failed to write {path}: {source}")]
    Write {
        /// File that could not be written
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },

    /// Token was empty after trimming
    #[error("token is empty")]
    EmptyToken,
}

/// Bearer credential owned by a session
#[derive(Debug, Clone)]
pub struct Auth {
    /// Client id sent on token refresh
    pub client_id: String,
    /// Client secret sent on token refresh
    pub client_secret: String,
    auth_token: Option<String>,
    refresh_token: Option<String>,
    token_path: Option<PathBuf>,
}

impl Auth {
    /// In-memory credential with the developer client id/secret
    pub fn new(auth_token: impl Into<String>) -> Self {
        Self {
            client_id: DEFAULT_CLIENT_ID.to_string(),
            client_secret: DEFAULT_CLIENT_SECRET.to_string(),
            auth_token: Some(auth_token.into()).filter(|t: &String| !t.is_empty()),
            refresh_token: None,
            token_path: None,
        }
    }

    /// Load a file-backed credential from a token directory
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, AuthError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(AuthError::MissingDirectory(dir.to_path_buf()));
        }

        let token_path = dir.join(ACCESS_TOKEN_FILE);
        let auth_token = read_token(&token_path)?;

        let refresh_path = dir.join(REFRESH_TOKEN_FILE);
        let refresh_token = if refresh_path.is_file() {
            Some(read_token(&refresh_path)?).filter(|t| !t.is_empty())
        } else {
            None
        };

        debug!(
            dir = %dir.display(),
            has_refresh_token = refresh_token.is_some(),
            "Loaded credentials"
        );

        Ok(Self {
            client_id: DEFAULT_CLIENT_ID.to_string(),
            client_secret: DEFAULT_CLIENT_SECRET.to_string(),
            auth_token: Some(auth_token).filter(|t| !t.is_empty()),
            refresh_token,
            token_path: Some(token_path),
        })
    }

    /// Set the refresh token
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into()).filter(|t| !t.is_empty());
        self
    }

    /// Set the client id/secret used for refresh
    pub fn with_client(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.client_id = client_id.into();
        self.client_secret = client_secret.into();
        self
    }

    /// Current access token
    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    /// Refresh token, if any
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    /// Whether the access token is persisted to disk
    pub fn is_file_backed(&self) -> bool {
        self.token_path.is_some()
    }

    /// Replace the access token, writing it through for file-backed credentials
    ///
    /// The in-memory token is updated even when the write fails.
    pub fn set_auth_token(&mut self, token: impl Into<String>) -> Result<(), AuthError> {
        let token = token.into();
        if let Some(path) = self.replace_auth_token(token.clone()) {
            fs::write(&path, &token).map_err(|source| AuthError::Write {
                path: path.clone(),
                source,
            })?;
            info!(path = %path.display(), "Stored access token");
        }
        Ok(())
    }

    /// Replace the in-memory access token only
    ///
    /// Returns the file the token should be persisted to, if file-backed.
    pub fn replace_auth_token(&mut self, token: impl Into<String>) -> Option<PathBuf> {
        self.auth_token = Some(token.into());
        self.token_path.clone()
    }
}

/// Write an access token file without blocking the runtime
pub async fn persist_auth_token(path: &Path, token: &str) -> Result<(), AuthError> {
    tokio::fs::write(path, token)
        .await
        .map_err(|source| AuthError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    info!(path = %path.display(), "Stored access token");
    Ok(())
}

/// `~/.config/feedly`, or `./.config/feedly` when no home directory is known
pub fn default_token_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("feedly")
}

/// Write an access token into `dir`, creating the directory
///
/// Returns `false` without touching the file when a token already exists
/// and `overwrite` is not set.
pub fn setup_auth(dir: impl AsRef<Path>, token: &str, overwrite: bool) -> Result<bool, AuthError> {
    let dir = dir.as_ref();
    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::EmptyToken);
    }

    fs::create_dir_all(dir).map_err(|source| AuthError::Write {
        path: dir.to_path_buf(),
        source,
    })?;

    let path = dir.join(ACCESS_TOKEN_FILE);
    if path.exists() && !overwrite {
        debug!(path = %path.display(), "Access token already present");
        return Ok(false);
    }

    fs::write(&path, token).map_err(|source| AuthError::Write {
        path: path.clone(),
        source,
    })?;
    Ok(true)
}

fn read_token(path: &Path) -> Result<String, AuthError> {
    fs::read_to_string(path)
        .map(|text| text.trim().to_string())
        .map_err(|source| AuthError::Read {
            path: path.to_path_buf(),
            source,
        })
}
