//! CLI error types and conversions

use crate::enterprise::{IocError, MispError};
use crate::metrics::MetricsError;
use crate::output::OutputError;
use crate::registry::RegistryError;
use crate::session::{ApiError, AuthError};

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Credential storage error
    #[error("auth error: {0}")]
    AuthError(#[from] AuthError),

    /// API request error
    #[error("API error: {0}")]
    ApiError(#[from] ApiError),

    /// Stream lookup error
    #[error("lookup error: {0}")]
    RegistryError(#[from] RegistryError),

    /// IoC export error
    #[error("IoC export error: {0}")]
    IocError(#[from] IocError),

    /// MISP upload error
    #[error("MISP error: {0}")]
    MispError(#[from] MispError),

    /// Output error
    #[error("output error: {0}")]
    OutputError(#[from] OutputError),

    /// Metrics exporter error
    #[error("metrics error: {0}")]
    MetricsError(#[from] MetricsError),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
