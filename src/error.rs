//! Error types for Slipway
//!
//! All modules use `SlipwayResult<T>` as their return type. Fatal
//! conditions propagate up to `main`, which decides the process exit
//! code; no component terminates the process itself.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Slipway operations
pub type SlipwayResult<T> = Result<T, SlipwayError>;

/// All errors that can occur in Slipway
#[derive(Error, Debug)]
pub enum SlipwayError {
    // Environment errors
    #[error("Required variable {0} is not set or empty")]
    EnvMissing(String),

    #[error("Invalid value for {name}: {reason}")]
    EnvInvalid { name: String, reason: String },

    #[error("Environment file not found: {0}")]
    EnvFileNotFound(PathBuf),

    #[error("Addons folder does not exist: {0}")]
    AddonsRootMissing(PathBuf),

    #[error("Addons folder is not a directory: {0}")]
    AddonsRootNotDir(PathBuf),

    // Cache errors
    #[error("Failed to persist cache file {path}: {reason}")]
    CacheWrite { path: PathBuf, reason: String },

    // Stack errors
    #[error("Image build failed: {0}")]
    BuildFailed(String),

    #[error("Failed to launch containers: {0}")]
    LaunchFailed(String),

    #[error("Failed to stop running containers: {0}")]
    StopFailed(String),

    #[error("Module operation failed on database {database}: {reason}")]
    ModuleOperation { database: String, reason: String },

    #[error("Database engine query failed: {0}")]
    DatabaseQuery(String),

    #[error("Database creation failed: {0}")]
    DatabaseCreate(String),

    #[error("Service not available on {url} after {seconds:.1} seconds")]
    ServiceUnavailable { url: String, seconds: f64 },

    #[error("Reverse proxy provisioning failed: {0}")]
    ProxyProvision(String),

    // Config file errors
    #[error("Config file not found: {0}")]
    ConfFileNotFound(PathBuf),

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command execution error: {command}, stderr: {stderr}")]
    CommandExecution { command: String, stderr: String },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SlipwayError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a command execution error
    pub fn command_exec(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::CommandExecution {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::EnvMissing(_) | Self::EnvInvalid { .. } => {
                Some("Check the .env file in your project directory")
            }
            Self::EnvFileNotFound(_) => Some("Run from the project directory or pass --env-file"),
            Self::AddonsRootMissing(_) => Some("Check the addons path configured in .env"),
            Self::ServiceUnavailable { .. } => {
                Some("Run: slipway status, or inspect the container logs")
            }
            _ => None,
        }
    }
}
