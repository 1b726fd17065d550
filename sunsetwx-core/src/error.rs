use crate::models::FailureKind;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("Directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("Script not found: {}", .0.display())]
    ScriptNotFound(PathBuf),

    #[error("Environment '{name}' not found in {searched} conda installation(s)")]
    EnvironmentNotFound { name: String, searched: usize },

    #[error("Failed to start {}: {source}", .program.display())]
    SpawnFailed {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("History error: {0}")]
    HistoryError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl LaunchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            LaunchError::DirectoryNotFound(_) | LaunchError::ScriptNotFound(_) => {
                FailureKind::Navigation
            }
            LaunchError::EnvironmentNotFound { .. } => FailureKind::Environment,
            LaunchError::SpawnFailed { .. } => FailureKind::Execution,
            LaunchError::InvalidConfiguration(_) => FailureKind::Configuration,
            LaunchError::HistoryError(_) | LaunchError::IoError(_) => FailureKind::Io,
        }
    }

    /// Process exit code the launcher reports for this failure.
    pub fn exit_code(&self) -> i32 {
        self.kind().exit_code()
    }
}

pub type Result<T> = std::result::Result<T, LaunchError>;
