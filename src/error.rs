//! Error types for the hook engine

use crate::domain::Timeout;
use thiserror::Error;

/// Result type for hook declaration and firing
pub type Result<T> = std::result::Result<T, HookError>;

/// Failures raised while declaring or firing lifecycle hooks.
///
/// Every variant except `Configuration` is fatal for the hook-firing pass
/// that produced it: the remaining hooks of that state are not run.
#[derive(Error, Debug)]
pub enum HookError {
    /// Invalid declaration, reported when the declaration is made.
    #[error("invalid hook configuration: {0}")]
    Configuration(String),

    #[error("timed out after {timeout} waiting for {target}")]
    WaitTimeout { target: String, timeout: Timeout },

    #[error("failed to execute '{command}' on service '{service}' error: {error}")]
    ExecutionFault {
        service: String,
        command: String,
        error: String,
        exit_code: Option<i32>,
    },

    #[error("probe of {target} failed: {reason}")]
    RequestFailed { target: String, reason: String },

    /// A collaborator (engine adapter, file transfer, export) failed.
    #[error(transparent)]
    Runtime(#[from] anyhow::Error),
}

impl HookError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::WaitTimeout { .. })
    }
}
