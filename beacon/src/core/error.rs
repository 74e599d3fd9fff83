//! Failure taxonomy for the launcher core.
//!
//! Every variant is surfaced to the user as an `Error` page; nothing here is
//! allowed to take down the event loop.

use thiserror::Error;

pub type BeaconResult<T> = Result<T, BeaconError>;

#[derive(Debug, Error)]
pub enum BeaconError {
    /// Malformed extension output, unknown command or mode, chained `run`.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Spawn failure, non-zero exit status or timeout.
    #[error("{message}{}", stderr_suffix(.stderr))]
    Execution {
        message: String,
        stderr: Option<String>,
    },

    /// Required inputs still absent after a form was submitted.
    #[error("missing required inputs: {}", .missing.join(", "))]
    Resolution { missing: Vec<String> },

    /// History or configuration file I/O.
    #[error("persistence error: {0:#}")]
    Persistence(anyhow::Error),

    #[error("failed to load extension {alias}: {cause:#}")]
    Extension { alias: String, cause: anyhow::Error },
}

impl BeaconError {
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
            stderr: None,
        }
    }

    /// Build an execution error, keeping stderr only when it carries text.
    pub fn execution_with_stderr(message: impl Into<String>, stderr: &[u8]) -> Self {
        let text = String::from_utf8_lossy(stderr).trim().to_string();
        Self::Execution {
            message: message.into(),
            stderr: (!text.is_empty()).then_some(text),
        }
    }

    pub fn extension(alias: impl Into<String>, cause: anyhow::Error) -> Self {
        Self::Extension {
            alias: alias.into(),
            cause,
        }
    }
}

fn stderr_suffix(stderr: &Option<String>) -> String {
    match stderr {
        Some(text) => format!("\n\n{text}"),
        None => String::new(),
    }
}
