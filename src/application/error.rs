//! Application-level errors (wraps domain errors)

use thiserror::Error;

use crate::domain::DomainError;

/// Application errors wrap domain errors and add script and config context.
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("line {line}: {source}")]
    Edit {
        line: usize,
        #[source]
        source: DomainError,
    },

    #[error("line {line}: {message}")]
    Script { line: usize, message: String },

    #[error("line {line}: unknown label '{label}'")]
    UnknownLabel { line: usize, label: String },

    #[error("config error: {message}")]
    Config { message: String },

    #[error("operation failed: {context}")]
    OperationFailed {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ApplicationError {
    pub(crate) fn script(line: usize, message: impl Into<String>) -> Self {
        Self::Script {
            line,
            message: message.into(),
        }
    }

    /// Line of the edit script this error refers to, if any.
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::Edit { line, .. } | Self::Script { line, .. } | Self::UnknownLabel { line, .. } => {
                Some(*line)
            }
            _ => None,
        }
    }
}

/// Result type for application layer operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
