//! CLI-level errors (wraps infrastructure errors)

use thiserror::Error;

use crate::application::ApplicationError;
use crate::domain::TypeTag;
use crate::infrastructure::InfraError;

/// CLI errors are the top-level error type.
/// These are what get displayed to the user.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Infra(#[from] InfraError),

    #[error("{0}")]
    Usage(String),

    #[error("'{parent}' does not accept '{child}'")]
    NotAccepted { parent: TypeTag, child: TypeTag },
}

impl From<ApplicationError> for CliError {
    fn from(e: ApplicationError) -> Self {
        Self::Infra(InfraError::Application(e))
    }
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

impl CliError {
    /// Get the appropriate exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Usage(_) => crate::exitcode::USAGE,
            CliError::NotAccepted { .. } => crate::exitcode::DATAERR,
            CliError::Infra(e) => match e {
                InfraError::Io { .. } => crate::exitcode::IOERR,
                InfraError::Application(app) => match app {
                    ApplicationError::Domain(_) | ApplicationError::Edit { .. } => {
                        crate::exitcode::REJECTED
                    }
                    ApplicationError::Script { .. } | ApplicationError::UnknownLabel { .. } => {
                        crate::exitcode::DATAERR
                    }
                    ApplicationError::Config { .. } => crate::exitcode::CONFIG,
                    ApplicationError::OperationFailed { .. } => crate::exitcode::NOINPUT,
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DomainError;

    #[test]
    fn given_edit_error_when_mapping_then_rejected_code() {
        let err: CliError = ApplicationError::Edit {
            line: 3,
            source: DomainError::InvalidOperation("x".into()),
        }
        .into();
        assert_eq!(err.exit_code(), crate::exitcode::REJECTED);
    }

    #[test]
    fn given_script_error_when_mapping_then_dataerr() {
        let err: CliError = ApplicationError::Script {
            line: 1,
            message: "bad".into(),
        }
        .into();
        assert_eq!(err.exit_code(), crate::exitcode::DATAERR);
    }

    #[test]
    fn given_io_error_when_mapping_then_ioerr() {
        let err = CliError::Infra(InfraError::io(
            "write",
            std::io::Error::new(std::io::ErrorKind::Other, "disk"),
        ));
        assert_eq!(err.exit_code(), crate::exitcode::IOERR);
    }
}
