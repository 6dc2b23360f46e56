//! Error taxonomy for the parsing engine.
//!
//! Every failure the engine can produce is a named kind with a stable
//! [`code`](Error::code) string, a human message, and structured fields.
//! Consumer-supplied actions and option callbacks report failures as
//! [`anyhow::Error`]; those are carried transparently by [`Error::Action`]
//! and can be downcast back to an engine kind (the parser does this to
//! recognize [`Error::NotAnOption`]).

use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A declarative call received the wrong shape or an out-of-order value.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("invalid option format {format:?}: {reason}")]
    InvalidOptionFormat { format: String, reason: String },

    #[error("invalid alias {0:?}")]
    InvalidAlias(String),

    #[error("unknown data type {0:?}")]
    InvalidDataType(String),

    #[error("invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },

    #[error("{value:?} is not a number")]
    InvalidNumber { value: String },

    #[error("{value:?} is not a date")]
    InvalidDate { value: String },

    #[error("invalid json: {reason}")]
    InvalidJson { reason: String },

    #[error("{value:?} is not yes or no")]
    NotYesNo { value: String },

    #[error("{value} is out of range: {reason}")]
    Range { value: String, reason: String },

    #[error("missing required argument {name:?}")]
    MissingRequiredArgument { name: String },

    #[error("missing required option {name}")]
    MissingRequiredOption { name: String },

    #[error("{kind} {name:?} already exists")]
    AlreadyExists { kind: &'static str, name: String },

    #[error("conflicting parameters: {0}")]
    Conflict(String),

    #[error("default command {name:?} not found")]
    DefaultCommandNotFound { name: String },

    #[error("file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("invalid extension {name:?}: {reason}")]
    InvalidExtension { name: String, reason: String },

    #[error("invalid package manifest {}: {reason}", path.display())]
    InvalidPackageManifest { path: PathBuf, reason: String },

    #[error("extension {name:?} has no executable")]
    NoExecutable { name: String },

    #[error("runtime version {current} does not satisfy required {required}")]
    InvalidRuntime { required: String, current: String },

    /// Sentinel raised by suppressed options; the parser treats the token
    /// as if the option did not exist.
    #[error("not an option")]
    NotAnOption,

    #[error("unknown command {name:?}")]
    UnknownCommand { name: String },

    /// Failure raised by a consumer-supplied action or option callback.
    #[error(transparent)]
    Action(#[from] anyhow::Error),
}

impl Error {
    /// Stable machine-readable code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidArgument(_) => "INVALID_ARGUMENT",
            Error::InvalidOption(_) => "INVALID_OPTION",
            Error::InvalidOptionFormat { .. } => "INVALID_OPTION_FORMAT",
            Error::InvalidAlias(_) => "INVALID_ALIAS",
            Error::InvalidDataType(_) => "INVALID_DATA_TYPE",
            Error::InvalidValue { .. } => "INVALID_VALUE",
            Error::InvalidNumber { .. } => "INVALID_NUMBER",
            Error::InvalidDate { .. } => "INVALID_DATE",
            Error::InvalidJson { .. } => "INVALID_JSON",
            Error::NotYesNo { .. } => "NOT_YES_NO",
            Error::Range { .. } => "RANGE_ERROR",
            Error::MissingRequiredArgument { .. } => "MISSING_REQUIRED_ARGUMENT",
            Error::MissingRequiredOption { .. } => "MISSING_REQUIRED_OPTION",
            Error::AlreadyExists { .. } => "ALREADY_EXISTS",
            Error::Conflict(_) => "CONFLICT",
            Error::DefaultCommandNotFound { .. } => "DEFAULT_COMMAND_NOT_FOUND",
            Error::FileNotFound { .. } => "FILE_NOT_FOUND",
            Error::InvalidExtension { .. } => "INVALID_EXTENSION",
            Error::InvalidPackageManifest { .. } => "INVALID_PACKAGE_JSON",
            Error::NoExecutable { .. } => "NO_EXECUTABLE",
            Error::InvalidRuntime { .. } => "INVALID_RUNTIME",
            Error::NotAnOption => "NOT_AN_OPTION",
            Error::UnknownCommand { .. } => "UNKNOWN_COMMAND",
            Error::Action(_) => "ACTION_ERROR",
        }
    }
}

/// A non-fatal problem recorded while building the command tree, surfaced
/// on the parse result so actions can report it.
#[derive(Debug, Clone)]
pub struct Warning {
    pub code: &'static str,
    pub message: String,
}

impl Warning {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<&Error> for Warning {
    fn from(err: &Error) -> Self {
        Warning {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(
            Error::MissingRequiredArgument {
                name: "src".to_string()
            }
            .code(),
            "MISSING_REQUIRED_ARGUMENT"
        );
        assert_eq!(
            Error::InvalidPackageManifest {
                path: PathBuf::from("cmdkit.json"),
                reason: "bad".to_string()
            }
            .code(),
            "INVALID_PACKAGE_JSON"
        );
        assert_eq!(Error::NotAnOption.code(), "NOT_AN_OPTION");
    }

    #[test]
    fn action_errors_downcast_to_engine_kinds() {
        let err: anyhow::Error = Error::NotAnOption.into();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::NotAnOption)
        ));
    }
}
