//! Error types for kubexec.
//!
//! Each layer defines its own error enum where it lives ([`ExecError`],
//! [`TransportError`][crate::exec::TransportError], [`ModuleError`],
//! [`ConfigError`]); this module aggregates them for callers that drive the
//! crate as a whole, such as the CLI.

use thiserror::Error;

use crate::exec::ExecError;
use crate::kubeconfig::ConfigError;
use crate::modules::ModuleError;

/// Result type alias for kubexec operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The aggregated error type for kubexec.
#[derive(Error, Debug)]
pub enum Error {
    /// Exec engine error.
    #[error(transparent)]
    Exec(#[from] ExecError),

    /// Module layer error.
    #[error(transparent)]
    Module(#[from] ModuleError),

    /// Credential resolution error.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code for CLI exit status.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Module(ModuleError::MissingParameter(_))
            | Error::Module(ModuleError::InvalidParameter(_)) => 2,
            Error::Config(_) | Error::Module(ModuleError::Credentials(_)) => 3,
            Error::Exec(ExecError::Timeout(_))
            | Error::Module(ModuleError::Exec(ExecError::Timeout(_))) => 4,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_by_category() {
        let missing = Error::from(ModuleError::MissingParameter("pod".to_string()));
        assert_eq!(missing.exit_code(), 2);

        let config = Error::from(ConfigError::Invalid("bad".to_string()));
        assert_eq!(config.exit_code(), 3);

        let timeout = Error::from(ExecError::Timeout(30));
        assert_eq!(timeout.exit_code(), 4);

        let failed = Error::from(ExecError::Failed("denied".to_string()));
        assert_eq!(failed.exit_code(), 1);
    }
}
