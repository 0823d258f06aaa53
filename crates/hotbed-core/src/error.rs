//! Error types for hotbed-core.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for hotbed-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in hotbed-core.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to load dynamic library.
    #[error("failed to load library: {0}")]
    LibraryLoad(#[from] libloading::Error),

    /// A compiled module does not export a required entry point.
    #[error("module {module} does not export `{symbol}` (missing export_extensions! invocation?)")]
    MissingSymbol { module: String, symbol: String },

    /// A compiled module was built against an incompatible contract.
    #[error("module {module} was built for ABI version {found}, host expects {expected}")]
    AbiMismatch {
        module: String,
        expected: u32,
        found: u32,
    },

    /// The registration entry point returned nothing.
    #[error("module {0} returned an empty registration")]
    EmptyRegistration(String),

    /// Toolchain error.
    #[error("toolchain error: {0}")]
    Toolchain(String),

    /// File watcher error.
    #[error("file watch error at {path}: {message}")]
    Watch { path: PathBuf, message: String },

    /// Failed to start an extension's execution thread.
    #[error("failed to spawn thread for {instance}: {source}")]
    Spawn {
        instance: String,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Get a hint for how to recover from this error.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::MissingSymbol { .. } => {
                Some("end the extension source with `hotbed_sdk::export_extensions!(YourType);`")
            }
            Self::AbiMismatch { .. } => {
                Some("rebuild the host so its hotbed-sdk matches the one extensions link against")
            }
            Self::Toolchain(_) => Some("install a Rust toolchain and make sure `rustc` is on PATH"),
            _ => None,
        }
    }

    /// Format the error together with its recovery hint, if any.
    pub fn with_hint(&self) -> String {
        match self.hint() {
            Some(hint) => format!("{self}\n  hint: {hint}"),
            None => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abi_mismatch_message() {
        let err = Error::AbiMismatch {
            module: "a.rs".to_string(),
            expected: 1,
            found: 2,
        };
        assert_eq!(
            err.to_string(),
            "module a.rs was built for ABI version 2, host expects 1"
        );
        assert!(err.with_hint().contains("hint: rebuild the host"));
    }

    #[test]
    fn test_no_hint_for_io() {
        let err = Error::from(std::io::Error::other("disk full"));
        assert_eq!(err.with_hint(), "IO error: disk full");
    }
}
