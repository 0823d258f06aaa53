//! Error type returned by extension lifecycle hooks.

/// Error returned from [`crate::Extension::prepare`] or
/// [`crate::Extension::execute`].
#[derive(Debug, thiserror::Error)]
pub enum ExtensionError {
    /// Free-form failure.
    #[error("{0}")]
    Message(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A hook panicked; carries the panic message.
    #[error("panicked: {0}")]
    Panicked(String),

    /// Any other error raised by extension code.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl ExtensionError {
    /// Create an error from a message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}
