//! Logging sink handed to extensions.
//!
//! The host owns the implementation; extensions only see this trait.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// Severity of a log message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Shared handle to the host logger.
///
/// Extensions may clone it to log from their own threads or menu actions.
pub type Logger = Arc<dyn ExtensionLogger>;

/// Leveled logging sink with an optional structured error payload.
pub trait ExtensionLogger: Send + Sync {
    /// Record one message.
    fn log(&self, level: LogLevel, message: &str, error: Option<&(dyn Error + 'static)>);

    fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message, None);
    }

    fn info(&self, message: &str) {
        self.log(LogLevel::Info, message, None);
    }

    fn warn(&self, message: &str) {
        self.log(LogLevel::Warning, message, None);
    }

    fn error(&self, message: &str) {
        self.log(LogLevel::Error, message, None);
    }

    /// Log an error message together with the error that caused it.
    fn error_with(&self, message: &str, error: &(dyn Error + 'static)) {
        self.log(LogLevel::Error, message, Some(error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Collecting {
        lines: Mutex<Vec<String>>,
    }

    impl ExtensionLogger for Collecting {
        fn log(&self, level: LogLevel, message: &str, error: Option<&(dyn Error + 'static)>) {
            let line = match error {
                Some(e) => format!("{level}: {message} ({e})"),
                None => format!("{level}: {message}"),
            };
            self.lines.lock().unwrap().push(line);
        }
    }

    #[test]
    fn test_helpers_route_levels() {
        let sink = Arc::new(Collecting::default());
        let logger: Logger = sink.clone();

        logger.info("starting");
        logger.warn("slow");
        let cause = std::io::Error::other("refused");
        logger.error_with("bind failed", &cause);

        let lines = sink.lines.lock().unwrap();
        assert_eq!(
            *lines,
            vec![
                "info: starting".to_string(),
                "warning: slow".to_string(),
                "error: bind failed (refused)".to_string(),
            ]
        );
    }

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Error > LogLevel::Warning);
        assert!(LogLevel::Info > LogLevel::Debug);
    }
}
