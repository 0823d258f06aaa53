//! Host implementation of the extension logger.

use std::error::Error;

use hotbed_sdk::{ExtensionLogger, LogLevel};

/// Forwards extension log calls to `tracing`, tagged with the instance name
/// and the file it was loaded from.
#[derive(Debug, Clone)]
pub struct TracingLogger {
    extension: String,
    file: String,
}

impl TracingLogger {
    pub fn new(extension: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
            file: file.into(),
        }
    }
}

impl ExtensionLogger for TracingLogger {
    fn log(&self, level: LogLevel, message: &str, error: Option<&(dyn Error + 'static)>) {
        let extension = self.extension.as_str();
        let file = self.file.as_str();

        match (level, error) {
            (LogLevel::Debug, _) => tracing::debug!(extension, file, "{}", message),
            (LogLevel::Info, _) => tracing::info!(extension, file, "{}", message),
            (LogLevel::Warning, None) => tracing::warn!(extension, file, "{}", message),
            (LogLevel::Warning, Some(e)) => {
                tracing::warn!(extension, file, error = %e, "{}", message)
            }
            (LogLevel::Error, None) => tracing::error!(extension, file, "{}", message),
            (LogLevel::Error, Some(e)) => {
                tracing::error!(extension, file, error = %e, "{}", message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    use hotbed_sdk::Logger;

    /// Shared buffer the test subscriber writes into.
    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_events_carry_instance_and_file() {
        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let logger: Logger = Arc::new(TracingLogger::new("Hello", "hello.rs"));
            let io = io::Error::other("port 8080 in use");

            logger.info("started");
            logger.error_with("bind failed", &io);
        });

        let bytes = capture.0.lock().unwrap().clone();
        let output = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2, "{output}");
        assert!(lines[0].contains("INFO"));
        assert!(lines[0].contains("started"));
        assert!(lines[0].contains("extension=\"Hello\""));
        assert!(lines[0].contains("file=\"hello.rs\""));
        assert!(lines[1].contains("ERROR"));
        assert!(lines[1].contains("bind failed"));
        assert!(lines[1].contains("error=port 8080 in use"));
    }
}
