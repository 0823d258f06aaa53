//! Compile error reporting.

use std::fmt::Write as _;

use crate::compile::Diagnostic;

/// Render the diagnostics of one failed compilation.
///
/// ```text
/// Compilation Errors in broken.rs:
/// rustc: expected one of `;` or `}`, found `<eof>` (line 3, column 1)
/// E0425: cannot find value `x` in this scope (line 7, column 5)
/// ```
///
/// The output depends only on the inputs.
pub fn render_diagnostics(file_name: &str, diagnostics: &[Diagnostic]) -> String {
    let mut out = format!("Compilation Errors in {file_name}:\n");
    for diagnostic in diagnostics {
        let _ = writeln!(out, "{diagnostic}");
    }
    out
}

/// Surface for showing error text to the user.
pub trait ErrorDisplay: Send + Sync {
    fn show(&self, file_name: &str, text: &str);
}

/// Writes errors to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogErrorDisplay;

impl ErrorDisplay for LogErrorDisplay {
    fn show(&self, file_name: &str, text: &str) {
        tracing::error!(file = file_name, "{}", text.trim_end());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_is_deterministic() {
        let diagnostics = vec![
            Diagnostic::error("rustc", "expected `;`").at(3, 1),
            Diagnostic::error("E0425", "cannot find value `x` in this scope"),
        ];

        let first = render_diagnostics("broken.rs", &diagnostics);
        let second = render_diagnostics("broken.rs", &diagnostics);

        assert_eq!(first, second);
        assert_eq!(
            first,
            "Compilation Errors in broken.rs:\n\
             rustc: expected `;` (line 3, column 1)\n\
             E0425: cannot find value `x` in this scope\n"
        );
    }

    #[test]
    fn test_render_without_diagnostics() {
        assert_eq!(
            render_diagnostics("a.rs", &[]),
            "Compilation Errors in a.rs:\n"
        );
    }
}
