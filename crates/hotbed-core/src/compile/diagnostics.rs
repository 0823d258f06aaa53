//! Compiler diagnostics and rustc JSON parsing.

use std::fmt;

use serde::Deserialize;

/// Identifier given to diagnostics rustc emits without an error code
/// (most syntax errors).
pub const UNCODED_DIAGNOSTIC_ID: &str = "rustc";

/// Severity level of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => f.write_str("warning"),
            Self::Error => f.write_str("error"),
        }
    }
}

/// A location in the extension source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    /// Line number (1-indexed)
    pub line: usize,

    /// Column number (1-indexed)
    pub column: usize,
}

/// A compiler-produced message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Stable identifier (e.g. "E0425", or [`UNCODED_DIAGNOSTIC_ID`]).
    pub id: String,

    /// Human-readable message.
    pub message: String,

    /// Severity level.
    pub severity: Severity,

    /// Primary location, if rustc reported one.
    pub location: Option<SourceLocation>,
}

impl Diagnostic {
    /// Create an error diagnostic without a location.
    pub fn error(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            message: message.into(),
            severity: Severity::Error,
            location: None,
        }
    }

    /// Attach a location.
    pub fn at(mut self, line: usize, column: usize) -> Self {
        self.location = Some(SourceLocation { line, column });
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.id, self.message)?;
        if let Some(loc) = &self.location {
            write!(f, " (line {}, column {})", loc.line, loc.column)?;
        }
        Ok(())
    }
}

/// Rustc JSON diagnostic format.
#[derive(Debug, Deserialize)]
struct RustcDiagnostic {
    message: String,
    code: Option<RustcCode>,
    level: String,
    spans: Vec<RustcSpan>,
}

#[derive(Debug, Deserialize)]
struct RustcCode {
    code: String,
}

#[derive(Debug, Deserialize)]
struct RustcSpan {
    line_start: usize,
    column_start: usize,
    is_primary: bool,
}

/// Parse `--error-format=json` output into diagnostics.
///
/// Keeps `error` and `warning` levels only. Summary lines such as
/// "aborting due to 1 previous error" are dropped because they carry no
/// information of their own.
pub fn parse_rustc_output(json_output: &str) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    for line in json_output.lines() {
        let line = line.trim();
        if line.is_empty() || !line.starts_with('{') {
            continue;
        }

        match serde_json::from_str::<RustcDiagnostic>(line) {
            Ok(raw) => {
                if let Some(diagnostic) = map_diagnostic(raw) {
                    diagnostics.push(diagnostic);
                }
            }
            Err(e) => {
                tracing::debug!(
                    "Failed to parse rustc JSON: {} (line: {})",
                    e,
                    line.chars().take(100).collect::<String>()
                );
            }
        }
    }

    diagnostics
}

fn map_diagnostic(raw: RustcDiagnostic) -> Option<Diagnostic> {
    let severity = match raw.level.as_str() {
        "error" => Severity::Error,
        "warning" => Severity::Warning,
        _ => return None,
    };

    if raw.code.is_none() && raw.spans.is_empty() && raw.message.starts_with("aborting due to") {
        return None;
    }

    let location = raw
        .spans
        .iter()
        .find(|s| s.is_primary)
        .map(|span| SourceLocation {
            line: span.line_start,
            column: span.column_start,
        });

    Some(Diagnostic {
        id: raw
            .code
            .map(|c| c.code)
            .unwrap_or_else(|| UNCODED_DIAGNOSTIC_ID.to_string()),
        message: raw.message,
        severity,
        location,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rustc_json() {
        let json = serde_json::json!({
            "message": "cannot find value `x` in this scope",
            "code": { "code": "E0425", "explanation": null },
            "level": "error",
            "spans": [{
                "file_name": "a.rs",
                "line_start": 5,
                "line_end": 5,
                "column_start": 10,
                "column_end": 11,
                "is_primary": true,
                "label": "not found in this scope"
            }],
            "children": [],
            "rendered": "error[E0425]: cannot find value `x`"
        })
        .to_string();

        let diagnostics = parse_rustc_output(&json);

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].id, "E0425");
        assert_eq!(diagnostics[0].severity, Severity::Error);
        let expected = SourceLocation {
            line: 5,
            column: 10,
        };
        assert_eq!(diagnostics[0].location, Some(expected));
    }

    #[test]
    fn test_uncoded_syntax_error_gets_stable_id() {
        let json = serde_json::json!({
            "message": "this file contains an unclosed delimiter",
            "code": null,
            "level": "error",
            "spans": [{
                "file_name": "b.rs",
                "line_start": 3,
                "line_end": 3,
                "column_start": 1,
                "column_end": 1,
                "is_primary": true,
                "label": null
            }],
            "children": [],
            "rendered": null
        })
        .to_string();

        let diagnostics = parse_rustc_output(&json);

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].id, UNCODED_DIAGNOSTIC_ID);
        assert!(diagnostics[0].message.contains("unclosed delimiter"));
    }

    #[test]
    fn test_summary_and_notes_dropped() {
        let line = |message: &str, code: Option<&str>, level: &str| {
            let code = code.map(|code| serde_json::json!({ "code": code, "explanation": null }));
            serde_json::json!({
                "message": message,
                "code": code,
                "level": level,
                "spans": [],
                "children": [],
                "rendered": null
            })
            .to_string()
        };
        let json = [
            line("unused variable: `y`", Some("unused_variables"), "warning"),
            line("aborting due to 1 previous error", None, "error"),
            line(
                "For more information about this error, try `rustc --explain E0425`.",
                None,
                "failure-note",
            ),
            "not json at all".to_string(),
        ]
        .join("\n");

        let diagnostics = parse_rustc_output(&json);

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, Severity::Warning);
        assert_eq!(diagnostics[0].id, "unused_variables");
    }

    #[test]
    fn test_display() {
        let d = Diagnostic::error("E0308", "mismatched types").at(4, 9);
        assert_eq!(d.to_string(), "E0308: mismatched types (line 4, column 9)");
        assert_eq!(
            Diagnostic::error("rustc", "boom").to_string(),
            "rustc: boom"
        );
    }
}
