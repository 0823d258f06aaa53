//! Dependency header parsing for extension sources.
//!
//! Extensions declare the external crates they need in the first comment
//! block of the file:
//!
//! ```text
//! // Dependencies: serde, serde_json
//! // tokio
//! //   axum, tower
//! ```
//!
//! Identifiers are collected in declaration order. Duplicates are kept and
//! nothing is validated here; whether a name can be found is the resolver's
//! concern.

/// Ordered list of reference identifiers declared by one source file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DependencySpec {
    identifiers: Vec<String>,
}

impl DependencySpec {
    /// Create a dependency list from identifiers.
    pub fn new(identifiers: Vec<String>) -> Self {
        Self { identifiers }
    }

    /// Identifiers in declaration order.
    pub fn identifiers(&self) -> &[String] {
        &self.identifiers
    }

    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.identifiers.iter().map(String::as_str)
    }
}

/// Parser for the dependency header.
#[derive(Debug, Clone)]
pub struct DependencyHeaderParser {
    /// Marker opening the section, compared case-insensitively.
    marker: String,
}

impl DependencyHeaderParser {
    /// Marker used by [`DependencyHeaderParser::new`].
    pub const DEFAULT_MARKER: &'static str = "Dependencies:";

    pub fn new() -> Self {
        Self::with_marker(Self::DEFAULT_MARKER)
    }

    /// Use a different section marker (e.g. `Requires:`).
    pub fn with_marker(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into().to_ascii_lowercase(),
        }
    }

    /// Parse the dependency header of `source`.
    pub fn parse(&self, source: &str) -> DependencySpec {
        let mut identifiers = Vec::new();
        let mut in_section = false;

        for line in source.lines() {
            let trimmed = line.trim();

            let Some(content) = comment_content(trimmed) else {
                if in_section || !trimmed.is_empty() {
                    // Code line (or blank line after the section): header is over.
                    break;
                }
                continue;
            };

            if !in_section {
                if let Some(rest) = self.strip_marker(content) {
                    in_section = true;
                    push_identifiers(rest, &mut identifiers);
                }
                continue;
            }

            if !is_continuation(content) {
                break;
            }
            push_identifiers(content, &mut identifiers);
        }

        DependencySpec::new(identifiers)
    }

    /// Return the text after the marker if `content` starts with it.
    fn strip_marker<'a>(&self, content: &'a str) -> Option<&'a str> {
        let len = self.marker.len();
        let head = content.get(..len)?;
        if head.eq_ignore_ascii_case(&self.marker) {
            Some(&content[len..])
        } else {
            None
        }
    }
}

impl Default for DependencyHeaderParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse the dependency header using the default marker.
pub fn parse_dependency_header(source: &str) -> DependencySpec {
    DependencyHeaderParser::new().parse(source)
}

/// Strip a line comment marker (`//`, `///` or `//!`), returning the content.
fn comment_content(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("//")?;
    let rest = rest
        .strip_prefix('/')
        .or_else(|| rest.strip_prefix('!'))
        .unwrap_or(rest);
    Some(rest.trim())
}

/// Whether a comment line inside the section still lists identifiers.
fn is_continuation(content: &str) -> bool {
    let mut saw_identifier = false;
    for piece in content.split(',') {
        let piece = piece.trim();
        if piece.is_empty() {
            continue;
        }
        if !piece.chars().all(is_identifier_char) {
            return false;
        }
        saw_identifier = true;
    }
    saw_identifier
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':')
}

fn push_identifiers(list: &str, out: &mut Vec<String>) {
    out.extend(
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
    );
}
