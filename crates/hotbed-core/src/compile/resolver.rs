//! Reference resolution: turns declared dependencies into `--extern` flags.
//!
//! Every extension is compiled against a baseline of crates the host
//! itself was built with (the SDK, plus a few optional libraries), and
//! against whatever its dependency header names. Each name is looked up
//! independently in the library search directories as a compiled `rlib`.
//!
//! Resolution is best-effort: a name that cannot be found is logged and
//! dropped. If the source really uses it, rustc reports the missing crate
//! as an ordinary compile diagnostic.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::header::DependencySpec;

/// A crate every extension is compiled against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaselineReference {
    /// Crate name as used in `--extern`.
    pub name: String,

    /// Optional references are logged at debug level when missing.
    pub optional: bool,
}

impl BaselineReference {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            optional: false,
        }
    }

    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            optional: true,
        }
    }

    /// The host's default baseline.
    ///
    /// `hotbed_sdk` carries the extension contract and the logger sink;
    /// the rest are only available when the host build produced them.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::required("hotbed_sdk"),
            Self::optional("serde"),
            Self::optional("serde_json"),
            Self::optional("tokio"),
        ]
    }
}

/// A resolved crate reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Crate name as used in `--extern`.
    pub name: String,

    /// Path to the compiled library.
    pub path: PathBuf,
}

/// Why a single identifier could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// The identifier is not a valid crate name.
    #[error("`{0}` is not a valid crate name")]
    InvalidName(String),

    /// No library file was found.
    #[error(
        "no compiled library for `{name}` in {searched} search director{}",
        if *searched == 1 { "y" } else { "ies" }
    )]
    NotFound { name: String, searched: usize },
}

/// Final set of references for one compilation.
#[derive(Debug, Clone, Default)]
pub struct ReferenceSet {
    /// Resolved references, unique by crate name.
    pub references: Vec<Reference>,

    /// Directories passed to rustc as `-L dependency=` so transitive
    /// crates of the references can be found.
    pub search_dirs: Vec<PathBuf>,

    /// Identifiers that could not be resolved.
    pub unresolved: Vec<String>,
}

impl ReferenceSet {
    /// Look up a resolved reference by crate name.
    pub fn get(&self, name: &str) -> Option<&Reference> {
        self.references.iter().find(|r| r.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    fn push(&mut self, reference: Reference) {
        if !self.contains(&reference.name) {
            self.references.push(reference);
        }
    }
}

/// Resolves baseline and declared references against search directories.
#[derive(Debug, Clone)]
pub struct ReferenceResolver {
    search_dirs: Vec<PathBuf>,
    baseline: Vec<BaselineReference>,
}

impl ReferenceResolver {
    /// Create a resolver with the default baseline.
    pub fn new(search_dirs: Vec<PathBuf>) -> Self {
        Self {
            search_dirs,
            baseline: BaselineReference::defaults(),
        }
    }

    /// Replace the baseline.
    pub fn with_baseline(mut self, baseline: Vec<BaselineReference>) -> Self {
        self.baseline = baseline;
        self
    }

    pub fn search_dirs(&self) -> &[PathBuf] {
        &self.search_dirs
    }

    pub fn baseline(&self) -> &[BaselineReference] {
        &self.baseline
    }

    /// Produce the reference set for a source's declared dependencies.
    pub fn resolve(&self, spec: &DependencySpec) -> ReferenceSet {
        let mut set = ReferenceSet {
            search_dirs: self.search_dirs.clone(),
            ..Default::default()
        };

        for base in &self.baseline {
            match self.resolve_one(&base.name) {
                Ok(reference) => set.push(reference),
                Err(e) if base.optional => {
                    tracing::debug!("Optional baseline reference skipped: {}", e);
                }
                Err(e) => {
                    tracing::warn!("Baseline reference unavailable: {}", e);
                    set.unresolved.push(base.name.clone());
                }
            }
        }

        for identifier in spec.iter() {
            match self.resolve_one(identifier) {
                Ok(reference) => set.push(reference),
                Err(e) => {
                    tracing::warn!("Could not resolve dependency `{}`: {}", identifier, e);
                    set.unresolved.push(identifier.to_string());
                }
            }
        }

        set
    }

    /// Resolve one identifier to a library file.
    pub fn resolve_one(&self, identifier: &str) -> Result<Reference, ResolveError> {
        let name = crate_name(identifier)?;

        let mut best: Option<(SystemTime, PathBuf)> = None;
        for dir in &self.search_dirs {
            for candidate in find_rlibs(dir, &name) {
                let modified = fs::metadata(&candidate)
                    .and_then(|m| m.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                if best.as_ref().is_none_or(|(t, _)| modified > *t) {
                    best = Some((modified, candidate));
                }
            }
        }

        best.map(|(_, path)| Reference {
            name: name.clone(),
            path,
        })
        .ok_or(ResolveError::NotFound {
            name,
            searched: self.search_dirs.len(),
        })
    }

    /// Library search directories next to the running executable.
    ///
    /// A host started through cargo lives in `target/<profile>/`, with every
    /// crate it was built from compiled into `target/<profile>/deps/`.
    /// Test binaries live in `deps/` directly.
    pub fn default_search_dirs() -> Vec<PathBuf> {
        let Some(exe_dir) = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(Path::to_path_buf))
        else {
            return Vec::new();
        };

        let mut dirs = Vec::new();
        let deps = exe_dir.join("deps");
        if deps.is_dir() {
            dirs.push(deps);
        }
        dirs.push(exe_dir);
        dirs
    }
}

/// Normalise an identifier into a crate name (`serde-json` → `serde_json`).
fn crate_name(identifier: &str) -> Result<String, ResolveError> {
    let name = identifier.trim().replace('-', "_");
    let valid = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid {
        Ok(name)
    } else {
        Err(ResolveError::InvalidName(identifier.to_string()))
    }
}

/// Find `lib<name>.rlib` and `lib<name>-<hash>.rlib` in `dir`.
fn find_rlibs(dir: &Path, name: &str) -> Vec<PathBuf> {
    let exact = format!("lib{name}.rlib");
    let prefix = format!("lib{name}-");

    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };

    entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                return false;
            };
            file_name == exact
                || (file_name.starts_with(&prefix)
                    && file_name.ends_with(".rlib")
                    && file_name[prefix.len()..file_name.len() - ".rlib".len()]
                        .chars()
                        .all(|c| c.is_ascii_hexdigit()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"!<arch>\n").unwrap();
        path
    }

    #[test]
    fn test_resolves_hashed_and_plain_rlibs() {
        let temp = TempDir::new().unwrap();
        let hashed = touch(temp.path(), "libserde_json-1a2b3c4d.rlib");
        let plain = touch(temp.path(), "libhotbed_sdk.rlib");

        let resolver = ReferenceResolver::new(vec![temp.path().to_path_buf()]);

        assert_eq!(resolver.resolve_one("serde-json").unwrap().path, hashed);
        assert_eq!(resolver.resolve_one("hotbed_sdk").unwrap().path, plain);
    }

    #[test]
    fn test_similar_prefix_not_matched() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "libserde_json-1a2b.rlib");
        touch(temp.path(), "libserde_derive-9f9f.so");

        let resolver = ReferenceResolver::new(vec![temp.path().to_path_buf()]);

        assert!(matches!(
            resolver.resolve_one("serde"),
            Err(ResolveError::NotFound { .. })
        ));
    }

    #[test]
    fn test_unresolvable_ids_are_skipped_not_fatal() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "libhotbed_sdk-00ff.rlib");
        touch(temp.path(), "libtokio-abcd.rlib");

        let resolver = ReferenceResolver::new(vec![temp.path().to_path_buf()]);
        let spec = DependencySpec::new(vec![
            "System.Text.Json".to_string(),
            "tokio".to_string(),
            "missing_crate".to_string(),
            "tokio".to_string(),
        ]);

        let set = resolver.resolve(&spec);

        assert!(set.contains("hotbed_sdk"));
        assert!(set.contains("tokio"));
        assert_eq!(
            set.references.iter().filter(|r| r.name == "tokio").count(),
            1
        );
        assert_eq!(set.unresolved, vec!["System.Text.Json", "missing_crate"]);
        assert_eq!(set.search_dirs, vec![temp.path().to_path_buf()]);
    }

    #[test]
    fn test_missing_required_baseline_is_reported() {
        let baseline = vec![
            BaselineReference::required("hotbed_sdk"),
            BaselineReference::optional("tokio"),
        ];
        let resolver = ReferenceResolver::new(Vec::new()).with_baseline(baseline);

        let set = resolver.resolve(&DependencySpec::default());

        assert!(set.references.is_empty());
        assert_eq!(set.unresolved, vec!["hotbed_sdk"]);
    }

    #[test]
    fn test_invalid_names() {
        assert!(crate_name("9lives").is_err());
        assert!(crate_name("a.b").is_err());
        assert!(crate_name("").is_err());
        assert_eq!(crate_name("serde-json").unwrap(), "serde_json");
    }

    #[test]
    fn test_not_found_message() {
        let err = ResolveError::NotFound {
            name: "axum".to_string(),
            searched: 1,
        };
        assert_eq!(
            err.to_string(),
            "no compiled library for `axum` in 1 search directory"
        );
    }
}
