//! Common types for the compilation pipeline.

use std::path::PathBuf;

use crate::paths::HostDirs;

use super::diagnostics::Diagnostic;

/// Configuration for the compiler.
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// Directory for build artifacts (.hotbed/build/)
    pub build_dir: PathBuf,

    /// Rust edition extension sources are compiled with
    pub edition: String,

    /// Optimization level (0-3)
    pub opt_level: u8,

    /// Emit debug info
    pub debug_info: bool,

    /// Treat warnings as errors (`-D warnings`)
    pub warnings_as_errors: bool,

    /// Additional rustc flags
    pub extra_rustc_flags: Vec<String>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            build_dir: PathBuf::from(".hotbed/build"),
            edition: "2021".to_string(),
            opt_level: 0,
            debug_info: true,
            warnings_as_errors: false,
            extra_rustc_flags: Vec::new(),
        }
    }
}

impl CompilerConfig {
    /// Create config for fast development builds.
    pub fn development() -> Self {
        Self::default()
    }

    /// Create a development config with paths from [`HostDirs`].
    pub fn for_dirs(dirs: &HostDirs) -> Self {
        Self {
            build_dir: dirs.build_dir.clone(),
            ..Self::development()
        }
    }

    /// Directory generated sources are written to.
    pub fn source_dir(&self) -> PathBuf {
        self.build_dir.join("src")
    }
}

/// One source file handed to the compiler.
#[derive(Debug, Clone)]
pub struct CompilationUnit {
    /// File name the source was read from (e.g. `hello_world.rs`).
    pub file_name: String,

    /// Crate name derived from the file stem.
    pub crate_name: String,

    /// Full source text.
    pub source: String,
}

impl CompilationUnit {
    pub fn new(file_name: impl Into<String>, source: impl Into<String>) -> Self {
        let file_name = file_name.into();
        let crate_name = crate_name_for(&file_name);
        Self {
            file_name,
            crate_name,
            source: source.into(),
        }
    }
}

/// Derive a valid crate name from a file name (`hello-world.rs` → `ext_hello_world`).
pub fn crate_name_for(file_name: &str) -> String {
    let stem = file_name.strip_suffix(".rs").unwrap_or(file_name);
    let sanitized: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("ext_{sanitized}")
}

/// A successfully compiled extension module.
#[derive(Debug, Clone)]
pub struct CompiledModule {
    /// Crate name
    pub name: String,

    /// Path to the compiled dynamic library
    pub path: PathBuf,

    /// Compilation time in milliseconds
    pub compile_time_ms: u64,
}

/// Result of compiling one source file.
#[derive(Debug)]
pub enum CompilationResult {
    /// Compilation succeeded
    Success(CompiledModule),

    /// Compilation failed; contains at least one error diagnostic
    Failure(Vec<Diagnostic>),
}

impl CompilationResult {
    /// Returns true if compilation was successful.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Get the compiled module if successful.
    pub fn module(&self) -> Option<&CompiledModule> {
        match self {
            Self::Success(module) => Some(module),
            Self::Failure(_) => None,
        }
    }

    /// Get the diagnostics if compilation failed.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Self::Success(_) => &[],
            Self::Failure(diagnostics) => diagnostics,
        }
    }
}

/// Platform-specific dynamic library extension.
pub fn dylib_extension() -> &'static str {
    #[cfg(target_os = "windows")]
    {
        "dll"
    }
    #[cfg(target_os = "macos")]
    {
        "dylib"
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        "so"
    }
}

/// Platform-specific dynamic library prefix.
pub fn dylib_prefix() -> &'static str {
    #[cfg(target_os = "windows")]
    {
        ""
    }
    #[cfg(not(target_os = "windows"))]
    {
        "lib"
    }
}
