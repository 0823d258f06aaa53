//! Host directory management.
//!
//! Provides the fixed directory convention shared by the CLI and the
//! host pipeline.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Name of the watched subdirectory.
pub const EXTENSIONS_DIR: &str = "extensions";

/// Name of the artifact directory.
pub const HOTBED_DIR: &str = ".hotbed";

/// Directory structure for a hotbed host.
///
/// Everything lives under the host's base directory:
///
/// ```text
/// <base>/
/// ├── extensions/     # Watched extension sources (*.rs)
/// └── .hotbed/
///     └── build/      # Generated sources and compiled dylibs
/// ```
#[derive(Debug, Clone)]
pub struct HostDirs {
    /// The base directory itself.
    pub base_dir: PathBuf,

    /// Watched directory.
    pub extensions_dir: PathBuf,

    /// The `.hotbed` directory.
    pub hotbed_dir: PathBuf,

    /// Build directory for compiled artifacts.
    pub build_dir: PathBuf,
}

impl HostDirs {
    /// Create the directory structure under `base_dir`.
    ///
    /// Creates all necessary directories if they don't exist.
    ///
    /// # Errors
    /// Returns an error if directory creation fails.
    pub fn from_base_dir(base_dir: &Path) -> Result<Self> {
        let extensions_dir = base_dir.join(EXTENSIONS_DIR);
        let hotbed_dir = base_dir.join(HOTBED_DIR);
        let build_dir = hotbed_dir.join("build");

        if !extensions_dir.exists() {
            fs::create_dir_all(&extensions_dir)?;
            tracing::info!("Created directory: {}", extensions_dir.display());
        }
        fs::create_dir_all(&build_dir)?;

        Ok(Self {
            base_dir: base_dir.to_path_buf(),
            extensions_dir,
            hotbed_dir,
            build_dir,
        })
    }

    /// Remove all build artifacts and recreate the build directory.
    ///
    /// Only safe while no compiled module is loaded.
    pub fn clean(&self) -> Result<()> {
        if self.build_dir.exists() {
            fs::remove_dir_all(&self.build_dir)?;
        }
        fs::create_dir_all(&self.build_dir)?;
        Ok(())
    }
}
