//! Toolchain discovery for extension compilation.
//!
//! Extensions must be compiled by the same `rustc` that built the host,
//! otherwise the SDK rlib cannot be linked.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Error, Result};

/// Locates the `rustc` used to compile extensions.
#[derive(Debug, Clone)]
pub struct ToolchainManager {
    /// Path to rustc
    rustc_path: PathBuf,

    /// Toolchain version string
    version: String,
}

impl ToolchainManager {
    /// Detect `rustc`.
    ///
    /// Honours the `RUSTC` environment variable, then falls back to `PATH`.
    pub fn new() -> Result<Self> {
        let rustc_path = Self::find_rustc()?;
        Self::with_rustc(rustc_path)
    }

    /// Use a specific `rustc` binary.
    pub fn with_rustc(rustc_path: impl Into<PathBuf>) -> Result<Self> {
        let rustc_path = rustc_path.into();
        let version = Self::get_rustc_version(&rustc_path)?;
        tracing::debug!("Using {} ({})", version, rustc_path.display());

        Ok(Self {
            rustc_path,
            version,
        })
    }

    /// Get the rustc path.
    pub fn rustc_path(&self) -> &Path {
        &self.rustc_path
    }

    /// Get the toolchain version.
    pub fn version(&self) -> &str {
        &self.version
    }

    fn find_rustc() -> Result<PathBuf> {
        if let Some(rustc) = std::env::var_os("RUSTC") {
            let shown = rustc.to_string_lossy().into_owned();
            return which::which(&rustc)
                .map_err(|_| Error::Toolchain(format!("RUSTC={shown} not found")));
        }

        which::which("rustc").map_err(|_| Error::Toolchain("rustc not found in PATH".to_string()))
    }

    fn get_rustc_version(rustc: &Path) -> Result<String> {
        let output = Command::new(rustc)
            .arg("--version")
            .output()
            .map_err(|e| Error::Toolchain(format!("Failed to run {}: {}", rustc.display(), e)))?;

        if !output.status.success() {
            return Err(Error::Toolchain(format!(
                "{} --version exited with {}",
                rustc.display(),
                output.status
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
