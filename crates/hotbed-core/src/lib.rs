//! Core engine for the hotbed extension host.
//!
//! This crate provides:
//! - Source watching with debouncing and a modification-time gate
//! - Dependency header parsing and reference resolution
//! - Compilation pipeline (extension source → cdylib via rustc)
//! - Module loading and contract discovery
//! - Extension registry
//! - Per-instance thread isolation for lifecycle hooks

pub mod compile;
pub mod error;
pub mod execute;
pub mod host;
pub mod load;
pub mod paths;
pub mod registry;
pub mod report;
pub mod watch;

pub use error::{Error, Result};
pub use execute::{AbortHandle, ExtensionState, RunHandle, TracingLogger, spawn_extension};
pub use host::{ExtensionHost, HostConfig, NO_EXTENSIONS_ERROR, ProcessOutcome};
pub use load::{DylibLoader, ExtensionMetadata, LoadedExtension, LoadedModule, ModuleLoader};
pub use paths::HostDirs;
pub use registry::{ExtensionRecord, ExtensionRegistry, RecordUpdate};
pub use report::{ErrorDisplay, LogErrorDisplay, render_diagnostics};
pub use watch::{ChangeTracker, ExtensionSource, SourceChange, SourceWatcher};
