//! Execution isolation for extension instances.
//!
//! # Architecture
//!
//! ```text
//! LoadedExtension
//!     │
//!     └── spawn_extension ──► thread "ext:<file>:<name>"
//!                                 │
//!                                 ├── prepare(logger) ──► execute(logger)
//!                                 │
//!                                 └── error / panic ──► ExtensionRegistry::fault
//! ```
//!
//! The registry keeps a [`RunHandle`] per instance so the host can observe
//! states and request cooperative shutdown.

mod context;
mod isolation;
mod logger;

pub use context::{AbortHandle, ExtensionState, RunHandle, StateCell};
pub use isolation::spawn_extension;
pub use logger::TracingLogger;
