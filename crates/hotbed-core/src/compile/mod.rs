//! Compilation pipeline for extension sources.
//!
//! This module provides:
//! - Dependency header parsing (`// Dependencies: ...` comments)
//! - Reference resolution (baseline + declared crates → rlib paths)
//! - Toolchain discovery
//! - Extension compilation (source → uniquely named cdylib)
//! - Diagnostic parsing (rustc JSON → [`Diagnostic`])
//!
//! # Architecture
//!
//! ```text
//! extensions/foo.rs
//!     │
//!     ├── Header ──► DependencyHeaderParser ──► ReferenceResolver ──► ReferenceSet
//!     │                                                                   │
//!     └── Source ──────────────────────────► RustcCompiler ◄──────────────┘
//!                                                 │
//!                                                 └──► .hotbed/build/libext_foo_<id>.so
//! ```

mod diagnostics;
mod engine;
mod header;
mod resolver;
mod toolchain;
mod types;

pub use diagnostics::{
    Diagnostic, Severity, SourceLocation, UNCODED_DIAGNOSTIC_ID, parse_rustc_output,
};
pub use engine::{Compiler, RustcCompiler};
pub use header::{DependencyHeaderParser, DependencySpec, parse_dependency_header};
pub use resolver::{BaselineReference, Reference, ReferenceResolver, ReferenceSet, ResolveError};
pub use toolchain::ToolchainManager;
pub use types::{
    CompilationResult, CompilationUnit, CompiledModule, CompilerConfig, crate_name_for,
    dylib_extension, dylib_prefix,
};
