//! The extension host pipeline.
//!
//! Wires watcher, compiler, loader, registry and execution isolation
//! together:
//!
//! ```text
//! SourceChange ──► header ──► resolve ──► compile ──┬──► load ──► registry ──► spawn
//!                                                   │
//!                                                   └──► report ──► registry (failed)
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use hotbed_sdk::ConstructionError;

use crate::compile::{
    CompilationResult, CompilationUnit, Compiler, CompilerConfig, DependencyHeaderParser,
    Diagnostic, ReferenceResolver, RustcCompiler, ToolchainManager,
};
use crate::error::Result;
use crate::execute::spawn_extension;
use crate::load::{DylibLoader, LoadedModule, ModuleLoader};
use crate::paths::HostDirs;
use crate::registry::{ExtensionRegistry, RecordUpdate};
use crate::report::{ErrorDisplay, LogErrorDisplay, render_diagnostics};
use crate::watch::{DEFAULT_SETTLE_DELAY, ExtensionSource, SourceChange, SourceWatcher};

/// Error recorded for a module that lists no extension types.
pub const NO_EXTENSIONS_ERROR: &str = "module exports no extensions";

/// Host configuration.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Directory layout.
    pub dirs: HostDirs,

    /// Compiler settings.
    pub compiler: CompilerConfig,

    /// Library search directories for reference resolution. Empty means
    /// the directories next to the running executable.
    pub lib_dirs: Vec<PathBuf>,

    /// How long a file must be quiet before it is compiled.
    pub settle_delay: Duration,
}

impl HostConfig {
    /// Default configuration rooted at `base_dir`.
    ///
    /// Creates the directories and removes build artifacts left by earlier
    /// runs; nothing is loaded yet at this point.
    pub fn from_base_dir(base_dir: &Path) -> Result<Self> {
        let dirs = HostDirs::from_base_dir(base_dir)?;
        dirs.clean()?;
        Ok(Self {
            compiler: CompilerConfig::for_dirs(&dirs),
            dirs,
            lib_dirs: Vec::new(),
            settle_delay: DEFAULT_SETTLE_DELAY,
        })
    }

    /// Search directories the resolver will use.
    pub fn search_dirs(&self) -> Vec<PathBuf> {
        if self.lib_dirs.is_empty() {
            ReferenceResolver::default_search_dirs()
        } else {
            self.lib_dirs.clone()
        }
    }

    /// Start a watcher over the extensions directory.
    pub fn watcher(&self) -> Result<SourceWatcher> {
        SourceWatcher::new(
            &self.dirs.extensions_dir,
            crate::watch::SOURCE_EXTENSION,
            self.settle_delay,
        )
    }
}

/// What happened to one source file.
#[derive(Debug)]
pub enum ProcessOutcome {
    /// Compiled, loaded and started.
    Loaded { instances: Vec<String> },

    /// Compilation failed.
    CompileFailed { diagnostics: Vec<Diagnostic> },

    /// The module could not be loaded or no instance could be constructed.
    LoadFailed { error: String },

    /// The module exports no extension types.
    Empty,
}

impl ProcessOutcome {
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded { .. })
    }
}

/// Hot-pluggable extension host.
pub struct ExtensionHost {
    parser: DependencyHeaderParser,
    resolver: ReferenceResolver,
    compiler: Box<dyn Compiler>,
    loader: Box<dyn ModuleLoader>,
    display: Box<dyn ErrorDisplay>,
    registry: Arc<ExtensionRegistry>,
}

impl ExtensionHost {
    /// Create a host that compiles with `rustc` and loads dynamic libraries.
    pub fn new(config: HostConfig) -> Result<Self> {
        let toolchain = ToolchainManager::new()?;
        tracing::info!("Using {}", toolchain.version());

        let resolver = ReferenceResolver::new(config.search_dirs());
        Ok(Self::with_parts(
            resolver,
            RustcCompiler::new(config.compiler, toolchain),
            DylibLoader::new(),
            LogErrorDisplay,
            Arc::new(ExtensionRegistry::new()),
        ))
    }

    /// Create a host from explicit collaborators.
    pub fn with_parts(
        resolver: ReferenceResolver,
        compiler: impl Compiler + 'static,
        loader: impl ModuleLoader + 'static,
        display: impl ErrorDisplay + 'static,
        registry: Arc<ExtensionRegistry>,
    ) -> Self {
        Self {
            parser: DependencyHeaderParser::new(),
            resolver,
            compiler: Box::new(compiler),
            loader: Box::new(loader),
            display: Box::new(display),
            registry,
        }
    }

    /// The shared registry, for menu builders and status queries.
    pub fn registry(&self) -> &Arc<ExtensionRegistry> {
        &self.registry
    }

    /// Compile, load and start one source file. Blocking.
    pub fn process(&self, source: &ExtensionSource) -> ProcessOutcome {
        let file_name = source.file_name();
        tracing::info!("Compiling: {}", file_name);

        let spec = self.parser.parse(&source.text);
        if !spec.is_empty() {
            tracing::debug!("{} declares {:?}", file_name, spec.identifiers());
        }
        let references = self.resolver.resolve(&spec);
        let unit = CompilationUnit::new(&file_name, &source.text);

        let module = match self.compiler.compile(&unit, &references) {
            CompilationResult::Success(module) => module,
            CompilationResult::Failure(diagnostics) => {
                let report = render_diagnostics(&file_name, &diagnostics);
                self.display.show(&file_name, &report);
                self.registry.upsert(
                    &file_name,
                    RecordUpdate::Failed {
                        error: report.trim_end().to_string(),
                    },
                );
                return ProcessOutcome::CompileFailed { diagnostics };
            }
        };

        match self.loader.load(&module) {
            Ok(loaded) if loaded.is_empty() => {
                self.display.show(&file_name, NO_EXTENSIONS_ERROR);
                self.registry.upsert(
                    &file_name,
                    RecordUpdate::Failed {
                        error: NO_EXTENSIONS_ERROR.to_string(),
                    },
                );
                ProcessOutcome::Empty
            }
            Ok(loaded) => self.start(&file_name, loaded),
            Err(e) => {
                self.display.show(&file_name, &e.with_hint());
                let error = e.to_string();
                self.registry.upsert(
                    &file_name,
                    RecordUpdate::Failed {
                        error: error.clone(),
                    },
                );
                ProcessOutcome::LoadFailed { error }
            }
        }
    }

    fn start(&self, file_name: &str, loaded: LoadedModule) -> ProcessOutcome {
        let LoadedModule {
            extensions,
            failures,
        } = loaded;

        let Some(first) = extensions.first() else {
            let error = join_failures(&failures);
            self.display.show(file_name, &error);
            self.registry.upsert(
                file_name,
                RecordUpdate::Failed {
                    error: error.clone(),
                },
            );
            return ProcessOutcome::LoadFailed { error };
        };

        let metadata = first.metadata();
        let menu_items = extensions
            .iter()
            .flat_map(|e| e.menu_items())
            .collect();
        let generation = self.registry.upsert(
            file_name,
            RecordUpdate::Loaded {
                metadata,
                menu_items,
            },
        );

        if !failures.is_empty() {
            let error = join_failures(&failures);
            self.display.show(file_name, &error);
            self.registry.fault(file_name, generation, error);
        }

        let mut instances = Vec::with_capacity(extensions.len());
        for extension in extensions {
            let name = extension.metadata().name;
            tracing::info!("Found extension: {} in {}", name, file_name);

            let registry = Arc::clone(&self.registry);
            match spawn_extension(registry, file_name, generation, extension) {
                Ok(handle) => {
                    self.registry.attach(file_name, handle);
                    instances.push(name);
                }
                Err(e) => {
                    tracing::error!("{}", e);
                    self.registry.fault(file_name, generation, e.to_string());
                }
            }
        }

        ProcessOutcome::Loaded { instances }
    }

    /// Process one change on the blocking pool.
    ///
    /// Returns `None` if the pipeline itself panicked; the host keeps going.
    pub async fn handle_change(self: Arc<Self>, change: SourceChange) -> Option<ProcessOutcome> {
        let file_name = change.source.file_name();
        let started = change.detected_at;

        let host = Arc::clone(&self);
        let task = tokio::task::spawn_blocking(move || host.process(&change.source));
        match task.await {
            Ok(outcome) => {
                tracing::debug!(
                    "Processed {} in {}ms",
                    file_name,
                    started.elapsed().as_millis()
                );
                Some(outcome)
            }
            Err(e) => {
                tracing::error!("Error processing {}: {}", file_name, e);
                None
            }
        }
    }

    /// Compile everything already present, then react to changes until the
    /// watcher shuts down.
    pub async fn run(self: Arc<Self>, mut watcher: SourceWatcher) -> Result<()> {
        for source in watcher.scan_existing()? {
            let change = SourceChange {
                source,
                detected_at: Instant::now(),
            };
            Arc::clone(&self).handle_change(change).await;
        }

        tracing::info!("Watching for changes in: {}", watcher.dir().display());

        while let Some(change) = watcher.next_change().await {
            Arc::clone(&self).handle_change(change).await;
        }

        Ok(())
    }

    /// Ask every running instance to stop. Returns how many were signalled.
    pub fn shutdown(&self) -> usize {
        let signalled = self.registry.abort_all();
        tracing::info!("Signalled {} running extension(s)", signalled);
        signalled
    }
}

fn join_failures(failures: &[ConstructionError]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
