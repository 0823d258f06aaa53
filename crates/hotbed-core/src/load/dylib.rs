//! Dynamic library loader.

use std::sync::{Arc, Mutex, PoisonError};

use hotbed_sdk::{ABI_VERSION, ABI_VERSION_SYMBOL, AbiVersionFn, REGISTER_SYMBOL, RegisterFn};
use libloading::{Library, Symbol};

use crate::compile::CompiledModule;
use crate::error::{Error, Result};

use super::{LoadedExtension, LoadedModule, ModuleLoader};

/// Loads `cdylib`s produced by the compilation engine.
///
/// Every load opens a fresh library. Libraries stay mapped for the lifetime
/// of the loader, since extension code may keep running on threads of its
/// own after its instance is gone.
#[derive(Debug, Default)]
pub struct DylibLoader {
    libraries: Mutex<Vec<Arc<Library>>>,
}

impl DylibLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of libraries loaded so far.
    pub fn loaded_count(&self) -> usize {
        self.libraries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl ModuleLoader for DylibLoader {
    fn load(&self, module: &CompiledModule) -> Result<LoadedModule> {
        // SAFETY: the module was just produced by our own compiler; its
        // initialisers are the Rust runtime's.
        let library = unsafe { Library::new(&module.path) }?;
        release_artifact(module);

        let missing = |symbol: &str| Error::MissingSymbol {
            module: module.name.clone(),
            symbol: symbol.to_string(),
        };

        let raw = {
            let abi_version: Symbol<AbiVersionFn> =
                unsafe { library.get(ABI_VERSION_SYMBOL.as_bytes()) }
                    .map_err(|_| missing(ABI_VERSION_SYMBOL))?;

            let found = unsafe { abi_version() };
            if found != ABI_VERSION {
                return Err(Error::AbiMismatch {
                    module: module.name.clone(),
                    expected: ABI_VERSION,
                    found,
                });
            }

            let register: Symbol<RegisterFn> =
                unsafe { library.get(REGISTER_SYMBOL.as_bytes()) }
                    .map_err(|_| missing(REGISTER_SYMBOL))?;

            unsafe { register() }
        };

        if raw.is_null() {
            return Err(Error::EmptyRegistration(module.name.clone()));
        }

        // SAFETY: produced by `Box::into_raw` in the module's entry point,
        // with the same SDK build and allocator.
        let registration = unsafe { Box::from_raw(raw) };
        let library = Arc::new(library);
        self.libraries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&library));

        let mut loaded = LoadedModule::default();
        for entry in registration.into_entries() {
            match entry {
                Ok(instance) => {
                    let library = Arc::clone(&library);
                    let extension = LoadedExtension::from_library(instance, library);
                    loaded.extensions.push(extension);
                }
                Err(failure) => {
                    tracing::warn!("{}: {}", module.name, failure);
                    loaded.failures.push(failure);
                }
            }
        }

        tracing::debug!(
            "Loaded {} ({} instance(s), {} failure(s))",
            module.path.display(),
            loaded.extensions.len(),
            loaded.failures.len()
        );

        Ok(loaded)
    }
}

/// Unlink the artifact once it is mapped; the mapping keeps its pages.
#[cfg(unix)]
fn release_artifact(module: &CompiledModule) {
    if let Err(e) = std::fs::remove_file(&module.path) {
        tracing::debug!("Could not remove {}: {}", module.path.display(), e);
    }
}

/// Windows locks mapped libraries; the build dir is cleaned at startup.
#[cfg(not(unix))]
fn release_artifact(_module: &CompiledModule) {}
