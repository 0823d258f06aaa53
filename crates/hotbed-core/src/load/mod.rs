//! Module loading and contract discovery.
//!
//! A compiled module exports one registration entry point (generated by
//! `hotbed_sdk::export_extensions!`). Loading a module calls it and yields
//! one [`LoadedExtension`] per exported type that constructed successfully.

mod dylib;

use std::fmt;
use std::sync::Arc;

use hotbed_sdk::{ConstructionError, Extension, MenuAction, MenuItem};
use libloading::Library;

use crate::compile::CompiledModule;
use crate::error::Result;

pub use dylib::DylibLoader;

/// Something that can turn a compiled module into extension instances.
pub trait ModuleLoader: Send + Sync {
    fn load(&self, module: &CompiledModule) -> Result<LoadedModule>;
}

/// Everything discovered in one module.
#[derive(Debug, Default)]
pub struct LoadedModule {
    /// Instances ready to run, in export order.
    pub extensions: Vec<LoadedExtension>,

    /// Exported types whose construction panicked.
    pub failures: Vec<ConstructionError>,
}

impl LoadedModule {
    /// True if the module listed no types at all.
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty() && self.failures.is_empty()
    }
}

/// Display metadata of an extension instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionMetadata {
    pub name: String,
    pub version: String,
    pub description: String,
}

impl ExtensionMetadata {
    pub fn of(extension: &dyn Extension) -> Self {
        Self {
            name: extension.name().to_string(),
            version: extension.version().to_string(),
            description: extension.description().to_string(),
        }
    }
}

/// One extension instance plus the library its code lives in.
pub struct LoadedExtension {
    // Field order matters: the instance must drop before its library.
    instance: Box<dyn Extension>,
    library: Option<Arc<Library>>,
}

impl LoadedExtension {
    /// Wrap an instance whose code lives in `library`.
    pub fn from_library(instance: Box<dyn Extension>, library: Arc<Library>) -> Self {
        Self {
            instance,
            library: Some(library),
        }
    }

    /// Wrap an instance whose code is linked into the host.
    pub fn in_process(instance: Box<dyn Extension>) -> Self {
        Self {
            instance,
            library: None,
        }
    }

    pub fn metadata(&self) -> ExtensionMetadata {
        ExtensionMetadata::of(self.instance.as_ref())
    }

    /// Menu items of the instance.
    ///
    /// Actions of dynamically loaded instances hold a reference to their
    /// library, so the code they point into outlives every copy of the item.
    pub fn menu_items(&self) -> Vec<MenuItem> {
        let items = self.instance.menu_items();
        let Some(library) = &self.library else {
            return items;
        };

        items
            .into_iter()
            .map(|mut item| {
                if let Some(action) = item.action.take() {
                    let pinned = PinnedAction {
                        action,
                        _library: Arc::clone(library),
                    };
                    item.action = Some(Arc::new(move || pinned.call()));
                }
                item
            })
            .collect()
    }

    pub fn instance(&self) -> &dyn Extension {
        self.instance.as_ref()
    }

    pub fn instance_mut(&mut self) -> &mut dyn Extension {
        self.instance.as_mut()
    }

    /// Whether the instance was loaded from a dynamic library.
    pub fn is_dynamic(&self) -> bool {
        self.library.is_some()
    }
}

/// A menu action together with the library its code lives in.
struct PinnedAction {
    // Dropped before the library.
    action: MenuAction,
    _library: Arc<Library>,
}

impl PinnedAction {
    fn call(&self) {
        (self.action)()
    }
}

impl fmt::Debug for LoadedExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedExtension")
            .field("name", &self.instance.name())
            .field("dynamic", &self.is_dynamic())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hotbed_sdk::{ExtensionError, Logger};

    struct Tray;

    impl Extension for Tray {
        fn name(&self) -> &str {
            "Tray"
        }
        fn version(&self) -> &str {
            "2.1.0"
        }
        fn description(&self) -> &str {
            "Adds tray entries"
        }
        fn prepare(&mut self, _logger: &Logger) -> std::result::Result<(), ExtensionError> {
            Ok(())
        }
        fn execute(&mut self, _logger: &Logger) -> std::result::Result<(), ExtensionError> {
            Ok(())
        }
        fn menu_items(&self) -> Vec<MenuItem> {
            vec![MenuItem::new("Open"), MenuItem::separator()]
        }
    }

    #[test]
    fn test_in_process_extension() {
        let loaded = LoadedExtension::in_process(Box::new(Tray));

        assert!(!loaded.is_dynamic());
        assert_eq!(
            loaded.metadata(),
            ExtensionMetadata {
                name: "Tray".to_string(),
                version: "2.1.0".to_string(),
                description: "Adds tray entries".to_string(),
            }
        );
        assert_eq!(loaded.menu_items().len(), 2);
        assert!(format!("{loaded:?}").contains("Tray"));
    }

    #[test]
    fn test_empty_module() {
        assert!(LoadedModule::default().is_empty());
    }
}
