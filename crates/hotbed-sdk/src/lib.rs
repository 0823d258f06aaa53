//! hotbed-sdk: the contract every hotbed extension implements.
//!
//! An extension is a single Rust source file dropped into the host's
//! `extensions/` directory. The host compiles it into a dynamic library,
//! links it against this crate, and calls the registration entry point that
//! [`export_extensions!`] generates.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! // Dependencies: serde_json
//! use hotbed_sdk::prelude::*;
//!
//! #[derive(Default)]
//! pub struct Greeter {
//!     message: String,
//! }
//!
//! impl Extension for Greeter {
//!     fn name(&self) -> &str { "Greeter" }
//!     fn version(&self) -> &str { "1.0.0" }
//!     fn description(&self) -> &str { "Says hello once" }
//!
//!     fn prepare(&mut self, logger: &Logger) -> Result<(), ExtensionError> {
//!         self.message = "Hello, World!".to_string();
//!         logger.info("prepared");
//!         Ok(())
//!     }
//!
//!     fn execute(&mut self, logger: &Logger) -> Result<(), ExtensionError> {
//!         logger.info(&self.message);
//!         Ok(())
//!     }
//! }
//!
//! hotbed_sdk::export_extensions!(Greeter);
//! ```
//!
//! # Lifecycle
//!
//! The host default-constructs every exported type, reads its metadata and
//! menu items, then calls [`Extension::prepare`] followed by
//! [`Extension::execute`] on a dedicated thread. `execute` may block for the
//! lifetime of the process (for example to serve HTTP requests).
//!
//! # ABI
//!
//! Extensions are compiled by the host with the same `rustc` and against the
//! same build of this crate, so trait objects cross the library boundary
//! unchanged. [`ABI_VERSION`] is bumped whenever the contract changes shape.

mod error;
mod logger;
mod menu;

use std::mem::ManuallyDrop;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

pub use error::ExtensionError;
pub use logger::{ExtensionLogger, LogLevel, Logger};
pub use menu::{MenuAction, MenuItem};

/// Version of the binary contract between the host and compiled extensions.
pub const ABI_VERSION: u32 = 1;

/// Symbol exported by every extension module reporting its [`ABI_VERSION`].
pub const ABI_VERSION_SYMBOL: &str = "hotbed_abi_version";

/// Symbol exported by every extension module returning its [`Registration`].
pub const REGISTER_SYMBOL: &str = "hotbed_register_extensions";

/// Signature of the [`ABI_VERSION_SYMBOL`] entry point.
pub type AbiVersionFn = unsafe extern "C" fn() -> u32;

/// Signature of the [`REGISTER_SYMBOL`] entry point.
///
/// The returned pointer is produced by `Box::into_raw` and ownership passes
/// to the caller.
pub type RegisterFn = unsafe extern "C" fn() -> *mut Registration;

/// The extension contract.
///
/// Implementors must also implement [`Default`] to be listed in
/// [`export_extensions!`]; the host creates exactly one instance per type.
pub trait Extension: Send {
    /// Display name shown in the host's menu.
    fn name(&self) -> &str;

    /// Version string of the extension.
    fn version(&self) -> &str;

    /// One-line description.
    fn description(&self) -> &str;

    /// Called exactly once, before [`Extension::execute`].
    fn prepare(&mut self, logger: &Logger) -> Result<(), ExtensionError>;

    /// Called exactly once, after [`Extension::prepare`] succeeded.
    ///
    /// May block indefinitely; it runs on a thread owned by this instance.
    fn execute(&mut self, logger: &Logger) -> Result<(), ExtensionError>;

    /// Menu entries contributed to the host's menu.
    fn menu_items(&self) -> Vec<MenuItem> {
        Vec::new()
    }
}

/// A type listed in [`export_extensions!`] whose construction panicked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstructionError {
    /// Rust type name as written in the macro invocation.
    pub type_name: String,
    /// Panic message.
    pub message: String,
}

impl std::fmt::Display for ConstructionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "failed to construct {}: {}", self.type_name, self.message)
    }
}

impl std::error::Error for ConstructionError {}

/// Everything one extension module hands to the host.
pub struct Registration {
    entries: Vec<Result<Box<dyn Extension>, ConstructionError>>,
}

impl Registration {
    /// Create a registration from constructed (or failed) instances.
    pub fn new(entries: Vec<Result<Box<dyn Extension>, ConstructionError>>) -> Self {
        Self { entries }
    }

    /// Number of listed types.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no types were listed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consume the registration.
    pub fn into_entries(self) -> Vec<Result<Box<dyn Extension>, ConstructionError>> {
        self.entries
    }
}

/// Default-construct `T`, turning a panic into a [`ConstructionError`].
///
/// The instance is wrapped in [`Guarded`] so panics in its hooks are caught
/// inside the module that raised them. Name, version and description are
/// read once here, so a panicking accessor fails construction instead of
/// reaching the host.
#[doc(hidden)]
pub fn construct<T>(type_name: &str) -> Result<Box<dyn Extension>, ConstructionError>
where
    T: Extension + Default + 'static,
{
    let built = catch_unwind(|| Box::new(Guarded::new(T::default())) as Box<dyn Extension>);
    built.map_err(|payload| ConstructionError {
        type_name: type_name.to_string(),
        message: panic_message(payload.as_ref()),
    })
}

/// Wrapper keeping every panic of an extension inside its module.
///
/// A compiled module carries its own copy of the standard library, so its
/// panics must be caught on its side of the boundary. Hook panics become
/// [`ExtensionError::Panicked`]; panics in menu actions and in `Drop` are
/// swallowed.
#[doc(hidden)]
pub struct Guarded<T> {
    inner: ManuallyDrop<T>,
    name: String,
    version: String,
    description: String,
}

impl<T: Extension> Guarded<T> {
    /// Wrap `inner`, reading its metadata. Panics if an accessor panics.
    pub fn new(inner: T) -> Self {
        Self {
            name: inner.name().to_string(),
            version: inner.version().to_string(),
            description: inner.description().to_string(),
            inner: ManuallyDrop::new(inner),
        }
    }

    fn guard<R>(
        &mut self,
        hook: impl FnOnce(&mut T) -> Result<R, ExtensionError>,
    ) -> Result<R, ExtensionError> {
        let inner = &mut *self.inner;
        match catch_unwind(AssertUnwindSafe(|| hook(inner))) {
            Ok(result) => result,
            Err(payload) => Err(ExtensionError::Panicked(panic_message(payload.as_ref()))),
        }
    }
}

impl<T: Extension> Extension for Guarded<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn prepare(&mut self, logger: &Logger) -> Result<(), ExtensionError> {
        self.guard(|ext| ext.prepare(logger))
    }

    fn execute(&mut self, logger: &Logger) -> Result<(), ExtensionError> {
        self.guard(|ext| ext.execute(logger))
    }

    fn menu_items(&self) -> Vec<MenuItem> {
        let items = catch_unwind(AssertUnwindSafe(|| self.inner.menu_items()));
        items
            .unwrap_or_default()
            .into_iter()
            .map(|mut item| {
                if let Some(action) = item.action.take() {
                    item.action = Some(Arc::new(move || {
                        let _ = catch_unwind(AssertUnwindSafe(|| action()));
                    }));
                }
                item
            })
            .collect()
    }
}

impl<T> Drop for Guarded<T> {
    fn drop(&mut self) {
        // SAFETY: `inner` is taken exactly once, here, and never used again.
        let inner = unsafe { ManuallyDrop::take(&mut self.inner) };
        let _ = catch_unwind(AssertUnwindSafe(move || drop(inner)));
    }
}

/// Extract a readable message from a panic payload.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Export the listed extension types from a compiled extension module.
///
/// Generates the two entry points the host looks up: the ABI version check
/// and the registration function. Each type must implement [`Extension`] and
/// [`Default`].
///
/// ```rust,ignore
/// hotbed_sdk::export_extensions!(HelloWorld, Bookmarks);
/// ```
#[macro_export]
macro_rules! export_extensions {
    ($($ty:ty),* $(,)?) => {
        #[unsafe(no_mangle)]
        pub extern "C" fn hotbed_abi_version() -> u32 {
            $crate::ABI_VERSION
        }

        #[unsafe(no_mangle)]
        #[allow(improper_ctypes_definitions)]
        pub extern "C" fn hotbed_register_extensions() -> *mut $crate::Registration {
            let entries = ::std::vec![
                $( $crate::construct::<$ty>(::std::stringify!($ty)) ),*
            ];
            ::std::boxed::Box::into_raw(::std::boxed::Box::new($crate::Registration::new(entries)))
        }
    };
}

pub mod prelude {
    //! Common imports for extension sources.
    //!
    //! ```rust,ignore
    //! use hotbed_sdk::prelude::*;
    //! ```

    pub use crate::{Extension, ExtensionError, ExtensionLogger, LogLevel, Logger, MenuItem};
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Quiet;

    impl Extension for Quiet {
        fn name(&self) -> &str {
            "Quiet"
        }
        fn version(&self) -> &str {
            "0.1.0"
        }
        fn description(&self) -> &str {
            "does nothing"
        }
        fn prepare(&mut self, _logger: &Logger) -> Result<(), ExtensionError> {
            Ok(())
        }
        fn execute(&mut self, _logger: &Logger) -> Result<(), ExtensionError> {
            Ok(())
        }
    }

    struct Exploding;

    impl Default for Exploding {
        fn default() -> Self {
            panic!("no config file")
        }
    }

    impl Extension for Exploding {
        fn name(&self) -> &str {
            "Exploding"
        }
        fn version(&self) -> &str {
            "0.0.0"
        }
        fn description(&self) -> &str {
            ""
        }
        fn prepare(&mut self, _logger: &Logger) -> Result<(), ExtensionError> {
            Ok(())
        }
        fn execute(&mut self, _logger: &Logger) -> Result<(), ExtensionError> {
            Ok(())
        }
    }

    mod exported {
        use super::{Exploding, Quiet};

        crate::export_extensions!(Quiet, Exploding);
    }

    #[test]
    fn test_construct_success() {
        let ext = construct::<Quiet>("Quiet").unwrap();
        assert_eq!(ext.name(), "Quiet");
        assert!(ext.menu_items().is_empty());
    }

    #[test]
    fn test_construct_panic_is_captured() {
        let err = construct::<Exploding>("Exploding").err().unwrap();
        assert_eq!(err.type_name, "Exploding");
        assert_eq!(err.message, "no config file");
        assert!(err.to_string().contains("failed to construct Exploding"));
    }

    #[test]
    fn test_export_macro_entry_points() {
        assert_eq!(exported::hotbed_abi_version(), ABI_VERSION);

        let raw = exported::hotbed_register_extensions();
        assert!(!raw.is_null());
        let registration = unsafe { Box::from_raw(raw) };
        assert_eq!(registration.len(), 2);

        let entries = registration.into_entries();
        assert!(entries[0].is_ok());
        assert!(entries[1].is_err());
    }

    #[derive(Default)]
    struct Crashing;

    impl Extension for Crashing {
        fn name(&self) -> &str {
            "Crashing"
        }
        fn version(&self) -> &str {
            "1.0.0"
        }
        fn description(&self) -> &str {
            "panics on execute"
        }
        fn prepare(&mut self, _logger: &Logger) -> Result<(), ExtensionError> {
            Ok(())
        }
        fn execute(&mut self, _logger: &Logger) -> Result<(), ExtensionError> {
            panic!("index out of range")
        }
    }

    struct NullLogger;

    impl ExtensionLogger for NullLogger {
        fn log(&self, _: LogLevel, _: &str, _: Option<&(dyn std::error::Error + 'static)>) {}
    }

    #[test]
    fn test_guarded_hook_panic_becomes_error() {
        let logger: Logger = std::sync::Arc::new(NullLogger);
        let mut ext = construct::<Crashing>("Crashing").unwrap();

        assert!(ext.prepare(&logger).is_ok());
        let err = ext.execute(&logger).unwrap_err();
        assert!(matches!(err, ExtensionError::Panicked(ref m) if m == "index out of range"));
        assert_eq!(err.to_string(), "panicked: index out of range");
    }

    #[derive(Default)]
    struct Unfinished;

    impl Extension for Unfinished {
        fn name(&self) -> &str {
            todo!()
        }
        fn version(&self) -> &str {
            "0.1.0"
        }
        fn description(&self) -> &str {
            "name not written yet"
        }
        fn prepare(&mut self, _logger: &Logger) -> Result<(), ExtensionError> {
            Ok(())
        }
        fn execute(&mut self, _logger: &Logger) -> Result<(), ExtensionError> {
            Ok(())
        }
    }

    #[test]
    fn test_accessor_panic_fails_construction() {
        let err = construct::<Unfinished>("Unfinished").err().unwrap();
        assert_eq!(err.type_name, "Unfinished");
        assert_eq!(err.message, "not yet implemented");
    }

    static DROPS: AtomicUsize = AtomicUsize::new(0);

    #[derive(Default)]
    struct Brittle;

    impl Extension for Brittle {
        fn name(&self) -> &str {
            "Brittle"
        }
        fn version(&self) -> &str {
            "1.0.0"
        }
        fn description(&self) -> &str {
            "panics in its menu action"
        }
        fn prepare(&mut self, _logger: &Logger) -> Result<(), ExtensionError> {
            Ok(())
        }
        fn execute(&mut self, _logger: &Logger) -> Result<(), ExtensionError> {
            Ok(())
        }
        fn menu_items(&self) -> Vec<MenuItem> {
            vec![MenuItem::new("Break").with_action(|| panic!("clicked"))]
        }
    }

    #[derive(Default)]
    struct Shattering;

    impl Extension for Shattering {
        fn name(&self) -> &str {
            "Shattering"
        }
        fn version(&self) -> &str {
            "1.0.0"
        }
        fn description(&self) -> &str {
            "panics on drop"
        }
        fn prepare(&mut self, _logger: &Logger) -> Result<(), ExtensionError> {
            Ok(())
        }
        fn execute(&mut self, _logger: &Logger) -> Result<(), ExtensionError> {
            Ok(())
        }
    }

    impl Drop for Shattering {
        fn drop(&mut self) {
            DROPS.fetch_add(1, Ordering::SeqCst);
            panic!("drop failed");
        }
    }

    #[test]
    fn test_menu_action_panic_is_contained() {
        let ext = construct::<Brittle>("Brittle").unwrap();
        let items = ext.menu_items();

        assert_eq!(items.len(), 1);
        assert!(items[0].invoke());
    }

    #[test]
    fn test_drop_panic_is_contained() {
        let before = DROPS.load(Ordering::SeqCst);
        let ext = construct::<Shattering>("Shattering").unwrap();
        assert_eq!(ext.name(), "Shattering");

        drop(ext);
        assert_eq!(DROPS.load(Ordering::SeqCst), before + 1);
    }

    #[test]
    fn test_panic_message_variants() {
        let owned: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        let borrowed: Box<dyn std::any::Any + Send> = Box::new("borrowed");
        let other: Box<dyn std::any::Any + Send> = Box::new(7_u8);

        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(borrowed.as_ref()), "borrowed");
        assert_eq!(panic_message(other.as_ref()), "unknown panic payload");
    }
}
