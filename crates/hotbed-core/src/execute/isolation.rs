//! One OS thread per extension instance.
//!
//! Extension hooks may block forever or fail in any way, so each instance
//! runs `prepare` then `execute` on a thread of its own. Errors and panics
//! are caught at the thread boundary and recorded in the registry; they
//! never reach the watcher or any other instance.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use hotbed_sdk::{Logger, panic_message};

use crate::error::{Error, Result};
use crate::load::LoadedExtension;
use crate::registry::ExtensionRegistry;

use super::context::{AbortHandle, ExtensionState, RunHandle, StateCell};
use super::logger::TracingLogger;

/// Start the lifecycle of `extension` on a dedicated thread.
///
/// `generation` is the record generation the instance was loaded under;
/// a failure is recorded only while it is still current.
pub fn spawn_extension(
    registry: Arc<ExtensionRegistry>,
    file_name: &str,
    generation: u64,
    extension: LoadedExtension,
) -> Result<RunHandle> {
    let instance = extension.metadata().name;
    let state = StateCell::new();
    let abort = AbortHandle::new();

    let worker = Lifecycle {
        registry,
        file_name: file_name.to_string(),
        instance: instance.clone(),
        generation,
        state: state.clone(),
    };

    let thread = std::thread::Builder::new()
        .name(format!("ext:{file_name}:{instance}"))
        .spawn(move || worker.run(extension))
        .map_err(|source| Error::Spawn {
            instance: instance.clone(),
            source,
        })?;

    Ok(RunHandle::new(instance, generation, state, abort, thread))
}

struct Lifecycle {
    registry: Arc<ExtensionRegistry>,
    file_name: String,
    instance: String,
    generation: u64,
    state: StateCell,
}

impl Lifecycle {
    fn run(self, mut extension: LoadedExtension) {
        let logger: Logger = Arc::new(TracingLogger::new(&self.instance, &self.file_name));

        let outcome = catch_unwind(AssertUnwindSafe(|| self.hooks(&mut extension, &logger)));

        match outcome {
            Ok(Ok(())) => {
                self.state.advance(ExtensionState::Completed);
                tracing::info!("{} ({}) completed", self.instance, self.file_name);
            }
            Ok(Err(message)) => self.fail(message),
            Err(payload) => {
                let hook = match self.state.get() {
                    ExtensionState::Preparing => "prepare",
                    _ => "execute",
                };
                let message = panic_message(payload.as_ref());
                self.fail(format!("{hook} failed: panicked: {message}"));
            }
        }

        // The instance drops here, on its own thread.
        drop(extension);
    }

    fn hooks(
        &self,
        extension: &mut LoadedExtension,
        logger: &Logger,
    ) -> std::result::Result<(), String> {
        self.state.advance(ExtensionState::Preparing);
        tracing::info!("Calling prepare() on {}", self.instance);
        extension
            .instance_mut()
            .prepare(logger)
            .map_err(|e| format!("prepare failed: {e}"))?;
        self.state.advance(ExtensionState::Ready);

        self.state.advance(ExtensionState::Running);
        tracing::info!("Calling execute() on {}", self.instance);
        extension
            .instance_mut()
            .execute(logger)
            .map_err(|e| format!("execute failed: {e}"))
    }

    fn fail(&self, message: String) {
        self.state.advance(ExtensionState::Faulted);
        tracing::error!(
            extension = %self.instance,
            file = %self.file_name,
            "Runtime error: {}",
            message
        );

        let error = format!("{}: {}", self.instance, message);
        if !self.registry.fault(&self.file_name, self.generation, error) {
            tracing::debug!("{} was reloaded; fault not recorded", self.file_name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use hotbed_sdk::{Extension, ExtensionError};

    use crate::load::ExtensionMetadata;
    use crate::registry::RecordUpdate;

    #[derive(Clone, Copy)]
    enum Behaviour {
        Succeed,
        FailPrepare,
        PanicExecute,
    }

    struct Scripted {
        behaviour: Behaviour,
        executed: Arc<AtomicBool>,
    }

    impl Extension for Scripted {
        fn name(&self) -> &str {
            "Scripted"
        }
        fn version(&self) -> &str {
            "1.0.0"
        }
        fn description(&self) -> &str {
            "test double"
        }
        fn prepare(&mut self, _logger: &Logger) -> std::result::Result<(), ExtensionError> {
            match self.behaviour {
                Behaviour::FailPrepare => Err(ExtensionError::msg("missing settings")),
                _ => Ok(()),
            }
        }
        fn execute(&mut self, _logger: &Logger) -> std::result::Result<(), ExtensionError> {
            self.executed.store(true, Ordering::SeqCst);
            match self.behaviour {
                Behaviour::PanicExecute => panic!("bad index"),
                _ => Ok(()),
            }
        }
    }

    fn run(behaviour: Behaviour) -> (Arc<ExtensionRegistry>, ExtensionState, bool) {
        let registry = Arc::new(ExtensionRegistry::new());
        let generation = registry.upsert(
            "s.rs",
            RecordUpdate::Loaded {
                metadata: ExtensionMetadata {
                    name: "Scripted".to_string(),
                    ..Default::default()
                },
                menu_items: Vec::new(),
            },
        );

        let executed = Arc::new(AtomicBool::new(false));
        let extension = LoadedExtension::in_process(Box::new(Scripted {
            behaviour,
            executed: executed.clone(),
        }));

        let spawned = spawn_extension(registry.clone(), "s.rs", generation, extension);
        let state = spawned.unwrap().join();
        (registry, state, executed.load(Ordering::SeqCst))
    }

    #[test]
    fn test_successful_lifecycle() {
        let (registry, state, executed) = run(Behaviour::Succeed);

        assert_eq!(state, ExtensionState::Completed);
        assert!(executed);
        assert!(registry.get("s.rs").unwrap().is_loaded);
    }

    #[test]
    fn test_prepare_error_skips_execute() {
        let (registry, state, executed) = run(Behaviour::FailPrepare);

        assert_eq!(state, ExtensionState::Faulted);
        assert!(!executed);
        let record = registry.get("s.rs").unwrap();
        assert!(!record.is_loaded);
        assert_eq!(
            record.error_message.as_deref(),
            Some("Scripted: prepare failed: missing settings")
        );
    }

    #[test]
    fn test_execute_panic_is_contained() {
        let (registry, state, executed) = run(Behaviour::PanicExecute);

        assert_eq!(state, ExtensionState::Faulted);
        assert!(executed);
        let message = registry.get("s.rs").unwrap().error_message.unwrap();
        assert!(message.contains("execute failed: panicked: bad index"));
    }
}
