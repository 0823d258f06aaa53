//! Extension registry.
//!
//! One record per source file, updated in place on every (re)compilation,
//! plus the run handles of every instance started from that file. The
//! registry is created once by the host and shared by `Arc`; the menu
//! builder reads it through [`ExtensionRegistry::snapshot`].

use std::sync::{Mutex, MutexGuard, PoisonError};

use hotbed_sdk::MenuItem;
use rustc_hash::FxHashMap;

use crate::execute::{ExtensionState, RunHandle};
use crate::load::ExtensionMetadata;

/// Error text used when a failure carries no message of its own.
const UNSPECIFIED_ERROR: &str = "unspecified error";

/// Load status of one source file.
#[derive(Debug, Clone)]
pub struct ExtensionRecord {
    /// Source file name; the registry key.
    pub file_name: String,

    /// Extension name (the file stem until a load succeeds).
    pub name: String,

    pub version: String,

    pub description: String,

    /// True iff the latest compile and load succeeded and nothing has
    /// faulted since.
    pub is_loaded: bool,

    /// Set iff `is_loaded` is false. Never empty.
    pub error_message: Option<String>,

    /// Menu entries contributed by the loaded instances.
    pub menu_items: Vec<MenuItem>,

    /// Number of successful loads of this file.
    pub generation: u64,

    /// Whether instances of `generation` are still the current build.
    live: bool,
}

impl ExtensionRecord {
    fn placeholder(file_name: &str) -> Self {
        let name = file_name
            .strip_suffix(".rs")
            .unwrap_or(file_name)
            .to_string();
        Self {
            file_name: file_name.to_string(),
            name,
            version: String::new(),
            description: String::new(),
            is_loaded: false,
            error_message: None,
            menu_items: Vec::new(),
            generation: 0,
            live: false,
        }
    }

    fn mark_failed(&mut self, error: String) {
        self.is_loaded = false;
        self.error_message = Some(non_empty(error));
        self.menu_items.clear();
    }
}

/// Outcome of one compile-and-load attempt.
#[derive(Debug, Clone)]
pub enum RecordUpdate {
    /// Load succeeded.
    Loaded {
        metadata: ExtensionMetadata,
        menu_items: Vec<MenuItem>,
    },

    /// Compilation or loading failed. Prior metadata is kept.
    Failed { error: String },
}

#[derive(Default)]
struct Inner {
    /// Records in first-seen order.
    records: Vec<ExtensionRecord>,
    /// File name → index into `records`.
    index: FxHashMap<String, usize>,
    /// Run handles per file.
    handles: FxHashMap<String, Vec<RunHandle>>,
}

impl Inner {
    fn record_mut(&mut self, file_name: &str) -> &mut ExtensionRecord {
        let idx = match self.index.get(file_name) {
            Some(&idx) => idx,
            None => {
                let idx = self.records.len();
                self.records.push(ExtensionRecord::placeholder(file_name));
                self.index.insert(file_name.to_string(), idx);
                idx
            }
        };
        &mut self.records[idx]
    }
}

/// Thread-safe table of extension records.
#[derive(Default)]
pub struct ExtensionRegistry {
    inner: Mutex<Inner>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or update the record for `file_name`.
    ///
    /// Returns the record's generation after the update.
    pub fn upsert(&self, file_name: &str, update: RecordUpdate) -> u64 {
        let mut inner = self.lock();
        let record = inner.record_mut(file_name);

        match update {
            RecordUpdate::Loaded {
                metadata,
                menu_items,
            } => {
                record.name = metadata.name;
                record.version = metadata.version;
                record.description = metadata.description;
                record.is_loaded = true;
                record.error_message = None;
                record.menu_items = menu_items;
                record.generation += 1;
                record.live = true;
            }
            RecordUpdate::Failed { error } => {
                record.mark_failed(error);
                record.live = false;
            }
        }

        record.generation
    }

    /// Record a runtime failure of an instance loaded under `generation`.
    ///
    /// Ignored (returns false) if the file has been reloaded or has failed
    /// to recompile since. Faults of the same generation accumulate.
    pub fn fault(&self, file_name: &str, generation: u64, error: impl Into<String>) -> bool {
        let mut inner = self.lock();
        let Some(&idx) = inner.index.get(file_name) else {
            return false;
        };

        let record = &mut inner.records[idx];
        if !record.live || record.generation != generation {
            tracing::debug!(
                "Ignoring fault from stale generation {} of {} (current {})",
                generation,
                file_name,
                record.generation
            );
            return false;
        }

        let error = non_empty(error.into());
        let message = match record.error_message.take() {
            Some(mut earlier) => {
                earlier.push_str("; ");
                earlier.push_str(&error);
                earlier
            }
            None => error,
        };
        record.mark_failed(message);
        true
    }

    /// Copy of every record, in first-seen order.
    pub fn snapshot(&self) -> Vec<ExtensionRecord> {
        self.lock().records.clone()
    }

    pub fn get(&self, file_name: &str) -> Option<ExtensionRecord> {
        let inner = self.lock();
        inner
            .index
            .get(file_name)
            .map(|&idx| inner.records[idx].clone())
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keep a run handle for `file_name`, dropping handles of earlier
    /// generations whose instances have already exited.
    pub fn attach(&self, file_name: &str, handle: RunHandle) {
        let mut inner = self.lock();
        let handles = inner.handles.entry(file_name.to_string()).or_default();
        handles.retain(|h| h.generation() == handle.generation() || !h.is_finished());
        handles.push(handle);
    }

    /// Instance names and states of every tracked instance of `file_name`.
    pub fn instance_states(&self, file_name: &str) -> Vec<(String, u64, ExtensionState)> {
        self.lock()
            .handles
            .get(file_name)
            .map(|handles| {
                handles
                    .iter()
                    .map(|h| (h.instance().to_string(), h.generation(), h.state()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Signal every tracked instance to stop. Returns how many were signalled.
    pub fn abort_all(&self) -> usize {
        let inner = self.lock();
        let mut count = 0;
        for handle in inner.handles.values().flatten() {
            if !handle.is_finished() {
                handle.abort_handle().abort();
                count += 1;
            }
        }
        count
    }

    /// Take every tracked run handle out of the registry.
    pub fn take_handles(&self) -> Vec<RunHandle> {
        self.lock().handles.drain().flat_map(|(_, h)| h).collect()
    }
}

fn non_empty(error: String) -> String {
    if error.trim().is_empty() {
        UNSPECIFIED_ERROR.to_string()
    } else {
        error
    }
}
