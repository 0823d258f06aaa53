//! Source watcher for the extensions directory.
//!
//! Watches `*.rs` files (non-recursively), collapses bursts of events into
//! one notification per file and only reports a file when its modification
//! time moved forward.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use notify_debouncer_mini::notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{DebounceEventResult, Debouncer, new_debouncer};
use rustc_hash::FxHashMap;
use tokio::sync::mpsc;

use crate::error::{Error, Result};

/// Settle delay applied when none is configured.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Extension of watched files.
pub const SOURCE_EXTENSION: &str = "rs";

/// One extension source file.
#[derive(Debug, Clone)]
pub struct ExtensionSource {
    /// Full path.
    pub path: PathBuf,

    /// File contents at the time of the change.
    pub text: String,

    /// Modification time that triggered this read.
    pub modified: SystemTime,
}

impl ExtensionSource {
    /// File name, used as the registry key.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// File name without extension.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// A debounced change to one source file.
#[derive(Debug, Clone)]
pub struct SourceChange {
    pub source: ExtensionSource,
    pub detected_at: Instant,
}

/// Last seen modification time per path.
#[derive(Debug, Default)]
pub struct ChangeTracker {
    last_modified: FxHashMap<PathBuf, SystemTime>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if `modified` is strictly newer than what was recorded for `path`.
    pub fn is_newer(&self, path: &Path, modified: SystemTime) -> bool {
        self.last_modified
            .get(path)
            .is_none_or(|&last| modified > last)
    }

    pub fn record(&mut self, path: &Path, modified: SystemTime) {
        self.last_modified.insert(path.to_path_buf(), modified);
    }

    pub fn len(&self) -> usize {
        self.last_modified.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_modified.is_empty()
    }
}

/// Watches one directory for extension source changes.
pub struct SourceWatcher {
    dir: PathBuf,
    extension: String,
    tracker: ChangeTracker,
    /// Debouncer handle (kept alive to maintain watcher).
    _debouncer: Debouncer<RecommendedWatcher>,
    rx: mpsc::UnboundedReceiver<PathBuf>,
}

impl SourceWatcher {
    /// Start watching `dir` for files ending in `.{extension}`.
    ///
    /// Events for one file arriving within `settle_delay` of each other are
    /// reported once, after the burst has settled.
    pub fn new(dir: impl AsRef<Path>, extension: &str, settle_delay: Duration) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let extension = extension.trim_start_matches('.').to_string();
        let (tx, rx) = mpsc::unbounded_channel();

        let filter = extension.clone();
        let mut debouncer = new_debouncer(settle_delay, move |result: DebounceEventResult| {
            match result {
                Ok(events) => {
                    for event in events {
                        if !matches_extension(&event.path, &filter) {
                            continue;
                        }
                        let _ = tx.send(event.path);
                    }
                }
                Err(e) => tracing::warn!("Watch error: {}", e),
            }
        })
        .map_err(|e| Error::Watch {
            path: dir.clone(),
            message: e.to_string(),
        })?;

        debouncer
            .watcher()
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| Error::Watch {
                path: dir.clone(),
                message: e.to_string(),
            })?;

        tracing::debug!("Watching {} for *.{} files", dir.display(), extension);

        Ok(Self {
            dir,
            extension,
            tracker: ChangeTracker::new(),
            _debouncer: debouncer,
            rx,
        })
    }

    /// Watch `dir` for `*.rs` files with the default settle delay.
    pub fn with_defaults(dir: impl AsRef<Path>) -> Result<Self> {
        Self::new(dir, SOURCE_EXTENSION, DEFAULT_SETTLE_DELAY)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Read every matching file already present, in name order.
    ///
    /// Their modification times are recorded, so later events only report
    /// actual edits.
    pub fn scan_existing(&mut self) -> Result<Vec<ExtensionSource>> {
        let mut paths: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && matches_extension(path, &self.extension))
            .collect();
        paths.sort();

        let mut sources = Vec::with_capacity(paths.len());
        for path in paths {
            match read_source(&path) {
                Ok(source) => {
                    self.tracker.record(&path, source.modified);
                    sources.push(source);
                }
                Err(e) => tracing::warn!("Skipping {}: {}", path.display(), e),
            }
        }

        Ok(sources)
    }

    /// Wait for the next change that passes the modification-time gate.
    ///
    /// Returns `None` once the watcher has shut down.
    pub async fn next_change(&mut self) -> Option<SourceChange> {
        loop {
            let path = self.rx.recv().await?;
            if let Some(source) = self.observe(&path).await {
                return Some(SourceChange {
                    source,
                    detected_at: Instant::now(),
                });
            }
        }
    }

    async fn observe(&mut self, path: &Path) -> Option<ExtensionSource> {
        let modified = match tokio::fs::metadata(path).await.and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("{} removed; keeping its record", path.display());
                return None;
            }
            Err(e) => {
                tracing::warn!("Failed to stat {}: {}", path.display(), e);
                return None;
            }
        };

        if !self.tracker.is_newer(path, modified) {
            tracing::trace!("{} unchanged", path.display());
            return None;
        }

        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) => {
                // Not recorded: the next event retries.
                tracing::warn!("Failed to read {}: {}", path.display(), e);
                return None;
            }
        };

        self.tracker.record(path, modified);
        Some(ExtensionSource {
            path: path.to_path_buf(),
            text,
            modified,
        })
    }
}

/// Read a source file synchronously.
pub fn read_source(path: &Path) -> io::Result<ExtensionSource> {
    let modified = fs::metadata(path)?.modified()?;
    let text = fs::read_to_string(path)?;
    Ok(ExtensionSource {
        path: path.to_path_buf(),
        text,
        modified,
    })
}

fn matches_extension(path: &Path, extension: &str) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_none_or(|n| n.starts_with('.'));
    !hidden && path.extension().is_some_and(|ext| ext == extension)
}
