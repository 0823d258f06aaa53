//! Per-instance execution state.
//!
//! Provides the lifecycle state machine, cooperative cancellation and the
//! handle the registry keeps for every running extension instance.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::thread::JoinHandle;

/// Handle for cooperative cancellation of an extension instance.
///
/// `AbortHandle` can be cloned and shared across threads, and any clone can
/// trigger the abort which will be visible to all other clones.
///
/// # Example
///
/// ```
/// use hotbed_core::execute::AbortHandle;
///
/// let handle = AbortHandle::new();
/// let handle_clone = handle.clone();
///
/// assert!(!handle.is_aborted());
/// handle_clone.abort();
/// assert!(handle.is_aborted());
/// ```
#[derive(Debug, Clone, Default)]
pub struct AbortHandle {
    aborted: Arc<AtomicBool>,
}

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if abort has been requested.
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Relaxed)
    }

    /// Request abort of execution.
    ///
    /// Nothing interrupts a running hook; the flag is only observed by code
    /// that checks it.
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::Relaxed);
    }
}

/// Lifecycle state of one extension instance.
///
/// ```text
/// Discovered ──► Preparing ──► Ready ──► Running ──► Completed
///      │             │           │          │
///      └─────────────┴───────────┴──────────┴──────► Faulted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExtensionState {
    /// Constructed, not yet started.
    Discovered = 0,
    /// `prepare` is running.
    Preparing = 1,
    /// `prepare` returned successfully.
    Ready = 2,
    /// `execute` is running.
    Running = 3,
    /// `execute` returned successfully.
    Completed = 4,
    /// A hook failed or panicked.
    Faulted = 5,
}

impl ExtensionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Discovered,
            1 => Self::Preparing,
            2 => Self::Ready,
            3 => Self::Running,
            4 => Self::Completed,
            _ => Self::Faulted,
        }
    }

    /// Whether the instance will make no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Faulted)
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: Self) -> bool {
        use ExtensionState::*;
        matches!(
            (self, next),
            (Discovered, Preparing)
                | (Preparing, Ready)
                | (Ready, Running)
                | (Running, Completed)
                | (Discovered | Preparing | Ready | Running, Faulted)
        )
    }
}

impl fmt::Display for ExtensionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Discovered => "discovered",
            Self::Preparing => "preparing",
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Faulted => "faulted",
        };
        f.write_str(s)
    }
}

/// Shared, lock-free cell holding an [`ExtensionState`].
#[derive(Debug, Clone)]
pub struct StateCell {
    state: Arc<AtomicU8>,
}

impl StateCell {
    pub fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(ExtensionState::Discovered as u8)),
        }
    }

    pub fn get(&self) -> ExtensionState {
        ExtensionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Move to `next` if the transition is legal. Returns false otherwise.
    pub fn advance(&self, next: ExtensionState) -> bool {
        let current = self.get();
        if !current.can_transition_to(next) {
            tracing::debug!("Ignoring illegal transition {} -> {}", current, next);
            return false;
        }
        self.state
            .compare_exchange(
                current as u8,
                next as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry-side handle to one running extension instance.
pub struct RunHandle {
    instance: String,
    generation: u64,
    state: StateCell,
    abort: AbortHandle,
    thread: Option<JoinHandle<()>>,
}

impl RunHandle {
    pub(crate) fn new(
        instance: String,
        generation: u64,
        state: StateCell,
        abort: AbortHandle,
        thread: JoinHandle<()>,
    ) -> Self {
        Self {
            instance,
            generation,
            state,
            abort,
            thread: Some(thread),
        }
    }

    /// Instance name as reported by the extension.
    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Record generation the instance was loaded under.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> ExtensionState {
        self.state.get()
    }

    pub fn abort_handle(&self) -> &AbortHandle {
        &self.abort
    }

    /// Whether the instance thread has exited.
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Wait for the instance thread to exit.
    ///
    /// Blocks forever for extensions whose `execute` never returns.
    pub fn join(mut self) -> ExtensionState {
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            tracing::error!(
                "Extension thread for {} panicked outside its hooks",
                self.instance
            );
        }
        self.state.get()
    }
}

impl fmt::Debug for RunHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunHandle")
            .field("instance", &self.instance)
            .field("generation", &self.generation)
            .field("state", &self.state())
            .finish()
    }
}
