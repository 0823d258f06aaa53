//! Menu entries contributed by extensions.

use std::fmt;
use std::sync::Arc;

/// Zero-argument callback run when a menu entry is clicked.
pub type MenuAction = Arc<dyn Fn() + Send + Sync>;

/// One entry in the host's menu.
#[derive(Clone)]
pub struct MenuItem {
    /// Label text (empty for separators).
    pub text: String,
    /// Whether the entry can be clicked.
    pub enabled: bool,
    /// Whether the entry is a separator line.
    pub is_separator: bool,
    /// Callback invoked on click.
    pub action: Option<MenuAction>,
}

impl MenuItem {
    /// Create an enabled entry without an action.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            enabled: true,
            is_separator: false,
            action: None,
        }
    }

    /// Create a separator.
    pub fn separator() -> Self {
        Self {
            text: String::new(),
            enabled: false,
            is_separator: true,
            action: None,
        }
    }

    /// Attach a click callback.
    pub fn with_action(mut self, action: impl Fn() + Send + Sync + 'static) -> Self {
        self.action = Some(Arc::new(action));
        self
    }

    /// Mark the entry as disabled.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Run the callback if the entry is enabled and has one.
    ///
    /// Returns whether a callback ran.
    pub fn invoke(&self) -> bool {
        match &self.action {
            Some(action) if self.enabled && !self.is_separator => {
                action();
                true
            }
            _ => false,
        }
    }
}

impl fmt::Debug for MenuItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MenuItem")
            .field("text", &self.text)
            .field("enabled", &self.enabled)
            .field("is_separator", &self.is_separator)
            .field("action", &self.action.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_invoke_runs_action() {
        let clicks = Arc::new(AtomicUsize::new(0));
        let counter = clicks.clone();
        let item = MenuItem::new("Show Portal").with_action(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(item.invoke());
        assert!(item.clone().invoke());
        assert_eq!(clicks.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_disabled_and_separator_do_not_invoke() {
        let clicks = Arc::new(AtomicUsize::new(0));
        let counter = clicks.clone();
        let item = MenuItem::new("Off")
            .with_action(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .disabled();

        assert!(!item.invoke());
        assert!(!MenuItem::separator().invoke());
        assert!(!MenuItem::new("No action").invoke());
        assert_eq!(clicks.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_debug_hides_closure() {
        let item = MenuItem::new("Open").with_action(|| {});
        let rendered = format!("{item:?}");
        assert!(rendered.contains("\"Open\""));
        assert!(rendered.contains("<fn>"));
    }
}
