//! Lifecycle indicator shown while a session is running.
//!
//! Hosts with a status area (tray, notification shade) implement
//! [`StatusIndicator`]; the default [`LogIndicator`] only logs.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

/// Persistent low-priority status shown while a session is active.
pub trait StatusIndicator: Send + Sync {
    /// Shows (or updates) the indicator.
    fn show(&self, message: &str);

    /// Removes the indicator.
    fn hide(&self);
}

/// Indicator that reports through `tracing`.
#[derive(Debug)]
pub struct LogIndicator {
    name: String,
    visible: AtomicBool,
}

impl LogIndicator {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visible: AtomicBool::new(false),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::Relaxed)
    }
}

impl StatusIndicator for LogIndicator {
    fn show(&self, message: &str) {
        self.visible.store(true, Ordering::Relaxed);
        debug!(indicator = %self.name, "{message}");
    }

    fn hide(&self) {
        if self.visible.swap(false, Ordering::Relaxed) {
            debug!(indicator = %self.name, "status cleared");
        }
    }
}
