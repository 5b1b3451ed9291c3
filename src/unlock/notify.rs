//! Out-of-band "gift ready" notifications.
//!
//! Debouncing lives in the engine (a persisted flag), not here: a notifier
//! only answers whether it may notify and delivers what it is given.

use log::info;

pub const NOTIFY_TITLE: &str = "Amiibo Finder";
pub const NOTIFY_BODY: &str = "🎁 Your gift is ready! Unlock a new Amiibo.";

pub trait Notifier: Send + Sync {
    /// Platform permission check.
    fn permission_granted(&self) -> bool;
    fn notify(&self, title: &str, body: &str);
}

/// Writes notifications to the log under the `notify` target.
#[derive(Debug, Clone, Copy)]
pub struct LogNotifier {
    enabled: bool,
}

impl LogNotifier {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl Default for LogNotifier {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Notifier for LogNotifier {
    fn permission_granted(&self) -> bool {
        self.enabled
    }

    fn notify(&self, title: &str, body: &str) {
        info!(target: "notify", "{}: {}", title, body);
    }
}
