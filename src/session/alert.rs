//! User-visible notifications raised by the session.

use tracing::warn;

/// Receives messages the UI should show to the user (e.g. a modal alert).
pub trait AlertSink: Send + Sync {
    fn alert(&self, title: &str, message: &str);
}

/// Default sink: logs the alert.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAlertSink;

impl AlertSink for TracingAlertSink {
    fn alert(&self, title: &str, message: &str) {
        warn!(title, message, "User alert");
    }
}
