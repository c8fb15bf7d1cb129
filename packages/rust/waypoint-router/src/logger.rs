//! Logging utilities for waypoint-router.
//!
//! Every module owns a static, prefixed logger that forwards to `tracing`.
//! Level filtering is left to whatever subscriber the host installs.
//!
//! # Example
//! ```
//! use waypoint_router::logger::Logger;
//!
//! static LOGGER: Logger = Logger::const_new("my_module");
//!
//! LOGGER.info("Starting module");
//! ```

/// Logger with a consistent `component` field on every event
#[derive(Clone, Copy, Debug)]
pub struct Logger {
    prefix: &'static str,
}

impl Logger {
    /// Create a new logger with the given prefix that can be used in const contexts
    pub const fn const_new(prefix: &'static str) -> Self {
        Self { prefix }
    }

    /// The component name attached to events
    pub fn prefix(&self) -> &'static str {
        self.prefix
    }

    fn format_message(&self, message: &str) -> String {
        format!("[{}] {}", self.prefix, message)
    }

    /// Log a debug message
    pub fn debug(&self, message: impl AsRef<str>) {
        tracing::debug!(component = self.prefix, "{}", self.format_message(message.as_ref()));
    }

    /// Log an info message
    pub fn info(&self, message: impl AsRef<str>) {
        tracing::info!(component = self.prefix, "{}", self.format_message(message.as_ref()));
    }

    /// Log a warning message
    pub fn warn(&self, message: impl AsRef<str>) {
        tracing::warn!(component = self.prefix, "{}", self.format_message(message.as_ref()));
    }

    /// Log an error message
    pub fn error(&self, message: impl AsRef<str>) {
        tracing::error!(component = self.prefix, "{}", self.format_message(message.as_ref()));
    }
}
