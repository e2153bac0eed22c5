use std::borrow::Cow;

use anyhow::{Error, Result};
use parking_lot::Mutex;

/// Reports non-fatal errors to an observability backend.
///
/// Security decisions never fail outward; when one is resolved as a denial
/// because the input was malformed, the cause is handed to a reporter so the
/// host can still surface it.
pub trait ErrorReporter: Send + Sync {
    /// Capture the provided error for later inspection.
    fn capture(&self, error: &Error) -> Result<()>;

    /// Convenience helper to capture a simple message.
    fn capture_message(&self, message: impl Into<Cow<'static, str>>) -> Result<()>
    where
        Self: Sized,
    {
        let message: Cow<'static, str> = message.into();
        self.capture(&Error::msg(message))
    }
}

/// Error reporting implementation that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopErrorReporter;

impl ErrorReporter for NoopErrorReporter {
    fn capture(&self, _error: &Error) -> Result<()> {
        Ok(())
    }
}

/// Keeps rendered errors in memory. Used by tests and by hosts that show a
/// "blocked requests" list.
#[derive(Debug, Default)]
pub struct MemoryErrorReporter {
    messages: Mutex<Vec<String>>,
}

impl MemoryErrorReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every captured error, oldest first.
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

impl ErrorReporter for MemoryErrorReporter {
    fn capture(&self, error: &Error) -> Result<()> {
        self.messages.lock().push(format!("{error:#}"));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_reporter_drops_errors() {
        let reporter = NoopErrorReporter;
        let error = Error::msg("test");
        assert!(reporter.capture(&error).is_ok());
        assert!(reporter.capture_message("message").is_ok());
    }

    #[test]
    fn memory_reporter_keeps_context_chain() {
        let reporter = MemoryErrorReporter::new();
        let error = Error::msg("relative URL without a base").context("malformed request URL");
        reporter.capture(&error).unwrap();
        reporter.capture_message("second").unwrap();

        let messages = reporter.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(
            messages[0],
            "malformed request URL: relative URL without a base"
        );
        assert_eq!(messages[1], "second");
    }
}
