//! Diagnostics reporting for the render core.
//!
//! The engine never talks to the process-wide logger directly. Everything it has to
//! say goes through a [`DiagnosticsSink`] handed over at construction, so embedders
//! can route, filter or capture engine messages independently of their logging setup.

use std::rc::Rc;

use log::Level;

/// Receiver for engine diagnostics.
pub trait DiagnosticsSink {
    fn report(&self, level: Level, message: &str);
}

/// Shared sink handle. The engine and its parts hold clones of the same sink.
pub type SharedSink = Rc<dyn DiagnosticsSink>;

/// Severity for critical conditions.
///
/// The `log` facade has no level above `Error`, so critical reports share it.
pub const CRITICAL: Level = Level::Error;

/// Forwards diagnostics to the `log` facade under a fixed target.
#[derive(Debug, Clone)]
pub struct LogSink {
    target: &'static str,
}

impl LogSink {
    pub const DEFAULT_TARGET: &'static str = "prism::engine";

    pub fn new() -> Self {
        Self::with_target(Self::DEFAULT_TARGET)
    }

    pub fn with_target(target: &'static str) -> Self {
        Self { target }
    }

    /// Convenience constructor for the shared form the engine expects.
    pub fn shared() -> SharedSink {
        Rc::new(Self::new())
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticsSink for LogSink {
    fn report(&self, level: Level, message: &str) {
        log::log!(target: self.target, level, "{message}");
    }
}

/// Reports a formatted message to a sink, allocating only for non-static messages.
pub(crate) fn report(sink: &dyn DiagnosticsSink, level: Level, args: std::fmt::Arguments<'_>) {
    match args.as_str() {
        Some(s) => sink.report(level, s),
        None => sink.report(level, &args.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::test_support::RecordingSink;

    #[test]
    fn report_passes_static_messages_through() {
        let sink = RecordingSink::default();
        report(&sink, Level::Info, format_args!("file is open"));
        assert_eq!(sink.messages(), vec![(Level::Info, "file is open".to_string())]);
    }

    #[test]
    fn report_formats_arguments() {
        let sink = RecordingSink::default();
        let path = "/tmp/scene.bin";
        report(&sink, CRITICAL, format_args!("unable to unmap file {path}"));
        assert_eq!(sink.count(CRITICAL), 1);
        assert!(sink.contains("unable to unmap file /tmp/scene.bin"));
    }
}
