//! User-facing output lines.
//!
//! Everything the dispatcher prints (help, version, error lines) goes through
//! a [`LogSink`]. Diagnostics for operators go through `tracing` instead.

use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;

/// Receives one rendered message at a time.
pub trait LogSink: Send + Sync {
    fn emit(&self, message: &str);
}

impl<F> LogSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn emit(&self, message: &str) {
        self(message)
    }
}

/// Writes each message as a line on stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

impl LogSink for StdoutSink {
    fn emit(&self, message: &str) {
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{message}");
    }
}

/// Writes each message as a line on stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrSink;

impl LogSink for StderrSink {
    fn emit(&self, message: &str) {
        let mut err = std::io::stderr().lock();
        let _ = writeln!(err, "{message}");
    }
}

/// Collects messages in memory. Clones share the buffer.
#[derive(Debug, Clone, Default)]
pub struct BufferSink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// All messages joined with newlines.
    pub fn contents(&self) -> String {
        self.lines.lock().join("\n")
    }

    pub fn clear(&self) {
        self.lines.lock().clear();
    }
}

impl LogSink for BufferSink {
    fn emit(&self, message: &str) {
        self.lines.lock().push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_clones_share_lines() {
        let sink = BufferSink::new();
        let clone = sink.clone();
        clone.emit("first");
        sink.emit("second");

        assert_eq!(sink.lines(), vec!["first", "second"]);
        assert_eq!(clone.contents(), "first\nsecond");

        sink.clear();
        assert!(clone.lines().is_empty());
    }

    #[test]
    fn test_closure_is_a_sink() {
        let seen = Arc::new(Mutex::new(String::new()));
        let captured = Arc::clone(&seen);
        let sink = move |message: &str| captured.lock().push_str(message);

        sink.emit("hello");
        assert_eq!(*seen.lock(), "hello");
    }
}
