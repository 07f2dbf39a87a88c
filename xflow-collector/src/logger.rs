//! Logging abstraction.
//!
//! The engine logs through the `Logger` trait so tests can capture output
//! deterministically. In production `TracingLogger` forwards every message to
//! `tracing`, whose subscriber is installed once by `init_tracing`.

use std::sync::{Arc, RwLock};

use tracing::Level;

/// Verbosity level for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    /// Problems that do not stop the run.
    Warn,
    /// Normal output (always shown).
    Normal,
    /// Verbose output (-d).
    Verbose,
    /// Debug output (-dd).
    Debug,
}

impl Verbosity {
    /// Create verbosity from the `-d` flag count.
    pub fn from_count(count: u8) -> Self {
        match count {
            0 => Verbosity::Normal,
            1 => Verbosity::Verbose,
            _ => Verbosity::Debug,
        }
    }

    /// The `tracing` level a message at this verbosity is emitted at.
    pub fn level(self) -> Level {
        match self {
            Verbosity::Warn => Level::WARN,
            Verbosity::Normal => Level::INFO,
            Verbosity::Verbose => Level::DEBUG,
            Verbosity::Debug => Level::TRACE,
        }
    }
}

/// Trait for logging output.
pub trait Logger: Send + Sync {
    /// Log a message at the given verbosity level.
    fn log(&self, level: Verbosity, message: &str);

    fn warn(&self, message: &str) {
        self.log(Verbosity::Warn, message);
    }

    /// Log at normal level (always visible).
    fn info(&self, message: &str) {
        self.log(Verbosity::Normal, message);
    }

    /// Log at verbose level (requires -d).
    fn verbose(&self, message: &str) {
        self.log(Verbosity::Verbose, message);
    }

    /// Log at debug level (requires -dd).
    fn debug(&self, message: &str) {
        self.log(Verbosity::Debug, message);
    }
}

/// Install the global `tracing` subscriber writing to stderr.
///
/// Messages above `verbosity` are filtered by the subscriber, not by the
/// `Logger`. Debug runs also print source locations.
pub fn init_tracing(
    verbosity: Verbosity,
) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let debug = verbosity >= Verbosity::Verbose;
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(verbosity.level())
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(debug)
        .with_line_number(debug)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
}

/// Logger that forwards to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl TracingLogger {
    pub fn new() -> Self {
        Self
    }
}

impl Logger for TracingLogger {
    fn log(&self, level: Verbosity, message: &str) {
        match level {
            Verbosity::Warn => tracing::warn!("{}", message),
            Verbosity::Normal => tracing::info!("{}", message),
            Verbosity::Verbose => tracing::debug!("{}", message),
            Verbosity::Debug => tracing::trace!("{}", message),
        }
    }
}

/// Mock logger for testing that captures all messages.
#[derive(Debug, Clone)]
pub struct MockLogger {
    messages: Arc<RwLock<Vec<LogEntry>>>,
}

/// A captured log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: Verbosity,
    pub message: String,
}

impl Default for MockLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLogger {
    pub fn new() -> Self {
        Self {
            messages: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Get all captured log entries.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.messages.read().unwrap().clone()
    }

    /// Get all captured messages (just the text).
    pub fn messages(&self) -> Vec<String> {
        self.entries().into_iter().map(|e| e.message).collect()
    }

    /// Get messages at a specific level.
    pub fn messages_at_level(&self, level: Verbosity) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|e| e.level == level)
            .map(|e| e.message)
            .collect()
    }

    /// Check if any message contains the given substring.
    pub fn contains(&self, substring: &str) -> bool {
        self.messages().iter().any(|m| m.contains(substring))
    }

    pub fn count(&self) -> usize {
        self.messages.read().unwrap().len()
    }
}

impl Logger for MockLogger {
    fn log(&self, level: Verbosity, message: &str) {
        // Capture every level so tests can check what would be logged.
        self.messages.write().unwrap().push(LogEntry {
            level,
            message: message.to_string(),
        });
    }
}

/// A no-op logger that discards all messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLogger;

impl Logger for NullLogger {
    fn log(&self, _level: Verbosity, _message: &str) {}
}
