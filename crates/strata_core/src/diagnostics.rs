//! Diagnostic reporting.
//!
//! The device never logs or aborts on its own: every warning and error is
//! turned into a [`Status`] and handed to the [`StatusSink`] it was
//! constructed with.

use std::fmt;

use parking_lot::Mutex;
use serde::Serialize;

use crate::handle::{ArrayHandle, ObjectHandle};
use crate::types::ObjectKind;

/// Diagnostic severity, ordered from least to most severe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Severity {
    Debug,
    Info,
    PerformanceWarning,
    Warning,
    Error,
    FatalError,
}

impl Severity {
    fn log_level(self) -> log::Level {
        match self {
            Severity::Debug => log::Level::Debug,
            Severity::Info => log::Level::Info,
            Severity::PerformanceWarning | Severity::Warning => log::Level::Warn,
            Severity::Error | Severity::FatalError => log::Level::Error,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum StatusCode {
    NoError,
    InvalidArgument,
    InvalidOperation,
    UnknownError,
}

/// What a diagnostic is about.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum StatusSource {
    Device,
    Object {
        kind: ObjectKind,
        handle: ObjectHandle,
        name: String,
    },
    Array(ArrayHandle),
}

impl fmt::Display for StatusSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusSource::Device => f.write_str("device"),
            StatusSource::Object { kind, name, .. } => write!(f, "{} '{}'", kind, name),
            StatusSource::Array(handle) => write!(f, "array {:?}", handle),
        }
    }
}

/// A single diagnostic.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Status {
    pub severity: Severity,
    pub code: StatusCode,
    pub source: StatusSource,
    pub message: String,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}: {}", self.severity, self.source, self.message)
    }
}

/// Receiver for device diagnostics.
///
/// Sinks may be called from render threads, so they must be `Send + Sync`.
pub trait StatusSink: Send + Sync {
    fn report(&self, status: &Status);
}

impl<F> StatusSink for F
where
    F: Fn(&Status) + Send + Sync,
{
    fn report(&self, status: &Status) {
        self(status)
    }
}

/// Forwards diagnostics to the `log` facade.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl StatusSink for LogSink {
    fn report(&self, status: &Status) {
        log::log!(status.severity.log_level(), "{}: {}", status.source, status.message);
    }
}

/// Keeps every diagnostic in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    statuses: Mutex<Vec<Status>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything reported so far.
    pub fn statuses(&self) -> Vec<Status> {
        self.statuses.lock().clone()
    }

    /// Drain everything reported so far.
    pub fn take(&self) -> Vec<Status> {
        std::mem::take(&mut *self.statuses.lock())
    }

    /// Number of diagnostics at exactly `severity`.
    pub fn count(&self, severity: Severity) -> usize {
        self.statuses
            .lock()
            .iter()
            .filter(|s| s.severity == severity)
            .count()
    }

    /// Messages of the diagnostics at or above `severity`.
    pub fn messages_at_least(&self, severity: Severity) -> Vec<String> {
        self.statuses
            .lock()
            .iter()
            .filter(|s| s.severity >= severity)
            .map(|s| s.message.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.statuses.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.lock().is_empty()
    }
}

impl StatusSink for CollectingSink {
    fn report(&self, status: &Status) {
        self.statuses.lock().push(status.clone());
    }
}
