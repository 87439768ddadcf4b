use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

/// Reserved key injected into [`LogRecord::data`] when a record is
/// dispatched. Holds the elapsed time between enqueue and dispatch, in
/// seconds, as a JSON number. Caller-supplied data under this key is
/// overwritten at dispatch time.
pub const SEND_DELAY_KEY: &str = "send_delay";

/// Severity of a log event, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        };
        f.write_str(name)
    }
}

/// One buffered logging event plus bookkeeping.
///
/// Records are constructed by the [`AsyncLog`](crate::log::AsyncLog)
/// facade on the caller's thread, travel through the internal queue, and
/// are handed to the [`LogSink`](crate::sink::LogSink) exactly once by the
/// background worker. A record is immutable after construction except for
/// the queuing-delay entry the worker injects under [`SEND_DELAY_KEY`]
/// just before forwarding.
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    /// Event timestamp: caller-supplied, or the configured clock's `now()`
    /// at construction.
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    /// Structured key/value data. Never absent; defaults to empty.
    pub data: BTreeMap<String, serde_json::Value>,
    /// Message template. Interpolation against `args` is the sink's
    /// concern, not ours.
    pub template: String,
    /// Positional arguments for the template, in caller order.
    pub args: Vec<serde_json::Value>,
    /// Monotonic enqueue stamp, set exactly once at construction. Only
    /// used to compute the queuing delay; never exposed to sinks.
    #[serde(skip_serializing)]
    pub(crate) inserted_at: Instant,
}

impl LogRecord {
    /// Build a record stamped with the monotonic insertion time.
    pub fn new(
        timestamp: DateTime<Utc>,
        level: LogLevel,
        data: BTreeMap<String, serde_json::Value>,
        template: impl Into<String>,
        args: Vec<serde_json::Value>,
    ) -> Self {
        LogRecord {
            timestamp,
            level,
            data,
            template: template.into(),
            args,
            inserted_at: Instant::now(),
        }
    }

    /// Seconds this record has spent in the queue so far. Monotonic
    /// clock, so the result is never negative.
    pub(crate) fn queued_secs(&self) -> f64 {
        self.inserted_at.elapsed().as_secs_f64()
    }
}
