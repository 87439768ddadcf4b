use crate::record::LogRecord;
use async_trait::async_trait;
use std::error::Error;

/// Asynchronous destination for [`LogRecord`]s drained from the queue.
///
/// Implementations are responsible for transporting records to a concrete
/// backend (a file, a database, stdout, etc). The worker calls `send` from
/// its own background task, one record at a time, and never from an
/// application thread.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Send a single log record to the underlying backend.
    ///
    /// **Parameters**
    /// - `record`: fully-populated [`LogRecord`], with the queuing delay
    ///   already injected under
    ///   [`SEND_DELAY_KEY`](crate::record::SEND_DELAY_KEY).
    ///
    /// **Returns**
    /// - `Ok(())` if the record was accepted by the backend.
    /// - `Err(..)` if the backend failed. The worker drops the record,
    ///   reports the error through the configured hook, and keeps
    ///   draining; failures are never retried and never requeued.
    ///
    /// Called strictly sequentially from the worker task, so a slow sink
    /// slows draining but never the producers.
    async fn send(&self, record: &LogRecord) -> Result<(), Box<dyn Error + Send + Sync>>;
}
