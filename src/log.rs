use crate::clock::{Clock, ClockError, SystemClock};
use crate::record::{LogLevel, LogRecord, SEND_DELAY_KEY};
use crate::sink::LogSink;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

/// Out-of-band receiver for sink failures observed by the worker.
pub type ErrorHook = Arc<dyn Fn(&(dyn Error + Send + Sync)) + Send + Sync>;

/// Configuration for [`AsyncLog`].
///
/// **Fields**
/// - `poll_interval`: how long the worker waits on the stop signal between
///   drain cycles. Bounds both shutdown latency and the staleness of any
///   buffered record when the sink keeps up.
/// - `error_hook`: called from the worker task whenever the sink rejects a
///   record. When unset, failures are reported via `tracing::warn!`.
#[derive(Clone)]
pub struct AsyncLogConfig {
    pub poll_interval: Duration,
    pub error_hook: Option<ErrorHook>,
}

impl Default for AsyncLogConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(5),
            error_hook: None,
        }
    }
}

impl fmt::Debug for AsyncLogConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncLogConfig")
            .field("poll_interval", &self.poll_interval)
            .field("error_hook", &self.error_hook.is_some())
            .finish()
    }
}

/// Asynchronous decorator around a [`LogSink`].
///
/// Caller threads enqueue [`LogRecord`]s through the `log*` methods; a
/// single background worker drains the queue and forwards each record to
/// the sink, so sink latency never shows up on the caller. The worker
/// handle is owned by this struct and joined by [`AsyncLog::stop_and_wait`];
/// there is no ambient global state.
///
/// Ordering: records from one caller thread reach the sink in the order
/// they were logged. No ordering is guaranteed across distinct caller
/// threads beyond what the underlying mpsc channel happens to provide.
pub struct AsyncLog {
    sender: mpsc::UnboundedSender<LogRecord>,
    clock: RwLock<Arc<dyn Clock>>,
    stop_tx: watch::Sender<bool>,
    drain_all: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    /// Records accepted into the queue.
    pub enqueued_records: Arc<AtomicU64>,
    /// Records successfully forwarded to the sink.
    pub dispatched_records: Arc<AtomicU64>,
    /// Records dropped because the sink rejected them.
    pub failed_records: Arc<AtomicU64>,
}

impl AsyncLog {
    /// Create a decorator around `sink` with the default configuration
    /// and start its background worker immediately.
    ///
    /// Must be called from within a Tokio runtime, which will host the
    /// worker task.
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self::with_config(sink, AsyncLogConfig::default())
    }

    /// As [`AsyncLog::new`], with explicit configuration. A minimal
    /// threshold is enforced on `poll_interval` to avoid a degenerate
    /// busy-spin.
    pub fn with_config(sink: Arc<dyn LogSink>, config: AsyncLogConfig) -> Self {
        let poll_interval = config.poll_interval.max(Duration::from_millis(1));

        let (sender, receiver) = mpsc::unbounded_channel::<LogRecord>();
        let (stop_tx, stop_rx) = watch::channel(false);
        let drain_all = Arc::new(AtomicBool::new(false));

        let enqueued_records = Arc::new(AtomicU64::new(0));
        let dispatched_records = Arc::new(AtomicU64::new(0));
        let failed_records = Arc::new(AtomicU64::new(0));

        let worker = Worker {
            sink,
            receiver,
            stop_rx,
            drain_all: Arc::clone(&drain_all),
            poll_interval,
            error_hook: config.error_hook,
            dispatched: Arc::clone(&dispatched_records),
            failed: Arc::clone(&failed_records),
        };
        let handle = tokio::spawn(worker.run());

        Self {
            sender,
            clock: RwLock::new(Arc::new(SystemClock)),
            stop_tx,
            drain_all,
            worker: Mutex::new(Some(handle)),
            enqueued_records,
            dispatched_records,
            failed_records,
        }
    }

    /// Log an event stamped with the configured clock's current time.
    pub fn log(&self, level: LogLevel, template: impl Into<String>, args: Vec<serde_json::Value>) {
        self.log_at(self.now(), level, template, args);
    }

    /// Log an event with a caller-supplied timestamp.
    pub fn log_at(
        &self,
        timestamp: DateTime<Utc>,
        level: LogLevel,
        template: impl Into<String>,
        args: Vec<serde_json::Value>,
    ) {
        self.enqueue(LogRecord::new(timestamp, level, BTreeMap::new(), template, args));
    }

    /// Log an event carrying structured data, stamped with the configured
    /// clock's current time.
    pub fn log_with(
        &self,
        level: LogLevel,
        data: BTreeMap<String, serde_json::Value>,
        template: impl Into<String>,
        args: Vec<serde_json::Value>,
    ) {
        self.log_at_with(self.now(), level, data, template, args);
    }

    /// Log an event with both a caller-supplied timestamp and structured
    /// data.
    pub fn log_at_with(
        &self,
        timestamp: DateTime<Utc>,
        level: LogLevel,
        data: BTreeMap<String, serde_json::Value>,
        template: impl Into<String>,
        args: Vec<serde_json::Value>,
    ) {
        self.enqueue(LogRecord::new(timestamp, level, data, template, args));
    }

    /// Replace the clock used to stamp new records.
    ///
    /// **Returns**
    /// - `Ok(())` once the new clock is active for all subsequent records.
    /// - `Err(ClockError::MissingProvider)` if `clock` is `None`; the
    ///   previous clock stays active.
    pub fn set_clock(&self, clock: Option<Arc<dyn Clock>>) -> Result<(), ClockError> {
        let clock = clock.ok_or(ClockError::MissingProvider)?;
        *self.clock.write().expect("clock lock poisoned") = clock;
        Ok(())
    }

    /// Ask the worker to stop without draining. Idempotent and
    /// non-blocking; records still in the queue when the worker observes
    /// the signal past its final sweep may never reach the sink.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    /// Stop the worker and wait until it has terminated, draining the
    /// queue completely first.
    ///
    /// Every record enqueued strictly before this call is forwarded to
    /// the sink exactly once, in FIFO order per producer thread, before
    /// this returns. Safe to call concurrently; every caller returns only
    /// after the worker has terminated.
    pub async fn stop_and_wait(&self) {
        // The flag must be visible before the worker observes the signal.
        self.drain_all.store(true, Ordering::SeqCst);
        self.stop_tx.send_replace(true);

        let mut slot = self.worker.lock().await;
        if let Some(handle) = slot.take() {
            // Join itself cannot fail; a panicking sink surfaces as a
            // JoinError we deliberately swallow.
            let _ = handle.await;
        }
    }

    /// Whether the background worker has finished executing.
    pub fn is_terminated(&self) -> bool {
        match self.worker.try_lock() {
            Ok(slot) => slot.as_ref().map_or(true, |handle| handle.is_finished()),
            // Someone is mid-join in stop_and_wait.
            Err(_) => false,
        }
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.read().expect("clock lock poisoned").now()
    }

    fn enqueue(&self, record: LogRecord) {
        // The channel only closes once the worker has terminated; at that
        // point logging degrades to a silent no-op.
        if self.sender.send(record).is_ok() {
            self.enqueued_records.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// State owned by the background task: the receive side of the queue plus
/// the stop/drain signals.
struct Worker {
    sink: Arc<dyn LogSink>,
    receiver: mpsc::UnboundedReceiver<LogRecord>,
    stop_rx: watch::Receiver<bool>,
    drain_all: Arc<AtomicBool>,
    poll_interval: Duration,
    error_hook: Option<ErrorHook>,
    dispatched: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
}

impl Worker {
    /// Poll loop: wait on the stop signal with a bounded timeout, drain
    /// everything currently buffered on each wake, and on stop perform a
    /// final sweep (plus a drain-to-empty pass when requested).
    async fn run(mut self) {
        loop {
            let stop = tokio::select! {
                // A closed watch channel means the facade was dropped
                // without an explicit stop; treat it the same way.
                _ = self.stop_rx.changed() => true,
                _ = sleep(self.poll_interval) => false,
            };

            let disconnected = self.drain_available().await;

            if stop {
                if self.drain_all.load(Ordering::SeqCst) {
                    // Picks up records enqueued while the final sweep
                    // above was running.
                    self.drain_available().await;
                }
                break;
            }
            if disconnected {
                break;
            }
        }
    }

    /// Dequeue and forward records until the queue is observed empty.
    /// Returns `true` if all senders are gone.
    async fn drain_available(&mut self) -> bool {
        loop {
            match self.receiver.try_recv() {
                Ok(record) => self.dispatch(record).await,
                Err(mpsc::error::TryRecvError::Empty) => return false,
                Err(mpsc::error::TryRecvError::Disconnected) => return true,
            }
        }
    }

    /// Forward one record to the sink, injecting its queuing delay.
    /// A sink failure drops the record and is reported out-of-band; it
    /// never terminates the worker.
    async fn dispatch(&mut self, mut record: LogRecord) {
        let delay = record.queued_secs();
        record
            .data
            .insert(SEND_DELAY_KEY.to_string(), serde_json::Value::from(delay));

        match self.sink.send(&record).await {
            Ok(()) => {
                self.dispatched.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                match &self.error_hook {
                    Some(hook) => hook(err.as_ref()),
                    None => tracing::warn!(error = %err, "log sink rejected record, dropping it"),
                }
            }
        }
    }
}
