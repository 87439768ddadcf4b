//! Asynchronous decorator for a logging sink: buffers records from any
//! number of caller threads in an unbounded queue and forwards them to a
//! pluggable [`sink::LogSink`] from one background worker, so sink
//! latency never shows up on the caller.

pub mod clock;
pub mod log;
pub mod noop_sink;
pub mod record;
pub mod sink;
