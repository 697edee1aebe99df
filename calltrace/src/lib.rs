//! Call-trace parse engine.
//!
//! Consumes framed binary event records produced by an instrumented
//! process's runtime, validates and decodes each one, and dispatches it to a
//! caller-supplied [`ParseEventHandler`]. Along the way the engine maintains
//! per-process maps of loaded modules so downstream analyzers can correlate
//! code addresses with the images that produced them.
//!
//! The transport that produces records (kernel tracing session, ring
//! buffers) is out of scope; see [`replay`] for the minimal file-based
//! transport the `calltrace` binary uses.

use calltrace_common::{ClassId, EventKind, CALL_TRACE_CLASS_ID};
use chrono::{DateTime, Utc};

pub mod classify;
pub mod cli;
pub mod engine;
pub mod errors;
pub mod handler;
pub mod module_space;
pub mod module_tracker;
pub mod record_reader;
pub mod replay;
pub mod summary;

pub use engine::ParseEngine;
pub use errors::ParseError;
pub use handler::ParseEventHandler;
pub use module_space::ModuleInformation;
pub use summary::EventSummary;

/// One framed event record as delivered by the transport.
///
/// The payload is borrowed for the duration of a single dispatch; the
/// engine never retains it.
#[derive(Clone, Copy, Debug)]
pub struct TraceRecord<'a> {
    pub class_id: ClassId,
    pub kind: u8,
    pub process_id: u32,
    pub thread_id: u32,
    /// Platform file-time: 100 ns ticks since 1601-01-01 UTC.
    pub timestamp: u64,
    pub payload: &'a [u8],
}

impl<'a> TraceRecord<'a> {
    /// A record of our own event class.
    pub fn new(
        kind: EventKind,
        process_id: u32,
        thread_id: u32,
        timestamp: u64,
        payload: &'a [u8],
    ) -> Self {
        Self {
            class_id: CALL_TRACE_CLASS_ID,
            kind: kind.wire_code(),
            process_id,
            thread_id,
            timestamp,
            payload,
        }
    }
}

/// Converts a platform file-time to a UTC timestamp.
pub fn filetime_to_utc(filetime: u64) -> DateTime<Utc> {
    // Seconds between 1601-01-01 and the Unix epoch.
    const FILETIME_UNIX_EPOCH_DELTA_SECS: i64 = 11_644_473_600;
    const TICKS_PER_SEC: u64 = 10_000_000;

    let secs = (filetime / TICKS_PER_SEC) as i64 - FILETIME_UNIX_EPOCH_DELTA_SECS;
    let nanos = ((filetime % TICKS_PER_SEC) * 100) as u32;
    DateTime::from_timestamp(secs, nanos).unwrap_or(DateTime::UNIX_EPOCH)
}
