//! Minimal file-based transport for captured traces.
//!
//! A capture file is a magic/version header followed by length-framed
//! records. This exists so the `calltrace` binary can drive the engine end
//! to end; the live transport that originally produced the records is not
//! this crate's concern.

use std::fs;
use std::path::Path;

use anyhow::Context;
use bytes::Buf;

use calltrace_common::ClassId;

use crate::engine::ParseEngine;
use crate::TraceRecord;

pub const REPLAY_MAGIC: [u8; 4] = *b"CTRC";
pub const REPLAY_VERSION: u32 = 1;

/// class id + kind + reserved + pid + tid + timestamp + payload length.
pub const RECORD_HEADER_LEN: usize = 16 + 1 + 3 + 4 + 4 + 8 + 4;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub dispatched: u64,
    pub skipped_foreign: u64,
}

/// Reads a capture file and feeds every record to the engine.
///
/// Stops early when the engine latches a fault; the partial stats are still
/// returned so the caller can report how far the replay got.
pub fn replay_file(path: &Path, engine: &mut ParseEngine<'_>) -> anyhow::Result<ReplayStats> {
    let raw = fs::read(path)
        .with_context(|| format!("failed to read trace file {}", path.display()))?;
    replay_buffer(&raw, engine)
}

pub fn replay_buffer(data: &[u8], engine: &mut ParseEngine<'_>) -> anyhow::Result<ReplayStats> {
    let mut buf = data;

    anyhow::ensure!(buf.remaining() >= 8, "trace file too short for its header");
    let mut magic = [0u8; 4];
    buf.copy_to_slice(&mut magic);
    anyhow::ensure!(magic == REPLAY_MAGIC, "not a call-trace capture file");
    let version = buf.get_u32_le();
    anyhow::ensure!(
        version == REPLAY_VERSION,
        "unsupported capture version {}",
        version
    );

    let mut stats = ReplayStats::default();
    while buf.has_remaining() {
        anyhow::ensure!(
            buf.remaining() >= RECORD_HEADER_LEN,
            "truncated record header at end of capture"
        );
        let mut class_bytes = [0u8; 16];
        buf.copy_to_slice(&mut class_bytes);
        let kind = buf.get_u8();
        buf.advance(3);
        let process_id = buf.get_u32_le();
        let thread_id = buf.get_u32_le();
        let timestamp = buf.get_u64_le();
        let payload_len = buf.get_u32_le() as usize;
        anyhow::ensure!(
            buf.remaining() >= payload_len,
            "truncated record payload at end of capture"
        );

        let record = TraceRecord {
            class_id: ClassId(class_bytes),
            kind,
            process_id,
            thread_id,
            timestamp,
            payload: &buf.chunk()[..payload_len],
        };
        if engine.dispatch_event(&record) {
            stats.dispatched += 1;
        } else {
            stats.skipped_foreign += 1;
        }
        buf.advance(payload_len);

        if engine.error_occurred() {
            break;
        }
    }
    Ok(stats)
}
