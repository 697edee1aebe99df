//! Unified error types for the call-trace parse engine.
//!
//! Every way a dispatch can fail is a distinct variant carrying enough
//! context to diagnose a damaged trace without re-reading the record.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("short record: needed {needed} bytes, {available} available")]
    ShortRecord { needed: u64, available: u64 },

    #[error("invocation batch length {length} is not a multiple of the {entry_size}-byte entry size")]
    MalformedBatch { length: usize, entry_size: usize },

    #[error("unknown event type code {type_code}")]
    UnknownKind { type_code: u8 },

    #[error(
        "conflicting module info for pid {process_id}: {new_path} (base={new_base:#x}, size={new_size}) \
         and {existing_path} (base={existing_base:#x}, size={existing_size})"
    )]
    ModuleConflict {
        process_id: u32,
        new_path: String,
        new_base: u64,
        new_size: u64,
        existing_path: String,
        existing_base: u64,
        existing_size: u64,
    },

    #[error("module unload with mismatching range for pid {process_id}: {path} (base={base:#x}, size={size})")]
    RangeMismatch {
        process_id: u32,
        path: String,
        base: u64,
        size: u64,
    },

    #[error("unknown process id: {process_id}")]
    UnknownProcess { process_id: u32 },
}

pub type Result<T> = std::result::Result<T, ParseError>;
