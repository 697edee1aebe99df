//! The parse engine: per-kind record validation and handler dispatch.
//!
//! `ParseEngine` is single-threaded and synchronous; the caller owns
//! sequencing and feeds it one record per [`ParseEngine::dispatch_event`]
//! call. The engine latches at most one fault: once `error_occurred()`
//! reports true the session is damaged and the caller tears it down.

use log::{error, info};

use calltrace_common::{
    BatchEnterRecord, CallRecord, CommentRecord, DetailedCallRecord, DynamicSymbolRecord,
    EnterExitRecord, EventKind, FrequencyRecord, InvocationInfo, ModuleRecord, NameTableRecord,
    ProcessHeapRecord, SampleRecord, StackTraceRecord,
};

use crate::classify::{classify, Classification};
use crate::errors::{ParseError, Result};
use crate::filetime_to_utc;
use crate::handler::ParseEventHandler;
use crate::module_space::ModuleInformation;
use crate::module_tracker::ModuleTracker;
use crate::record_reader::RecordReader;
use crate::TraceRecord;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum EngineState {
    /// Constructed, no handler bound yet.
    Fresh,
    /// Handler bound; dispatching.
    Ready,
    /// A dispatch failed. Terminal.
    Faulted,
}

pub struct ParseEngine<'h> {
    name: String,
    tracker: ModuleTracker,
    handler: Option<&'h mut dyn ParseEventHandler>,
    state: EngineState,
}

impl<'h> ParseEngine<'h> {
    pub fn new(name: &str, fail_on_module_conflict: bool) -> Self {
        debug_assert!(!name.is_empty());
        Self {
            name: name.to_string(),
            tracker: ModuleTracker::new(fail_on_module_conflict),
            handler: None,
            state: EngineState::Fresh,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn error_occurred(&self) -> bool {
        self.state == EngineState::Faulted
    }

    /// Binds the event sink. Must be called exactly once, before the first
    /// dispatch.
    pub fn set_event_handler(&mut self, handler: &'h mut dyn ParseEventHandler) {
        debug_assert_eq!(self.state, EngineState::Fresh, "handler already bound");
        self.handler = Some(handler);
        if self.state == EngineState::Fresh {
            self.state = EngineState::Ready;
        }
    }

    /// The module containing `address` in `process_id`'s address space.
    pub fn module_at(&self, process_id: u32, address: u64) -> Option<&ModuleInformation> {
        self.tracker.module_at(process_id, address)
    }

    /// Routes one record. Returns false only for records of a foreign event
    /// class; every record of our class returns true, with failures
    /// reported out-of-band through the fault latch.
    pub fn dispatch_event(&mut self, record: &TraceRecord<'_>) -> bool {
        debug_assert_ne!(
            self.state,
            EngineState::Faulted,
            "dispatch after a latched fault"
        );

        let kind = match classify(record) {
            Classification::Foreign => return false,
            Classification::Unknown(code) => {
                error!("Unknown event type code {} encountered.", code);
                self.state = EngineState::Faulted;
                return true;
            }
            Classification::Known(kind) => kind,
        };

        let Self {
            handler,
            tracker,
            state,
            ..
        } = self;
        let Some(handler) = handler.as_deref_mut() else {
            debug_assert!(false, "event handler must be bound before dispatch");
            error!("No event handler bound; {} event dropped.", kind.as_str());
            *state = EngineState::Faulted;
            return true;
        };

        let result = match kind {
            EventKind::EnterFunction | EventKind::ExitFunction => {
                dispatch_enter_exit(handler, record, kind)
            }
            EventKind::BatchEnter => dispatch_batch_enter(handler, record),
            EventKind::ProcessAttach
            | EventKind::ProcessDetach
            | EventKind::ThreadAttach
            | EventKind::ThreadDetach => dispatch_module_event(handler, tracker, record, kind),
            EventKind::ProcessEnded => dispatch_process_ended(handler, tracker, record),
            EventKind::Module => {
                // Reserved code: no producer emits a defined payload yet.
                info!("Module enumeration event ignored (payload undefined).");
                Ok(())
            }
            EventKind::BatchInvocation => dispatch_batch_invocation(handler, record),
            EventKind::ThreadName => dispatch_thread_name(handler, record),
            EventKind::IndexedFrequency => dispatch_indexed_frequency(handler, record),
            EventKind::DynamicSymbol => dispatch_dynamic_symbol(handler, record),
            EventKind::SampleData => dispatch_sample_data(handler, record),
            EventKind::FunctionNameTableEntry => {
                dispatch_function_name_table_entry(handler, record)
            }
            EventKind::StackTrace => dispatch_stack_trace(handler, record),
            EventKind::DetailedFunctionCall => dispatch_detailed_function_call(handler, record),
            EventKind::Comment => dispatch_comment(handler, record),
            EventKind::ProcessHeap => dispatch_process_heap(handler, record),
        };

        if let Err(err) = result {
            error!("Failed to dispatch {} event: {}", kind.as_str(), err);
            *state = EngineState::Faulted;
        }
        true
    }
}

fn wire_str(bytes: &[u8]) -> &str {
    std::str::from_utf8(bytes).unwrap_or("<invalid>")
}

fn dispatch_enter_exit(
    handler: &mut dyn ParseEventHandler,
    record: &TraceRecord<'_>,
    kind: EventKind,
) -> Result<()> {
    let mut reader = RecordReader::new(record.payload);
    let data: EnterExitRecord = reader.read()?;
    let time = filetime_to_utc(record.timestamp);

    match kind {
        EventKind::EnterFunction => {
            handler.on_function_entry(time, record.process_id, record.thread_id, &data);
        }
        _ => {
            handler.on_function_exit(time, record.process_id, record.thread_id, &data);
        }
    }
    Ok(())
}

fn dispatch_batch_enter(handler: &mut dyn ParseEventHandler, record: &TraceRecord<'_>) -> Result<()> {
    let mut reader = RecordReader::new(record.payload);
    let header: BatchEnterRecord = reader.read()?;
    let mut calls = reader.read_slice::<CallRecord>(header.num_calls as usize)?;

    // A null function in the final slot means the writing thread was
    // interrupted mid-record; the half-written entry is dropped and the
    // trim is visible to the handler.
    if calls.last().is_some_and(|call| call.function == 0) {
        info!(
            "Batch enter record trimmed to {} calls (writer interrupted).",
            calls.len() - 1
        );
        calls.truncate(calls.len() - 1);
    }

    let time = filetime_to_utc(record.timestamp);
    handler.on_batch_function_entry(time, record.process_id, header.thread_id, &calls);
    Ok(())
}

fn dispatch_batch_invocation(
    handler: &mut dyn ParseEventHandler,
    record: &TraceRecord<'_>,
) -> Result<()> {
    let entry_size = std::mem::size_of::<InvocationInfo>();
    if record.payload.len() % entry_size != 0 {
        return Err(ParseError::MalformedBatch {
            length: record.payload.len(),
            entry_size,
        });
    }

    let mut reader = RecordReader::new(record.payload);
    let invocations = reader.read_slice::<InvocationInfo>(record.payload.len() / entry_size)?;

    let time = filetime_to_utc(record.timestamp);
    handler.on_invocation_batch(time, record.process_id, record.thread_id, &invocations);
    Ok(())
}

fn dispatch_thread_name(handler: &mut dyn ParseEventHandler, record: &TraceRecord<'_>) -> Result<()> {
    let mut reader = RecordReader::new(record.payload);
    let name = reader.read_str_nul()?;

    let time = filetime_to_utc(record.timestamp);
    handler.on_thread_name(time, record.process_id, record.thread_id, wire_str(name));
    Ok(())
}

fn dispatch_indexed_frequency(
    handler: &mut dyn ParseEventHandler,
    record: &TraceRecord<'_>,
) -> Result<()> {
    let mut reader = RecordReader::new(record.payload);
    let header: FrequencyRecord = reader.read()?;

    let tail = u64::from(header.frequency_size) * u64::from(header.num_entries);
    if tail > reader.remaining() as u64 {
        return Err(ParseError::ShortRecord {
            needed: std::mem::size_of::<FrequencyRecord>() as u64 + tail,
            available: record.payload.len() as u64,
        });
    }
    let frequencies = reader.read_bytes(tail as usize)?;

    let time = filetime_to_utc(record.timestamp);
    handler.on_indexed_frequency(
        time,
        record.process_id,
        record.thread_id,
        &header,
        frequencies,
    );
    Ok(())
}

fn dispatch_dynamic_symbol(
    handler: &mut dyn ParseEventHandler,
    record: &TraceRecord<'_>,
) -> Result<()> {
    let mut reader = RecordReader::new(record.payload);
    let symbol: DynamicSymbolRecord = reader.read()?;
    let name = reader.read_str_nul()?;

    handler.on_dynamic_symbol(record.process_id, symbol.symbol_id, wire_str(name));
    Ok(())
}

fn dispatch_sample_data(handler: &mut dyn ParseEventHandler, record: &TraceRecord<'_>) -> Result<()> {
    let mut reader = RecordReader::new(record.payload);
    let header: SampleRecord = reader.read()?;
    let buckets = reader.read_slice::<u32>(header.bucket_count as usize)?;

    let time = filetime_to_utc(record.timestamp);
    handler.on_sample_data(time, record.process_id, &header, &buckets);
    Ok(())
}

fn dispatch_function_name_table_entry(
    handler: &mut dyn ParseEventHandler,
    record: &TraceRecord<'_>,
) -> Result<()> {
    let mut reader = RecordReader::new(record.payload);
    let header: NameTableRecord = reader.read()?;
    let name = reader.read_bytes(header.name_length as usize)?;

    let time = filetime_to_utc(record.timestamp);
    handler.on_function_name_table_entry(time, record.process_id, &header, name);
    Ok(())
}

fn dispatch_stack_trace(handler: &mut dyn ParseEventHandler, record: &TraceRecord<'_>) -> Result<()> {
    let mut reader = RecordReader::new(record.payload);
    let header: StackTraceRecord = reader.read()?;
    let frames = reader.read_slice::<u64>(header.num_frames as usize)?;

    let time = filetime_to_utc(record.timestamp);
    handler.on_stack_trace(time, record.process_id, &header, &frames);
    Ok(())
}

fn dispatch_detailed_function_call(
    handler: &mut dyn ParseEventHandler,
    record: &TraceRecord<'_>,
) -> Result<()> {
    let mut reader = RecordReader::new(record.payload);
    let header: DetailedCallRecord = reader.read()?;
    let argument_data = reader.read_bytes(header.argument_data_size as usize)?;

    let time = filetime_to_utc(record.timestamp);
    handler.on_detailed_function_call(
        time,
        record.process_id,
        record.thread_id,
        &header,
        argument_data,
    );
    Ok(())
}

fn dispatch_comment(handler: &mut dyn ParseEventHandler, record: &TraceRecord<'_>) -> Result<()> {
    let mut reader = RecordReader::new(record.payload);
    let header: CommentRecord = reader.read()?;
    let comment = reader.read_bytes(header.comment_size as usize)?;

    let time = filetime_to_utc(record.timestamp);
    handler.on_comment(time, record.process_id, comment);
    Ok(())
}

fn dispatch_process_heap(handler: &mut dyn ParseEventHandler, record: &TraceRecord<'_>) -> Result<()> {
    let mut reader = RecordReader::new(record.payload);
    let data: ProcessHeapRecord = reader.read()?;

    let time = filetime_to_utc(record.timestamp);
    handler.on_process_heap(time, record.process_id, &data);
    Ok(())
}

fn dispatch_process_ended(
    handler: &mut dyn ParseEventHandler,
    tracker: &mut ModuleTracker,
    record: &TraceRecord<'_>,
) -> Result<()> {
    let time = filetime_to_utc(record.timestamp);
    handler.on_process_ended(time, record.process_id);
    tracker.remove_process(record.process_id)?;
    Ok(())
}

fn dispatch_module_event(
    handler: &mut dyn ParseEventHandler,
    tracker: &mut ModuleTracker,
    record: &TraceRecord<'_>,
    kind: EventKind,
) -> Result<()> {
    let mut reader = RecordReader::new(record.payload);
    let data: ModuleRecord = reader.read()?;

    if data.module_base_addr == 0 {
        info!("Encountered incompletely written module event record.");
        return Ok(());
    }

    let time = filetime_to_utc(record.timestamp);
    let process_id = record.process_id;
    let thread_id = record.thread_id;

    match kind {
        EventKind::ProcessAttach => {
            // Install first so the handler observes the module as loaded.
            let info = ModuleInformation::from_record(&data);
            tracker.add_module(process_id, &info)?;
            handler.on_process_attach(time, process_id, thread_id, &data);
        }
        EventKind::ProcessDetach => {
            // Handler first; it may still want to resolve against the map.
            handler.on_process_detach(time, process_id, thread_id, &data);
            let info = ModuleInformation::from_record(&data);
            tracker.remove_module(process_id, &info)?;
        }
        EventKind::ThreadAttach => {
            handler.on_thread_attach(time, process_id, thread_id, &data);
        }
        EventKind::ThreadDetach => {
            handler.on_thread_detach(time, process_id, thread_id, &data);
        }
        _ => debug_assert!(false, "not a module event kind"),
    }
    Ok(())
}
