//! The sink interface the dispatcher drives.
//!
//! Implementations are invoked synchronously on the dispatching thread and
//! must not retain any of the borrowed payload references beyond the call.
//! Every callback defaults to a no-op so sinks implement only the events
//! they care about.

use chrono::{DateTime, Utc};

use calltrace_common::{
    CallRecord, DetailedCallRecord, EnterExitRecord, FrequencyRecord, InvocationInfo,
    ModuleRecord, NameTableRecord, ProcessHeapRecord, SampleRecord, StackTraceRecord,
};

use crate::record_reader::WireSlice;

#[allow(unused_variables)]
pub trait ParseEventHandler {
    fn on_function_entry(
        &mut self,
        time: DateTime<Utc>,
        process_id: u32,
        thread_id: u32,
        data: &EnterExitRecord,
    ) {
    }

    fn on_function_exit(
        &mut self,
        time: DateTime<Utc>,
        process_id: u32,
        thread_id: u32,
        data: &EnterExitRecord,
    ) {
    }

    /// A batch of function entries flushed on behalf of one thread. The
    /// thread id is the batch's originating thread, not the flusher's, and
    /// the batch may have been trimmed by one entry if the writer was
    /// interrupted mid-record.
    fn on_batch_function_entry(
        &mut self,
        time: DateTime<Utc>,
        process_id: u32,
        thread_id: u32,
        calls: &WireSlice<'_, CallRecord>,
    ) {
    }

    fn on_invocation_batch(
        &mut self,
        time: DateTime<Utc>,
        process_id: u32,
        thread_id: u32,
        invocations: &WireSlice<'_, InvocationInfo>,
    ) {
    }

    /// Invoked with the module already installed in the engine's module map.
    fn on_process_attach(
        &mut self,
        time: DateTime<Utc>,
        process_id: u32,
        thread_id: u32,
        data: &ModuleRecord,
    ) {
    }

    /// Invoked before the module is marked unloaded in the engine's map.
    fn on_process_detach(
        &mut self,
        time: DateTime<Utc>,
        process_id: u32,
        thread_id: u32,
        data: &ModuleRecord,
    ) {
    }

    fn on_thread_attach(
        &mut self,
        time: DateTime<Utc>,
        process_id: u32,
        thread_id: u32,
        data: &ModuleRecord,
    ) {
    }

    fn on_thread_detach(
        &mut self,
        time: DateTime<Utc>,
        process_id: u32,
        thread_id: u32,
        data: &ModuleRecord,
    ) {
    }

    fn on_process_ended(&mut self, time: DateTime<Utc>, process_id: u32) {}

    fn on_thread_name(
        &mut self,
        time: DateTime<Utc>,
        process_id: u32,
        thread_id: u32,
        name: &str,
    ) {
    }

    fn on_indexed_frequency(
        &mut self,
        time: DateTime<Utc>,
        process_id: u32,
        thread_id: u32,
        data: &FrequencyRecord,
        frequencies: &[u8],
    ) {
    }

    fn on_dynamic_symbol(&mut self, process_id: u32, symbol_id: u32, name: &str) {}

    fn on_sample_data(
        &mut self,
        time: DateTime<Utc>,
        process_id: u32,
        data: &SampleRecord,
        buckets: &WireSlice<'_, u32>,
    ) {
    }

    fn on_function_name_table_entry(
        &mut self,
        time: DateTime<Utc>,
        process_id: u32,
        data: &NameTableRecord,
        name: &[u8],
    ) {
    }

    fn on_stack_trace(
        &mut self,
        time: DateTime<Utc>,
        process_id: u32,
        data: &StackTraceRecord,
        frames: &WireSlice<'_, u64>,
    ) {
    }

    fn on_detailed_function_call(
        &mut self,
        time: DateTime<Utc>,
        process_id: u32,
        thread_id: u32,
        data: &DetailedCallRecord,
        argument_data: &[u8],
    ) {
    }

    fn on_comment(&mut self, time: DateTime<Utc>, process_id: u32, comment: &[u8]) {}

    fn on_process_heap(&mut self, time: DateTime<Utc>, process_id: u32, data: &ProcessHeapRecord) {}
}
