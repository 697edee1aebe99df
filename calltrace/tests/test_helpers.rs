//! Shared utilities for the integration suites: wire payload builders and a
//! recording handler that captures every callback for later assertions.

use bytes::{BufMut, BytesMut};
use chrono::{DateTime, Utc};

use calltrace::record_reader::WireSlice;
use calltrace::ParseEventHandler;
use calltrace_common::{
    CallRecord, DetailedCallRecord, EnterExitRecord, FrequencyRecord, InvocationInfo,
    ModuleRecord, NameTableRecord, ProcessHeapRecord, SampleRecord, StackTraceRecord,
    MODULE_PATH_LEN,
};

/// Builders assembling payload bytes exactly as the producer lays them out.
pub mod payloads {
    use super::*;

    pub fn enter_exit(depth: u64, function: u64, args: [u64; 4]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_u64_le(depth);
        buf.put_u64_le(function);
        for arg in args {
            buf.put_u64_le(arg);
        }
        buf.to_vec()
    }

    /// Batch header plus one `CallRecord` per `(function, tick_count)` pair.
    pub fn batch_enter(thread_id: u32, calls: &[(u64, u32)]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_u32_le(thread_id);
        buf.put_u32_le(calls.len() as u32);
        for &(function, tick_count) in calls {
            buf.put_u64_le(function);
            buf.put_u32_le(tick_count);
            buf.put_u32_le(0);
        }
        buf.to_vec()
    }

    pub fn module(base: u64, size: u64, checksum: u32, tds: u32, path: &str) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_u64_le(base);
        buf.put_u64_le(size);
        buf.put_u32_le(checksum);
        buf.put_u32_le(tds);
        let mut path_bytes = [0u8; MODULE_PATH_LEN];
        let copy_len = path.len().min(MODULE_PATH_LEN - 1);
        path_bytes[..copy_len].copy_from_slice(&path.as_bytes()[..copy_len]);
        buf.put_slice(&path_bytes);
        buf.to_vec()
    }

    pub fn invocation_batch(entries: &[(u64, u64, u32)]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for &(caller, function, num_calls) in entries {
            buf.put_u64_le(caller);
            buf.put_u64_le(function);
            buf.put_u32_le(num_calls);
            buf.put_u32_le(0); // flags
            buf.put_u64_le(0); // cycles_min
            buf.put_u64_le(0); // cycles_max
            buf.put_u64_le(0); // cycles_sum
        }
        buf.to_vec()
    }

    pub fn thread_name(name: &str) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_slice(name.as_bytes());
        buf.put_u8(0);
        buf.to_vec()
    }

    pub fn indexed_frequency(num_entries: u32, frequency_size: u8, data: &[u8]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_u64_le(0x1000); // module_base_addr
        buf.put_u64_le(0x2000); // module_base_size
        buf.put_u32_le(0); // module_checksum
        buf.put_u32_le(0); // module_time_date_stamp
        buf.put_u32_le(num_entries);
        buf.put_u8(1); // data_type
        buf.put_u8(frequency_size);
        buf.put_slice(&[0u8; 2]);
        buf.put_slice(data);
        buf.to_vec()
    }

    pub fn dynamic_symbol(symbol_id: u32, name: &str) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_u32_le(symbol_id);
        buf.put_slice(name.as_bytes());
        buf.put_u8(0);
        buf.to_vec()
    }

    pub fn sample_data(buckets: &[u32]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_u64_le(0x1000); // module_base_addr
        buf.put_u64_le(0x2000); // module_base_size
        buf.put_u64_le(0x1000); // bucket_start
        buf.put_u64_le(0); // sampling_start_time
        buf.put_u64_le(0); // sampling_end_time
        buf.put_u64_le(100); // sampling_interval
        buf.put_u32_le(0); // module_checksum
        buf.put_u32_le(0); // module_time_date_stamp
        buf.put_u32_le(4); // bucket_size
        buf.put_u32_le(buckets.len() as u32);
        for &bucket in buckets {
            buf.put_u32_le(bucket);
        }
        buf.to_vec()
    }

    pub fn name_table_entry(function_id: u32, name: &str) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_u32_le(function_id);
        buf.put_u32_le(name.len() as u32);
        buf.put_slice(name.as_bytes());
        buf.to_vec()
    }

    pub fn stack_trace(stack_trace_id: u32, frames: &[u64]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_u32_le(stack_trace_id);
        buf.put_u32_le(frames.len() as u32);
        for &frame in frames {
            buf.put_u64_le(frame);
        }
        buf.to_vec()
    }

    pub fn detailed_call(function_id: u32, stack_trace_id: u32, argument_data: &[u8]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_u64_le(0); // producer-side timestamp
        buf.put_u32_le(function_id);
        buf.put_u32_le(stack_trace_id);
        buf.put_u32_le(argument_data.len() as u32);
        buf.put_u32_le(0); // flags
        buf.put_slice(argument_data);
        buf.to_vec()
    }

    pub fn comment(text: &[u8]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_u32_le(text.len() as u32);
        buf.put_slice(text);
        buf.to_vec()
    }

    pub fn process_heap(heap_handle: u64) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_u64_le(heap_handle);
        buf.to_vec()
    }
}

/// One observed handler callback, reduced to the fields the tests assert on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapturedEvent {
    FunctionEntry {
        process_id: u32,
        thread_id: u32,
        function: u64,
    },
    FunctionExit {
        process_id: u32,
        thread_id: u32,
        function: u64,
    },
    BatchFunctionEntry {
        process_id: u32,
        thread_id: u32,
        functions: Vec<u64>,
    },
    InvocationBatch {
        process_id: u32,
        thread_id: u32,
        functions: Vec<u64>,
    },
    ProcessAttach {
        process_id: u32,
        path: String,
    },
    ProcessDetach {
        process_id: u32,
        path: String,
    },
    ThreadAttach {
        process_id: u32,
        thread_id: u32,
    },
    ThreadDetach {
        process_id: u32,
        thread_id: u32,
    },
    ProcessEnded {
        process_id: u32,
    },
    ThreadName {
        thread_id: u32,
        name: String,
    },
    IndexedFrequency {
        process_id: u32,
        num_entries: u32,
        data_len: usize,
    },
    DynamicSymbol {
        process_id: u32,
        symbol_id: u32,
        name: String,
    },
    SampleData {
        process_id: u32,
        buckets: Vec<u32>,
    },
    FunctionNameTableEntry {
        process_id: u32,
        function_id: u32,
        name: String,
    },
    StackTrace {
        process_id: u32,
        frames: Vec<u64>,
    },
    DetailedFunctionCall {
        process_id: u32,
        thread_id: u32,
        argument_len: usize,
    },
    Comment {
        process_id: u32,
        comment: Vec<u8>,
    },
    ProcessHeap {
        process_id: u32,
        heap_handle: u64,
    },
}

#[derive(Debug, Default)]
pub struct RecordingHandler {
    pub events: Vec<CapturedEvent>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ParseEventHandler for RecordingHandler {
    fn on_function_entry(
        &mut self,
        _time: DateTime<Utc>,
        process_id: u32,
        thread_id: u32,
        data: &EnterExitRecord,
    ) {
        self.events.push(CapturedEvent::FunctionEntry {
            process_id,
            thread_id,
            function: data.function,
        });
    }

    fn on_function_exit(
        &mut self,
        _time: DateTime<Utc>,
        process_id: u32,
        thread_id: u32,
        data: &EnterExitRecord,
    ) {
        self.events.push(CapturedEvent::FunctionExit {
            process_id,
            thread_id,
            function: data.function,
        });
    }

    fn on_batch_function_entry(
        &mut self,
        _time: DateTime<Utc>,
        process_id: u32,
        thread_id: u32,
        calls: &WireSlice<'_, CallRecord>,
    ) {
        self.events.push(CapturedEvent::BatchFunctionEntry {
            process_id,
            thread_id,
            functions: calls.iter().map(|c| c.function).collect(),
        });
    }

    fn on_invocation_batch(
        &mut self,
        _time: DateTime<Utc>,
        process_id: u32,
        thread_id: u32,
        invocations: &WireSlice<'_, InvocationInfo>,
    ) {
        self.events.push(CapturedEvent::InvocationBatch {
            process_id,
            thread_id,
            functions: invocations.iter().map(|i| i.function).collect(),
        });
    }

    fn on_process_attach(
        &mut self,
        _time: DateTime<Utc>,
        process_id: u32,
        _thread_id: u32,
        data: &ModuleRecord,
    ) {
        self.events.push(CapturedEvent::ProcessAttach {
            process_id,
            path: data.path_as_str().to_string(),
        });
    }

    fn on_process_detach(
        &mut self,
        _time: DateTime<Utc>,
        process_id: u32,
        _thread_id: u32,
        data: &ModuleRecord,
    ) {
        self.events.push(CapturedEvent::ProcessDetach {
            process_id,
            path: data.path_as_str().to_string(),
        });
    }

    fn on_thread_attach(
        &mut self,
        _time: DateTime<Utc>,
        process_id: u32,
        thread_id: u32,
        _data: &ModuleRecord,
    ) {
        self.events.push(CapturedEvent::ThreadAttach {
            process_id,
            thread_id,
        });
    }

    fn on_thread_detach(
        &mut self,
        _time: DateTime<Utc>,
        process_id: u32,
        thread_id: u32,
        _data: &ModuleRecord,
    ) {
        self.events.push(CapturedEvent::ThreadDetach {
            process_id,
            thread_id,
        });
    }

    fn on_process_ended(&mut self, _time: DateTime<Utc>, process_id: u32) {
        self.events.push(CapturedEvent::ProcessEnded { process_id });
    }

    fn on_thread_name(
        &mut self,
        _time: DateTime<Utc>,
        _process_id: u32,
        thread_id: u32,
        name: &str,
    ) {
        self.events.push(CapturedEvent::ThreadName {
            thread_id,
            name: name.to_string(),
        });
    }

    fn on_indexed_frequency(
        &mut self,
        _time: DateTime<Utc>,
        process_id: u32,
        _thread_id: u32,
        data: &FrequencyRecord,
        frequencies: &[u8],
    ) {
        self.events.push(CapturedEvent::IndexedFrequency {
            process_id,
            num_entries: data.num_entries,
            data_len: frequencies.len(),
        });
    }

    fn on_dynamic_symbol(&mut self, process_id: u32, symbol_id: u32, name: &str) {
        self.events.push(CapturedEvent::DynamicSymbol {
            process_id,
            symbol_id,
            name: name.to_string(),
        });
    }

    fn on_sample_data(
        &mut self,
        _time: DateTime<Utc>,
        process_id: u32,
        _data: &SampleRecord,
        buckets: &WireSlice<'_, u32>,
    ) {
        self.events.push(CapturedEvent::SampleData {
            process_id,
            buckets: buckets.iter().collect(),
        });
    }

    fn on_function_name_table_entry(
        &mut self,
        _time: DateTime<Utc>,
        process_id: u32,
        data: &NameTableRecord,
        name: &[u8],
    ) {
        self.events.push(CapturedEvent::FunctionNameTableEntry {
            process_id,
            function_id: data.function_id,
            name: String::from_utf8_lossy(name).to_string(),
        });
    }

    fn on_stack_trace(
        &mut self,
        _time: DateTime<Utc>,
        process_id: u32,
        _data: &StackTraceRecord,
        frames: &WireSlice<'_, u64>,
    ) {
        self.events.push(CapturedEvent::StackTrace {
            process_id,
            frames: frames.iter().collect(),
        });
    }

    fn on_detailed_function_call(
        &mut self,
        _time: DateTime<Utc>,
        process_id: u32,
        thread_id: u32,
        _data: &DetailedCallRecord,
        argument_data: &[u8],
    ) {
        self.events.push(CapturedEvent::DetailedFunctionCall {
            process_id,
            thread_id,
            argument_len: argument_data.len(),
        });
    }

    fn on_comment(&mut self, _time: DateTime<Utc>, process_id: u32, comment: &[u8]) {
        self.events.push(CapturedEvent::Comment {
            process_id,
            comment: comment.to_vec(),
        });
    }

    fn on_process_heap(
        &mut self,
        _time: DateTime<Utc>,
        process_id: u32,
        data: &ProcessHeapRecord,
    ) {
        self.events.push(CapturedEvent::ProcessHeap {
            process_id,
            heap_handle: data.heap_handle,
        });
    }
}

#[cfg(test)]
mod helper_tests {
    use super::*;
    use std::mem::size_of;

    #[test]
    fn module_payload_should_match_the_wire_size() {
        let payload = payloads::module(0x1000, 0x2000, 0xC0DE, 0x5000_0000, "a.dll");

        assert_eq!(payload.len(), size_of::<ModuleRecord>());
    }

    #[test]
    fn batch_payload_should_frame_header_and_calls() {
        let payload = payloads::batch_enter(7, &[(0x1000, 1), (0x2000, 2)]);

        assert_eq!(
            payload.len(),
            size_of::<calltrace_common::BatchEnterRecord>() + 2 * size_of::<CallRecord>()
        );
    }

    #[test]
    fn invocation_payload_should_divide_evenly() {
        let payload = payloads::invocation_batch(&[(1, 2, 3), (4, 5, 6)]);

        assert_eq!(payload.len() % size_of::<InvocationInfo>(), 0);
        assert_eq!(payload.len() / size_of::<InvocationInfo>(), 2);
    }
}
