//! Wire-format records for the call-trace event stream.
//!
//! These types are shared bit-exactly between the in-process instrumentation
//! agent that produces event records and the userspace parser that consumes
//! them. Every struct is `repr(C)` with explicit reserved bytes where the
//! natural layout would otherwise introduce implicit padding, so that
//! `size_of::<T>()` is exactly the number of bytes the producer writes.
//! All multi-byte fields are little-endian.

#![no_std]

#[cfg(test)]
extern crate std;
#[cfg(test)]
use std::vec;

/// Marker for plain-old-data wire structs.
///
/// # Safety
///
/// Implementors must be `repr(C)`, contain only integer fields and arrays
/// thereof (every bit pattern is a valid value), and have no implicit
/// padding, so that reading one from an arbitrary byte buffer with
/// `read_unaligned` is sound and matches the producer's layout.
pub unsafe trait Wire: Copy + 'static {}

unsafe impl Wire for u8 {}
unsafe impl Wire for u32 {}
unsafe impl Wire for u64 {}

/// Identifies the event class a record belongs to.
///
/// The parser recognizes exactly one class; records carrying any other id
/// come from an unrelated provider sharing the transport and are skipped.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ClassId(pub [u8; 16]);

/// The single event class emitted by the call-trace agent.
pub const CALL_TRACE_CLASS_ID: ClassId = ClassId([
    0x06, 0x18, 0x6f, 0x97, 0x8c, 0x2f, 0x45, 0x11, 0xa1, 0x2e, 0x3d, 0x40,
    0xc0, 0x5e, 0x1c, 0x9a,
]);

/// Closed set of event kinds carried on the wire.
///
/// Discriminants are the on-wire type codes and must never be renumbered.
#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum EventKind {
    EnterFunction = 10,
    ExitFunction = 11,
    BatchEnter = 12,
    ProcessAttach = 13,
    ProcessDetach = 14,
    ThreadAttach = 15,
    ThreadDetach = 16,
    /// Reserved for a future module enumeration event; no producer emits a
    /// defined payload for it yet.
    Module = 17,
    BatchInvocation = 18,
    ThreadName = 19,
    IndexedFrequency = 20,
    ProcessEnded = 21,
    DynamicSymbol = 22,
    SampleData = 23,
    FunctionNameTableEntry = 24,
    StackTrace = 25,
    DetailedFunctionCall = 26,
    Comment = 27,
    ProcessHeap = 28,
}

impl EventKind {
    pub fn from_wire(code: u8) -> Option<EventKind> {
        match code {
            10 => Some(EventKind::EnterFunction),
            11 => Some(EventKind::ExitFunction),
            12 => Some(EventKind::BatchEnter),
            13 => Some(EventKind::ProcessAttach),
            14 => Some(EventKind::ProcessDetach),
            15 => Some(EventKind::ThreadAttach),
            16 => Some(EventKind::ThreadDetach),
            17 => Some(EventKind::Module),
            18 => Some(EventKind::BatchInvocation),
            19 => Some(EventKind::ThreadName),
            20 => Some(EventKind::IndexedFrequency),
            21 => Some(EventKind::ProcessEnded),
            22 => Some(EventKind::DynamicSymbol),
            23 => Some(EventKind::SampleData),
            24 => Some(EventKind::FunctionNameTableEntry),
            25 => Some(EventKind::StackTrace),
            26 => Some(EventKind::DetailedFunctionCall),
            27 => Some(EventKind::Comment),
            28 => Some(EventKind::ProcessHeap),
            _ => None,
        }
    }

    pub fn wire_code(self) -> u8 {
        self as u8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::EnterFunction => "enter_function",
            EventKind::ExitFunction => "exit_function",
            EventKind::BatchEnter => "batch_enter",
            EventKind::ProcessAttach => "process_attach",
            EventKind::ProcessDetach => "process_detach",
            EventKind::ThreadAttach => "thread_attach",
            EventKind::ThreadDetach => "thread_detach",
            EventKind::Module => "module",
            EventKind::BatchInvocation => "batch_invocation",
            EventKind::ThreadName => "thread_name",
            EventKind::IndexedFrequency => "indexed_frequency",
            EventKind::ProcessEnded => "process_ended",
            EventKind::DynamicSymbol => "dynamic_symbol",
            EventKind::SampleData => "sample_data",
            EventKind::FunctionNameTableEntry => "function_name_table_entry",
            EventKind::StackTrace => "stack_trace",
            EventKind::DetailedFunctionCall => "detailed_function_call",
            EventKind::Comment => "comment",
            EventKind::ProcessHeap => "process_heap",
        }
    }

    pub fn all() -> [EventKind; 19] {
        [
            EventKind::EnterFunction,
            EventKind::ExitFunction,
            EventKind::BatchEnter,
            EventKind::ProcessAttach,
            EventKind::ProcessDetach,
            EventKind::ThreadAttach,
            EventKind::ThreadDetach,
            EventKind::Module,
            EventKind::BatchInvocation,
            EventKind::ThreadName,
            EventKind::IndexedFrequency,
            EventKind::ProcessEnded,
            EventKind::DynamicSymbol,
            EventKind::SampleData,
            EventKind::FunctionNameTableEntry,
            EventKind::StackTrace,
            EventKind::DetailedFunctionCall,
            EventKind::Comment,
            EventKind::ProcessHeap,
        ]
    }
}

/// Payload of `EnterFunction` and `ExitFunction` events.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct EnterExitRecord {
    pub depth: u64,
    pub function: u64,
    pub args: [u64; 4],
}

unsafe impl Wire for EnterExitRecord {}

impl EnterExitRecord {
    pub fn new() -> Self {
        Self {
            depth: 0,
            function: 0,
            args: [0; 4],
        }
    }

    pub fn with_depth(mut self, depth: u64) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_function(mut self, function: u64) -> Self {
        self.function = function;
        self
    }

    pub fn with_args(mut self, args: [u64; 4]) -> Self {
        self.args = args;
        self
    }
}

impl Default for EnterExitRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed prefix of a `BatchEnter` payload; `num_calls` `CallRecord`s follow.
///
/// The thread id travels in the batch header rather than the record header
/// because batches are flushed by a dedicated writer thread on behalf of the
/// thread that made the calls.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BatchEnterRecord {
    pub thread_id: u32,
    pub num_calls: u32,
}

unsafe impl Wire for BatchEnterRecord {}

impl BatchEnterRecord {
    pub fn new() -> Self {
        Self {
            thread_id: 0,
            num_calls: 0,
        }
    }

    pub fn with_thread_id(mut self, thread_id: u32) -> Self {
        self.thread_id = thread_id;
        self
    }

    pub fn with_num_calls(mut self, num_calls: u32) -> Self {
        self.num_calls = num_calls;
        self
    }
}

impl Default for BatchEnterRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// One function call inside a `BatchEnter` tail.
///
/// A `function` of zero marks a slot the writer was interrupted in before
/// completing; it can only legally appear in the final slot of a batch.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct CallRecord {
    pub function: u64,
    pub tick_count: u32,
    pub flags: u32,
}

unsafe impl Wire for CallRecord {}

impl CallRecord {
    pub fn new() -> Self {
        Self {
            function: 0,
            tick_count: 0,
            flags: 0,
        }
    }

    pub fn with_function(mut self, function: u64) -> Self {
        self.function = function;
        self
    }

    pub fn with_tick_count(mut self, tick_count: u32) -> Self {
        self.tick_count = tick_count;
        self
    }
}

impl Default for CallRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// Maximum stored length of a module path, NUL padding included.
pub const MODULE_PATH_LEN: usize = 256;

/// Payload of process/thread attach and detach events.
///
/// `module_path` is NUL-terminated; paths longer than the field are
/// truncated by the producer.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct ModuleRecord {
    pub module_base_addr: u64,
    pub module_base_size: u64,
    pub module_checksum: u32,
    pub module_time_date_stamp: u32,
    pub module_path: [u8; MODULE_PATH_LEN],
}

unsafe impl Wire for ModuleRecord {}

impl ModuleRecord {
    pub fn new() -> Self {
        Self {
            module_base_addr: 0,
            module_base_size: 0,
            module_checksum: 0,
            module_time_date_stamp: 0,
            module_path: [0u8; MODULE_PATH_LEN],
        }
    }

    pub fn with_base_addr(mut self, addr: u64) -> Self {
        self.module_base_addr = addr;
        self
    }

    pub fn with_base_size(mut self, size: u64) -> Self {
        self.module_base_size = size;
        self
    }

    pub fn with_checksum(mut self, checksum: u32) -> Self {
        self.module_checksum = checksum;
        self
    }

    pub fn with_time_date_stamp(mut self, tds: u32) -> Self {
        self.module_time_date_stamp = tds;
        self
    }

    pub fn with_path(mut self, path: &[u8]) -> Self {
        // Leave room for the terminating NUL.
        let copy_len = path.len().min(self.module_path.len() - 1);
        self.module_path = [0u8; MODULE_PATH_LEN];
        self.module_path[..copy_len].copy_from_slice(&path[..copy_len]);
        self
    }

    pub fn path_as_str(&self) -> &str {
        let end = self
            .module_path
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.module_path.len());
        core::str::from_utf8(&self.module_path[..end]).unwrap_or("<invalid>")
    }
}

impl Default for ModuleRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// One entry of a `BatchInvocation` payload. The payload is a bare array of
/// these with no header; its length must divide evenly.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct InvocationInfo {
    pub caller: u64,
    pub function: u64,
    pub num_calls: u32,
    pub flags: u32,
    pub cycles_min: u64,
    pub cycles_max: u64,
    pub cycles_sum: u64,
}

unsafe impl Wire for InvocationInfo {}

impl InvocationInfo {
    pub fn new() -> Self {
        Self {
            caller: 0,
            function: 0,
            num_calls: 0,
            flags: 0,
            cycles_min: 0,
            cycles_max: 0,
            cycles_sum: 0,
        }
    }

    pub fn with_caller(mut self, caller: u64) -> Self {
        self.caller = caller;
        self
    }

    pub fn with_function(mut self, function: u64) -> Self {
        self.function = function;
        self
    }

    pub fn with_num_calls(mut self, num_calls: u32) -> Self {
        self.num_calls = num_calls;
        self
    }
}

impl Default for InvocationInfo {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed prefix of an `IndexedFrequency` payload;
/// `frequency_size * num_entries` bytes of counter data follow.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct FrequencyRecord {
    pub module_base_addr: u64,
    pub module_base_size: u64,
    pub module_checksum: u32,
    pub module_time_date_stamp: u32,
    pub num_entries: u32,
    pub data_type: u8,
    pub frequency_size: u8,
    pub _reserved: [u8; 2],
}

unsafe impl Wire for FrequencyRecord {}

impl FrequencyRecord {
    pub fn new() -> Self {
        Self {
            module_base_addr: 0,
            module_base_size: 0,
            module_checksum: 0,
            module_time_date_stamp: 0,
            num_entries: 0,
            data_type: 0,
            frequency_size: 0,
            _reserved: [0; 2],
        }
    }
}

impl Default for FrequencyRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed prefix of a `DynamicSymbol` payload; a NUL-terminated symbol name
/// follows.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct DynamicSymbolRecord {
    pub symbol_id: u32,
}

unsafe impl Wire for DynamicSymbolRecord {}

/// Fixed prefix of a `SampleData` payload; `bucket_count` u32 bucket counters
/// follow.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SampleRecord {
    pub module_base_addr: u64,
    pub module_base_size: u64,
    pub bucket_start: u64,
    pub sampling_start_time: u64,
    pub sampling_end_time: u64,
    pub sampling_interval: u64,
    pub module_checksum: u32,
    pub module_time_date_stamp: u32,
    pub bucket_size: u32,
    pub bucket_count: u32,
}

unsafe impl Wire for SampleRecord {}

impl SampleRecord {
    pub fn new() -> Self {
        Self {
            module_base_addr: 0,
            module_base_size: 0,
            bucket_start: 0,
            sampling_start_time: 0,
            sampling_end_time: 0,
            sampling_interval: 0,
            module_checksum: 0,
            module_time_date_stamp: 0,
            bucket_size: 0,
            bucket_count: 0,
        }
    }
}

impl Default for SampleRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed prefix of a `FunctionNameTableEntry` payload; `name_length` bytes of
/// UTF-8 name data follow.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct NameTableRecord {
    pub function_id: u32,
    pub name_length: u32,
}

unsafe impl Wire for NameTableRecord {}

/// Fixed prefix of a `StackTrace` payload; `num_frames` u64 return addresses
/// follow.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct StackTraceRecord {
    pub stack_trace_id: u32,
    pub num_frames: u32,
}

unsafe impl Wire for StackTraceRecord {}

/// Fixed prefix of a `DetailedFunctionCall` payload; `argument_data_size`
/// bytes of serialized argument data follow.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct DetailedCallRecord {
    pub timestamp: u64,
    pub function_id: u32,
    pub stack_trace_id: u32,
    pub argument_data_size: u32,
    pub flags: u32,
}

unsafe impl Wire for DetailedCallRecord {}

/// Fixed prefix of a `Comment` payload; `comment_size` bytes follow.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct CommentRecord {
    pub comment_size: u32,
}

unsafe impl Wire for CommentRecord {}

/// Payload of a `ProcessHeap` event.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ProcessHeapRecord {
    pub heap_handle: u64,
}

unsafe impl Wire for ProcessHeapRecord {}
