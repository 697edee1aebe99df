//! A counting event sink and the replay report built around it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use calltrace_common::{
    CallRecord, DetailedCallRecord, EnterExitRecord, FrequencyRecord, InvocationInfo,
    ModuleRecord, NameTableRecord, ProcessHeapRecord, SampleRecord, StackTraceRecord,
};

use crate::handler::ParseEventHandler;
use crate::record_reader::WireSlice;

/// Per-kind event counts accumulated over one replay session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventSummary {
    pub function_entries: u64,
    pub function_exits: u64,
    pub batched_function_entries: u64,
    pub invocation_records: u64,
    pub module_loads: u64,
    pub module_unloads: u64,
    pub thread_attaches: u64,
    pub thread_detaches: u64,
    pub processes_ended: u64,
    pub thread_names: u64,
    pub frequency_records: u64,
    pub dynamic_symbols: u64,
    pub sample_records: u64,
    pub name_table_entries: u64,
    pub stack_traces: u64,
    pub detailed_calls: u64,
    pub comments: u64,
    pub heap_records: u64,
    pub total_events: u64,
}

impl EventSummary {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ParseEventHandler for EventSummary {
    fn on_function_entry(
        &mut self,
        _time: DateTime<Utc>,
        _process_id: u32,
        _thread_id: u32,
        _data: &EnterExitRecord,
    ) {
        self.function_entries += 1;
        self.total_events += 1;
    }

    fn on_function_exit(
        &mut self,
        _time: DateTime<Utc>,
        _process_id: u32,
        _thread_id: u32,
        _data: &EnterExitRecord,
    ) {
        self.function_exits += 1;
        self.total_events += 1;
    }

    fn on_batch_function_entry(
        &mut self,
        _time: DateTime<Utc>,
        _process_id: u32,
        _thread_id: u32,
        calls: &WireSlice<'_, CallRecord>,
    ) {
        self.batched_function_entries += calls.len() as u64;
        self.total_events += 1;
    }

    fn on_invocation_batch(
        &mut self,
        _time: DateTime<Utc>,
        _process_id: u32,
        _thread_id: u32,
        invocations: &WireSlice<'_, InvocationInfo>,
    ) {
        self.invocation_records += invocations.len() as u64;
        self.total_events += 1;
    }

    fn on_process_attach(
        &mut self,
        _time: DateTime<Utc>,
        _process_id: u32,
        _thread_id: u32,
        _data: &ModuleRecord,
    ) {
        self.module_loads += 1;
        self.total_events += 1;
    }

    fn on_process_detach(
        &mut self,
        _time: DateTime<Utc>,
        _process_id: u32,
        _thread_id: u32,
        _data: &ModuleRecord,
    ) {
        self.module_unloads += 1;
        self.total_events += 1;
    }

    fn on_thread_attach(
        &mut self,
        _time: DateTime<Utc>,
        _process_id: u32,
        _thread_id: u32,
        _data: &ModuleRecord,
    ) {
        self.thread_attaches += 1;
        self.total_events += 1;
    }

    fn on_thread_detach(
        &mut self,
        _time: DateTime<Utc>,
        _process_id: u32,
        _thread_id: u32,
        _data: &ModuleRecord,
    ) {
        self.thread_detaches += 1;
        self.total_events += 1;
    }

    fn on_process_ended(&mut self, _time: DateTime<Utc>, _process_id: u32) {
        self.processes_ended += 1;
        self.total_events += 1;
    }

    fn on_thread_name(
        &mut self,
        _time: DateTime<Utc>,
        _process_id: u32,
        _thread_id: u32,
        _name: &str,
    ) {
        self.thread_names += 1;
        self.total_events += 1;
    }

    fn on_indexed_frequency(
        &mut self,
        _time: DateTime<Utc>,
        _process_id: u32,
        _thread_id: u32,
        _data: &FrequencyRecord,
        _frequencies: &[u8],
    ) {
        self.frequency_records += 1;
        self.total_events += 1;
    }

    fn on_dynamic_symbol(&mut self, _process_id: u32, _symbol_id: u32, _name: &str) {
        self.dynamic_symbols += 1;
        self.total_events += 1;
    }

    fn on_sample_data(
        &mut self,
        _time: DateTime<Utc>,
        _process_id: u32,
        _data: &SampleRecord,
        _buckets: &WireSlice<'_, u32>,
    ) {
        self.sample_records += 1;
        self.total_events += 1;
    }

    fn on_function_name_table_entry(
        &mut self,
        _time: DateTime<Utc>,
        _process_id: u32,
        _data: &NameTableRecord,
        _name: &[u8],
    ) {
        self.name_table_entries += 1;
        self.total_events += 1;
    }

    fn on_stack_trace(
        &mut self,
        _time: DateTime<Utc>,
        _process_id: u32,
        _data: &StackTraceRecord,
        _frames: &WireSlice<'_, u64>,
    ) {
        self.stack_traces += 1;
        self.total_events += 1;
    }

    fn on_detailed_function_call(
        &mut self,
        _time: DateTime<Utc>,
        _process_id: u32,
        _thread_id: u32,
        _data: &DetailedCallRecord,
        _argument_data: &[u8],
    ) {
        self.detailed_calls += 1;
        self.total_events += 1;
    }

    fn on_comment(&mut self, _time: DateTime<Utc>, _process_id: u32, _comment: &[u8]) {
        self.comments += 1;
        self.total_events += 1;
    }

    fn on_process_heap(
        &mut self,
        _time: DateTime<Utc>,
        _process_id: u32,
        _data: &ProcessHeapRecord,
    ) {
        self.heap_records += 1;
        self.total_events += 1;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub timestamp: String,
    pub engine: String,
    pub trace_file: String,
    pub records_dispatched: u64,
    pub records_skipped: u64,
    pub faulted: bool,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryReport {
    pub metadata: ReportMetadata,
    pub summary: EventSummary,
}

impl SummaryReport {
    pub fn new(
        engine: &str,
        trace_file: &str,
        records_dispatched: u64,
        records_skipped: u64,
        faulted: bool,
        summary: EventSummary,
    ) -> Self {
        Self {
            metadata: ReportMetadata {
                timestamp: chrono::Utc::now().to_rfc3339(),
                engine: engine.to_string(),
                trace_file: trace_file.to_string(),
                records_dispatched,
                records_skipped,
                faulted,
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            summary,
        }
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_table(&self) -> String {
        let mut out = String::new();

        out.push_str(&format!(
            "Trace replay summary for {} ({})\n",
            self.metadata.trace_file, self.metadata.engine
        ));
        out.push_str(&format!(
            "Records: {} dispatched, {} foreign skipped\n\n",
            self.metadata.records_dispatched, self.metadata.records_skipped
        ));

        let rows = [
            ("Function entries", self.summary.function_entries),
            ("Function exits", self.summary.function_exits),
            ("Batched function entries", self.summary.batched_function_entries),
            ("Invocation records", self.summary.invocation_records),
            ("Module loads", self.summary.module_loads),
            ("Module unloads", self.summary.module_unloads),
            ("Thread attaches", self.summary.thread_attaches),
            ("Thread detaches", self.summary.thread_detaches),
            ("Processes ended", self.summary.processes_ended),
            ("Thread names", self.summary.thread_names),
            ("Frequency records", self.summary.frequency_records),
            ("Dynamic symbols", self.summary.dynamic_symbols),
            ("Sample records", self.summary.sample_records),
            ("Name table entries", self.summary.name_table_entries),
            ("Stack traces", self.summary.stack_traces),
            ("Detailed calls", self.summary.detailed_calls),
            ("Comments", self.summary.comments),
            ("Heap records", self.summary.heap_records),
        ];
        out.push_str(&format!("{:<26} {:>12}\n", "EVENT", "COUNT"));
        out.push_str(&format!("{}\n", "-".repeat(39)));
        for (label, count) in rows {
            if count > 0 {
                out.push_str(&format!("{:<26} {:>12}\n", label, count));
            }
        }
        out.push_str(&format!("{}\n", "-".repeat(39)));
        out.push_str(&format!("{:<26} {:>12}\n", "Total events", self.summary.total_events));

        if self.metadata.faulted {
            out.push_str("\nWARNING: the engine latched a fault; counts cover events up to the failure.\n");
        }

        out
    }
}
