// Ingest pipeline utilities

pub mod trace;

pub use trace::{read_trace_file, TraceEntry, TraceError, TraceWriter};
