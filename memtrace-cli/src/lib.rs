//! Command-line wiring for the memtrace tracer.
//!
//! The binary replays a serialized host-event stream through the core
//! tracer and writes the final report to a configured sink. The replay
//! host in [`replay`] is the offline stand-in for a live
//! instrumentation runtime.

pub mod replay;
