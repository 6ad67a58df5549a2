//! Final report assembly.
//!
//! The report is produced once, at target-process exit, from the
//! accumulated trace. Instruction addresses are sorted ascending with
//! an explicit sort step: the log's map iteration order reflects
//! first-observed-during-instrumentation order, which is unrelated to
//! both code layout and execution order.

use std::collections::HashMap;
use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::trace::InstructionRecord;
use crate::Result;

/// Summary counters collected while the target ran.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    /// Dynamically executed instructions.
    pub instructions: u64,
    /// Dynamically executed basic blocks.
    pub basic_blocks: u64,
    /// Threads started, including the initial one.
    pub threads: u64,
}

/// The final, address-sorted trace report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceReport {
    /// Summary counters.
    pub counters: Counters,
    /// Traced instructions in ascending address order.
    pub entries: Vec<InstructionRecord>,
}

impl TraceReport {
    /// Build a report from the recorded log.
    pub fn assemble(counters: Counters, records: &HashMap<u64, InstructionRecord>) -> Self {
        let mut addresses: Vec<u64> = records.keys().copied().collect();
        addresses.sort_unstable();
        let entries = addresses
            .iter()
            .map(|address| records[address].clone())
            .collect();
        Self { counters, entries }
    }

    /// Render the human-readable text report into `out`.
    pub fn render<W: Write>(&self, out: &mut W) -> Result<()> {
        writeln!(out, "===============================================")?;
        writeln!(out, "memtrace analysis results:")?;
        writeln!(out, "Number of instructions: {}", self.counters.instructions)?;
        writeln!(out, "Number of basic blocks: {}", self.counters.basic_blocks)?;
        writeln!(out, "Number of threads: {}", self.counters.threads)?;
        writeln!(out, "===============================================")?;
        for entry in &self.entries {
            writeln!(out, "{}", entry.descriptor)?;
            for event in &entry.events {
                writeln!(out, "        [{}]  {}", event.order, event.access)?;
            }
        }
        Ok(())
    }

    /// Render the text report to a string.
    pub fn render_to_string(&self) -> Result<String> {
        let mut buffer = Vec::new();
        self.render(&mut buffer)?;
        // render only writes UTF-8.
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// Export the report as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Export the report as compact JSON.
    pub fn to_json_compact(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
