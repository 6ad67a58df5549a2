//! Offline host adapter: replays a serialized notification stream.
//!
//! A live instrumentation runtime delivers images, static instruction
//! encounters and execution-time firings as callbacks. This module
//! replays the same notification sequence from a JSON stream, so a
//! recorded run can be traced again, inspected, and tested without
//! attaching to a process.
//!
//! The replay host owns what a real host owns: the armed watch plans.
//! The tracer only decides; plans armed here are materialized into
//! record calls when the stream says the instruction actually ran.

use std::collections::{HashMap, HashSet};

use mem_tracer::{BasicBlockInfo, ImageInfo, InstructionInfo, Tracer, Watch, WatchPlan};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while replaying a host-event stream.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// The stream is not valid JSON for the expected event shape.
    #[error("malformed event stream: {0}")]
    Parse(#[from] serde_json::Error),
    /// An execution firing did not match the armed watch plan.
    #[error("instruction {address:#x} fired {got} memory accesses but {expected} watches are armed")]
    AccessMismatch {
        /// Instruction address the firing belongs to.
        address: u64,
        /// Memory watches armed for the instruction.
        expected: usize,
        /// Accesses carried by the execution event.
        got: usize,
    },
}

/// One effective memory access, resolved at execution time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EffectiveAccess {
    /// Effective address touched by the operand.
    pub address: u64,
    /// Access size in bytes.
    pub size: u64,
}

/// One notification from the host runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HostEvent {
    /// A module was mapped into the target.
    ImageLoad(ImageInfo),
    /// A thread started, including the initial one.
    ThreadStart,
    /// A static instruction was presented for instrumentation. May
    /// repeat for the same address when the host recompiles a region.
    Instruction(InstructionInfo),
    /// A basic block was presented for instrumentation.
    BasicBlock(BasicBlockInfo),
    /// An instrumented basic block executed once.
    BlockExecuted {
        /// Address of the block's first instruction.
        address: u64,
    },
    /// An instruction executed once; `accesses` carries the effective
    /// address and size of each armed memory watch, in watch order.
    Executed {
        /// Instruction address.
        address: u64,
        /// Resolved accesses for this execution.
        #[serde(default)]
        accesses: Vec<EffectiveAccess>,
    },
    /// The target process exited.
    ProcessExit {
        /// Target exit code.
        code: i32,
    },
}

/// Parse a JSON-serialized host-event stream.
pub fn parse_stream(text: &str) -> Result<Vec<HostEvent>, ReplayError> {
    Ok(serde_json::from_str(text)?)
}

/// Replays host notifications into a tracer.
pub struct ReplayHost<'a> {
    tracer: &'a Tracer,
    /// Armed watch plans by instruction address. Re-presenting an
    /// address replaces its plan, as a recompiling host would.
    plans: HashMap<u64, WatchPlan>,
    /// Armed block counting hooks: block address to instruction count.
    blocks: HashMap<u64, u64>,
    /// Addresses the tracer declined to instrument.
    skipped: HashSet<u64>,
}

impl<'a> ReplayHost<'a> {
    /// Create a replay host feeding `tracer`.
    pub fn new(tracer: &'a Tracer) -> Self {
        Self {
            tracer,
            plans: HashMap::new(),
            blocks: HashMap::new(),
            skipped: HashSet::new(),
        }
    }

    /// Replay a whole stream, stopping at the first process-exit
    /// event.
    ///
    /// On error the tracer keeps everything recorded up to the failing
    /// event; callers should still flush the report.
    pub fn run(&mut self, events: &[HostEvent]) -> Result<(), ReplayError> {
        for event in events {
            if let HostEvent::ProcessExit { code } = event {
                tracing::info!("target exited with code {code}");
                return Ok(());
            }
            self.dispatch(event)?;
        }
        tracing::debug!("stream ended without a process-exit event");
        Ok(())
    }

    fn dispatch(&mut self, event: &HostEvent) -> Result<(), ReplayError> {
        match event {
            HostEvent::ImageLoad(image) => self.tracer.on_image_load(image),
            HostEvent::ThreadStart => self.tracer.on_thread_start(),
            HostEvent::Instruction(insn) => match self.tracer.on_instruction(insn) {
                Some(plan) => {
                    self.skipped.remove(&insn.address);
                    self.plans.insert(insn.address, plan);
                }
                None => {
                    self.skipped.insert(insn.address);
                }
            },
            HostEvent::BasicBlock(block) => {
                if self.tracer.on_basic_block(block) {
                    self.blocks.insert(block.address, block.instructions);
                }
            }
            HostEvent::BlockExecuted { address } => {
                if let Some(count) = self.blocks.get(address) {
                    self.tracer.record_block(*count);
                }
            }
            HostEvent::Executed { address, accesses } => self.fire(*address, accesses)?,
            HostEvent::ProcessExit { .. } => {}
        }
        Ok(())
    }

    /// Fire the armed watches for one dynamic execution.
    fn fire(&mut self, address: u64, accesses: &[EffectiveAccess]) -> Result<(), ReplayError> {
        let Some(plan) = self.plans.get(&address) else {
            if !self.skipped.contains(&address) {
                tracing::warn!("execution of never-presented address {address:#x}");
            }
            return Ok(());
        };
        if plan.memory_watches() != accesses.len() {
            return Err(ReplayError::AccessMismatch {
                address,
                expected: plan.memory_watches(),
                got: accesses.len(),
            });
        }

        let mut resolved = accesses.iter();
        for watch in &plan.watches {
            match watch {
                Watch::Read { .. } => {
                    if let Some(access) = resolved.next() {
                        self.tracer.record_read(address, access.address, access.size);
                    }
                }
                Watch::Write { .. } => {
                    if let Some(access) = resolved.next() {
                        self.tracer
                            .record_write(address, access.address, access.size);
                    }
                }
                Watch::NoAccess => self.tracer.record_no_access(address),
            }
        }
        Ok(())
    }
}
