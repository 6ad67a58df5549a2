//! Decide-what-to-watch phase of instrumentation.
//!
//! Instrumentation is a two-phase protocol: this module is the pure
//! first phase, run once per static instruction the host presents. It
//! turns the instruction's memory operands into a small set of watch
//! descriptors the host arms as execution-time hooks. Only the second
//! phase (the hooks firing in [`crate::recorder`]) touches shared
//! state.

use serde::{Deserialize, Serialize};

use crate::trace::{InstructionDescriptor, RegisterRef};

/// One memory operand of an instruction, as described by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemOperandInfo {
    /// The operand is loaded from.
    #[serde(default)]
    pub read: bool,
    /// The operand is stored to.
    #[serde(default)]
    pub written: bool,
}

/// A static instruction presented by the host for instrumentation.
///
/// Effective addresses and access sizes are not part of this
/// description: they vary per dynamic execution and are only resolved
/// when an armed watch fires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstructionInfo {
    /// Instruction address in the target.
    pub address: u64,
    /// Instruction mnemonic.
    pub mnemonic: String,
    /// Registers the instruction reads.
    #[serde(default)]
    pub reads: Vec<RegisterRef>,
    /// Registers the instruction writes.
    #[serde(default)]
    pub writes: Vec<RegisterRef>,
    /// Memory operands, in encoding order.
    #[serde(default)]
    pub operands: Vec<MemOperandInfo>,
}

impl InstructionInfo {
    /// Build the static descriptor stored for this instruction.
    pub fn descriptor(&self) -> InstructionDescriptor {
        InstructionDescriptor {
            address: self.address,
            mnemonic: self.mnemonic.clone(),
            reads: self.reads.clone(),
            writes: self.writes.clone(),
        }
    }
}

/// One recording hook to arm for an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Watch {
    /// Record a load through the given memory operand.
    Read {
        /// Operand index in the instruction's encoding.
        operand: usize,
    },
    /// Record a store through the given memory operand.
    Write {
        /// Operand index in the instruction's encoding.
        operand: usize,
    },
    /// Record that the instruction executed without touching memory.
    NoAccess,
}

/// Execution-time watch set for one instruction address.
///
/// The plan itself records nothing; the host materializes it into
/// hooks, and only their firings produce events. Handing a fresh plan
/// back for a re-presented address therefore replaces the old hooks
/// instead of doubling them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchPlan {
    /// The instruction the watches belong to.
    pub address: u64,
    /// Watches in operand order.
    pub watches: Vec<Watch>,
}

impl WatchPlan {
    /// Number of read/write watches in this plan.
    pub fn memory_watches(&self) -> usize {
        self.watches
            .iter()
            .filter(|watch| !matches!(watch, Watch::NoAccess))
            .count()
    }
}

/// Build the watch plan for one instruction.
///
/// Exactly one watch is scheduled per memory operand; an operand that
/// both loads and stores is scheduled as a read. An instruction with no
/// memory operands gets a single no-access watch, so every traced
/// instruction produces at least one event per execution.
pub fn classify(insn: &InstructionInfo) -> WatchPlan {
    let mut watches = Vec::with_capacity(insn.operands.len().max(1));
    for (index, operand) in insn.operands.iter().enumerate() {
        if operand.read {
            watches.push(Watch::Read { operand: index });
        } else if operand.written {
            watches.push(Watch::Write { operand: index });
        } else {
            tracing::debug!(
                "operand {index} of {:#x} is neither read nor written",
                insn.address
            );
        }
    }
    if watches.is_empty() {
        watches.push(Watch::NoAccess);
    }
    WatchPlan {
        address: insn.address,
        watches,
    }
}
