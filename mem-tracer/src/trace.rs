//! Data structures for memory-access traces

use std::fmt;

use serde::{Deserialize, Serialize};

/// A register named by the host runtime in an instruction's encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRef {
    /// Short register name (e.g. "rax", "xmm0").
    pub name: String,
    /// Whether this is a floating-point register.
    #[serde(default)]
    pub float: bool,
}

impl fmt::Display for RegisterRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.float {
            write!(f, "{} (float)", self.name)
        } else {
            write!(f, "{}", self.name)
        }
    }
}

/// Static description of one instruction address.
///
/// Created exactly once per distinct address, the first time the host
/// presents that address for instrumentation. Later presentations of
/// the same address never replace it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstructionDescriptor {
    /// Instruction address in the target.
    pub address: u64,
    /// Instruction mnemonic.
    pub mnemonic: String,
    /// Registers the instruction reads, in encoding order.
    pub reads: Vec<RegisterRef>,
    /// Registers the instruction writes, in encoding order.
    pub writes: Vec<RegisterRef>,
}

impl fmt::Display for InstructionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x} {}", self.address, self.mnemonic)?;
        if !self.reads.is_empty() {
            write!(f, " -r->")?;
            for reg in &self.reads {
                write!(f, " {reg}")?;
            }
        }
        if !self.writes.is_empty() {
            write!(f, " -w->")?;
            for reg in &self.writes {
                write!(f, " {reg}")?;
            }
        }
        Ok(())
    }
}

/// One observed memory effect of a dynamic instruction execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Access {
    /// Load from memory.
    Read {
        /// Effective address of the load.
        address: u64,
        /// Size of the load in bytes.
        size: u64,
    },
    /// Store to memory.
    Write {
        /// Effective address of the store.
        address: u64,
        /// Size of the store in bytes.
        size: u64,
    },
    /// The instruction executed without touching memory.
    None,
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::Read { address, size } => write!(f, "-r-> {address:#x} <{size}>"),
            Access::Write { address, size } => write!(f, "-w-> {address:#x} <{size}>"),
            Access::None => write!(f, "no mem access"),
        }
    }
}

/// One recorded event, stamped with its global order index.
///
/// Order values come from a single counter shared across all
/// instructions and all target threads, so they capture the total
/// temporal interleaving of observed events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessEvent {
    /// Global sequence number of this event.
    pub order: u64,
    /// What the instruction did.
    pub access: Access,
}

/// Everything recorded for one traced instruction address: its static
/// description plus the accesses observed across all executions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstructionRecord {
    /// Static description, registered first-write-wins.
    pub descriptor: InstructionDescriptor,
    /// Observed events in append order.
    pub events: Vec<AccessEvent>,
}

impl InstructionRecord {
    /// Create an empty record for a newly observed address.
    pub fn new(descriptor: InstructionDescriptor) -> Self {
        Self {
            descriptor,
            events: Vec::new(),
        }
    }
}
