//! Tracer state and execution-time recording hooks.
//!
//! [`Tracer`] is the state object the embedding host owns for the
//! lifetime of the target process. The host feeds it the decide-phase
//! notifications (image load, instruction encountered, basic block
//! encountered) and invokes the record hooks from whichever target
//! thread executes the instrumented code.
//!
//! The record hooks sit on the target's hot path: they are non-blocking
//! in-memory appends, and the only shared mutable state they touch is
//! the locked event log and three atomic counters. Order allocation and
//! log append happen in one critical section, so no two events can
//! observe the same order value and none can be lost.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::classify::{classify, InstructionInfo, WatchPlan};
use crate::image::{AddressRange, ImageInfo, RangeGate};
use crate::report::{Counters, TraceReport};
use crate::trace::{Access, AccessEvent, InstructionRecord};

/// Tracer configuration, fixed before the target starts running.
#[derive(Debug, Clone, Copy)]
pub struct TracerConfig {
    /// Count instructions, basic blocks and threads.
    pub count: bool,
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self { count: true }
    }
}

/// A basic block presented by the host for instrumentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicBlockInfo {
    /// Address of the block's first instruction.
    pub address: u64,
    /// Number of instructions in the block.
    pub instructions: u64,
}

/// Shared event log guarded by a single lock.
#[derive(Debug, Default)]
struct TraceLog {
    /// Next global order value to hand out.
    next_order: u64,
    /// One record per traced instruction address.
    records: HashMap<u64, InstructionRecord>,
}

/// The tracer state object.
///
/// All hooks take `&self` and are safe to invoke concurrently from
/// multiple target threads. [`Tracer::finalize`] is the single
/// exclusive reader; it must run only after the host guarantees no
/// further target threads are executing.
pub struct Tracer {
    config: TracerConfig,
    gate: RangeGate,
    log: Mutex<TraceLog>,
    instructions: AtomicU64,
    basic_blocks: AtomicU64,
    threads: AtomicU64,
}

impl Tracer {
    /// Create a tracer with the given configuration.
    pub fn new(config: TracerConfig) -> Self {
        Self {
            config,
            gate: RangeGate::new(),
            log: Mutex::new(TraceLog::default()),
            instructions: AtomicU64::new(0),
            basic_blocks: AtomicU64::new(0),
            threads: AtomicU64::new(0),
        }
    }

    /// Handle a module-load notification from the host.
    pub fn on_image_load(&self, image: &ImageInfo) {
        self.gate.on_image_load(image);
    }

    /// The main executable's bounds, once its image has loaded.
    pub fn main_image_range(&self) -> Option<AddressRange> {
        self.gate.range()
    }

    /// Decide whether `insn` deserves tracing and, if so, which watches
    /// the host should arm for it.
    ///
    /// Instructions observed before the main image loads, or outside
    /// its bounds, return `None` and leave no trace entry. The host may
    /// present the same address more than once (trace regions get
    /// recompiled); the descriptor is registered first-write-wins and
    /// the returned plan replaces any previously armed watches, so
    /// re-instrumentation cannot duplicate descriptors or double-count
    /// events.
    pub fn on_instruction(&self, insn: &InstructionInfo) -> Option<WatchPlan> {
        if !self.gate.is_in_range(insn.address) {
            tracing::trace!("skipping {:#x} {}", insn.address, insn.mnemonic);
            return None;
        }

        let mut log = self.log.lock();
        log.records
            .entry(insn.address)
            .or_insert_with(|| InstructionRecord::new(insn.descriptor()));
        Some(classify(insn))
    }

    /// Decide whether the host should arm the counting hook for
    /// `block`.
    ///
    /// Block counting is gated by the same main-image range as memory
    /// tracing, so the summary counters describe the same code the
    /// trace does.
    pub fn on_basic_block(&self, block: &BasicBlockInfo) -> bool {
        self.config.count && self.gate.is_in_range(block.address)
    }

    /// Execution-time firing of a block counting hook.
    ///
    /// Called every time the block actually runs; a block executed a
    /// million times bumps the counters a million times.
    pub fn record_block(&self, instruction_count: u64) {
        self.basic_blocks.fetch_add(1, Ordering::Relaxed);
        self.instructions
            .fetch_add(instruction_count, Ordering::Relaxed);
    }

    /// Thread-start notification, including the initial thread.
    pub fn on_thread_start(&self) {
        if self.config.count {
            self.threads.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a load performed by the instruction at `insn_address`.
    pub fn record_read(&self, insn_address: u64, address: u64, size: u64) {
        self.record(insn_address, Access::Read { address, size });
    }

    /// Record a store performed by the instruction at `insn_address`.
    pub fn record_write(&self, insn_address: u64, address: u64, size: u64) {
        self.record(insn_address, Access::Write { address, size });
    }

    /// Record that the instruction at `insn_address` executed without
    /// touching memory.
    pub fn record_no_access(&self, insn_address: u64) {
        self.record(insn_address, Access::None);
    }

    fn record(&self, insn_address: u64, access: Access) {
        let mut log = self.log.lock();
        let TraceLog { next_order, records } = &mut *log;
        let Some(record) = records.get_mut(&insn_address) else {
            // A firing for an address that was never instrumented is a
            // host-integration anomaly; drop it without consuming an
            // order value.
            tracing::warn!("access fired for uninstrumented address {insn_address:#x}");
            return;
        };
        let order = *next_order;
        *next_order += 1;
        record.events.push(AccessEvent { order, access });
    }

    /// Assemble the final, address-sorted report.
    ///
    /// The single exclusive reader of the shared log; invoke once, at
    /// target-process exit.
    pub fn finalize(&self) -> TraceReport {
        let log = self.log.lock();
        let counters = Counters {
            instructions: self.instructions.load(Ordering::Relaxed),
            basic_blocks: self.basic_blocks.load(Ordering::Relaxed),
            threads: self.threads.load(Ordering::Relaxed),
        };
        tracing::info!(
            "finalizing trace: {} instruction addresses, {} events recorded",
            log.records.len(),
            log.next_order
        );
        TraceReport::assemble(counters, &log.records)
    }
}
