//! memtrace core - instrumentation decisions and trace recording
//!
//! This crate is the decision engine and recording pipeline of a
//! dynamic-execution tracer. A host instrumentation runtime attached to
//! a running target feeds it module-load, instruction, basic-block and
//! thread notifications; the tracer decides what deserves watching,
//! records the memory accesses that actually happen, and assembles an
//! address-sorted report when the target exits.
//!
//! # Overview
//!
//! * Only code inside the target's main executable image is traced;
//!   everything observed before that image loads is loader/runtime
//!   startup code and is skipped.
//! * Instrumentation is two-phase: a pure decide phase classifies each
//!   static instruction into a [`WatchPlan`], and only the armed
//!   watches firing at execution time touch shared state.
//! * Every traced instruction owns an ordered log of the accesses it
//!   performed, stamped with order values from one global counter, so
//!   the report preserves the total interleaving across threads.
//! * The record hooks are safe to invoke concurrently from any target
//!   thread.
//!
//! # Usage
//!
//! ```
//! use mem_tracer::{ImageInfo, InstructionInfo, MemOperandInfo, Tracer, TracerConfig};
//!
//! let tracer = Tracer::new(TracerConfig::default());
//! tracer.on_thread_start();
//! tracer.on_image_load(&ImageInfo {
//!     name: "target".to_string(),
//!     low: 0x400000,
//!     high: 0x40ffff,
//!     main_executable: true,
//! });
//!
//! let insn = InstructionInfo {
//!     address: 0x401000,
//!     mnemonic: "mov".to_string(),
//!     reads: Vec::new(),
//!     writes: Vec::new(),
//!     operands: vec![MemOperandInfo {
//!         read: true,
//!         written: false,
//!     }],
//! };
//! let plan = tracer.on_instruction(&insn).expect("inside the main image");
//! assert_eq!(plan.watches.len(), 1);
//!
//! // The host fires the armed watch each time the instruction runs,
//! // with the effective address and size of that execution.
//! tracer.record_read(insn.address, 0x7ffd_1000, 4);
//!
//! let report = tracer.finalize();
//! assert_eq!(report.entries.len(), 1);
//! ```

pub mod classify;
pub mod error;
pub mod image;
pub mod recorder;
pub mod report;
pub mod trace;

pub use classify::{classify, InstructionInfo, MemOperandInfo, Watch, WatchPlan};
pub use error::TraceError;
pub use image::{AddressRange, ImageInfo, RangeGate};
pub use recorder::{BasicBlockInfo, Tracer, TracerConfig};
pub use report::{Counters, TraceReport};
pub use trace::{Access, AccessEvent, InstructionDescriptor, InstructionRecord, RegisterRef};

/// Result type for trace emission operations
pub type Result<T> = std::result::Result<T, TraceError>;
