//! Integration tests driving the tracer the way an instrumentation
//! host does: decide phase per static instruction, then watch firings
//! per dynamic execution.

use mem_tracer::{
    Access, BasicBlockInfo, ImageInfo, InstructionInfo, MemOperandInfo, RegisterRef, Tracer,
    TracerConfig, Watch,
};

fn main_image() -> ImageInfo {
    ImageInfo {
        name: "target".to_string(),
        low: 0x4000,
        high: 0x4fff,
        main_executable: true,
    }
}

fn insn(address: u64, mnemonic: &str, operands: Vec<MemOperandInfo>) -> InstructionInfo {
    InstructionInfo {
        address,
        mnemonic: mnemonic.to_string(),
        reads: vec![RegisterRef {
            name: "rax".to_string(),
            float: false,
        }],
        writes: Vec::new(),
        operands,
    }
}

/// Fire a plan's watches once, as a host would for one dynamic
/// execution, drawing effective addresses from `accesses`.
fn execute_once(tracer: &Tracer, insn_address: u64, watches: &[Watch], accesses: &[(u64, u64)]) {
    let mut resolved = accesses.iter();
    for watch in watches {
        match watch {
            Watch::Read { .. } => {
                let (address, size) = resolved.next().expect("missing effective access");
                tracer.record_read(insn_address, *address, *size);
            }
            Watch::Write { .. } => {
                let (address, size) = resolved.next().expect("missing effective access");
                tracer.record_write(insn_address, *address, *size);
            }
            Watch::NoAccess => tracer.record_no_access(insn_address),
        }
    }
}

#[test]
fn test_every_reported_address_is_inside_the_main_image() {
    let tracer = Tracer::new(TracerConfig::default());

    // Startup code observed before the image loads.
    tracer.on_instruction(&insn(0x100, "push", Vec::new()));

    tracer.on_image_load(&main_image());
    tracer.on_instruction(&insn(0x4000, "mov", Vec::new()));
    tracer.on_instruction(&insn(0x4fff, "add", Vec::new()));
    tracer.on_instruction(&insn(0x5000, "sub", Vec::new()));

    let report = tracer.finalize();
    let range = tracer.main_image_range().unwrap();
    assert_eq!(report.entries.len(), 2);
    for entry in &report.entries {
        assert!(
            range.contains(entry.descriptor.address),
            "{:#x} escaped the gate",
            entry.descriptor.address
        );
    }
}

#[test]
fn test_k_operands_produce_k_events_per_execution() {
    let tracer = Tracer::new(TracerConfig::default());
    tracer.on_image_load(&main_image());

    // One load operand plus one store operand, executed three times
    // with varying effective addresses (loop iterations).
    let copy = insn(
        0x4010,
        "movs",
        vec![
            MemOperandInfo {
                read: true,
                written: false,
            },
            MemOperandInfo {
                read: false,
                written: true,
            },
        ],
    );
    let plan = tracer.on_instruction(&copy).unwrap();
    assert_eq!(plan.memory_watches(), 2);

    for i in 0..3u64 {
        execute_once(
            &tracer,
            copy.address,
            &plan.watches,
            &[(0x1000 + i * 8, 8), (0x2000 + i * 8, 8)],
        );
    }

    let report = tracer.finalize();
    let events = &report.entries[0].events;
    assert_eq!(events.len(), 6, "two events per execution, three runs");
    assert!(matches!(events[0].access, Access::Read { .. }));
    assert!(matches!(events[1].access, Access::Write { .. }));
    assert_eq!(
        events[4].access,
        Access::Read {
            address: 0x1010,
            size: 8
        }
    );
}

#[test]
fn test_zero_operand_instruction_produces_one_marker_per_execution() {
    let tracer = Tracer::new(TracerConfig::default());
    tracer.on_image_load(&main_image());

    let nop = insn(0x4020, "nop", Vec::new());
    let plan = tracer.on_instruction(&nop).unwrap();
    assert_eq!(plan.watches, vec![Watch::NoAccess]);

    for _ in 0..2 {
        execute_once(&tracer, nop.address, &plan.watches, &[]);
    }

    let report = tracer.finalize();
    let events = &report.entries[0].events;
    assert_eq!(events.len(), 2);
    assert!(events
        .iter()
        .all(|event| event.access == Access::None));
}

#[test]
fn test_report_is_deterministic_across_identical_runs() {
    let run = || {
        let tracer = Tracer::new(TracerConfig::default());
        tracer.on_thread_start();
        tracer.on_image_load(&main_image());

        let block = BasicBlockInfo {
            address: 0x4010,
            instructions: 2,
        };
        assert!(tracer.on_basic_block(&block));

        let load = insn(
            0x4018,
            "mov",
            vec![MemOperandInfo {
                read: true,
                written: false,
            }],
        );
        let store = insn(
            0x4010,
            "mov",
            vec![MemOperandInfo {
                read: false,
                written: true,
            }],
        );
        let load_plan = tracer.on_instruction(&load).unwrap();
        let store_plan = tracer.on_instruction(&store).unwrap();

        tracer.record_block(2);
        execute_once(&tracer, store.address, &store_plan.watches, &[(0x9000, 4)]);
        execute_once(&tracer, load.address, &load_plan.watches, &[(0x9000, 4)]);

        tracer.finalize().render_to_string().unwrap()
    };

    assert_eq!(run(), run(), "identical runs must render identically");
}

#[test]
fn test_single_read_scenario_end_to_end() {
    let tracer = Tracer::new(TracerConfig::default());
    tracer.on_thread_start();
    tracer.on_image_load(&main_image());

    let block = BasicBlockInfo {
        address: 0x4010,
        instructions: 1,
    };
    assert!(tracer.on_basic_block(&block));

    let load = insn(
        0x4010,
        "mov",
        vec![MemOperandInfo {
            read: true,
            written: false,
        }],
    );
    let plan = tracer.on_instruction(&load).unwrap();

    tracer.record_block(1);
    execute_once(&tracer, load.address, &plan.watches, &[(0xa, 4)]);

    let report = tracer.finalize();
    assert_eq!(report.counters.instructions, 1);
    assert_eq!(report.counters.threads, 1);
    assert_eq!(report.entries.len(), 1);

    let text = report.render_to_string().unwrap();
    assert!(text.contains("        [0]  -r-> 0xa <4>"));
}
