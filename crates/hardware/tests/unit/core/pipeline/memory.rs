//! Loads, stores, store-to-load forwarding and data-cache misses.

use pretty_assertions::assert_eq;

use atomsim_core::common::VirtAddr;
use atomsim_core::config::DramConfig;
use atomsim_core::core::pipeline::signals::{Instruction, MicroOp, Opcode};
use atomsim_core::soc::memory::{StackOrganisation, StackedDramController};

use crate::common::builder::{alu, insn, load, movi, store};
use crate::common::harness::{CODE_BASE, DATA_BASE, ProgramContext, TestCore, single_thread_config};
use crate::common::mocks::split_oracle;

fn program(code: Vec<Instruction>) -> ProgramContext {
    ProgramContext::new().with_code(CODE_BASE, code)
}

#[test]
fn load_reads_memory() {
    let ctx =
        program(vec![movi(1, DATA_BASE), load(2, 1, 8, 8)]).with_word(DATA_BASE + 8, 0xfeed);
    let mut t = TestCore::new(&single_thread_config(), vec![ctx]);
    let _ = t.run_to_end(100);
    assert_eq!(t.reg(0, 2), 0xfeed);
    assert_eq!(t.ctx(0).loads, [DATA_BASE + 8]);
    assert_eq!(t.stat("core0.thread0.dcache.misses"), 0);
}

#[test]
fn store_becomes_visible_at_commit() {
    let code = vec![movi(1, DATA_BASE), movi(3, 0xabcd), store(3, 1, 0, 2)];
    let mut t = TestCore::new(&single_thread_config(), vec![program(code)]);
    let _ = t.run_to_end(100);
    assert_eq!(t.ctx(0).stores, [(DATA_BASE, 0xabcd, 2)]);
    assert_eq!(t.ctx(0).read(DATA_BASE, 8), 0xabcd);
}

#[test]
fn load_forwards_from_older_store() {
    let code = vec![
        movi(1, DATA_BASE),
        movi(3, 0x42),
        store(3, 1, 0, 8),
        load(4, 1, 0, 8),
    ];
    let mut t = TestCore::new(&single_thread_config(), vec![program(code)]);
    let _ = t.run_to_end(100);
    assert_eq!(t.reg(0, 4), 0x42);
    assert_eq!(t.stat("core0.thread0.dcache.forwarded"), 1);
    assert!(t.ctx(0).loads.is_empty());
}

#[test]
fn narrow_load_forwards_bytes_of_wider_store() {
    let code = vec![
        movi(1, DATA_BASE),
        movi(3, 0x1122_3344_5566_7788),
        store(3, 1, 0, 8),
        load(4, 1, 2, 2),
    ];
    let mut t = TestCore::new(&single_thread_config(), vec![program(code)]);
    let _ = t.run_to_end(100);
    assert_eq!(t.reg(0, 4), 0x5566);
}

#[test]
fn partial_overlap_waits_for_store_to_drain() {
    let code = vec![
        movi(1, DATA_BASE),
        movi(3, 0x1122_3344),
        store(3, 1, 0, 4),
        load(4, 1, 0, 8),
    ];
    let ctx = program(code).with_word(DATA_BASE, 0xaabb_ccdd_0000_0000);
    let mut t = TestCore::new(&single_thread_config(), vec![ctx]);
    let _ = t.run_to_end(100);
    assert_eq!(t.reg(0, 4), 0xaabb_ccdd_1122_3344);
    assert!(t.stat("core0.thread0.issue.stall.partial_forward") > 0);
    assert_eq!(t.stat("core0.thread0.dcache.forwarded"), 0);
}

#[test]
fn slow_load_waits_out_the_miss() {
    let code = vec![movi(1, DATA_BASE), load(2, 1, 0, 8)];

    let fast = {
        let ctx = program(code.clone()).with_word(DATA_BASE, 9);
        let mut t = TestCore::new(&single_thread_config(), vec![ctx]);
        t.run_to_end(200)
    };

    let ctx = program(code).with_word(DATA_BASE, 9);
    let mut t = TestCore::with_oracle(
        &single_thread_config(),
        vec![ctx],
        Box::new(split_oracle(2, 50)),
    );
    let slow = t.run_to_end(200);
    assert_eq!(t.reg(0, 2), 9);
    assert_eq!(t.stat("core0.thread0.dcache.misses"), 1);
    assert!(slow >= fast + 45, "miss {slow} vs hit {fast}");
}

#[test]
fn loads_wait_on_stacked_rows() {
    let code = vec![movi(1, DATA_BASE), load(2, 1, 0, 8), load(3, 1, 8, 8)];
    let ctx = program(code).with_word(DATA_BASE, 5).with_word(DATA_BASE + 8, 6);
    let stack =
        StackedDramController::new(&DramConfig::default(), StackOrganisation::Vault).unwrap();
    let mut t = TestCore::with_oracle(&single_thread_config(), vec![ctx], Box::new(stack));
    let cycles = t.run_to_end(400);
    assert_eq!((t.reg(0, 2), t.reg(0, 3)), (5, 6));
    assert_eq!(t.stat("core0.thread0.dcache.misses"), 2);
    assert!(cycles > 90, "took {cycles}");
}

/// Divide bundled with a load, so the divider is held while the load misses.
fn divide_then_load() -> Instruction {
    insn(vec![
        MicroOp::new(Opcode::Div).rd(5).ra(6).rb(7),
        MicroOp::new(Opcode::Ld).rd(2).ra(1).size(8),
    ])
}

fn slow_data_core(code: Vec<Instruction>) -> TestCore {
    let ctx = program(code).with_word(DATA_BASE, 9);
    let mut t = TestCore::with_oracle(
        &single_thread_config(),
        vec![ctx],
        Box::new(split_oracle(2, 50)),
    );
    t.set_reg(0, 6, 12);
    t.set_reg(0, 7, 3);
    t
}

#[test]
fn divider_released_when_miss_resolves() {
    let mut t = slow_data_core(vec![movi(1, DATA_BASE), divide_then_load()]);
    t.run(20);
    assert_eq!(t.core.held_units(), ["fp0"]);

    let _ = t.run_to_end(300);
    assert_eq!(t.reg(0, 5), 4);
    assert_eq!(t.reg(0, 2), 9);
    assert!(t.core.held_units().is_empty());
}

#[test]
fn dividers_survive_repeated_misses() {
    let code = vec![
        movi(1, DATA_BASE),
        divide_then_load(),
        divide_then_load(),
        alu(Opcode::Div, 9, 6, 7),
    ];
    let mut t = slow_data_core(code);
    let _ = t.run_to_end(1000);
    assert_eq!(t.reg(0, 9), 4);
    assert_eq!(t.stat("core0.thread0.dcache.misses"), 2);
    assert!(t.core.held_units().is_empty());
}

#[test]
fn store_after_page_walk_keeps_its_buffer_slot() {
    let far = DATA_BASE + 0x4000;
    let code = vec![
        movi(1, DATA_BASE),
        movi(2, far),
        movi(3, 5),
        store(3, 1, 0, 8),
        store(3, 2, 0, 8),
    ];
    let mut config = single_thread_config();
    config.core.store_buffer_size = 1;
    let mut t = TestCore::new(&config, vec![program(code)]);
    let _ = t.run_to_end(500);
    assert_eq!(t.ctx(0).stores, [(DATA_BASE, 5, 8), (far, 5, 8)]);
    assert_eq!(t.stat("core0.thread0.dtlb.misses"), 1);
}

#[test]
fn data_tlb_miss_walks_then_loads() {
    let far = DATA_BASE + 0x4000;
    let ctx = program(vec![movi(1, far), load(2, 1, 0, 8)]).with_word(far, 77);
    let mut t = TestCore::new(&single_thread_config(), vec![ctx]);
    let _ = t.run_to_end(100);
    assert_eq!(t.reg(0, 2), 77);
    assert_eq!(t.stat("core0.thread0.dtlb.misses"), 1);
    assert!(t.core.dtlb().probe(VirtAddr::new(far), 0));
}

#[test]
fn device_load_waits_until_oldest() {
    let code = vec![
        alu(Opcode::Mul, 5, 6, 7),
        movi(1, DATA_BASE),
        load(2, 1, 0, 8),
    ];
    let ctx = program(code).with_word(DATA_BASE, 3).with_mmio(DATA_BASE);
    let mut t = TestCore::new(&single_thread_config(), vec![ctx]);
    let _ = t.run_to_end(100);
    assert_eq!(t.reg(0, 2), 3);
    assert!(t.stat("core0.thread0.issue.stall.mmio") > 0);
}

#[test]
fn store_buffer_full_stalls_issue() {
    let mut config = single_thread_config();
    config.core.store_buffer_size = 1;
    let code = vec![
        movi(1, DATA_BASE),
        movi(3, 1),
        store(3, 1, 0, 8),
        store(3, 1, 8, 8),
    ];
    let mut t = TestCore::new(&config, vec![program(code)]);
    let _ = t.run_to_end(100);
    assert!(t.stat("core0.thread0.issue.stall.storebuf") > 0);
    assert_eq!(t.ctx(0).stores.len(), 2);
}
