//! Instruction-group commit, barriers, self-modifying code and interrupts.

use pretty_assertions::assert_eq;

use atomsim_core::core::pipeline::signals::{MicroOp, Opcode};

use crate::common::builder::{assist, insn, movi, nop, pause, store, undecodable};
use crate::common::harness::{
    CODE_BASE, INTERRUPT_HANDLER, ProgramContext, TestCore, single_thread_config,
};

#[test]
fn wide_instruction_commits_atomically() {
    let mut uops = vec![MicroOp::new(Opcode::Mov).rd(1).imm(1)];
    uops.extend((0..4).map(|_| MicroOp::new(Opcode::Add).rd(1).ra(1).imm(1)));
    let mut t = TestCore::single(vec![insn(uops)]);

    for _ in 0..40 {
        let _ = t.core.runcycle();
        let r1 = t.reg(0, 1);
        assert!(r1 == 0 || r1 == 5, "partial group visible: r1 = {r1}");
    }
    assert!(t.core.is_done());
    assert_eq!(t.reg(0, 1), 5);
    assert_eq!(t.stat("core0.thread0.commit.insns"), 1);
    assert_eq!(t.stat("core0.thread0.commit.ops"), 2);
    assert_eq!(t.stat("core0.thread0.fetch.ops"), 2);
}

#[test]
fn assist_pauses_fetch_until_resumed() {
    let mut t = TestCore::single(vec![assist(), movi(1, 1)]);
    t.run(40);
    assert!(t.core.thread(0).is_fetch_paused());
    assert_eq!(t.reg(0, 1), 0);
    assert_eq!(t.stat("core0.thread0.commit.barrier"), 1);
    assert_eq!(t.stat("core0.thread0.issue.skip"), 1);
    assert_eq!(t.core.thread(0).fetch_pc(), CODE_BASE + 4);

    t.core.resume_fetch(0);
    let _ = t.run_to_end(100);
    assert_eq!(t.reg(0, 1), 1);
}

#[test]
fn barrier_discards_younger_faulted_instruction() {
    let mut t = TestCore::single(vec![assist(), undecodable()]);
    t.run(40);
    assert!(t.core.thread(0).is_fetch_paused());
    assert!(t.ctx(0).faults.is_empty());

    let _ = t.core.thread_mut(0).ctx_mut().code.insert(CODE_BASE + 4, movi(7, 77));
    t.core.resume_fetch(0);
    let _ = t.run_to_end(100);
    assert_eq!(t.reg(0, 7), 77);
    assert!(t.ctx(0).faults.is_empty());
}

#[test]
fn widest_instruction_fits_minimum_buffers() {
    let uops = (1..=13).map(|r| MicroOp::new(Opcode::Mov).rd(r).imm(u64::from(r))).collect();
    let mut config = single_thread_config();
    config.core.ops_per_thread = 4;
    config.core.dispatch_queue_size = 4;
    config.core.commit_buffer_size = 4;
    config.validate().unwrap();

    let ctx = ProgramContext::new().with_code(CODE_BASE, vec![insn(uops), movi(20, 20)]);
    let mut t = TestCore::new(&config, vec![ctx]);
    let _ = t.run_to_end(200);
    assert_eq!(t.reg(0, 1), 1);
    assert_eq!(t.reg(0, 13), 13);
    assert_eq!(t.reg(0, 20), 20);
    assert_eq!(t.stat("core0.thread0.commit.ok"), 2);
}

#[test]
fn store_into_code_is_self_modifying() {
    let code = vec![
        movi(3, 7),
        movi(4, CODE_BASE + 8),
        store(3, 4, 0, 8),
        movi(5, 1),
    ];
    let mut t = TestCore::single(code);
    t.run(60);
    assert_eq!(t.stat("core0.thread0.commit.smc"), 1);
    assert!(t.core.thread(0).is_fetch_paused());
    // The younger instruction was discarded and must be fetched again.
    assert_eq!(t.reg(0, 5), 0);
    assert_eq!(t.core.thread(0).fetch_pc(), CODE_BASE + 12);
    assert_eq!(t.ctx(0).stores, [(CODE_BASE + 8, 7, 8)]);

    t.core.resume_fetch(0);
    let _ = t.run_to_end(100);
    assert_eq!(t.reg(0, 5), 1);
}

#[test]
fn interrupt_taken_at_instruction_boundary() {
    let ctx = ProgramContext::new()
        .with_code(CODE_BASE, vec![movi(1, 1), movi(2, 2)])
        .with_code(INTERRUPT_HANDLER, vec![movi(3, 3)]);
    let mut t = TestCore::new(&single_thread_config(), vec![ctx]);
    t.core.signal_interrupt(0);
    let _ = t.run_to_end(100);

    assert_eq!(t.reg(0, 1), 1);
    assert_eq!(t.reg(0, 2), 0);
    assert_eq!(t.reg(0, 3), 3);
    assert_eq!(t.ctx(0).interrupts, [CODE_BASE + 4]);
    assert_eq!(t.stat("core0.thread0.commit.interrupt"), 1);
    assert!(!t.core.thread(0).interrupt_pending());
}

#[test]
fn interrupt_discards_younger_faulted_instruction() {
    let ctx = ProgramContext::new()
        .with_code(CODE_BASE, vec![movi(1, 1), undecodable()])
        .with_code(INTERRUPT_HANDLER, vec![movi(3, 3)]);
    let mut t = TestCore::new(&single_thread_config(), vec![ctx]);
    t.core.signal_interrupt(0);
    let _ = t.run_to_end(100);

    assert_eq!(t.reg(0, 1), 1);
    assert_eq!(t.reg(0, 3), 3);
    assert_eq!(t.ctx(0).interrupts, [CODE_BASE + 4]);
    assert!(t.ctx(0).faults.is_empty());
}

#[test]
fn pause_delays_following_fetch() {
    let body: Vec<_> = (0..40).map(|i| movi(1 + i % 8, u64::from(i))).collect();

    let mut with_nop = vec![nop()];
    with_nop.extend(body.iter().cloned());
    let mut with_pause = vec![pause()];
    with_pause.extend(body);

    let fast = TestCore::single(with_nop).run_to_end(500);
    let slow = TestCore::single(with_pause).run_to_end(500);
    assert!(slow > fast, "pause {slow} vs nop {fast}");
}

#[test]
fn commit_retires_one_group_per_cycle() {
    let code: Vec<_> = (1..=6).map(|r| movi(r, u64::from(r))).collect();
    let mut t = TestCore::single(code);
    let mut last = 0;
    while t.core.runcycle() {
        let now = t.stat("core0.thread0.commit.insns");
        assert!(now - last <= 1);
        last = now;
    }
    assert_eq!(t.stat("core0.thread0.commit.ok"), 6);
}
