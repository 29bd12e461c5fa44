//! Pipeline fill and throughput.

use pretty_assertions::assert_eq;

use atomsim_core::core::pipeline::op::OpState;

use crate::common::builder::{addi, movi, nop};
use crate::common::harness::{CODE_BASE, ProgramContext, TestCore, single_thread_config};

/// Cycles from fetch to commit of a single independent op:
/// three decode cycles, then issue, complete, forward, transfer, writeback, commit.
const FILL: u64 = 9;

#[test]
fn independent_ops_commit_one_per_cycle_after_fill() {
    for n in [1u64, 2, 4, 8] {
        let code = (0..n).map(|i| movi(i as u8 + 1, i + 100)).collect();
        let mut t = TestCore::single(code);
        let cycles = t.run_to_end(200);
        assert_eq!(cycles, n + FILL, "{n} ops");
        for i in 0..n {
            assert_eq!(t.reg(0, i as u8 + 1), i + 100);
        }
        assert_eq!(t.stat("core0.thread0.commit.insns"), n);
    }
}

#[test]
fn op_walks_every_state_in_order() {
    let mut t = TestCore::single(vec![nop()]);
    let mut seen = Vec::new();
    for _ in 0..12 {
        if let Some((_, op)) = t.core.thread(0).ops().live().next() {
            let state = op.state();
            if seen.last() != Some(&state) {
                seen.push(state);
            }
        }
        let _ = t.core.runcycle();
    }
    assert_eq!(
        seen,
        [
            OpState::Fetched,
            OpState::Dispatched,
            OpState::Executing,
            OpState::Forwarding,
            OpState::WaitingToWriteback,
            OpState::ReadyToWriteback,
        ]
    );
    assert!(t.core.is_done());
}

#[test]
fn fetch_respects_block_boundary() {
    // Starting 4 bytes before a 16-byte block boundary only one instruction
    // fits in the first fetch.
    let start = CODE_BASE + 12;
    let ctx = ProgramContext::new().with_code(start, vec![addi(1, 0, 1), addi(2, 0, 2)]);
    let mut t = TestCore::new(&single_thread_config(), vec![ctx]);
    t.core.redirect_fetch(0, start);
    t.run(1);
    assert_eq!(t.stat("core0.thread0.fetch.insns"), 1);
    t.run(1);
    assert_eq!(t.stat("core0.thread0.fetch.insns"), 2);
}

#[test]
fn icache_miss_waits_for_refill() {
    let ctx = ProgramContext::new()
        .with_code(CODE_BASE, vec![movi(1, 1)])
        .with_cold_line(CODE_BASE);
    let mut t = TestCore::new(&single_thread_config(), vec![ctx]);
    let cycles = t.run_to_end(100);
    // The 2-cycle refill delays the first fetch by 2 cycles.
    assert_eq!(cycles, 1 + FILL + 2);
    assert_eq!(t.stat("core0.thread0.icache.misses"), 1);
    assert_eq!(t.reg(0, 1), 1);
}

#[test]
fn itlb_miss_walks_before_fetching() {
    let ctx = ProgramContext::new().with_code(CODE_BASE, vec![movi(1, 1)]);
    let mut t = TestCore::new(&single_thread_config(), vec![ctx]);
    let _ = t.core.itlb_mut().flush_all();
    let cycles = t.run_to_end(100);
    // Four walk levels, one cycle each; fetch retries the cycle the walk completes.
    assert_eq!(cycles, 1 + FILL + 4);
    assert_eq!(t.stat("core0.thread0.itlb.misses"), 1);
    assert!(t.core.itlb().probe(atomsim_core::common::VirtAddr::new(CODE_BASE), 0));
}
