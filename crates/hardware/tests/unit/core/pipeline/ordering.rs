//! Retirement order and queue ownership over random programs.

use std::collections::HashSet;

use proptest::prelude::*;

use atomsim_core::common::Reg;
use atomsim_core::config::Config;
use atomsim_core::core::pipeline::op::{OpId, OpState};
use atomsim_core::core::pipeline::signals::{Instruction, Opcode};

use crate::common::builder::{addi, alu, branch_if, load, movi, nop, store};
use crate::common::harness::{CODE_BASE, DATA_BASE, ProgramContext, TestCore};

/// Holds `DATA_BASE`; never written by generated code.
const BASE_REG: Reg = 20;

#[derive(Clone, Debug)]
enum Step {
    Mov(Reg, u64),
    AddImm(Reg, Reg, u64),
    Mul(Reg, Reg, Reg),
    Load(Reg, u64),
    Store(Reg, u64),
    SkipNextIf(Reg),
    Nop,
}

fn reg() -> impl Strategy<Value = Reg> {
    1..8u8
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        (reg(), any::<u16>()).prop_map(|(rd, v)| Step::Mov(rd, u64::from(v))),
        (reg(), reg(), 0..16u64).prop_map(|(rd, ra, imm)| Step::AddImm(rd, ra, imm)),
        (reg(), reg(), reg()).prop_map(|(rd, ra, rb)| Step::Mul(rd, ra, rb)),
        (reg(), 0..4u64).prop_map(|(rd, slot)| Step::Load(rd, slot * 8)),
        (reg(), 0..4u64).prop_map(|(rc, slot)| Step::Store(rc, slot * 8)),
        reg().prop_map(Step::SkipNextIf),
        Just(Step::Nop),
    ]
}

fn assemble(steps: &[Step]) -> Vec<Instruction> {
    steps
        .iter()
        .enumerate()
        .map(|(i, step)| match *step {
            Step::Mov(rd, v) => movi(rd, v),
            Step::AddImm(rd, ra, imm) => addi(rd, ra, imm),
            Step::Mul(rd, ra, rb) => alu(Opcode::Mul, rd, ra, rb),
            Step::Load(rd, off) => load(rd, BASE_REG, off, 8),
            Step::Store(rc, off) => store(rc, BASE_REG, off, 8),
            Step::SkipNextIf(ra) => branch_if(ra, CODE_BASE + 4 * (i as u64 + 2)),
            Step::Nop => nop(),
        })
        .collect()
}

/// Checks one cycle's snapshot of thread `tid`.
fn check_thread(t: &TestCore, tid: usize, committed_before: u64) -> Result<u64, TestCaseError> {
    let thread = t.core.thread(tid);
    let committed = thread.last_committed();
    prop_assert!(committed >= committed_before, "retired {committed} after {committed_before}");
    for (id, op) in thread.ops().live() {
        prop_assert!(op.uuid > committed, "op {id:?} uuid {} left behind {committed}", op.uuid);
    }

    let fetched: Vec<OpId> =
        t.core.fetch_queue().filter(|e| e.thread == tid).map(|e| e.op).collect();
    let dispatched: Vec<OpId> = thread.dispatch_queue().collect();
    let written: Vec<OpId> = thread.commit_buffer().collect();

    let mut seen = HashSet::new();
    for id in fetched.iter().chain(&dispatched).chain(&written) {
        prop_assert!(seen.insert(*id), "op {id:?} queued twice in thread {tid}");
    }
    for id in &fetched {
        prop_assert_eq!(thread.ops()[*id].state(), OpState::Fetched);
    }
    for id in &dispatched {
        prop_assert_eq!(thread.ops()[*id].state(), OpState::Dispatched);
    }
    for id in &written {
        prop_assert_eq!(thread.ops()[*id].state(), OpState::ReadyToWriteback);
    }
    Ok(committed)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn random_programs_retire_in_order(
        first in prop::collection::vec(step(), 1..24),
        second in prop::collection::vec(step(), 1..24),
    ) {
        let contexts = [&first, &second]
            .into_iter()
            .map(|steps| ProgramContext::new().with_code(CODE_BASE, assemble(steps)))
            .collect();
        let mut t = TestCore::new(&Config::default(), contexts);
        for tid in 0..2 {
            t.set_reg(tid, BASE_REG, DATA_BASE);
        }

        let mut committed = [0; 2];
        for _ in 0..4000 {
            if !t.core.runcycle() {
                break;
            }
            for (tid, last) in committed.iter_mut().enumerate() {
                *last = check_thread(&t, tid, *last)?;
            }
        }
        prop_assert!(t.core.is_done(), "not done: {:?}", t.core);
    }
}
