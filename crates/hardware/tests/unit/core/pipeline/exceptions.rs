//! Faults travel with their op and are raised in program order at commit.

use pretty_assertions::assert_eq;

use atomsim_core::common::{AccessType, Fault};
use atomsim_core::core::pipeline::signals::{Instruction, Opcode};

use crate::common::builder::{alu, load, movi, store, undecodable};
use crate::common::harness::{
    CODE_BASE, FAULT_HANDLER, ProgramContext, TestCore, single_thread_config,
};

const BAD_PAGE: u64 = 0x9000;

fn with_handler(code: Vec<Instruction>) -> ProgramContext {
    ProgramContext::new()
        .with_code(CODE_BASE, code)
        .with_code(FAULT_HANDLER, vec![movi(3, 3)])
}

#[test]
fn load_page_fault_enters_handler() {
    let ctx = with_handler(vec![movi(1, BAD_PAGE), load(2, 1, 0, 8), movi(4, 4)])
        .with_faulting_page(BAD_PAGE);
    let mut t = TestCore::new(&single_thread_config(), vec![ctx]);
    let _ = t.run_to_end(200);

    assert_eq!(
        t.ctx(0).faults,
        [(
            Fault::PageFault {
                addr: BAD_PAGE,
                access: AccessType::Read
            },
            CODE_BASE + 4
        )]
    );
    assert_eq!(t.reg(0, 1), BAD_PAGE);
    assert_eq!(t.reg(0, 2), 0);
    assert_eq!(t.reg(0, 4), 0);
    assert_eq!(t.reg(0, 3), 3);
    assert_eq!(t.stat("core0.thread0.exceptions"), 1);
    assert_eq!(t.stat("core0.thread0.dtlb.misses"), 1);
}

#[test]
fn faulting_store_never_reaches_memory() {
    let ctx = with_handler(vec![movi(1, BAD_PAGE), movi(2, 0x55), store(2, 1, 0, 8)])
        .with_faulting_page(BAD_PAGE);
    let mut t = TestCore::new(&single_thread_config(), vec![ctx]);
    let _ = t.run_to_end(200);

    assert!(t.ctx(0).stores.is_empty());
    assert_eq!(
        t.ctx(0).faults[0].0,
        Fault::PageFault {
            addr: BAD_PAGE,
            access: AccessType::Write
        }
    );
}

#[test]
fn undecodable_instruction_raises_invalid_opcode() {
    let ctx = with_handler(vec![movi(1, 1), undecodable(), movi(2, 2)]);
    let mut t = TestCore::new(&single_thread_config(), vec![ctx]);
    let _ = t.run_to_end(200);

    let pc = CODE_BASE + 4;
    assert_eq!(t.ctx(0).faults, [(Fault::InvalidOpcode { pc }, pc)]);
    assert_eq!(t.reg(0, 1), 1);
    assert_eq!(t.reg(0, 2), 0);
    assert_eq!(t.reg(0, 3), 3);
}

#[test]
fn divide_error_discards_younger_ops() {
    let ctx = with_handler(vec![alu(Opcode::Div, 1, 10, 11), movi(2, 2), movi(4, 4)]);
    let mut t = TestCore::new(&single_thread_config(), vec![ctx]);
    t.set_reg(0, 10, 9);
    let _ = t.run_to_end(200);

    assert_eq!(t.ctx(0).faults, [(Fault::DivideError { pc: CODE_BASE }, CODE_BASE)]);
    assert_eq!((t.reg(0, 1), t.reg(0, 2), t.reg(0, 4)), (0, 0, 0));
    assert_eq!(t.reg(0, 3), 3);
    assert!(t.core.thread(0).ops().live().next().is_none());
}

#[test]
fn older_instructions_commit_before_the_fault() {
    let ctx = with_handler(vec![
        movi(5, 5),
        movi(6, 6),
        movi(1, BAD_PAGE),
        load(2, 1, 0, 8),
    ])
    .with_faulting_page(BAD_PAGE);
    let mut t = TestCore::new(&single_thread_config(), vec![ctx]);
    let _ = t.run_to_end(200);

    assert_eq!((t.reg(0, 5), t.reg(0, 6)), (5, 6));
    assert_eq!(t.stat("core0.thread0.commit.insns"), 4);
    assert_eq!(t.ctx(0).faults.len(), 1);
}
