//! Frontend bundling.
//!
//! Splits the micro-ops of one decoded instruction into ops. An op closes
//! when it holds four micro-ops, when adding the next micro-op would exceed
//! sixteen register accesses, or right after a load or store (an op performs
//! at most one memory access, which is always its last micro-op). The first
//! op of the instruction is marked `som`, the last `eom`.
//!
//! Instructions the core cannot execute are rejected with
//! [`Fault::InvalidOpcode`]: no micro-ops, a register outside the register
//! file, a control-flow micro-op that is not the last one, or more ops than
//! one fetch can carry.

use crate::common::constants::{MAX_REG_ACCESS_PER_OP, MAX_UOPS_PER_OP, REG_COUNT};
use crate::common::Fault;
use crate::core::pipeline::signals::{Instruction, MicroOp};

/// Most ops a single instruction may occupy.
pub const MAX_OPS_PER_INSN: usize = 4;

/// Micro-ops of one op, before it has a pool slot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OpBundle {
    /// Micro-ops in program order.
    pub uops: Vec<MicroOp>,
    /// First op of the instruction.
    pub som: bool,
    /// Last op of the instruction.
    pub eom: bool,
}

/// Bundles `insn` at `pc` into at most `max_ops` ops.
///
/// # Errors
///
/// Returns [`Fault::InvalidOpcode`] when the instruction cannot be executed.
pub fn bundle(pc: u64, insn: &Instruction, max_ops: usize) -> Result<Vec<OpBundle>, Fault> {
    let invalid = Fault::InvalidOpcode { pc };
    let Some((_, body)) = insn.uops.split_last() else {
        return Err(invalid);
    };
    if body.iter().any(|u| u.opcode.branch_kind().is_some()) {
        return Err(invalid);
    }
    if insn.uops.iter().any(|u| !regs_valid(u)) {
        return Err(invalid);
    }

    let mut ops: Vec<OpBundle> = Vec::new();
    let mut current = OpBundle::default();
    let mut accesses = 0;
    for uop in &insn.uops {
        let n = uop.reg_accesses();
        if current.uops.len() == MAX_UOPS_PER_OP || accesses + n > MAX_REG_ACCESS_PER_OP {
            ops.push(std::mem::take(&mut current));
            accesses = 0;
        }
        current.uops.push(*uop);
        accesses += n;
        if uop.opcode.is_mem() {
            ops.push(std::mem::take(&mut current));
            accesses = 0;
        }
    }
    if !current.uops.is_empty() {
        ops.push(current);
    }

    if ops.len() > max_ops.min(MAX_OPS_PER_INSN) {
        return Err(invalid);
    }
    if let Some(first) = ops.first_mut() {
        first.som = true;
    }
    if let Some(last) = ops.last_mut() {
        last.eom = true;
    }
    Ok(ops)
}

fn regs_valid(uop: &MicroOp) -> bool {
    uop.sources()
        .chain(uop.rd)
        .all(|r| (r as usize) < REG_COUNT)
}
