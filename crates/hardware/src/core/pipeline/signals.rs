//! Micro-ops and decoded instructions.
//!
//! This module defines what the context hands the core and what ops carry:
//! 1. **Opcodes:** The closed set of micro-op operations the core can execute.
//! 2. **Micro-ops:** One operation with its registers, immediate and access size.
//! 3. **Instructions:** The micro-ops of one architectural instruction plus its length.
//!
//! Operand convention: `ra` is the first source, `rb` the second source
//! (falling back to the immediate when absent), `rc` a third source used by
//! stores for the data register. Loads and stores address `ra + imm`.

use crate::common::Reg;
use crate::core::units::bru::BranchKind;

/// Micro-op operation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// No operation.
    #[default]
    Nop,
    /// `rd = b`.
    Mov,
    /// Bitwise AND.
    And,
    /// Bitwise OR.
    Or,
    /// Bitwise XOR.
    Xor,
    /// Wrapping add.
    Add,
    /// Wrapping subtract.
    Sub,
    /// Shift left.
    Shl,
    /// Logical shift right.
    Shr,
    /// Arithmetic shift right.
    Sar,
    /// Rotate left.
    Rotl,
    /// Wrapping multiply (low 64 bits).
    Mul,
    /// Unsigned divide. Non-pipelined.
    Div,
    /// Unsigned remainder. Non-pipelined.
    Rem,
    /// Load `size` bytes from `ra + imm`.
    Ld,
    /// Store `size` bytes of `rc` to `ra + imm`.
    St,
    /// Memory fence.
    Mf,
    /// Conditional branch to `imm`, taken when `ra != 0`.
    Br,
    /// Unconditional branch to `imm`.
    Bru,
    /// Indirect jump to `ra`.
    Jmp,
    /// Double-precision add.
    FAdd,
    /// Double-precision multiply.
    FMul,
    /// Double-precision divide. Non-pipelined.
    FDiv,
    /// Double-precision square root. Non-pipelined.
    FSqrt,
    /// Packed 2x32-bit add.
    VAdd,
    /// Packed 2x32-bit multiply. Non-pipelined.
    VMul,
    /// Microcode assist: serializes the thread once committed.
    Ast,
    /// Spin-wait hint: stalls fetch for a while once committed.
    Pause,
}

impl Opcode {
    /// Returns true for loads and stores.
    #[inline]
    pub const fn is_mem(self) -> bool {
        matches!(self, Self::Ld | Self::St)
    }

    /// Returns true for control-flow micro-ops.
    #[inline]
    pub const fn branch_kind(self) -> Option<BranchKind> {
        match self {
            Self::Br => Some(BranchKind::Conditional),
            Self::Bru => Some(BranchKind::Direct),
            Self::Jmp => Some(BranchKind::Indirect),
            _ => None,
        }
    }
}

/// One micro-op.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MicroOp {
    /// Operation.
    pub opcode: Opcode,
    /// Destination register.
    pub rd: Option<Reg>,
    /// First source.
    pub ra: Option<Reg>,
    /// Second source.
    pub rb: Option<Reg>,
    /// Third source (store data).
    pub rc: Option<Reg>,
    /// Immediate operand, address offset or branch target.
    pub imm: u64,
    /// Access size in bytes for loads and stores.
    pub size: u8,
}

impl MicroOp {
    /// Creates a micro-op with no registers.
    pub const fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            rd: None,
            ra: None,
            rb: None,
            rc: None,
            imm: 0,
            size: 8,
        }
    }

    /// Sets the destination register.
    #[must_use]
    pub const fn rd(mut self, reg: Reg) -> Self {
        self.rd = Some(reg);
        self
    }

    /// Sets the first source register.
    #[must_use]
    pub const fn ra(mut self, reg: Reg) -> Self {
        self.ra = Some(reg);
        self
    }

    /// Sets the second source register.
    #[must_use]
    pub const fn rb(mut self, reg: Reg) -> Self {
        self.rb = Some(reg);
        self
    }

    /// Sets the third source register.
    #[must_use]
    pub const fn rc(mut self, reg: Reg) -> Self {
        self.rc = Some(reg);
        self
    }

    /// Sets the immediate.
    #[must_use]
    pub const fn imm(mut self, imm: u64) -> Self {
        self.imm = imm;
        self
    }

    /// Sets the access size in bytes.
    #[must_use]
    pub const fn size(mut self, size: u8) -> Self {
        self.size = size;
        self
    }

    /// Source registers in operand order.
    pub fn sources(&self) -> impl Iterator<Item = Reg> + '_ {
        [self.ra, self.rb, self.rc].into_iter().flatten()
    }

    /// Number of register reads plus writes.
    pub fn reg_accesses(&self) -> usize {
        self.sources().count() + usize::from(self.rd.is_some())
    }
}

/// Source operand values captured at issue.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Operands {
    /// Value of `ra`, or zero.
    pub a: u64,
    /// Value of `rb`, or the immediate.
    pub b: u64,
    /// Value of `rc`, or zero.
    pub c: u64,
}

/// What a micro-op does once its operands are known.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Produces a register value (or nothing for `None`).
    Value(Option<u64>),
    /// Control transfer resolved to the given next pc.
    Branch {
        /// Whether the branch was taken.
        taken: bool,
        /// Resolved next pc.
        next_pc: u64,
    },
    /// Memory access at the given virtual address.
    Mem(u64),
    /// Division by zero.
    DivideByZero,
}

impl MicroOp {
    /// Evaluates the micro-op. `fallthrough` is the pc of the next instruction.
    pub fn evaluate(&self, ops: Operands, fallthrough: u64) -> Effect {
        let Operands { a, b, .. } = ops;
        let value = match self.opcode {
            Opcode::Nop | Opcode::Mf | Opcode::Ast | Opcode::Pause => None,
            Opcode::Mov => Some(b),
            Opcode::And => Some(a & b),
            Opcode::Or => Some(a | b),
            Opcode::Xor => Some(a ^ b),
            Opcode::Add => Some(a.wrapping_add(b)),
            Opcode::Sub => Some(a.wrapping_sub(b)),
            Opcode::Shl => Some(a << (b & 63)),
            Opcode::Shr => Some(a >> (b & 63)),
            Opcode::Sar => Some(((a as i64) >> (b & 63)) as u64),
            Opcode::Rotl => Some(a.rotate_left((b & 63) as u32)),
            Opcode::Mul => Some(a.wrapping_mul(b)),
            Opcode::Div | Opcode::Rem if b == 0 => return Effect::DivideByZero,
            Opcode::Div => Some(a / b),
            Opcode::Rem => Some(a % b),
            Opcode::Ld | Opcode::St => return Effect::Mem(a.wrapping_add(self.imm)),
            Opcode::Br => {
                let taken = a != 0;
                return Effect::Branch {
                    taken,
                    next_pc: if taken { self.imm } else { fallthrough },
                };
            }
            Opcode::Bru => {
                return Effect::Branch {
                    taken: true,
                    next_pc: self.imm,
                };
            }
            Opcode::Jmp => return Effect::Branch { taken: true, next_pc: a },
            Opcode::FAdd => Some((f64::from_bits(a) + f64::from_bits(b)).to_bits()),
            Opcode::FMul => Some((f64::from_bits(a) * f64::from_bits(b)).to_bits()),
            Opcode::FDiv => Some((f64::from_bits(a) / f64::from_bits(b)).to_bits()),
            Opcode::FSqrt => Some(f64::from_bits(a).sqrt().to_bits()),
            Opcode::VAdd => Some(lanes(a, b, u32::wrapping_add)),
            Opcode::VMul => Some(lanes(a, b, u32::wrapping_mul)),
        };
        Effect::Value(value)
    }
}

fn lanes(a: u64, b: u64, f: fn(u32, u32) -> u32) -> u64 {
    let lo = f(a as u32, b as u32);
    let hi = f((a >> 32) as u32, (b >> 32) as u32);
    (u64::from(hi) << 32) | u64::from(lo)
}

/// A decoded architectural instruction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Instruction {
    /// Encoded length in bytes.
    pub len: u8,
    /// Micro-ops in program order.
    pub uops: Vec<MicroOp>,
}

impl Instruction {
    /// Creates an instruction from its micro-ops.
    pub const fn new(len: u8, uops: Vec<MicroOp>) -> Self {
        Self { len, uops }
    }

    /// Kind of the control-flow micro-op, if the instruction has one.
    pub fn branch_kind(&self) -> Option<BranchKind> {
        self.uops.iter().find_map(|u| u.opcode.branch_kind())
    }
}
