//! Functional units and issue ports.
//!
//! The core has six functional units and two issue ports, shared by every
//! hardware thread. Each opcode carries a static description of where it may
//! execute and for how long:
//! 1. **Latency:** Cycles from issue to result, assuming an ideal bypass.
//! 2. **Ports:** Issue ports the micro-op may leave through.
//! 3. **Pipelining:** Non-pipelined micro-ops hold their unit until they complete.
//! 4. **Units:** Functional units able to execute the micro-op.

use crate::core::pipeline::signals::Opcode;

/// Integer ALU 0.
pub const FU_ALU0: u8 = 1 << 0;
/// Integer ALU 1.
pub const FU_ALU1: u8 = 1 << 1;
/// Floating-point / SIMD / multiply-divide unit 0.
pub const FU_FPU0: u8 = 1 << 2;
/// Floating-point / SIMD / multiply-divide unit 1.
pub const FU_FPU1: u8 = 1 << 3;
/// Address generation unit 0.
pub const FU_AGU0: u8 = 1 << 4;
/// Address generation unit 1.
pub const FU_AGU1: u8 = 1 << 5;

/// Number of functional units.
pub const FU_COUNT: usize = 6;
/// Every functional unit.
pub const FU_ALL: u8 = (1 << FU_COUNT) - 1;

/// Unit names, indexed by bit position.
pub const FU_NAMES: [&str; FU_COUNT] = ["alu0", "alu1", "fp0", "fp1", "agu0", "agu1"];

/// Issue port 0.
pub const PORT_0: u8 = 1 << 0;
/// Issue port 1.
pub const PORT_1: u8 = 1 << 1;
/// Both issue ports.
pub const PORT_ALL: u8 = PORT_0 | PORT_1;

const ANYALU: u8 = FU_ALU0 | FU_ALU1;
const ANYLDU: u8 = FU_AGU0 | FU_AGU1;
const ANYFPU: u8 = FU_FPU0 | FU_FPU1;
const ANYFU: u8 = ANYALU | ANYLDU | ANYFPU;

/// Static scheduling properties of one opcode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FuInfo {
    /// Cycles from issue to result.
    pub latency: u8,
    /// Allowed issue ports.
    pub ports: u8,
    /// Whether a new micro-op may enter the unit the next cycle.
    pub pipelined: bool,
    /// Allowed functional units.
    pub units: u8,
}

const fn info(latency: u8, ports: u8, pipelined: bool, units: u8) -> FuInfo {
    FuInfo {
        latency,
        ports,
        pipelined,
        units,
    }
}

impl Opcode {
    /// Scheduling properties of this opcode.
    pub const fn fu_info(self) -> FuInfo {
        match self {
            Self::Nop | Self::Mov => info(1, PORT_ALL, true, ANYFU),
            Self::And | Self::Or | Self::Xor | Self::Add | Self::Sub => {
                info(1, PORT_ALL, true, ANYFU)
            }
            Self::Shl | Self::Shr | Self::Sar | Self::Rotl => info(1, PORT_0, true, ANYALU),
            Self::Mul => info(4, PORT_0, true, ANYFPU),
            Self::Div | Self::Rem => info(32, PORT_0, false, ANYFPU),
            Self::Ld | Self::St | Self::Mf => info(1, PORT_0, true, ANYLDU),
            Self::Br | Self::Bru | Self::Jmp => info(1, PORT_1, true, ANYALU),
            Self::FAdd | Self::FMul => info(6, PORT_1, true, ANYFPU),
            Self::FDiv | Self::FSqrt => info(6, PORT_1, false, ANYFPU),
            Self::VAdd => info(1, PORT_1, true, ANYFPU),
            Self::VMul => info(4, PORT_1, false, ANYFPU),
            Self::Ast => info(4, PORT_0, false, ANYALU),
            Self::Pause => info(1, PORT_0, true, ANYALU),
        }
    }
}

/// Lowest set bit of `mask`, if any.
#[inline]
pub const fn lowest_bit(mask: u8) -> Option<u8> {
    if mask == 0 {
        None
    } else {
        Some(mask & mask.wrapping_neg())
    }
}

/// Names of the units set in `mask`.
pub fn unit_names(mask: u8) -> impl Iterator<Item = &'static str> {
    FU_NAMES
        .iter()
        .enumerate()
        .filter(move |(i, _)| mask & (1 << i) != 0)
        .map(|(_, name)| *name)
}
