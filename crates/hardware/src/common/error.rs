//! Fault and configuration error definitions.
//!
//! Two very different kinds of failure exist in the simulator:
//! 1. **Architectural faults:** raised by a simulated op (page faults, general
//!    protection, undefined opcodes). They are data: carried by the op down to
//!    commit and handed to the context's fault handler.
//! 2. **Configuration errors:** raised while building a core or a memory model.
//!    They are fatal and reported before the first cycle runs.
//!
//! Transient conditions (full queues, busy functional units, cache and TLB
//! misses) are not errors at all; stages simply retry on the next cycle.

use thiserror::Error;

use super::data::AccessType;

/// An architectural fault raised by an op.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum Fault {
    /// Translation failed for a data or instruction access.
    #[error("page fault ({access:?}) at {addr:#x}")]
    PageFault {
        /// Faulting virtual address.
        addr: u64,
        /// Access that triggered the walk.
        access: AccessType,
    },

    /// Protection violation reported by the context.
    #[error("general protection fault at {addr:#x}")]
    GeneralProtection {
        /// Faulting virtual address.
        addr: u64,
    },

    /// The decoder produced an instruction the core cannot execute.
    #[error("invalid opcode at pc {pc:#x}")]
    InvalidOpcode {
        /// Program counter of the instruction.
        pc: u64,
    },

    /// Integer division by zero.
    #[error("divide error at pc {pc:#x}")]
    DivideError {
        /// Program counter of the instruction.
        pc: u64,
    },
}

impl Fault {
    /// Address associated with the fault (faulting address or pc).
    pub const fn addr(&self) -> u64 {
        match *self {
            Self::PageFault { addr, .. } | Self::GeneralProtection { addr } => addr,
            Self::InvalidOpcode { pc } | Self::DivideError { pc } => pc,
        }
    }
}

/// Invalid configuration detected at initialization.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A structure size must be non-zero.
    #[error("{field} must be non-zero")]
    Zero {
        /// Offending configuration field.
        field: &'static str,
    },

    /// A structure size exceeds what the hardware can address.
    #[error("{field} = {value} exceeds the maximum of {max}")]
    TooLarge {
        /// Offending configuration field.
        field: &'static str,
        /// Value that was supplied.
        value: u64,
        /// Largest accepted value.
        max: u64,
    },

    /// A structure cannot hold the ops of one instruction.
    #[error("{field} = {value} is below the minimum of {min}")]
    TooSmall {
        /// Offending configuration field.
        field: &'static str,
        /// Value that was supplied.
        value: u64,
        /// Smallest accepted value.
        min: u64,
    },

    /// A geometry parameter must be a power of two.
    #[error("{field} = {value} is not a power of two")]
    NotPowerOfTwo {
        /// Offending configuration field.
        field: &'static str,
        /// Value that was supplied.
        value: u64,
    },

    /// The DRAM address layout does not fit the physical address width.
    #[error("DRAM geometry needs {needed} address bits but size only provides {available}")]
    AddressLayout {
        /// Bits required by the dimm/bank/rank/row/column fields.
        needed: u32,
        /// Bits available from the DRAM size.
        available: u32,
    },

    /// Number of contexts handed to the core differs from the thread count.
    #[error("core configured for {expected} threads but {given} contexts were supplied")]
    ContextCount {
        /// Configured thread count.
        expected: usize,
        /// Contexts supplied.
        given: usize,
    },

    /// Configuration text could not be parsed.
    #[error("malformed configuration: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}
