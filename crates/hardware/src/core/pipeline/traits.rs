//! Interfaces to the world outside the pipeline.
//!
//! The core models timing only. Everything architectural comes from a
//! per-thread [`Context`]: decoded instructions, address translation, memory
//! contents and the targets of fault and interrupt handlers. Timing of memory
//! comes from a [`LatencyOracle`] and branch direction guesses from a
//! [`BranchPredictor`]; both are re-exported here so the thread stages see
//! all of their collaborators in one place.

use crate::common::{AccessType, Fault, PhysAddr, VirtAddr};
use crate::core::pipeline::signals::Instruction;

pub use crate::core::units::bru::BranchPredictor;
pub use crate::soc::memory::controller::LatencyOracle;

/// Answer of [`Context::fetch_from_icache`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The line is resident; here is the instruction.
    Hit(Instruction),
    /// The line must be refilled first. The core waits the refill latency and asks again.
    Miss,
    /// The instruction cannot be fetched.
    Fault(Fault),
    /// The thread has no more instructions.
    Halt,
}

/// Side effect of a committed store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreEffect {
    /// Plain data write.
    Normal,
    /// The store hit code that may already be in flight.
    SelfModifying,
}

/// Architectural state of one hardware thread.
pub trait Context {
    /// Returns the instruction at `pc`, or why it cannot be returned yet.
    fn fetch_from_icache(&mut self, pc: VirtAddr) -> FetchOutcome;

    /// Translates `vaddr` for `access`.
    ///
    /// # Errors
    ///
    /// The architectural fault the access raises.
    fn translate(&mut self, vaddr: VirtAddr, access: AccessType) -> Result<PhysAddr, Fault>;

    /// Reads `size` bytes at `paddr`.
    fn load(&mut self, paddr: PhysAddr, size: u8) -> u64;

    /// Writes the low `size` bytes of `value` at `paddr`.
    fn store(&mut self, paddr: PhysAddr, value: u64, size: u8) -> StoreEffect;

    /// Returns true if `paddr` is device memory.
    fn is_mmio(&self, paddr: PhysAddr) -> bool;

    /// Takes `fault` raised by the instruction at `pc`; returns the handler pc.
    fn handle_fault(&mut self, fault: Fault, pc: u64) -> u64;

    /// Takes a pending interrupt before `next_pc`; returns the handler pc.
    fn handle_interrupt(&mut self, next_pc: u64) -> u64;
}
