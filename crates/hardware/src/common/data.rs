//! Memory Access Types.
//!
//! Accesses are classified so that translation can raise the right fault and
//! the latency oracle can charge the right row-buffer latency.

/// Type of memory access operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AccessType {
    /// Instruction fetch (ITLB, icache refill).
    Fetch,
    /// Data read issued by a load micro-op.
    Read,
    /// Data write issued by a store micro-op.
    Write,
}

impl AccessType {
    /// Returns true for accesses that modify memory.
    #[inline]
    pub const fn is_write(self) -> bool {
        matches!(self, Self::Write)
    }
}
