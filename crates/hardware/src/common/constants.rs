//! Structural constants of the modelled core.
//!
//! Sizes that a configuration may change (queue depths, TLB capacity, widths)
//! live in [`crate::config`]; the values here are fixed by the shape of the
//! hardware and are not configurable.

/// Page size in bytes (4KB).
pub const PAGE_SIZE: u64 = 4096;

/// Number of bits to shift to convert between bytes and pages.
pub const PAGE_SHIFT: u64 = 12;

/// Mask for extracting the page offset from an address.
pub const PAGE_OFFSET_MASK: u64 = PAGE_SIZE - 1;

/// Width of the virtual page number stored in a TLB tag (48-bit VA, 4 KiB pages).
pub const TLB_VPN_BITS: u32 = 36;

/// Width of the thread id stored above the VPN in a TLB tag.
pub const TLB_THREAD_BITS: u32 = 4;

/// Maximum number of hardware threads one core can host (bounded by the TLB tag).
pub const MAX_THREADS: usize = 1 << TLB_THREAD_BITS;

/// Number of architectural (plus microcode temporary) registers per thread.
pub const REG_COUNT: usize = 64;

/// Maximum number of micro-ops grouped into one op.
pub const MAX_UOPS_PER_OP: usize = 4;

/// Maximum number of register reads plus writes one op may perform.
pub const MAX_REG_ACCESS_PER_OP: usize = 16;

/// Number of unresolved branches a thread may have in flight.
pub const MAX_BRANCH_IN_FLIGHT: u8 = 1;

/// Cycles between a value entering the forward buffer and it being transferred.
pub const FORWARDING_LATENCY: u64 = 1;
