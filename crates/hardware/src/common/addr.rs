//! Physical and Virtual Address types.
//!
//! Strong types keep the two address spaces apart at compile time. Virtual
//! addresses are what ops compute and what the TLBs are tagged with; physical
//! addresses are what the context returns from translation and what the
//! latency oracle decomposes into DRAM coordinates.

use super::constants::{PAGE_OFFSET_MASK, PAGE_SHIFT};

/// A virtual address as produced by fetch or address generation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VirtAddr(pub u64);

/// A physical address, the result of translation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PhysAddr(pub u64);

impl VirtAddr {
    /// Creates a new virtual address from a raw 64-bit value.
    #[inline(always)]
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    /// Returns the raw 64-bit address value.
    #[inline(always)]
    pub const fn val(self) -> u64 {
        self.0
    }

    /// Virtual page number (address without the page offset bits).
    #[inline(always)]
    pub const fn page_number(self) -> u64 {
        self.0 >> PAGE_SHIFT
    }

    /// Address rounded down to its page boundary.
    #[inline(always)]
    pub const fn page_base(self) -> Self {
        Self(self.0 & !PAGE_OFFSET_MASK)
    }

    /// Byte offset within the 4 KiB page.
    #[inline(always)]
    pub const fn page_offset(self) -> u64 {
        self.0 & PAGE_OFFSET_MASK
    }
}

impl PhysAddr {
    /// Creates a new physical address from a raw 64-bit value.
    #[inline(always)]
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    /// Returns the raw 64-bit address value.
    #[inline(always)]
    pub const fn val(self) -> u64 {
        self.0
    }
}
