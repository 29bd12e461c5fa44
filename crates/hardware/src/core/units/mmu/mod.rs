//! Memory Management Unit (MMU).
//!
//! The core-level pair of TLBs shared by every hardware thread, plus the
//! page-walk timer threads use while a TLB miss is being serviced.

/// Page-walk timing.
pub mod ptw;

/// Translation Lookaside Buffer (TLB).
pub mod tlb;

use crate::common::VirtAddr;

pub use self::ptw::PageWalk;
pub use self::tlb::{InsertOutcome, Tlb, TlbTag};

/// Data and instruction TLBs of one core.
#[derive(Clone, Debug)]
pub struct Mmu {
    /// Data TLB for load/store address translation.
    pub dtlb: Tlb,
    /// Instruction TLB for fetch address translation.
    pub itlb: Tlb,
}

impl Mmu {
    /// Creates both TLBs empty.
    pub fn new(dtlb_size: usize, itlb_size: usize) -> Self {
        Self {
            dtlb: Tlb::new(dtlb_size),
            itlb: Tlb::new(itlb_size),
        }
    }

    /// Drops every translation of thread `tid` from both TLBs.
    ///
    /// Returns the number of entries dropped from the DTLB and ITLB.
    pub fn flush_thread(&mut self, tid: usize) -> (usize, usize) {
        (self.dtlb.flush_thread(tid), self.itlb.flush_thread(tid))
    }

    /// Drops one page of thread `tid` from both TLBs.
    pub fn flush_virt(&mut self, vaddr: VirtAddr, tid: usize) {
        let d = self.dtlb.flush_virt(vaddr, tid);
        let i = self.itlb.flush_virt(vaddr, tid);
        tracing::trace!(thread = tid, vaddr = vaddr.val(), d, i, "tlb flush page");
    }
}
