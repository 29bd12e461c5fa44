//! Page-walk timer.
//!
//! A TLB miss starts a walk that costs one cycle per page-table level. The
//! walker does not read page tables itself; when the last level finishes the
//! thread asks its context for the translation and fills the TLB.

use crate::common::VirtAddr;

/// An in-progress page walk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageWalk {
    vaddr: VirtAddr,
    levels_left: u8,
}

impl PageWalk {
    /// Starts a walk for `vaddr` that takes `levels` cycles.
    pub const fn start(vaddr: VirtAddr, levels: u8) -> Self {
        Self {
            vaddr,
            levels_left: levels,
        }
    }

    /// Address being translated.
    pub const fn vaddr(&self) -> VirtAddr {
        self.vaddr
    }

    /// Levels still to walk.
    pub const fn levels_left(&self) -> u8 {
        self.levels_left
    }

    /// Walks one level. Returns true once every level has been walked.
    pub const fn tick(&mut self) -> bool {
        self.levels_left = self.levels_left.saturating_sub(1);
        self.levels_left == 0
    }
}
