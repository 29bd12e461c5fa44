//! Translation Lookaside Buffer (TLB).
//!
//! A fully associative set of page tags shared by every hardware thread of a
//! core. A tag packs the virtual page number (36 bits) with the owning thread
//! id above it, so threads never hit on each other's translations and can be
//! flushed independently.
//!
//! The TLB only answers "is this page resident"; the physical address itself
//! comes from the thread's context once the probe hits or the walk finishes.
//!
//! Replacement: the first free slot, otherwise the slot under a round-robin
//! pointer that advances on every eviction.

use std::collections::HashMap;

use crate::common::constants::{TLB_THREAD_BITS, TLB_VPN_BITS};
use crate::common::{PAGE_SHIFT, VirtAddr};

const VPN_MASK: u64 = (1 << TLB_VPN_BITS) - 1;
const THREAD_MASK: u64 = (1 << TLB_THREAD_BITS) - 1;

/// Packed tag of one TLB slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TlbTag(u64);

impl TlbTag {
    /// Builds the tag for `vaddr` as seen by thread `tid`.
    pub const fn new(vaddr: VirtAddr, tid: usize) -> Self {
        let vpn = (vaddr.val() >> PAGE_SHIFT) & VPN_MASK;
        Self(vpn | ((tid as u64 & THREAD_MASK) << TLB_VPN_BITS))
    }

    /// Virtual page number part of the tag.
    pub const fn vpn(self) -> u64 {
        self.0 & VPN_MASK
    }

    /// Thread id part of the tag.
    pub const fn thread(self) -> usize {
        (self.0 >> TLB_VPN_BITS) as usize
    }

    /// Raw packed value.
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Result of [`Tlb::insert`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The tag went into a free slot.
    Filled {
        /// Slot used.
        slot: usize,
    },
    /// The tag replaced a resident tag.
    Evicted {
        /// Slot used.
        slot: usize,
        /// Tag that was replaced.
        victim: TlbTag,
    },
    /// The tag was already resident; nothing changed.
    AlreadyPresent {
        /// Slot holding the tag.
        slot: usize,
    },
}

/// Translation Lookaside Buffer structure.
#[derive(Clone, Debug)]
pub struct Tlb {
    slots: Vec<Option<TlbTag>>,
    index: HashMap<TlbTag, usize>,
    victim: usize,
}

impl Tlb {
    /// Creates an empty TLB with `capacity` slots.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
            index: HashMap::with_capacity(capacity),
            victim: 0,
        }
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of resident tags.
    pub fn occupancy(&self) -> usize {
        self.index.len()
    }

    /// Returns true if `vaddr`'s page is resident for thread `tid`.
    #[inline]
    pub fn probe(&self, vaddr: VirtAddr, tid: usize) -> bool {
        self.index.contains_key(&TlbTag::new(vaddr, tid))
    }

    /// Makes `vaddr`'s page resident for thread `tid`.
    pub fn insert(&mut self, vaddr: VirtAddr, tid: usize) -> InsertOutcome {
        let tag = TlbTag::new(vaddr, tid);
        if let Some(&slot) = self.index.get(&tag) {
            return InsertOutcome::AlreadyPresent { slot };
        }
        if self.slots.is_empty() {
            // Degenerate zero-capacity TLB never holds anything.
            return InsertOutcome::Filled { slot: 0 };
        }

        let outcome = match self.slots.iter().position(Option::is_none) {
            Some(slot) => {
                self.slots[slot] = Some(tag);
                InsertOutcome::Filled { slot }
            }
            None => {
                let slot = self.victim;
                self.victim = (self.victim + 1) % self.slots.len();
                let old = self.slots[slot].replace(tag);
                match old {
                    Some(victim) => {
                        let _ = self.index.remove(&victim);
                        InsertOutcome::Evicted { slot, victim }
                    }
                    None => InsertOutcome::Filled { slot },
                }
            }
        };
        let slot = match outcome {
            InsertOutcome::Filled { slot }
            | InsertOutcome::Evicted { slot, .. }
            | InsertOutcome::AlreadyPresent { slot } => slot,
        };
        let _ = self.index.insert(tag, slot);
        tracing::trace!(
            vpn = tag.vpn(),
            thread = tag.thread(),
            slot,
            ?outcome,
            "tlb insert"
        );
        outcome
    }

    /// Drops every tag. Returns how many were resident.
    pub fn flush_all(&mut self) -> usize {
        let n = self.index.len();
        self.slots.fill(None);
        self.index.clear();
        self.victim = 0;
        n
    }

    /// Drops every tag owned by thread `tid`. Returns how many were dropped.
    pub fn flush_thread(&mut self, tid: usize) -> usize {
        let tid = tid & THREAD_MASK as usize;
        let mut n = 0;
        for slot in &mut self.slots {
            if slot.is_some_and(|t| t.thread() == tid) {
                if let Some(tag) = slot.take() {
                    let _ = self.index.remove(&tag);
                    n += 1;
                }
            }
        }
        n
    }

    /// Drops the tag of `vaddr`'s page for thread `tid`. Returns true if it was resident.
    pub fn flush_virt(&mut self, vaddr: VirtAddr, tid: usize) -> bool {
        let tag = TlbTag::new(vaddr, tid);
        match self.index.remove(&tag) {
            Some(slot) => {
                self.slots[slot] = None;
                true
            }
            None => false,
        }
    }
}
