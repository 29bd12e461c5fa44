//! Store Buffer for deferred memory writes.
//!
//! Stores are not written to memory until their instruction commits. Each
//! thread owns one store buffer, which provides:
//! 1. **Allocation:** An entry is created when a store computes its address at issue.
//! 2. **Forwarding:** Younger loads of the same thread read a fully covering older store.
//! 3. **Drain:** Entries of a committing group are handed to the context in order.
//! 4. **Squash:** Entries of squashed ops are discarded.

use crate::common::{PhysAddr, VirtAddr};

/// Result of store-to-load forwarding check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ForwardResult {
    /// Store fully covers the load; use the forwarded data.
    Hit(u64),
    /// No overlap with any pending store; safe to read from memory.
    Miss,
    /// Partial overlap; the load must retry once the store has drained.
    Stall,
}

/// A single entry in the store buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StoreBufferEntry {
    /// Owning op.
    pub uuid: u64,
    /// Virtual address of the store.
    pub vaddr: VirtAddr,
    /// Translated address.
    pub paddr: PhysAddr,
    /// Data to store, right-aligned.
    pub data: u64,
    /// Bytes touched within the aligned 8-byte word.
    pub bytemask: u8,
    /// Access size in bytes.
    pub size: u8,
    /// Store targets device memory.
    pub mmio: bool,
}

impl StoreBufferEntry {
    /// Creates an entry, deriving the byte mask from address and size.
    pub fn new(
        uuid: u64,
        vaddr: VirtAddr,
        paddr: PhysAddr,
        data: u64,
        size: u8,
        mmio: bool,
    ) -> Self {
        let ones = if size >= 8 { 0xff } else { (1u16 << size) as u8 - 1 };
        Self {
            uuid,
            vaddr,
            paddr,
            data,
            bytemask: ones << (vaddr.val() & 7),
            size,
            mmio,
        }
    }

    fn span(&self) -> (u64, u64) {
        let start = self.vaddr.val();
        (start, start + u64::from(self.size))
    }
}

/// Store buffer: FIFO of stores in program order.
#[derive(Clone, Debug)]
pub struct StoreBuffer {
    entries: Vec<StoreBufferEntry>,
    capacity: usize,
}

impl StoreBuffer {
    /// Creates a new store buffer with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Returns the capacity.
    #[inline]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of occupied entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the store buffer is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of free slots.
    #[inline]
    pub fn free_slots(&self) -> usize {
        self.capacity.saturating_sub(self.entries.len())
    }

    /// Appends a store.
    ///
    /// # Errors
    ///
    /// Returns the entry back when the buffer is full.
    pub fn allocate(&mut self, entry: StoreBufferEntry) -> Result<(), StoreBufferEntry> {
        if self.entries.len() >= self.capacity {
            return Err(entry);
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Store-to-load forwarding for a `size`-byte load at `vaddr`.
    ///
    /// The newest overlapping store decides the outcome.
    pub fn forward_load(&self, vaddr: VirtAddr, size: u8) -> ForwardResult {
        let load_start = vaddr.val();
        let load_end = load_start + u64::from(size);

        for entry in self.entries.iter().rev() {
            let (store_start, store_end) = entry.span();
            if load_start >= store_end || load_end <= store_start {
                continue;
            }
            if store_start <= load_start && store_end >= load_end {
                let shifted = entry.data >> ((load_start - store_start) * 8);
                let mask = if size >= 8 {
                    u64::MAX
                } else {
                    (1u64 << (u64::from(size) * 8)) - 1
                };
                return ForwardResult::Hit(shifted & mask);
            }
            return ForwardResult::Stall;
        }
        ForwardResult::Miss
    }

    /// Removes and returns the oldest entries owned by ops up to and including `uuid`.
    pub fn drain_through(&mut self, uuid: u64) -> Vec<StoreBufferEntry> {
        let n = self.entries.iter().take_while(|e| e.uuid <= uuid).count();
        self.entries.drain(..n).collect()
    }

    /// Discards entries of ops younger than `uuid`.
    pub fn flush_after(&mut self, uuid: u64) {
        self.entries.retain(|e| e.uuid <= uuid);
    }

    /// Discards every entry.
    pub fn flush_all(&mut self) {
        self.entries.clear();
    }

    /// Entries oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &StoreBufferEntry> + '_ {
        self.entries.iter()
    }
}
