//! Forward buffer (bypass network).
//!
//! A small fully associative buffer, shared by every thread of a core, that
//! holds recently produced register values keyed by register number. An
//! entry records which thread and which op produced it, so a consumer only
//! accepts it when the producer is still the register's current owner.
//!
//! Writing a register that is already present refreshes that entry; otherwise
//! the oldest entry is evicted when the buffer is full.

use std::collections::VecDeque;

use crate::common::Reg;
use crate::common::constants::FORWARDING_LATENCY;

/// One forwarded value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ForwardEntry {
    /// Destination register.
    pub reg: Reg,
    /// Produced value.
    pub value: u64,
    /// Producing thread.
    pub thread: usize,
    /// Producing op.
    pub uuid: u64,
    /// Cycle the value was written.
    pub written_at: u64,
}

impl ForwardEntry {
    /// Returns true once the value has propagated through the bypass.
    #[inline]
    pub const fn visible_at(&self, cycle: u64) -> bool {
        self.written_at + FORWARDING_LATENCY <= cycle
    }
}

/// Fully associative forward buffer with FIFO replacement.
#[derive(Clone, Debug)]
pub struct ForwardBuffer {
    entries: VecDeque<ForwardEntry>,
    capacity: usize,
}

impl ForwardBuffer {
    /// Creates an empty buffer with `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Publishes a value. Returns the entry evicted to make room, if any.
    pub fn write(&mut self, entry: ForwardEntry) -> Option<ForwardEntry> {
        if let Some(pos) = self.entries.iter().position(|e| e.reg == entry.reg) {
            let _ = self.entries.remove(pos);
        }
        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        if self.capacity > 0 {
            self.entries.push_back(entry);
        }
        evicted
    }

    /// Value of `reg` if it was produced by op `uuid` of `thread` and is
    /// visible in `cycle`.
    pub fn read(&self, reg: Reg, thread: usize, uuid: u64, cycle: u64) -> Option<u64> {
        self.lookup(reg)
            .filter(|e| e.thread == thread && e.uuid == uuid && e.visible_at(cycle))
            .map(|e| e.value)
    }

    /// Raw entry for `reg`, regardless of producer.
    pub fn lookup(&self, reg: Reg) -> Option<&ForwardEntry> {
        self.entries.iter().find(|e| e.reg == reg)
    }

    /// Drops every entry.
    pub fn flush(&mut self) {
        self.entries.clear();
    }

    /// Entries oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &ForwardEntry> + '_ {
        self.entries.iter()
    }

    /// Number of valid entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no value is held.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}
