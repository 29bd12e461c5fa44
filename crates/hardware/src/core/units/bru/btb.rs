//! Branch Target Buffer (BTB).
//!
//! Direct-mapped table of last-seen targets for indirect jumps. Direct
//! branches carry their target in the micro-op and never need it.

#[derive(Clone, Copy, Debug, Default)]
struct BtbEntry {
    pc: u64,
    target: u64,
    valid: bool,
}

/// Branch Target Buffer structure.
#[derive(Clone, Debug)]
pub struct Btb {
    table: Vec<BtbEntry>,
    mask: usize,
}

impl Btb {
    /// Creates a BTB with `size` entries, rounded up to a power of two.
    pub fn new(size: usize) -> Self {
        let size = size.max(1).next_power_of_two();
        Self {
            table: vec![BtbEntry::default(); size],
            mask: size - 1,
        }
    }

    const fn index(&self, pc: u64) -> usize {
        pc as usize & self.mask
    }

    /// Returns the last target recorded for `pc`.
    pub fn lookup(&self, pc: u64) -> Option<u64> {
        let e = self.table[self.index(pc)];
        (e.valid && e.pc == pc).then_some(e.target)
    }

    /// Records `target` for `pc`, replacing whatever shared its slot.
    pub fn update(&mut self, pc: u64, target: u64) {
        let idx = self.index(pc);
        self.table[idx] = BtbEntry {
            pc,
            target,
            valid: true,
        };
    }
}
