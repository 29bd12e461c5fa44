//! Architectural Register File.
//!
//! Each hardware thread owns one `RegisterFile`. Values reach it only at
//! commit; everything younger lives in ops, the forward buffer or the
//! thread's register-owner table.

use std::fmt;

use super::constants::REG_COUNT;

/// Register index as carried by micro-ops.
pub type Reg = u8;

/// Flat architectural register file.
#[derive(Clone, PartialEq, Eq)]
pub struct RegisterFile {
    regs: [u64; REG_COUNT],
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterFile {
    /// Creates a register file with every register zeroed.
    pub const fn new() -> Self {
        Self {
            regs: [0; REG_COUNT],
        }
    }

    /// Reads a register.
    ///
    /// # Panics
    ///
    /// Panics if `reg` is not below [`REG_COUNT`]; micro-ops are validated at
    /// bundling time so this only fires on a broken context.
    #[inline]
    pub fn read(&self, reg: Reg) -> u64 {
        self.regs[reg as usize]
    }

    /// Writes a register.
    #[inline]
    pub fn write(&mut self, reg: Reg, val: u64) {
        self.regs[reg as usize] = val;
    }
}

impl fmt::Debug for RegisterFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (i, v) in self.regs.iter().enumerate().filter(|(_, v)| **v != 0) {
            let _ = map.entry(&i, &format_args!("{v:#x}"));
        }
        map.finish()
    }
}
