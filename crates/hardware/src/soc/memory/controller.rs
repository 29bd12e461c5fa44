//! Memory controller implementations for latency modeling.
//!
//! This module provides:
//! 1. **SimpleController:** Fixed latency per access (no row-buffer modeling).
//! 2. **DramController:** Open-row model with one row buffer per DIMM, rank and bank.
//!
//! The stacked models in [`super::stacked`] reuse [`DramLayout`] to find the row.
//!
//! The physical address is split MSB to LSB into
//! `row | rank | col_high | bank | col_low | dimm | bus_offset`.

use crate::common::{AccessType, ConfigError, PhysAddr};
use crate::config::{DramConfig, MemoryConfig, MemoryControllerKind};

use super::stacked::{StackOrganisation, StackedDramController};

/// Cycles to drive address and data across the memory bus and back.
const BUS_RTT_LATENCY: u64 = 45;

/// Cycles to read a DRAM row into the row buffer.
const ROW_READ_LATENCY: u64 = 90;

/// Cycles to write the row buffer back into its DRAM row.
const ROW_WRITE_LATENCY: u64 = 90;

/// Cycles to read data out of an open row buffer.
const ROW_BUFFER_READ_LATENCY: u64 = 45;

/// Read that finds its row open.
pub const READ_HIT_LATENCY: u64 = BUS_RTT_LATENCY + ROW_BUFFER_READ_LATENCY;

/// Read that has to open its row.
pub const READ_MISS_LATENCY: u64 = BUS_RTT_LATENCY + ROW_READ_LATENCY;

/// Write that finds its row open.
pub const WRITE_HIT_LATENCY: u64 = BUS_RTT_LATENCY + ROW_BUFFER_READ_LATENCY + ROW_WRITE_LATENCY;

/// Write that has to open its row.
pub const WRITE_MISS_LATENCY: u64 = BUS_RTT_LATENCY + ROW_READ_LATENCY + ROW_WRITE_LATENCY;

const ROW_BITS: u32 = 4;
const COL_HIGH_BITS: u32 = 2;
const COL_LOW_BITS: u32 = 2;
const RANK_BITS: u32 = 1;
const RANKS: usize = 1 << RANK_BITS;

/// Latency source consulted by the core for icache refills and data accesses.
pub trait LatencyOracle {
    /// Returns the number of cycles the access takes.
    ///
    /// # Arguments
    ///
    /// * `paddr` - Physical address being accessed.
    /// * `access` - Fetch and read accesses are charged as reads.
    fn latency(&mut self, paddr: PhysAddr, access: AccessType) -> u64;
}

/// Fixed-latency memory controller; every access takes the same number of cycles.
#[derive(Debug, Clone)]
pub struct SimpleController {
    latency: u64,
}

impl SimpleController {
    /// Creates a simple controller with the given fixed latency in cycles.
    pub const fn new(latency: u64) -> Self {
        Self { latency }
    }
}

impl LatencyOracle for SimpleController {
    fn latency(&mut self, _paddr: PhysAddr, _access: AccessType) -> u64 {
        self.latency
    }
}

/// Bit widths of each physical-address field, derived from a [`DramConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DramLayout {
    /// Bits of physical address covered by the DRAM size.
    pub paddr_bits: u32,
    /// Bits selecting the DIMM.
    pub dimm_bits: u32,
    /// Bits selecting the bank.
    pub bank_bits: u32,
    /// Bits selecting a byte within one bus transfer.
    pub bus_offset_bits: u32,
}

impl DramLayout {
    /// Derives the layout from the DRAM geometry.
    ///
    /// # Errors
    ///
    /// Zero or non-power-of-two geometry, or a size too small to hold every field.
    pub fn new(config: &DramConfig) -> Result<Self, ConfigError> {
        pow2("dram.size", config.size)?;
        pow2("dram.dimms", u64::from(config.dimms))?;
        pow2("dram.banks", u64::from(config.banks))?;
        if config.bus_width == 0 || config.bus_width % 8 != 0 {
            return Err(ConfigError::NotPowerOfTwo {
                field: "dram.bus_width",
                value: u64::from(config.bus_width),
            });
        }
        if config.col_size == 0 {
            return Err(ConfigError::Zero {
                field: "dram.col_size",
            });
        }

        let paddr_bits = config.size.trailing_zeros();
        let dimm_bits = config.dimms.trailing_zeros();
        let bank_bits = config.banks.trailing_zeros();
        let needed = dimm_bits + bank_bits + COL_LOW_BITS + COL_HIGH_BITS + RANK_BITS + ROW_BITS;
        if needed > paddr_bits {
            return Err(ConfigError::AddressLayout {
                needed,
                available: paddr_bits,
            });
        }

        Ok(Self {
            paddr_bits,
            dimm_bits,
            bank_bits,
            bus_offset_bits: paddr_bits - needed,
        })
    }

    const fn dimm_shift(&self) -> u32 {
        self.bus_offset_bits
    }

    const fn bank_shift(&self) -> u32 {
        self.dimm_shift() + self.dimm_bits + COL_LOW_BITS
    }

    const fn rank_shift(&self) -> u32 {
        self.bank_shift() + self.bank_bits + COL_HIGH_BITS
    }

    const fn row_shift(&self) -> u32 {
        self.rank_shift() + RANK_BITS
    }

    /// Splits `paddr` into `(dimm, rank, bank, row)`.
    pub const fn decode(&self, paddr: u64) -> (usize, usize, usize, u32) {
        let dimm = field(paddr, self.dimm_shift(), self.dimm_bits);
        let bank = field(paddr, self.bank_shift(), self.bank_bits);
        let rank = field(paddr, self.rank_shift(), RANK_BITS);
        let row = field(paddr, self.row_shift(), ROW_BITS);
        (dimm as usize, rank as usize, bank as usize, row as u32)
    }
}

const fn field(paddr: u64, shift: u32, bits: u32) -> u64 {
    (paddr >> shift) & ((1 << bits) - 1)
}

fn pow2(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Zero { field });
    }
    if !value.is_power_of_two() {
        return Err(ConfigError::NotPowerOfTwo { field, value });
    }
    Ok(())
}

/// DRAM controller keeping the last opened row of every bank.
#[derive(Debug, Clone)]
pub struct DramController {
    layout: DramLayout,
    banks_per_rank: usize,
    /// Open row per (dimm, rank, bank); `None` until the bank is first used.
    open_rows: Vec<Option<u32>>,
}

impl DramController {
    /// Creates a controller with every bank closed.
    ///
    /// # Errors
    ///
    /// Returns the layout error of an invalid geometry.
    pub fn new(config: &DramConfig) -> Result<Self, ConfigError> {
        let layout = DramLayout::new(config)?;
        let banks = config.banks as usize;
        tracing::debug!(
            paddr_bits = layout.paddr_bits,
            dimm_bits = layout.dimm_bits,
            bank_bits = layout.bank_bits,
            bus_offset_bits = layout.bus_offset_bits,
            "dram layout"
        );
        Ok(Self {
            layout,
            banks_per_rank: banks,
            open_rows: vec![None; config.dimms as usize * RANKS * banks],
        })
    }

    /// Address layout in use.
    pub const fn layout(&self) -> &DramLayout {
        &self.layout
    }

    /// Row currently open in the bank `paddr` maps to.
    pub fn open_row(&self, paddr: PhysAddr) -> Option<u32> {
        let (dimm, rank, bank, _) = self.layout.decode(paddr.val());
        self.open_rows[self.bank_index(dimm, rank, bank)]
    }

    const fn bank_index(&self, dimm: usize, rank: usize, bank: usize) -> usize {
        (dimm * RANKS + rank) * self.banks_per_rank + bank
    }
}

impl LatencyOracle for DramController {
    fn latency(&mut self, paddr: PhysAddr, access: AccessType) -> u64 {
        let (dimm, rank, bank, row) = self.layout.decode(paddr.val());
        let idx = self.bank_index(dimm, rank, bank);
        let hit = self.open_rows[idx] == Some(row);
        if !hit {
            self.open_rows[idx] = Some(row);
        }
        match (access.is_write(), hit) {
            (false, true) => READ_HIT_LATENCY,
            (false, false) => READ_MISS_LATENCY,
            (true, true) => WRITE_HIT_LATENCY,
            (true, false) => WRITE_MISS_LATENCY,
        }
    }
}

/// Builds the oracle selected by the memory configuration.
///
/// # Errors
///
/// Returns the DRAM geometry error when the DRAM model is selected.
pub fn build_oracle(config: &MemoryConfig) -> Result<Box<dyn LatencyOracle>, ConfigError> {
    Ok(match config.controller {
        MemoryControllerKind::Simple => Box::new(SimpleController::new(config.simple_latency)),
        MemoryControllerKind::Dram => Box::new(DramController::new(&config.dram)?),
        MemoryControllerKind::MultiLayer => Box::new(StackedDramController::new(
            &config.dram,
            StackOrganisation::MultiLayer,
        )?),
        MemoryControllerKind::Vault => Box::new(StackedDramController::new(
            &config.dram,
            StackOrganisation::Vault,
        )?),
    })
}
