//! Stacked DRAM timing.
//!
//! A die stack of [`LAYER_COUNT`] layers with row buffers kept near the logic
//! layer. A row found in a buffer costs the bus round trip plus two cycles
//! per layer it climbs; any other row costs a full row read. Reads and
//! writes are charged alike.
//!
//! Two organisations are modelled:
//! - **Multi-layer:** one row buffer per layer.
//! - **Vault:** one row buffer per layer of each of [`LAYER_COUNT`] vaults.
//!
//! Buffers fill lowest layer first and are then replaced round robin. Rows
//! are decoded with the same [`DramLayout`] as the planar model. Each access
//! is also charged to the layer its address lives in; the busiest layer
//! bounds how long a run kept the stack occupied.

use crate::common::{AccessType, ConfigError, PhysAddr};
use crate::config::DramConfig;

use super::controller::{DramLayout, LatencyOracle};

/// Layers in the stack.
pub const LAYER_COUNT: usize = 8;

/// Cycles for a buffered row before the per-layer climb.
pub const STACKED_HIT_BASE_LATENCY: u64 = 45;

/// Cycles per layer a buffered row climbs.
pub const LAYER_HOP_LATENCY: u64 = 2;

/// Cycles for a row held in no buffer.
pub const STACKED_MISS_LATENCY: u64 = 90;

const LAYER_BITS: u32 = LAYER_COUNT.trailing_zeros();

/// Latency of a row found in the buffer of `layer`.
pub const fn stacked_hit_latency(layer: usize) -> u64 {
    STACKED_HIT_BASE_LATENCY + LAYER_HOP_LATENCY * (layer as u64 + 1)
}

/// Row-buffer organisation of the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackOrganisation {
    /// One row buffer per layer.
    MultiLayer,
    /// One row buffer per layer of every vault.
    Vault,
}

impl StackOrganisation {
    const fn vaults(self) -> usize {
        match self {
            Self::MultiLayer => 1,
            Self::Vault => LAYER_COUNT,
        }
    }
}

/// Stacked DRAM controller.
#[derive(Debug, Clone)]
pub struct StackedDramController {
    organisation: StackOrganisation,
    layout: DramLayout,
    /// Buffered row per slot, layer-major; `None` until first filled.
    buffers: Vec<Option<u32>>,
    victim: usize,
    layer_busy: [u64; LAYER_COUNT],
}

impl StackedDramController {
    /// Creates a stack with every buffer empty.
    ///
    /// # Errors
    ///
    /// Returns the layout error of an invalid geometry.
    pub fn new(config: &DramConfig, organisation: StackOrganisation) -> Result<Self, ConfigError> {
        let layout = DramLayout::new(config)?;
        tracing::debug!(
            ?organisation,
            layers = LAYER_COUNT,
            paddr_bits = layout.paddr_bits,
            "stacked dram"
        );
        Ok(Self {
            organisation,
            layout,
            buffers: vec![None; LAYER_COUNT * organisation.vaults()],
            victim: 0,
            layer_busy: [0; LAYER_COUNT],
        })
    }

    /// Row-buffer organisation in use.
    pub const fn organisation(&self) -> StackOrganisation {
        self.organisation
    }

    /// Layer whose buffer currently holds `row`.
    pub fn buffered_layer(&self, row: u32) -> Option<usize> {
        self.buffers
            .iter()
            .position(|&r| r == Some(row))
            .map(|slot| slot / self.organisation.vaults())
    }

    /// Layer an access to `paddr` keeps busy.
    pub const fn layer_of(&self, paddr: PhysAddr) -> usize {
        let bits = self.layout.paddr_bits;
        let addr = paddr.val() & ((1 << bits) - 1);
        let shift = match self.organisation {
            StackOrganisation::MultiLayer => bits.saturating_sub(LAYER_BITS),
            StackOrganisation::Vault => bits.saturating_sub(2 * LAYER_BITS),
        };
        (addr >> shift) as usize % LAYER_COUNT
    }

    /// Cycles charged to each layer so far.
    pub const fn layer_busy(&self) -> &[u64; LAYER_COUNT] {
        &self.layer_busy
    }

    /// Cycles charged to the busiest layer.
    pub fn busiest_layer_cycles(&self) -> u64 {
        self.layer_busy.iter().copied().max().unwrap_or(0)
    }

    fn install(&mut self, row: u32) {
        let slot = if let Some(free) = self.buffers.iter().position(Option::is_none) {
            free
        } else {
            let slot = self.victim;
            self.victim = (self.victim + 1) % self.buffers.len();
            slot
        };
        self.buffers[slot] = Some(row);
    }
}

impl LatencyOracle for StackedDramController {
    fn latency(&mut self, paddr: PhysAddr, _access: AccessType) -> u64 {
        let (_, _, _, row) = self.layout.decode(paddr.val());
        let latency = match self.buffered_layer(row) {
            Some(layer) => stacked_hit_latency(layer),
            None => {
                self.install(row);
                STACKED_MISS_LATENCY
            }
        };
        self.layer_busy[self.layer_of(paddr)] += latency;
        latency
    }
}
