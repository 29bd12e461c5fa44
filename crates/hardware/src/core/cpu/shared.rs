//! Resources shared by the hardware threads of one core.
//!
//! The core owns these and lends them, one thread at a time, as
//! `&mut SharedResources`. Functional-unit availability persists across
//! cycles (non-pipelined micro-ops hold their unit); the per-cycle usage
//! masks are reset at the start of every cycle.

use crate::config::CoreConfig;
use crate::core::pipeline::forward::ForwardBuffer;
use crate::core::pipeline::op::OpId;
use crate::core::pipeline::ring::RingBuffer;
use crate::core::pipeline::traits::LatencyOracle;
use crate::core::units::fu::{FU_ALL, unit_names};
use crate::core::units::mmu::Mmu;
use crate::stats::StatsTree;

/// One op travelling through decode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetchEntry {
    /// Owning thread.
    pub thread: usize,
    /// Op in the owner's pool.
    pub op: OpId,
    /// First cycle the op may be dispatched.
    pub ready_at: u64,
}

/// Core-level state lent to the running thread.
pub struct SharedResources {
    /// Core id, for stats paths and logs.
    pub core_id: usize,
    /// Current cycle.
    pub cycle: u64,
    /// Ops between fetch and dispatch.
    pub fetchq: RingBuffer<FetchEntry>,
    /// Bypass network.
    pub fwdbuf: ForwardBuffer,
    /// Data and instruction TLBs.
    pub mmu: Mmu,
    /// Units not held by a non-pipelined micro-op.
    pub fu_available: u8,
    /// Units used this cycle.
    pub fu_used: u8,
    /// Issue ports used this cycle.
    pub ports_used: u8,
    /// Memory timing.
    pub oracle: Box<dyn LatencyOracle>,
    /// Counters.
    pub stats: StatsTree,
}

impl std::fmt::Debug for SharedResources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedResources")
            .field("core_id", &self.core_id)
            .field("cycle", &self.cycle)
            .field("fetchq", &self.fetchq.len())
            .field("fwdbuf", &self.fwdbuf.len())
            .field(
                "fu_held",
                &unit_names(!self.fu_available & FU_ALL).collect::<Vec<_>>(),
            )
            .field("fu_used", &format_args!("{:#08b}", self.fu_used))
            .field("ports_used", &format_args!("{:#04b}", self.ports_used))
            .finish_non_exhaustive()
    }
}

impl SharedResources {
    /// Builds the shared structures sized by `config`.
    pub fn new(core_id: usize, config: &CoreConfig, oracle: Box<dyn LatencyOracle>) -> Self {
        Self {
            core_id,
            cycle: 0,
            fetchq: RingBuffer::new(config.fetch_queue_size()),
            fwdbuf: ForwardBuffer::new(config.forward_buffer_size),
            mmu: Mmu::new(config.dtlb_size, config.itlb_size),
            fu_available: FU_ALL,
            fu_used: 0,
            ports_used: 0,
            oracle,
            stats: StatsTree::new(),
        }
    }

    /// Clears the per-cycle usage masks.
    pub const fn begin_cycle(&mut self) {
        self.fu_used = 0;
        self.ports_used = 0;
    }

    /// Units free for a new micro-op this cycle.
    #[inline]
    pub const fn fu_free(&self) -> u8 {
        self.fu_available & !self.fu_used
    }

    /// Returns units held by a completed or squashed non-pipelined op.
    #[inline]
    pub const fn release_fus(&mut self, units: u8) {
        self.fu_available |= units;
    }

    /// Bumps `<prefix>.<key>` by one.
    pub fn count(&mut self, prefix: &str, key: &str) {
        self.stats.add(&format!("{prefix}.{key}"), 1);
    }
}
