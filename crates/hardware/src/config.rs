//! Configuration system for the core model.
//!
//! This module defines all configuration structures used to parameterize the
//! simulator. It provides:
//! 1. **Defaults:** Baseline sizes of the modelled in-order core and its DRAM.
//! 2. **Structures:** Hierarchical config for the core pipeline and the memory model.
//! 3. **Validation:** `Config::validate` rejects sizes the hardware cannot be built with.
//!
//! Configuration is supplied as JSON (`Config::from_json`) or built in code
//! starting from `Config::default()`.

use serde::Deserialize;

use crate::common::ConfigError;
use crate::common::constants::MAX_THREADS;
use crate::core::pipeline::frontend::MAX_OPS_PER_INSN;

/// Default configuration constants for the simulator.
mod defaults {
    /// Hardware threads per core.
    pub const THREADS: usize = 2;

    /// Ops in each thread's pool.
    ///
    /// Bounds the number of ops a thread can have anywhere between fetch and
    /// commit.
    pub const OPS_PER_THREAD: usize = 32;

    /// Dispatch queue depth.
    pub const DISPATCH_QUEUE_SIZE: usize = 16;

    /// Store buffer depth.
    pub const STORE_BUFFER_SIZE: usize = 16;

    /// Commit buffer depth (ops of not-yet-complete instruction groups).
    pub const COMMIT_BUFFER_SIZE: usize = 16;

    /// Entries in the shared forward buffer.
    pub const FORWARD_BUFFER_SIZE: usize = 8;

    /// Data TLB entries.
    pub const DTLB_SIZE: usize = 32;

    /// Instruction TLB entries.
    pub const ITLB_SIZE: usize = 32;

    /// Ops fetched per cycle.
    pub const FETCH_WIDTH: usize = 2;

    /// Ops issued per cycle.
    pub const ISSUE_WIDTH: usize = 1;

    /// Cycles between fetch and dispatch eligibility (decode depth).
    pub const FRONTEND_STAGES: usize = 3;

    /// Bytes fetched from one icache block per cycle.
    pub const FETCH_GRANULARITY: u64 = 16;

    /// Levels of a page walk; each costs one cycle.
    pub const TLB_WALK_LEVELS: u8 = 4;

    /// Oracle latencies up to this many cycles count as a data-cache hit.
    pub const DCACHE_HIT_LATENCY: u64 = 3;

    /// Cycles fetch stays paused after a pause micro-op commits.
    pub const THREAD_PAUSE_CYCLES: u32 = 20;

    /// Latency of the fixed-latency memory controller.
    pub const SIMPLE_LATENCY: u64 = 2;

    /// DRAM size in bytes (4 GiB).
    pub const DRAM_SIZE: u64 = 4 * 1024 * 1024 * 1024;

    /// Number of DIMMs.
    pub const DRAM_DIMMS: u32 = 2;

    /// Banks per rank.
    pub const DRAM_BANKS: u32 = 8;

    /// Memory bus width in bits.
    pub const DRAM_BUS_WIDTH: u32 = 32;

    /// Column size in bits.
    pub const DRAM_COL_SIZE: u32 = 4;
}

/// Memory latency model selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum MemoryControllerKind {
    /// Every access takes `simple_latency` cycles.
    #[default]
    Simple,
    /// Row-buffer DRAM model.
    #[serde(alias = "DRAM")]
    Dram,
    /// Die-stacked DRAM with one row buffer per layer.
    MultiLayer,
    /// Die-stacked DRAM with one row buffer per layer of every vault.
    Vault,
}

/// Root configuration structure.
///
/// # Examples
///
/// ```
/// use atomsim_core::config::{Config, MemoryControllerKind};
///
/// let json = r#"{
///     "core": { "threads": 4, "dispatch_queue_size": 8 },
///     "memory": { "controller": "Dram" }
/// }"#;
///
/// let config = Config::from_json(json).unwrap();
/// assert_eq!(config.core.threads, 4);
/// assert_eq!(config.core.dispatch_queue_size, 8);
/// assert_eq!(config.core.store_buffer_size, 16);
/// assert_eq!(config.memory.controller, MemoryControllerKind::Dram);
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Pipeline and structure sizes.
    #[serde(default)]
    pub core: CoreConfig,
    /// Memory latency model.
    #[serde(default)]
    pub memory: MemoryConfig,
}

impl Config {
    /// Parses and validates a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON and any validation
    /// error from [`Config::validate`].
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every size against what the hardware model can be built with.
    ///
    /// # Errors
    ///
    /// Returns the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.core.validate()?;
        self.memory.validate()
    }
}

/// Core pipeline configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CoreConfig {
    /// Hardware threads sharing the pipeline.
    #[serde(default = "CoreConfig::default_threads")]
    pub threads: usize,

    /// Ops in each thread's pool.
    #[serde(default = "CoreConfig::default_ops_per_thread")]
    pub ops_per_thread: usize,

    /// Dispatch queue depth per thread.
    #[serde(default = "CoreConfig::default_dispatch_queue_size")]
    pub dispatch_queue_size: usize,

    /// Store buffer depth per thread.
    #[serde(default = "CoreConfig::default_store_buffer_size")]
    pub store_buffer_size: usize,

    /// Commit buffer depth per thread.
    #[serde(default = "CoreConfig::default_commit_buffer_size")]
    pub commit_buffer_size: usize,

    /// Shared forward buffer entries.
    #[serde(default = "CoreConfig::default_forward_buffer_size")]
    pub forward_buffer_size: usize,

    /// Data TLB entries.
    #[serde(default = "CoreConfig::default_dtlb_size")]
    pub dtlb_size: usize,

    /// Instruction TLB entries.
    #[serde(default = "CoreConfig::default_itlb_size")]
    pub itlb_size: usize,

    /// Ops fetched per cycle.
    #[serde(default = "CoreConfig::default_fetch_width")]
    pub fetch_width: usize,

    /// Ops issued per cycle.
    #[serde(default = "CoreConfig::default_issue_width")]
    pub issue_width: usize,

    /// Decode depth in cycles.
    #[serde(default = "CoreConfig::default_frontend_stages")]
    pub frontend_stages: usize,

    /// Bytes of one icache block fetched per cycle.
    #[serde(default = "CoreConfig::default_fetch_granularity")]
    pub fetch_granularity: u64,

    /// Page-walk levels (one cycle each).
    #[serde(default = "CoreConfig::default_tlb_walk_levels")]
    pub tlb_walk_levels: u8,

    /// Largest oracle latency still treated as a data-cache hit.
    #[serde(default = "CoreConfig::default_dcache_hit_latency")]
    pub dcache_hit_latency: u64,

    /// Fetch pause after a pause micro-op commits.
    #[serde(default = "CoreConfig::default_thread_pause_cycles")]
    pub thread_pause_cycles: u32,
}

impl CoreConfig {
    fn default_threads() -> usize {
        defaults::THREADS
    }

    fn default_ops_per_thread() -> usize {
        defaults::OPS_PER_THREAD
    }

    fn default_dispatch_queue_size() -> usize {
        defaults::DISPATCH_QUEUE_SIZE
    }

    fn default_store_buffer_size() -> usize {
        defaults::STORE_BUFFER_SIZE
    }

    fn default_commit_buffer_size() -> usize {
        defaults::COMMIT_BUFFER_SIZE
    }

    fn default_forward_buffer_size() -> usize {
        defaults::FORWARD_BUFFER_SIZE
    }

    fn default_dtlb_size() -> usize {
        defaults::DTLB_SIZE
    }

    fn default_itlb_size() -> usize {
        defaults::ITLB_SIZE
    }

    fn default_fetch_width() -> usize {
        defaults::FETCH_WIDTH
    }

    fn default_issue_width() -> usize {
        defaults::ISSUE_WIDTH
    }

    fn default_frontend_stages() -> usize {
        defaults::FRONTEND_STAGES
    }

    fn default_fetch_granularity() -> u64 {
        defaults::FETCH_GRANULARITY
    }

    fn default_tlb_walk_levels() -> u8 {
        defaults::TLB_WALK_LEVELS
    }

    fn default_dcache_hit_latency() -> u64 {
        defaults::DCACHE_HIT_LATENCY
    }

    fn default_thread_pause_cycles() -> u32 {
        defaults::THREAD_PAUSE_CYCLES
    }

    /// Capacity of the shared fetch queue: one slot per op in flight in the
    /// decode stages, and never less than one whole instruction.
    pub const fn fetch_queue_size(&self) -> usize {
        let size = self.fetch_width * self.frontend_stages;
        if size < MAX_OPS_PER_INSN {
            MAX_OPS_PER_INSN
        } else {
            size
        }
    }

    /// Checks the core sizes.
    ///
    /// # Errors
    ///
    /// Returns the first zero, oversized, undersized or non-power-of-two field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let nonzero = [
            ("threads", self.threads),
            ("ops_per_thread", self.ops_per_thread),
            ("dispatch_queue_size", self.dispatch_queue_size),
            ("store_buffer_size", self.store_buffer_size),
            ("commit_buffer_size", self.commit_buffer_size),
            ("forward_buffer_size", self.forward_buffer_size),
            ("dtlb_size", self.dtlb_size),
            ("itlb_size", self.itlb_size),
            ("fetch_width", self.fetch_width),
            ("issue_width", self.issue_width),
            ("frontend_stages", self.frontend_stages),
        ];
        for (field, value) in nonzero {
            if value == 0 {
                return Err(ConfigError::Zero { field });
            }
        }

        if self.threads > MAX_THREADS {
            return Err(ConfigError::TooLarge {
                field: "threads",
                value: self.threads as u64,
                max: MAX_THREADS as u64,
            });
        }
        // OpId is a u8 index.
        if self.ops_per_thread > 256 {
            return Err(ConfigError::TooLarge {
                field: "ops_per_thread",
                value: self.ops_per_thread as u64,
                max: 256,
            });
        }
        // Fetch, dispatch and commit move whole instructions.
        for (field, value) in [
            ("ops_per_thread", self.ops_per_thread),
            ("dispatch_queue_size", self.dispatch_queue_size),
            ("commit_buffer_size", self.commit_buffer_size),
        ] {
            if value < MAX_OPS_PER_INSN {
                return Err(ConfigError::TooSmall {
                    field,
                    value: value as u64,
                    min: MAX_OPS_PER_INSN as u64,
                });
            }
        }
        if !self.fetch_granularity.is_power_of_two() {
            return Err(ConfigError::NotPowerOfTwo {
                field: "fetch_granularity",
                value: self.fetch_granularity,
            });
        }
        Ok(())
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            threads: defaults::THREADS,
            ops_per_thread: defaults::OPS_PER_THREAD,
            dispatch_queue_size: defaults::DISPATCH_QUEUE_SIZE,
            store_buffer_size: defaults::STORE_BUFFER_SIZE,
            commit_buffer_size: defaults::COMMIT_BUFFER_SIZE,
            forward_buffer_size: defaults::FORWARD_BUFFER_SIZE,
            dtlb_size: defaults::DTLB_SIZE,
            itlb_size: defaults::ITLB_SIZE,
            fetch_width: defaults::FETCH_WIDTH,
            issue_width: defaults::ISSUE_WIDTH,
            frontend_stages: defaults::FRONTEND_STAGES,
            fetch_granularity: defaults::FETCH_GRANULARITY,
            tlb_walk_levels: defaults::TLB_WALK_LEVELS,
            dcache_hit_latency: defaults::DCACHE_HIT_LATENCY,
            thread_pause_cycles: defaults::THREAD_PAUSE_CYCLES,
        }
    }
}

/// Memory latency model configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryConfig {
    /// Latency model.
    #[serde(default)]
    pub controller: MemoryControllerKind,

    /// Cycles per access for the simple controller.
    #[serde(default = "MemoryConfig::default_simple_latency")]
    pub simple_latency: u64,

    /// DRAM geometry for the row-buffer model.
    #[serde(default)]
    pub dram: DramConfig,
}

impl MemoryConfig {
    fn default_simple_latency() -> u64 {
        defaults::SIMPLE_LATENCY
    }

    /// Checks the memory model parameters.
    ///
    /// # Errors
    ///
    /// Returns the DRAM geometry error, if a DRAM model is selected.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.controller {
            MemoryControllerKind::Simple => Ok(()),
            MemoryControllerKind::Dram
            | MemoryControllerKind::MultiLayer
            | MemoryControllerKind::Vault => self.dram.validate().map(|_| ()),
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            controller: MemoryControllerKind::Simple,
            simple_latency: defaults::SIMPLE_LATENCY,
            dram: DramConfig::default(),
        }
    }
}

/// DRAM geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DramConfig {
    /// DRAM size in bytes.
    #[serde(default = "DramConfig::default_size")]
    pub size: u64,

    /// Number of DIMMs.
    #[serde(default = "DramConfig::default_dimms")]
    pub dimms: u32,

    /// Banks per rank.
    #[serde(default = "DramConfig::default_banks")]
    pub banks: u32,

    /// Memory bus width in bits.
    #[serde(default = "DramConfig::default_bus_width")]
    pub bus_width: u32,

    /// Column size in bits.
    #[serde(default = "DramConfig::default_col_size")]
    pub col_size: u32,
}

impl DramConfig {
    fn default_size() -> u64 {
        defaults::DRAM_SIZE
    }

    fn default_dimms() -> u32 {
        defaults::DRAM_DIMMS
    }

    fn default_banks() -> u32 {
        defaults::DRAM_BANKS
    }

    fn default_bus_width() -> u32 {
        defaults::DRAM_BUS_WIDTH
    }

    fn default_col_size() -> u32 {
        defaults::DRAM_COL_SIZE
    }

    /// Validates the geometry and returns the resulting address field layout.
    ///
    /// # Errors
    ///
    /// Zero-sized or non-power-of-two parameters, or a layout wider than the
    /// physical address.
    pub fn validate(&self) -> Result<crate::soc::memory::controller::DramLayout, ConfigError> {
        crate::soc::memory::controller::DramLayout::new(self)
    }
}

impl Default for DramConfig {
    fn default() -> Self {
        Self {
            size: defaults::DRAM_SIZE,
            dimms: defaults::DRAM_DIMMS,
            banks: defaults::DRAM_BANKS,
            bus_width: defaults::DRAM_BUS_WIDTH,
            col_size: defaults::DRAM_COL_SIZE,
        }
    }
}
