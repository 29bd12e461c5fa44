//! Cycle-accurate in-order multithreaded core simulator library.
//!
//! This crate models the timing of a narrow in-order core whose pipeline is
//! shared by several hardware threads:
//! 1. **Core:** Op lifecycle, per-thread pipeline (fetch to commit) and thread switching.
//! 2. **Units:** Functional-unit table, TLBs with page-walk timing, branch prediction.
//! 3. **Memory:** Fixed-latency and DRAM row-buffer timing models.
//! 4. **Simulation:** Configuration and statistics collection.
//!
//! Architectural behaviour (decoding, translation, memory contents, fault
//! handlers) is supplied per thread through the [`Context`] trait.

/// Common types and constants (addresses, registers, faults, access types).
pub mod common;
/// Simulator configuration (defaults, hierarchical config structures, validation).
pub mod config;
/// Core (pipeline, units, scheduling).
pub mod core;
/// Memory timing models.
pub mod soc;
/// Simulation statistics collection.
pub mod stats;

/// Root configuration type; use `Config::default()` or parse from JSON.
pub use crate::config::Config;
/// Multithreaded core; construct with `AtomCore::new`.
pub use crate::core::AtomCore;
/// Per-thread architectural state the core consults.
pub use crate::core::pipeline::traits::{Context, FetchOutcome, StoreEffect};
/// Memory timing interface.
pub use crate::soc::memory::LatencyOracle;
/// Hierarchical counters.
pub use crate::stats::StatsTree;
