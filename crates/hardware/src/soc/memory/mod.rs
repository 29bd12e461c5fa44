//! System Memory Timing.
//!
//! This module provides the latency models behind [`LatencyOracle`]:
//! 1. **Simple:** Every access costs a fixed number of cycles.
//! 2. **DRAM:** Row-buffer model tracking the open row of every DIMM, rank and bank.
//! 3. **Stacked DRAM:** Multi-layer and vault organisations with per-layer row buffers.

/// Memory controller implementations for access latency modeling.
pub mod controller;

/// Die-stacked DRAM timing.
pub mod stacked;

pub use self::controller::{
    build_oracle, DramController, DramLayout, LatencyOracle, SimpleController,
};
pub use self::stacked::{StackOrganisation, StackedDramController};
