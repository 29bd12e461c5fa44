//! Core processor implementation.
//!
//! This module contains the multithreaded in-order core: the per-thread
//! pipeline, the execution units it schedules onto, and the [`AtomCore`]
//! that owns the threads and decides which one runs.

/// Core container, cycle loop and thread switching.
pub mod cpu;

/// Per-thread pipeline (ops, buffers, stages, external interfaces).
pub mod pipeline;

/// Execution units (functional units, MMU, branch predictor).
pub mod units;

pub use self::cpu::AtomCore;
