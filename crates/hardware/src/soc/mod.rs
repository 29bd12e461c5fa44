//! System-on-Chip (SoC) Components.
//!
//! The core models timing only; of the system around it, the simulator keeps
//! just the memory timing models the core consults.

/// Memory controller timing models.
pub mod memory;
