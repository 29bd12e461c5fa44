//! Common types shared by every part of the simulator.
//!
//! This module provides the small vocabulary the pipeline, the TLBs and the
//! memory model speak in:
//! 1. **Address Types:** Strong types for virtual and physical addresses.
//! 2. **Constants:** Structural limits of the modelled core (op sizes, FU count, tag widths).
//! 3. **Memory Access:** Classification of accesses (fetch, read, write).
//! 4. **Error Handling:** Architectural faults and configuration errors.
//! 5. **Register Management:** The per-thread architectural register file.

/// Address type definitions (physical and virtual addresses).
pub mod addr;

/// Structural constants of the modelled core.
pub mod constants;

/// Memory access type definitions.
pub mod data;

/// Fault and configuration error types.
pub mod error;

/// Architectural register file.
pub mod reg;

pub use addr::{PhysAddr, VirtAddr};
pub use constants::{PAGE_SHIFT, PAGE_SIZE};
pub use data::AccessType;
pub use error::{ConfigError, Fault};
pub use reg::{Reg, RegisterFile};
