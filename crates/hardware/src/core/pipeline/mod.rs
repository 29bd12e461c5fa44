//! Instruction pipeline implementation.
//!
//! This module contains the in-order, multithreaded pipeline. It includes the
//! following components:
//! 1. **Signals:** Opcodes, micro-ops and decoded instructions.
//! 2. **Ops:** The op lifecycle state machine and per-thread op arena.
//! 3. **Frontend:** Bundling of an instruction's micro-ops into ops.
//! 4. **Buffers:** Ring buffers, the forward buffer and the store buffer.
//! 5. **Thread:** The per-thread stages from fetch to commit.
//! 6. **Traits:** Interfaces to the context, the memory timing model and the branch predictor.

/// Forward (bypass) buffer shared by the threads of a core.
pub mod forward;

/// Bundling of micro-ops into ops.
pub mod frontend;

/// Op state machine and op pool.
pub mod op;

/// Fixed-capacity FIFO.
pub mod ring;

/// Opcodes, micro-ops and instructions.
pub mod signals;

/// Per-thread store buffer.
pub mod store_buffer;

/// Per-thread pipeline stages.
pub mod thread;

/// Interfaces to components outside the pipeline.
pub mod traits;

pub use thread::{AtomThread, CommitResult, IssueResult};
