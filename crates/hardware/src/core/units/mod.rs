//! Execution units and functional components.
//!
//! This module contains the shared execution resources of a core: the
//! functional-unit table, the branch prediction unit and the TLBs.

/// Branch Resolution Unit: predictor interface, static predictor and BTB.
pub mod bru;

/// Functional-unit and issue-port table.
pub mod fu;

/// Memory Management Unit with TLBs and page-walk timing.
pub mod mmu;
