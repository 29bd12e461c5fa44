//! Branch Predictor Interface.
//!
//! This module defines the `BranchPredictor` trait the fetch stage consults
//! and the records passed across it: what fetch is told ([`Prediction`]) and
//! what issue learned once the branch executed ([`BranchOutcome`]).

/// Shape of a control-flow micro-op, as far as prediction cares.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BranchKind {
    /// Conditional branch to a fixed target.
    Conditional,
    /// Unconditional branch to a fixed target.
    Direct,
    /// Unconditional jump to a register value.
    Indirect,
}

/// What fetch should assume about a branch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Prediction {
    /// Predicted direction.
    pub taken: bool,
    /// Predicted target, if the predictor knows one.
    pub target: Option<u64>,
}

/// A resolved branch, reported by issue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BranchOutcome {
    /// Program counter of the branch instruction.
    pub pc: u64,
    /// Kind of branch.
    pub kind: BranchKind,
    /// Actual direction.
    pub taken: bool,
    /// Actual next pc.
    pub target: u64,
    /// Whether fetch had followed a different path.
    pub mispredicted: bool,
}

/// Trait for branch prediction algorithms.
pub trait BranchPredictor {
    /// Predicts the branch at `pc`.
    fn predict(&self, pc: u64, kind: BranchKind) -> Prediction;

    /// Trains the predictor with a resolved branch.
    fn update(&mut self, outcome: &BranchOutcome);
}
