//! Branch prediction unit (BRU).
//!
//! Fetch consults a [`BranchPredictor`] for every branch it follows; issue
//! resolves the branch and trains the predictor with the real outcome. Only
//! one unresolved branch per thread is ever in flight, so predictors see a
//! strictly alternating predict/update stream per thread.

pub use self::branch_predictor::{BranchKind, BranchOutcome, BranchPredictor, Prediction};
pub use self::static_bp::StaticPredictor;

/// Branch predictor trait and prediction records.
pub mod branch_predictor;

/// Branch Target Buffer for indirect jump targets.
pub mod btb;

/// Static branch predictor (always not-taken).
pub mod static_bp;
