//! Static Branch Predictor.
//!
//! Conditional branches are always predicted not taken. Direct branches are
//! followed to their encoded target by fetch without asking; indirect jumps
//! use the BTB and fall through when it has no entry.

use super::{BranchKind, BranchOutcome, BranchPredictor, Prediction, btb::Btb};

/// Default BTB entries of a static predictor.
const BTB_SIZE: usize = 64;

/// Static Branch Predictor structure.
#[derive(Clone, Debug)]
pub struct StaticPredictor {
    btb: Btb,
}

impl Default for StaticPredictor {
    fn default() -> Self {
        Self::new(BTB_SIZE)
    }
}

impl StaticPredictor {
    /// Creates a predictor with a `btb_size`-entry target buffer.
    pub fn new(btb_size: usize) -> Self {
        Self {
            btb: Btb::new(btb_size),
        }
    }
}

impl BranchPredictor for StaticPredictor {
    fn predict(&self, pc: u64, kind: BranchKind) -> Prediction {
        match kind {
            BranchKind::Conditional => Prediction::default(),
            BranchKind::Direct => Prediction {
                taken: true,
                target: None,
            },
            BranchKind::Indirect => {
                let target = self.btb.lookup(pc);
                Prediction {
                    taken: target.is_some(),
                    target,
                }
            }
        }
    }

    /// Only indirect targets are learned; directions are never tracked.
    fn update(&mut self, outcome: &BranchOutcome) {
        if outcome.kind == BranchKind::Indirect {
            self.btb.update(outcome.pc, outcome.target);
        }
    }
}
