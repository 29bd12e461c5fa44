use mockall::mock;

use atomsim_core::common::{AccessType, PhysAddr};
use atomsim_core::core::units::bru::{BranchKind, BranchOutcome, BranchPredictor, Prediction};
use atomsim_core::soc::memory::LatencyOracle;

mock! {
    pub Oracle {}
    impl LatencyOracle for Oracle {
        fn latency(&mut self, paddr: PhysAddr, access: AccessType) -> u64;
    }
}

mock! {
    pub Predictor {}
    impl BranchPredictor for Predictor {
        fn predict(&self, pc: u64, kind: BranchKind) -> Prediction;
        fn update(&mut self, outcome: &BranchOutcome);
    }
}

/// Oracle answering `data` cycles for loads and stores and `fetch` for refills.
pub fn split_oracle(fetch: u64, data: u64) -> MockOracle {
    let mut oracle = MockOracle::new();
    let _ = oracle
        .expect_latency()
        .returning(move |_, access| if access == AccessType::Fetch { fetch } else { data });
    oracle
}
