//! Op state machine and pool bookkeeping.

use proptest::prelude::*;
use rstest::rstest;

use atomsim_core::core::pipeline::op::{OpPool, OpState};

fn any_state() -> impl Strategy<Value = OpState> {
    prop::sample::select(OpState::ALL.to_vec())
}

#[rstest]
#[case(OpState::Free, OpState::Fetched)]
#[case(OpState::Fetched, OpState::Dispatched)]
#[case(OpState::Dispatched, OpState::Executing)]
#[case(OpState::Dispatched, OpState::CacheMissWait)]
#[case(OpState::Dispatched, OpState::TlbMissWait)]
#[case(OpState::TlbMissWait, OpState::Executing)]
#[case(OpState::CacheMissWait, OpState::Forwarding)]
#[case(OpState::Executing, OpState::Forwarding)]
#[case(OpState::Forwarding, OpState::WaitingToWriteback)]
#[case(OpState::WaitingToWriteback, OpState::ReadyToWriteback)]
#[case(OpState::ReadyToWriteback, OpState::Free)]
fn legal_transitions(#[case] from: OpState, #[case] to: OpState) {
    assert!(from.can_transition_to(to));
}

#[rstest]
#[case(OpState::Fetched, OpState::Executing)]
#[case(OpState::Executing, OpState::WaitingToWriteback)]
#[case(OpState::Forwarding, OpState::ReadyToWriteback)]
#[case(OpState::TlbMissWait, OpState::Forwarding)]
#[case(OpState::Free, OpState::Dispatched)]
fn skipping_a_stage_is_illegal(#[case] from: OpState, #[case] to: OpState) {
    assert!(!from.can_transition_to(to));
}

proptest! {
    #[test]
    fn only_free_slots_are_claimed(from in any_state()) {
        prop_assert_eq!(from.can_transition_to(OpState::Fetched), from == OpState::Free);
    }

    #[test]
    fn every_live_state_may_be_squashed(from in any_state()) {
        prop_assert_eq!(from.can_transition_to(OpState::Free), from != OpState::Free);
    }

    #[test]
    fn issued_states_never_return_to_the_queues(from in any_state(), to in any_state()) {
        if from.is_issued() && from.can_transition_to(to) {
            prop_assert!(to.is_issued() || to == OpState::Free);
        }
    }

    #[test]
    fn pool_counts_partition_capacity(capacity in 1usize..16, claims in 0usize..20) {
        let mut pool = OpPool::new(capacity);
        let mut claimed = 0;
        for uuid in 0..claims as u64 {
            if pool.claim(uuid + 1, 0, uuid * 4, uuid * 4 + 4).is_some() {
                claimed += 1;
            }
        }
        prop_assert_eq!(claimed, claims.min(capacity));
        prop_assert_eq!(pool.free_count() + pool.count_in(OpState::Fetched), capacity);
        prop_assert_eq!(pool.program_order().len(), claimed);
        if let Some(oldest) = pool.oldest() {
            prop_assert_eq!(oldest.uuid, 1);
        }
    }
}

#[test]
fn younger_than_zero_is_everything() {
    let mut pool = OpPool::new(4);
    for uuid in 1..=3 {
        let _ = pool.claim(uuid, 0, 0, 4);
    }
    assert_eq!(pool.younger_than(0).len(), 3);
    assert_eq!(pool.younger_than(2).len(), 1);
}
