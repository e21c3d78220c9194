//! Plan lifecycle state machine tests
//!
//! Covers transition legality, idempotent re-invocation, absorbing states,
//! and the allocation accounting invariant across the lifecycle.

use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{check_transition, PlanStatus, PlanTransition, TransitionCheck};
use std::str::FromStr;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

const ALL_STATUSES: [PlanStatus; 5] = [
    PlanStatus::Draft,
    PlanStatus::Confirmed,
    PlanStatus::Started,
    PlanStatus::Completed,
    PlanStatus::Cancelled,
];

const ALL_TRANSITIONS: [PlanTransition; 4] = [
    PlanTransition::Confirm,
    PlanTransition::Start,
    PlanTransition::Complete,
    PlanTransition::Cancel,
];

#[cfg(test)]
mod transition_tests {
    use super::*;

    #[test]
    fn test_forward_path_is_allowed() {
        assert_eq!(
            check_transition(PlanStatus::Draft, PlanTransition::Confirm),
            TransitionCheck::Allowed
        );
        assert_eq!(
            check_transition(PlanStatus::Confirmed, PlanTransition::Start),
            TransitionCheck::Allowed
        );
        assert_eq!(
            check_transition(PlanStatus::Started, PlanTransition::Complete),
            TransitionCheck::Allowed
        );
    }

    #[test]
    fn test_cancel_from_draft_and_confirmed_only() {
        assert_eq!(
            check_transition(PlanStatus::Draft, PlanTransition::Cancel),
            TransitionCheck::Allowed
        );
        assert_eq!(
            check_transition(PlanStatus::Confirmed, PlanTransition::Cancel),
            TransitionCheck::Allowed
        );
        // Stock is already physically consumed once started
        assert_eq!(
            check_transition(PlanStatus::Started, PlanTransition::Cancel),
            TransitionCheck::Invalid
        );
        assert_eq!(
            check_transition(PlanStatus::Completed, PlanTransition::Cancel),
            TransitionCheck::Invalid
        );
    }

    #[test]
    fn test_no_stage_skipping() {
        assert_eq!(
            check_transition(PlanStatus::Draft, PlanTransition::Start),
            TransitionCheck::Invalid
        );
        assert_eq!(
            check_transition(PlanStatus::Draft, PlanTransition::Complete),
            TransitionCheck::Invalid
        );
        assert_eq!(
            check_transition(PlanStatus::Confirmed, PlanTransition::Complete),
            TransitionCheck::Invalid
        );
    }

    /// Re-invoking a transition that already happened is a no-op success,
    /// never a double allocation or deduction
    #[test]
    fn test_reinvocation_is_already_done() {
        assert_eq!(
            check_transition(PlanStatus::Confirmed, PlanTransition::Confirm),
            TransitionCheck::AlreadyDone
        );
        assert_eq!(
            check_transition(PlanStatus::Started, PlanTransition::Start),
            TransitionCheck::AlreadyDone
        );
        assert_eq!(
            check_transition(PlanStatus::Completed, PlanTransition::Complete),
            TransitionCheck::AlreadyDone
        );
        assert_eq!(
            check_transition(PlanStatus::Cancelled, PlanTransition::Cancel),
            TransitionCheck::AlreadyDone
        );
    }

    #[test]
    fn test_completed_and_cancelled_are_absorbing() {
        for status in [PlanStatus::Completed, PlanStatus::Cancelled] {
            assert!(status.is_absorbing());
            for transition in ALL_TRANSITIONS {
                let check = check_transition(status, transition);
                // Only the idempotent repeat of the terminal transition is a no-op
                if transition.target_status() == status {
                    assert_eq!(check, TransitionCheck::AlreadyDone);
                } else {
                    assert_eq!(check, TransitionCheck::Invalid);
                }
            }
        }
    }

    #[test]
    fn test_status_round_trips_through_strings() {
        for status in ALL_STATUSES {
            assert_eq!(PlanStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(PlanStatus::from_str("in_progress"), None);
    }
}

// Minimal allocation ledger for exercising lifecycle accounting without a
// database: confirm reserves, start consumes, cancel returns.
#[cfg(test)]
mod lifecycle_accounting {
    use super::*;

    #[derive(Debug, Clone)]
    struct SimAllocation {
        allocated: Decimal,
        used: Decimal,
        returned: Decimal,
    }

    #[derive(Debug, Clone)]
    struct SimLot {
        quantity: Decimal,
        reserved: Decimal,
    }

    fn reserve(lot: &mut SimLot, quantity: Decimal) -> SimAllocation {
        lot.reserved += quantity;
        SimAllocation {
            allocated: quantity,
            used: Decimal::ZERO,
            returned: Decimal::ZERO,
        }
    }

    fn start(lot: &mut SimLot, allocation: &mut SimAllocation) {
        lot.quantity -= allocation.allocated;
        lot.reserved -= allocation.allocated;
        allocation.used = allocation.allocated;
    }

    fn cancel(lot: &mut SimLot, allocation: &mut SimAllocation) {
        lot.reserved -= allocation.allocated;
        allocation.returned = allocation.allocated;
    }

    fn invariants_hold(lot: &SimLot, allocation: &SimAllocation) -> bool {
        lot.reserved >= Decimal::ZERO
            && lot.reserved <= lot.quantity
            && allocation.used + allocation.returned <= allocation.allocated
    }

    /// Happy path: reserve 11 of 20, start drops both quantity and
    /// reservation by 11, complete changes nothing physical
    #[test]
    fn test_happy_path_accounting() {
        let mut lot = SimLot { quantity: dec("20"), reserved: dec("0") };
        let mut allocation = reserve(&mut lot, dec("11"));
        assert!(invariants_hold(&lot, &allocation));
        assert_eq!(lot.reserved, dec("11"));

        start(&mut lot, &mut allocation);
        assert!(invariants_hold(&lot, &allocation));
        assert_eq!(lot.quantity, dec("9"));
        assert_eq!(lot.reserved, dec("0"));
        assert_eq!(allocation.used, dec("11"));

        // Completion: full allocation was deducted at start, so nothing is
        // returned and no further stock movement happens
        assert_eq!(allocation.returned, dec("0"));
        assert_eq!(allocation.used + allocation.returned, allocation.allocated);
    }

    /// Cancel after confirm releases the hold without touching on-hand
    #[test]
    fn test_cancel_releases_reservation() {
        let mut lot = SimLot { quantity: dec("20"), reserved: dec("0") };
        let mut allocation = reserve(&mut lot, dec("11"));

        cancel(&mut lot, &mut allocation);
        assert!(invariants_hold(&lot, &allocation));
        assert_eq!(lot.quantity, dec("20"));
        assert_eq!(lot.reserved, dec("0"));
        assert_eq!(allocation.returned, dec("11"));
        assert_eq!(allocation.used, dec("0"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// used + returned never exceeds allocated through either lifecycle
        #[test]
        fn prop_allocation_accounting_invariant(
            on_hand in (1i64..=10000i64).prop_map(|n| Decimal::new(n, 1)),
            fraction in 1u32..=100,
            cancelled in any::<bool>()
        ) {
            let mut lot = SimLot { quantity: on_hand, reserved: Decimal::ZERO };
            let quantity = on_hand * Decimal::from(fraction) / Decimal::from(100);
            let mut allocation = reserve(&mut lot, quantity);
            prop_assert!(invariants_hold(&lot, &allocation));

            if cancelled {
                cancel(&mut lot, &mut allocation);
            } else {
                start(&mut lot, &mut allocation);
            }

            prop_assert!(invariants_hold(&lot, &allocation));
            prop_assert_eq!(allocation.used + allocation.returned, allocation.allocated);
        }

        /// Every (status, transition) pair yields exactly one verdict, and
        /// AlreadyDone only when the plan already holds the target status
        #[test]
        fn prop_transition_table_total(
            status_idx in 0usize..5,
            transition_idx in 0usize..4
        ) {
            let status = ALL_STATUSES[status_idx];
            let transition = ALL_TRANSITIONS[transition_idx];
            let check = check_transition(status, transition);

            if status == transition.target_status() {
                prop_assert_eq!(check, TransitionCheck::AlreadyDone);
            } else {
                prop_assert_ne!(check, TransitionCheck::AlreadyDone);
            }
        }
    }
}
