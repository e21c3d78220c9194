//! Allocation planner tests
//!
//! Covers FEFO lot ordering and the all-or-nothing draw planning that
//! backs both plan confirmation and goods issue.

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{fefo_cmp, plan_draws, sort_fefo, LotAvailability};
use std::cmp::Ordering;
use std::str::FromStr;
use uuid::Uuid;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn lot(
    id: u128,
    available: &str,
    expiry: Option<NaiveDate>,
    manufacture: Option<NaiveDate>,
) -> LotAvailability {
    LotAvailability {
        lot_id: Uuid::from_u128(id),
        warehouse_id: Uuid::from_u128(900),
        available: dec(available),
        expiry_date: expiry,
        manufacture_date: manufacture,
    }
}

#[cfg(test)]
mod fefo_tests {
    use super::*;

    #[test]
    fn test_earliest_expiry_first() {
        let a = lot(1, "10", Some(date(2026, 3, 1)), None);
        let b = lot(2, "10", Some(date(2026, 1, 1)), None);

        assert_eq!(fefo_cmp(&b, &a), Ordering::Less);
    }

    #[test]
    fn test_undated_lots_sort_last() {
        let dated = lot(1, "10", Some(date(2027, 12, 31)), None);
        let undated = lot(2, "10", None, None);

        assert_eq!(fefo_cmp(&dated, &undated), Ordering::Less);
    }

    #[test]
    fn test_manufacture_date_breaks_expiry_tie() {
        let expiry = Some(date(2026, 6, 1));
        let older = lot(5, "10", expiry, Some(date(2026, 1, 10)));
        let newer = lot(4, "10", expiry, Some(date(2026, 2, 10)));

        assert_eq!(fefo_cmp(&older, &newer), Ordering::Less);
    }

    #[test]
    fn test_lot_id_is_final_tiebreak() {
        let a = lot(1, "10", None, None);
        let b = lot(2, "10", None, None);

        assert_eq!(fefo_cmp(&a, &b), Ordering::Less);
        assert_eq!(fefo_cmp(&b, &a), Ordering::Greater);
    }

    #[test]
    fn test_sort_is_deterministic() {
        let mut lots = vec![
            lot(3, "5", None, None),
            lot(1, "5", Some(date(2026, 5, 1)), None),
            lot(2, "5", Some(date(2026, 2, 1)), Some(date(2025, 12, 1))),
            lot(4, "5", Some(date(2026, 2, 1)), Some(date(2025, 11, 1))),
        ];
        sort_fefo(&mut lots);

        let order: Vec<u128> = lots.iter().map(|l| l.lot_id.as_u128()).collect();
        assert_eq!(order, vec![4, 2, 1, 3]);
    }
}

#[cfg(test)]
mod planning_tests {
    use super::*;

    #[test]
    fn test_single_lot_covers_requirement() {
        let lots = vec![lot(1, "20", None, None)];
        let draws = plan_draws(dec("11"), &lots).unwrap();

        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].quantity, dec("11"));
    }

    #[test]
    fn test_requirement_splits_across_lots() {
        let lots = vec![
            lot(1, "4", Some(date(2026, 1, 1)), None),
            lot(2, "4", Some(date(2026, 2, 1)), None),
            lot(3, "10", None, None),
        ];
        let draws = plan_draws(dec("10"), &lots).unwrap();

        assert_eq!(draws.len(), 3);
        assert_eq!(draws[0].quantity, dec("4"));
        assert_eq!(draws[1].quantity, dec("4"));
        assert_eq!(draws[2].quantity, dec("2"));
    }

    /// Requirement 11 against availability 5 is short by 6
    #[test]
    fn test_shortage_reports_missing_amount() {
        let lots = vec![lot(1, "5", None, None)];
        let shortage = plan_draws(dec("11"), &lots).unwrap_err();

        assert_eq!(shortage.shortage, dec("6"));
    }

    #[test]
    fn test_shortage_with_no_lots() {
        let shortage = plan_draws(dec("7"), &[]).unwrap_err();
        assert_eq!(shortage.shortage, dec("7"));
    }

    #[test]
    fn test_drained_lots_are_skipped() {
        let lots = vec![lot(1, "0", Some(date(2026, 1, 1)), None), lot(2, "9", None, None)];
        let draws = plan_draws(dec("9"), &lots).unwrap();

        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].lot_id, Uuid::from_u128(2));
    }

    #[test]
    fn test_exact_fit_leaves_no_remainder() {
        let lots = vec![lot(1, "6", None, None), lot(2, "4", None, None)];
        let draws = plan_draws(dec("10"), &lots).unwrap();

        let total: Decimal = draws.iter().map(|d| d.quantity).sum();
        assert_eq!(total, dec("10"));
    }
}

// Minimal multi-material reservation pass: draws are applied per material
// and every applied draw is undone when a later material comes up short,
// mirroring the rollback of the enclosing database transaction.
#[cfg(test)]
mod atomicity_tests {
    use super::*;

    fn reserve_all(
        requirements: &[(usize, Decimal)],
        stock: &mut [Vec<LotAvailability>],
    ) -> Result<(), Decimal> {
        let mut applied: Vec<(usize, Uuid, Decimal)> = Vec::new();

        for (material, required) in requirements {
            match plan_draws(*required, &stock[*material]) {
                Ok(draws) => {
                    for draw in draws {
                        let lot = stock[*material]
                            .iter_mut()
                            .find(|l| l.lot_id == draw.lot_id)
                            .unwrap();
                        lot.available -= draw.quantity;
                        applied.push((*material, draw.lot_id, draw.quantity));
                    }
                }
                Err(shortage) => {
                    for (material, lot_id, quantity) in applied.into_iter().rev() {
                        let lot = stock[material]
                            .iter_mut()
                            .find(|l| l.lot_id == lot_id)
                            .unwrap();
                        lot.available += quantity;
                    }
                    return Err(shortage.shortage);
                }
            }
        }

        Ok(())
    }

    /// Two materials reserve fine, the third is short; every reservation
    /// already applied is undone and all lots end where they started
    #[test]
    fn test_shortage_on_one_material_undoes_every_reservation() {
        let mut stock = vec![
            vec![lot(1, "20", None, None)],
            vec![lot(2, "8", Some(date(2026, 2, 1)), None), lot(3, "7", None, None)],
            vec![lot(4, "5", None, None)],
        ];
        let before: Vec<Vec<Decimal>> = stock
            .iter()
            .map(|lots| lots.iter().map(|l| l.available).collect())
            .collect();

        let shortage = reserve_all(
            &[(0, dec("10")), (1, dec("12")), (2, dec("11"))],
            &mut stock,
        )
        .unwrap_err();
        assert_eq!(shortage, dec("6"));

        let after: Vec<Vec<Decimal>> = stock
            .iter()
            .map(|lots| lots.iter().map(|l| l.available).collect())
            .collect();
        assert_eq!(after, before);
    }

    #[test]
    fn test_all_materials_covered_applies_every_draw() {
        let mut stock = vec![
            vec![lot(1, "20", None, None)],
            vec![lot(2, "8", Some(date(2026, 2, 1)), None), lot(3, "7", None, None)],
        ];

        reserve_all(&[(0, dec("10")), (1, dec("12"))], &mut stock).unwrap();

        assert_eq!(stock[0][0].available, dec("10"));
        assert_eq!(stock[1][0].available, dec("0"));
        assert_eq!(stock[1][1].available, dec("3"));
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;

    fn availability_strategy() -> impl Strategy<Value = Decimal> {
        (0i64..=5000i64).prop_map(|n| Decimal::new(n, 1)) // 0.0 to 500.0
    }

    fn lots_strategy() -> impl Strategy<Value = Vec<LotAvailability>> {
        prop::collection::vec(availability_strategy(), 1..12).prop_map(|avails| {
            avails
                .into_iter()
                .enumerate()
                .map(|(i, available)| LotAvailability {
                    lot_id: Uuid::from_u128(i as u128 + 1),
                    warehouse_id: Uuid::from_u128(900),
                    available,
                    expiry_date: None,
                    manufacture_date: None,
                })
                .collect()
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// A successful plan always draws exactly the required quantity
        #[test]
        fn prop_draws_sum_to_requirement(
            lots in lots_strategy(),
            required in (1i64..=5000i64).prop_map(|n| Decimal::new(n, 1))
        ) {
            match plan_draws(required, &lots) {
                Ok(draws) => {
                    let total: Decimal = draws.iter().map(|d| d.quantity).sum();
                    prop_assert_eq!(total, required);
                }
                Err(shortage) => {
                    let capacity: Decimal = lots.iter().map(|l| l.available).sum();
                    prop_assert_eq!(shortage.shortage, required - capacity);
                    prop_assert!(capacity < required);
                }
            }
        }

        /// No draw ever exceeds its lot's availability
        #[test]
        fn prop_draws_within_availability(
            lots in lots_strategy(),
            required in (1i64..=5000i64).prop_map(|n| Decimal::new(n, 1))
        ) {
            if let Ok(draws) = plan_draws(required, &lots) {
                for draw in &draws {
                    let source = lots.iter().find(|l| l.lot_id == draw.lot_id).unwrap();
                    prop_assert!(draw.quantity <= source.available);
                    prop_assert!(draw.quantity > Decimal::ZERO);
                }
            }
        }

        /// Each lot is drawn from at most once per planning pass
        #[test]
        fn prop_no_duplicate_lots_in_plan(
            lots in lots_strategy(),
            required in (1i64..=5000i64).prop_map(|n| Decimal::new(n, 1))
        ) {
            if let Ok(draws) = plan_draws(required, &lots) {
                let mut ids: Vec<Uuid> = draws.iter().map(|d| d.lot_id).collect();
                ids.sort();
                ids.dedup();
                prop_assert_eq!(ids.len(), draws.len());
            }
        }

        /// FEFO sorting is total and stable under repetition
        #[test]
        fn prop_sort_idempotent(mut lots in lots_strategy()) {
            sort_fefo(&mut lots);
            let once: Vec<Uuid> = lots.iter().map(|l| l.lot_id).collect();
            sort_fefo(&mut lots);
            let twice: Vec<Uuid> = lots.iter().map(|l| l.lot_id).collect();
            prop_assert_eq!(once, twice);
        }
    }
}
