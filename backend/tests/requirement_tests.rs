//! Requirement calculation tests
//!
//! Covers the per-material requirement arithmetic driven by the active
//! bill of materials: net usage, scrap, and cost rollup.

use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{compute_requirements, total_cost, RequirementLine};
use std::str::FromStr;
use uuid::Uuid;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn line(usage: &str, scrap: &str, cost: &str) -> RequirementLine {
    RequirementLine {
        material_id: Uuid::new_v4(),
        material_name: "Steel plate".to_string(),
        usage_per_piece: dec(usage),
        scrap_factor: dec(scrap),
        unit: "kg".to_string(),
        unit_cost: dec(cost),
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// usage 2 with 10% scrap to build 5 units requires 11
    #[test]
    fn test_requirement_with_scrap() {
        let lines = vec![line("2", "0.1", "3")];
        let reqs = compute_requirements(dec("5"), &lines);

        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].required_quantity, dec("11.0"));
        assert_eq!(reqs[0].total_cost, dec("33.0"));
    }

    #[test]
    fn test_requirement_without_scrap() {
        let lines = vec![line("4", "0", "2.5")];
        let reqs = compute_requirements(dec("10"), &lines);

        assert_eq!(reqs[0].required_quantity, dec("40.0"));
        assert_eq!(reqs[0].total_cost, dec("100.0"));
    }

    #[test]
    fn test_one_entry_per_material() {
        let lines = vec![line("2", "0.1", "3"), line("1", "0.05", "8"), line("0.5", "0", "20")];
        let reqs = compute_requirements(dec("100"), &lines);

        assert_eq!(reqs.len(), 3);
        for (req, l) in reqs.iter().zip(&lines) {
            assert_eq!(req.material_id, l.material_id);
            assert_eq!(req.unit_cost, l.unit_cost);
        }
    }

    #[test]
    fn test_total_cost_rollup() {
        let lines = vec![line("2", "0", "5"), line("3", "0", "10")];
        let reqs = compute_requirements(dec("2"), &lines);

        // 2*2*5 + 3*2*10 = 20 + 60
        assert_eq!(total_cost(&reqs), dec("80"));
    }

    #[test]
    fn test_empty_bom_yields_no_requirements() {
        let reqs = compute_requirements(dec("5"), &[]);
        assert!(reqs.is_empty());
    }

    /// Fractional usage and scrap keep exact decimal arithmetic
    #[test]
    fn test_fractional_usage() {
        let lines = vec![line("0.25", "0.04", "12")];
        let reqs = compute_requirements(dec("8"), &lines);

        // net 2, scrap 0.08, required 2.08
        assert_eq!(reqs[0].required_quantity, dec("2.0800"));
        assert_eq!(reqs[0].total_cost, dec("24.9600"));
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;

    fn quantity_strategy() -> impl Strategy<Value = Decimal> {
        (1i64..=10000i64).prop_map(|n| Decimal::new(n, 1)) // 0.1 to 1000.0
    }

    fn scrap_strategy() -> impl Strategy<Value = Decimal> {
        (0i64..=500i64).prop_map(|n| Decimal::new(n, 3)) // 0.000 to 0.500
    }

    fn price_strategy() -> impl Strategy<Value = Decimal> {
        (1i64..=100000i64).prop_map(|n| Decimal::new(n, 2)) // 0.01 to 1000.00
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// required = net * (1 + scrap_factor), so scrap never reduces need
        #[test]
        fn prop_required_at_least_net(
            usage in quantity_strategy(),
            scrap in scrap_strategy(),
            target in quantity_strategy()
        ) {
            let lines = vec![RequirementLine {
                material_id: Uuid::new_v4(),
                material_name: "m".to_string(),
                usage_per_piece: usage,
                scrap_factor: scrap,
                unit: "kg".to_string(),
                unit_cost: Decimal::ONE,
            }];
            let reqs = compute_requirements(target, &lines);

            let net = usage * target;
            prop_assert!(reqs[0].required_quantity >= net);
            prop_assert_eq!(reqs[0].required_quantity, net + net * scrap);
        }

        /// Cost is always required_quantity * unit_cost
        #[test]
        fn prop_cost_consistent(
            usage in quantity_strategy(),
            scrap in scrap_strategy(),
            target in quantity_strategy(),
            price in price_strategy()
        ) {
            let lines = vec![RequirementLine {
                material_id: Uuid::new_v4(),
                material_name: "m".to_string(),
                usage_per_piece: usage,
                scrap_factor: scrap,
                unit: "kg".to_string(),
                unit_cost: price,
            }];
            let reqs = compute_requirements(target, &lines);

            prop_assert_eq!(reqs[0].total_cost, reqs[0].required_quantity * price);
        }

        /// Doubling the target doubles every requirement
        #[test]
        fn prop_requirements_scale_linearly(
            usage in quantity_strategy(),
            scrap in scrap_strategy(),
            target in quantity_strategy()
        ) {
            let lines = vec![RequirementLine {
                material_id: Uuid::new_v4(),
                material_name: "m".to_string(),
                usage_per_piece: usage,
                scrap_factor: scrap,
                unit: "kg".to_string(),
                unit_cost: Decimal::ONE,
            }];
            let single = compute_requirements(target, &lines);
            let double = compute_requirements(target * Decimal::from(2), &lines);

            prop_assert_eq!(
                double[0].required_quantity,
                single[0].required_quantity * Decimal::from(2)
            );
        }

        /// Total cost equals the sum of the per-material costs
        #[test]
        fn prop_total_cost_is_sum(
            usages in prop::collection::vec(quantity_strategy(), 1..6),
            target in quantity_strategy()
        ) {
            let lines: Vec<RequirementLine> = usages
                .iter()
                .map(|u| RequirementLine {
                    material_id: Uuid::new_v4(),
                    material_name: "m".to_string(),
                    usage_per_piece: *u,
                    scrap_factor: Decimal::ZERO,
                    unit: "kg".to_string(),
                    unit_cost: Decimal::from(3),
                })
                .collect();
            let reqs = compute_requirements(target, &lines);

            let expected: Decimal = reqs.iter().map(|r| r.total_cost).sum();
            prop_assert_eq!(total_cost(&reqs), expected);
        }
    }
}
