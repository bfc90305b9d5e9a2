//! Property-based tests for wgsweep-core.
//!
//! Key invariants:
//! - Grid enumeration is deterministic and yields exactly a·b·c points
//! - Every enumerated point is distinct and drawn from the axes
//! - Aggregation is idempotent
//! - `best` is the first minimal point in enumeration order
//! - One failing point out of N leaves N−1 timings

use std::collections::HashSet;

use proptest::prelude::*;
use wgsweep_core::{
    ConfigurationPoint, Grid, InvocationFailure, InvocationResult, aggregate, export,
};

fn axis() -> impl Strategy<Value = Vec<u32>> {
    prop::collection::hash_set(1u32..=1024, 1..6).prop_map(|set| {
        let mut values: Vec<u32> = set.into_iter().collect();
        values.sort_unstable();
        values
    })
}

fn grid() -> impl Strategy<Value = Grid> {
    (axis(), axis(), axis()).prop_map(|(a, b, c)| Grid::from_values([a, b, c]).unwrap())
}

/// One invocation result per point, each either a timing or a failure.
fn results_for(grid: &Grid, outcomes: &[Option<u16>]) -> Vec<InvocationResult> {
    grid.points()
        .zip(outcomes.iter().cycle())
        .map(|(point, outcome)| match outcome {
            Some(ms) => InvocationResult::success(point, f64::from(*ms) / 1000.0),
            None => InvocationResult::failure(point, InvocationFailure::UnparsableTiming),
        })
        .collect()
}

proptest! {
    #[test]
    fn enumeration_is_deterministic(g in grid()) {
        let first: Vec<ConfigurationPoint> = g.points().collect();
        let second: Vec<ConfigurationPoint> = g.points().collect();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn enumeration_count_is_product(g in grid()) {
        let expected = g.axis(0).len() * g.axis(1).len() * g.axis(2).len();
        prop_assert_eq!(g.points().count(), expected);
        prop_assert_eq!(g.len(), expected);
    }

    #[test]
    fn enumerated_points_are_distinct_and_on_axes(g in grid()) {
        let mut seen = HashSet::new();
        for point in g.points() {
            prop_assert!(seen.insert(point), "point {} repeated", point);
            for (dim, value) in point.values().into_iter().enumerate() {
                prop_assert!(g.axis(dim).values().contains(&value));
            }
        }
    }

    #[test]
    fn last_axis_varies_fastest(g in grid()) {
        let points: Vec<ConfigurationPoint> = g.points().collect();
        let inner = g.axis(2).values();
        for chunk in points.chunks(inner.len()) {
            let third: Vec<u32> = chunk.iter().map(|p| p.values()[2]).collect();
            prop_assert_eq!(third.as_slice(), inner);
        }
    }

    #[test]
    fn aggregation_is_idempotent(
        g in grid(),
        outcomes in prop::collection::vec(prop::option::of(1u16..5000), 1..20)
    ) {
        let results = results_for(&g, &outcomes);
        prop_assert_eq!(aggregate("X", &results), aggregate("X", &results));
    }

    #[test]
    fn best_is_first_minimum(
        g in grid(),
        outcomes in prop::collection::vec(prop::option::of(1u16..20), 1..20)
    ) {
        let results = results_for(&g, &outcomes);
        let summary = aggregate("X", &results);
        let first_min = results
            .iter()
            .filter_map(|r| r.timing_seconds.map(|t| (r.point, t)))
            .fold(None::<(ConfigurationPoint, f64)>, |acc, (p, t)| match acc {
                Some((_, best)) if best <= t => acc,
                _ => Some((p, t)),
            });
        prop_assert_eq!(summary.best.map(|b| (b.point, b.seconds)), first_min);
        prop_assert_eq!(summary.has_data, first_min.is_some());
    }

    #[test]
    fn single_failure_leaves_n_minus_one(g in grid(), pick in any::<prop::sample::Index>()) {
        prop_assume!(g.len() > 1);
        let failing = pick.index(g.len());
        let results: Vec<InvocationResult> = g
            .points()
            .enumerate()
            .map(|(i, point)| {
                if i == failing {
                    InvocationResult::failure(point, InvocationFailure::ExitStatus { code: Some(1) })
                } else {
                    InvocationResult::success(point, 0.001 * (i + 1) as f64)
                }
            })
            .collect();
        let summary = aggregate("X", &results);
        prop_assert_eq!(summary.timings.len(), g.len() - 1);
        prop_assert!(summary.has_data);
        prop_assert_eq!(summary.failed, 1);
    }

    #[test]
    fn all_failures_are_absent_from_report(g in grid()) {
        let results = results_for(&g, &[None]);
        let summary = aggregate("X", &results);
        prop_assert!(!summary.has_data);
        prop_assert!(!export([&summary]).contains("X"));
    }
}
