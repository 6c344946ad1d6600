//! Property tests for the saturation controller.

use deepresearch::domain::models::SaturationConfig;
use deepresearch::services::{BatchObservation, SaturationController, StopDecision};
use proptest::prelude::*;

fn observation() -> impl Strategy<Value = BatchObservation> {
    (any::<bool>(), any::<bool>(), 0usize..6).prop_map(|(informative, dimensions_covered, tier1_sources)| {
        BatchObservation {
            informative,
            dimensions_covered,
            tier1_sources,
        }
    })
}

fn config() -> impl Strategy<Value = SaturationConfig> {
    (1u32..8, 1u32..12, 1u32..4, 1u32..12, 1u32..4, 0usize..4).prop_map(
        |(k_initial, extra, min_batches, cap, threshold, min_tier1)| SaturationConfig {
            k_initial,
            k_expand: k_initial + extra,
            min_batches,
            max_batches: min_batches + cap,
            saturation_threshold: threshold,
            min_tier1_sources: min_tier1,
        },
    )
}

/// Feed observations until the controller stops; returns decisions and k values.
fn drive(config: SaturationConfig, observations: &[BatchObservation]) -> (Vec<StopDecision>, Vec<u32>) {
    let mut controller = SaturationController::new(config);
    let mut decisions = Vec::new();
    for obs in observations {
        let decision = controller.record(*obs);
        decisions.push(decision);
        if decision.is_stop() {
            break;
        }
    }
    (decisions, controller.k_history().to_vec())
}

proptest! {
    #[test]
    fn same_observations_same_decisions(
        config in config(),
        observations in proptest::collection::vec(observation(), 1..30),
    ) {
        prop_assert_eq!(drive(config, &observations), drive(config, &observations));
    }

    #[test]
    fn never_exceeds_batch_cap(
        config in config(),
        observations in proptest::collection::vec(observation(), 30),
    ) {
        let (decisions, _) = drive(config, &observations);
        prop_assert!(decisions.len() as u32 <= config.max_batches);
        prop_assert!(decisions.last().is_some_and(|d| d.is_stop()));
    }

    #[test]
    fn k_is_initial_or_expanded(
        config in config(),
        observations in proptest::collection::vec(observation(), 1..30),
    ) {
        let (_, ks) = drive(config, &observations);
        for (i, k) in ks.iter().enumerate() {
            prop_assert!(*k == config.k_initial || *k == config.k_expand);
            if i < 2 {
                prop_assert_eq!(*k, config.k_initial);
            }
        }
    }

    #[test]
    fn saturated_only_after_min_batches_and_threshold(
        config in config(),
        observations in proptest::collection::vec(observation(), 1..30),
    ) {
        let (decisions, _) = drive(config, &observations);
        if decisions.last() == Some(&StopDecision::Saturated) {
            let n = decisions.len();
            prop_assert!(n as u32 >= config.min_batches);
            let last = observations[n - 1];
            prop_assert!(last.dimensions_covered);
            prop_assert!(last.tier1_sources >= config.min_tier1_sources);
            let tail = &observations[n - config.saturation_threshold as usize..n];
            prop_assert!(tail.iter().all(|o| !o.informative));
        }
    }
}
