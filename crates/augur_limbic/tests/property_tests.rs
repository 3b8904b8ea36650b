//! Property-based tests for the adaptive threshold tracker.
//!
//! Verifies that derived thresholds never drop below their floors and that
//! the EMA stays between the previous average and the observation.

use augur_limbic::{
    compute_adaptive_thresholds, DominantStreak, Metric, ObservedMetrics, RollingAverages,
    Threshold,
};
use augur_core::PrimaryEmotion;
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

fn arb_metric() -> impl Strategy<Value = Metric> {
    prop::sample::select(Metric::ALL.to_vec())
}

fn arb_observation() -> impl Strategy<Value = ObservedMetrics> {
    prop::collection::vec((arb_metric(), 0.0f64..1.0e9), 0..10).prop_map(|pairs| {
        let mut observed = ObservedMetrics::new();
        for (m, v) in pairs {
            observed.insert(m, v);
        }
        observed
    })
}

fn arb_averages() -> impl Strategy<Value = RollingAverages> {
    prop::collection::vec(0.0f64..1.0e9, Metric::ALL.len()).prop_map(|values| {
        let mut avg = RollingAverages::default();
        for (m, v) in Metric::ALL.into_iter().zip(values) {
            avg.averages.insert(m, v);
        }
        avg
    })
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// **Core invariant**: no threshold ever falls below its floor.
    #[test]
    fn thresholds_never_below_floor(avg in arb_averages()) {
        let thresholds = compute_adaptive_thresholds(&avg);
        for t in Threshold::ALL {
            prop_assert!(thresholds.get(t) >= t.floor(), "{:?}: {}", t, thresholds.get(t));
            prop_assert!(thresholds.get(t).is_finite());
        }
    }

    /// The EMA lands between the previous average and the observation.
    #[test]
    fn ema_is_a_convex_combination(avg in arb_averages(), obs in arb_observation()) {
        let next = avg.update(&obs);
        for m in Metric::ALL {
            let prev = avg.get(m);
            match obs.get(m) {
                Some(v) => {
                    let lo = prev.min(v) - 1e-6;
                    let hi = prev.max(v) + 1e-6;
                    prop_assert!(next.get(m) >= lo && next.get(m) <= hi);
                }
                None => prop_assert_eq!(next.get(m), prev),
            }
        }
        prop_assert_eq!(next.cycles_tracked, avg.cycles_tracked + 1);
    }

    /// Streak length equals the run of identical trailing observations.
    #[test]
    fn streak_matches_trailing_run(
        seq in prop::collection::vec(prop::sample::select(PrimaryEmotion::ALL.to_vec()), 1..40)
    ) {
        let mut streak = DominantStreak::default();
        for &e in &seq {
            streak.observe(e);
        }
        let last = *seq.last().unwrap();
        let run = seq.iter().rev().take_while(|&&e| e == last).count() as u32;
        prop_assert_eq!(streak.emotion, last);
        prop_assert_eq!(streak.length, run);
    }
}
