//! Cycle Coordinator - one heartbeat of the engine, end to end.
//!
//! Owns the loaded [`EngineState`] and runs the pipeline:
//! - calibrate: fold this cycle's metrics into the rolling averages
//! - learn: apply feedback adjustments, then drift weights toward neutral
//! - feel: weight the stimuli, decay for elapsed time, stimulate, update mood
//! - predict: snapshot the weighted stimuli against the current market
//! - score: evaluate snapshots that reached the horizon
//!
//! Without a [`StateStore`] everything stays in memory. With one, a cycle
//! whose state cannot be persisted is rolled back in memory too, so the
//! engine never runs ahead of what a restart would load.

use anyhow::{Context, Result};
use augur_core::{EmotionState, EmotionStimulus, EngineConfig};
use augur_limbic::{compute_adaptive_thresholds, AdaptiveThresholds, ObservedMetrics};
use serde::Serialize;

use crate::intake::{CycleInput, RawCycleInput};
use crate::prophecy::{create_prophecy_snapshot, ProphecyEvaluation, ProphecyStats};
use crate::store::{EngineState, StateStore};
use crate::weights::{StrategyWeights, WeightAdjustmentResult};

/// Everything a cycle produced.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub timestamp: i64,
    pub minutes_elapsed: f32,
    pub thresholds: AdaptiveThresholds,
    pub state: EmotionState,
    pub weighted_stimuli: Vec<EmotionStimulus>,
    pub adjustments: Vec<WeightAdjustmentResult>,
    pub evaluations: Vec<ProphecyEvaluation>,
    pub weights: StrategyWeights,
}

pub struct CycleCoordinator {
    config: EngineConfig,
    engine: EngineState,
    store: Option<StateStore>,
}

impl CycleCoordinator {
    /// In-memory coordinator starting from defaults.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            engine: EngineState::default(),
            store: None,
        }
    }

    /// Coordinator backed by the JSON files in `config.data_dir`.
    pub fn open(config: EngineConfig) -> Self {
        let store = StateStore::new(config.data_dir.clone());
        let engine = store.load_engine();
        tracing::info!(
            "Loaded engine state from {} (cycle {}, {} snapshots)",
            store.dir().display(),
            engine.meta.cycle,
            engine.ledger.len()
        );
        Self {
            config,
            engine,
            store: Some(store),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn engine(&self) -> &EngineState {
        &self.engine
    }

    pub fn state(&self) -> &EmotionState {
        &self.engine.emotion
    }

    pub fn weights(&self) -> &StrategyWeights {
        &self.engine.weights
    }

    pub fn stats(&self) -> &ProphecyStats {
        &self.engine.stats
    }

    pub fn cycle(&self) -> u64 {
        self.engine.meta.cycle
    }

    pub fn thresholds(&self) -> AdaptiveThresholds {
        compute_adaptive_thresholds(&self.engine.averages)
    }

    /// Fold observed metrics into the rolling averages and return the
    /// thresholds the detectors should use this cycle.
    pub fn calibrate(&mut self, metrics: &ObservedMetrics) -> AdaptiveThresholds {
        self.engine.averages = self.engine.averages.update(metrics);
        self.thresholds()
    }

    /// Whether the last completed cycle consumed the input keyed `key`.
    pub fn already_applied(&self, key: &str) -> bool {
        self.engine.meta.last_input.as_deref() == Some(key)
    }

    /// Sanitize a raw input file and run one full cycle on it.
    pub fn run_raw(&mut self, raw: RawCycleInput) -> Result<CycleReport> {
        let (metrics, input) = raw.into_parts(self.config.max_adjustments_per_cycle);
        let before = self.engine.clone();
        self.calibrate(&metrics);
        let report = self.step(input);
        self.persist(before, report)
    }

    /// Run the learn / feel / predict / score half of a cycle and persist.
    pub fn advance(&mut self, input: CycleInput) -> Result<CycleReport> {
        let before = self.engine.clone();
        let report = self.step(input);
        self.persist(before, report)
    }

    fn step(&mut self, input: CycleInput) -> CycleReport {
        let timestamp = input
            .timestamp
            .unwrap_or_else(|| chrono::Utc::now().timestamp());
        let cycle = self.engine.meta.cycle + 1;

        // Learn
        let adjustments = self.engine.weights.apply_adjustments(&input.adjustments);
        self.engine.weights.decay();
        let weighted = self.engine.weights.apply_to(&input.stimuli);

        // Feel
        let minutes_elapsed = self
            .engine
            .meta
            .last_cycle_at
            .map(|prev| (timestamp - prev).max(0) as f32 / 60.0)
            .unwrap_or(0.0);
        let inertia = self.engine.meta.streak.inertia();
        let mut state = self
            .engine
            .emotion
            .decay(minutes_elapsed)
            .stimulate(&weighted, inertia.as_ref())
            .update_mood();
        state.last_updated = timestamp;
        self.engine.meta.streak.observe(state.dominant);
        self.engine.emotion = state;

        // Predict
        let market = input.market.unwrap_or_default();
        self.engine
            .ledger
            .record(create_prophecy_snapshot(cycle, timestamp, market, &weighted));

        // Score
        let evaluations = match &input.market {
            Some(current) => {
                let evals =
                    self.engine
                        .ledger
                        .evaluate_due(cycle, self.config.evaluation_horizon, current);
                for eval in &evals {
                    self.engine
                        .stats
                        .record(eval, self.config.recent_results_capacity);
                }
                evals
            }
            None => Vec::new(),
        };
        self.engine.ledger.prune(self.config.max_snapshots);

        self.engine.meta.cycle = cycle;
        self.engine.meta.last_cycle_at = Some(timestamp);
        self.engine.meta.last_input = input.source;

        CycleReport {
            cycle,
            timestamp,
            minutes_elapsed,
            thresholds: self.thresholds(),
            state: self.engine.emotion.clone(),
            weighted_stimuli: weighted,
            adjustments,
            evaluations,
            weights: self.engine.weights.clone(),
        }
    }

    /// Save the stepped engine, or restore `before` if it cannot be saved.
    fn persist(&mut self, before: EngineState, report: CycleReport) -> Result<CycleReport> {
        if let Some(store) = &self.store {
            if let Err(e) = store.save_engine(&self.engine) {
                self.engine = before;
                return Err(e).with_context(|| format!("Failed to persist cycle {}", report.cycle));
            }
        }

        tracing::info!(
            "Cycle {}: {} (streak {}), {} stimuli, {} adjustments, {} evaluations",
            report.cycle,
            report.state.dominant_label,
            self.engine.meta.streak.length,
            report.weighted_stimuli.len(),
            report.adjustments.len(),
            report.evaluations.len()
        );
        Ok(report)
    }

    /// Drop all state back to defaults, deleting persisted files.
    pub fn reset(&mut self) -> Result<usize> {
        self.engine = EngineState::default();
        match &self.store {
            Some(store) => store.clear().context("Failed to clear engine state"),
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prophecy::MarketFeatures;
    use crate::weights::{AdjustmentDirection, AdjustmentMagnitude, WeightAdjustment};
    use augur_core::{PrimaryEmotion, StrategyWeightKey};
    use augur_limbic::{Metric, Threshold};

    fn fear(intensity: f32) -> EmotionStimulus {
        EmotionStimulus::new(PrimaryEmotion::Fear, intensity, "whale dump")
            .with_category(StrategyWeightKey::WhaleTransferFear)
    }

    fn market(price: f64) -> MarketFeatures {
        MarketFeatures {
            price,
            tvl: 1e6,
            volume: 5e4,
            gas_price: 30.0,
        }
    }

    #[test]
    fn test_empty_cycle_counts() {
        let mut coord = CycleCoordinator::new(EngineConfig::default());
        let report = coord.advance(CycleInput::default()).unwrap();
        assert_eq!(report.cycle, 1);
        assert_eq!(coord.cycle(), 1);
        assert_eq!(report.state.dominant, PrimaryEmotion::Anticipation);
        assert_eq!(coord.engine().ledger.len(), 1);
    }

    #[test]
    fn test_fear_cycle_reaches_terror() {
        let mut coord = CycleCoordinator::new(EngineConfig::default());
        let report = coord
            .advance(CycleInput {
                stimuli: vec![fear(0.8)],
                ..Default::default()
            })
            .unwrap();
        assert_eq!(report.state.dominant, PrimaryEmotion::Fear);
        assert_eq!(report.state.dominant_label, "terror");
        assert_eq!(coord.engine().meta.streak.emotion, PrimaryEmotion::Fear);
    }

    #[test]
    fn test_adjustment_then_decay_then_scale() {
        let mut coord = CycleCoordinator::new(EngineConfig::default());
        let report = coord
            .advance(CycleInput {
                stimuli: vec![fear(0.5)],
                adjustments: vec![WeightAdjustment::new(
                    StrategyWeightKey::WhaleTransferFear,
                    AdjustmentDirection::Increase,
                )
                .with_magnitude(AdjustmentMagnitude::Strong)],
                ..Default::default()
            })
            .unwrap();
        // 1.2 after the increase, one decay step toward 1.0
        let w = 1.2 + (1.0 - 1.2) * 0.005;
        assert!((report.weights.get(StrategyWeightKey::WhaleTransferFear) - w).abs() < 1e-5);
        assert!((report.weighted_stimuli[0].intensity - 0.5 * w).abs() < 1e-5);
        assert_eq!(report.adjustments.len(), 1);
    }

    #[test]
    fn test_elapsed_time_decays_between_cycles() {
        let mut coord = CycleCoordinator::new(EngineConfig::default());
        coord
            .advance(CycleInput {
                stimuli: vec![fear(0.8)],
                timestamp: Some(1_000_000),
                ..Default::default()
            })
            .unwrap();
        let before = coord.state().emotions.get(PrimaryEmotion::Fear);
        let report = coord
            .advance(CycleInput {
                timestamp: Some(1_000_000 + 30 * 60),
                ..Default::default()
            })
            .unwrap();
        assert!((report.minutes_elapsed - 30.0).abs() < 1e-4);
        assert!(report.state.emotions.get(PrimaryEmotion::Fear) < before);
    }

    #[test]
    fn test_calibrate_raises_thresholds() {
        let mut coord = CycleCoordinator::new(EngineConfig::default());
        let before = coord.thresholds().get(Threshold::WhaleTransfer);
        let after = coord
            .calibrate(&ObservedMetrics::new().with(Metric::PeakTransfer, 5_000_000.0))
            .get(Threshold::WhaleTransfer);
        assert!(after > before);
    }

    #[test]
    fn test_prophecy_scored_at_horizon() {
        let config = EngineConfig {
            evaluation_horizon: 3,
            ..EngineConfig::default()
        };
        let mut coord = CycleCoordinator::new(config);
        coord
            .advance(CycleInput {
                stimuli: vec![fear(0.6)],
                market: Some(market(100.0)),
                ..Default::default()
            })
            .unwrap();
        for _ in 0..2 {
            let r = coord
                .advance(CycleInput {
                    market: Some(market(99.0)),
                    ..Default::default()
                })
                .unwrap();
            assert!(r.evaluations.is_empty());
        }
        let r = coord
            .advance(CycleInput {
                market: Some(market(95.0)),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(r.evaluations.len(), 1);
        assert_eq!(r.evaluations[0].snapshot_cycle, 1);
        assert_eq!(coord.stats().total_evaluations, 1);
        assert_eq!(coord.stats().correct_evaluations, 1);
    }

    #[test]
    fn test_scoring_deferred_without_market() {
        let config = EngineConfig {
            evaluation_horizon: 1,
            ..EngineConfig::default()
        };
        let mut coord = CycleCoordinator::new(config);
        coord
            .advance(CycleInput {
                stimuli: vec![fear(0.6)],
                market: Some(market(100.0)),
                ..Default::default()
            })
            .unwrap();
        let r = coord.advance(CycleInput::default()).unwrap();
        assert!(r.evaluations.is_empty());
        let r = coord
            .advance(CycleInput {
                market: Some(market(90.0)),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(r.evaluations.len(), 1);
    }

    #[test]
    fn test_input_key_remembered() {
        let mut coord = CycleCoordinator::new(EngineConfig::default());
        coord
            .advance(CycleInput {
                source: Some("001.json#abc".into()),
                ..Default::default()
            })
            .unwrap();
        assert!(coord.already_applied("001.json#abc"));
        assert!(!coord.already_applied("002.json#def"));

        coord.advance(CycleInput::default()).unwrap();
        assert!(!coord.already_applied("001.json#abc"));
    }
}
