//! End-to-end cycles against a real data directory.

use augur_core::{EngineConfig, PrimaryEmotion, StrategyWeightKey};
use augur_memory::{CycleCoordinator, RawCycleInput, StateStore};
use std::fs;
use tempfile::TempDir;

fn config_in(dir: &TempDir) -> EngineConfig {
    EngineConfig {
        data_dir: dir.path().to_path_buf(),
        evaluation_horizon: 2,
        ..EngineConfig::default()
    }
}

fn raw(json: &str) -> RawCycleInput {
    serde_json::from_str(json).unwrap()
}

#[test]
fn test_state_survives_restart() {
    let dir = TempDir::new().unwrap();

    let mut coord = CycleCoordinator::open(config_in(&dir));
    let report = coord
        .run_raw(raw(r#"{
            "metrics": {"peak_transfer": 2500000},
            "stimuli": [{"emotion": "fear", "intensity": 0.8, "source": "whale moved 2.5M", "category": "whale_transfer_fear"}],
            "market": {"price": 100.0, "tvl": 1000000.0, "volume": 50000.0, "gas_price": 30.0},
            "timestamp": "2024-05-01T12:00:00Z"
        }"#))
        .unwrap();
    assert_eq!(report.state.dominant_label, "terror");
    drop(coord);

    let reopened = CycleCoordinator::open(config_in(&dir));
    assert_eq!(reopened.cycle(), 1);
    assert_eq!(reopened.state().dominant, PrimaryEmotion::Fear);
    assert_eq!(reopened.state().dominant_label, "terror");
    assert_eq!(reopened.engine().meta.streak.length, 1);
    assert_eq!(reopened.engine().ledger.len(), 1);
    assert!(reopened.engine().averages.cycles_tracked >= 1);
}

#[test]
fn test_full_feedback_loop() {
    let dir = TempDir::new().unwrap();
    let mut coord = CycleCoordinator::open(config_in(&dir));

    coord
        .run_raw(raw(r#"{
            "stimuli": [
                {"emotion": "fear", "intensity": 0.6, "source": "whale", "category": "whale_transfer_fear"},
                {"emotion": "sadness", "intensity": 0.4, "source": "dip", "category": "price_drop_sadness"},
                {"emotion": "joy", "intensity": 0.3, "source": "meme", "category": "price_momentum_joy"}
            ],
            "market": {"price": 100.0, "tvl": 1000000.0, "volume": 50000.0, "gas_price": 30.0},
            "timestamp": "2024-05-01T12:00:00Z"
        }"#))
        .unwrap();
    coord
        .run_raw(raw(r#"{
            "market": {"price": 98.0, "tvl": 1000000.0, "volume": 50000.0, "gas_price": 30.0},
            "timestamp": "2024-05-01T12:30:00Z"
        }"#))
        .unwrap();
    let report = coord
        .run_raw(raw(r#"{
            "adjustments_text": "Review done.\n```json\n{\"adjustments\": [{\"category\": \"price-momentum-joy\", \"direction\": \"decrease\", \"magnitude\": \"strong\", \"rationale\": \"joy called the top\"}, {\"category\": \"bogus\", \"direction\": \"increase\"}]}\n```",
            "market": {"price": 94.0, "tvl": 1000000.0, "volume": 50000.0, "gas_price": 30.0},
            "timestamp": "2024-05-01T13:00:00Z"
        }"#))
        .unwrap();

    assert_eq!(report.evaluations.len(), 1);
    assert_eq!(report.evaluations[0].correct_categories, 2);
    assert_eq!(report.adjustments.len(), 1);
    assert!(report.weights.get(StrategyWeightKey::PriceMomentumJoy) < 0.81);

    let stats = StateStore::new(dir.path()).load_engine().stats;
    assert_eq!(stats.total_evaluations, 1);
    assert_eq!(stats.correct_evaluations, 1);
    assert_eq!(stats.recent.len(), 1);
}

#[test]
fn test_corrupt_state_recovers() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("emotion_state.json"), "garbage").unwrap();
    fs::write(
        dir.path().join("strategy_weights.json"),
        r#"{"weights": {"tvl_sentiment": 5.0}}"#,
    )
    .unwrap();

    let mut coord = CycleCoordinator::open(config_in(&dir));
    assert_eq!(coord.state().dominant, PrimaryEmotion::Anticipation);
    assert_eq!(coord.weights().get(StrategyWeightKey::TvlSentiment), 2.0);

    coord.run_raw(RawCycleInput::default()).unwrap();
    let content = fs::read_to_string(dir.path().join("emotion_state.json")).unwrap();
    assert!(serde_json::from_str::<serde_json::Value>(&content).is_ok());
}

#[test]
fn test_reset_clears_files() {
    let dir = TempDir::new().unwrap();
    let mut coord = CycleCoordinator::open(config_in(&dir));
    coord.run_raw(RawCycleInput::default()).unwrap();
    assert!(dir.path().join("cycle_meta.json").exists());

    let removed = coord.reset().unwrap();
    assert_eq!(removed, 6);
    assert_eq!(coord.cycle(), 0);
    assert!(!dir.path().join("cycle_meta.json").exists());
}

const BOOST_TVL: &str = r#"{
    "adjustments": [{"category": "tvl_sentiment", "direction": "increase", "magnitude": "strong"}],
    "market": {"price": 100.0, "tvl": 1000000.0, "volume": 50000.0, "gas_price": 30.0}
}"#;

#[test]
fn test_failed_persist_rolls_back() {
    let dir = TempDir::new().unwrap();
    let not_a_dir = dir.path().join("occupied");
    fs::write(&not_a_dir, "plain file").unwrap();
    let config = EngineConfig {
        data_dir: not_a_dir,
        ..EngineConfig::default()
    };

    let mut coord = CycleCoordinator::open(config);
    assert!(coord.run_raw(raw(BOOST_TVL)).is_err());
    assert_eq!(coord.cycle(), 0);
    assert_eq!(coord.weights().get(StrategyWeightKey::TvlSentiment), 1.0);
    assert!(coord.engine().ledger.is_empty());
    assert_eq!(coord.engine().averages.cycles_tracked, 0);
}

#[test]
fn test_blocked_meta_file_does_not_split_state() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("cycle_meta.json")).unwrap();

    let mut coord = CycleCoordinator::open(config_in(&dir));
    let first = coord
        .run_raw(raw(BOOST_TVL).with_source("001.json#1"))
        .unwrap();
    let weight = first.weights.get(StrategyWeightKey::TvlSentiment);
    drop(coord);

    let mut reopened = CycleCoordinator::open(config_in(&dir));
    assert_eq!(reopened.cycle(), 1);
    assert_eq!(reopened.weights().get(StrategyWeightKey::TvlSentiment), weight);
    assert_eq!(reopened.engine().ledger.len(), 1);
    assert!(reopened.already_applied("001.json#1"));

    // Cannot land while the blocker stays, and memory stays at cycle 1
    assert!(reopened.run_raw(raw(BOOST_TVL)).is_err());
    assert_eq!(reopened.cycle(), 1);
    assert_eq!(reopened.weights().get(StrategyWeightKey::TvlSentiment), weight);
}
