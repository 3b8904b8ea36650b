//! # Augur Memory
//!
//! What the engine learns and remembers across cycles: per-category strategy
//! weights tuned by delayed feedback, prophecy snapshots scored against the
//! market, and the JSON store that carries it all between runs.

pub mod coordinator;
pub mod intake;
pub mod prophecy;
pub mod store;
pub mod weights;

pub use coordinator::{CycleCoordinator, CycleReport};
pub use intake::{
    parse_weight_adjustments, sanitize_adjustments, sanitize_stimuli, CycleInput, RawCycleInput,
};
pub use prophecy::{
    create_prophecy_snapshot, evaluate_prophecy, get_pending_evaluations, is_due, update_prophecy_stats,
    ActiveCategory, CategoryOutcome, CategoryTally, EvaluationRecord, MarketFeatures,
    ProphecyEvaluation, ProphecyLedger, ProphecySnapshot, ProphecyStats,
};
pub use store::{CycleMeta, EngineState, StateStore, StoreError};
pub use weights::{
    apply_strategy_weights, apply_weight_adjustments, decay_weights, AdjustmentDirection,
    AdjustmentMagnitude, StrategyWeights, WeightAdjustment, WeightAdjustmentResult, WEIGHT_MAX,
    WEIGHT_MIN,
};
