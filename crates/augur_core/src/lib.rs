//! # Augur Core
//!
//! The emotion State Vector: eight Plutchik categories, stimuli that push
//! them, inertia that resists ending a streak, exponential decay back to a
//! resting baseline and a slower mood layer that follows along.

pub mod config;
pub mod emotion;
pub mod inertia;
pub mod state;
pub mod stimulus;

pub use config::{AugurConfig, EngineConfig, LoggingConfig};
pub use emotion::{
    detect_compounds, Dyad, IntensityTier, PrimaryEmotion, Valence, COMPOUND_THRESHOLD,
    PRIMARY_DYADS, SECONDARY_DYADS,
};
pub use inertia::{inertia_factor, InertiaContext};
pub use state::{EmotionMap, EmotionState, BASELINE};
pub use stimulus::{EmotionStimulus, StrategyWeightKey, UnknownCategory};
