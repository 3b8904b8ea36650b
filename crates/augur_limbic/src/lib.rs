//! # Augur Limbic System
//!
//! Fast regulation around the emotion State Vector:
//!
//! - **Adaptive thresholds**: EMAs of raw external metrics and the trigger
//!   levels derived from them, so "unusual" is always relative to recent
//!   history
//! - **Dominant streak**: how long the current dominant emotion has held,
//!   feeding inertia back into the next cycle
//! - **Heartbeat**: the fixed-interval loop that drives one cycle per tick

mod heartbeat;
mod streak;
pub mod thresholds;

pub use heartbeat::{run_heartbeat, HeartbeatConfig};
pub use streak::DominantStreak;
pub use thresholds::{
    compute_adaptive_thresholds, update_rolling_averages, AdaptiveThresholds, Derivation, Metric,
    ObservedMetrics, RollingAverages, Threshold,
};
