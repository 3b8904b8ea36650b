//! Strategy Weight Ledger
//!
//! One multiplier per stimulus category, tuned by delayed feedback and
//! pulled back toward neutral every cycle. The pull is slow (about 140
//! cycles to halve a deviation) so a learned adjustment persists for a while,
//! but a category that stops receiving corrections drifts back to 1.0
//! instead of carrying a stale bias forever.

use augur_core::{EmotionStimulus, StrategyWeightKey};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub const WEIGHT_MIN: f32 = 0.3;
pub const WEIGHT_MAX: f32 = 2.0;
pub const NEUTRAL_WEIGHT: f32 = 1.0;
/// Fraction of the distance to neutral recovered per cycle.
pub const WEIGHT_DECAY_RATE: f32 = 0.005;

// =============================================================================
// Adjustments
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentDirection {
    Increase,
    Decrease,
    /// Snap back to neutral regardless of the current value
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentMagnitude {
    Nudge,
    #[default]
    Moderate,
    Strong,
}

impl AdjustmentMagnitude {
    pub fn step(self) -> f32 {
        match self {
            Self::Nudge => 0.05,
            Self::Moderate => 0.10,
            Self::Strong => 0.20,
        }
    }
}

/// A validated instruction from the feedback loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightAdjustment {
    pub category: StrategyWeightKey,
    pub direction: AdjustmentDirection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magnitude: Option<AdjustmentMagnitude>,
    #[serde(default)]
    pub rationale: String,
}

impl WeightAdjustment {
    pub fn new(category: StrategyWeightKey, direction: AdjustmentDirection) -> Self {
        Self {
            category,
            direction,
            magnitude: None,
            rationale: String::new(),
        }
    }

    pub fn with_magnitude(mut self, magnitude: AdjustmentMagnitude) -> Self {
        self.magnitude = Some(magnitude);
        self
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = rationale.into();
        self
    }
}

/// Audit record of one applied adjustment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightAdjustmentResult {
    pub category: StrategyWeightKey,
    pub direction: AdjustmentDirection,
    pub magnitude: AdjustmentMagnitude,
    pub before: f32,
    pub after: f32,
    pub rationale: String,
}

// =============================================================================
// StrategyWeights
// =============================================================================

/// Per-category multipliers. Every key in [`StrategyWeightKey::ALL`] is
/// always present and always within [`WEIGHT_MIN`, `WEIGHT_MAX`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredWeights")]
pub struct StrategyWeights {
    weights: BTreeMap<StrategyWeightKey, f32>,
    pub last_updated: i64,
}

#[derive(Deserialize)]
struct StoredWeights {
    #[serde(default)]
    weights: HashMap<String, serde_json::Value>,
    #[serde(default)]
    last_updated: i64,
}

impl From<StoredWeights> for StrategyWeights {
    fn from(stored: StoredWeights) -> Self {
        let mut weights = StrategyWeights::default();
        for (key, value) in stored.weights {
            let Ok(category) = key.parse::<StrategyWeightKey>() else {
                tracing::debug!("Dropping unknown weight category '{}' from stored ledger", key);
                continue;
            };
            let w = value.as_f64().map(|v| v as f32).filter(|v| v.is_finite());
            match w {
                Some(w) => weights.set(category, w),
                None => tracing::warn!("Invalid stored weight for {}, using neutral", category),
            }
        }
        weights.last_updated = stored.last_updated;
        weights
    }
}

impl Default for StrategyWeights {
    fn default() -> Self {
        Self {
            weights: StrategyWeightKey::ALL
                .into_iter()
                .map(|k| (k, NEUTRAL_WEIGHT))
                .collect(),
            last_updated: 0,
        }
    }
}

impl StrategyWeights {
    pub fn get(&self, category: StrategyWeightKey) -> f32 {
        self.weights
            .get(&category)
            .copied()
            .unwrap_or(NEUTRAL_WEIGHT)
    }

    /// Set a weight, clamped into bounds.
    pub fn set(&mut self, category: StrategyWeightKey, value: f32) {
        self.weights
            .insert(category, value.clamp(WEIGHT_MIN, WEIGHT_MAX));
    }

    pub fn iter(&self) -> impl Iterator<Item = (StrategyWeightKey, f32)> + '_ {
        self.weights.iter().map(|(&k, &w)| (k, w))
    }

    /// Apply feedback instructions in order, returning an audit record for
    /// each one.
    pub fn apply_adjustments(
        &mut self,
        adjustments: &[WeightAdjustment],
    ) -> Vec<WeightAdjustmentResult> {
        let mut results = Vec::with_capacity(adjustments.len());
        for adj in adjustments {
            let before = self.get(adj.category);
            let magnitude = adj.magnitude.unwrap_or_default();
            let after = match adj.direction {
                AdjustmentDirection::Reset => NEUTRAL_WEIGHT,
                AdjustmentDirection::Increase => before + magnitude.step(),
                AdjustmentDirection::Decrease => before - magnitude.step(),
            };
            self.set(adj.category, after);
            let after = self.get(adj.category);

            tracing::info!(
                "Weight {} {:?}/{:?}: {:.3} -> {:.3} ({})",
                adj.category,
                adj.direction,
                magnitude,
                before,
                after,
                adj.rationale
            );
            results.push(WeightAdjustmentResult {
                category: adj.category,
                direction: adj.direction,
                magnitude,
                before,
                after,
                rationale: adj.rationale.clone(),
            });
        }
        if !results.is_empty() {
            self.last_updated = chrono::Utc::now().timestamp();
        }
        results
    }

    /// One cycle of drift toward neutral.
    pub fn decay(&mut self) {
        for w in self.weights.values_mut() {
            *w = (*w + (NEUTRAL_WEIGHT - *w) * WEIGHT_DECAY_RATE).clamp(WEIGHT_MIN, WEIGHT_MAX);
        }
    }

    /// Scale stimuli by their category weight. Uncategorised stimuli pass
    /// through unchanged; the input is not modified.
    pub fn apply_to(&self, stimuli: &[EmotionStimulus]) -> Vec<EmotionStimulus> {
        stimuli
            .iter()
            .map(|s| match s.category {
                Some(category) => EmotionStimulus {
                    intensity: s.intensity * self.get(category),
                    ..s.clone()
                },
                None => s.clone(),
            })
            .collect()
    }
}

pub fn apply_weight_adjustments(
    weights: &mut StrategyWeights,
    adjustments: &[WeightAdjustment],
) -> Vec<WeightAdjustmentResult> {
    weights.apply_adjustments(adjustments)
}

pub fn decay_weights(weights: &mut StrategyWeights) {
    weights.decay();
}

pub fn apply_strategy_weights(
    stimuli: &[EmotionStimulus],
    weights: &StrategyWeights,
) -> Vec<EmotionStimulus> {
    weights.apply_to(stimuli)
}
