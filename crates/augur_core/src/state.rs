//! Emotion State Vector
//!
//! Two layers over the same eight categories:
//! - `emotions`: instantaneous intensities, pushed by stimuli and pulled back
//!   to a baseline by exponential decay
//! - `mood`: slow temperament that follows emotions with an adaptive EMA
//!
//! Every transition is a pure function `&self -> Self`; derived fields
//! (`dominant`, `dominant_label`, `compounds`) are recomputed after each one
//! and on load, never trusted from storage.

use crate::emotion::{detect_compounds, PrimaryEmotion};
use crate::inertia::InertiaContext;
use crate::stimulus::EmotionStimulus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Resting intensity every category decays toward.
pub const BASELINE: f32 = 0.15;
/// Anticipation starts elevated: the engine wakes up curious.
pub const INITIAL_ANTICIPATION: f32 = 0.30;
/// Decay rate per minute.
pub const DECAY_RATE: f32 = 0.05;
/// Fraction of a stimulus subtracted from the opposite category.
pub const OPPOSITION_SUPPRESSION: f32 = 0.5;

const MOOD_ALPHA_MIN: f32 = 0.05;
const MOOD_ALPHA_SPAN: f32 = 0.15;
const MOOD_VOLATILITY_GAIN: f32 = 3.0;

/// Guard against NaN and Infinity in state values.
#[inline]
fn sanitize_f32(v: f32, fallback: f32) -> f32 {
    if v.is_finite() {
        v
    } else {
        tracing::warn!("NaN/Inf detected in emotion state, resetting to {}", fallback);
        fallback
    }
}

// =============================================================================
// EmotionMap
// =============================================================================

/// One value in [0, 1] per primary emotion.
///
/// Serialized as a plain object keyed by emotion name. Missing keys take the
/// initial value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmotionMap {
    pub joy: f32,
    pub trust: f32,
    pub fear: f32,
    pub surprise: f32,
    pub sadness: f32,
    pub disgust: f32,
    pub anger: f32,
    pub anticipation: f32,
}

impl Default for EmotionMap {
    fn default() -> Self {
        Self {
            joy: BASELINE,
            trust: BASELINE,
            fear: BASELINE,
            surprise: BASELINE,
            sadness: BASELINE,
            disgust: BASELINE,
            anger: BASELINE,
            anticipation: INITIAL_ANTICIPATION,
        }
    }
}

impl EmotionMap {
    /// Every category at the same value.
    pub fn uniform(value: f32) -> Self {
        let mut map = Self::default();
        for e in PrimaryEmotion::ALL {
            map.set(e, value);
        }
        map
    }

    pub fn get(&self, emotion: PrimaryEmotion) -> f32 {
        match emotion {
            PrimaryEmotion::Joy => self.joy,
            PrimaryEmotion::Trust => self.trust,
            PrimaryEmotion::Fear => self.fear,
            PrimaryEmotion::Surprise => self.surprise,
            PrimaryEmotion::Sadness => self.sadness,
            PrimaryEmotion::Disgust => self.disgust,
            PrimaryEmotion::Anger => self.anger,
            PrimaryEmotion::Anticipation => self.anticipation,
        }
    }

    /// Set a category, clamped to [0, 1].
    pub fn set(&mut self, emotion: PrimaryEmotion, value: f32) {
        let slot = match emotion {
            PrimaryEmotion::Joy => &mut self.joy,
            PrimaryEmotion::Trust => &mut self.trust,
            PrimaryEmotion::Fear => &mut self.fear,
            PrimaryEmotion::Surprise => &mut self.surprise,
            PrimaryEmotion::Sadness => &mut self.sadness,
            PrimaryEmotion::Disgust => &mut self.disgust,
            PrimaryEmotion::Anger => &mut self.anger,
            PrimaryEmotion::Anticipation => &mut self.anticipation,
        };
        *slot = value.clamp(0.0, 1.0);
    }

    pub fn iter(&self) -> impl Iterator<Item = (PrimaryEmotion, f32)> + '_ {
        PrimaryEmotion::ALL.into_iter().map(move |e| (e, self.get(e)))
    }

    /// Highest category; ties resolve to the earliest in declaration order.
    pub fn argmax(&self) -> PrimaryEmotion {
        let mut best = PrimaryEmotion::ALL[0];
        let mut best_value = self.get(best);
        for (e, v) in self.iter().skip(1) {
            if v > best_value {
                best = e;
                best_value = v;
            }
        }
        best
    }

    pub fn compounds(&self) -> BTreeSet<String> {
        detect_compounds(|e| self.get(e))
    }

    /// Replace non-finite values with their initial value and clamp the rest.
    pub fn normalize(&mut self) {
        let defaults = Self::default();
        for e in PrimaryEmotion::ALL {
            let v = sanitize_f32(self.get(e), defaults.get(e));
            self.set(e, v);
        }
    }
}

// =============================================================================
// EmotionState
// =============================================================================

/// The complete affective state carried between cycles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredEmotionState")]
pub struct EmotionState {
    pub emotions: EmotionMap,
    pub mood: EmotionMap,
    /// Always the recompute of the dyad rule over `emotions`.
    pub compounds: BTreeSet<String>,
    pub dominant: PrimaryEmotion,
    pub dominant_label: String,
    pub trigger: String,
    /// Unix timestamp of last mutation
    pub last_updated: i64,
}

/// On-disk shape. Derived fields are accepted but ignored.
#[derive(Deserialize)]
struct StoredEmotionState {
    #[serde(default)]
    emotions: EmotionMap,
    #[serde(default)]
    mood: Option<EmotionMap>,
    #[serde(default)]
    trigger: String,
    #[serde(default)]
    last_updated: i64,
}

impl From<StoredEmotionState> for EmotionState {
    fn from(stored: StoredEmotionState) -> Self {
        let mut state = EmotionState {
            emotions: stored.emotions,
            mood: stored.mood.unwrap_or(stored.emotions),
            compounds: BTreeSet::new(),
            dominant: PrimaryEmotion::Anticipation,
            dominant_label: String::new(),
            trigger: stored.trigger,
            last_updated: stored.last_updated,
        };
        state.normalize();
        state
    }
}

impl Default for EmotionState {
    fn default() -> Self {
        let emotions = EmotionMap::default();
        let mut state = Self {
            emotions,
            mood: emotions,
            compounds: BTreeSet::new(),
            dominant: PrimaryEmotion::Anticipation,
            dominant_label: String::new(),
            trigger: "initial state".to_string(),
            last_updated: chrono::Utc::now().timestamp(),
        };
        state.refresh_derived();
        state
    }
}

impl EmotionState {
    /// Recompute dominant, its label and the active compounds.
    pub fn refresh_derived(&mut self) {
        self.dominant = self.emotions.argmax();
        self.dominant_label = self
            .dominant
            .label_at(self.emotions.get(self.dominant))
            .to_string();
        self.compounds = self.emotions.compounds();
    }

    /// Sanitize both layers and rebuild derived fields.
    pub fn normalize(&mut self) {
        self.emotions.normalize();
        self.mood.normalize();
        self.refresh_derived();
    }

    /// Apply a batch of stimuli.
    ///
    /// Each stimulus adds to its target and suppresses the opposite by half
    /// its (inertia-adjusted) intensity. `trigger` becomes the sources joined
    /// with `"; "`; an empty batch leaves the state untouched.
    pub fn stimulate(
        &self,
        stimuli: &[EmotionStimulus],
        inertia: Option<&InertiaContext>,
    ) -> EmotionState {
        let mut next = self.clone();
        if stimuli.is_empty() {
            return next;
        }

        for stimulus in stimuli {
            let factor = inertia.map_or(1.0, |ctx| ctx.factor_for(stimulus));
            let intensity = stimulus.effective_intensity() * factor;
            let target = stimulus.emotion;
            let opposite = target.opposite();

            let raised = (next.emotions.get(target) + intensity).min(1.0);
            next.emotions.set(target, raised);

            let suppressed =
                (next.emotions.get(opposite) - intensity * OPPOSITION_SUPPRESSION).max(0.0);
            next.emotions.set(opposite, suppressed);
        }

        next.trigger = stimuli
            .iter()
            .map(|s| s.source.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        next.last_updated = chrono::Utc::now().timestamp();
        next.refresh_derived();
        next
    }

    /// Exponential decay of every category toward [`BASELINE`].
    ///
    /// Negative or non-finite elapsed time is treated as zero.
    pub fn decay(&self, minutes_elapsed: f32) -> EmotionState {
        let mut next = self.clone();
        let minutes = if minutes_elapsed.is_finite() {
            minutes_elapsed.max(0.0)
        } else {
            0.0
        };
        if minutes == 0.0 {
            return next;
        }

        let retain = (-DECAY_RATE * minutes).exp();
        for e in PrimaryEmotion::ALL {
            let current = next.emotions.get(e);
            next.emotions.set(e, BASELINE + (current - BASELINE) * retain);
        }
        next.last_updated = chrono::Utc::now().timestamp();
        next.refresh_derived();
        next
    }

    /// Move mood toward emotions with an adaptive rate: the further apart
    /// they are, the faster mood follows.
    pub fn update_mood(&self) -> EmotionState {
        let mut next = self.clone();
        let alpha = self.mood_alpha();
        for e in PrimaryEmotion::ALL {
            let mood = next.mood.get(e);
            let target = next.emotions.get(e);
            next.mood.set(e, mood + (target - mood) * alpha);
        }
        next
    }

    /// Mean absolute divergence between emotions and mood.
    pub fn volatility(&self) -> f32 {
        let total: f32 = PrimaryEmotion::ALL
            .iter()
            .map(|&e| (self.emotions.get(e) - self.mood.get(e)).abs())
            .sum();
        total / PrimaryEmotion::ALL.len() as f32
    }

    /// Lerp factor used by [`update_mood`](Self::update_mood), in [0.05, 0.2].
    pub fn mood_alpha(&self) -> f32 {
        MOOD_ALPHA_MIN + MOOD_ALPHA_SPAN * (self.volatility() * MOOD_VOLATILITY_GAIN).min(1.0)
    }

    /// Short human-readable summary for narrative collaborators.
    pub fn describe(&self) -> String {
        let intensity = self.emotions.get(self.dominant);
        let mut text = format!(
            "feeling {} ({} at {:.2})",
            self.dominant_label, self.dominant, intensity
        );
        if !self.compounds.is_empty() {
            let names: Vec<&str> = self.compounds.iter().map(|s| s.as_str()).collect();
            text.push_str(&format!(", with a sense of {}", names.join(", ")));
        }
        text
    }
}
