//! Emotional inertia
//!
//! A dominant emotion that has held for several cycles resists stimuli that
//! would end it. The resistance curve rises, then relaxes again for very long
//! streaks so the state can never lock permanently.

use crate::emotion::PrimaryEmotion;
use crate::stimulus::EmotionStimulus;
use serde::{Deserialize, Serialize};

/// The current dominant-emotion streak, supplied to `stimulate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InertiaContext {
    pub streak_emotion: PrimaryEmotion,
    pub streak_length: u32,
}

impl InertiaContext {
    pub fn new(streak_emotion: PrimaryEmotion, streak_length: u32) -> Self {
        Self {
            streak_emotion,
            streak_length,
        }
    }

    /// True when the stimulus pushes against the streak: it targets the
    /// streak's opposite, so its suppression lands on the streak emotion.
    pub fn opposes(&self, stimulus: &EmotionStimulus) -> bool {
        stimulus.emotion == self.streak_emotion.opposite()
    }

    /// Multiplier applied to the stimulus intensity (1.0 when unaffected).
    pub fn factor_for(&self, stimulus: &EmotionStimulus) -> f32 {
        if self.opposes(stimulus) {
            inertia_factor(self.streak_length)
        } else {
            1.0
        }
    }
}

/// Resistance multiplier for a streak of the given length.
pub fn inertia_factor(streak_length: u32) -> f32 {
    match streak_length {
        0..=2 => 1.0,
        3..=4 => 0.8,
        5..=6 => 0.7,
        7..=8 => 0.6,
        9..=12 => 0.75,
        _ => 0.9,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factor_curve() {
        let expected = [
            (0, 1.0),
            (2, 1.0),
            (3, 0.8),
            (4, 0.8),
            (5, 0.7),
            (6, 0.7),
            (7, 0.6),
            (8, 0.6),
            (9, 0.75),
            (12, 0.75),
            (13, 0.9),
            (500, 0.9),
        ];
        for (len, f) in expected {
            assert_eq!(inertia_factor(len), f, "streak length {}", len);
        }
    }

    #[test]
    fn test_long_streaks_relax() {
        // Non-monotonic past 8: long streaks must stay escapable.
        assert!(inertia_factor(13) > inertia_factor(10));
        assert!(inertia_factor(10) > inertia_factor(8));
    }

    #[test]
    fn test_only_opposing_stimuli_are_damped() {
        let ctx = InertiaContext::new(PrimaryEmotion::Fear, 7);
        let anger = EmotionStimulus::new(PrimaryEmotion::Anger, 0.5, "a");
        let fear = EmotionStimulus::new(PrimaryEmotion::Fear, 0.5, "f");
        let joy = EmotionStimulus::new(PrimaryEmotion::Joy, 0.5, "j");
        assert_eq!(ctx.factor_for(&anger), 0.6);
        assert_eq!(ctx.factor_for(&fear), 1.0);
        assert_eq!(ctx.factor_for(&joy), 1.0);
    }
}
