//! Dominant-emotion streak tracking
//!
//! Carried between cycles as an explicit context value and turned into the
//! [`InertiaContext`] that `stimulate` consumes.

use augur_core::{InertiaContext, PrimaryEmotion};
use serde::{Deserialize, Serialize};

/// How many consecutive cycles the same emotion has been dominant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DominantStreak {
    pub emotion: PrimaryEmotion,
    pub length: u32,
}

impl Default for DominantStreak {
    fn default() -> Self {
        Self {
            emotion: PrimaryEmotion::Anticipation,
            length: 0,
        }
    }
}

impl DominantStreak {
    /// Record the dominant emotion at the end of a cycle.
    pub fn observe(&mut self, dominant: PrimaryEmotion) {
        if self.length > 0 && self.emotion == dominant {
            self.length = self.length.saturating_add(1);
        } else {
            if self.length > 0 {
                tracing::debug!(
                    "Dominant streak broken: {} after {} cycles, now {}",
                    self.emotion,
                    self.length,
                    dominant
                );
            }
            self.emotion = dominant;
            self.length = 1;
        }
    }

    /// Inertia for the next `stimulate`, or `None` before any observation.
    pub fn inertia(&self) -> Option<InertiaContext> {
        (self.length > 0).then(|| InertiaContext::new(self.emotion, self.length))
    }
}
