//! Plutchik emotion taxonomy
//!
//! Eight primary emotions arranged on a wheel, four opposition pairs,
//! three intensity tiers and sixteen named dyads (compounds). Everything
//! here is a closed table: adding a category is a single exhaustive change.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Geometric-mean activation at which a dyad counts as present.
pub const COMPOUND_THRESHOLD: f32 = 0.3;

/// The eight primary emotions, in wheel (declaration) order.
///
/// The order matters: it is used to break ties when picking the dominant
/// emotion and to lay out dyads (adjacent = primary, two apart = secondary).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryEmotion {
    Joy,
    Trust,
    Fear,
    Surprise,
    Sadness,
    Disgust,
    Anger,
    Anticipation,
}

impl PrimaryEmotion {
    pub const ALL: [PrimaryEmotion; 8] = [
        Self::Joy,
        Self::Trust,
        Self::Fear,
        Self::Surprise,
        Self::Sadness,
        Self::Disgust,
        Self::Anger,
        Self::Anticipation,
    ];

    /// The other member of this emotion's opposition pair.
    pub fn opposite(self) -> Self {
        match self {
            Self::Joy => Self::Sadness,
            Self::Sadness => Self::Joy,
            Self::Trust => Self::Disgust,
            Self::Disgust => Self::Trust,
            Self::Fear => Self::Anger,
            Self::Anger => Self::Fear,
            Self::Surprise => Self::Anticipation,
            Self::Anticipation => Self::Surprise,
        }
    }

    /// Which side of the market this emotion "bets" on.
    ///
    /// Total over all categories so prophecy direction never has to be
    /// guessed from naming conventions.
    pub fn valence(self) -> Valence {
        match self {
            Self::Joy | Self::Trust | Self::Anticipation => Valence::Positive,
            Self::Fear | Self::Surprise | Self::Sadness | Self::Disgust | Self::Anger => {
                Valence::Negative
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Joy => "joy",
            Self::Trust => "trust",
            Self::Fear => "fear",
            Self::Surprise => "surprise",
            Self::Sadness => "sadness",
            Self::Disgust => "disgust",
            Self::Anger => "anger",
            Self::Anticipation => "anticipation",
        }
    }

    /// Tier name for this emotion at the given intensity.
    pub fn label_at(self, intensity: f32) -> &'static str {
        IntensityTier::from_intensity(intensity).name_for(self)
    }
}

impl std::fmt::Display for PrimaryEmotion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Positive or negative reading of an emotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Valence {
    Positive,
    Negative,
}

/// Plutchik's three concentric rings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntensityTier {
    Mild,
    Moderate,
    Intense,
}

impl IntensityTier {
    pub fn from_intensity(intensity: f32) -> Self {
        if intensity >= 0.7 {
            Self::Intense
        } else if intensity >= 0.3 {
            Self::Moderate
        } else {
            Self::Mild
        }
    }

    pub fn name_for(self, emotion: PrimaryEmotion) -> &'static str {
        use IntensityTier::*;
        use PrimaryEmotion::*;
        match (emotion, self) {
            (Joy, Mild) => "serenity",
            (Joy, Moderate) => "joy",
            (Joy, Intense) => "ecstasy",
            (Trust, Mild) => "acceptance",
            (Trust, Moderate) => "trust",
            (Trust, Intense) => "admiration",
            (Fear, Mild) => "apprehension",
            (Fear, Moderate) => "fear",
            (Fear, Intense) => "terror",
            (Surprise, Mild) => "distraction",
            (Surprise, Moderate) => "surprise",
            (Surprise, Intense) => "amazement",
            (Sadness, Mild) => "pensiveness",
            (Sadness, Moderate) => "sadness",
            (Sadness, Intense) => "grief",
            (Disgust, Mild) => "boredom",
            (Disgust, Moderate) => "disgust",
            (Disgust, Intense) => "loathing",
            (Anger, Mild) => "annoyance",
            (Anger, Moderate) => "anger",
            (Anger, Intense) => "rage",
            (Anticipation, Mild) => "interest",
            (Anticipation, Moderate) => "anticipation",
            (Anticipation, Intense) => "vigilance",
        }
    }
}

// =============================================================================
// Dyads
// =============================================================================

/// A named pairing of two primary emotions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dyad {
    pub name: &'static str,
    pub a: PrimaryEmotion,
    pub b: PrimaryEmotion,
}

const fn dyad(name: &'static str, a: PrimaryEmotion, b: PrimaryEmotion) -> Dyad {
    Dyad { name, a, b }
}

/// Adjacent emotions on the wheel.
pub const PRIMARY_DYADS: [Dyad; 8] = [
    dyad("Love", PrimaryEmotion::Joy, PrimaryEmotion::Trust),
    dyad("Submission", PrimaryEmotion::Trust, PrimaryEmotion::Fear),
    dyad("Awe", PrimaryEmotion::Fear, PrimaryEmotion::Surprise),
    dyad("Disapproval", PrimaryEmotion::Surprise, PrimaryEmotion::Sadness),
    dyad("Remorse", PrimaryEmotion::Sadness, PrimaryEmotion::Disgust),
    dyad("Contempt", PrimaryEmotion::Disgust, PrimaryEmotion::Anger),
    dyad("Aggressiveness", PrimaryEmotion::Anger, PrimaryEmotion::Anticipation),
    dyad("Optimism", PrimaryEmotion::Anticipation, PrimaryEmotion::Joy),
];

/// Emotions two steps apart on the wheel.
pub const SECONDARY_DYADS: [Dyad; 8] = [
    dyad("Guilt", PrimaryEmotion::Joy, PrimaryEmotion::Fear),
    dyad("Curiosity", PrimaryEmotion::Trust, PrimaryEmotion::Surprise),
    dyad("Despair", PrimaryEmotion::Fear, PrimaryEmotion::Sadness),
    dyad("Unbelief", PrimaryEmotion::Surprise, PrimaryEmotion::Disgust),
    dyad("Envy", PrimaryEmotion::Sadness, PrimaryEmotion::Anger),
    dyad("Cynicism", PrimaryEmotion::Disgust, PrimaryEmotion::Anticipation),
    dyad("Pride", PrimaryEmotion::Anger, PrimaryEmotion::Joy),
    dyad("Hope", PrimaryEmotion::Anticipation, PrimaryEmotion::Trust),
];

impl Dyad {
    /// Geometric mean of the two member intensities.
    pub fn activation(&self, intensity: impl Fn(PrimaryEmotion) -> f32) -> f32 {
        (intensity(self.a).max(0.0) * intensity(self.b).max(0.0)).sqrt()
    }
}

/// Names of every dyad (primary and secondary) whose activation reaches
/// [`COMPOUND_THRESHOLD`].
pub fn detect_compounds(intensity: impl Fn(PrimaryEmotion) -> f32) -> BTreeSet<String> {
    PRIMARY_DYADS
        .iter()
        .chain(SECONDARY_DYADS.iter())
        .filter(|d| d.activation(&intensity) >= COMPOUND_THRESHOLD)
        .map(|d| d.name.to_string())
        .collect()
}
