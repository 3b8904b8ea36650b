//! Stimuli and the strategy categories they are tagged with.

use crate::emotion::PrimaryEmotion;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A single typed nudge toward one emotion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionStimulus {
    pub emotion: PrimaryEmotion,
    pub intensity: f32,
    #[serde(default)]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<StrategyWeightKey>,
}

impl EmotionStimulus {
    pub fn new(emotion: PrimaryEmotion, intensity: f32, source: impl Into<String>) -> Self {
        Self {
            emotion,
            intensity,
            source: source.into(),
            category: None,
        }
    }

    pub fn with_category(mut self, category: StrategyWeightKey) -> Self {
        self.category = Some(category);
        self
    }

    /// Intensity usable by the dynamics: negative and non-finite become 0.
    pub fn effective_intensity(&self) -> f32 {
        if self.intensity.is_finite() {
            self.intensity.max(0.0)
        } else {
            0.0
        }
    }
}

/// The fixed set of stimulus categories the weight ledger learns about.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum StrategyWeightKey {
    WhaleTransferFear,
    FailedTxAnger,
    GasSpikeSurprise,
    TvlSentiment,
    PriceMomentumJoy,
    PriceDropSadness,
    VolumeSurgeAnticipation,
    VolumeDroughtSadness,
    SpreadWideningFear,
    OrderbookImbalance,
    LiquidityDrainDisgust,
    StablecoinFlowTrust,
    DexVolumeTrust,
    TokenLaunchSurprise,
    NetworkCongestionDisgust,
    SocialEngagementJoy,
}

impl StrategyWeightKey {
    pub const ALL: [StrategyWeightKey; 16] = [
        Self::WhaleTransferFear,
        Self::FailedTxAnger,
        Self::GasSpikeSurprise,
        Self::TvlSentiment,
        Self::PriceMomentumJoy,
        Self::PriceDropSadness,
        Self::VolumeSurgeAnticipation,
        Self::VolumeDroughtSadness,
        Self::SpreadWideningFear,
        Self::OrderbookImbalance,
        Self::LiquidityDrainDisgust,
        Self::StablecoinFlowTrust,
        Self::DexVolumeTrust,
        Self::TokenLaunchSurprise,
        Self::NetworkCongestionDisgust,
        Self::SocialEngagementJoy,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::WhaleTransferFear => "whale_transfer_fear",
            Self::FailedTxAnger => "failed_tx_anger",
            Self::GasSpikeSurprise => "gas_spike_surprise",
            Self::TvlSentiment => "tvl_sentiment",
            Self::PriceMomentumJoy => "price_momentum_joy",
            Self::PriceDropSadness => "price_drop_sadness",
            Self::VolumeSurgeAnticipation => "volume_surge_anticipation",
            Self::VolumeDroughtSadness => "volume_drought_sadness",
            Self::SpreadWideningFear => "spread_widening_fear",
            Self::OrderbookImbalance => "orderbook_imbalance",
            Self::LiquidityDrainDisgust => "liquidity_drain_disgust",
            Self::StablecoinFlowTrust => "stablecoin_flow_trust",
            Self::DexVolumeTrust => "dex_volume_trust",
            Self::TokenLaunchSurprise => "token_launch_surprise",
            Self::NetworkCongestionDisgust => "network_congestion_disgust",
            Self::SocialEngagementJoy => "social_engagement_joy",
        }
    }
}

impl std::fmt::Display for StrategyWeightKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown strategy category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for StrategyWeightKey {
    type Err = UnknownCategory;

    /// Accepts snake_case, kebab-case and any letter case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}
