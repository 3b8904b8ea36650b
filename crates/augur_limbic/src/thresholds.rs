//! Adaptive Thresholds - self-calibrating trigger levels
//!
//! Rather than hard-coding "what counts as a big transfer", the engine keeps
//! an exponential moving average of every raw metric it is fed and derives
//! trigger levels from it. Floors keep a quiet period from making everything
//! look anomalous.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Weight of the newest observation in the EMA.
pub const EMA_ALPHA: f64 = 0.1;

/// Orderbook imbalance is already a bounded ratio, so its trigger is fixed.
pub const IMBALANCE_THRESHOLD: f64 = 0.65;

// =============================================================================
// Metrics
// =============================================================================

/// Raw external metrics tracked by the rolling averages.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Largest single transfer seen this cycle
    PeakTransfer,
    TransferCount,
    FailedTxCount,
    GasPrice,
    MarketVolume,
    /// Relative bid/ask spread
    Spread,
    /// Orderbook depth near mid price
    Depth,
    /// Absolute relative price change over the cycle
    PriceChange,
    /// Absolute relative TVL change over the cycle
    TvlChange,
    NewTokenCount,
}

impl Metric {
    pub const ALL: [Metric; 10] = [
        Self::PeakTransfer,
        Self::TransferCount,
        Self::FailedTxCount,
        Self::GasPrice,
        Self::MarketVolume,
        Self::Spread,
        Self::Depth,
        Self::PriceChange,
        Self::TvlChange,
        Self::NewTokenCount,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PeakTransfer => "peak_transfer",
            Self::TransferCount => "transfer_count",
            Self::FailedTxCount => "failed_tx_count",
            Self::GasPrice => "gas_price",
            Self::MarketVolume => "market_volume",
            Self::Spread => "spread",
            Self::Depth => "depth",
            Self::PriceChange => "price_change",
            Self::TvlChange => "tvl_change",
            Self::NewTokenCount => "new_token_count",
        }
    }

    /// Value used on first run, before any history exists.
    pub fn seed(self) -> f64 {
        match self {
            Self::PeakTransfer => 50_000.0,
            Self::TransferCount => 200.0,
            Self::FailedTxCount => 5.0,
            Self::GasPrice => 30.0,
            Self::MarketVolume => 1_000_000.0,
            Self::Spread => 0.002,
            Self::Depth => 500_000.0,
            Self::PriceChange => 0.01,
            Self::TvlChange => 0.01,
            Self::NewTokenCount => 3.0,
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == s)
    }
}

/// Keep only known metrics with finite numeric values.
fn known_metrics(raw: HashMap<String, serde_json::Value>) -> BTreeMap<Metric, f64> {
    let mut out = BTreeMap::new();
    for (key, value) in raw {
        match (Metric::parse(&key), value.as_f64()) {
            (Some(metric), Some(v)) if v.is_finite() => {
                out.insert(metric, v);
            }
            (None, _) => tracing::debug!("Ignoring unknown metric '{}'", key),
            (Some(_), _) => tracing::debug!("Ignoring non-numeric value for metric '{}'", key),
        }
    }
    out
}

/// One cycle's worth of observations. Absent metrics were not measured.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "HashMap<String, serde_json::Value>", into = "BTreeMap<Metric, f64>")]
pub struct ObservedMetrics(BTreeMap<Metric, f64>);

impl From<HashMap<String, serde_json::Value>> for ObservedMetrics {
    fn from(raw: HashMap<String, serde_json::Value>) -> Self {
        Self(known_metrics(raw))
    }
}

impl From<ObservedMetrics> for BTreeMap<Metric, f64> {
    fn from(observed: ObservedMetrics) -> Self {
        observed.0
    }
}

impl ObservedMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert; non-finite values are dropped.
    pub fn with(mut self, metric: Metric, value: f64) -> Self {
        self.insert(metric, value);
        self
    }

    pub fn insert(&mut self, metric: Metric, value: f64) {
        if value.is_finite() {
            self.0.insert(metric, value);
        }
    }

    pub fn get(&self, metric: Metric) -> Option<f64> {
        self.0.get(&metric).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// =============================================================================
// Rolling averages
// =============================================================================

/// EMA per metric plus the number of cycles folded in so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredAverages")]
pub struct RollingAverages {
    pub averages: BTreeMap<Metric, f64>,
    pub cycles_tracked: u64,
}

#[derive(Deserialize)]
struct StoredAverages {
    #[serde(default)]
    averages: HashMap<String, serde_json::Value>,
    #[serde(default)]
    cycles_tracked: u64,
}

impl From<StoredAverages> for RollingAverages {
    fn from(stored: StoredAverages) -> Self {
        let mut avg = RollingAverages::default();
        for (metric, value) in known_metrics(stored.averages) {
            avg.averages.insert(metric, value);
        }
        avg.cycles_tracked = stored.cycles_tracked;
        avg
    }
}

impl Default for RollingAverages {
    fn default() -> Self {
        Self {
            averages: Metric::ALL.into_iter().map(|m| (m, m.seed())).collect(),
            cycles_tracked: 0,
        }
    }
}

impl RollingAverages {
    pub fn get(&self, metric: Metric) -> f64 {
        self.averages.get(&metric).copied().unwrap_or_else(|| metric.seed())
    }

    /// Fold one cycle of observations into the averages.
    ///
    /// Only metrics present in `observed` move; `cycles_tracked` always
    /// advances.
    pub fn update(&self, observed: &ObservedMetrics) -> RollingAverages {
        let mut next = self.clone();
        for (&metric, &value) in observed.0.iter() {
            let prev = self.get(metric);
            let updated = prev * (1.0 - EMA_ALPHA) + value * EMA_ALPHA;
            tracing::debug!(
                "EMA {}: {:.4} -> {:.4} (observed {:.4})",
                metric.as_str(),
                prev,
                updated,
                value
            );
            next.averages.insert(metric, updated);
        }
        next.cycles_tracked = self.cycles_tracked.saturating_add(1);
        next
    }
}

/// Free-function form of [`RollingAverages::update`].
pub fn update_rolling_averages(avg: &RollingAverages, observed: &ObservedMetrics) -> RollingAverages {
    avg.update(observed)
}

// =============================================================================
// Thresholds
// =============================================================================

/// Trigger levels handed to stimulus producers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Threshold {
    WhaleTransfer,
    ActivitySpike,
    FailedTxSpike,
    GasSpike,
    VolumeSpike,
    /// Low-side detector: fires when volume falls *below* it
    VolumeDrought,
    SpreadWidening,
    /// Low-side detector: fires when depth falls *below* it
    DepthCollapse,
    PriceMove,
    TvlShift,
    TokenLaunchSpike,
    BidImbalance,
    AskImbalance,
}

/// How a threshold is derived.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Derivation {
    /// `max(floor, average(metric) * multiplier)`
    Scaled {
        metric: Metric,
        multiplier: f64,
        floor: f64,
    },
    Fixed(f64),
}

impl Threshold {
    pub const ALL: [Threshold; 13] = [
        Self::WhaleTransfer,
        Self::ActivitySpike,
        Self::FailedTxSpike,
        Self::GasSpike,
        Self::VolumeSpike,
        Self::VolumeDrought,
        Self::SpreadWidening,
        Self::DepthCollapse,
        Self::PriceMove,
        Self::TvlShift,
        Self::TokenLaunchSpike,
        Self::BidImbalance,
        Self::AskImbalance,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::WhaleTransfer => "whale_transfer",
            Self::ActivitySpike => "activity_spike",
            Self::FailedTxSpike => "failed_tx_spike",
            Self::GasSpike => "gas_spike",
            Self::VolumeSpike => "volume_spike",
            Self::VolumeDrought => "volume_drought",
            Self::SpreadWidening => "spread_widening",
            Self::DepthCollapse => "depth_collapse",
            Self::PriceMove => "price_move",
            Self::TvlShift => "tvl_shift",
            Self::TokenLaunchSpike => "token_launch_spike",
            Self::BidImbalance => "bid_imbalance",
            Self::AskImbalance => "ask_imbalance",
        }
    }

    pub fn derivation(self) -> Derivation {
        use Derivation::*;
        let scaled = |metric, multiplier, floor| Scaled {
            metric,
            multiplier,
            floor,
        };
        match self {
            Self::WhaleTransfer => scaled(Metric::PeakTransfer, 2.0, 10_000.0),
            Self::ActivitySpike => scaled(Metric::TransferCount, 1.5, 20.0),
            Self::FailedTxSpike => scaled(Metric::FailedTxCount, 2.0, 3.0),
            Self::GasSpike => scaled(Metric::GasPrice, 1.5, 10.0),
            Self::VolumeSpike => scaled(Metric::MarketVolume, 1.5, 100_000.0),
            Self::VolumeDrought => scaled(Metric::MarketVolume, 0.2, 10_000.0),
            Self::SpreadWidening => scaled(Metric::Spread, 2.0, 0.001),
            Self::DepthCollapse => scaled(Metric::Depth, 0.2, 10_000.0),
            Self::PriceMove => scaled(Metric::PriceChange, 2.0, 0.005),
            Self::TvlShift => scaled(Metric::TvlChange, 2.0, 0.005),
            Self::TokenLaunchSpike => scaled(Metric::NewTokenCount, 2.0, 2.0),
            Self::BidImbalance | Self::AskImbalance => Fixed(IMBALANCE_THRESHOLD),
        }
    }

    /// The minimum this threshold can ever take.
    pub fn floor(self) -> f64 {
        match self.derivation() {
            Derivation::Scaled { floor, .. } => floor,
            Derivation::Fixed(v) => v,
        }
    }
}

/// Derived, stateless trigger levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveThresholds(BTreeMap<Threshold, f64>);

impl AdaptiveThresholds {
    pub fn get(&self, threshold: Threshold) -> f64 {
        self.0
            .get(&threshold)
            .copied()
            .unwrap_or_else(|| threshold.floor())
    }

    pub fn iter(&self) -> impl Iterator<Item = (Threshold, f64)> + '_ {
        self.0.iter().map(|(&k, &v)| (k, v))
    }
}

/// Pure: derive every threshold from the current averages.
pub fn compute_adaptive_thresholds(avg: &RollingAverages) -> AdaptiveThresholds {
    let values = Threshold::ALL
        .into_iter()
        .map(|t| {
            let value = match t.derivation() {
                Derivation::Scaled {
                    metric,
                    multiplier,
                    floor,
                } => {
                    let scaled = avg.get(metric) * multiplier;
                    if scaled.is_nan() {
                        floor
                    } else {
                        // Overflow saturates
                        scaled.min(f64::MAX).max(floor)
                    }
                }
                Derivation::Fixed(v) => v,
            };
            (t, value)
        })
        .collect();
    AdaptiveThresholds(values)
}
