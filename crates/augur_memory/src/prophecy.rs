//! Prophecy Evaluator
//!
//! Every cycle the strongest categorised stimuli are frozen into a snapshot
//! alongside the market features of the moment. Once a snapshot is
//! [`DEFAULT_EVALUATION_HORIZON`] cycles old it is scored against the market
//! at that time: did the market move the way each emotion implied?
//!
//! The scores are what the weight-adjustment collaborator reviews, closing
//! the loop between "what the engine felt" and "what actually happened".

use augur_core::{EmotionStimulus, StrategyWeightKey, Valence};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};

pub const DEFAULT_EVALUATION_HORIZON: u64 = 48;
pub const DEFAULT_RECENT_CAPACITY: usize = 50;
pub const DEFAULT_MAX_SNAPSHOTS: usize = 500;
/// Stimuli weaker than this are not worth a prediction.
pub const MIN_ACTIVE_INTENSITY: f32 = 0.1;

// =============================================================================
// Snapshot
// =============================================================================

/// Market features compared between snapshot time and evaluation time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketFeatures {
    pub price: f64,
    pub tvl: f64,
    pub volume: f64,
    pub gas_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveCategory {
    pub category: StrategyWeightKey,
    pub intensity: f32,
    pub direction: Valence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProphecySnapshot {
    pub cycle: u64,
    pub timestamp: i64,
    pub market: MarketFeatures,
    pub active_categories: Vec<ActiveCategory>,
    #[serde(default)]
    pub evaluated: bool,
}

/// Freeze the strongest stimulus per category, strongest first.
pub fn create_prophecy_snapshot(
    cycle: u64,
    timestamp: i64,
    market: MarketFeatures,
    stimuli: &[EmotionStimulus],
) -> ProphecySnapshot {
    let mut strongest: BTreeMap<StrategyWeightKey, &EmotionStimulus> = BTreeMap::new();
    for s in stimuli {
        let Some(category) = s.category else { continue };
        if s.effective_intensity() < MIN_ACTIVE_INTENSITY {
            continue;
        }
        let keep = strongest
            .get(&category)
            .map_or(true, |cur| s.effective_intensity() > cur.effective_intensity());
        if keep {
            strongest.insert(category, s);
        }
    }

    let mut active_categories: Vec<ActiveCategory> = strongest
        .into_iter()
        .map(|(category, s)| ActiveCategory {
            category,
            intensity: s.effective_intensity(),
            direction: s.emotion.valence(),
        })
        .collect();
    active_categories.sort_by(|a, b| b.intensity.total_cmp(&a.intensity));

    ProphecySnapshot {
        cycle,
        timestamp,
        market,
        active_categories,
        evaluated: false,
    }
}

/// Whether `snapshot` is unevaluated and at least `horizon` cycles old.
pub fn is_due(snapshot: &ProphecySnapshot, current_cycle: u64, horizon: u64) -> bool {
    !snapshot.evaluated && current_cycle.saturating_sub(snapshot.cycle) >= horizon
}

/// Unevaluated snapshots at least `horizon` cycles old.
pub fn get_pending_evaluations(
    snapshots: &[ProphecySnapshot],
    current_cycle: u64,
    horizon: u64,
) -> Vec<&ProphecySnapshot> {
    snapshots
        .iter()
        .filter(|s| is_due(s, current_cycle, horizon))
        .collect()
}

// =============================================================================
// Evaluation
// =============================================================================

/// What "the market agreed" means for a category.
#[derive(Debug, Clone, Copy, PartialEq)]
enum OutcomeRule {
    /// Price moved at least this fraction in the implied direction.
    PriceMove(f64),
    /// Positive: TVL held steady. Negative: TVL drained.
    TvlStability,
    /// Volume moved at least this fraction in the implied direction.
    VolumeMove(f64),
    /// Negative: gas rose. Positive: gas fell. Both by at least this fraction.
    GasMove(f64),
    /// Any price move in the implied direction.
    PriceDirection,
}

const TVL_BAND: f64 = 0.02;

fn rule_for(category: StrategyWeightKey) -> OutcomeRule {
    use StrategyWeightKey::*;
    match category {
        WhaleTransferFear | PriceDropSadness | PriceMomentumJoy => OutcomeRule::PriceMove(0.02),
        SpreadWideningFear | OrderbookImbalance => OutcomeRule::PriceMove(0.01),
        TvlSentiment | StablecoinFlowTrust | LiquidityDrainDisgust => OutcomeRule::TvlStability,
        VolumeSurgeAnticipation | DexVolumeTrust | VolumeDroughtSadness => {
            OutcomeRule::VolumeMove(0.10)
        }
        GasSpikeSurprise | NetworkCongestionDisgust => OutcomeRule::GasMove(0.10),
        FailedTxAnger | TokenLaunchSurprise | SocialEngagementJoy => OutcomeRule::PriceDirection,
    }
}

/// Fractional change, or `None` when either side is unusable.
fn pct_change(then: f64, now: f64) -> Option<f64> {
    if !then.is_finite() || !now.is_finite() || then <= 0.0 || now <= 0.0 {
        return None;
    }
    Some((now - then) / then)
}

/// Whether `direction` was borne out, plus the observed change.
fn judge(
    rule: OutcomeRule,
    direction: Valence,
    then: &MarketFeatures,
    now: &MarketFeatures,
) -> (bool, Option<f64>) {
    let positive = direction == Valence::Positive;
    let change = match rule {
        OutcomeRule::PriceMove(_) | OutcomeRule::PriceDirection => pct_change(then.price, now.price),
        OutcomeRule::TvlStability => pct_change(then.tvl, now.tvl),
        OutcomeRule::VolumeMove(_) => pct_change(then.volume, now.volume),
        OutcomeRule::GasMove(_) => pct_change(then.gas_price, now.gas_price),
    };
    let Some(c) = change else {
        return (false, None);
    };
    let correct = match rule {
        OutcomeRule::PriceMove(t) | OutcomeRule::VolumeMove(t) => {
            if positive {
                c >= t
            } else {
                c <= -t
            }
        }
        OutcomeRule::TvlStability => {
            if positive {
                c.abs() <= TVL_BAND
            } else {
                c < -TVL_BAND
            }
        }
        // Congestion is bad news, so the sign flips.
        OutcomeRule::GasMove(t) => {
            if positive {
                c <= -t
            } else {
                c >= t
            }
        }
        OutcomeRule::PriceDirection => {
            if positive {
                c > 0.0
            } else {
                c < 0.0
            }
        }
    };
    (correct, Some(c))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryOutcome {
    pub category: StrategyWeightKey,
    pub direction: Valence,
    pub intensity: f32,
    pub correct: bool,
    /// Fractional change of the feature the rule looked at, if measurable.
    pub observed_change: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProphecyEvaluation {
    pub snapshot_cycle: u64,
    pub total_categories: usize,
    pub correct_categories: usize,
    pub results: Vec<CategoryOutcome>,
}

impl ProphecyEvaluation {
    /// Whole-snapshot verdict: strict majority of categories correct.
    pub fn is_correct(&self) -> bool {
        self.total_categories > 0 && self.correct_categories * 2 > self.total_categories
    }
}

/// Score every active category of `snapshot` against `current`.
pub fn evaluate_prophecy(snapshot: &ProphecySnapshot, current: &MarketFeatures) -> ProphecyEvaluation {
    let results: Vec<CategoryOutcome> = snapshot
        .active_categories
        .iter()
        .map(|active| {
            let (correct, observed_change) =
                judge(rule_for(active.category), active.direction, &snapshot.market, current);
            if observed_change.is_none() {
                tracing::debug!(
                    "Missing market data scoring {} from cycle {}",
                    active.category,
                    snapshot.cycle
                );
            }
            CategoryOutcome {
                category: active.category,
                direction: active.direction,
                intensity: active.intensity,
                correct,
                observed_change,
            }
        })
        .collect();

    ProphecyEvaluation {
        snapshot_cycle: snapshot.cycle,
        total_categories: results.len(),
        correct_categories: results.iter().filter(|r| r.correct).count(),
        results,
    }
}

// =============================================================================
// Stats
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTally {
    pub total: u64,
    pub correct: u64,
}

impl CategoryTally {
    pub fn accuracy(&self) -> Option<f64> {
        (self.total > 0).then(|| self.correct as f64 / self.total as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub snapshot_cycle: u64,
    pub total_categories: usize,
    pub correct_categories: usize,
    pub correct: bool,
}

/// Running prophecy accuracy. Counters only ever grow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredStats")]
pub struct ProphecyStats {
    pub total_evaluations: u64,
    pub correct_evaluations: u64,
    pub per_category: BTreeMap<StrategyWeightKey, CategoryTally>,
    pub recent: VecDeque<EvaluationRecord>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct StoredStats {
    total_evaluations: u64,
    correct_evaluations: u64,
    per_category: HashMap<String, CategoryTally>,
    recent: VecDeque<EvaluationRecord>,
}

impl From<StoredStats> for ProphecyStats {
    fn from(stored: StoredStats) -> Self {
        let per_category = stored
            .per_category
            .into_iter()
            .filter_map(|(k, tally)| match k.parse::<StrategyWeightKey>() {
                Ok(key) => Some((key, tally)),
                Err(_) => {
                    tracing::debug!("Dropping stats for unknown category '{}'", k);
                    None
                }
            })
            .collect();
        Self {
            total_evaluations: stored.total_evaluations,
            correct_evaluations: stored.correct_evaluations.min(stored.total_evaluations),
            per_category,
            recent: stored.recent,
        }
    }
}

impl ProphecyStats {
    /// Fold one evaluation in, keeping at most `recent_capacity` records.
    pub fn record(&mut self, evaluation: &ProphecyEvaluation, recent_capacity: usize) {
        let correct = evaluation.is_correct();
        self.total_evaluations += 1;
        if correct {
            self.correct_evaluations += 1;
        }
        for r in &evaluation.results {
            let tally = self.per_category.entry(r.category).or_default();
            tally.total += 1;
            if r.correct {
                tally.correct += 1;
            }
        }

        self.recent.push_back(EvaluationRecord {
            snapshot_cycle: evaluation.snapshot_cycle,
            total_categories: evaluation.total_categories,
            correct_categories: evaluation.correct_categories,
            correct,
        });
        while self.recent.len() > recent_capacity {
            self.recent.pop_front();
        }
    }

    pub fn accuracy(&self) -> Option<f64> {
        (self.total_evaluations > 0)
            .then(|| self.correct_evaluations as f64 / self.total_evaluations as f64)
    }

    pub fn category_accuracy(&self, category: StrategyWeightKey) -> Option<f64> {
        self.per_category.get(&category).and_then(CategoryTally::accuracy)
    }
}

pub fn update_prophecy_stats(
    stats: &mut ProphecyStats,
    evaluation: &ProphecyEvaluation,
    recent_capacity: usize,
) {
    stats.record(evaluation, recent_capacity);
}

// =============================================================================
// Ledger
// =============================================================================

/// Owns the snapshot history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProphecyLedger {
    snapshots: Vec<ProphecySnapshot>,
}

impl ProphecyLedger {
    pub fn snapshots(&self) -> &[ProphecySnapshot] {
        &self.snapshots
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn record(&mut self, snapshot: ProphecySnapshot) {
        self.snapshots.push(snapshot);
    }

    /// Score every due snapshot against `current` and mark it evaluated.
    ///
    /// Snapshots without active categories are retired silently and produce
    /// no evaluation.
    pub fn evaluate_due(
        &mut self,
        current_cycle: u64,
        horizon: u64,
        current: &MarketFeatures,
    ) -> Vec<ProphecyEvaluation> {
        let mut evaluations = Vec::new();
        for snapshot in self.snapshots.iter_mut() {
            if !is_due(snapshot, current_cycle, horizon) {
                continue;
            }
            snapshot.evaluated = true;
            if snapshot.active_categories.is_empty() {
                continue;
            }
            evaluations.push(evaluate_prophecy(snapshot, current));
        }
        evaluations
    }

    /// Drop snapshots beyond `max`, oldest evaluated ones first.
    pub fn prune(&mut self, max: usize) {
        let mut excess = self.snapshots.len().saturating_sub(max);
        if excess == 0 {
            return;
        }
        let before = self.snapshots.len();
        self.snapshots.retain(|s| {
            if excess > 0 && s.evaluated {
                excess -= 1;
                false
            } else {
                true
            }
        });
        if excess > 0 {
            self.snapshots.drain(..excess);
        }
        tracing::debug!("Pruned prophecy ledger {} -> {}", before, self.snapshots.len());
    }
}
