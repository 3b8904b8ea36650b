//! Inbound sanitization for collaborator-supplied cycle input.
//!
//! Weight adjustments usually come from an LLM reviewing past prophecies, so
//! the text may be wrapped in prose or a markdown code block, and individual
//! items may be malformed. Nothing here fails: invalid items are dropped one
//! at a time and garbage input yields an empty list.

use crate::weights::{AdjustmentDirection, AdjustmentMagnitude, WeightAdjustment};
use augur_core::{EmotionStimulus, StrategyWeightKey};
use augur_limbic::ObservedMetrics;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::prophecy::MarketFeatures;

/// Longest rationale kept, in characters.
pub const MAX_RATIONALE_CHARS: usize = 280;
pub const DEFAULT_MAX_ADJUSTMENTS: usize = 5;

// =============================================================================
// Adjustment parsing
// =============================================================================

/// Parse raw collaborator text into a sanitized adjustment batch of at most
/// `max_items` entries.
pub fn parse_weight_adjustments(text: &str, max_items: usize) -> Vec<WeightAdjustment> {
    let Some(value) = locate_json(text) else {
        if !text.trim().is_empty() {
            tracing::debug!("No JSON found in adjustment text: {}", truncate(text.trim(), 120));
        }
        return Vec::new();
    };
    sanitize_adjustments(&adjustment_items(value), max_items)
}

/// Validate already-decoded JSON items, dropping invalid ones individually.
pub fn sanitize_adjustments(items: &[Value], max_items: usize) -> Vec<WeightAdjustment> {
    let mut valid: Vec<WeightAdjustment> = items.iter().filter_map(validate_adjustment).collect();
    if valid.len() > max_items {
        tracing::debug!(
            "Capping adjustment batch at {} (received {} valid)",
            max_items,
            valid.len()
        );
        valid.truncate(max_items);
    }
    valid
}

fn locate_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();

    if let Ok(v) = serde_json::from_str::<Value>(trimmed) {
        return Some(v);
    }

    // Markdown code block
    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after[body_start..];
        if let Some(end) = body.find("```") {
            if let Ok(v) = serde_json::from_str::<Value>(body[..end].trim()) {
                return Some(v);
            }
        }
    }

    // Outermost span, whichever bracket opens first
    let spans = [('{', '}'), ('[', ']')];
    let mut candidates: Vec<(usize, &str)> = spans
        .iter()
        .filter_map(|&(open, close)| {
            let start = trimmed.find(open)?;
            let end = trimmed.rfind(close)?;
            (end > start).then(|| (start, &trimmed[start..=end]))
        })
        .collect();
    candidates.sort_by_key(|&(start, _)| start);
    candidates
        .into_iter()
        .find_map(|(_, span)| serde_json::from_str::<Value>(span).ok())
}

fn adjustment_items(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("adjustments") {
            Some(Value::Array(items)) => items,
            Some(_) => Vec::new(),
            None if map.contains_key("category") => vec![Value::Object(map)],
            None => Vec::new(),
        },
        _ => Vec::new(),
    }
}

fn validate_adjustment(item: &Value) -> Option<WeightAdjustment> {
    let Some(obj) = item.as_object() else {
        tracing::debug!("Dropping non-object adjustment item: {}", item);
        return None;
    };

    let category = match obj.get("category").and_then(Value::as_str) {
        Some(raw) => match raw.parse::<StrategyWeightKey>() {
            Ok(c) => c,
            Err(e) => {
                tracing::debug!("Dropping adjustment: {}", e);
                return None;
            }
        },
        None => {
            tracing::debug!("Dropping adjustment without category");
            return None;
        }
    };

    let direction = match obj
        .get("direction")
        .and_then(Value::as_str)
        .map(|d| d.trim().to_ascii_lowercase())
        .as_deref()
    {
        Some("increase") => AdjustmentDirection::Increase,
        Some("decrease") => AdjustmentDirection::Decrease,
        Some("reset") => AdjustmentDirection::Reset,
        other => {
            tracing::debug!("Dropping {} adjustment with direction {:?}", category, other);
            return None;
        }
    };

    let magnitude = obj.get("magnitude").and_then(Value::as_str).map(|m| {
        match m.trim().to_ascii_lowercase().as_str() {
            "nudge" => AdjustmentMagnitude::Nudge,
            "strong" => AdjustmentMagnitude::Strong,
            _ => AdjustmentMagnitude::Moderate,
        }
    });

    let rationale = obj
        .get("rationale")
        .and_then(Value::as_str)
        .map(|r| truncate(r.trim(), MAX_RATIONALE_CHARS).to_string())
        .unwrap_or_default();

    Some(WeightAdjustment {
        category,
        direction,
        magnitude,
        rationale,
    })
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Decode stimuli one item at a time so a single bad entry does not discard
/// the batch.
pub fn sanitize_stimuli(items: &[Value]) -> Vec<EmotionStimulus> {
    items
        .iter()
        .filter_map(|item| match EmotionStimulus::deserialize(item) {
            Ok(s) => Some(s),
            Err(e) => {
                tracing::debug!("Dropping malformed stimulus ({}): {}", e, item);
                None
            }
        })
        .collect()
}

// =============================================================================
// Cycle input
// =============================================================================

/// A cycle input as it arrives on disk. Every field is optional and kept
/// untyped until [`RawCycleInput::into_parts`], so one malformed field is
/// dropped on its own instead of rejecting the whole file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawCycleInput {
    pub metrics: Value,
    pub stimuli: Value,
    pub adjustments: Value,
    pub adjustments_text: Value,
    pub market: Value,
    /// RFC 3339 timestamp.
    pub timestamp: Value,
    #[serde(skip)]
    pub source: Option<String>,
}

/// Sanitized, typed input for one cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleInput {
    pub stimuli: Vec<EmotionStimulus>,
    pub adjustments: Vec<WeightAdjustment>,
    /// Market observation for this cycle. `None` defers prophecy scoring.
    pub market: Option<MarketFeatures>,
    /// Unix seconds; wall-clock time when absent.
    pub timestamp: Option<i64>,
    /// Identifies the input so a replayed file can be recognised.
    pub source: Option<String>,
}

impl RawCycleInput {
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Split into the metrics for calibration and the sanitized cycle input.
    pub fn into_parts(self, max_adjustments: usize) -> (ObservedMetrics, CycleInput) {
        let adjustment_list = list_field("adjustments", &self.adjustments);
        let mut adjustments = sanitize_adjustments(adjustment_list, max_adjustments);
        if let Some(text) = decode_field::<String>("adjustments_text", &self.adjustments_text) {
            let room = max_adjustments.saturating_sub(adjustments.len());
            adjustments.extend(parse_weight_adjustments(&text, room));
        }
        let timestamp =
            decode_field::<chrono::DateTime<chrono::Utc>>("timestamp", &self.timestamp);
        let input = CycleInput {
            stimuli: sanitize_stimuli(list_field("stimuli", &self.stimuli)),
            adjustments,
            market: decode_field::<MarketFeatures>("market", &self.market),
            timestamp: timestamp.map(|t| t.timestamp()),
            source: self.source,
        };
        let metrics = decode_field("metrics", &self.metrics).unwrap_or_default();
        (metrics, input)
    }
}

/// Decode an optional field. Null is absent; anything malformed is dropped.
fn decode_field<T: DeserializeOwned>(name: &str, value: &Value) -> Option<T> {
    if value.is_null() {
        return None;
    }
    match T::deserialize(value) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::debug!("Dropping malformed {} ({}): {}", name, e, truncate(&value.to_string(), 120));
            None
        }
    }
}

fn list_field<'a>(name: &str, value: &'a Value) -> &'a [Value] {
    match value {
        Value::Array(items) => items.as_slice(),
        Value::Null => &[],
        other => {
            tracing::debug!("Ignoring {}: expected a list, got {}", name, truncate(&other.to_string(), 120));
            &[]
        }
    }
}
