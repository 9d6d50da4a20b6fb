//! Suggested self-assessment conclusions for indicators, from their data indicators.
//!
//! Suggestions are advisory: anything the rules cannot decide is left pending (`None`) for a
//! human reviewer.

use std::collections::BTreeMap;

use formcalc_model::FieldValue;
use serde::{Deserialize, Serialize};

use crate::threshold::{ThresholdConfig, ThresholdVerdict};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DataType {
    #[serde(alias = "数字")]
    Number,
    #[serde(alias = "逻辑")]
    Logical,
    #[serde(alias = "文本")]
    Text,
}

/// `single`: the threshold decides between qualified and unqualified. `tiered`: meeting the
/// threshold is qualified, anything else needs human judgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ThresholdType {
    Single,
    Tiered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Conclusion {
    #[serde(alias = "合格")]
    Qualified,
    #[serde(alias = "基本合格")]
    BasicallyQualified,
    #[serde(alias = "不合格")]
    Unqualified,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataIndicator {
    pub id: String,
    pub code: String,
    pub name: String,
    pub data_type: DataType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default)]
    pub threshold: String,
    pub threshold_type: ThresholdType,
    #[serde(default)]
    pub actual_value: FieldValue,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelfAssessment {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub conclusion: Option<Conclusion>,
}

/// A second-level indicator and the data indicators it is judged on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeafIndicator {
    pub id: String,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub data_indicators: Vec<DataIndicator>,
    #[serde(default)]
    pub self_assessment: SelfAssessment,
}

/// Conclusion suggested by a single data indicator.
#[must_use]
pub fn judge_data_indicator(indicator: &DataIndicator) -> Option<Conclusion> {
    if indicator.actual_value.is_blank() {
        return None;
    }
    match indicator.data_type {
        DataType::Number => judge_numeric(indicator),
        DataType::Logical => judge_logical(&indicator.actual_value),
        DataType::Text => None,
    }
}

fn judge_numeric(indicator: &DataIndicator) -> Option<Conclusion> {
    let value = indicator.actual_value.as_number()?;
    let threshold = ThresholdConfig::parse(&indicator.threshold);
    let passed = match threshold.check(value) {
        ThresholdVerdict::Pass => true,
        ThresholdVerdict::Fail { .. } => false,
        ThresholdVerdict::Unparseable { message } => {
            log::warn!("indicator {}: {message}", indicator.code);
            return None;
        }
    };
    match (indicator.threshold_type, passed) {
        (_, true) => Some(Conclusion::Qualified),
        (ThresholdType::Single, false) => Some(Conclusion::Unqualified),
        (ThresholdType::Tiered, false) => None,
    }
}

fn judge_logical(value: &FieldValue) -> Option<Conclusion> {
    match value.to_key()?.as_str() {
        "合格" | "qualified" | "true" | "yes" => Some(Conclusion::Qualified),
        "基本合格" | "basically_qualified" => Some(Conclusion::BasicallyQualified),
        "不合格" | "unqualified" | "false" | "no" => Some(Conclusion::Unqualified),
        _ => None,
    }
}

/// Combines the data-indicator verdicts of `indicator`.
///
/// Any unqualified verdict makes the indicator unqualified; it is qualified only when every
/// verdict is; otherwise any basically-qualified verdict wins; otherwise pending.
#[must_use]
pub fn suggest_conclusion(indicator: &LeafIndicator) -> Option<Conclusion> {
    if indicator.data_indicators.is_empty() {
        return None;
    }
    let verdicts: Vec<Option<Conclusion>> = indicator
        .data_indicators
        .iter()
        .map(judge_data_indicator)
        .collect();

    if verdicts.contains(&Some(Conclusion::Unqualified)) {
        Some(Conclusion::Unqualified)
    } else if verdicts.iter().all(|v| *v == Some(Conclusion::Qualified)) {
        Some(Conclusion::Qualified)
    } else if verdicts.contains(&Some(Conclusion::BasicallyQualified)) {
        Some(Conclusion::BasicallyQualified)
    } else {
        None
    }
}

#[must_use]
pub fn suggest_conclusions(indicators: &[LeafIndicator]) -> BTreeMap<String, Option<Conclusion>> {
    indicators
        .iter()
        .map(|indicator| (indicator.id.clone(), suggest_conclusion(indicator)))
        .collect()
}

/// One clause per data indicator, e.g. `Teacher ratio is 15:1, required ≤17; ...`.
#[must_use]
pub fn describe(indicator: &LeafIndicator) -> String {
    let clauses: Vec<String> = indicator
        .data_indicators
        .iter()
        .map(|data| {
            let Some(value) = render(&data.actual_value) else {
                return format!("{}: no data", data.name);
            };
            match data.data_type {
                DataType::Number => format!(
                    "{} is {value}{}, required {}",
                    data.name,
                    data.unit.as_deref().unwrap_or_default(),
                    data.threshold
                ),
                DataType::Logical => {
                    let status = match judge_logical(&data.actual_value) {
                        Some(Conclusion::Qualified) => "meets the standard",
                        Some(Conclusion::BasicallyQualified) => "basically meets the standard",
                        _ => "does not meet the standard",
                    };
                    format!("{} {status}", data.name)
                }
                DataType::Text => format!("{}: {value}", data.name),
            }
        })
        .collect();
    format!("{}.", clauses.join("; "))
}

fn render(value: &FieldValue) -> Option<String> {
    if value.is_blank() {
        return None;
    }
    value
        .to_key()
        .or_else(|| serde_json::to_string(value).ok())
}

/// A copy of `indicator` with one data indicator's value replaced and the suggestion and
/// description refreshed. Unknown ids only refresh.
#[must_use]
pub fn update_indicator_value(
    indicator: &LeafIndicator,
    data_indicator_id: &str,
    value: FieldValue,
) -> LeafIndicator {
    let mut updated = indicator.clone();
    if let Some(data) = updated
        .data_indicators
        .iter_mut()
        .find(|data| data.id == data_indicator_id)
    {
        data.actual_value = value;
    }
    updated.self_assessment = SelfAssessment {
        description: describe(&updated),
        conclusion: suggest_conclusion(&updated),
    };
    updated
}

/// Tally of recorded self-assessment conclusions.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionStats {
    pub total: usize,
    pub qualified: usize,
    pub basically_qualified: usize,
    pub unqualified: usize,
    pub pending: usize,
    /// Qualified plus basically qualified, as a percentage with two decimals.
    pub qualified_rate: f64,
}

impl CompletionStats {
    #[must_use]
    pub fn from_indicators(indicators: &[LeafIndicator]) -> Self {
        let mut stats = CompletionStats {
            total: indicators.len(),
            ..CompletionStats::default()
        };
        for indicator in indicators {
            match indicator.self_assessment.conclusion {
                Some(Conclusion::Qualified) => stats.qualified += 1,
                Some(Conclusion::BasicallyQualified) => stats.basically_qualified += 1,
                Some(Conclusion::Unqualified) => stats.unqualified += 1,
                None => stats.pending += 1,
            }
        }
        if stats.total > 0 {
            let passed = (stats.qualified + stats.basically_qualified) as f64;
            stats.qualified_rate = (passed / stats.total as f64 * 10_000.0).round() / 100.0;
        }
        stats
    }
}
