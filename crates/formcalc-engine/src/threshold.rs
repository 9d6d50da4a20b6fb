//! Author-written acceptable-value thresholds such as `≤0.50`, `≥95%`, `90-100` or `100`.
//!
//! A trailing `%` is dropped without rescaling: `≥95%` compares the value against `95`.
//! Thresholds that cannot be understood never block a submission; they classify as
//! [`ThresholdVerdict::Unparseable`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// Default tolerance for `=` thresholds.
pub const DEFAULT_EQUALITY_EPSILON: f64 = 1e-4;

/// Operator prefixes, longest spelling first so `<=` is not read as `<` followed by `=...`.
const OPERATOR_PREFIXES: [(&str, CompareOp); 8] = [
    ("<=", CompareOp::Le),
    (">=", CompareOp::Ge),
    ("==", CompareOp::Eq),
    ("≤", CompareOp::Le),
    ("≥", CompareOp::Ge),
    ("<", CompareOp::Lt),
    (">", CompareOp::Gt),
    ("=", CompareOp::Eq),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    #[serde(rename = "≤")]
    Le,
    #[serde(rename = "≥")]
    Ge,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "=")]
    Eq,
}

impl CompareOp {
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            CompareOp::Le => "≤",
            CompareOp::Ge => "≥",
            CompareOp::Lt => "<",
            CompareOp::Gt => ">",
            CompareOp::Eq => "=",
        }
    }

    fn holds(self, value: f64, threshold: f64, epsilon: f64) -> bool {
        match self {
            CompareOp::Le => value <= threshold,
            CompareOp::Ge => value >= threshold,
            CompareOp::Lt => value < threshold,
            CompareOp::Gt => value > threshold,
            CompareOp::Eq => (value - threshold).abs() < epsilon,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Structured predicate parsed from a threshold string.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operator", rename_all = "camelCase")]
pub enum ThresholdPredicate {
    #[serde(rename = "compare")]
    Compare { op: CompareOp, value: f64 },
    /// Inclusive on both ends.
    Range { min: f64, max: f64 },
}

/// A threshold string together with its parsed predicate, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    pub raw: String,
    pub predicate: Option<ThresholdPredicate>,
}

impl ThresholdConfig {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            predicate: parse_predicate(raw),
        }
    }

    #[must_use]
    pub fn is_parseable(&self) -> bool {
        self.predicate.is_some()
    }

    #[must_use]
    pub fn check(&self, value: f64) -> ThresholdVerdict {
        validate_threshold_with_epsilon(value, self, DEFAULT_EQUALITY_EPSILON)
    }
}

/// Outcome of checking a value against a threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThresholdVerdict {
    Pass,
    Fail { message: String },
    /// The threshold could not be parsed; treated as valid but worth flagging.
    Unparseable { message: String },
}

impl ThresholdVerdict {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !matches!(self, ThresholdVerdict::Fail { .. })
    }

    #[must_use]
    pub fn is_warning(&self) -> bool {
        matches!(self, ThresholdVerdict::Unparseable { .. })
    }

    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            ThresholdVerdict::Pass => None,
            ThresholdVerdict::Fail { message } | ThresholdVerdict::Unparseable { message } => {
                Some(message)
            }
        }
    }
}

#[must_use]
pub fn parse_threshold(raw: &str) -> ThresholdConfig {
    ThresholdConfig::parse(raw)
}

#[must_use]
pub fn validate_threshold(value: f64, config: &ThresholdConfig) -> ThresholdVerdict {
    validate_threshold_with_epsilon(value, config, DEFAULT_EQUALITY_EPSILON)
}

#[must_use]
pub fn validate_threshold_with_epsilon(
    value: f64,
    config: &ThresholdConfig,
    epsilon: f64,
) -> ThresholdVerdict {
    let raw = &config.raw;
    match config.predicate {
        None => ThresholdVerdict::Unparseable {
            message: format!("unable to parse threshold {raw:?}"),
        },
        Some(ThresholdPredicate::Range { min, max }) => {
            if value >= min && value <= max {
                ThresholdVerdict::Pass
            } else {
                ThresholdVerdict::Fail {
                    message: format!("value {value} is outside the threshold range {raw}"),
                }
            }
        }
        Some(ThresholdPredicate::Compare { op, value: limit }) => {
            if op.holds(value, limit, epsilon) {
                ThresholdVerdict::Pass
            } else {
                ThresholdVerdict::Fail {
                    message: format!("value {value} does not meet the threshold {raw}"),
                }
            }
        }
    }
}

fn parse_predicate(raw: &str) -> Option<ThresholdPredicate> {
    let mut text = raw.trim();
    if let Some(stripped) = text.strip_suffix('%') {
        text = stripped.trim_end();
    }
    if text.is_empty() {
        return None;
    }

    for (prefix, op) in OPERATOR_PREFIXES {
        if let Some(rest) = text.strip_prefix(prefix) {
            let value = parse_float_prefix(rest)?;
            return Some(ThresholdPredicate::Compare { op, value });
        }
    }

    // A leading '-' is a negative number, not a range.
    if text.contains('-') && !text.starts_with('-') {
        let mut parts = text.split('-');
        if let (Some(min), Some(max), None) = (parts.next(), parts.next(), parts.next()) {
            if let (Some(min), Some(max)) = (parse_float_prefix(min), parse_float_prefix(max)) {
                return Some(ThresholdPredicate::Range { min, max });
            }
        }
    }

    parse_float_prefix(text).map(|value| ThresholdPredicate::Compare {
        op: CompareOp::Eq,
        value,
    })
}

/// Leading decimal literal of `s` (after whitespace), ignoring any trailing text.
///
/// Accepts an optional sign, digits with an optional fraction, and an optional exponent:
/// `"0.50abc"` reads as `0.5`, `"17:1"` as `17`.
pub(crate) fn parse_float_prefix(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    let int_start = end;
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    let mut digits = end - int_start;
    if bytes.get(end) == Some(&b'.') {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while bytes.get(frac_end).is_some_and(u8::is_ascii_digit) {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }
    if digits == 0 {
        return None;
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while bytes.get(exp_end).is_some_and(u8::is_ascii_digit) {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse::<f64>().ok().filter(|n| n.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn compare(op: CompareOp, value: f64) -> Option<ThresholdPredicate> {
        Some(ThresholdPredicate::Compare { op, value })
    }

    #[test]
    fn parses_operator_prefixes() {
        assert_eq!(parse_threshold("≤0.50").predicate, compare(CompareOp::Le, 0.5));
        assert_eq!(parse_threshold(">= 95%").predicate, compare(CompareOp::Ge, 95.0));
        assert_eq!(parse_threshold("<=4.2").predicate, compare(CompareOp::Le, 4.2));
        assert_eq!(parse_threshold("==100").predicate, compare(CompareOp::Eq, 100.0));
        assert_eq!(parse_threshold("> 0").predicate, compare(CompareOp::Gt, 0.0));
        assert_eq!(parse_threshold("<-1").predicate, compare(CompareOp::Lt, -1.0));
        assert_eq!(parse_threshold("≤17:1").predicate, compare(CompareOp::Le, 17.0));
    }

    #[test]
    fn parses_ranges_and_bare_numbers() {
        assert_eq!(
            parse_threshold("90-100").predicate,
            Some(ThresholdPredicate::Range {
                min: 90.0,
                max: 100.0
            })
        );
        assert_eq!(
            parse_threshold("0.3 - 0.5").predicate,
            Some(ThresholdPredicate::Range { min: 0.3, max: 0.5 })
        );
        assert_eq!(parse_threshold("100%").predicate, compare(CompareOp::Eq, 100.0));
        assert_eq!(parse_threshold("-5").predicate, compare(CompareOp::Eq, -5.0));
    }

    #[test]
    fn unparseable_thresholds() {
        for raw in ["", "%", "good", "≥", ">=abc", "between 1 and 2"] {
            assert_eq!(parse_threshold(raw).predicate, None, "{raw:?}");
        }
        // Not a two-part range; the leading number is read as an equality threshold.
        assert_eq!(parse_threshold("1-2-3").predicate, compare(CompareOp::Eq, 1.0));
    }

    #[test]
    fn comparison_verdicts_cite_value_and_raw_threshold() {
        let config = parse_threshold("≤0.50");
        assert_eq!(validate_threshold(0.3, &config), ThresholdVerdict::Pass);

        let verdict = validate_threshold(0.6, &config);
        assert!(!verdict.is_valid());
        let message = verdict.message().unwrap();
        assert!(message.contains("0.6"), "{message}");
        assert!(message.contains("≤0.50"), "{message}");
    }

    #[test]
    fn range_is_inclusive() {
        let config = parse_threshold("90-100");
        assert!(validate_threshold(90.0, &config).is_valid());
        assert!(validate_threshold(95.0, &config).is_valid());
        assert!(validate_threshold(100.0, &config).is_valid());

        let verdict = validate_threshold(101.0, &config);
        assert!(!verdict.is_valid());
        assert!(verdict.message().unwrap().contains("101"));
        assert!(verdict.message().unwrap().contains("90-100"));
    }

    #[test]
    fn equality_tolerates_float_noise() {
        let config = parse_threshold("0.3");
        assert!(validate_threshold(0.1 + 0.2, &config).is_valid());
        assert!(!validate_threshold(0.301, &config).is_valid());
        assert!(validate_threshold_with_epsilon(0.301, &config, 0.01).is_valid());
    }

    #[test]
    fn unparseable_is_a_non_blocking_warning() {
        let verdict = validate_threshold(42.0, &parse_threshold("see appendix"));
        assert!(verdict.is_valid());
        assert!(verdict.is_warning());
        assert!(verdict.message().unwrap().contains("see appendix"));
    }

    #[test]
    fn float_prefix_matches_lenient_parsing() {
        assert_eq!(parse_float_prefix("0.50abc"), Some(0.5));
        assert_eq!(parse_float_prefix("  .5"), Some(0.5));
        assert_eq!(parse_float_prefix("5."), Some(5.0));
        assert_eq!(parse_float_prefix("1e3x"), Some(1000.0));
        assert_eq!(parse_float_prefix("2e"), Some(2.0));
        assert_eq!(parse_float_prefix("-"), None);
        assert_eq!(parse_float_prefix("."), None);
        assert_eq!(parse_float_prefix("abc"), None);
    }
}
