use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Value of a single form field.
///
/// JSON at rest uses plain scalars; `Date`/`Time` only exist in memory, between
/// normalization of a loaded submission and serialization for persistence. The untagged
/// layout means a JSON string always deserializes as [`FieldValue::Text`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    /// Rows of a dynamic list.
    Rows(Vec<ValueSnapshot>),
    /// Multi-valued controls (checkbox groups, uploaded file lists).
    List(Vec<FieldValue>),
    Date(NaiveDate),
    Time(NaiveTime),
}

impl Default for FieldValue {
    fn default() -> Self {
        FieldValue::Null
    }
}

impl FieldValue {
    /// `null` or the empty string: what a "filled" rule treats as not filled.
    ///
    /// `0`, `false` and empty lists are values.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Numeric reading of the value: numbers, and strings holding a finite number.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) if n.is_finite() => Some(*n),
            FieldValue::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return None;
                }
                trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Equality without coercion: `1` and `"1"` differ.
    #[must_use]
    pub fn strict_eq(&self, other: &FieldValue) -> bool {
        match (self, other) {
            (FieldValue::Number(a), FieldValue::Number(b)) => a == b,
            (FieldValue::List(_), FieldValue::List(_)) | (FieldValue::Rows(_), FieldValue::Rows(_)) => {
                false
            }
            _ => self == other,
        }
    }

    /// Discriminator-style text reading: strings as-is, numbers and booleans rendered.
    #[must_use]
    pub fn to_key(&self) -> Option<String> {
        match self {
            FieldValue::Text(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            FieldValue::Number(n) if n.is_finite() => Some(n.to_string()),
            FieldValue::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(value as f64)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        FieldValue::Date(value)
    }
}

impl From<NaiveTime> for FieldValue {
    fn from(value: NaiveTime) -> Self {
        FieldValue::Time(value)
    }
}

/// Field id → value map owned by a form session.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValueSnapshot(BTreeMap<String, FieldValue>);

impl ValueSnapshot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn to_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&FieldValue> {
        self.0.get(id)
    }

    #[must_use]
    pub fn number(&self, id: &str) -> Option<f64> {
        self.get(id).and_then(FieldValue::as_number)
    }

    /// A value is filled when present and not blank.
    #[must_use]
    pub fn is_filled(&self, id: &str) -> bool {
        self.get(id).is_some_and(|value| !value.is_blank())
    }

    pub fn insert(&mut self, id: impl Into<String>, value: impl Into<FieldValue>) -> Option<FieldValue> {
        self.0.insert(id.into(), value.into())
    }

    pub fn remove(&mut self, id: &str) -> Option<FieldValue> {
        self.0.remove(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> + '_ {
        self.0.iter().map(|(id, value)| (id.as_str(), value))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut FieldValue)> + '_ {
        self.0.iter_mut().map(|(id, value)| (id.as_str(), value))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for ValueSnapshot {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(id, value)| (id.into(), value.into()))
                .collect(),
        )
    }
}
