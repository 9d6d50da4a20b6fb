//! Date/time picker values at the engine boundary.
//!
//! Persisted submissions store dates as `YYYY-MM-DD` and times as `HH:MM:SS` strings.
//! [`normalize_values`] turns those into [`FieldValue::Date`]/[`FieldValue::Time`] for
//! picker fields and [`serialize_values`] turns them back. Fields that are not pickers are
//! never touched, including inside dynamic-list rows.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveTime};
use formcalc_model::{FieldValue, PickerKind, ValueSnapshot};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// Parses persisted picker strings in place.
///
/// Strings that do not match the picker's format are left as text.
pub fn normalize_values(values: &mut ValueSnapshot, pickers: &HashMap<String, PickerKind>) {
    if pickers.is_empty() {
        return;
    }
    for (id, value) in values.iter_mut() {
        match value {
            FieldValue::Rows(rows) => {
                for row in rows.iter_mut() {
                    normalize_values(row, pickers);
                }
            }
            FieldValue::Text(text) => {
                let Some(kind) = pickers.get(id) else {
                    continue;
                };
                let Some(parsed) = parse_picker_text(*kind, text) else {
                    log::debug!("leaving unparseable {kind:?} value {text:?} for field {id}");
                    continue;
                };
                *value = parsed;
            }
            _ => {}
        }
    }
}

/// A copy of `values` with picker values rendered back to their canonical strings.
#[must_use]
pub fn serialize_values(values: &ValueSnapshot, pickers: &HashMap<String, PickerKind>) -> ValueSnapshot {
    values
        .iter()
        .map(|(id, value)| {
            let out = match value {
                FieldValue::Rows(rows) => FieldValue::Rows(
                    rows.iter()
                        .map(|row| serialize_values(row, pickers))
                        .collect(),
                ),
                FieldValue::Date(date) if pickers.contains_key(id) => {
                    FieldValue::Text(date.format(DATE_FORMAT).to_string())
                }
                FieldValue::Time(time) if pickers.contains_key(id) => {
                    FieldValue::Text(time.format(TIME_FORMAT).to_string())
                }
                other => other.clone(),
            };
            (id.to_string(), out)
        })
        .collect()
}

/// Parses a single persisted picker value; anything else is returned unchanged.
#[must_use]
pub fn normalize_value(kind: PickerKind, value: FieldValue) -> FieldValue {
    let parsed = match &value {
        FieldValue::Text(text) => parse_picker_text(kind, text),
        _ => None,
    };
    parsed.unwrap_or(value)
}

fn parse_picker_text(kind: PickerKind, text: &str) -> Option<FieldValue> {
    let s = text.trim();
    match kind {
        PickerKind::Date => parse_date(s).map(FieldValue::Date),
        PickerKind::Time => parse_time(s).map(FieldValue::Time),
    }
}

/// `YYYY-MM-DD`, or the date part of an ISO-ish date-time string.
fn parse_date(s: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(s, DATE_FORMAT) {
        return Some(date);
    }
    let (head, tail) = (s.get(..10)?, s.get(10..)?);
    if !tail.starts_with(|c: char| c == 'T' || c == ' ') {
        return None;
    }
    NaiveDate::parse_from_str(head, DATE_FORMAT).ok()
}

/// Strictly `HH:MM:SS` or `HH:MM`, two digits per component.
fn parse_time(s: &str) -> Option<NaiveTime> {
    let bytes = s.as_bytes();
    let digits = |range: std::ops::Range<usize>| bytes[range].iter().all(u8::is_ascii_digit);
    match bytes.len() {
        5 if bytes[2] == b':' && digits(0..2) && digits(3..5) => {
            NaiveTime::parse_from_str(s, "%H:%M").ok()
        }
        8 if bytes[2] == b':' && bytes[5] == b':' && digits(0..2) && digits(3..5) && digits(6..8) => {
            NaiveTime::parse_from_str(s, TIME_FORMAT).ok()
        }
        _ => None,
    }
}
