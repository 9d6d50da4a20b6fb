use serde::{Deserialize, Serialize};

use crate::split::TierMap;
use crate::value::FieldValue;

/// Control kind of a form field.
///
/// Persisted under the `type` key by the form designer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldKind {
    Text,
    Textarea,
    Number,
    Select,
    Checkbox,
    Radio,
    Date,
    Time,
    File,
    Switch,
    Divider,
    Group,
    DynamicList,
}

impl FieldKind {
    /// Kinds whose `children` are part of the schema tree.
    #[must_use]
    pub fn is_container(self) -> bool {
        matches!(self, FieldKind::Group | FieldKind::DynamicList)
    }

    /// The picker flavour for date/time controls, whose values need (de)serialization at the
    /// engine boundary.
    #[must_use]
    pub fn picker(self) -> Option<PickerKind> {
        match self {
            FieldKind::Date => Some(PickerKind::Date),
            FieldKind::Time => Some(PickerKind::Time),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PickerKind {
    Date,
    Time,
}

/// Rounding policy for numeric inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DecimalPlaces {
    #[serde(rename = "integer", alias = "整数")]
    Integer,
    #[serde(rename = "1-decimal", alias = "1位小数")]
    One,
    #[serde(rename = "2-decimal", alias = "2位小数")]
    Two,
}

impl DecimalPlaces {
    #[must_use]
    pub const fn digits(self) -> i32 {
        match self {
            DecimalPlaces::Integer => 0,
            DecimalPlaces::One => 1,
            DecimalPlaces::Two => 2,
        }
    }

    /// Round half away from zero to the configured number of digits.
    #[must_use]
    pub fn round(self, value: f64) -> f64 {
        match self.digits() {
            0 => value.round(),
            digits => {
                let scale = 10f64.powi(digits);
                (value * scale).round() / scale
            }
        }
    }
}

/// Whether an element is entered directly or computed from other elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ElementType {
    #[serde(alias = "基础要素")]
    Basic,
    #[serde(alias = "派生要素")]
    Derived,
}

/// Link between a form field and an external indicator element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementMapping {
    /// Element code (e.g. `E001`). Formulas may reference the field through this alias.
    pub code: String,
    #[serde(default, alias = "elementName")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_type: Option<ElementType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
}

impl ElementMapping {
    /// The formula text when this mapping describes a derived element.
    #[must_use]
    pub fn derived_formula(&self) -> Option<&str> {
        if self.element_type != Some(ElementType::Derived) {
            return None;
        }
        self.formula
            .as_deref()
            .map(str::trim)
            .filter(|formula| !formula.is_empty())
    }
}

/// Marks a field as a composite value to be distributed across tier sub-fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoSplit {
    #[serde(default = "crate::serde_defaults::default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub target_field_ids: TierMap<String>,
}

impl AutoSplit {
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.enabled && self.target_field_ids.iter().any(|(_, id)| !id.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ShowCondition {
    Filled,
    Empty,
}

/// Expected value(s) of the controlling field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ShowValue {
    AnyOf(Vec<FieldValue>),
    Equals(FieldValue),
}

/// Conditional-display rule: show this field depending on another field's value.
///
/// When both `condition` and `value` are present, `condition` governs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowWhenRule {
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<ShowCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ShowValue>,
}

/// A node in the form schema tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub id: String,
    #[serde(rename = "type", alias = "kind")]
    pub kind: FieldKind,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub required: bool,
    /// Group members, or the row template of a dynamic list.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FieldDefinition>,
    #[serde(
        default,
        rename = "showWhen",
        alias = "visibility",
        skip_serializing_if = "Option::is_none"
    )]
    pub visibility: Option<ShowWhenRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping: Option<ElementMapping>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_split: Option<AutoSplit>,
    #[serde(default)]
    pub computed: bool,
    #[serde(default)]
    pub readonly: bool,
    #[serde(
        default,
        deserialize_with = "crate::serde_defaults::lenient_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub min_value: Option<f64>,
    #[serde(
        default,
        deserialize_with = "crate::serde_defaults::lenient_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimal_places: Option<DecimalPlaces>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl FieldDefinition {
    #[must_use]
    pub fn new(id: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            id: id.into(),
            kind,
            label: String::new(),
            required: false,
            children: Vec::new(),
            visibility: None,
            mapping: None,
            auto_split: None,
            computed: false,
            readonly: false,
            min_value: None,
            max_value: None,
            decimal_places: None,
            unit: None,
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    #[must_use]
    pub fn with_children(mut self, children: Vec<FieldDefinition>) -> Self {
        self.children = children;
        self
    }

    #[must_use]
    pub fn with_visibility(mut self, rule: ShowWhenRule) -> Self {
        self.visibility = Some(rule);
        self
    }

    #[must_use]
    pub fn with_mapping(mut self, mapping: ElementMapping) -> Self {
        self.mapping = Some(mapping);
        self
    }

    #[must_use]
    pub fn with_auto_split(mut self, auto_split: AutoSplit) -> Self {
        self.auto_split = Some(auto_split);
        self
    }

    #[must_use]
    pub fn with_decimal_places(mut self, places: DecimalPlaces) -> Self {
        self.decimal_places = Some(places);
        self
    }

    #[must_use]
    pub fn with_bounds(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min_value = min;
        self.max_value = max;
        self
    }

    /// Element code alias, when the field is mapped to an element.
    #[must_use]
    pub fn element_code(&self) -> Option<&str> {
        self.mapping
            .as_ref()
            .map(|mapping| mapping.code.as_str())
            .filter(|code| !code.is_empty())
    }

    /// Fields whose value is produced by the engine and must not be hand-edited.
    #[must_use]
    pub fn is_engine_owned(&self) -> bool {
        self.computed || self.readonly
    }

    /// Round `value` per this field's `decimalPlaces`; unrounded when unset.
    #[must_use]
    pub fn round_value(&self, value: f64) -> f64 {
        match self.decimal_places {
            Some(places) => places.round(value),
            None => value,
        }
    }

    /// A copy of this field without its children, for flat lookup tables.
    #[must_use]
    pub fn without_children(&self) -> Self {
        Self {
            children: Vec::new(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn decimal_places_round() {
        assert_eq!(DecimalPlaces::Integer.round(555.56), 556.0);
        assert_eq!(DecimalPlaces::One.round(12.34), 12.3);
        assert_eq!(DecimalPlaces::Two.round(1.005_1), 1.01);
    }

    #[test]
    fn derived_formula_requires_derived_element_type() {
        let mut mapping = ElementMapping {
            code: "E003".to_string(),
            name: "ratio".to_string(),
            threshold: None,
            element_type: Some(ElementType::Basic),
            formula: Some("E001 / E002".to_string()),
        };
        assert_eq!(mapping.derived_formula(), None);

        mapping.element_type = Some(ElementType::Derived);
        assert_eq!(mapping.derived_formula(), Some("E001 / E002"));

        mapping.formula = Some("   ".to_string());
        assert_eq!(mapping.derived_formula(), None);
    }

    #[test]
    fn deserializes_persisted_designer_fields() {
        let field: FieldDefinition = serde_json::from_str(
            r#"{
                "id": "building_area",
                "type": "number",
                "label": "Building area",
                "required": true,
                "minValue": "0",
                "maxValue": "",
                "decimalPlaces": "2位小数",
                "showWhen": { "field": "has_building", "value": "yes" }
            }"#,
        )
        .unwrap();

        assert_eq!(field.kind, FieldKind::Number);
        assert_eq!(field.min_value, Some(0.0));
        assert_eq!(field.max_value, None);
        assert_eq!(field.decimal_places, Some(DecimalPlaces::Two));
        assert_eq!(
            field.visibility,
            Some(ShowWhenRule {
                field: "has_building".to_string(),
                condition: None,
                value: Some(ShowValue::Equals(FieldValue::from("yes"))),
            })
        );
    }

    #[test]
    fn auto_split_enabled_defaults_to_true() {
        let split: AutoSplit =
            serde_json::from_str(r#"{ "targetFieldIds": { "primary": "area_primary" } }"#).unwrap();
        assert!(split.enabled);
        assert!(split.is_configured());

        let empty: AutoSplit = serde_json::from_str(r#"{ "enabled": true }"#).unwrap();
        assert!(!empty.is_configured());
    }
}
