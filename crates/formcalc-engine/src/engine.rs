use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use formcalc_model::{
    EngineSettings, FieldDefinition, FieldKind, FieldValue, FormSchema, SchemaError, ValueSnapshot,
};
use serde::Serialize;

use crate::derived::DerivedPlan;
use crate::diagnostics::{Diagnostic, Outputs};
use crate::picker::{normalize_value, normalize_values, serialize_values};
use crate::schema::SchemaIndex;
use crate::split::compute_splits;
use crate::threshold::{validate_threshold_with_epsilon, ThresholdConfig, ThresholdVerdict};
use crate::visibility::resolve_visibility;

/// Which field values changed since the previous evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ChangeSet {
    /// Recompute everything, e.g. after loading a submission.
    #[default]
    All,
    /// Recompute only what depends on these field ids.
    Keys(HashSet<String>),
}

impl ChangeSet {
    pub fn keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ChangeSet::Keys(keys.into_iter().map(Into::into).collect())
    }

    pub fn key(id: impl Into<String>) -> Self {
        ChangeSet::Keys(HashSet::from([id.into()]))
    }

    fn touched(&self) -> Option<&HashSet<String>> {
        match self {
            ChangeSet::All => None,
            ChangeSet::Keys(keys) => Some(keys),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum WarningKind {
    /// The value fails a parsed threshold.
    Violation,
    /// The threshold text could not be understood; the value is not judged.
    Unparseable,
    /// The value lies outside the field's `minValue`/`maxValue`.
    OutOfBounds,
}

/// A non-blocking notice about a field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Warning {
    pub field_id: String,
    pub field_label: String,
    pub value: f64,
    pub threshold: String,
    pub message: String,
    pub kind: WarningKind,
}

/// Result of one engine invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub computed_values: BTreeMap<String, f64>,
    /// Derived and split fields that were recomputed but have no value this time. Whatever
    /// the snapshot holds for them is stale.
    pub cleared_fields: BTreeSet<String>,
    pub visibility: BTreeMap<String, bool>,
    pub warnings: Vec<Warning>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Evaluation {
    /// Whether `id` is shown. Fields unknown to the schema count as visible.
    #[must_use]
    pub fn is_visible(&self, id: &str) -> bool {
        self.visibility.get(id).copied().unwrap_or(true)
    }
}

/// Computes visibility, split and derived values, and warnings for a form schema.
///
/// Everything derived from the schema is built once on construction and rebuilt by
/// [`FormEngine::set_schema`]. Evaluation takes `&self` and is free of hidden state: the same
/// inputs always give the same [`Evaluation`].
#[derive(Debug, Clone)]
pub struct FormEngine {
    schema: FormSchema,
    settings: EngineSettings,
    index: SchemaIndex,
    derived: DerivedPlan,
    thresholds: HashMap<String, ThresholdConfig>,
}

impl FormEngine {
    pub fn new(schema: FormSchema) -> Result<Self, SchemaError> {
        Self::with_settings(schema, EngineSettings::default())
    }

    pub fn with_settings(schema: FormSchema, settings: EngineSettings) -> Result<Self, SchemaError> {
        let index = SchemaIndex::build(&schema.fields, settings.max_schema_depth)?;
        let derived = DerivedPlan::build(&index);
        let thresholds = index
            .iter()
            .filter_map(|entry| {
                let raw = entry.field.mapping.as_ref()?.threshold.as_deref()?.trim();
                (!raw.is_empty()).then(|| (entry.field.id.clone(), ThresholdConfig::parse(raw)))
            })
            .collect();
        if let Some(config) = &schema.split_config {
            for id in config.split_fields.iter().filter(|id| !index.contains(id)) {
                log::warn!("split config lists unknown field {id}");
            }
        }
        Ok(Self {
            schema,
            settings,
            index,
            derived,
            thresholds,
        })
    }

    /// Parses a persisted schema array and builds an engine for it.
    pub fn from_json_str(json: &str) -> Result<Self, SchemaError> {
        Self::new(FormSchema::from_json_str(json)?)
    }

    /// Replaces the schema and rebuilds every cache derived from it.
    ///
    /// On error the engine keeps its previous schema.
    pub fn set_schema(&mut self, schema: FormSchema) -> Result<(), SchemaError> {
        *self = Self::with_settings(schema, self.settings.clone())?;
        Ok(())
    }

    #[must_use]
    pub fn schema(&self) -> &FormSchema {
        &self.schema
    }

    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    #[must_use]
    pub fn index(&self) -> &SchemaIndex {
        &self.index
    }

    #[must_use]
    pub fn derived_plan(&self) -> &DerivedPlan {
        &self.derived
    }

    /// Parses persisted date/time strings of picker fields in place.
    pub fn normalize(&self, values: &mut ValueSnapshot) {
        normalize_values(values, self.index.pickers());
    }

    /// Renders picker values back to their persisted string form.
    #[must_use]
    pub fn serialize(&self, values: &ValueSnapshot) -> ValueSnapshot {
        serialize_values(values, self.index.pickers())
    }

    pub fn evaluate(&self, values: &ValueSnapshot, changed: &ChangeSet) -> Evaluation {
        let visibility = resolve_visibility(&self.index, values);

        let mut out = Outputs::default();
        let touched = changed.touched();
        compute_splits(self.schema.split_config.as_ref(), &self.index, values, touched, &mut out);
        self.derived.compute(&self.index, values, touched, &mut out);

        let current = Current {
            values,
            computed: &out.values,
            cleared: &out.cleared,
            visibility: &visibility,
        };
        let mut warnings = Vec::new();
        if self.settings.check_thresholds {
            self.threshold_warnings(&current, &mut warnings);
        }
        if self.settings.check_bounds {
            self.bound_warnings(&current, &mut warnings);
        }

        Evaluation {
            computed_values: out.values,
            cleared_fields: out.cleared,
            visibility,
            warnings,
            diagnostics: out.diagnostics,
        }
    }

    fn threshold_warnings(&self, current: &Current<'_>, warnings: &mut Vec<Warning>) {
        for entry in self.index.iter() {
            let id = entry.field.id.as_str();
            let Some(threshold) = self.thresholds.get(id) else {
                continue;
            };
            let Some(value) = current.value(id) else {
                continue;
            };
            let (kind, message) =
                match validate_threshold_with_epsilon(value, threshold, self.settings.equality_epsilon) {
                    ThresholdVerdict::Pass => continue,
                    ThresholdVerdict::Fail { message } => (WarningKind::Violation, message),
                    ThresholdVerdict::Unparseable { message } => (WarningKind::Unparseable, message),
                };
            warnings.push(Warning {
                field_id: id.to_string(),
                field_label: display_label(&entry.field),
                value,
                threshold: threshold.raw.clone(),
                message,
                kind,
            });
        }
    }

    fn bound_warnings(&self, current: &Current<'_>, warnings: &mut Vec<Warning>) {
        for entry in self.index.iter() {
            let field = &entry.field;
            if field.kind != FieldKind::Number {
                continue;
            }
            let threshold = match (field.min_value, field.max_value) {
                (Some(min), Some(max)) => format!("{min}-{max}"),
                (Some(min), None) => format!("≥{min}"),
                (None, Some(max)) => format!("≤{max}"),
                (None, None) => continue,
            };
            let Some(value) = current.value(&field.id) else {
                continue;
            };
            let below = field.min_value.is_some_and(|min| value < min);
            let above = field.max_value.is_some_and(|max| value > max);
            if !(below || above) {
                continue;
            }
            warnings.push(Warning {
                field_id: field.id.clone(),
                field_label: display_label(field),
                value,
                message: format!("value {value} is outside the allowed range {threshold}"),
                threshold,
                kind: WarningKind::OutOfBounds,
            });
        }
    }
}

/// What the warning checks see of one evaluation.
struct Current<'a> {
    values: &'a ValueSnapshot,
    computed: &'a BTreeMap<String, f64>,
    cleared: &'a BTreeSet<String>,
    visibility: &'a BTreeMap<String, bool>,
}

impl Current<'_> {
    /// The value warnings judge: freshly computed if present, else the entered one. Hidden
    /// and cleared fields have none.
    fn value(&self, id: &str) -> Option<f64> {
        if !self.visibility.get(id).copied().unwrap_or(true) || self.cleared.contains(id) {
            return None;
        }
        self.computed.get(id).copied().or_else(|| self.values.number(id))
    }
}

fn display_label(field: &FieldDefinition) -> String {
    if !field.label.is_empty() {
        return field.label.clone();
    }
    field
        .mapping
        .as_ref()
        .map(|mapping| mapping.name.as_str())
        .filter(|name| !name.is_empty())
        .unwrap_or(&field.id)
        .to_string()
}

/// One user's editing session: an engine plus the value snapshot it computes over.
///
/// Every edit is evaluated immediately and the computed values are merged back into the
/// snapshot, so the snapshot always holds the latest derived and split values.
#[derive(Debug, Clone)]
pub struct FormSession {
    engine: FormEngine,
    values: ValueSnapshot,
}

impl FormSession {
    #[must_use]
    pub fn new(engine: FormEngine) -> Self {
        Self {
            engine,
            values: ValueSnapshot::new(),
        }
    }

    /// Replaces the snapshot with a persisted submission and evaluates it in full.
    pub fn load(&mut self, persisted: ValueSnapshot) -> Evaluation {
        self.values = persisted;
        self.engine.normalize(&mut self.values);
        self.refresh(&ChangeSet::All)
    }

    pub fn load_json(&mut self, json: &str) -> serde_json::Result<Evaluation> {
        Ok(self.load(ValueSnapshot::from_json_str(json)?))
    }

    /// Records a user edit and evaluates what depends on it.
    ///
    /// Edits to computed or read-only fields are ignored; the engine owns those values.
    pub fn set_value(&mut self, id: &str, value: impl Into<FieldValue>) -> Evaluation {
        let mut value = value.into();
        let engine_owned = self
            .engine
            .index()
            .field(id)
            .is_some_and(FieldDefinition::is_engine_owned);
        if engine_owned {
            log::warn!("ignoring edit of engine-owned field {id}");
            return self.refresh(&ChangeSet::Keys(HashSet::new()));
        }
        if let Some(kind) = self.engine.index().picker(id) {
            value = normalize_value(kind, value);
        }
        self.values.insert(id, value);
        self.refresh(&ChangeSet::key(id))
    }

    /// Re-evaluates the snapshot without an edit, e.g. after the schema changed.
    ///
    /// Computed values are merged into the snapshot and cleared fields are removed from it.
    pub fn refresh(&mut self, changed: &ChangeSet) -> Evaluation {
        let evaluation = self.engine.evaluate(&self.values, changed);
        for (id, value) in &evaluation.computed_values {
            self.values.insert(id.as_str(), *value);
        }
        for id in &evaluation.cleared_fields {
            self.values.remove(id);
        }
        evaluation
    }

    pub fn set_schema(&mut self, schema: FormSchema) -> Result<Evaluation, SchemaError> {
        self.engine.set_schema(schema)?;
        Ok(self.refresh(&ChangeSet::All))
    }

    #[must_use]
    pub fn engine(&self) -> &FormEngine {
        &self.engine
    }

    #[must_use]
    pub fn values(&self) -> &ValueSnapshot {
        &self.values
    }

    /// The snapshot in persisted form, picker values rendered as strings.
    #[must_use]
    pub fn to_persisted(&self) -> ValueSnapshot {
        self.engine.serialize(&self.values)
    }

    pub fn to_persisted_json(&self) -> serde_json::Result<String> {
        self.to_persisted().to_json_string()
    }
}
