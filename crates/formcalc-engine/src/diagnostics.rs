use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use crate::error::FormulaError;

/// A field the engine skipped, and why.
///
/// Diagnostics never fail an evaluation. Those that point at a schema authoring mistake are
/// logged at `warn`, the rest (inputs not filled in yet) at `debug`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Diagnostic {
    /// A derived field's formula failed to parse or evaluate.
    FormulaSkipped { field_id: String, error: FormulaError },
    /// A derived field depends on itself, directly or through other derived fields.
    DependencyCycle { field_id: String },
    /// A split field id that is not part of the schema.
    MissingFieldDefinition { field_id: String },
    SplitNotConfigured { field_id: String, reason: String },
    NoSplitRule { field_id: String, discriminator: String },
    /// Two computations wrote the same field in one evaluation; the later value was kept.
    ConflictingWrite { field_id: String },
}

impl Diagnostic {
    #[must_use]
    pub fn field_id(&self) -> &str {
        match self {
            Diagnostic::FormulaSkipped { field_id, .. }
            | Diagnostic::DependencyCycle { field_id }
            | Diagnostic::MissingFieldDefinition { field_id }
            | Diagnostic::SplitNotConfigured { field_id, .. }
            | Diagnostic::NoSplitRule { field_id, .. }
            | Diagnostic::ConflictingWrite { field_id } => field_id,
        }
    }

    /// Whether the diagnostic points at a broken schema rather than incomplete input.
    #[must_use]
    pub fn is_authoring_error(&self) -> bool {
        match self {
            Diagnostic::FormulaSkipped { error, .. } => {
                matches!(error, FormulaError::InvalidExpression { .. })
            }
            Diagnostic::NoSplitRule { .. } => false,
            Diagnostic::DependencyCycle { .. }
            | Diagnostic::MissingFieldDefinition { .. }
            | Diagnostic::SplitNotConfigured { .. }
            | Diagnostic::ConflictingWrite { .. } => true,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::FormulaSkipped { field_id, error } => {
                write!(f, "skipped derived field {field_id}: {error}")
            }
            Diagnostic::DependencyCycle { field_id } => {
                write!(f, "derived field {field_id} is part of a dependency cycle")
            }
            Diagnostic::MissingFieldDefinition { field_id } => {
                write!(f, "split field {field_id} is not defined in the schema")
            }
            Diagnostic::SplitNotConfigured { field_id, reason } => {
                write!(f, "split field {field_id} is not configured: {reason}")
            }
            Diagnostic::NoSplitRule {
                field_id,
                discriminator,
            } => write!(f, "no split rule for {discriminator:?} (field {field_id})"),
            Diagnostic::ConflictingWrite { field_id } => {
                write!(f, "field {field_id} was computed more than once")
            }
        }
    }
}

/// Values and diagnostics accumulated during one evaluation.
#[derive(Debug, Default)]
pub(crate) struct Outputs {
    pub(crate) values: BTreeMap<String, f64>,
    /// Engine-owned fields evaluated in this run that ended up without a value.
    pub(crate) cleared: BTreeSet<String>,
    pub(crate) diagnostics: Vec<Diagnostic>,
}

impl Outputs {
    /// Records a computed value. A repeated id keeps the later value and is reported.
    pub(crate) fn write(&mut self, field_id: &str, value: f64) {
        self.cleared.remove(field_id);
        if self.values.insert(field_id.to_string(), value).is_some() {
            self.report(Diagnostic::ConflictingWrite {
                field_id: field_id.to_string(),
            });
        }
    }

    /// Marks an engine-owned field as having no value this run, unless something already
    /// computed one.
    pub(crate) fn clear(&mut self, field_id: &str) {
        if !self.values.contains_key(field_id) {
            self.cleared.insert(field_id.to_string());
        }
    }

    pub(crate) fn report(&mut self, diagnostic: Diagnostic) {
        if diagnostic.is_authoring_error() {
            log::warn!("{diagnostic}");
        } else {
            log::debug!("{diagnostic}");
        }
        self.diagnostics.push(diagnostic);
    }
}
