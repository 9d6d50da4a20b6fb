use serde::Serialize;
use thiserror::Error;

pub use formcalc_model::SchemaError;

/// Failure to evaluate a formula.
///
/// Never escapes the engine pipeline: the derived-field calculator turns it into a
/// [`crate::Diagnostic`] and skips the field.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FormulaError {
    #[error("unbound variable(s): {}", names.join(", "))]
    UnboundVariable { names: Vec<String> },

    #[error("invalid expression: {message}")]
    InvalidExpression { message: String },
}

impl FormulaError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        FormulaError::InvalidExpression {
            message: message.into(),
        }
    }
}

pub type FormulaResult<T> = Result<T, FormulaError>;
