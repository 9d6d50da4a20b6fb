use thiserror::Error;

/// Structural problems with a form schema.
///
/// These are the only hard failures of the form computation layer: they indicate a
/// corrupt schema rather than incomplete user input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("invalid schema json: {0}")]
    Json(String),

    #[error("schema entry {index} is not an object")]
    InvalidEntry { index: usize },

    #[error("field {field_id} is nested deeper than the maximum schema depth of {max_depth}")]
    DepthExceeded { field_id: String, max_depth: usize },

    #[error("duplicate field id: {0}")]
    DuplicateFieldId(String),

    #[error("schema declares more than one split config")]
    MultipleSplitConfigs,
}
