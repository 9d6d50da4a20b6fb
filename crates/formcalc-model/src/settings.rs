use serde::{Deserialize, Serialize};

/// Tunables for a form computation engine.
///
/// Hosts usually deserialize these from their own configuration; every field falls back to
/// its default when omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineSettings {
    /// Tolerance for `=` thresholds.
    pub equality_epsilon: f64,
    /// Maximum nesting of groups/lists before a schema is rejected as corrupt.
    pub max_schema_depth: usize,
    /// Emit threshold warnings for mapped fields.
    pub check_thresholds: bool,
    /// Emit warnings for numeric values outside `minValue`/`maxValue`.
    pub check_bounds: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            equality_epsilon: 1e-4,
            max_schema_depth: 32,
            check_thresholds: true,
            check_bounds: true,
        }
    }
}
