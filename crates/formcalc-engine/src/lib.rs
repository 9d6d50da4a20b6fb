//! `formcalc-engine` computes everything a dynamic form derives from its schema and the
//! values entered so far: which fields are visible, the values of derived and split fields,
//! and threshold/bound warnings.
//!
//! The engine is synchronous and holds no state beyond caches built from the schema, so an
//! evaluation can be repeated (or discarded) at will:
//!
//! ```
//! use formcalc_engine::{ChangeSet, FormEngine};
//! use formcalc_model::{FormSchema, ValueSnapshot};
//!
//! let schema = FormSchema::from_json_str(
//!     r#"[
//!         {"id": "teachers", "type": "number", "mapping": {"code": "E001"}},
//!         {"id": "students", "type": "number", "mapping": {"code": "E002"}},
//!         {"id": "ratio", "type": "number", "computed": true,
//!          "mapping": {"code": "E003", "elementType": "derived", "formula": "E002 / E001"}}
//!     ]"#,
//! )?;
//! let engine = FormEngine::new(schema)?;
//! let values: ValueSnapshot = [("teachers", 20.0), ("students", 300.0)].into_iter().collect();
//! let evaluation = engine.evaluate(&values, &ChangeSet::All);
//! assert_eq!(evaluation.computed_values.get("ratio"), Some(&15.0));
//! # Ok::<(), formcalc_engine::SchemaError>(())
//! ```

#![forbid(unsafe_code)]

mod derived;
mod diagnostics;
mod engine;
mod error;
pub mod expr;
pub mod judge;
pub mod picker;
mod schema;
mod split;
pub mod threshold;
mod variables;
pub mod visibility;

pub use crate::derived::DerivedPlan;
pub use crate::diagnostics::Diagnostic;
pub use crate::engine::{ChangeSet, Evaluation, FormEngine, FormSession, Warning, WarningKind};
pub use crate::error::{FormulaError, FormulaResult, SchemaError};
pub use crate::expr::{evaluate, validate_formula, BinaryOp, Expr, Formula, VariableSource};
pub use crate::schema::{FieldEntry, SchemaIndex};
pub use crate::split::weighted_shares;
pub use crate::threshold::{
    parse_threshold, validate_threshold, CompareOp, ThresholdConfig, ThresholdPredicate,
    ThresholdVerdict,
};
pub use crate::variables::{extract_variables, RESERVED_IDENTIFIERS};
pub use crate::visibility::is_visible;
