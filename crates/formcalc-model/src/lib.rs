//! `formcalc-model` defines the declarative form schema and the value snapshot a form
//! session edits.
//!
//! The crate only describes data; every computation over it (visibility, derived
//! values, split distribution, threshold checks) lives in `formcalc-engine`.
//! All types are JSON-safe via `serde` so schemas and submissions can be persisted
//! by the surrounding services unchanged.

mod error;
mod field;
mod schema;
mod serde_defaults;
pub mod settings;
mod split;
mod value;

pub use error::SchemaError;
pub use field::{
    AutoSplit, DecimalPlaces, ElementMapping, ElementType, FieldDefinition, FieldKind, PickerKind,
    ShowCondition, ShowValue, ShowWhenRule,
};
pub use schema::{FormSchema, SPLIT_CONFIG_ID};
pub use settings::EngineSettings;
pub use split::{SplitConfig, SplitRule, Tier, TierMap, DEFAULT_DISCRIMINATOR_FIELD};
pub use value::{FieldValue, ValueSnapshot};
