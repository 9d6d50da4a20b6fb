use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::{FieldDefinition, SchemaError, SplitConfig};

/// Id reserved for the split config entry of a persisted schema array.
pub const SPLIT_CONFIG_ID: &str = "__split_config__";

const CONFIG_KIND: &str = "config";

/// A form schema: the field tree plus the optional split configuration.
///
/// Persisted as a single JSON array in which the split configuration is an entry with
/// `"type": "config"`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormSchema {
    pub fields: Vec<FieldDefinition>,
    pub split_config: Option<SplitConfig>,
}

impl FormSchema {
    #[must_use]
    pub fn new(fields: Vec<FieldDefinition>) -> Self {
        Self {
            fields,
            split_config: None,
        }
    }

    #[must_use]
    pub fn with_split_config(mut self, config: SplitConfig) -> Self {
        self.split_config = Some(config);
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self, SchemaError> {
        let entries: Vec<JsonValue> =
            serde_json::from_str(json).map_err(|err| SchemaError::Json(err.to_string()))?;
        Self::from_entries(entries)
    }

    pub fn from_entries(entries: Vec<JsonValue>) -> Result<Self, SchemaError> {
        let mut schema = FormSchema::default();
        for (index, entry) in entries.into_iter().enumerate() {
            let Some(object) = entry.as_object() else {
                return Err(SchemaError::InvalidEntry { index });
            };
            let is_config = object
                .get("type")
                .or_else(|| object.get("kind"))
                .and_then(JsonValue::as_str)
                == Some(CONFIG_KIND);

            if is_config {
                if schema.split_config.is_some() {
                    return Err(SchemaError::MultipleSplitConfigs);
                }
                let config: SplitConfig = serde_json::from_value(entry)
                    .map_err(|err| SchemaError::Json(format!("entry {index}: {err}")))?;
                schema.split_config = Some(config);
            } else {
                let field: FieldDefinition = serde_json::from_value(entry)
                    .map_err(|err| SchemaError::Json(format!("entry {index}: {err}")))?;
                schema.fields.push(field);
            }
        }
        Ok(schema)
    }

    pub fn to_json_string(&self) -> Result<String, SchemaError> {
        #[derive(Serialize)]
        #[serde(untagged)]
        enum Entry<'a> {
            Field(&'a FieldDefinition),
            Config(JsonValue),
        }

        let mut entries: Vec<Entry<'_>> = self.fields.iter().map(Entry::Field).collect();
        if let Some(config) = &self.split_config {
            let mut value =
                serde_json::to_value(config).map_err(|err| SchemaError::Json(err.to_string()))?;
            if let Some(object) = value.as_object_mut() {
                object.insert("type".to_string(), JsonValue::from(CONFIG_KIND));
            }
            entries.push(Entry::Config(value));
        }
        serde_json::to_string(&entries).map_err(|err| SchemaError::Json(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FieldKind;
    use pretty_assertions::assert_eq;

    const SCHEMA: &str = r#"[
        { "id": "school_type", "type": "select", "label": "School type" },
        {
            "id": "site",
            "type": "group",
            "label": "Site",
            "children": [
                { "id": "floor_area", "type": "number", "autoSplit": { "enabled": true, "targetFieldIds": { "primary": "area_primary" } } },
                { "id": "area_primary", "type": "number", "computed": true }
            ]
        },
        {
            "id": "__split_config__",
            "type": "config",
            "splitRules": { "primary": { "weights": { "primary": 1 }, "isDirectFill": true } },
            "splitFields": ["floor_area"]
        }
    ]"#;

    #[test]
    fn separates_config_entry_from_fields() {
        let schema = FormSchema::from_json_str(SCHEMA).unwrap();
        assert_eq!(schema.fields.len(), 2);
        assert_eq!(schema.fields[1].kind, FieldKind::Group);
        assert_eq!(schema.fields[1].children.len(), 2);

        let config = schema.split_config.as_ref().unwrap();
        assert_eq!(config.id, SPLIT_CONFIG_ID);
        assert_eq!(config.split_fields, vec!["floor_area".to_string()]);
    }

    #[test]
    fn json_round_trip_preserves_config() {
        let schema = FormSchema::from_json_str(SCHEMA).unwrap();
        let json = schema.to_json_string().unwrap();
        assert_eq!(FormSchema::from_json_str(&json).unwrap(), schema);
    }

    #[test]
    fn rejects_second_config_and_non_objects() {
        let err = FormSchema::from_json_str(
            r#"[{ "type": "config" }, { "kind": "config" }]"#,
        )
        .unwrap_err();
        assert_eq!(err, SchemaError::MultipleSplitConfigs);

        let err = FormSchema::from_json_str(r#"[1]"#).unwrap_err();
        assert_eq!(err, SchemaError::InvalidEntry { index: 0 });

        let err = FormSchema::from_json_str(r#"{}"#).unwrap_err();
        assert!(matches!(err, SchemaError::Json(_)));
    }
}
