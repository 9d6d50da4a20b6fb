//! Flat lookup tables derived from a form schema tree.

use std::collections::HashMap;

use formcalc_model::{FieldDefinition, FieldKind, PickerKind, SchemaError};

/// A field as seen from the flat index.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldEntry {
    /// The definition with `children` stripped.
    pub field: FieldDefinition,
    /// Enclosing group or dynamic list.
    pub parent: Option<String>,
    /// Enclosing dynamic list, when the field is part of a row template.
    pub list: Option<String>,
    pub depth: usize,
}

/// Field-id keyed caches built by one depth-first walk of the schema.
///
/// The index is a pure function of the schema it was built from; rebuild it whenever the
/// schema changes.
#[derive(Debug, Clone, Default)]
pub struct SchemaIndex {
    entries: HashMap<String, FieldEntry>,
    /// Field ids in depth-first order.
    order: Vec<String>,
    pickers: HashMap<String, PickerKind>,
}

impl SchemaIndex {
    /// Walks `fields`, rejecting duplicate ids and nesting deeper than `max_depth`.
    pub fn build(fields: &[FieldDefinition], max_depth: usize) -> Result<Self, SchemaError> {
        let mut index = SchemaIndex::default();
        let mut stack: Vec<(&FieldDefinition, Option<&str>, Option<&str>, usize)> = fields
            .iter()
            .rev()
            .map(|field| (field, None, None, 0))
            .collect();

        while let Some((field, parent, list, depth)) = stack.pop() {
            if depth > max_depth {
                return Err(SchemaError::DepthExceeded {
                    field_id: field.id.clone(),
                    max_depth,
                });
            }
            if index.entries.contains_key(&field.id) {
                return Err(SchemaError::DuplicateFieldId(field.id.clone()));
            }

            if let Some(picker) = field.kind.picker() {
                index.pickers.insert(field.id.clone(), picker);
            }
            index.order.push(field.id.clone());
            index.entries.insert(
                field.id.clone(),
                FieldEntry {
                    field: field.without_children(),
                    parent: parent.map(str::to_string),
                    list: list.map(str::to_string),
                    depth,
                },
            );

            if field.kind.is_container() {
                let child_list = if field.kind == FieldKind::DynamicList {
                    Some(field.id.as_str())
                } else {
                    list
                };
                for child in field.children.iter().rev() {
                    stack.push((child, Some(field.id.as_str()), child_list, depth + 1));
                }
            }
        }

        Ok(index)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&FieldEntry> {
        self.entries.get(id)
    }

    #[must_use]
    pub fn field(&self, id: &str) -> Option<&FieldDefinition> {
        self.entries.get(id).map(|entry| &entry.field)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Entries in depth-first schema order.
    pub fn iter(&self) -> impl Iterator<Item = &FieldEntry> + '_ {
        self.order.iter().filter_map(|id| self.entries.get(id))
    }

    #[must_use]
    pub fn picker(&self, id: &str) -> Option<PickerKind> {
        self.pickers.get(id).copied()
    }

    #[must_use]
    pub fn pickers(&self) -> &HashMap<String, PickerKind> {
        &self.pickers
    }

    /// Element code alias of a field, if mapped.
    #[must_use]
    pub fn element_code(&self, id: &str) -> Option<&str> {
        self.field(id).and_then(FieldDefinition::element_code)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
