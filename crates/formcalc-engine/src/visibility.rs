//! Conditional display (`showWhen`) rules.

use std::collections::{BTreeMap, HashMap, HashSet};

use formcalc_model::{FieldValue, ShowCondition, ShowValue, ShowWhenRule, ValueSnapshot};

use crate::schema::{FieldEntry, SchemaIndex};

/// Whether a field carrying `rule` is shown for `values`. No rule means visible.
///
/// `filled` treats absent, `null` and `""` as not filled; `0` and `false` are filled.
/// Expected values compare without coercion, so `1` does not match `"1"`.
#[must_use]
pub fn is_visible(rule: Option<&ShowWhenRule>, values: &ValueSnapshot) -> bool {
    rule.map_or(true, |rule| rule_matches(rule, values.get(&rule.field)))
}

fn rule_matches(rule: &ShowWhenRule, current: Option<&FieldValue>) -> bool {
    let filled = current.is_some_and(|value| !value.is_blank());
    match (rule.condition, &rule.value) {
        (Some(ShowCondition::Filled), _) => filled,
        (Some(ShowCondition::Empty), _) => !filled,
        (None, Some(ShowValue::AnyOf(options))) => {
            current.is_some_and(|value| options.iter().any(|option| option.strict_eq(value)))
        }
        (None, Some(ShowValue::Equals(expected))) => {
            current.is_some_and(|value| value.strict_eq(expected))
        }
        (None, None) => true,
    }
}

/// Visibility of every field in the schema, cascaded.
///
/// A field is hidden when its group/list ancestor is hidden, and a hidden controlling field
/// counts as absent for the rules that reference it. Rules that reference a sibling inside
/// the same dynamic-list row are evaluated per row by [`row_visibility`]; at schema level
/// such fields only follow their ancestors.
#[must_use]
pub fn resolve_visibility(index: &SchemaIndex, values: &ValueSnapshot) -> BTreeMap<String, bool> {
    let mut resolver = Resolver {
        index,
        values,
        memo: HashMap::new(),
        visiting: HashSet::new(),
    };
    index
        .iter()
        .map(|entry| (entry.field.id.clone(), resolver.visible(&entry.field.id)))
        .collect()
}

/// Visibility of the row-template fields of `list_id` for one row.
///
/// `resolved` is the schema-level result of [`resolve_visibility`].
#[must_use]
pub fn row_visibility(
    index: &SchemaIndex,
    resolved: &BTreeMap<String, bool>,
    list_id: &str,
    row: &ValueSnapshot,
) -> BTreeMap<String, bool> {
    index
        .iter()
        .filter(|entry| entry.list.as_deref() == Some(list_id))
        .map(|entry| {
            let id = entry.field.id.as_str();
            let mut visible = resolved.get(id).copied().unwrap_or(true);
            if let Some(rule) = entry.field.visibility.as_ref() {
                if same_row(index, entry, &rule.field) {
                    visible = visible && rule_matches(rule, row.get(&rule.field));
                }
            }
            (id.to_string(), visible)
        })
        .collect()
}

fn same_row(index: &SchemaIndex, entry: &FieldEntry, controller: &str) -> bool {
    entry.list.is_some()
        && index
            .get(controller)
            .is_some_and(|controlling| controlling.list == entry.list)
}

struct Resolver<'a> {
    index: &'a SchemaIndex,
    values: &'a ValueSnapshot,
    memo: HashMap<&'a str, bool>,
    visiting: HashSet<&'a str>,
}

impl<'a> Resolver<'a> {
    fn visible(&mut self, id: &'a str) -> bool {
        if let Some(&visible) = self.memo.get(id) {
            return visible;
        }
        let index = self.index;
        let Some(entry) = index.get(id) else {
            return true;
        };
        if !self.visiting.insert(id) {
            log::warn!("showWhen rules form a cycle through field {id}");
            return true;
        }

        let parent_visible = match entry.parent.as_deref() {
            Some(parent) => self.visible(parent),
            None => true,
        };
        let visible = parent_visible
            && match entry.field.visibility.as_ref() {
                Some(rule) => self.rule_visible(entry, rule),
                None => true,
            };

        self.visiting.remove(id);
        self.memo.insert(id, visible);
        visible
    }

    fn rule_visible(&mut self, entry: &'a FieldEntry, rule: &'a ShowWhenRule) -> bool {
        let controller = rule.field.as_str();
        if same_row(self.index, entry, controller) {
            return true;
        }
        if self.index.contains(controller) && !self.visible(controller) {
            return rule_matches(rule, None);
        }
        rule_matches(rule, self.values.get(controller))
    }
}
