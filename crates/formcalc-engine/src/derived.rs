//! Derived elements: fields whose value is a formula over other fields.
//!
//! The plan is compiled once per schema. Formulas are parsed up front and ordered so that a
//! derived field referencing another derived field is computed after it; a chain of derived
//! fields therefore resolves in a single evaluation.

use std::collections::{HashMap, HashSet, VecDeque};

use ahash::{AHashMap, AHashSet};

use formcalc_model::{FieldDefinition, ValueSnapshot};

use crate::diagnostics::{Diagnostic, Outputs};
use crate::error::FormulaError;
use crate::expr::Formula;
use crate::schema::SchemaIndex;
use crate::variables::extract_variables;

#[derive(Debug, Clone)]
struct DerivedField {
    field: FieldDefinition,
    formula: Result<Formula, FormulaError>,
    /// Names the formula references, by field id or element code.
    dependencies: Vec<String>,
}

impl DerivedField {
    fn aliases(&self) -> impl Iterator<Item = &str> + '_ {
        std::iter::once(self.field.id.as_str()).chain(self.field.element_code())
    }
}

/// Derived fields of a schema in evaluation order.
#[derive(Debug, Clone, Default)]
pub struct DerivedPlan {
    ordered: Vec<DerivedField>,
    /// Fields that can never be computed because they sit on (or behind) a cycle.
    cyclic: Vec<String>,
}

impl DerivedPlan {
    #[must_use]
    pub fn build(index: &SchemaIndex) -> Self {
        let fields: Vec<DerivedField> = index
            .iter()
            .filter_map(|entry| {
                let source = entry.field.mapping.as_ref()?.derived_formula()?;
                let formula = Formula::parse(source);
                let dependencies = match &formula {
                    Ok(parsed) => parsed.variables().iter().cloned().collect(),
                    Err(_) => extract_variables(source).into_iter().collect(),
                };
                Some(DerivedField {
                    field: entry.field.clone(),
                    formula,
                    dependencies,
                })
            })
            .collect();

        let mut by_alias: AHashMap<&str, usize> = AHashMap::new();
        for (idx, derived) in fields.iter().enumerate() {
            for alias in derived.aliases() {
                by_alias.entry(alias).or_insert(idx);
            }
        }

        // Kahn's algorithm; ties resolve in schema order.
        let mut indegree = vec![0usize; fields.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); fields.len()];
        for (idx, derived) in fields.iter().enumerate() {
            let upstream: AHashSet<usize> = derived
                .dependencies
                .iter()
                .filter_map(|name| by_alias.get(name.as_str()).copied())
                .collect();
            for up in upstream {
                dependents[up].push(idx);
                indegree[idx] += 1;
            }
        }
        for list in &mut dependents {
            list.sort_unstable();
        }

        let mut ready: VecDeque<usize> = (0..fields.len()).filter(|&i| indegree[i] == 0).collect();
        let mut order = Vec::with_capacity(fields.len());
        while let Some(idx) = ready.pop_front() {
            order.push(idx);
            for &next in &dependents[idx] {
                indegree[next] -= 1;
                if indegree[next] == 0 {
                    ready.push_back(next);
                }
            }
        }

        let placed: AHashSet<usize> = order.iter().copied().collect();
        let cyclic: Vec<String> = (0..fields.len())
            .filter(|idx| !placed.contains(idx))
            .map(|idx| fields[idx].field.id.clone())
            .collect();
        for id in &cyclic {
            log::warn!("derived field {id} depends on itself and will not be computed");
        }

        let mut slots: Vec<Option<DerivedField>> = fields.into_iter().map(Some).collect();
        let ordered = order.into_iter().filter_map(|idx| slots[idx].take()).collect();
        Self { ordered, cyclic }
    }

    /// Field ids in evaluation order.
    pub fn field_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.ordered.iter().map(|derived| derived.field.id.as_str())
    }

    #[must_use]
    pub fn cyclic(&self) -> &[String] {
        &self.cyclic
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty() && self.cyclic.is_empty()
    }

    /// Computes derived fields into `out`.
    ///
    /// Variables resolve from `values` overlaid with everything already in `out`, keyed by
    /// field id and by element code. When `touched` is given, only fields whose inputs
    /// (transitively) appear in it are recomputed.
    pub(crate) fn compute(
        &self,
        index: &SchemaIndex,
        values: &ValueSnapshot,
        touched: Option<&HashSet<String>>,
        out: &mut Outputs,
    ) {
        for id in &self.cyclic {
            out.report(Diagnostic::DependencyCycle {
                field_id: id.clone(),
            });
            out.clear(id);
        }

        let mut scope: HashMap<String, f64> = HashMap::new();
        for (id, value) in values.iter() {
            if let Some(number) = value.as_number() {
                bind(&mut scope, index, id, number);
            }
        }
        // Stale snapshot values of fields that have no value this run.
        for id in &out.cleared {
            scope.remove(id.as_str());
            if let Some(code) = index.element_code(id) {
                scope.remove(code);
            }
        }
        for (id, value) in &out.values {
            bind(&mut scope, index, id, *value);
        }

        let mut touched: Option<HashSet<String>> = touched.map(|names| {
            let mut names = names.clone();
            let aliases: Vec<String> = names
                .iter()
                .filter_map(|id| index.element_code(id).map(str::to_string))
                .collect();
            names.extend(aliases);
            for id in out.values.keys().chain(&out.cleared) {
                names.insert(id.clone());
                names.extend(index.element_code(id).map(str::to_string));
            }
            names
        });

        for derived in &self.ordered {
            if let Some(names) = touched.as_mut() {
                if !derived.dependencies.iter().any(|name| names.contains(name)) {
                    continue;
                }
                names.extend(derived.aliases().map(str::to_string));
            }

            let result = match &derived.formula {
                Ok(formula) => formula.evaluate(&scope),
                Err(err) => Err(err.clone()),
            };
            match result {
                Ok(value) => {
                    let value = derived.field.round_value(value);
                    for alias in derived.aliases() {
                        scope.insert(alias.to_string(), value);
                    }
                    out.write(&derived.field.id, value);
                }
                Err(error) => {
                    // A stale entered value must not feed downstream formulas.
                    for alias in derived.aliases() {
                        scope.remove(alias);
                    }
                    out.report(Diagnostic::FormulaSkipped {
                        field_id: derived.field.id.clone(),
                        error,
                    });
                    out.clear(&derived.field.id);
                }
            }
        }
    }
}

fn bind(scope: &mut HashMap<String, f64>, index: &SchemaIndex, id: &str, value: f64) {
    if let Some(code) = index.element_code(id) {
        scope.insert(code.to_string(), value);
    }
    scope.insert(id.to_string(), value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use formcalc_model::{DecimalPlaces, ElementMapping, ElementType, FieldKind, FieldValue};
    use pretty_assertions::assert_eq;

    fn basic(id: &str, code: &str) -> FieldDefinition {
        FieldDefinition::new(id, FieldKind::Number).with_mapping(ElementMapping {
            code: code.to_string(),
            name: id.to_string(),
            threshold: None,
            element_type: Some(ElementType::Basic),
            formula: None,
        })
    }

    fn derived(id: &str, code: &str, formula: &str) -> FieldDefinition {
        FieldDefinition::new(id, FieldKind::Number).with_mapping(ElementMapping {
            code: code.to_string(),
            name: id.to_string(),
            threshold: None,
            element_type: Some(ElementType::Derived),
            formula: Some(formula.to_string()),
        })
    }

    fn run(fields: Vec<FieldDefinition>, values: &ValueSnapshot) -> Outputs {
        let index = SchemaIndex::build(&fields, 8).unwrap();
        let plan = DerivedPlan::build(&index);
        let mut out = Outputs::default();
        plan.compute(&index, values, None, &mut out);
        out
    }

    #[test]
    fn resolves_by_id_and_element_code() {
        let fields = vec![
            basic("teachers", "E001"),
            basic("students", "E002"),
            derived("ratio", "E003", "students / E001"),
        ];
        let values: ValueSnapshot = [("teachers", 20.0), ("students", 300.0)].into_iter().collect();
        let out = run(fields, &values);
        assert_eq!(out.values.get("ratio"), Some(&15.0));
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn chains_resolve_in_dependency_order() {
        let fields = vec![
            derived("per_class", "E005", "E004 / classes"),
            derived("total", "E004", "a + b"),
            FieldDefinition::new("a", FieldKind::Number),
            FieldDefinition::new("b", FieldKind::Number),
            FieldDefinition::new("classes", FieldKind::Number),
        ];
        let values: ValueSnapshot = [("a", 30.0), ("b", 50.0), ("classes", 4.0)].into_iter().collect();
        let out = run(fields, &values);
        assert_eq!(out.values.get("total"), Some(&80.0));
        assert_eq!(out.values.get("per_class"), Some(&20.0));
    }

    #[test]
    fn broken_formulas_skip_only_themselves() {
        let fields = vec![
            basic("x", "E001"),
            derived("bad", "E002", "E001 +* 2"),
            derived("unbound", "E003", "E001 + missing"),
            derived("good", "E004", "E001 * 2"),
        ];
        let values: ValueSnapshot = [("x", 4.0)].into_iter().collect();
        let out = run(fields, &values);
        assert_eq!(out.values.len(), 1);
        assert_eq!(out.values.get("good"), Some(&8.0));
        let skipped: Vec<&str> = out.diagnostics.iter().map(Diagnostic::field_id).collect();
        assert_eq!(skipped, vec!["bad", "unbound"]);
    }

    #[test]
    fn failed_upstream_hides_its_stale_value() {
        let fields = vec![
            derived("rate", "E010", "a / b"),
            derived("scaled", "E011", "E010 * 100"),
            FieldDefinition::new("a", FieldKind::Number),
            FieldDefinition::new("b", FieldKind::Number),
        ];
        let mut values: ValueSnapshot = [("a", 1.0), ("b", 0.0)].into_iter().collect();
        values.insert("rate", 0.5);
        let out = run(fields, &values);
        assert!(out.values.is_empty());
        assert_eq!(out.diagnostics.len(), 2);
    }

    #[test]
    fn cycles_are_reported_and_skipped() {
        let fields = vec![
            derived("p", "E001", "E002 + 1"),
            derived("q", "E002", "E001 + 1"),
            derived("r", "E003", "r + 1"),
            derived("ok", "E004", "2 * 3"),
        ];
        let index = SchemaIndex::build(&fields, 8).unwrap();
        let plan = DerivedPlan::build(&index);
        assert_eq!(plan.cyclic(), ["p", "q", "r"]);
        assert_eq!(plan.field_ids().collect::<Vec<_>>(), vec!["ok"]);

        let mut out = Outputs::default();
        plan.compute(&index, &ValueSnapshot::new(), None, &mut out);
        assert_eq!(out.values.get("ok"), Some(&6.0));
        assert_eq!(out.diagnostics.len(), 3);
    }

    #[test]
    fn rounds_per_decimal_places() {
        let fields = vec![
            FieldDefinition::new("a", FieldKind::Number),
            derived("third", "E001", "a / 3").with_decimal_places(DecimalPlaces::Two),
        ];
        let values: ValueSnapshot = [("a", 1.0)].into_iter().collect();
        assert_eq!(run(fields, &values).values.get("third"), Some(&0.33));
    }

    #[test]
    fn touched_set_limits_recomputation() {
        let fields = vec![
            FieldDefinition::new("a", FieldKind::Number),
            basic("b", "E002"),
            derived("from_a", "E010", "a * 2"),
            derived("from_b", "E011", "E002 * 2"),
            derived("from_b2", "E012", "E011 + 1"),
        ];
        let index = SchemaIndex::build(&fields, 8).unwrap();
        let plan = DerivedPlan::build(&index);
        let values: ValueSnapshot = [("a", FieldValue::from(1.0)), ("b", FieldValue::from("5"))]
            .into_iter()
            .collect();

        let touched = HashSet::from(["b".to_string()]);
        let mut out = Outputs::default();
        plan.compute(&index, &values, Some(&touched), &mut out);
        let ids: Vec<&String> = out.values.keys().collect();
        assert_eq!(ids, vec!["from_b", "from_b2"]);
        assert_eq!(out.values.get("from_b2"), Some(&11.0));
    }
}
