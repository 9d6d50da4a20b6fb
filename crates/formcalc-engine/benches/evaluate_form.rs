use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use formcalc_engine::{ChangeSet, FormEngine};
use formcalc_model::{FormSchema, ValueSnapshot};
use serde_json::{json, Value as JsonValue};
use std::time::Duration;

fn bench_sections() -> usize {
    std::env::var("FORMCALC_BENCH_SECTIONS")
        .ok()
        .and_then(|v| v.replace('_', "").parse::<usize>().ok())
        .filter(|&v| v >= 10 && v <= 10_000)
        .unwrap_or(500)
}

/// One group per section: a split source, its two tier targets, a derived ratio and a
/// second derived field chained off the ratio.
fn build_schema(sections: usize) -> FormSchema {
    let mut entries: Vec<JsonValue> = vec![
        json!({"id": "school_type", "type": "select"}),
        json!({"id": "students_primary", "type": "number"}),
        json!({"id": "students_junior", "type": "number"}),
        json!({"id": "detailed", "type": "radio"}),
    ];

    for section in 0..sections {
        let area = format!("area_{section}");
        let primary = format!("{area}_primary");
        let junior = format!("{area}_junior");
        let ratio = format!("ratio_{section}");
        entries.push(json!({
            "id": format!("section_{section}"),
            "type": "group",
            "showWhen": {"field": "detailed", "value": "yes"},
            "children": [
                {
                    "id": area, "type": "number", "decimalPlaces": "整数",
                    "autoSplit": {"targetFieldIds": {"primary": primary, "junior": junior}}
                },
                {"id": primary, "type": "number", "computed": true},
                {"id": junior, "type": "number", "computed": true},
                {
                    "id": ratio, "type": "number", "readonly": true, "decimalPlaces": "2位小数",
                    "mapping": {
                        "code": format!("E{section:04}"), "elementType": "派生要素",
                        "formula": format!("${{{primary}}} / students_primary"),
                        "threshold": "≥4.5"
                    }
                },
                {
                    "id": format!("{ratio}_pct"), "type": "number", "readonly": true,
                    "mapping": {
                        "code": format!("P{section:04}"), "elementType": "派生要素",
                        "formula": format!("E{section:04} * 100 / (1 + students_junior / 1000)")
                    }
                }
            ]
        }));
    }

    let split_fields: Vec<String> = (0..sections).map(|section| format!("area_{section}")).collect();
    entries.push(json!({
        "id": "__split_config__",
        "type": "config",
        "splitRules": {
            "primary": {"isDirectFill": true},
            "junior": {"isDirectFill": true},
            "nine_year": {"weights": {"primary": 1, "junior": 1.2}}
        },
        "splitFields": split_fields,
        "studentCountFields": {"primary": "students_primary", "junior": "students_junior"}
    }));

    FormSchema::from_entries(entries).unwrap()
}

fn build_values(sections: usize) -> ValueSnapshot {
    let mut values = ValueSnapshot::new();
    values.insert("school_type", "nine_year");
    values.insert("students_primary", 640.0);
    values.insert("students_junior", 420.0);
    values.insert("detailed", "yes");
    for section in 0..sections {
        values.insert(format!("area_{section}"), 1_000.0 + section as f64 * 3.5);
    }
    values
}

fn bench_evaluate(c: &mut Criterion) {
    let sections = bench_sections();
    let engine = FormEngine::new(build_schema(sections)).unwrap();
    let values = build_values(sections);

    // Sanity: the full pass computes both split targets and both derived fields per section.
    let full = engine.evaluate(&values, &ChangeSet::All);
    assert_eq!(full.computed_values.len(), sections * 4);
    assert!(full.diagnostics.is_empty());

    let mut group = c.benchmark_group("evaluate_form");
    group.sample_size(20);
    group.measurement_time(Duration::from_secs(5));

    group.bench_with_input(BenchmarkId::new("all", sections), &sections, |b, _| {
        b.iter(|| {
            let evaluation = engine.evaluate(black_box(&values), &ChangeSet::All);
            black_box(evaluation);
        })
    });

    let one_source = ChangeSet::key("area_0");
    group.bench_with_input(BenchmarkId::new("single_source", sections), &sections, |b, _| {
        b.iter(|| {
            let evaluation = engine.evaluate(black_box(&values), &one_source);
            black_box(evaluation);
        })
    });

    let counts = ChangeSet::key("students_primary");
    group.bench_with_input(BenchmarkId::new("student_count", sections), &sections, |b, _| {
        b.iter(|| {
            let evaluation = engine.evaluate(black_box(&values), &counts);
            black_box(evaluation);
        })
    });

    group.finish();

    let mut build_group = c.benchmark_group("build_engine");
    build_group.sample_size(10);
    let schema = build_schema(sections);
    build_group.bench_with_input(BenchmarkId::new("new", sections), &schema, |b, schema| {
        b.iter(|| {
            let engine = FormEngine::new(schema.clone()).unwrap();
            black_box(engine);
        })
    });
    build_group.finish();
}

criterion_group!(benches, bench_evaluate);
criterion_main!(benches);
