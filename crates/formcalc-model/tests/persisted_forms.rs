use formcalc_model::{
    DecimalPlaces, ElementType, FieldKind, FieldValue, FormSchema, ShowCondition, ShowValue, Tier,
    ValueSnapshot,
};
use pretty_assertions::assert_eq;

// Shape written by older designer builds: `kind`/`visibility` keys, string bounds,
// Chinese enum labels.
const LEGACY_SCHEMA: &str = r#"[
    {"id": "school_type", "kind": "select", "label": "办学类型"},
    {
        "id": "labs", "kind": "dynamicList", "label": "Laboratories",
        "children": [
            {"id": "lab_name", "kind": "text"},
            {"id": "lab_area", "kind": "number", "minValue": "10", "maxValue": "", "decimalPlaces": "1位小数"},
            {"id": "lab_kind", "kind": "select"},
            {
                "id": "lab_notes", "kind": "textarea",
                "visibility": {"field": "lab_kind", "value": ["chemistry", "biology"]}
            }
        ]
    },
    {
        "id": "teacher_ratio", "kind": "number", "readonly": true, "unit": "%",
        "visibility": {"field": "school_type", "condition": "filled"},
        "mapping": {"code": "E020", "elementName": "Teacher ratio", "elementType": "派生要素", "formula": " E001 / E002 ", "threshold": "≥95%"}
    },
    {"id": "divider", "kind": "divider"}
]"#;

#[test]
fn legacy_designer_output_loads() {
    let schema = FormSchema::from_json_str(LEGACY_SCHEMA).unwrap();
    assert!(schema.split_config.is_none());
    assert_eq!(schema.fields.len(), 4);

    let labs = &schema.fields[1];
    assert_eq!(labs.kind, FieldKind::DynamicList);
    assert!(labs.kind.is_container());
    assert_eq!(labs.children.len(), 4);

    let lab_area = &labs.children[1];
    assert_eq!(lab_area.min_value, Some(10.0));
    assert_eq!(lab_area.max_value, None);
    assert_eq!(lab_area.decimal_places, Some(DecimalPlaces::One));
    assert_eq!(lab_area.round_value(12.34), 12.3);

    let notes_rule = labs.children[3].visibility.as_ref().unwrap();
    assert_eq!(notes_rule.field, "lab_kind");
    assert_eq!(
        notes_rule.value,
        Some(ShowValue::AnyOf(vec!["chemistry".into(), "biology".into()]))
    );

    let ratio = &schema.fields[2];
    assert!(ratio.is_engine_owned());
    assert_eq!(ratio.element_code(), Some("E020"));
    assert_eq!(
        ratio.visibility.as_ref().and_then(|rule| rule.condition),
        Some(ShowCondition::Filled)
    );
    let mapping = ratio.mapping.as_ref().unwrap();
    assert_eq!(mapping.element_type, Some(ElementType::Derived));
    assert_eq!(mapping.name, "Teacher ratio");
    assert_eq!(mapping.derived_formula(), Some("E001 / E002"));
}

#[test]
fn saved_schema_reloads_identically() {
    let schema = FormSchema::from_json_str(LEGACY_SCHEMA).unwrap();
    let saved = schema.to_json_string().unwrap();
    assert!(saved.contains(r#""type":"dynamicList""#));
    assert!(saved.contains(r#""showWhen""#));
    assert_eq!(FormSchema::from_json_str(&saved).unwrap(), schema);
}

#[test]
fn split_config_defaults_and_tiers() {
    let schema = FormSchema::from_json_str(
        r#"[
            {"id": "type", "type": "select"},
            {"type": "config", "splitRules": {"twelve_year": {"weights": {"primary": 1, "junior": 1.2, "senior": 1.5}}}}
        ]"#,
    )
    .unwrap();
    let config = schema.split_config.unwrap();
    assert_eq!(config.discriminator_field, "school_type");
    assert!(config.split_fields.is_empty());

    let rule = config.rule("twelve_year").unwrap();
    assert!(!rule.is_direct_fill);
    let weights: Vec<(Tier, f64)> = rule.weights.iter().map(|(tier, w)| (tier, *w)).collect();
    assert_eq!(
        weights,
        vec![(Tier::Primary, 1.0), (Tier::Junior, 1.2), (Tier::Senior, 1.5)]
    );
    assert!(config.rule("kindergarten").is_none());
}

#[test]
fn submissions_with_list_rows() {
    let snapshot = ValueSnapshot::from_json_str(
        r#"{
            "school_type": "junior",
            "labs": [
                {"lab_name": "North", "lab_area": 64.5, "lab_kind": "chemistry"},
                {"lab_name": "South", "lab_area": null}
            ],
            "facilities": ["library", "gym"],
            "accredited": false
        }"#,
    )
    .unwrap();

    let Some(FieldValue::Rows(rows)) = snapshot.get("labs") else {
        panic!("expected list rows, got {:?}", snapshot.get("labs"));
    };
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].number("lab_area"), Some(64.5));
    assert!(!rows[1].is_filled("lab_area"));
    assert_eq!(
        snapshot.get("facilities"),
        Some(&FieldValue::List(vec!["library".into(), "gym".into()]))
    );
    assert!(snapshot.is_filled("accredited"));

    let reloaded = ValueSnapshot::from_json_str(&snapshot.to_json_string().unwrap()).unwrap();
    assert_eq!(reloaded, snapshot);
}
