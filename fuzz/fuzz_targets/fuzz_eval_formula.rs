#![no_main]

use std::collections::HashMap;

use libfuzzer_sys::fuzz_target;

use formcalc_engine::{extract_variables, validate_formula, Formula, FormulaError};

/// A little over the parser's own limit so the length check itself gets exercised.
const MAX_FUZZ_FORMULA_CHARS: usize = formcalc_engine::expr::MAX_FORMULA_CHARS + 64;
const MAX_INPUT_BYTES: usize = MAX_FUZZ_FORMULA_CHARS * 4; // max UTF-8 bytes per char

fn truncate_to_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Deterministic, varied values so evaluation reaches the arithmetic paths.
fn stable_value(name: &str) -> f64 {
    let mut x = 0xcbf29ce484222325u64;
    for byte in name.bytes() {
        x ^= u64::from(byte);
        x = x.wrapping_mul(0x100000001b3);
    }
    ((x % 20_001) as f64 - 10_000.0) / 8.0
}

fuzz_target!(|data: &[u8]| {
    let data = &data[..data.len().min(MAX_INPUT_BYTES)];
    let input = String::from_utf8_lossy(data);
    let formula = truncate_to_chars(&input, MAX_FUZZ_FORMULA_CHARS);

    let variables = extract_variables(formula);
    let unbound = formcalc_engine::evaluate(formula, &HashMap::<String, f64>::new());
    if !variables.is_empty() {
        assert!(matches!(unbound, Err(FormulaError::UnboundVariable { .. })));
    }

    let _ = validate_formula(formula);

    let Ok(parsed) = Formula::parse(formula) else {
        return;
    };
    let bindings: HashMap<String, f64> = parsed
        .variables()
        .iter()
        .map(|name| (name.clone(), stable_value(name)))
        .collect();
    if let Ok(value) = parsed.evaluate(&bindings) {
        assert!(value.is_finite());
        assert_eq!(parsed.evaluate(&bindings), Ok(value));
    }
});
