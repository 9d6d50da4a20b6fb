#![no_main]

use libfuzzer_sys::fuzz_target;

use formcalc_engine::{parse_threshold, validate_threshold, ThresholdPredicate};

const MAX_INPUT_BYTES: usize = 1_024;

fuzz_target!(|data: &[u8]| {
    if data.len() < 8 {
        return;
    }
    let (head, rest) = data.split_at(8);
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(head);
    let value = f64::from_le_bytes(bytes);

    let rest = &rest[..rest.len().min(MAX_INPUT_BYTES)];
    let raw = String::from_utf8_lossy(rest);
    let config = parse_threshold(&raw);
    let verdict = validate_threshold(value, &config);

    match config.predicate {
        None => assert!(verdict.is_valid() && verdict.is_warning()),
        Some(ThresholdPredicate::Range { min, max }) if value >= min && value <= max => {
            assert!(verdict.is_valid());
        }
        Some(_) => assert!(!verdict.is_warning()),
    }
    if !verdict.is_valid() {
        assert!(verdict.message().is_some_and(|message| message.contains(config.raw.as_str())));
    }
});
