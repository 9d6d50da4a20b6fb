//! Distribution of composite values across tier sub-fields.
//!
//! A combined school enters one value (say, its floor area) and the engine writes the
//! primary/junior/senior shares. Which rule applies depends on the discriminator field
//! (the school type). A direct-fill rule copies the whole value to one tier. A weighted rule
//! distributes it in proportion to `count * weight` for every tier with a positive count.

use std::collections::HashSet;

use formcalc_model::{AutoSplit, FieldDefinition, SplitConfig, SplitRule, Tier, ValueSnapshot};

use crate::diagnostics::{Diagnostic, Outputs};
use crate::schema::SchemaIndex;

/// Share of `source` for each tier, before rounding.
///
/// Tiers without a weight or without a strictly positive count are left out. Returns an
/// empty list when the weighted total is zero.
#[must_use]
pub fn weighted_shares(
    source: f64,
    rule: &SplitRule,
    counts: impl Fn(Tier) -> Option<f64>,
) -> Vec<(Tier, f64)> {
    let weighted: Vec<(Tier, f64)> = Tier::ALL
        .into_iter()
        .filter_map(|tier| {
            let weight = *rule.weights.get(tier)?;
            let count = counts(tier).filter(|count| *count > 0.0)?;
            Some((tier, count * weight))
        })
        .collect();

    let total: f64 = weighted.iter().map(|(_, w)| w).sum();
    if total == 0.0 || !total.is_finite() {
        return Vec::new();
    }
    weighted
        .into_iter()
        .map(|(tier, w)| (tier, source * w / total))
        .collect()
}

/// Runs every configured split into `out`.
///
/// When `touched` is given, a split field is only recomputed if one of its inputs (the
/// field itself, the discriminator or a count field) is in the set. Targets of a recomputed
/// field that receive no share are cleared, so a previous run's value does not linger.
pub(crate) fn compute_splits(
    config: Option<&SplitConfig>,
    index: &SchemaIndex,
    values: &ValueSnapshot,
    touched: Option<&HashSet<String>>,
    out: &mut Outputs,
) {
    let Some(config) = config else {
        return;
    };
    let discriminator = values
        .get(&config.discriminator_field)
        .and_then(|value| value.to_key());
    if discriminator.is_none() {
        log::debug!(
            "split skipped: discriminator {} is not filled",
            config.discriminator_field
        );
    }

    for field_id in &config.split_fields {
        if let Some(names) = touched {
            if !config.inputs_of(field_id).any(|input| names.contains(input)) {
                continue;
            }
        }
        if let Some(discriminator) = discriminator.as_deref() {
            split_field(config, index, values, field_id, discriminator, out);
        }
        clear_unwritten_targets(index, field_id, out);
    }
}

fn split_field(
    config: &SplitConfig,
    index: &SchemaIndex,
    values: &ValueSnapshot,
    field_id: &str,
    discriminator: &str,
    out: &mut Outputs,
) {
    let Some(source) = values.number(field_id).filter(|value| *value > 0.0) else {
        return;
    };
    let Some(field) = index.field(field_id) else {
        out.report(Diagnostic::MissingFieldDefinition {
            field_id: field_id.to_string(),
        });
        return;
    };
    let auto_split = match field.auto_split.as_ref() {
        Some(auto_split) if auto_split.is_configured() => auto_split,
        Some(auto_split) if !auto_split.enabled => {
            not_configured(out, field_id, "autoSplit is disabled");
            return;
        }
        Some(_) => {
            not_configured(out, field_id, "autoSplit has no target fields");
            return;
        }
        None => {
            not_configured(out, field_id, "field has no autoSplit");
            return;
        }
    };
    let Some(rule) = config.rule(discriminator) else {
        out.report(Diagnostic::NoSplitRule {
            field_id: field_id.to_string(),
            discriminator: discriminator.to_string(),
        });
        return;
    };

    if rule.is_direct_fill {
        direct_fill(out, field, auto_split, rule, discriminator, source);
        return;
    }
    let counts = |tier: Tier| {
        config
            .student_count_fields
            .get(tier)
            .and_then(|id| values.number(id))
    };
    let shares = weighted_shares(source, rule, counts);
    if shares.is_empty() {
        log::debug!("split of {field_id} skipped: weighted total is zero");
        return;
    }
    for (tier, share) in shares {
        if let Some(target) = target_of(auto_split, tier) {
            out.write(target, field.round_value(share));
        }
    }
}

/// Only targets of a configured split are engine-owned; anything else is left alone.
fn clear_unwritten_targets(index: &SchemaIndex, field_id: &str, out: &mut Outputs) {
    let Some(auto_split) = index
        .field(field_id)
        .and_then(|field| field.auto_split.as_ref())
        .filter(|auto_split| auto_split.is_configured())
    else {
        return;
    };
    for tier in Tier::ALL {
        if let Some(target) = target_of(auto_split, tier) {
            out.clear(target);
        }
    }
}

fn direct_fill(
    out: &mut Outputs,
    field: &FieldDefinition,
    auto_split: &AutoSplit,
    rule: &SplitRule,
    discriminator: &str,
    source: f64,
) {
    let named = Tier::from_discriminator(discriminator).filter(|tier| target_of(auto_split, *tier).is_some());
    let tier = named.or_else(|| {
        let mut weighted = rule
            .weights
            .iter()
            .map(|(tier, _)| tier)
            .filter(|tier| target_of(auto_split, *tier).is_some());
        match (weighted.next(), weighted.next()) {
            (Some(only), None) => Some(only),
            _ => None,
        }
    });

    match tier.and_then(|tier| target_of(auto_split, tier)) {
        Some(target) => out.write(target, field.round_value(source)),
        None => not_configured(
            out,
            &field.id,
            "direct fill has no target for this discriminator",
        ),
    }
}

fn target_of(auto_split: &AutoSplit, tier: Tier) -> Option<&str> {
    auto_split
        .target_field_ids
        .get(tier)
        .map(String::as_str)
        .filter(|id| !id.is_empty())
}

fn not_configured(out: &mut Outputs, field_id: &str, reason: &str) {
    out.report(Diagnostic::SplitNotConfigured {
        field_id: field_id.to_string(),
        reason: reason.to_string(),
    });
}
