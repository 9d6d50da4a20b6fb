use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Field id read as the entity-type discriminator when a split config does not name one.
pub const DEFAULT_DISCRIMINATOR_FIELD: &str = "school_type";

/// Section of a combined entity that a split value is distributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Tier {
    Primary,
    Junior,
    Senior,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Primary, Tier::Junior, Tier::Senior];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Tier::Primary => "primary",
            Tier::Junior => "junior",
            Tier::Senior => "senior",
        }
    }

    /// The tier a "pure" entity type corresponds to, e.g. a standalone primary school.
    ///
    /// Accepts both the canonical discriminator values and the labels stored by older
    /// submissions.
    #[must_use]
    pub fn from_discriminator(value: &str) -> Option<Tier> {
        match value.trim() {
            "primary" | "小学" => Some(Tier::Primary),
            "junior" | "初中" => Some(Tier::Junior),
            "senior" | "高中" => Some(Tier::Senior),
            _ => None,
        }
    }
}

/// One optional slot per [`Tier`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierMap<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub junior: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub senior: Option<T>,
}

impl<T> Default for TierMap<T> {
    fn default() -> Self {
        Self {
            primary: None,
            junior: None,
            senior: None,
        }
    }
}

impl<T> TierMap<T> {
    #[must_use]
    pub fn get(&self, tier: Tier) -> Option<&T> {
        match tier {
            Tier::Primary => self.primary.as_ref(),
            Tier::Junior => self.junior.as_ref(),
            Tier::Senior => self.senior.as_ref(),
        }
    }

    pub fn set(&mut self, tier: Tier, value: T) {
        let slot = match tier {
            Tier::Primary => &mut self.primary,
            Tier::Junior => &mut self.junior,
            Tier::Senior => &mut self.senior,
        };
        *slot = Some(value);
    }

    /// Populated slots in tier order (primary, junior, senior).
    pub fn iter(&self) -> impl Iterator<Item = (Tier, &T)> + '_ {
        Tier::ALL
            .into_iter()
            .filter_map(move |tier| self.get(tier).map(|value| (tier, value)))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

impl<T> FromIterator<(Tier, T)> for TierMap<T> {
    fn from_iter<I: IntoIterator<Item = (Tier, T)>>(iter: I) -> Self {
        let mut map = TierMap::default();
        for (tier, value) in iter {
            map.set(tier, value);
        }
        map
    }
}

/// Distribution rule for one discriminator value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitRule {
    #[serde(default)]
    pub weights: TierMap<f64>,
    /// Copy the source value to the single matching tier instead of weighting it.
    #[serde(default)]
    pub is_direct_fill: bool,
}

/// Schema-level configuration for distributing composite values (at most one per schema).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitConfig {
    #[serde(default = "crate::serde_defaults::default_split_config_id")]
    pub id: String,
    /// Field whose value selects the rule in `split_rules`.
    #[serde(default = "crate::serde_defaults::default_discriminator_field")]
    pub discriminator_field: String,
    #[serde(default)]
    pub split_rules: BTreeMap<String, SplitRule>,
    /// Fields eligible for splitting, in evaluation order.
    #[serde(default)]
    pub split_fields: Vec<String>,
    /// Fields holding the weighting population counts.
    #[serde(default)]
    pub student_count_fields: TierMap<String>,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            id: crate::serde_defaults::default_split_config_id(),
            discriminator_field: crate::serde_defaults::default_discriminator_field(),
            split_rules: BTreeMap::new(),
            split_fields: Vec::new(),
            student_count_fields: TierMap::default(),
        }
    }
}

impl SplitConfig {
    #[must_use]
    pub fn rule(&self, discriminator: &str) -> Option<&SplitRule> {
        self.split_rules.get(discriminator.trim())
    }

    /// Every field id whose value feeds into a split of `field_id`.
    pub fn inputs_of<'a>(&'a self, field_id: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        std::iter::once(field_id)
            .chain(std::iter::once(self.discriminator_field.as_str()))
            .chain(self.student_count_fields.iter().map(|(_, id)| id.as_str()))
    }
}
