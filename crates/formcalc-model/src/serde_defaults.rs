use serde::{Deserialize, Deserializer};

/// Serde helper for `#[serde(default = "crate::serde_defaults::default_true")]`.
pub(crate) const fn default_true() -> bool {
    true
}

pub(crate) fn default_discriminator_field() -> String {
    crate::split::DEFAULT_DISCRIMINATOR_FIELD.to_string()
}

pub(crate) fn default_split_config_id() -> String {
    crate::schema::SPLIT_CONFIG_ID.to_string()
}

/// Numeric attributes (`minValue`, `maxValue`) were historically persisted as strings by the form
/// designer. Accept either representation; blank or non-numeric strings read as unset.
pub(crate) fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Number(n)) if n.is_finite() => Some(n),
        Some(Raw::Number(_)) | None => None,
        Some(Raw::Text(s)) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
    })
}
