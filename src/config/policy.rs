//! Credit multiplier table
//!
//! One canonical table, injected into the engine. The shipped default is a
//! flat 10 credits per verified hour for every activity type; deployments add
//! per-type overrides under `[credits.rates]`.

use std::collections::BTreeMap;

use anyhow::{Result, bail};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::normalize_kind;

/// Credits per hour for any activity type without an override
pub const DEFAULT_RATE: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditPolicy {
    /// Fallback points-per-hour for unknown tags
    #[serde(default = "default_rate")]
    pub default_rate: f64,

    /// Per-type points-per-hour, keyed by lowercased activity tag
    #[serde(default, deserialize_with = "deserialize_rates")]
    pub rates: BTreeMap<String, f64>,
}

/// Keys are normalised the same way activity tags are, so `Cycling = 25.0`
/// applies to `cycling` activities. Keys that collide after normalising are
/// an error.
fn deserialize_rates<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<BTreeMap<String, f64>, D::Error> {
    let raw = BTreeMap::<String, f64>::deserialize(deserializer)?;
    let mut rates = BTreeMap::new();
    for (kind, rate) in raw {
        let key = normalize_kind(&kind);
        if key.is_empty() {
            return Err(D::Error::custom("credits.rates keys must not be empty"));
        }
        if rates.insert(key.clone(), rate).is_some() {
            return Err(D::Error::custom(format!(
                "credits.rates has more than one entry for '{key}'"
            )));
        }
    }
    Ok(rates)
}

fn default_rate() -> f64 {
    DEFAULT_RATE
}

impl Default for CreditPolicy {
    fn default() -> Self {
        Self {
            default_rate: DEFAULT_RATE,
            rates: BTreeMap::new(),
        }
    }
}

impl CreditPolicy {
    /// Flat table: every tag earns `rate`
    pub fn flat(rate: f64) -> Self {
        Self {
            default_rate: rate,
            rates: BTreeMap::new(),
        }
    }

    pub fn with_rate(mut self, kind: &str, rate: f64) -> Self {
        self.rates.insert(normalize_kind(kind), rate);
        self
    }

    /// Points per hour for an activity tag
    pub fn rate_for(&self, kind: &str) -> f64 {
        self.rates
            .get(&normalize_kind(kind))
            .copied()
            .unwrap_or(self.default_rate)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.default_rate.is_finite() || self.default_rate < 0.0 {
            bail!("credits.default_rate must be a non-negative number");
        }
        for (kind, rate) in &self.rates {
            if *kind != normalize_kind(kind) {
                bail!("credits.rates key '{kind}' must be lowercase without surrounding spaces");
            }
            if !rate.is_finite() || *rate < 0.0 {
                bail!("credits.rates.{kind} must be a non-negative number");
            }
        }
        Ok(())
    }
}
