//! Deterministic feature extraction: transaction + account history → versioned vector.

mod extractor;
mod window;

pub use extractor::FeatureExtractor;
pub use window::HistoryStats;

use serde::{Deserialize, Serialize};

/// Schema produced when nothing else is requested.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

const V1_NAMES: &[&str] = &[
    "amount_log",
    "hour_sin",
    "hour_cos",
    "is_weekend",
    "channel_online",
    "channel_card_present",
    "channel_atm",
    "channel_transfer",
    "channel_mobile",
    "merchant_high_risk",
    "history_count",
    "history_mean_amount_log",
    "amount_to_mean_log_ratio",
    "seconds_since_last_log",
    "recent_count_1h",
    "new_merchant_category",
    "distance_from_last_km_log",
    "implied_speed_kmh_log",
];

const V2_NAMES: &[&str] = &[
    "amount_log",
    "hour_sin",
    "hour_cos",
    "is_weekend",
    "channel_online",
    "channel_card_present",
    "channel_atm",
    "channel_transfer",
    "channel_mobile",
    "merchant_high_risk",
    "history_count",
    "history_mean_amount_log",
    "amount_to_mean_log_ratio",
    "seconds_since_last_log",
    "recent_count_1h",
    "new_merchant_category",
    "distance_from_last_km_log",
    "implied_speed_kmh_log",
    "failed_login_attempts",
    "new_beneficiary",
];

/// Ordered layout a model is trained against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureSchema {
    pub version: u32,
    pub names: &'static [&'static str],
}

impl FeatureSchema {
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

static SCHEMAS: [FeatureSchema; 2] = [
    FeatureSchema {
        version: 1,
        names: V1_NAMES,
    },
    FeatureSchema {
        version: 2,
        names: V2_NAMES,
    },
];

/// Look up a known schema by version.
pub fn schema(version: u32) -> Option<&'static FeatureSchema> {
    SCHEMAS.iter().find(|s| s.version == version)
}

pub fn known_schemas() -> &'static [FeatureSchema] {
    &SCHEMAS
}

/// Fixed-length model input, bound to the schema it was built with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub schema_version: u32,
    pub transaction_id: String,
    pub values: Vec<f64>,
}

impl FeatureVector {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Value of a named feature, if the vector's schema defines it.
    pub fn get(&self, name: &str) -> Option<f64> {
        let idx = schema(self.schema_version)?.names.iter().position(|n| *n == name)?;
        self.values.get(idx).copied()
    }
}
