//! Transaction + history window → schema-ordered feature vector.

use super::{schema, FeatureVector, HistoryStats};
use crate::error::FeatureError;
use crate::transactions::{Channel, HistoryWindow, Transaction};
use chrono::{Datelike, Timelike, Weekday};
use std::f64::consts::PI;

/// Merchant categories with elevated fraud exposure
const HIGH_RISK_MERCHANTS: &[&str] = &[
    "gambling",
    "crypto",
    "money_transfer",
    "wire_transfer",
    "gift_cards",
    "pawn_shop",
    "prepaid_cards",
];

const MAX_FAILED_LOGINS: u32 = 10;

fn ln1p(x: f64) -> f64 {
    x.max(0.0).ln_1p()
}

fn flag(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

/// Stateless extractor; the history window only fixes defaults and normalization.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    window: HistoryWindow,
}

impl FeatureExtractor {
    pub fn new(window: HistoryWindow) -> Self {
        Self { window }
    }

    pub fn window(&self) -> &HistoryWindow {
        &self.window
    }

    /// Build the feature vector for `tx` in the layout of `schema_version`.
    ///
    /// `history` is the account's window as selected by [`HistoryWindow::select`]. An empty
    /// history yields the same vector length, with history features at their defaults.
    pub fn extract(
        &self,
        tx: &Transaction,
        history: &[Transaction],
        schema_version: u32,
    ) -> Result<FeatureVector, FeatureError> {
        let layout = schema(schema_version).ok_or(FeatureError::SchemaMismatch(schema_version))?;
        let stats = HistoryStats::from_history(tx, history);

        let hour = tx.timestamp.hour() as f64 + tx.timestamp.minute() as f64 / 60.0;
        let angle = 2.0 * PI * hour / 24.0;
        let weekend = matches!(tx.timestamp.weekday(), Weekday::Sat | Weekday::Sun);
        let category = tx.merchant_category.to_ascii_lowercase();

        let max_age_secs = self.window.max_age.num_seconds() as f64;
        let mean_log = if stats.count > 0 { ln1p(stats.mean_amount) } else { 0.0 };
        let ratio_log = if stats.count > 0 {
            ln1p(tx.amount) - ln1p(stats.mean_amount)
        } else {
            0.0
        };

        let mut values = Vec::with_capacity(layout.len());
        values.push(ln1p(tx.amount));
        values.push(angle.sin());
        values.push(angle.cos());
        values.push(flag(weekend));
        values.push(flag(tx.channel == Channel::Online));
        values.push(flag(tx.channel == Channel::CardPresent));
        values.push(flag(tx.channel == Channel::Atm));
        values.push(flag(tx.channel == Channel::Transfer));
        values.push(flag(tx.channel == Channel::Mobile));
        values.push(flag(HIGH_RISK_MERCHANTS.contains(&category.as_str())));
        values.push(stats.count as f64 / self.window.max_transactions.max(1) as f64);
        values.push(mean_log);
        values.push(ratio_log);
        values.push(ln1p(stats.seconds_since_last.unwrap_or(max_age_secs)));
        values.push(stats.recent_count_1h as f64);
        values.push(flag(stats.new_merchant_category));
        values.push(ln1p(stats.distance_from_last_km.unwrap_or(0.0)));
        values.push(ln1p(stats.implied_speed_kmh.unwrap_or(0.0)));
        if schema_version >= 2 {
            values.push(tx.signals.failed_login_attempts.min(MAX_FAILED_LOGINS) as f64);
            values.push(flag(tx.signals.new_beneficiary));
        }
        debug_assert_eq!(values.len(), layout.len());

        Ok(FeatureVector {
            schema_version,
            transaction_id: tx.id.clone(),
            values,
        })
    }
}
