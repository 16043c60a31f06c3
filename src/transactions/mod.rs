//! Transaction and label records supplied by upstream ingestion.
//! Records are immutable once created and referenced by id everywhere downstream.

mod export;
mod history;

use crate::error::TransactionError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use export::{read_jsonl, read_labels, read_transactions};
pub use history::{AccountHistory, HistoryWindow, InMemoryHistory};

/// A single card or account transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub account_id: String,
    /// Amount in the account currency; never negative
    pub amount: f64,
    pub timestamp: DateTime<Utc>,
    pub merchant_category: String,
    pub channel: Channel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geolocation: Option<Geolocation>,
    #[serde(default)]
    pub signals: AuthSignals,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Online,
    CardPresent,
    Atm,
    Transfer,
    Mobile,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geolocation {
    pub latitude: f64,
    pub longitude: f64,
}

/// Session-level signals captured with the transaction (online banking).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSignals {
    pub failed_login_attempts: u32,
    /// Payee was added during the same session
    pub new_beneficiary: bool,
}

/// Fraud label from an investigator, chargeback feed, or business rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub transaction_id: String,
    pub is_fraud: bool,
    pub labeled_at: DateTime<Utc>,
    pub source: LabelSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelSource {
    Investigator,
    Chargeback,
    Rule,
}

const EARTH_RADIUS_KM: f64 = 6371.0;

impl Geolocation {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Great-circle distance (haversine)
    pub fn distance_km(&self, other: &Geolocation) -> f64 {
        let (lat1, lat2) = (self.latitude.to_radians(), other.latitude.to_radians());
        let dlat = lat2 - lat1;
        let dlon = (other.longitude - self.longitude).to_radians();
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().min(1.0).asin()
    }
}

impl Transaction {
    pub fn new(
        id: impl Into<String>,
        account_id: impl Into<String>,
        amount: f64,
        timestamp: DateTime<Utc>,
        merchant_category: impl Into<String>,
        channel: Channel,
    ) -> Self {
        Self {
            id: id.into(),
            account_id: account_id.into(),
            amount,
            timestamp,
            merchant_category: merchant_category.into(),
            channel,
            geolocation: None,
            signals: AuthSignals::default(),
        }
    }

    pub fn with_geolocation(mut self, latitude: f64, longitude: f64) -> Self {
        self.geolocation = Some(Geolocation::new(latitude, longitude));
        self
    }

    pub fn with_signals(mut self, signals: AuthSignals) -> Self {
        self.signals = signals;
        self
    }

    pub fn validate(&self) -> Result<(), TransactionError> {
        if self.id.trim().is_empty() {
            return Err(TransactionError::MissingId);
        }
        if self.account_id.trim().is_empty() {
            return Err(TransactionError::MissingAccount(self.id.clone()));
        }
        if !self.amount.is_finite() || self.amount < 0.0 {
            return Err(TransactionError::InvalidAmount {
                id: self.id.clone(),
                amount: self.amount,
            });
        }
        if let Some(geo) = self.geolocation {
            if !geo.is_valid() {
                return Err(TransactionError::InvalidGeolocation {
                    id: self.id.clone(),
                    latitude: geo.latitude,
                    longitude: geo.longitude,
                });
            }
        }
        Ok(())
    }
}
