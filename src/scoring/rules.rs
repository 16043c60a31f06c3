//! Business-rule signals reported next to the model score.

use crate::features::HistoryStats;
use crate::transactions::Transaction;
use serde::{Deserialize, Serialize};

/// New payee plus a transfer above this amount looks like an authorized push payment scam
pub const APP_AMOUNT_THRESHOLD: f64 = 5000.0;
/// Failed logins above this count, from an unusual place, look like account takeover
pub const ATO_FAILED_LOGINS: u32 = 2;
pub const UNUSUAL_LOCATION_KM: f64 = 500.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleHit {
    AuthorizedPushPayment,
    AccountTakeover,
}

pub fn evaluate_rules(tx: &Transaction, history: &[Transaction]) -> Vec<RuleHit> {
    let mut hits = Vec::new();
    if tx.signals.new_beneficiary && tx.amount > APP_AMOUNT_THRESHOLD {
        hits.push(RuleHit::AuthorizedPushPayment);
    }
    if tx.signals.failed_login_attempts > ATO_FAILED_LOGINS {
        let unusual = HistoryStats::from_history(tx, history)
            .nearest_known_location_km
            .is_some_and(|km| km >= UNUSUAL_LOCATION_KM);
        if unusual {
            hits.push(RuleHit::AccountTakeover);
        }
    }
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transactions::{AuthSignals, Channel};
    use chrono::{Duration, TimeZone, Utc};

    fn at(hour: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 2, hour, 0, 0).unwrap()
    }

    #[test]
    fn push_payment_needs_new_payee_and_large_amount() {
        let signals = AuthSignals {
            failed_login_attempts: 0,
            new_beneficiary: true,
        };
        let big = Transaction::new("t1", "a", 6000.0, at(10), "transfer", Channel::Transfer).with_signals(signals);
        let small = Transaction::new("t2", "a", 4000.0, at(10), "transfer", Channel::Transfer).with_signals(signals);
        assert_eq!(evaluate_rules(&big, &[]), vec![RuleHit::AuthorizedPushPayment]);
        assert!(evaluate_rules(&small, &[]).is_empty());
    }

    #[test]
    fn takeover_needs_failed_logins_and_far_location() {
        let home = Transaction::new("h", "a", 20.0, at(8) - Duration::days(1), "grocery", Channel::CardPresent)
            .with_geolocation(40.7128, -74.0060);
        let signals = AuthSignals {
            failed_login_attempts: 3,
            new_beneficiary: false,
        };
        let abroad = Transaction::new("t1", "a", 300.0, at(9), "transfer", Channel::Online)
            .with_geolocation(51.5074, -0.1278)
            .with_signals(signals);
        let nearby = Transaction::new("t2", "a", 300.0, at(9), "transfer", Channel::Online)
            .with_geolocation(40.73, -73.99)
            .with_signals(signals);
        assert_eq!(evaluate_rules(&abroad, &[home.clone()]), vec![RuleHit::AccountTakeover]);
        assert!(evaluate_rules(&nearby, &[home.clone()]).is_empty());
        // no geolocated history: nothing to compare against
        assert!(evaluate_rules(&abroad, &[]).is_empty());
    }
}
