//! Account-level statistics over the history window.

use crate::transactions::{Geolocation, Transaction};
use chrono::Duration;

/// Fewest hours assumed between two transactions when deriving travel speed.
const MIN_TRAVEL_HOURS: f64 = 1.0 / 60.0;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryStats {
    pub count: usize,
    pub mean_amount: f64,
    /// Seconds since the most recent prior transaction
    pub seconds_since_last: Option<f64>,
    /// Prior transactions within the hour before this one
    pub recent_count_1h: usize,
    /// Merchant category never seen in a non-empty history
    pub new_merchant_category: bool,
    /// Distance to the most recent geolocated transaction
    pub distance_from_last_km: Option<f64>,
    pub implied_speed_kmh: Option<f64>,
    /// Distance to the nearest geolocated transaction in history
    pub nearest_known_location_km: Option<f64>,
}

impl HistoryStats {
    /// `history` must be the window of `tx` (same account, earlier, oldest first).
    pub fn from_history(tx: &Transaction, history: &[Transaction]) -> Self {
        let mut s = HistoryStats {
            count: history.len(),
            ..Default::default()
        };
        if history.is_empty() {
            return s;
        }

        s.mean_amount = history.iter().map(|h| h.amount).sum::<f64>() / history.len() as f64;

        if let Some(last) = history.last() {
            s.seconds_since_last = Some(
                (tx.timestamp - last.timestamp).num_milliseconds().max(0) as f64 / 1000.0,
            );
        }

        let hour_ago = tx.timestamp - Duration::hours(1);
        s.recent_count_1h = history.iter().filter(|h| h.timestamp >= hour_ago).count();

        s.new_merchant_category = !history
            .iter()
            .any(|h| h.merchant_category.eq_ignore_ascii_case(&tx.merchant_category));

        if let Some(here) = tx.geolocation {
            if let Some((last, there)) = history
                .iter()
                .rev()
                .find_map(|h| h.geolocation.map(|g| (h, g)))
            {
                let km = here.distance_km(&there);
                let hours = ((tx.timestamp - last.timestamp).num_seconds() as f64 / 3600.0)
                    .max(MIN_TRAVEL_HOURS);
                s.distance_from_last_km = Some(km);
                s.implied_speed_kmh = Some(km / hours);
            }
            s.nearest_known_location_km = nearest(&here, history);
        }
        s
    }
}

fn nearest(here: &Geolocation, history: &[Transaction]) -> Option<f64> {
    history
        .iter()
        .filter_map(|h| h.geolocation)
        .map(|g| here.distance_km(&g))
        .fold(None, |acc: Option<f64>, d| Some(acc.map_or(d, |a| a.min(d))))
}
