//! Recent account history: the bounded window of prior transactions features are derived from.

use super::Transaction;
use crate::config::{HistoryConfig, MAX_HISTORY_AGE_SECS};
use crate::error::HistoryError;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

/// Accounts tracked by [`InMemoryHistory`] unless configured otherwise.
pub const DEFAULT_MAX_ACCOUNTS: usize = 100_000;

/// Bounded look-back: the last `max_transactions` within `max_age` of the scored transaction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryWindow {
    pub max_transactions: usize,
    pub max_age: Duration,
}

impl HistoryWindow {
    pub fn new(max_transactions: usize, max_age: Duration) -> Self {
        Self {
            max_transactions,
            max_age,
        }
    }

    /// Oldest timestamp still inside the window of a transaction made at `at`.
    pub fn horizon(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        at.checked_sub_signed(self.max_age).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Select the history of `tx` from `candidates`, oldest first.
    ///
    /// Only strictly earlier transactions of the same account count, and `tx` itself is
    /// never part of its own history, so re-scoring a transaction sees the same window.
    pub fn select<'a, I>(&self, tx: &Transaction, candidates: I) -> Vec<Transaction>
    where
        I: IntoIterator<Item = &'a Transaction>,
    {
        let oldest = self.horizon(tx.timestamp);
        let mut picked: Vec<&Transaction> = candidates
            .into_iter()
            .filter(|c| {
                c.account_id == tx.account_id
                    && c.id != tx.id
                    && c.timestamp < tx.timestamp
                    && c.timestamp >= oldest
            })
            .collect();
        picked.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        let skip = picked.len().saturating_sub(self.max_transactions);
        picked.into_iter().skip(skip).cloned().collect()
    }
}

impl From<&HistoryConfig> for HistoryWindow {
    fn from(config: &HistoryConfig) -> Self {
        let secs = config.max_age_secs.clamp(1, MAX_HISTORY_AGE_SECS);
        Self::new(config.max_transactions, Duration::seconds(secs))
    }
}

/// Read interface onto the warehouse's per-account transaction history.
pub trait AccountHistory: Send + Sync {
    fn recent(&self, tx: &Transaction, window: &HistoryWindow) -> Result<Vec<Transaction>, HistoryError>;
}

/// Process-local history fed by the scoring surface as transactions arrive.
///
/// Per account, the newest transaction always keeps its complete window: trimming only drops
/// entries older than its horizon or beyond its `max_transactions` predecessors. At most
/// `max_accounts` accounts are tracked; accounts gone quiet for longer than the window are
/// evicted first, then the least recently active ones.
pub struct InMemoryHistory {
    window: HistoryWindow,
    max_accounts: usize,
    accounts: RwLock<HashMap<String, Vec<Transaction>>>,
}

impl InMemoryHistory {
    pub fn new(window: HistoryWindow) -> Self {
        Self {
            window,
            max_accounts: DEFAULT_MAX_ACCOUNTS,
            accounts: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_max_accounts(mut self, max_accounts: usize) -> Self {
        self.max_accounts = max_accounts.max(1);
        self
    }

    /// Record a transaction; duplicates by id are ignored.
    pub fn record(&self, tx: &Transaction) {
        let mut accounts = self.accounts.write();
        if !accounts.contains_key(&tx.account_id) && accounts.len() >= self.max_accounts {
            self.evict_accounts(&mut accounts, tx.timestamp);
        }
        let entries = accounts.entry(tx.account_id.clone()).or_default();
        if entries.iter().any(|e| e.id == tx.id) {
            return;
        }
        let pos = entries.partition_point(|e| e.timestamp <= tx.timestamp);
        entries.insert(pos, tx.clone());
        self.trim(entries);
    }

    pub fn extend<'a, I: IntoIterator<Item = &'a Transaction>>(&self, txs: I) {
        for tx in txs {
            self.record(tx);
        }
    }

    pub fn account_len(&self, account_id: &str) -> usize {
        self.accounts.read().get(account_id).map_or(0, Vec::len)
    }

    pub fn account_count(&self) -> usize {
        self.accounts.read().len()
    }

    fn trim(&self, entries: &mut Vec<Transaction>) {
        let Some(newest) = entries.last().map(|e| e.timestamp) else {
            return;
        };
        let horizon = self.window.horizon(newest);
        let stale = entries.partition_point(|e| e.timestamp < horizon);
        entries.drain(..stale);

        // entries sharing the newest timestamp are not in each other's window
        let tied = entries.iter().rev().take_while(|e| e.timestamp == newest).count();
        let keep = self.window.max_transactions + tied;
        if entries.len() > keep {
            let excess = entries.len() - keep;
            entries.drain(..excess);
        }
    }

    /// Make room for one more account, measured against activity at `now`.
    fn evict_accounts(&self, accounts: &mut HashMap<String, Vec<Transaction>>, now: DateTime<Utc>) {
        let before = accounts.len();
        let horizon = self.window.horizon(now);
        accounts.retain(|_, entries| entries.last().is_some_and(|e| e.timestamp >= horizon));

        if accounts.len() >= self.max_accounts {
            let mut by_activity: Vec<(DateTime<Utc>, String)> = accounts
                .iter()
                .filter_map(|(id, entries)| entries.last().map(|e| (e.timestamp, id.clone())))
                .collect();
            by_activity.sort();
            // free a tenth of the capacity so eviction does not run on every new account
            let target = self.max_accounts - (self.max_accounts / 10).max(1);
            let excess = accounts.len().saturating_sub(target);
            for (_, id) in by_activity.into_iter().take(excess) {
                accounts.remove(&id);
            }
        }
        debug!(evicted = before - accounts.len(), tracked = accounts.len(), "account history evicted");
    }
}

impl From<&HistoryConfig> for InMemoryHistory {
    fn from(config: &HistoryConfig) -> Self {
        Self::new(HistoryWindow::from(config)).with_max_accounts(config.max_accounts)
    }
}

impl AccountHistory for InMemoryHistory {
    fn recent(&self, tx: &Transaction, window: &HistoryWindow) -> Result<Vec<Transaction>, HistoryError> {
        let accounts = self.accounts.read();
        Ok(accounts
            .get(&tx.account_id)
            .map(|entries| window.select(tx, entries.iter()))
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transactions::Channel;
    use chrono::{TimeZone, Utc};

    fn tx(id: &str, account: &str, minute: i64) -> Transaction {
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        Transaction::new(id, account, 10.0, base + Duration::minutes(minute), "grocery", Channel::Online)
    }

    #[test]
    fn window_excludes_self_later_and_other_accounts() {
        let window = HistoryWindow::new(10, Duration::hours(1));
        let scored = tx("now", "a", 100);
        let all = vec![
            tx("old", "a", 10),
            tx("e1", "a", 50),
            tx("e2", "a", 90),
            tx("now", "a", 100),
            tx("later", "a", 120),
            tx("other", "b", 95),
        ];
        let ids: Vec<String> = window.select(&scored, &all).into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec!["e1", "e2"]);
    }

    #[test]
    fn window_keeps_most_recent_n() {
        let window = HistoryWindow::new(2, Duration::days(1));
        let scored = tx("now", "a", 100);
        let all: Vec<Transaction> = (0..5).map(|i| tx(&format!("e{i}"), "a", i * 10)).collect();
        let ids: Vec<String> = window.select(&scored, &all).into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec!["e3", "e4"]);
    }

    fn minutes(txs: &[Transaction]) -> Vec<i64> {
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        txs.iter().map(|t| (t.timestamp - base).num_minutes()).collect()
    }

    #[test]
    fn in_memory_history_is_bounded_and_ordered() {
        let history = InMemoryHistory::new(HistoryWindow::new(3, Duration::days(1)));
        for (i, minute) in [30, 10, 20, 40, 50].iter().enumerate() {
            history.record(&tx(&format!("e{i}"), "a", *minute));
        }
        history.record(&tx("e0", "a", 30));
        // the newest entry plus its three predecessors
        assert_eq!(history.account_len("a"), 4);

        let window = HistoryWindow::new(10, Duration::days(1));
        let recent = history.recent(&tx("now", "a", 60), &window).unwrap();
        assert_eq!(minutes(&recent), vec![20, 30, 40, 50]);
    }

    #[test]
    fn recording_the_newest_transaction_keeps_its_window() {
        let window = HistoryWindow::new(2, Duration::days(1));
        let history = InMemoryHistory::new(window);
        history.record(&tx("p0", "a", 10));
        history.record(&tx("p1", "a", 20));
        let scored = tx("t", "a", 30);
        let before = history.recent(&scored, &window).unwrap();
        history.record(&scored);
        let after = history.recent(&scored, &window).unwrap();
        assert_eq!(minutes(&before), vec![10, 20]);
        assert_eq!(before, after);
    }

    #[test]
    fn entries_tied_with_the_newest_do_not_crowd_out_its_window() {
        let window = HistoryWindow::new(2, Duration::days(1));
        let history = InMemoryHistory::new(window);
        for (id, minute) in [("p0", 10), ("p1", 20), ("t", 30), ("u", 30)] {
            history.record(&tx(id, "a", minute));
        }
        assert_eq!(minutes(&history.recent(&tx("t", "a", 30), &window).unwrap()), vec![10, 20]);
    }

    #[test]
    fn entries_older_than_the_window_are_trimmed() {
        let history = InMemoryHistory::new(HistoryWindow::new(10, Duration::hours(1)));
        history.record(&tx("old", "a", 0));
        history.record(&tx("mid", "a", 50));
        history.record(&tx("new", "a", 100));
        assert_eq!(history.account_len("a"), 2);
    }

    #[test]
    fn oversized_max_age_reaches_back_without_overflow() {
        let window = HistoryWindow::new(5, Duration::seconds(i64::MAX / 1000));
        let scored = tx("now", "a", 100);
        assert_eq!(window.horizon(scored.timestamp), DateTime::<Utc>::MIN_UTC);
        let all = vec![tx("e1", "a", 10)];
        assert_eq!(window.select(&scored, &all).len(), 1);

        let history = InMemoryHistory::new(window);
        history.extend(&all);
        history.record(&scored);
        assert_eq!(history.account_len("a"), 2);
    }

    #[test]
    fn config_age_is_clamped() {
        let config = HistoryConfig {
            max_age_secs: i64::MAX,
            ..HistoryConfig::default()
        };
        let window = HistoryWindow::from(&config);
        assert_eq!(window.max_age, Duration::seconds(MAX_HISTORY_AGE_SECS));
    }

    #[test]
    fn quiet_accounts_are_evicted_first() {
        let history = InMemoryHistory::new(HistoryWindow::new(5, Duration::hours(1))).with_max_accounts(3);
        history.record(&tx("q1", "quiet", 0));
        history.record(&tx("b1", "busy-1", 200));
        history.record(&tx("b2", "busy-2", 210));
        history.record(&tx("n1", "new", 220));
        assert_eq!(history.account_count(), 3);
        assert_eq!(history.account_len("quiet"), 0);
        assert_eq!(history.account_len("busy-1"), 1);
        assert_eq!(history.account_len("new"), 1);
    }

    #[test]
    fn account_count_stays_bounded() {
        let history = InMemoryHistory::new(HistoryWindow::new(5, Duration::days(30))).with_max_accounts(20);
        for i in 0..500 {
            history.record(&tx(&format!("t{i}"), &format!("acct-{i}"), i));
        }
        assert!(history.account_count() <= 20);
        // the most recently active account is always kept
        assert_eq!(history.account_len("acct-499"), 1);
    }
}
