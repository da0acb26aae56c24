//! Append-only, time-ordered log of serving events.
//!
//! Besides the full log the ledger keeps two position indexes, one per user
//! and one per campaign, so the frequency checks cost O(window) rather than
//! O(history). Records are never mutated or removed. A retention policy would
//! prune the indexes first and the log second; none is implemented.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

/// One successful allocation
#[derive(Debug, Clone, PartialEq)]
pub struct ServingRecord {
    pub campaign_id: String,
    pub user_id: String,
    /// Request time, raised to the newest stored timestamp when the clock has stepped back
    /// Can therefore be later than the `now` the request was evaluated at
    pub served_at: DateTime<Utc>,
    /// Insertion order; breaks ties between equal timestamps
    pub sequence: u64,
}

#[derive(Default)]
struct LedgerInner {
    records: Vec<ServingRecord>,
    by_user: HashMap<String, Vec<usize>>,
    by_campaign: HashMap<String, Vec<usize>>,
}

/// Shared serving ledger
///
/// Appends hold the write lock only long enough to push a record and two
/// index positions; queries copy their result out under the read lock, so a
/// reader sees every append that completed before it and none half-done.
#[derive(Default)]
pub struct ServingLedger {
    inner: RwLock<LedgerInner>,
}

impl ServingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a serving event and return the stored record
    ///
    /// `served_at` is clamped to the newest timestamp already stored, so the
    /// log stays ordered by time even when the clock steps backwards.
    pub fn append(&self, campaign_id: &str, user_id: &str, served_at: DateTime<Utc>) -> ServingRecord {
        let mut inner = self.inner.write();
        let served_at = match inner.records.last() {
            Some(last) if last.served_at > served_at => last.served_at,
            _ => served_at,
        };
        let position = inner.records.len();
        let record = ServingRecord {
            campaign_id: campaign_id.to_string(),
            user_id: user_id.to_string(),
            served_at,
            sequence: position as u64,
        };
        inner.records.push(record.clone());
        inner.by_user.entry(user_id.to_string()).or_default().push(position);
        inner.by_campaign.entry(campaign_id.to_string()).or_default().push(position);
        record
    }

    /// The `limit` most recent records for a user, newest first
    pub fn query_by_user(&self, user_id: &str, limit: usize) -> Vec<ServingRecord> {
        let inner = self.inner.read();
        match inner.by_user.get(user_id) {
            Some(positions) => positions.iter().rev().take(limit).map(|&p| inner.records[p].clone()).collect(),
            None => Vec::new(),
        }
    }

    /// All records for a campaign served at or after `cutoff`, oldest first
    pub fn query_by_campaign_since(&self, campaign_id: &str, cutoff: DateTime<Utc>) -> Vec<ServingRecord> {
        let inner = self.inner.read();
        let Some(positions) = inner.by_campaign.get(campaign_id) else {
            return Vec::new();
        };
        let mut recent: Vec<ServingRecord> = positions
            .iter()
            .rev()
            .map(|&p| &inner.records[p])
            .take_while(|record| record.served_at >= cutoff)
            .cloned()
            .collect();
        recent.reverse();
        recent
    }

    /// Number of records for a campaign served at or after `cutoff`
    pub fn count_by_campaign_since(&self, campaign_id: &str, cutoff: DateTime<Utc>) -> usize {
        let inner = self.inner.read();
        inner.by_campaign.get(campaign_id).map_or(0, |positions| {
            positions
                .iter()
                .rev()
                .take_while(|&&p| inner.records[p].served_at >= cutoff)
                .count()
        })
    }

    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the full log in insertion order
    pub fn snapshot(&self) -> Vec<ServingRecord> {
        self.inner.read().records.clone()
    }
}
