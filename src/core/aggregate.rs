use std::collections::{BTreeMap, BTreeSet};

use crate::core::models::usage::{DayUsage, TokenPair};

/// Sparse per-snapshot token sums. Absent snapshots read as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotBuckets(BTreeMap<String, TokenPair>);

impl SnapshotBuckets {
    pub fn add(&mut self, snapshot_id: &str, tokens: TokenPair) {
        match self.0.get_mut(snapshot_id) {
            Some(bucket) => *bucket += tokens,
            None => {
                self.0.insert(snapshot_id.to_string(), tokens);
            }
        }
    }

    pub fn get(&self, snapshot_id: &str) -> TokenPair {
        self.0.get(snapshot_id).copied().unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, TokenPair)> {
        self.0.iter().map(|(id, pair)| (id.as_str(), *pair))
    }
}

/// One day's per-snapshot sums.
#[derive(Debug, Clone)]
pub struct DailyBucket {
    pub label: String,
    pub buckets: SnapshotBuckets,
}

/// Per-day, per-snapshot sums across the range, in fetch order.
#[derive(Debug, Clone, Default)]
pub struct DailyTotals {
    days: Vec<DailyBucket>,
    snapshot_ids: BTreeSet<String>,
}

impl DailyTotals {
    /// Group every day's entries by snapshot id.
    pub fn from_days(days: &[DayUsage]) -> Self {
        let mut snapshot_ids = BTreeSet::new();
        let days = days
            .iter()
            .map(|day| {
                let mut buckets = SnapshotBuckets::default();
                for entry in &day.entries {
                    buckets.add(&entry.snapshot_id, entry.into());
                    if !snapshot_ids.contains(&entry.snapshot_id) {
                        snapshot_ids.insert(entry.snapshot_id.clone());
                    }
                }
                DailyBucket {
                    label: day.label.clone(),
                    buckets,
                }
            })
            .collect();
        Self { days, snapshot_ids }
    }

    pub fn days(&self) -> &[DailyBucket] {
        &self.days
    }

    /// Every snapshot id seen on any day, sorted.
    pub fn snapshot_ids(&self) -> impl Iterator<Item = &str> {
        self.snapshot_ids.iter().map(String::as_str)
    }

    /// Sum of one day's buckets over all known snapshot ids.
    pub fn day_total(&self, day: &DailyBucket) -> TokenPair {
        let mut total = TokenPair::default();
        for id in self.snapshot_ids() {
            total += day.buckets.get(id);
        }
        total
    }
}

/// Range-wide totals per snapshot id plus the grand total.
#[derive(Debug, Clone, Default)]
pub struct ModelTotals {
    by_snapshot: SnapshotBuckets,
    total: TokenPair,
}

impl ModelTotals {
    pub fn from_daily(daily: &DailyTotals) -> Self {
        let mut by_snapshot = SnapshotBuckets::default();
        let mut total = TokenPair::default();
        for day in daily.days() {
            for id in daily.snapshot_ids() {
                let tokens = day.buckets.get(id);
                by_snapshot.add(id, tokens);
                total += tokens;
            }
        }
        Self { by_snapshot, total }
    }

    /// Rows sorted by snapshot id.
    pub fn rows(&self) -> impl Iterator<Item = (&str, TokenPair)> {
        self.by_snapshot.iter()
    }

    pub fn total(&self) -> TokenPair {
        self.total
    }
}
