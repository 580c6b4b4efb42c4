use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::schema::{BillRecord, RosterEntry};

/// The volatile fields of a previously exported bill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEntry {
    pub key: String,
    pub status_date: String,
    pub last_action: String,
}

impl From<&BillRecord> for SnapshotEntry {
    fn from(bill: &BillRecord) -> Self {
        Self {
            key: bill.roster.key.clone(),
            status_date: bill.roster.status_date.clone(),
            last_action: bill.roster.last_action.clone(),
        }
    }
}

/// Last run's bills, keyed by bill key. Read-only during a run.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    entries: HashMap<String, SnapshotEntry>,
}

impl Snapshot {
    pub fn new(entries: impl IntoIterator<Item = SnapshotEntry>) -> Self {
        Self {
            entries: entries.into_iter().map(|e| (e.key.clone(), e)).collect(),
        }
    }

    pub fn from_bills(bills: &[BillRecord]) -> Self {
        Self::new(bills.iter().map(SnapshotEntry::from))
    }

    pub fn get(&self, key: &str) -> Option<&SnapshotEntry> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// Whether a bill's cached documents must be re-fetched.
///
/// True when the bill is new, its status date or last action moved, or its
/// status date is today. Same-day data is never trusted from cache.
pub fn needs_refresh(entry: &RosterEntry, snapshot: &Snapshot, today: &str) -> bool {
    match snapshot.get(&entry.key) {
        None => true,
        Some(prior) => {
            prior.status_date != entry.status_date
                || prior.last_action != entry.last_action
                || entry.status_date == today
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlannedBill {
    pub entry: RosterEntry,
    pub refresh: bool,
}

/// Annotate every roster entry with its refresh decision, in roster order.
pub fn plan(roster: &[RosterEntry], snapshot: &Snapshot, today: &str) -> Vec<PlannedBill> {
    roster
        .iter()
        .map(|entry| PlannedBill {
            refresh: needs_refresh(entry, snapshot, today),
            entry: entry.clone(),
        })
        .collect()
}

/// How the current roster differs from the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterDiff {
    pub added: Vec<String>,
    pub changed: Vec<String>,
    pub unchanged: Vec<String>,
    pub removed: Vec<String>,
}

impl RosterDiff {
    pub fn compute(roster: &[RosterEntry], snapshot: &Snapshot) -> Self {
        let mut diff = RosterDiff::default();
        let mut seen = HashSet::new();
        for entry in roster {
            seen.insert(entry.key.as_str());
            match snapshot.get(&entry.key) {
                None => diff.added.push(entry.key.clone()),
                Some(prior)
                    if prior.status_date != entry.status_date
                        || prior.last_action != entry.last_action =>
                {
                    diff.changed.push(entry.key.clone())
                }
                Some(_) => diff.unchanged.push(entry.key.clone()),
            }
        }
        diff.removed = snapshot
            .keys()
            .filter(|key| !seen.contains(key))
            .map(str::to_string)
            .collect();
        diff.removed.sort();
        diff
    }
}
