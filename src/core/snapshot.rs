//! Ordered, identity-unique record lists and the merge rules applied to them.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::HashSet;

use serde::Serialize;

/// A record that can live in a [`Snapshot`].
pub trait SnapshotRecord: Clone + Send + 'static {
    /// Field-level change carried by update events.
    type Patch: Send + 'static;

    fn id(&self) -> &str;

    /// Identity within a snapshot. Defaults to the id; heterogeneous lists
    /// qualify it with the record kind.
    fn key(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.id())
    }

    /// `self.key() == key` without building the key.
    fn has_key(&self, key: &str) -> bool {
        self.key() == key
    }

    /// Feature comparator. Reapplied with a stable sort after every mutation.
    fn order(a: &Self, b: &Self) -> Ordering;

    fn apply_patch(&mut self, patch: Self::Patch);
}

/// An incoming change to a snapshot.
#[derive(Debug, Clone)]
pub enum Delta<R: SnapshotRecord> {
    /// Creation event: inserted only when the identity is absent.
    Insert(R),
    /// Update event: merged into the record with `key`, dropped if absent.
    Update { key: String, patch: R::Patch },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeOutcome {
    Inserted,
    Duplicate,
    Updated,
    Dropped,
    Rejected,
}

#[derive(Debug, Clone)]
pub struct Snapshot<R> {
    records: Vec<R>,
}

impl<R> Default for Snapshot<R> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
        }
    }
}

impl<R: SnapshotRecord> Snapshot<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole list with an authoritative fetch. Repeated
    /// identities keep their first occurrence.
    pub fn replace(&mut self, records: Vec<R>) -> usize {
        let mut seen = HashSet::with_capacity(records.len());
        self.records = records
            .into_iter()
            .filter(|record| seen.insert(record.key().into_owned()))
            .collect();
        self.resort();
        self.records.len()
    }

    pub fn apply(&mut self, delta: Delta<R>) -> MergeOutcome {
        match delta {
            Delta::Insert(record) => self.insert(record),
            Delta::Update { key, patch } => self.update(&key, patch),
        }
    }

    /// Insert-if-absent. New records go to the front before the re-sort, so
    /// ties order newest delivery first.
    pub fn insert(&mut self, record: R) -> MergeOutcome {
        if self.position(&record.key()).is_some() {
            return MergeOutcome::Duplicate;
        }
        self.records.insert(0, record);
        self.resort();
        MergeOutcome::Inserted
    }

    pub fn update(&mut self, key: &str, patch: R::Patch) -> MergeOutcome {
        let Some(index) = self.position(key) else {
            return MergeOutcome::Dropped;
        };
        self.records[index].apply_patch(patch);
        self.resort();
        MergeOutcome::Updated
    }

    /// Local mutation of one record (optimistic updates). Returns whether the
    /// record existed.
    pub fn modify<F>(&mut self, key: &str, f: F) -> bool
    where
        F: FnOnce(&mut R),
    {
        let Some(index) = self.position(key) else {
            return false;
        };
        f(&mut self.records[index]);
        self.resort();
        true
    }

    /// Apply `f` to every record matching `predicate`; returns the keys touched.
    pub fn modify_where<P, F>(&mut self, predicate: P, mut f: F) -> Vec<String>
    where
        P: Fn(&R) -> bool,
        F: FnMut(&mut R),
    {
        let mut touched = Vec::new();
        for record in self.records.iter_mut().filter(|record| predicate(record)) {
            f(record);
            touched.push(record.key().into_owned());
        }
        if !touched.is_empty() {
            self.resort();
        }
        touched
    }

    pub fn remove(&mut self, key: &str) -> Option<R> {
        self.position(key).map(|index| self.records.remove(index))
    }

    pub fn get(&self, key: &str) -> Option<&R> {
        self.position(key).map(|index| &self.records[index])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    pub fn records(&self) -> &[R] {
        &self.records
    }

    pub fn to_vec(&self) -> Vec<R> {
        self.records.clone()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, R> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn count<P>(&self, predicate: P) -> usize
    where
        P: Fn(&R) -> bool,
    {
        self.records.iter().filter(|record| predicate(record)).count()
    }

    pub fn is_sorted(&self) -> bool {
        self.records
            .windows(2)
            .all(|pair| R::order(&pair[0], &pair[1]) != Ordering::Greater)
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.records.iter().position(|record| record.has_key(key))
    }

    fn resort(&mut self) {
        self.records.sort_by(R::order);
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::core::records::{Interview, InterviewPatch, Message, ReadPatch};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn message(id: &str, secs: i64) -> Message {
        Message {
            id: id.to_string(),
            sender_id: "u-2".to_string(),
            sender_name: "Recruiter".to_string(),
            receiver_id: "u-1".to_string(),
            content: format!("message {id}"),
            timestamp: at(secs),
            read: false,
            job_id: None,
        }
    }

    fn interview(id: &str, date: DateTime<Utc>) -> Interview {
        Interview {
            id: id.to_string(),
            job_id: "job-1".to_string(),
            job_title: "Backend Engineer".to_string(),
            employer_name: "Acme".to_string(),
            job_seeker_name: "Sam".to_string(),
            date,
            location: None,
            notes: None,
            status: None,
            job_seeker_confirmed: None,
            created_at: None,
            read: false,
        }
    }

    fn ids<R: SnapshotRecord>(snapshot: &Snapshot<R>) -> Vec<String> {
        snapshot.iter().map(|record| record.id().to_string()).collect()
    }

    #[test]
    fn repeated_creation_events_keep_one_record_per_id() {
        let mut snapshot = Snapshot::new();
        let deliveries = ["a", "b", "a", "c", "b", "a"];
        for (n, id) in deliveries.iter().enumerate() {
            snapshot.insert(message(id, n as i64));
        }

        assert_eq!(snapshot.len(), 3);
        let mut seen = ids(&snapshot);
        seen.sort();
        assert_eq!(seen, vec!["a", "b", "c"]);
    }

    #[test]
    fn duplicate_creation_never_overwrites() {
        let mut snapshot = Snapshot::new();
        snapshot.insert(message("a", 5));
        let mut replay = message("a", 99);
        replay.content = "changed".to_string();

        assert_eq!(snapshot.insert(replay), MergeOutcome::Duplicate);
        assert_eq!(snapshot.get("a").unwrap().content, "message a");
        assert_eq!(snapshot.get("a").unwrap().timestamp, at(5));
    }

    #[test]
    fn update_for_absent_id_is_dropped() {
        let mut snapshot = Snapshot::new();
        snapshot.replace(vec![interview("i-1", at(100))]);
        let before = snapshot.to_vec();

        let outcome = snapshot.apply(Delta::Update {
            key: "i-404".to_string(),
            patch: InterviewPatch {
                location: Some("Lobby".to_string()),
                ..InterviewPatch::default()
            },
        });

        assert_eq!(outcome, MergeOutcome::Dropped);
        assert_eq!(snapshot.to_vec(), before);
    }

    #[test]
    fn messages_stay_newest_first_after_every_merge() {
        let mut snapshot = Snapshot::new();
        snapshot.replace(vec![message("a", 10), message("b", 30), message("c", 20)]);
        assert_eq!(ids(&snapshot), vec!["b", "c", "a"]);

        for (id, secs) in [("d", 25), ("e", 5), ("f", 40)] {
            snapshot.insert(message(id, secs));
            assert!(snapshot.is_sorted());
            for pair in snapshot.records().windows(2) {
                assert!(pair[0].timestamp >= pair[1].timestamp);
            }
        }
        assert_eq!(ids(&snapshot), vec!["f", "b", "d", "c", "a", "e"]);
    }

    #[test]
    fn interview_update_resorts_by_date() {
        let base = at(1_000);
        let mut snapshot = Snapshot::new();
        snapshot.replace(vec![
            interview("late", base + Duration::days(3)),
            interview("soon", base + Duration::days(1)),
        ]);
        assert_eq!(ids(&snapshot), vec!["soon", "late"]);

        let outcome = snapshot.update(
            "late",
            InterviewPatch {
                date: Some(base),
                ..InterviewPatch::default()
            },
        );
        assert_eq!(outcome, MergeOutcome::Updated);
        assert_eq!(ids(&snapshot), vec!["late", "soon"]);
    }

    #[test]
    fn replace_discards_previous_contents_and_repeated_ids() {
        let mut snapshot = Snapshot::new();
        snapshot.insert(message("old", 1));
        let kept = snapshot.replace(vec![message("x", 2), message("x", 3), message("y", 1)]);

        assert_eq!(kept, 2);
        assert!(!snapshot.contains("old"));
        assert_eq!(snapshot.get("x").unwrap().timestamp, at(2));
    }

    #[test]
    fn ties_keep_newest_delivery_first() {
        let mut snapshot = Snapshot::new();
        snapshot.insert(message("first", 10));
        snapshot.insert(message("second", 10));
        assert_eq!(ids(&snapshot), vec!["second", "first"]);
    }

    #[test]
    fn modify_and_counts() {
        let mut snapshot = Snapshot::new();
        snapshot.replace(vec![message("a", 1), message("b", 2), message("c", 3)]);
        assert_eq!(snapshot.count(|m| !m.read), 3);

        assert!(snapshot.modify("b", |m| m.read = true));
        assert!(!snapshot.modify("zzz", |m| m.read = true));
        assert_eq!(snapshot.count(|m| !m.read), 2);

        let touched = snapshot.modify_where(|m| !m.read, |m| m.apply_patch(ReadPatch { read: true }));
        assert_eq!(touched.len(), 2);
        assert_eq!(snapshot.count(|m| !m.read), 0);
    }
}
