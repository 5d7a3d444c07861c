//! Append-only history of checkpointed versions.
//!
//! The store is written by the checkpoint coordinator only. Everyone
//! else — callers, business logic, analyses, persistence hooks — reads
//! through [`HistoryView`], a cheap point-in-time snapshot.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use stateline_types::{SaveToken, VersionKey};

/// Payload of a recorded version: a full in-memory snapshot, or the
/// token a save hook returned in its place.
#[derive(Debug, Clone)]
enum SnapshotRef<S> {
    Inline(Arc<S>),
    Token(SaveToken),
}

/// An immutable history entry identifying a past checkpointed state.
#[derive(Debug, Clone)]
pub struct Version<S> {
    key: VersionKey,
    created_at: DateTime<Utc>,
    snapshot: SnapshotRef<S>,
}

impl<S> Version<S> {
    pub(crate) fn inline(key: VersionKey, data: Arc<S>) -> Self {
        Self {
            key,
            created_at: Utc::now(),
            snapshot: SnapshotRef::Inline(data),
        }
    }

    pub(crate) fn tokenized(key: VersionKey, token: SaveToken) -> Self {
        Self {
            key,
            created_at: Utc::now(),
            snapshot: SnapshotRef::Token(token),
        }
    }

    pub fn key(&self) -> &VersionKey {
        &self.key
    }

    pub fn step(&self) -> u64 {
        self.key.step
    }

    pub fn name(&self) -> &str {
        &self.key.name
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The in-memory snapshot, when no save hook was configured.
    pub fn data(&self) -> Option<&S> {
        match &self.snapshot {
            SnapshotRef::Inline(data) => Some(data),
            SnapshotRef::Token(_) => None,
        }
    }

    /// The opaque token the save hook produced, when one was configured.
    pub fn save_token(&self) -> Option<&str> {
        match &self.snapshot {
            SnapshotRef::Token(token) => Some(token),
            SnapshotRef::Inline(_) => None,
        }
    }
}

/// Read-only, point-in-time view of the checkpoint history.
///
/// Cloning is cheap; the underlying versions are shared. A view taken
/// before a checkpoint does not observe it.
#[derive(Debug, Clone)]
pub struct HistoryView<S> {
    versions: Arc<[Version<S>]>,
}

impl<S> HistoryView<S> {
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Version<S>> {
        self.versions.iter()
    }

    pub fn last(&self) -> Option<&Version<S>> {
        self.versions.last()
    }

    /// Exact-key lookup: both step and name must match.
    pub fn get(&self, key: &VersionKey) -> Option<&Version<S>> {
        self.at_step(key.step).filter(|v| v.name() == key.name)
    }

    /// The version recorded at `step`, if any. Steps are gap-free, so
    /// this is an index lookup.
    pub fn at_step(&self, step: u64) -> Option<&Version<S>> {
        step.checked_sub(1)
            .and_then(|index| self.versions.get(index as usize))
    }

    pub fn keys(&self) -> impl Iterator<Item = &VersionKey> {
        self.versions.iter().map(Version::key)
    }
}

impl<'a, S> IntoIterator for &'a HistoryView<S> {
    type Item = &'a Version<S>;
    type IntoIter = std::slice::Iter<'a, Version<S>>;

    fn into_iter(self) -> Self::IntoIter {
        self.versions.iter()
    }
}

/// The append-only store behind the views. Owned by the checkpoint
/// coordinator, which is its only writer.
pub(crate) struct HistoryStore<S> {
    baseline: Arc<S>,
    versions: Vec<Version<S>>,
}

impl<S> HistoryStore<S> {
    pub(crate) fn new(baseline: Arc<S>) -> Self {
        Self {
            baseline,
            versions: Vec::new(),
        }
    }

    /// The construction-time working data, retained in memory for the
    /// step-0 rollback target. Not part of the recorded history.
    pub(crate) fn baseline(&self) -> &Arc<S> {
        &self.baseline
    }

    /// Append the next version. Keys must continue the gap-free step
    /// sequence.
    pub(crate) fn append(&mut self, version: Version<S>) {
        debug_assert_eq!(version.step(), self.versions.len() as u64 + 1);
        self.versions.push(version);
    }

    pub(crate) fn get(&self, key: &VersionKey) -> Option<&Version<S>> {
        self.at_step(key.step).filter(|v| v.name() == key.name)
    }

    pub(crate) fn at_step(&self, step: u64) -> Option<&Version<S>> {
        step.checked_sub(1)
            .and_then(|index| self.versions.get(index as usize))
    }

    pub(crate) fn view(&self) -> HistoryView<S>
    where
        S: Clone,
    {
        HistoryView {
            versions: Arc::from(self.versions.as_slice()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(steps: &[&str]) -> HistoryStore<i64> {
        let mut store = HistoryStore::new(Arc::new(0_i64));
        for (index, name) in steps.iter().enumerate() {
            let key = VersionKey::new(index as u64 + 1, *name);
            store.append(Version::inline(key, Arc::new(index as i64)));
        }
        store
    }

    #[test]
    fn test_lookup_by_step_and_key() {
        let store = store_with(&["scale", "normalize"]);

        assert_eq!(store.at_step(1).map(Version::name), Some("scale"));
        assert_eq!(store.at_step(2).map(Version::name), Some("normalize"));
        assert!(store.at_step(0).is_none());
        assert!(store.at_step(3).is_none());

        let key = VersionKey::new(2, "normalize");
        assert!(store.get(&key).is_some());
        // Same step, wrong name.
        assert!(store.get(&VersionKey::new(2, "scale")).is_none());
    }

    #[test]
    fn test_view_is_point_in_time() {
        let mut store = store_with(&["scale"]);
        let view = store.view();

        store.append(Version::inline(
            VersionKey::new(2, "normalize"),
            Arc::new(9),
        ));

        assert_eq!(view.len(), 1);
        assert_eq!(store.view().len(), 2);
        assert_eq!(view.last().map(Version::name), Some("scale"));
    }

    #[test]
    fn test_version_payload_accessors() {
        let inline = Version::inline(VersionKey::new(1, "scale"), Arc::new(5_i64));
        assert_eq!(inline.data(), Some(&5));
        assert!(inline.save_token().is_none());

        let tokenized: Version<i64> =
            Version::tokenized(VersionKey::new(1, "scale"), "blob-1".to_string());
        assert!(tokenized.data().is_none());
        assert_eq!(tokenized.save_token(), Some("blob-1"));
    }
}
