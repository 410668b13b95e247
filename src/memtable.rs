use crate::record::Entry;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;

/// In-memory, ordered write buffer. A write to an existing key replaces
/// the prior [`Entry`] in place; tombstones may resurrect as a PUT and
/// vice versa.
pub struct Memtable {
    data: BTreeMap<String, Entry>,
    max_entries: usize,
}

impl Memtable {
    pub fn new(max_entries: usize) -> Self {
        Self {
            data: BTreeMap::new(),
            max_entries,
        }
    }

    pub fn put(&mut self, key: String, value: Value, timestamp: DateTime<Utc>, seq: u64) {
        self.data
            .insert(key.clone(), Entry::put(key, value, timestamp, seq));
    }

    pub fn delete(&mut self, key: String, timestamp: DateTime<Utc>, seq: u64) {
        self.data
            .insert(key.clone(), Entry::tombstone(key, timestamp, seq));
    }

    /// Returns the raw entry for `key`, or `None` if it was never
    /// written to this memtable. The entry may be a tombstone; callers
    /// that care check `entry.deleted` themselves.
    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.data.get(key)
    }

    pub fn sorted_entries(&self) -> impl Iterator<Item = &Entry> {
        self.data.values()
    }

    pub fn is_full(&self) -> bool {
        self.data.len() >= self.max_entries
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn clear(&mut self) -> usize {
        let count = self.data.len();
        self.data.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn put_then_get_returns_live_entry() {
        let mut mt = Memtable::new(4);
        mt.put("a".into(), Value::from(1), now(), 1);
        assert_eq!(mt.get("a").unwrap().value, Value::from(1));
    }

    #[test]
    fn delete_resurrects_as_tombstone() {
        let mut mt = Memtable::new(4);
        mt.put("a".into(), Value::from(1), now(), 1);
        mt.delete("a".into(), now(), 2);
        assert!(mt.get("a").unwrap().deleted);
    }

    #[test]
    fn sorted_entries_are_ascending_by_key() {
        let mut mt = Memtable::new(8);
        mt.put("charlie".into(), Value::from(3), now(), 1);
        mt.put("alice".into(), Value::from(1), now(), 2);
        mt.put("bob".into(), Value::from(2), now(), 3);

        let keys: Vec<&str> = mt.sorted_entries().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["alice", "bob", "charlie"]);
    }

    #[test]
    fn is_full_at_capacity() {
        let mut mt = Memtable::new(2);
        mt.put("a".into(), Value::from(1), now(), 1);
        assert!(!mt.is_full());
        mt.put("b".into(), Value::from(2), now(), 2);
        assert!(mt.is_full());
    }

    #[test]
    fn clear_empties_and_reports_prior_count() {
        let mut mt = Memtable::new(4);
        mt.put("a".into(), Value::from(1), now(), 1);
        mt.put("b".into(), Value::from(2), now(), 2);
        assert_eq!(mt.clear(), 2);
        assert!(mt.is_empty());
    }
}
