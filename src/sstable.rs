use crate::error::Result;
use crate::record::Entry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::debug;

/// On-disk representation of one run: a single JSON object holding the
/// table id, creation time, and the sorted entry list.
#[derive(Serialize, Deserialize)]
struct SstableFile {
    table_id: u64,
    created_at: DateTime<Utc>,
    entries: Vec<Entry>,
}

/// An immutable, file-backed ordered run of unique keys. Loaded eagerly
/// on construction, mutated in memory, and persisted via
/// temp-file-then-rename on every change so a crash never observes a
/// half-written run.
pub struct Sstable {
    pub table_id: u64,
    pub created_at: DateTime<Utc>,
    path: PathBuf,
    entries: Vec<Entry>,
    max_entries: usize,
}

impl Sstable {
    /// Creates a brand-new, empty run backed by `path`. Callers populate
    /// it (typically via [`Sstable::put`] during flush/merge) and the
    /// file is written on the first persisting call.
    pub fn new(table_id: u64, path: PathBuf, max_entries: usize) -> Self {
        Self {
            table_id,
            created_at: Utc::now(),
            path,
            entries: Vec::new(),
            max_entries,
        }
    }

    /// Loads a run from `path`. A missing or unparseable file is treated
    /// as an empty run rather than an error.
    pub fn load(path: PathBuf, table_id: u64, max_entries: usize) -> Self {
        let loaded = File::open(&path)
            .ok()
            .and_then(|f| serde_json::from_reader::<_, SstableFile>(BufReader::new(f)).ok());

        match loaded {
            Some(mut file) => {
                file.entries.sort_by(|a, b| a.key.cmp(&b.key));
                Self {
                    table_id,
                    created_at: file.created_at,
                    path,
                    entries: file.entries,
                    max_entries,
                }
            }
            None => {
                debug!(table_id, "sstable file missing or corrupt, treating as empty");
                Self {
                    table_id,
                    created_at: Utc::now(),
                    path,
                    entries: Vec::new(),
                    max_entries,
                }
            }
        }
    }

    fn binary_search(&self, key: &str) -> std::result::Result<usize, usize> {
        self.entries.binary_search_by(|e| e.key.as_str().cmp(key))
    }

    /// Inserts or updates `entry`'s key. Adding a genuinely new key to a
    /// full run fails (returns `false`) instead of evicting anything.
    /// The engine only exercises this path from the merge builder, which
    /// pre-computes size.
    pub fn put(&mut self, entry: Entry) -> Result<bool> {
        match self.binary_search(&entry.key) {
            Ok(idx) => {
                self.entries[idx] = entry;
            }
            Err(idx) => {
                if self.entries.len() >= self.max_entries {
                    return Ok(false);
                }
                self.entries.insert(idx, entry);
            }
        }
        self.save()?;
        Ok(true)
    }

    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.binary_search(key).ok().map(|idx| &self.entries[idx])
    }

    /// Marks `key` as deleted. Calling this on an absent key inserts a
    /// tombstone directly into an on-disk run. Unreachable from the
    /// engine's public API, kept only because the merge builder relies
    /// on `put`/`get`, not this path.
    #[allow(dead_code)]
    pub fn delete(&mut self, key: &str, timestamp: DateTime<Utc>, seq: u64) -> Result<bool> {
        match self.binary_search(key) {
            Ok(idx) => {
                self.entries[idx] = Entry::tombstone(key.to_string(), timestamp, seq);
                self.save()?;
                Ok(true)
            }
            Err(idx) => {
                if self.entries.len() < self.max_entries {
                    self.entries
                        .insert(idx, Entry::tombstone(key.to_string(), timestamp, seq));
                    self.save()?;
                }
                Ok(false)
            }
        }
    }

    /// Entries with `start <= key < end`; either bound may be omitted.
    pub fn range(&self, start: Option<&str>, end: Option<&str>) -> Vec<&Entry> {
        self.entries
            .iter()
            .filter(|e| start.map_or(true, |s| e.key.as_str() >= s))
            .take_while(|e| end.map_or(true, |x| e.key.as_str() < x))
            .collect()
    }

    pub fn all_entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.max_entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn active_entries(&self) -> usize {
        self.entries.iter().filter(|e| !e.deleted).count()
    }

    /// Bulk-loads a freshly sorted, deduplicated entry set (used by
    /// flush and merge, which already know the final content) and
    /// persists it once.
    pub fn load_sorted(&mut self, entries: Vec<Entry>) -> Result<()> {
        debug_assert!(entries.windows(2).all(|w| w[0].key < w[1].key));
        self.entries = entries;
        self.save()
    }

    fn save(&self) -> Result<()> {
        let file = SstableFile {
            table_id: self.table_id,
            created_at: self.created_at,
            entries: self.entries.clone(),
        };

        let tmp_path = self.path.with_extension("sst.tmp");
        {
            let f = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(f);
            serde_json::to_writer_pretty(&mut writer, &file)?;
            use std::io::Write;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn delete_file(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}
