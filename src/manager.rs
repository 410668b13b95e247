use crate::error::Result;
use crate::record::Entry;
use crate::sstable::Sstable;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Owns the catalog of on-disk runs: assigns ids, loads/creates tables,
/// and performs the multi-way merge that is compaction.
///
/// The catalog is kept oldest-first; the read path treats that ordering
/// as a recency proxy and walks it in reverse.
pub struct SstableManager {
    data_dir: PathBuf,
    runs: Vec<Sstable>,
    next_id: AtomicU64,
    max_entries: usize,
}

impl SstableManager {
    /// Loads every `*.sst` file in `data_dir`, discarding empties, and
    /// sets the id counter's floor to the highest numeric suffix seen.
    pub fn open(data_dir: impl Into<PathBuf>, max_entries: usize) -> Result<Self> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir)?;

        let mut loaded: Vec<(u64, Sstable)> = Vec::new();
        let mut max_id = 0u64;

        for entry in std::fs::read_dir(&data_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().map_or(false, |ext| ext == "sst") {
                if let Some(id) = table_id_from_path(&path) {
                    let table = Sstable::load(path, id, max_entries);
                    if !table.is_empty() {
                        max_id = max_id.max(id);
                        loaded.push((id, table));
                    }
                }
            }
        }
        loaded.sort_by_key(|(id, _)| *id);

        info!(runs = loaded.len(), "sstable manager recovered catalog");

        Ok(Self {
            data_dir,
            runs: loaded.into_iter().map(|(_, t)| t).collect(),
            next_id: AtomicU64::new(max_id),
            max_entries,
        })
    }

    fn path_for(&self, id: u64) -> PathBuf {
        self.data_dir.join(format!("table_{id}.sst"))
    }

    /// Allocates a fresh id and appends a new, empty run to the catalog.
    pub fn create_run(&mut self) -> &mut Sstable {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let table = Sstable::new(id, self.path_for(id), self.max_entries);
        self.runs.push(table);
        self.runs.last_mut().expect("just pushed")
    }

    /// Runs oldest-first, as written to the catalog.
    pub fn runs(&self) -> &[Sstable] {
        &self.runs
    }

    /// Runs newest-first, the order the read path walks.
    pub fn runs_newest_first(&self) -> impl Iterator<Item = &Sstable> {
        self.runs.iter().rev()
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Merges the oldest `count` runs into one, keeping the newest
    /// surviving entry per key and dropping tombstones unconditionally
    /// from the merged output. Only merges a bounded prefix of the
    /// catalog, not all of it.
    pub fn merge_oldest(&mut self, count: usize) -> Result<Option<u64>> {
        let count = count.min(self.runs.len());
        if count < 2 {
            return Ok(None);
        }

        let to_merge: Vec<Sstable> = self.runs.drain(0..count).collect();

        let mut all_entries: Vec<Entry> = Vec::new();
        for table in &to_merge {
            all_entries.extend(table.all_entries().iter().cloned());
        }

        // (key asc, timestamp asc, seq asc): survivor sorts last per key.
        all_entries.sort_by(|a, b| a.merge_key().cmp(&b.merge_key()));

        let mut survivors: HashMap<String, Entry> = HashMap::new();
        for entry in all_entries {
            survivors
                .entry(entry.key.clone())
                .and_modify(|existing| {
                    if entry.merge_key() > existing.merge_key() {
                        *existing = entry.clone();
                    }
                })
                .or_insert(entry);
        }

        let mut live: Vec<Entry> = survivors.into_values().filter(|e| !e.deleted).collect();
        live.sort_by(|a, b| a.key.cmp(&b.key));

        let paths: Vec<PathBuf> = to_merge.iter().map(|t| t.path().to_path_buf()).collect();
        for path in &paths {
            if path.exists() {
                std::fs::remove_file(path)?;
            }
        }

        if live.is_empty() {
            info!(merged = count, "merge produced no surviving entries");
            return Ok(None);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let mut merged = Sstable::new(id, self.path_for(id), usize::MAX);
        merged.load_sorted(live)?;
        let merged_size = merged.size();
        self.runs.push(merged);

        info!(merged = count, into = id, entries = merged_size, "compaction complete");
        Ok(Some(id))
    }

    /// Removes and deletes the files of any empty runs left behind.
    pub fn cleanup_empty(&mut self) -> Result<()> {
        let mut i = 0;
        while i < self.runs.len() {
            if self.runs[i].is_empty() {
                let removed = self.runs.remove(i);
                removed.delete_file()?;
            } else {
                i += 1;
            }
        }
        Ok(())
    }
}

fn table_id_from_path(path: &Path) -> Option<u64> {
    let stem = path.file_stem()?.to_str()?;
    stem.rsplit('_').next()?.parse().ok()
}
