use crate::error::{LsmError, Result};
use crate::record::{WalEntry, WalOperation};
use chrono::Utc;
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Write-ahead log: one JSON-encoded [`WalEntry`] per line, fsynced
/// before `append` returns.
pub struct Wal {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
    sequence: AtomicU64,
}

impl Wal {
    /// Opens (creating if absent) the WAL at `path` and restores the
    /// sequence counter to the maximum `sequence_number` seen in it.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        let max_seq = Self::scan(&path)?
            .iter()
            .map(|e| e.sequence_number)
            .max()
            .unwrap_or(0);

        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
            sequence: AtomicU64::new(max_seq),
        })
    }

    /// Appends one operation, fsyncing before returning. Returns the
    /// freshly assigned sequence number together with the timestamp
    /// stamped on the line, so the caller can apply the identical pair
    /// to the memtable entry it derives from this write.
    pub fn append(
        &self,
        operation: WalOperation,
        key: &str,
        value: Option<Value>,
    ) -> Result<(u64, chrono::DateTime<Utc>)> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| LsmError::LockPoisoned("wal"))?;

        let seq = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let timestamp = Utc::now();
        let entry = WalEntry {
            operation,
            key: key.to_string(),
            value,
            timestamp,
            sequence_number: seq,
        };

        let line = serde_json::to_string(&entry)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        writer.get_ref().sync_all()?;

        debug!(key = %entry.key, seq, ?operation, "wal append");
        Ok((seq, timestamp))
    }

    /// Replays the WAL in file order. Malformed trailing lines are
    /// skipped (crash tail-tolerance) rather than failing recovery.
    pub fn replay(&self) -> Result<Vec<WalEntry>> {
        Self::scan(&self.path)
    }

    fn scan(path: &Path) -> Result<Vec<WalEntry>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(File::open(path)?);
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<WalEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(error = %e, "skipping corrupt wal line"),
            }
        }
        Ok(entries)
    }

    /// Rewrites the file keeping only entries with `sequence_number >=
    /// seq`. Used to bound recovery time after a run materializes older
    /// entries durably. Not invoked automatically by this engine.
    pub fn truncate_before(&self, seq: u64) -> Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| LsmError::LockPoisoned("wal"))?;

        let remaining: Vec<WalEntry> = Self::scan(&self.path)?
            .into_iter()
            .filter(|e| e.sequence_number >= seq)
            .collect();

        let mut tmp = BufWriter::new(
            OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&self.path)?,
        );
        for entry in &remaining {
            let line = serde_json::to_string(entry)?;
            tmp.write_all(line.as_bytes())?;
            tmp.write_all(b"\n")?;
        }
        tmp.flush()?;
        tmp.get_ref().sync_all()?;

        let append_file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        *writer = BufWriter::new(append_file);

        info!(kept = remaining.len(), "wal truncated");
        Ok(())
    }

    /// Wholly truncates the file and resets the sequence counter. Only
    /// invoked by `clear_all`, never by flush.
    pub fn clear(&self) -> Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| LsmError::LockPoisoned("wal"))?;

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        file.sync_all()?;

        let append_file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        *writer = BufWriter::new(append_file);
        self.sequence.store(0, Ordering::SeqCst);
        Ok(())
    }

    pub fn current_sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> Result<WalStats> {
        let entries = self.replay()?;
        let put_operations = entries
            .iter()
            .filter(|e| e.operation == WalOperation::Put)
            .count();
        let delete_operations = entries.len() - put_operations;

        Ok(WalStats {
            total_entries: entries.len(),
            put_operations,
            delete_operations,
            current_sequence: self.current_sequence(),
            wal_file_size: std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0),
        })
    }
}

#[derive(Clone, Debug, serde::Serialize)]
pub struct WalStats {
    pub total_entries: usize,
    pub put_operations: usize,
    pub delete_operations: usize,
    pub current_sequence: u64,
    pub wal_file_size: u64,
}
