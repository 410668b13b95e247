use crate::error::{LsmError, Result};
use std::path::PathBuf;

/// Tunables for one [`crate::engine::LsmEngine`] instance. Built through
/// [`EngineConfig::builder`], which validates on `build` rather than
/// letting an inconsistent config reach the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub data_dir: PathBuf,
    wal_file: PathBuf,
    pub memtable_max_entries: usize,
    pub sstable_max_entries: usize,
    pub compaction_threshold: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./.lsmdata"),
            wal_file: PathBuf::from("wal.log"),
            memtable_max_entries: 30,
            sstable_max_entries: 30,
            compaction_threshold: 5,
        }
    }
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Absolute-or-relative path to the WAL file: relative paths are
    /// resolved against `data_dir`.
    pub fn wal_path(&self) -> PathBuf {
        if self.wal_file.is_absolute() {
            self.wal_file.clone()
        } else {
            self.data_dir.join(&self.wal_file)
        }
    }

    fn validate(&self) -> Result<()> {
        if self.memtable_max_entries == 0 {
            return Err(LsmError::InvalidArgument(
                "memtable_max_entries cannot be 0".to_string(),
            ));
        }
        if self.sstable_max_entries == 0 {
            return Err(LsmError::InvalidArgument(
                "sstable_max_entries cannot be 0".to_string(),
            ));
        }
        if self.compaction_threshold < 2 {
            return Err(LsmError::InvalidArgument(
                "compaction_threshold must be at least 2".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct EngineConfigBuilder {
    data_dir: Option<PathBuf>,
    wal_file: Option<PathBuf>,
    memtable_max_entries: Option<usize>,
    sstable_max_entries: Option<usize>,
    compaction_threshold: Option<usize>,
}

impl EngineConfigBuilder {
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(path.into());
        self
    }

    pub fn wal_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.wal_file = Some(path.into());
        self
    }

    pub fn memtable_max_entries(mut self, n: usize) -> Self {
        self.memtable_max_entries = Some(n);
        self
    }

    pub fn sstable_max_entries(mut self, n: usize) -> Self {
        self.sstable_max_entries = Some(n);
        self
    }

    pub fn compaction_threshold(mut self, n: usize) -> Self {
        self.compaction_threshold = Some(n);
        self
    }

    pub fn build(self) -> Result<EngineConfig> {
        let defaults = EngineConfig::default();
        let config = EngineConfig {
            data_dir: self.data_dir.unwrap_or(defaults.data_dir),
            wal_file: self.wal_file.unwrap_or(defaults.wal_file),
            memtable_max_entries: self
                .memtable_max_entries
                .unwrap_or(defaults.memtable_max_entries),
            sstable_max_entries: self
                .sstable_max_entries
                .unwrap_or(defaults.sstable_max_entries),
            compaction_threshold: self
                .compaction_threshold
                .unwrap_or(defaults.compaction_threshold),
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn wal_path_resolves_relative_to_data_dir() {
        let config = EngineConfig::builder()
            .data_dir("/tmp/store")
            .wal_file("wal.log")
            .build()
            .unwrap();
        assert_eq!(config.wal_path(), PathBuf::from("/tmp/store/wal.log"));
    }

    #[test]
    fn wal_path_absolute_is_kept_as_is() {
        let config = EngineConfig::builder()
            .data_dir("/tmp/store")
            .wal_file("/var/log/wal.log")
            .build()
            .unwrap();
        assert_eq!(config.wal_path(), PathBuf::from("/var/log/wal.log"));
    }

    #[test]
    fn zero_memtable_capacity_is_rejected() {
        let result = EngineConfig::builder().memtable_max_entries(0).build();
        assert!(matches!(result, Err(LsmError::InvalidArgument(_))));
    }

    #[test]
    fn compaction_threshold_below_two_is_rejected() {
        let result = EngineConfig::builder().compaction_threshold(1).build();
        assert!(matches!(result, Err(LsmError::InvalidArgument(_))));
    }
}
