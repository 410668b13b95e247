use std::io;
use thiserror::Error;

/// Errors surfaced by the storage engine.
///
/// `NotFound` is deliberately absent: point reads, `update`, and `delete`
/// report absence as `Option`/`bool`, never as an `Err`.
#[derive(Error, Debug)]
pub enum LsmError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("lock poisoned: {0}")]
    LockPoisoned(&'static str),

    #[error("compaction failed: {0}")]
    CompactionFailed(String),
}

pub type Result<T> = std::result::Result<T, LsmError>;
