use crate::types::datatype::Table;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Batch of {size} items exceeds the per-call limit of {max} for table {table}")]
    BatchTooLarge { table: Table, size: usize, max: usize },

    #[error("Item for table {table} has an empty {key} key (event key '{event_key}')")]
    InvalidKey {
        table: Table,
        key: &'static str,
        event_key: String,
    },

    #[error("Record '{event_key}' belongs to table {expected}, not {table}")]
    TableMismatch {
        table: Table,
        expected: Table,
        event_key: String,
    },

    #[error("Write of {size} items to table {table} timed out after {timeout:?}")]
    WriteTimeout {
        table: Table,
        size: usize,
        timeout: Duration,
    },

    #[error("Query on table {table} timed out after {timeout:?}")]
    QueryTimeout { table: Table, timeout: Duration },

    #[error("Failed to read table file '{0}'")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("Failed to write table file '{0}'")]
    Write(PathBuf, #[source] std::io::Error),

    #[error("Failed to decode table data from '{0}'")]
    Decode(PathBuf, #[source] Box<bincode::error::DecodeError>),

    #[error("Failed to encode table data")]
    Encode(#[source] Box<bincode::error::EncodeError>),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl StoreError {
    /// Whether retrying the failed call may succeed. Writes are upserts, so a
    /// retried batch never duplicates records.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::WriteTimeout { .. }
                | StoreError::QueryTimeout { .. }
                | StoreError::Write(..)
                | StoreError::Read(..)
        )
    }
}
