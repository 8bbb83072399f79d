use crate::fetch::error::FetchError;
use crate::store::error::StoreError;
use crate::stream::error::StreamError;
use chrono::NaiveDate;
use polars::prelude::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Failed to build or evaluate the station series")]
    Series(#[from] PolarsError),

    #[error("Failed to write parquet file '{0}'")]
    ParquetWrite(PathBuf, #[source] std::io::Error),

    #[error("Missing configuration: {0}")]
    MissingConfig(String),

    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("Failed to determine the data directory for the store")]
    StoreDirResolution,

    #[error("Failed to create store directory '{0}'")]
    StoreDirCreation(PathBuf, #[source] std::io::Error),

    #[error("Pipeline task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl PipelineError {
    /// Whether re-running the failed operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Fetch(e) => e.is_retryable(),
            PipelineError::Store(e) => e.is_retryable(),
            _ => false,
        }
    }
}
