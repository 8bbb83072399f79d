//! Fetching raw observations from the remote paged API.

pub mod error;
pub mod noaa_client;
pub mod paginate;

use crate::fetch::error::FetchError;
use crate::types::record::RawRecord;
use async_trait::async_trait;
use chrono::NaiveDate;
use futures_util::stream::BoxStream;
use std::collections::HashMap;

/// Where the producer gets its observations from.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Station id to human readable location name.
    async fn locations(&self) -> Result<HashMap<String, String>, FetchError>;

    /// Every observation between `start` and `end`, both inclusive.
    fn records(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> BoxStream<'_, Result<RawRecord, FetchError>>;
}
