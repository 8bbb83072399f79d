//! Partitioned key-value storage for normalized records.
//!
//! Every table is keyed by `(location, event_key)`: the location is the
//! partition key and the event key the sort key. Writes are upserts.
//! [`WeatherPutter`](putter::WeatherPutter) and
//! [`WeatherGetter`](getter::WeatherGetter) sit on top of any
//! [`KeyValueStore`] and hide its batch and page limits.

pub mod error;
pub mod file;
pub mod getter;
pub mod memory;
pub mod putter;
mod table;

use crate::store::error::StoreError;
use crate::types::datatype::Table;
use crate::types::record::NormalizedRecord;
use async_trait::async_trait;

/// Per-call item limit of the bundled stores, the same as DynamoDB's
/// `BatchWriteItem`.
pub const DEFAULT_MAX_BATCH_WRITE: usize = 25;

/// Maximum number of items returned by one query call of the bundled stores.
pub const DEFAULT_QUERY_PAGE_SIZE: usize = 1000;

/// Key condition of a query: partition key equality, optionally combined
/// with a `begins_with` condition on the sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCondition {
    pub partition_key: String,
    pub sort_key_prefix: Option<String>,
}

impl KeyCondition {
    pub fn partition(partition_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            sort_key_prefix: None,
        }
    }

    pub fn with_sort_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.sort_key_prefix = Some(prefix.into());
        self
    }
}

/// One page of query results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPage {
    /// Matching items in ascending sort key order.
    pub items: Vec<NormalizedRecord>,
    /// Sort key of the last returned item when more results remain.
    pub last_evaluated_key: Option<String>,
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Maximum number of items accepted by one [`KeyValueStore::batch_write`] call.
    fn max_batch_write(&self) -> usize;

    /// Upserts `items` into `table`.
    ///
    /// A call either applies every item or none of them, also when its
    /// future is dropped before completing.
    async fn batch_write(
        &self,
        table: Table,
        items: Vec<NormalizedRecord>,
    ) -> Result<(), StoreError>;

    /// Returns the page of items matching `condition` that follows
    /// `exclusive_start_key` in sort key order.
    async fn query(
        &self,
        table: Table,
        condition: &KeyCondition,
        exclusive_start_key: Option<String>,
    ) -> Result<QueryPage, StoreError>;
}
