use crate::error::PipelineError;
use crate::series::StationSeries;
use crate::store::error::StoreError;
use crate::store::{KeyCondition, KeyValueStore, QueryPage};
use crate::types::datatype::Table;
use crate::types::record::NormalizedRecord;
use futures_util::{stream, Stream, TryStreamExt};
use log::debug;
use std::sync::Arc;
use std::time::Duration;

enum QueryState {
    Start,
    Continue(String),
    Done,
}

/// Reads every record of a location, following store pagination.
pub struct WeatherGetter<S: KeyValueStore + ?Sized> {
    store: Arc<S>,
    query_timeout: Option<Duration>,
}

impl<S: KeyValueStore + ?Sized> WeatherGetter<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            query_timeout: None,
        }
    }

    /// Deadline applied to every store query call.
    pub fn with_query_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Streams the records of `location` in `table` in event key order.
    ///
    /// With a `date_prefix` (e.g. `"2021-10"` or `"2021-10-01"`) only records
    /// whose event key starts with it are returned. Pages are requested as
    /// the stream is polled.
    pub fn get<'a>(
        &'a self,
        table: Table,
        location: &str,
        date_prefix: Option<&str>,
    ) -> impl Stream<Item = Result<NormalizedRecord, StoreError>> + 'a {
        let mut condition = KeyCondition::partition(location);
        if let Some(prefix) = date_prefix {
            condition = condition.with_sort_key_prefix(prefix);
        }

        stream::try_unfold(QueryState::Start, move |state| {
            let condition = condition.clone();
            async move {
                let start_key = match state {
                    QueryState::Done => return Ok(None),
                    QueryState::Start => None,
                    QueryState::Continue(key) => Some(key),
                };
                let page = self.query_page(table, &condition, start_key).await?;
                let next = match page.last_evaluated_key {
                    Some(key) => QueryState::Continue(key),
                    None => QueryState::Done,
                };
                Ok::<_, StoreError>(Some((page.items, next)))
            }
        })
        .map_ok(|items| stream::iter(items.into_iter().map(Ok::<_, StoreError>)))
        .try_flatten()
    }

    pub fn get_precipitation<'a>(
        &'a self,
        location: &str,
        date_prefix: Option<&str>,
    ) -> impl Stream<Item = Result<NormalizedRecord, StoreError>> + 'a {
        self.get(Table::Precipitation, location, date_prefix)
    }

    pub fn get_temperature<'a>(
        &'a self,
        location: &str,
        date_prefix: Option<&str>,
    ) -> impl Stream<Item = Result<NormalizedRecord, StoreError>> + 'a {
        self.get(Table::Temperature, location, date_prefix)
    }

    /// Collects the matching records into a [`StationSeries`].
    pub async fn series(
        &self,
        table: Table,
        location: &str,
        date_prefix: Option<&str>,
    ) -> Result<StationSeries, PipelineError> {
        let records: Vec<NormalizedRecord> =
            self.get(table, location, date_prefix).try_collect().await?;
        StationSeries::from_records(&records)
    }

    async fn query_page(
        &self,
        table: Table,
        condition: &KeyCondition,
        start_key: Option<String>,
    ) -> Result<QueryPage, StoreError> {
        let query = self.store.query(table, condition, start_key);
        let page = match self.query_timeout {
            Some(timeout) => tokio::time::timeout(timeout, query)
                .await
                .map_err(|_| StoreError::QueryTimeout { table, timeout })??,
            None => query.await?,
        };
        debug!(
            "Query on {} for '{}' returned {} item(s)",
            table,
            condition.partition_key,
            page.items.len()
        );
        Ok(page)
    }
}
