use crate::batch::StreamBatcher;
use crate::classify::Classified;
use crate::observe::{noop, PipelineObserver};
use crate::store::error::StoreError;
use crate::store::KeyValueStore;
use crate::types::datatype::Table;
use crate::types::record::NormalizedRecord;
use log::info;
use std::sync::Arc;
use std::time::Duration;

/// Bulk writer for the precipitation and temperature tables.
///
/// Splits writes into chunks of the store's per-call limit and writes them in
/// order. The first failing chunk aborts the put; chunks written before it
/// stay written, and since writes are upserts the whole put can be retried.
pub struct WeatherPutter<S: KeyValueStore + ?Sized> {
    store: Arc<S>,
    write_timeout: Option<Duration>,
    observer: Arc<dyn PipelineObserver>,
}

impl<S: KeyValueStore + ?Sized> Clone for WeatherPutter<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            write_timeout: self.write_timeout,
            observer: Arc::clone(&self.observer),
        }
    }
}

impl<S: KeyValueStore + ?Sized> WeatherPutter<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            write_timeout: None,
            observer: noop(),
        }
    }

    /// Deadline applied to every store call.
    pub fn with_write_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Writes `records` to `table`. Returns the number of records written.
    pub async fn put(
        &self,
        table: Table,
        records: Vec<NormalizedRecord>,
    ) -> Result<usize, StoreError> {
        if let Some(record) = records.iter().find(|r| r.table() != table) {
            return Err(StoreError::TableMismatch {
                table,
                expected: record.table(),
                event_key: record.event_key.clone(),
            });
        }

        let total = records.len();
        let mut batcher = StreamBatcher::new(self.store.max_batch_write());
        for record in records {
            if let Some(chunk) = batcher.push(record) {
                self.write_chunk(table, chunk).await?;
            }
        }
        if let Some(chunk) = batcher.finish() {
            self.write_chunk(table, chunk).await?;
        }

        if total > 0 {
            info!("Put {} record(s) into {}", total, table);
        }
        Ok(total)
    }

    pub async fn put_precipitation(
        &self,
        records: Vec<NormalizedRecord>,
    ) -> Result<usize, StoreError> {
        self.put(Table::Precipitation, records).await
    }

    pub async fn put_temperature(
        &self,
        records: Vec<NormalizedRecord>,
    ) -> Result<usize, StoreError> {
        self.put(Table::Temperature, records).await
    }

    /// Writes both groups of a classification, precipitation first.
    pub async fn put_classified(&self, classified: Classified) -> Result<usize, StoreError> {
        let precipitation = self.put_precipitation(classified.precipitation).await?;
        let temperature = self.put_temperature(classified.temperature).await?;
        Ok(precipitation + temperature)
    }

    async fn write_chunk(
        &self,
        table: Table,
        chunk: Vec<NormalizedRecord>,
    ) -> Result<(), StoreError> {
        let size = chunk.len();
        let write = self.store.batch_write(table, chunk);
        match self.write_timeout {
            Some(timeout) => tokio::time::timeout(timeout, write)
                .await
                .map_err(|_| StoreError::WriteTimeout {
                    table,
                    size,
                    timeout,
                })??,
            None => write.await?,
        }
        self.observer.records_written(table, size);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observe::PipelineStats;
    use crate::store::memory::MemoryStore;
    use crate::store::{KeyCondition, QueryPage};
    use crate::types::datatype::Datatype;
    use crate::types::record::event_key;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn record(day: u32, datatype: Datatype, value: f64) -> NormalizedRecord {
        let date = format!("2021-10-{day:02}");
        NormalizedRecord {
            location: "Annapolis, MD US".to_string(),
            event_key: event_key(&date, datatype, "S1"),
            date,
            datatype,
            station: "S1".to_string(),
            value,
        }
    }

    async fn stored(store: &MemoryStore, table: Table) -> Result<Vec<NormalizedRecord>, StoreError> {
        let page = store
            .query(table, &KeyCondition::partition("Annapolis, MD US"), None)
            .await?;
        Ok(page.items)
    }

    /// Fails every call after the first `succeed` ones.
    struct FailingStore {
        calls: AtomicUsize,
        succeed: usize,
        delay: Option<Duration>,
    }

    impl FailingStore {
        fn new(succeed: usize) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                succeed,
                delay: None,
            }
        }
    }

    #[async_trait]
    impl KeyValueStore for FailingStore {
        fn max_batch_write(&self) -> usize {
            2
        }

        async fn batch_write(
            &self,
            table: Table,
            items: Vec<NormalizedRecord>,
        ) -> Result<(), StoreError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call >= self.succeed {
                return Err(StoreError::InvalidKey {
                    table,
                    key: "partition",
                    event_key: items[0].event_key.clone(),
                });
            }
            Ok(())
        }

        async fn query(
            &self,
            _table: Table,
            _condition: &KeyCondition,
            _exclusive_start_key: Option<String>,
        ) -> Result<QueryPage, StoreError> {
            Ok(QueryPage::default())
        }
    }

    #[tokio::test]
    async fn test_put_twice_is_idempotent() -> Result<(), StoreError> {
        let store = Arc::new(MemoryStore::new());
        let putter = WeatherPutter::new(Arc::clone(&store));
        let records = vec![
            record(1, Datatype::Prcp, 5.0),
            record(1, Datatype::Snow, 0.0),
            record(2, Datatype::Prcp, 3.0),
        ];

        putter.put_precipitation(records.clone()).await?;
        let once = stored(&store, Table::Precipitation).await?;
        putter.put_precipitation(records).await?;
        let twice = stored(&store, Table::Precipitation).await?;

        assert_eq!(once.len(), 3);
        assert_eq!(once, twice);
        Ok(())
    }

    #[tokio::test]
    async fn test_put_chunks_by_store_limit() -> Result<(), StoreError> {
        let store = Arc::new(MemoryStore::new().with_max_batch_write(25));
        let stats = Arc::new(PipelineStats::new());
        let putter = WeatherPutter::new(Arc::clone(&store)).with_observer(stats.clone());

        let records: Vec<_> = (1..=30)
            .flat_map(|day| [record(day, Datatype::Tmin, -10.0), record(day, Datatype::Tmax, 100.0)])
            .collect();
        let written = putter.put_temperature(records).await?;

        assert_eq!(written, 60);
        assert_eq!(store.len(Table::Temperature).await, 60);
        assert_eq!(stats.snapshot().temperature_written, 60);
        Ok(())
    }

    #[tokio::test]
    async fn test_put_fails_fast() {
        let store = Arc::new(FailingStore::new(1));
        let putter = WeatherPutter::new(Arc::clone(&store));
        let records: Vec<_> = (1..=7).map(|day| record(day, Datatype::Prcp, 1.0)).collect();

        let result = putter.put_precipitation(records).await;
        assert!(matches!(result, Err(StoreError::InvalidKey { .. })));
        // One successful call, one failing call, nothing after.
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_put_rejects_wrong_table_before_writing() {
        let store = Arc::new(FailingStore::new(usize::MAX));
        let putter = WeatherPutter::new(Arc::clone(&store));

        let result = putter
            .put_precipitation(vec![
                record(1, Datatype::Prcp, 1.0),
                record(1, Datatype::Tmax, 1.0),
            ])
            .await;
        assert!(matches!(
            result,
            Err(StoreError::TableMismatch {
                table: Table::Precipitation,
                expected: Table::Temperature,
                ..
            })
        ));
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_put_classified() -> Result<(), StoreError> {
        let store = Arc::new(MemoryStore::new());
        let putter = WeatherPutter::new(Arc::clone(&store));
        let classified = Classified {
            precipitation: vec![record(1, Datatype::Prcp, 5.0)],
            temperature: vec![record(1, Datatype::Tmin, 3.0), record(1, Datatype::Tmax, 9.0)],
            skipped: 4,
        };

        assert_eq!(putter.put_classified(classified).await?, 3);
        assert_eq!(store.len(Table::Precipitation).await, 1);
        assert_eq!(store.len(Table::Temperature).await, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_put_empty_makes_no_calls() -> Result<(), StoreError> {
        let store = Arc::new(FailingStore::new(0));
        let putter = WeatherPutter::new(Arc::clone(&store));
        assert_eq!(putter.put_temperature(Vec::new()).await?, 0);
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_write_timeout_is_retryable() {
        let store = Arc::new(FailingStore {
            delay: Some(Duration::from_secs(5)),
            ..FailingStore::new(usize::MAX)
        });
        let putter = WeatherPutter::new(store).with_write_timeout(Some(Duration::from_millis(10)));

        let result = putter
            .put_precipitation(vec![record(1, Datatype::Prcp, 1.0)])
            .await;
        match result {
            Err(e @ StoreError::WriteTimeout { size: 1, .. }) => assert!(e.is_retryable()),
            other => panic!("expected a write timeout, got {other:?}"),
        }
    }
}
