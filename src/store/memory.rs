use crate::store::error::StoreError;
use crate::store::table::TableData;
use crate::store::{
    KeyCondition, KeyValueStore, QueryPage, DEFAULT_MAX_BATCH_WRITE, DEFAULT_QUERY_PAGE_SIZE,
};
use crate::types::datatype::Table;
use crate::types::record::NormalizedRecord;
use async_trait::async_trait;
use log::debug;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// A [`KeyValueStore`] kept entirely in memory.
#[derive(Debug)]
pub struct MemoryStore {
    tables: RwLock<HashMap<Table, TableData>>,
    max_batch_write: usize,
    query_page_size: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            max_batch_write: DEFAULT_MAX_BATCH_WRITE,
            query_page_size: DEFAULT_QUERY_PAGE_SIZE,
        }
    }

    pub fn with_max_batch_write(mut self, max: usize) -> Self {
        self.max_batch_write = max.max(1);
        self
    }

    pub fn with_query_page_size(mut self, size: usize) -> Self {
        self.query_page_size = size.max(1);
        self
    }

    /// Number of items stored in `table`.
    pub async fn len(&self, table: Table) -> usize {
        self.tables
            .read()
            .await
            .get(&table)
            .map_or(0, TableData::len)
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    fn max_batch_write(&self) -> usize {
        self.max_batch_write
    }

    async fn batch_write(
        &self,
        table: Table,
        items: Vec<NormalizedRecord>,
    ) -> Result<(), StoreError> {
        TableData::validate(table, &items, self.max_batch_write)?;
        let count = items.len();

        let mut tables = self.tables.write().await;
        let data = tables.entry(table).or_default();
        data.upsert_all(items);
        debug!("Wrote {} item(s) to {}, {} total", count, table, data.len());
        Ok(())
    }

    async fn query(
        &self,
        table: Table,
        condition: &KeyCondition,
        exclusive_start_key: Option<String>,
    ) -> Result<QueryPage, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(&table)
            .map(|data| {
                data.query_page(
                    condition,
                    exclusive_start_key.as_deref(),
                    self.query_page_size,
                )
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::datatype::Datatype;
    use crate::types::record::event_key;

    fn item(date: &str, datatype: Datatype) -> NormalizedRecord {
        NormalizedRecord {
            location: "Annapolis, MD US".to_string(),
            event_key: event_key(date, datatype, "S1"),
            date: date.to_string(),
            datatype,
            station: "S1".to_string(),
            value: 1.0,
        }
    }

    #[tokio::test]
    async fn test_tables_are_separate() -> Result<(), StoreError> {
        let store = MemoryStore::new();
        store
            .batch_write(Table::Precipitation, vec![item("2021-10-01", Datatype::Prcp)])
            .await?;
        store
            .batch_write(Table::Temperature, vec![item("2021-10-01", Datatype::Tmin)])
            .await?;

        assert_eq!(store.len(Table::Precipitation).await, 1);
        assert_eq!(store.len(Table::Temperature).await, 1);

        let page = store
            .query(
                Table::Temperature,
                &KeyCondition::partition("Annapolis, MD US"),
                None,
            )
            .await?;
        assert_eq!(page.items, vec![item("2021-10-01", Datatype::Tmin)]);
        Ok(())
    }

    #[tokio::test]
    async fn test_rejected_batch_writes_nothing() {
        let store = MemoryStore::new().with_max_batch_write(2);
        let result = store
            .batch_write(
                Table::Precipitation,
                vec![
                    item("2021-10-01", Datatype::Prcp),
                    item("2021-10-01", Datatype::Tmax),
                ],
            )
            .await;
        assert!(matches!(result, Err(StoreError::TableMismatch { .. })));
        assert_eq!(store.len(Table::Precipitation).await, 0);

        let result = store
            .batch_write(
                Table::Precipitation,
                vec![item("2021-10-01", Datatype::Prcp); 3],
            )
            .await;
        assert!(matches!(result, Err(StoreError::BatchTooLarge { .. })));
        assert_eq!(store.len(Table::Precipitation).await, 0);
    }

    #[tokio::test]
    async fn test_query_empty_table() -> Result<(), StoreError> {
        let store = MemoryStore::new();
        let page = store
            .query(Table::Precipitation, &KeyCondition::partition("x"), None)
            .await?;
        assert_eq!(page, QueryPage::default());
        Ok(())
    }
}
