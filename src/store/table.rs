use crate::store::error::StoreError;
use crate::store::{KeyCondition, QueryPage};
use crate::types::datatype::Table;
use crate::types::record::NormalizedRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Bound;

/// Contents of one table: partition key -> sort key -> item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct TableData {
    partitions: BTreeMap<String, BTreeMap<String, NormalizedRecord>>,
}

impl TableData {
    /// Checks a write batch against the per-call limit and the key schema.
    pub fn validate(table: Table, items: &[NormalizedRecord], max: usize) -> Result<(), StoreError> {
        if items.len() > max {
            return Err(StoreError::BatchTooLarge {
                table,
                size: items.len(),
                max,
            });
        }
        for item in items {
            if item.table() != table {
                return Err(StoreError::TableMismatch {
                    table,
                    expected: item.table(),
                    event_key: item.event_key.clone(),
                });
            }
            let missing = if item.location.is_empty() {
                Some("partition")
            } else if item.event_key.is_empty() {
                Some("sort")
            } else {
                None
            };
            if let Some(key) = missing {
                return Err(StoreError::InvalidKey {
                    table,
                    key,
                    event_key: item.event_key.clone(),
                });
            }
        }
        Ok(())
    }

    /// Inserts or replaces every item. Callers validate first.
    pub fn upsert_all(&mut self, items: Vec<NormalizedRecord>) {
        for item in items {
            self.partitions
                .entry(item.location.clone())
                .or_default()
                .insert(item.event_key.clone(), item);
        }
    }

    pub fn len(&self) -> usize {
        self.partitions.values().map(BTreeMap::len).sum()
    }

    pub fn query_page(
        &self,
        condition: &KeyCondition,
        exclusive_start_key: Option<&str>,
        page_size: usize,
    ) -> QueryPage {
        let Some(partition) = self.partitions.get(&condition.partition_key) else {
            return QueryPage::default();
        };

        let lower = match exclusive_start_key {
            Some(key) => Bound::Excluded(key),
            None => Bound::Unbounded,
        };
        let prefix = condition.sort_key_prefix.as_deref().unwrap_or("");
        let page_size = page_size.max(1);

        // Keys sharing a prefix are contiguous in sort order.
        let mut matching = partition
            .range::<str, _>((lower, Bound::Unbounded))
            .skip_while(|(key, _)| key.as_str() < prefix)
            .take_while(|(key, _)| key.starts_with(prefix));

        let items: Vec<NormalizedRecord> = matching
            .by_ref()
            .take(page_size)
            .map(|(_, item)| item.clone())
            .collect();
        let has_more = matching.next().is_some();

        QueryPage {
            last_evaluated_key: if has_more {
                items.last().map(|item| item.event_key.clone())
            } else {
                None
            },
            items,
        }
    }
}
