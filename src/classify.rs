//! Routes raw observations into the precipitation and temperature groups.

use crate::observe::{noop, PipelineObserver};
use crate::types::datatype::{Datatype, Table};
use crate::types::record::{NormalizedRecord, RawRecord};
use log::warn;
use std::sync::Arc;

/// Outcome of classifying a single raw record.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Precipitation(NormalizedRecord),
    Temperature(NormalizedRecord),
    /// The record's datatype tag is not in the known vocabulary.
    Unsupported(RawRecord),
}

/// Classifies and normalizes one record.
pub fn classify_record(record: RawRecord) -> Classification {
    let Some(datatype) = Datatype::from_tag(&record.datatype) else {
        return Classification::Unsupported(record);
    };
    let normalized = record.normalize(datatype);
    match datatype.table() {
        Table::Precipitation => Classification::Precipitation(normalized),
        Table::Temperature => Classification::Temperature(normalized),
    }
}

/// Records grouped by destination table, in input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classified {
    pub precipitation: Vec<NormalizedRecord>,
    pub temperature: Vec<NormalizedRecord>,
    /// Number of records dropped because of an unsupported datatype.
    pub skipped: usize,
}

impl Classified {
    /// The group destined for `table`.
    pub fn group(&self, table: Table) -> &[NormalizedRecord] {
        match table {
            Table::Precipitation => &self.precipitation,
            Table::Temperature => &self.temperature,
        }
    }

    pub fn len(&self) -> usize {
        self.precipitation.len() + self.temperature.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Splits raw records into typed groups, skipping unsupported datatypes.
///
/// Unsupported records are logged as warnings and reported to the observer;
/// they never fail classification.
#[derive(Clone)]
pub struct RecordClassifier {
    observer: Arc<dyn PipelineObserver>,
}

impl Default for RecordClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordClassifier {
    pub fn new() -> Self {
        Self { observer: noop() }
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Classifies one record, reporting it if it has to be skipped.
    ///
    /// Returns the destination table and normalized record, or `None` for a
    /// skipped record.
    pub fn route(&self, record: RawRecord) -> Option<(Table, NormalizedRecord)> {
        match classify_record(record) {
            Classification::Precipitation(r) => Some((Table::Precipitation, r)),
            Classification::Temperature(r) => Some((Table::Temperature, r)),
            Classification::Unsupported(r) => {
                warn!(
                    "Skipping unsupported datatype {} (station {}, date {})",
                    r.datatype, r.station, r.date
                );
                self.observer.record_skipped(&r.datatype);
                None
            }
        }
    }

    /// Partitions `records` into precipitation and temperature groups.
    pub fn classify<I>(&self, records: I) -> Classified
    where
        I: IntoIterator<Item = RawRecord>,
    {
        let mut classified = Classified::default();
        for record in records {
            match self.route(record) {
                Some((Table::Precipitation, r)) => classified.precipitation.push(r),
                Some((Table::Temperature, r)) => classified.temperature.push(r),
                None => classified.skipped += 1,
            }
        }
        classified
    }
}

/// Splits already normalized records by table, keeping their relative order.
pub fn group_by_table<I>(records: I) -> Classified
where
    I: IntoIterator<Item = NormalizedRecord>,
{
    let mut classified = Classified::default();
    for record in records {
        match record.table() {
            Table::Precipitation => classified.precipitation.push(record),
            Table::Temperature => classified.temperature.push(record),
        }
    }
    classified
}
