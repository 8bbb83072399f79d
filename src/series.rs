use crate::error::PipelineError;
use crate::types::datatype::{Datatype, Table};
use crate::types::record::NormalizedRecord;
use chrono::NaiveDate;
use polars::prelude::*;
use std::path::Path;

/// A lazy polars view over the stored records of one or more stations.
///
/// Columns: `location`, `event_key`, `date` (Date), `datatype`, `station`
/// and `value` (raw stored value).
#[derive(Clone)]
pub struct StationSeries {
    pub frame: LazyFrame,
}

impl StationSeries {
    pub fn new(frame: LazyFrame) -> Self {
        Self { frame }
    }

    /// Builds a series from records. Dates that do not start with
    /// `YYYY-MM-DD` become null.
    pub fn from_records(records: &[NormalizedRecord]) -> Result<Self, PipelineError> {
        let dates: Vec<Option<NaiveDate>> = records
            .iter()
            .map(|r| NaiveDate::parse_from_str(r.day(), "%Y-%m-%d").ok())
            .collect();

        let df = df!(
            "location" => records.iter().map(|r| r.location.as_str()).collect::<Vec<_>>(),
            "event_key" => records.iter().map(|r| r.event_key.as_str()).collect::<Vec<_>>(),
            "date" => dates,
            "datatype" => records.iter().map(|r| r.datatype.tag()).collect::<Vec<_>>(),
            "station" => records.iter().map(|r| r.station.as_str()).collect::<Vec<_>>(),
            "value" => records.iter().map(|r| r.value).collect::<Vec<_>>(),
        )?;
        Ok(Self::new(df.lazy()))
    }

    pub fn filter(&self, predicate: Expr) -> StationSeries {
        StationSeries::new(self.frame.clone().filter(predicate))
    }

    /// Keeps observations between `start` and `end`, both inclusive.
    pub fn get_range(&self, start: NaiveDate, end: NaiveDate) -> StationSeries {
        self.filter(
            col("date")
                .cast(DataType::Date)
                .gt_eq(lit(start))
                .and(col("date").cast(DataType::Date).lt_eq(lit(end))),
        )
    }

    pub fn get_at(&self, date: NaiveDate) -> StationSeries {
        self.filter(col("date").eq(lit(date)))
    }

    pub fn for_datatype(&self, datatype: Datatype) -> StationSeries {
        self.filter(col("datatype").eq(lit(datatype.tag())))
    }

    pub fn for_table(&self, table: Table) -> StationSeries {
        let predicate = Datatype::ALL
            .into_iter()
            .filter(|d| d.table() == table)
            .map(|d| col("datatype").eq(lit(d.tag())))
            .reduce(|acc, expr| acc.or(expr))
            .unwrap_or_else(|| lit(false));
        self.filter(predicate)
    }

    /// Adds `reading` (value in display units) and `unit` columns.
    pub fn with_readings(&self) -> StationSeries {
        let is_temperature = col("datatype")
            .eq(lit(Datatype::Tmin.tag()))
            .or(col("datatype").eq(lit(Datatype::Tmax.tag())));

        StationSeries::new(self.frame.clone().with_columns([
            when(is_temperature.clone())
                .then(col("value") / lit(10.0))
                .otherwise(col("value"))
                .alias("reading"),
            when(is_temperature)
                .then(lit("deg C"))
                .otherwise(lit("mm"))
                .alias("unit"),
        ]))
    }

    pub fn collect(&self) -> Result<DataFrame, PipelineError> {
        Ok(self.frame.clone().collect()?)
    }

    /// Collects the series and writes it to `path` as Snappy-compressed
    /// parquet. Returns the number of rows written.
    pub async fn write_parquet(&self, path: &Path) -> Result<usize, PipelineError> {
        let frame = self.frame.clone();
        let path_buf = path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let mut df = frame.collect()?;
            let file = std::fs::File::create(&path_buf)
                .map_err(|e| PipelineError::ParquetWrite(path_buf.clone(), e))?;
            ParquetWriter::new(file)
                .with_compression(ParquetCompression::Snappy)
                .finish(&mut df)?;
            Ok::<usize, PipelineError>(df.height())
        })
        .await?
    }
}
