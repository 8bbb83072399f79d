//! Record types flowing through the pipeline: raw observations as returned by
//! the remote API, and the normalized form stored in the key-value store.

use crate::types::datatype::{Datatype, Table};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Location name used when a station id has no entry in the station lookup.
pub const UNKNOWN_LOCATION: &str = "UNKNOWN LOCATION";

/// Separator between the components of an event key.
///
/// The separator is not escaped. Dates, datatype tags and station ids coming
/// from upstream must not contain it.
pub const EVENT_KEY_DELIMITER: char = '#';

/// A single observation as returned by the remote weather endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Station identifier, e.g. `"GHCND:US1MDAA0001"`.
    pub station: String,
    /// ISO-8601 date (or datetime) of the observation.
    pub date: String,
    /// Datatype tag, e.g. `"PRCP"`. Not guaranteed to be in the known vocabulary.
    pub datatype: String,
    /// Observed value. Unit depends on the datatype.
    pub value: f64,
    /// Human readable station location, attached after fetching.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl RawRecord {
    /// Resolves and attaches the location name for this record's station.
    ///
    /// Stations missing from `locations` get [`UNKNOWN_LOCATION`].
    pub fn attach_location(&mut self, locations: &HashMap<String, String>) {
        let name = locations
            .get(&self.station)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_LOCATION);
        self.location = Some(name.to_string());
    }

    /// Builds the normalized form of this record for a known datatype.
    pub fn normalize(self, datatype: Datatype) -> NormalizedRecord {
        NormalizedRecord {
            location: self
                .location
                .unwrap_or_else(|| UNKNOWN_LOCATION.to_string()),
            event_key: event_key(&self.date, datatype, &self.station),
            date: self.date,
            datatype,
            station: self.station,
            value: self.value,
        }
    }
}

/// An observation in the shape persisted to the store.
///
/// `location` is the partition key and `event_key` the sort key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedRecord {
    pub location: String,
    pub event_key: String,
    pub date: String,
    pub datatype: Datatype,
    pub station: String,
    pub value: f64,
}

impl NormalizedRecord {
    /// The table this record belongs to.
    pub fn table(&self) -> Table {
        self.datatype.table()
    }

    /// The `(partition key, sort key)` pair identifying this record.
    pub fn key(&self) -> (&str, &str) {
        (&self.location, &self.event_key)
    }

    /// Date component of the observation without any time suffix.
    pub fn day(&self) -> &str {
        self.date.get(..10).unwrap_or(&self.date)
    }
}

/// Builds the composite sort key `date#DATATYPE#station`.
///
/// Keys are prefixed by date so that the store's lexicographic key order is
/// chronological first.
///
/// # Examples
///
/// ```
/// use weather_pipeline::{event_key, Datatype};
///
/// assert_eq!(event_key("2021-10-01", Datatype::Prcp, "S1"), "2021-10-01#PRCP#S1");
/// ```
pub fn event_key(date: &str, datatype: Datatype, station: &str) -> String {
    format!(
        "{date}{d}{tag}{d}{station}",
        d = EVENT_KEY_DELIMITER,
        tag = datatype.tag()
    )
}
