//! Defines the controlled vocabulary of NOAA datatypes collected by the pipeline
//! and the logical store tables they are routed into.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A GHCND datatype tag requested from the remote API.
///
/// The vocabulary is closed: every variant belongs to exactly one [`Table`],
/// and any tag outside of it is treated as unsupported by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Datatype {
    /// Snowfall in mm.
    Snow,
    /// Precipitation (rainfall) in mm.
    Prcp,
    /// Minimum temperature in tenths of a degree Celsius.
    Tmin,
    /// Maximum temperature in tenths of a degree Celsius.
    Tmax,
}

impl Datatype {
    /// Every datatype the fetcher requests, in request order.
    pub const ALL: [Datatype; 4] = [
        Datatype::Snow,
        Datatype::Prcp,
        Datatype::Tmin,
        Datatype::Tmax,
    ];

    /// The tag used by the remote API for this datatype.
    pub fn tag(&self) -> &'static str {
        match self {
            Datatype::Snow => "SNOW",
            Datatype::Prcp => "PRCP",
            Datatype::Tmin => "TMIN",
            Datatype::Tmax => "TMAX",
        }
    }

    /// Looks up a datatype by its API tag. Tags are matched exactly.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.tag() == tag)
    }

    /// The table that stores observations of this datatype.
    pub fn table(&self) -> Table {
        match self {
            Datatype::Snow | Datatype::Prcp => Table::Precipitation,
            Datatype::Tmin | Datatype::Tmax => Table::Temperature,
        }
    }

    /// Comma-joined tag list, as sent in the `datatypeid` request parameter.
    pub fn request_ids() -> String {
        Self::ALL
            .iter()
            .map(Datatype::tag)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for Datatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// A logical table in the key-value store.
///
/// Both tables share the same key layout: `location` is the partition key and
/// the event key is the sort key.
///
/// # Examples
///
/// ```
/// use weather_pipeline::Table;
///
/// assert_eq!(Table::Precipitation.to_string(), "Precipitation");
/// assert_eq!("temperature".parse::<Table>(), Ok(Table::Temperature));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Table {
    Precipitation,
    Temperature,
}

impl Table {
    pub const ALL: [Table; 2] = [Table::Precipitation, Table::Temperature];

    /// Store-side name of the table.
    pub fn name(&self) -> &'static str {
        match self {
            Table::Precipitation => "Precipitation",
            Table::Temperature => "Temperature",
        }
    }

    pub(crate) fn file_name(&self) -> String {
        format!("{}.bin", self.name().to_lowercase())
    }

    /// Converts a stored raw value into display units for this table.
    ///
    /// Precipitation and snowfall are stored in mm already. Temperatures are
    /// stored in tenths of a degree Celsius.
    pub fn display_value(&self, raw: f64) -> f64 {
        match self {
            Table::Precipitation => raw,
            Table::Temperature => raw / 10.0,
        }
    }

    /// Formats a stored raw value with its unit, e.g. `"5 mm"` or `"-1.5 deg C"`.
    pub fn format_value(&self, raw: f64) -> String {
        match self {
            Table::Precipitation => format!("{} mm", raw.trunc() as i64),
            Table::Temperature => format!("{} deg C", self.display_value(raw.trunc())),
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Error returned when a table name cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTable(pub String);

impl fmt::Display for UnknownTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown table '{}' (expected 'precipitation' or 'temperature')",
            self.0
        )
    }
}

impl std::error::Error for UnknownTable {}

impl FromStr for Table {
    type Err = UnknownTable;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Table::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownTable(s.to_string()))
    }
}
