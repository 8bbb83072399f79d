use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A station entry from the remote stations endpoint.
///
/// Only the fields needed to resolve a station id to a readable location are
/// kept; everything else in the response is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationEntry {
    /// Station identifier, matching [`crate::RawRecord::station`].
    pub id: String,
    /// Human readable name, e.g. `"ANNAPOLIS NAVAL ACADEMY, MD US"`.
    pub name: String,
}

/// Builds the station id → location name lookup used to annotate raw records.
///
/// Later entries win when the same id appears more than once.
pub fn location_lookup(entries: impl IntoIterator<Item = StationEntry>) -> HashMap<String, String> {
    entries.into_iter().map(|e| (e.id, e.name)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_lookup() {
        let json = r#"[
            {"elevation": 12.2, "mindate": "1893-01-01", "maxdate": "2021-10-30", "latitude": 38.98, "name": "ANNAPOLIS NAVAL ACADEMY, MD US", "datacoverage": 0.98, "id": "GHCND:USC00180193", "elevationUnit": "METERS", "longitude": -76.48},
            {"id": "GHCND:US1MDAA0001", "name": "ARNOLD 1.4 NNE, MD US"}
        ]"#;
        let entries: Vec<StationEntry> = serde_json::from_str(json).unwrap();
        let lookup = location_lookup(entries);

        assert_eq!(lookup.len(), 2);
        assert_eq!(
            lookup.get("GHCND:USC00180193").map(String::as_str),
            Some("ANNAPOLIS NAVAL ACADEMY, MD US")
        );
    }
}
