//! Station, sub-location and equipment compatibility tables
//!
//! Every station profile lists the sub-locations valid there, the
//! appliances it offers, its kitchen side and its top-level grouping.
//! Equipment offered at exactly one station is *unique* (the station can
//! be inferred); equipment offered at several is *shared* (the station
//! must be given explicitly).

use crate::models::{Location, SubLocation};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Station id the final window shelf lives at unless configured otherwise
pub const DEFAULT_EXPO_STATION: &str = "expo";

/// Static description of one station
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationProfile {
    /// Kitchen side: hot_side, cold_side, expo or vending
    #[serde(default = "default_side")]
    pub side: String,

    /// Top-level area used by bounce detection; falls back to the side
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grouping: Option<String>,

    #[serde(default)]
    pub sub_locations: Vec<SubLocation>,

    #[serde(default)]
    pub equipment: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_sub_location: Option<SubLocation>,
}

fn default_side() -> String {
    crate::config::scoring::DEFAULT_SIDE.to_string()
}

impl StationProfile {
    pub fn new(side: &str, grouping: &str, sub_locations: &[SubLocation], equipment: &[&str]) -> Self {
        Self {
            side: side.to_string(),
            grouping: Some(grouping.to_string()),
            sub_locations: sub_locations.to_vec(),
            equipment: equipment.iter().map(|e| e.to_string()).collect(),
            default_sub_location: None,
        }
    }

    pub fn with_default_sub_location(mut self, sub: SubLocation) -> Self {
        self.default_sub_location = Some(sub);
        self
    }

    pub fn grouping(&self) -> &str {
        self.grouping.as_deref().unwrap_or(&self.side)
    }

    pub fn allows(&self, sub: SubLocation) -> bool {
        self.sub_locations.contains(&sub)
    }

    pub fn offers(&self, equipment: &str) -> bool {
        self.equipment.iter().any(|e| e == equipment)
    }

    /// Configured default, else work surface when valid, else the first listed
    pub fn default_sub_location(&self) -> Option<SubLocation> {
        if self.default_sub_location.is_some() {
            return self.default_sub_location;
        }
        if self.allows(SubLocation::WorkSurface) {
            return Some(SubLocation::WorkSurface);
        }
        self.sub_locations.first().copied()
    }
}

/// Station-level compatibility tables for one kitchen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityTables {
    #[serde(default = "default_expo_station")]
    pub expo_station: String,

    #[serde(default)]
    pub stations: BTreeMap<String, StationProfile>,
}

fn default_expo_station() -> String {
    DEFAULT_EXPO_STATION.to_string()
}

impl Default for CompatibilityTables {
    /// Reference kitchen: a commissary, a prep room, two cold-line
    /// stations, four hot-line stations, expo and a vending window.
    fn default() -> Self {
        use SubLocation::*;

        let cold_line = [WorkSurface, ColdStorage, ColdRail, Equipment];
        let stations = [
            (
                "commissary",
                StationProfile::new(
                    "cold_side",
                    "commissary",
                    &[WorkSurface, ColdStorage, DryStorage, Equipment],
                    &["kettle"],
                ),
            ),
            (
                "prep",
                StationProfile::new(
                    "cold_side",
                    "back_of_house",
                    &[WorkSurface, ColdStorage, DryStorage],
                    &[],
                ),
            ),
            (
                "garnish",
                StationProfile::new("cold_side", "cold_line", &cold_line, &["microwave"]),
            ),
            (
                "speed_line",
                StationProfile::new("cold_side", "cold_line", &cold_line, &["microwave"]),
            ),
            (
                "toaster",
                StationProfile::new(
                    "hot_side",
                    "hot_line",
                    &[Equipment, WorkSurface],
                    &["conveyor_toaster", "salamander"],
                ),
            ),
            (
                "turbo",
                StationProfile::new(
                    "hot_side",
                    "hot_line",
                    &[Equipment, WorkSurface, HotHold],
                    &["turbo_oven", "salamander"],
                ),
            ),
            (
                "fryer",
                StationProfile::new(
                    "hot_side",
                    "hot_line",
                    &[Equipment, WorkSurface, HotHold],
                    &["fryer"],
                ),
            ),
            (
                "waterbath",
                StationProfile::new(
                    "hot_side",
                    "hot_line",
                    &[Equipment, HotHold, WorkSurface],
                    &["waterbath"],
                ),
            ),
            (
                "expo",
                StationProfile::new(
                    "expo",
                    "expo",
                    &[WorkSurface, WindowShelf, Packaging, DryStorage],
                    &[],
                ),
            ),
            (
                "vending",
                StationProfile::new("vending", "vending", &[WindowShelf, DryStorage], &[])
                    .with_default_sub_location(WindowShelf),
            ),
        ];

        Self {
            expo_station: default_expo_station(),
            stations: stations
                .into_iter()
                .map(|(id, profile)| (id.to_string(), profile))
                .collect(),
        }
    }
}

impl CompatibilityTables {
    pub fn station(&self, station_id: &str) -> Option<&StationProfile> {
        self.stations.get(station_id)
    }

    pub fn is_known_station(&self, station_id: &str) -> bool {
        self.stations.contains_key(station_id)
    }

    /// Equipment offered by at least one station
    pub fn is_known_equipment(&self, equipment_id: &str) -> bool {
        self.stations.values().any(|s| s.offers(equipment_id))
    }

    /// Stations offering an appliance, in id order
    pub fn stations_for_equipment(&self, equipment_id: &str) -> Vec<&str> {
        self.stations
            .iter()
            .filter(|(_, s)| s.offers(equipment_id))
            .map(|(id, _)| id.as_str())
            .collect()
    }

    pub fn is_unique_equipment(&self, equipment_id: &str) -> bool {
        self.stations_for_equipment(equipment_id).len() == 1
    }

    pub fn is_shared_equipment(&self, equipment_id: &str) -> bool {
        self.stations_for_equipment(equipment_id).len() > 1
    }

    /// The only station offering an appliance, when there is exactly one
    pub fn station_for_unique_equipment(&self, equipment_id: &str) -> Option<&str> {
        match self.stations_for_equipment(equipment_id).as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }

    /// Whether `station` offers `equipment`
    pub fn equipment_available(&self, station_id: &str, equipment_id: &str) -> bool {
        self.station(station_id)
            .is_some_and(|s| s.offers(equipment_id))
    }

    /// Whether the sub-location is valid at the station; unknown stations are never valid
    pub fn is_valid(&self, station_id: &str, sub: SubLocation) -> bool {
        self.station(station_id).is_some_and(|s| s.allows(sub))
    }

    pub fn stations_for_sub_location(&self, sub: SubLocation) -> Vec<&str> {
        self.stations
            .iter()
            .filter(|(_, s)| s.allows(sub))
            .map(|(id, _)| id.as_str())
            .collect()
    }

    pub fn default_sub_location(&self, station_id: &str) -> Option<SubLocation> {
        self.station(station_id).and_then(|s| s.default_sub_location())
    }

    /// Kitchen side of a station, `None` for unknown stations
    pub fn side_of(&self, station_id: &str) -> Option<&str> {
        self.station(station_id).map(|s| s.side.as_str())
    }

    /// Top-level area of a station; unknown stations are their own area
    pub fn grouping_of<'a>(&'a self, station_id: &'a str) -> &'a str {
        self.station(station_id)
            .map(|s| s.grouping())
            .unwrap_or(station_id)
    }

    /// Stations a station-less location could refer to
    ///
    /// An appliance narrows the candidates to stations offering it;
    /// otherwise every station allowing the sub-location is a candidate.
    pub fn candidate_stations(&self, location: &Location) -> Vec<&str> {
        match (&location.sub_location, &location.equipment_id) {
            (Some(SubLocation::Equipment), Some(eq)) => self.stations_for_equipment(eq),
            (Some(sub), _) => self.stations_for_sub_location(*sub),
            (None, Some(eq)) => self.stations_for_equipment(eq),
            (None, None) => Vec::new(),
        }
    }

    /// A location without a station that more than one station could host
    pub fn is_ambiguous(&self, location: &Location) -> bool {
        location.station_id.is_none() && self.candidate_stations(location).len() > 1
    }

    /// Check the tables are internally consistent
    pub fn check(&self) -> Result<(), String> {
        if !self.stations.contains_key(&self.expo_station) {
            return Err(format!(
                "compatibility.expo_station '{}' is not a configured station",
                self.expo_station
            ));
        }
        if !self.is_valid(&self.expo_station, SubLocation::WindowShelf) {
            return Err(format!(
                "expo station '{}' must allow window_shelf",
                self.expo_station
            ));
        }
        for (id, station) in &self.stations {
            if !station.equipment.is_empty() && !station.allows(SubLocation::Equipment) {
                return Err(format!(
                    "station '{id}' lists equipment but does not allow the equipment sub-location"
                ));
            }
            if let Some(sub) = station.default_sub_location {
                if !station.allows(sub) {
                    return Err(format!(
                        "station '{id}' default sub-location {sub} is not in its sub-locations"
                    ));
                }
            }
        }
        Ok(())
    }

    /// All configured equipment ids, sorted
    pub fn all_equipment(&self) -> BTreeSet<&str> {
        self.stations
            .values()
            .flat_map(|s| s.equipment.iter().map(String::as_str))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_and_shared_equipment() {
        let tables = CompatibilityTables::default();
        assert!(tables.is_unique_equipment("conveyor_toaster"));
        assert_eq!(
            tables.station_for_unique_equipment("conveyor_toaster"),
            Some("toaster")
        );
        assert!(tables.is_shared_equipment("salamander"));
        assert!(tables.is_shared_equipment("microwave"));
        assert_eq!(tables.station_for_unique_equipment("salamander"), None);
        assert!(!tables.is_known_equipment("teleporter"));
    }

    #[test]
    fn test_sub_location_validity() {
        let tables = CompatibilityTables::default();
        assert!(tables.is_valid("garnish", SubLocation::ColdStorage));
        assert!(!tables.is_valid("toaster", SubLocation::ColdStorage));
        assert!(!tables.is_valid("nowhere", SubLocation::WorkSurface));
        assert_eq!(
            tables.default_sub_location("vending"),
            Some(SubLocation::WindowShelf)
        );
        assert_eq!(
            tables.default_sub_location("fryer"),
            Some(SubLocation::WorkSurface)
        );
    }

    #[test]
    fn test_ambiguity() {
        let tables = CompatibilityTables::default();
        let shelf = Location {
            station_id: None,
            sub_location: Some(SubLocation::WindowShelf),
            equipment_id: None,
        };
        assert!(tables.is_ambiguous(&shelf));

        let unique = Location::equipment(None, "fryer");
        assert!(!tables.is_ambiguous(&unique));

        let shared = Location::equipment(None, "salamander");
        assert!(tables.is_ambiguous(&shared));

        let explicit = Location::at("expo", SubLocation::WindowShelf);
        assert!(!tables.is_ambiguous(&explicit));
    }

    #[test]
    fn test_grouping_falls_back() {
        let tables = CompatibilityTables::default();
        assert_eq!(tables.grouping_of("garnish"), "cold_line");
        assert_eq!(tables.grouping_of("fryer"), "hot_line");
        assert_eq!(tables.grouping_of("mystery"), "mystery");

        let mut custom = tables.clone();
        if let Some(s) = custom.stations.get_mut("prep") {
            s.grouping = None;
        }
        assert_eq!(custom.grouping_of("prep"), "cold_side");
    }

    #[test]
    fn test_default_tables_are_consistent() {
        assert!(CompatibilityTables::default().check().is_ok());

        let mut broken = CompatibilityTables::default();
        broken.expo_station = "pass".to_string();
        assert!(broken.check().is_err());
    }
}
