//! Site assignment for stations and equipment
//!
//! A site is a physical premises (the kitchen, a commissary, a vending
//! window). Transfers between sites are classified as `cross_site`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Resolves the site a station or appliance belongs to
pub trait SiteResolver: Send + Sync {
    /// Site for a station/appliance pair; the appliance wins when both are mapped
    fn site_for(&self, station_id: Option<&str>, equipment_id: Option<&str>) -> Option<String>;
}

/// Table-driven site assignment with a default site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteAssignment {
    #[serde(default)]
    pub stations: BTreeMap<String, String>,

    #[serde(default)]
    pub equipment: BTreeMap<String, String>,

    #[serde(default = "default_site")]
    pub default_site: String,
}

fn default_site() -> String {
    "kitchen".to_string()
}

impl Default for SiteAssignment {
    fn default() -> Self {
        let pairs = |items: &[(&str, &str)]| {
            items
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>()
        };
        Self {
            stations: pairs(&[("commissary", "commissary"), ("vending", "vending")]),
            equipment: pairs(&[("kettle", "commissary")]),
            default_site: default_site(),
        }
    }
}

impl SiteResolver for SiteAssignment {
    fn site_for(&self, station_id: Option<&str>, equipment_id: Option<&str>) -> Option<String> {
        if let Some(site) = equipment_id.and_then(|e| self.equipment.get(e)) {
            return Some(site.clone());
        }
        if let Some(site) = station_id.and_then(|s| self.stations.get(s)) {
            return Some(site.clone());
        }
        Some(self.default_site.clone())
    }
}

impl<F> SiteResolver for F
where
    F: Fn(Option<&str>, Option<&str>) -> Option<String> + Send + Sync,
{
    fn site_for(&self, station_id: Option<&str>, equipment_id: Option<&str>) -> Option<String> {
        self(station_id, equipment_id)
    }
}
