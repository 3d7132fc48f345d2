//! Scoring configuration for the complexity model
//!
//! ```toml
//! [scoring]
//! short_equipment_step_seconds = 20.0
//! rating_thresholds = [20.0, 40.0, 70.0]
//! rating_mode = "fixed"
//!
//! [scoring.techniques]
//! default = 1.0
//! overrides = { fry = 2.0, sous_vide = 2.5 }
//!
//! [scoring.location]
//! hot_side = 2.0
//! cold_side = 1.0
//!
//! [scoring.signals]
//! grouping_bounce = 5.0
//! ```

use crate::models::ActionFamily;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Side every station without a configured side falls back to
pub const DEFAULT_SIDE: &str = "cold_side";

/// Sides excluded from the hot/cold ratio
pub const NON_LINE_SIDES: &[&str] = &["expo", "vending"];

/// A default weight plus per-key overrides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightTable {
    #[serde(default = "default_unit_weight")]
    pub default: f64,
    #[serde(default)]
    pub overrides: BTreeMap<String, f64>,
}

fn default_unit_weight() -> f64 {
    1.0
}

impl WeightTable {
    pub fn new(default: f64, overrides: &[(&str, f64)]) -> Self {
        Self {
            default,
            overrides: overrides
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
        }
    }

    /// Weight for a key, falling back to the default
    pub fn weight(&self, key: &str) -> f64 {
        self.overrides.get(key).copied().unwrap_or(self.default)
    }
}

impl Default for WeightTable {
    fn default() -> Self {
        Self::new(1.0, &[])
    }
}

/// Multipliers applied to each score category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryMultipliers {
    #[serde(default = "default_unit_weight")]
    pub location: f64,
    #[serde(default = "default_unit_weight")]
    pub technique: f64,
    #[serde(default = "default_unit_weight")]
    pub equipment: f64,
    #[serde(default = "default_station_movement")]
    pub station_movement: f64,
    #[serde(default = "default_task_count")]
    pub task_count: f64,
}

fn default_station_movement() -> f64 {
    2.0
}
fn default_task_count() -> f64 {
    0.5
}

impl Default for CategoryMultipliers {
    fn default() -> Self {
        Self {
            location: 1.0,
            technique: 1.0,
            equipment: 1.0,
            station_movement: default_station_movement(),
            task_count: default_task_count(),
        }
    }
}

impl CategoryMultipliers {
    pub fn as_pairs(&self) -> [(&'static str, f64); 5] {
        [
            ("location", self.location),
            ("technique", self.technique),
            ("equipment", self.equipment),
            ("station_movement", self.station_movement),
            ("task_count", self.task_count),
        ]
    }
}

/// How a raw score becomes a rating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RatingMode {
    /// Fixed cut-points on the raw score
    #[default]
    Fixed,
    /// Quartiles of the portfolio the build is scored in
    Percentile,
}

/// Complete scoring configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_technique_weights")]
    pub techniques: WeightTable,

    /// Station-side weights (hot_side, cold_side, expo, vending)
    #[serde(default = "default_location_weights")]
    pub location: BTreeMap<String, f64>,

    #[serde(default = "default_equipment_weights")]
    pub equipment: WeightTable,

    /// Per structural-signal weights, unknown signals weigh 0
    #[serde(default = "default_signal_weights")]
    pub signals: BTreeMap<String, f64>,

    /// Equipment steps shorter than this count as short
    #[serde(default = "default_short_equipment_step_seconds")]
    pub short_equipment_step_seconds: f64,

    /// Three ascending cut-points: low | medium | high | very_high
    #[serde(default = "default_rating_thresholds")]
    pub rating_thresholds: [f64; 3],

    #[serde(default)]
    pub rating_mode: RatingMode,

    #[serde(default)]
    pub category_multipliers: CategoryMultipliers,

    #[serde(default = "default_action_family_weights")]
    pub action_families: BTreeMap<ActionFamily, f64>,
}

fn default_technique_weights() -> WeightTable {
    WeightTable::new(
        1.0,
        &[
            ("retrieve", 0.5),
            ("pull", 0.5),
            ("place", 0.5),
            ("toast", 1.0),
            ("fry", 2.0),
            ("griddle", 1.5),
            ("sous_vide", 2.5),
            ("steam", 1.5),
            ("slice", 1.5),
            ("dice", 1.5),
            ("chop", 1.5),
            ("marinate", 2.0),
            ("whisk", 1.25),
            ("wrap", 1.0),
            ("fold", 1.25),
            ("roll", 1.5),
            ("scoop", 0.75),
            ("weigh", 1.0),
            ("visual_check", 0.25),
            ("temp_check", 0.5),
        ],
    )
}

fn default_location_weights() -> BTreeMap<String, f64> {
    [
        ("hot_side", 2.0),
        ("cold_side", 1.0),
        ("expo", 0.5),
        ("vending", 0.5),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

fn default_equipment_weights() -> WeightTable {
    WeightTable::new(
        1.0,
        &[
            ("turbo_oven", 1.5),
            ("fryer", 2.0),
            ("conveyor_toaster", 1.0),
            ("waterbath", 1.5),
            ("salamander", 1.25),
            ("microwave", 0.5),
            ("kettle", 1.5),
        ],
    )
}

fn default_signal_weights() -> BTreeMap<String, f64> {
    [
        ("grouping_bounce", 5.0),
        ("station_bounce", 3.0),
        ("merge_point", 1.0),
        ("deep_merge", 2.0),
        ("parallel_entry_point", 0.5),
        ("short_equipment_step", 1.5),
        ("back_to_back_equipment", 1.0),
        ("transfer", 0.5),
        ("station_transition", 0.0),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

fn default_short_equipment_step_seconds() -> f64 {
    20.0
}

fn default_rating_thresholds() -> [f64; 3] {
    [20.0, 40.0, 70.0]
}

fn default_action_family_weights() -> BTreeMap<ActionFamily, f64> {
    [
        (ActionFamily::Heat, 1.0),
        (ActionFamily::Prep, 0.5),
        (ActionFamily::Transfer, 0.25),
        (ActionFamily::Assemble, 0.75),
        (ActionFamily::Portion, 0.5),
        (ActionFamily::Check, 0.25),
        (ActionFamily::Package, 0.5),
        (ActionFamily::Other, 0.5),
    ]
    .into_iter()
    .collect()
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            techniques: default_technique_weights(),
            location: default_location_weights(),
            equipment: default_equipment_weights(),
            signals: default_signal_weights(),
            short_equipment_step_seconds: default_short_equipment_step_seconds(),
            rating_thresholds: default_rating_thresholds(),
            rating_mode: RatingMode::default(),
            category_multipliers: CategoryMultipliers::default(),
            action_families: default_action_family_weights(),
        }
    }
}

impl ScoringConfig {
    /// Weight for a station side; unknown sides count as cold side
    pub fn side_weight(&self, side: &str) -> f64 {
        self.location
            .get(side)
            .or_else(|| self.location.get(DEFAULT_SIDE))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn technique_weight(&self, technique: Option<&str>) -> f64 {
        match technique {
            Some(t) => self.techniques.weight(t),
            None => self.techniques.default,
        }
    }

    /// Equipment weight, 0 when the step uses none
    pub fn equipment_weight(&self, equipment: Option<&str>) -> f64 {
        equipment.map(|e| self.equipment.weight(e)).unwrap_or(0.0)
    }

    pub fn family_weight(&self, family: ActionFamily) -> f64 {
        self.action_families.get(&family).copied().unwrap_or(0.0)
    }

    /// Weight of a structural signal, 0 when not configured
    pub fn signal_weight(&self, signal: &str) -> f64 {
        self.signals.get(signal).copied().unwrap_or(0.0)
    }

    /// Builder-style override of one station-side weight
    pub fn with_side_weight(mut self, side: &str, weight: f64) -> Self {
        self.location.insert(side.to_string(), weight);
        self
    }

    pub fn with_signal_weight(mut self, signal: &str, weight: f64) -> Self {
        self.signals.insert(signal.to_string(), weight);
        self
    }

    /// Check the invariants the scorer relies on
    pub fn check(&self) -> Result<(), String> {
        let [a, b, c] = self.rating_thresholds;
        if !(a < b && b < c) {
            return Err(format!(
                "scoring.rating_thresholds must be strictly ascending, got [{a}, {b}, {c}]"
            ));
        }
        for (name, value) in self.category_multipliers.as_pairs() {
            if value < 0.0 || !value.is_finite() {
                return Err(format!(
                    "scoring.category_multipliers.{name} must be a non-negative number, got {value}"
                ));
            }
        }
        if self.short_equipment_step_seconds < 0.0 {
            return Err("scoring.short_equipment_step_seconds must not be negative".to_string());
        }
        Ok(())
    }
}
