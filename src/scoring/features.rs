//! Feature extraction for complexity scoring

use crate::config::scoring::{DEFAULT_SIDE, NON_LINE_SIDES};
use crate::config::CompatibilityTables;
use crate::graph::{station_of, BuildGraph};
use crate::models::{ActionFamily, Step};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// What the scorer knows about one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepFeatures {
    pub step_id: String,
    pub order_index: u32,
    /// Station side, `cold_side` when the station is unknown
    pub side: String,
    pub station: Option<String>,
    pub family: ActionFamily,
    pub technique: Option<String>,
    pub equipment: Option<String>,
    pub duration_seconds: f64,
    pub is_active: bool,
    pub input_count: usize,
    pub output_count: usize,
    pub quantity: Option<f64>,
}

impl StepFeatures {
    pub fn extract(step: &Step, tables: &CompatibilityTables) -> Self {
        let station = station_of(step, tables);
        let side = station
            .and_then(|s| tables.side_of(s))
            .unwrap_or(DEFAULT_SIDE);
        let equipment = step.equipment_id.clone().or_else(|| {
            step.work_location
                .as_ref()
                .and_then(|l| l.equipment_id.clone())
        });
        Self {
            step_id: step.id.clone(),
            order_index: step.order_index,
            side: side.to_string(),
            station: station.map(str::to_string),
            family: step.family(),
            technique: step.technique().map(str::to_string),
            equipment,
            duration_seconds: step.duration_seconds().unwrap_or(0.0),
            is_active: step.time.as_ref().map_or(true, |t| t.is_active),
            input_count: step.inputs.len(),
            output_count: step.outputs.len(),
            quantity: step.quantity.as_ref().map(|q| q.value),
        }
    }

    pub fn uses_equipment(&self) -> bool {
        self.equipment.is_some()
    }
}

/// Whole-build aggregates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildFeatures {
    pub build_id: String,
    pub step_count: usize,
    pub steps: Vec<StepFeatures>,
    pub steps_by_side: BTreeMap<String, usize>,
    pub unique_stations: usize,
    pub unique_equipment: usize,
    pub unique_families: usize,
    pub total_duration_seconds: f64,
    pub active_duration_seconds: f64,
    pub entry_point_count: usize,
    /// hot ÷ (hot + cold), ignoring expo and vending; 0 for an empty line
    pub hot_cold_ratio: f64,
}

impl BuildFeatures {
    pub fn extract(graph: &BuildGraph<'_>, tables: &CompatibilityTables) -> Self {
        let steps: Vec<StepFeatures> = graph
            .steps()
            .iter()
            .map(|s| StepFeatures::extract(s, tables))
            .collect();

        let mut steps_by_side: BTreeMap<String, usize> = BTreeMap::new();
        for step in &steps {
            *steps_by_side.entry(step.side.clone()).or_insert(0) += 1;
        }

        let hot = steps.iter().filter(|s| s.side == "hot_side").count();
        let line = steps
            .iter()
            .filter(|s| !NON_LINE_SIDES.contains(&s.side.as_str()))
            .count();
        let hot_cold_ratio = if line == 0 {
            0.0
        } else {
            hot as f64 / line as f64
        };

        let unique_stations = steps
            .iter()
            .filter_map(|s| s.station.as_deref())
            .collect::<BTreeSet<_>>()
            .len();
        let unique_equipment = steps
            .iter()
            .filter_map(|s| s.equipment.as_deref())
            .collect::<BTreeSet<_>>()
            .len();
        let unique_families = steps.iter().map(|s| s.family).collect::<BTreeSet<_>>().len();

        Self {
            build_id: graph.build().id.clone(),
            step_count: steps.len(),
            total_duration_seconds: steps.iter().map(|s| s.duration_seconds).sum(),
            active_duration_seconds: steps
                .iter()
                .filter(|s| s.is_active)
                .map(|s| s.duration_seconds)
                .sum(),
            entry_point_count: graph.entry_points().len(),
            steps,
            steps_by_side,
            unique_stations,
            unique_equipment,
            unique_families,
            hot_cold_ratio,
        }
    }
}
