//! Structural signals: workflow shapes that make a build harder to run
//!
//! Each signal is a count plus the detail behind it. The scorer multiplies
//! counts by the configured per-signal weights.

use super::features::BuildFeatures;
use crate::config::PreplineConfig;
use crate::graph::{grouping_bounces, station_bounces, station_transitions, Bounce, BuildGraph, Transition};
use crate::transfers::derive_transfers;
use serde::{Deserialize, Serialize};

/// Signal names, matching the keys of `[scoring.signals]`
pub const SIGNAL_NAMES: [&str; 9] = [
    "grouping_bounce",
    "station_bounce",
    "merge_point",
    "deep_merge",
    "parallel_entry_point",
    "short_equipment_step",
    "back_to_back_equipment",
    "transfer",
    "station_transition",
];

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuralSignals {
    pub grouping_bounces: Vec<Bounce>,
    pub station_bounces: Vec<Bounce>,
    /// Steps with two or more inputs
    pub merge_points: Vec<String>,
    /// Steps with three or more inputs
    pub deep_merges: Vec<String>,
    /// Entry points beyond the first
    pub parallel_entry_points: Vec<String>,
    pub short_equipment_steps: Vec<String>,
    /// `(earlier, later)` consecutive equipment steps within a track
    pub back_to_back_equipment: Vec<(String, String)>,
    /// Derived transfer ids
    pub transfers: Vec<String>,
    pub station_transitions: Vec<Transition>,
}

impl StructuralSignals {
    pub fn detect(graph: &BuildGraph<'_>, features: &BuildFeatures, config: &PreplineConfig) -> Self {
        let tables = &config.compatibility;

        let merge_points = graph
            .steps()
            .iter()
            .filter(|s| s.inputs.len() >= 2)
            .map(|s| s.id.clone())
            .collect();
        let deep_merges = graph
            .steps()
            .iter()
            .filter(|s| s.inputs.len() >= 3)
            .map(|s| s.id.clone())
            .collect();

        let parallel_entry_points = graph
            .entry_points()
            .iter()
            .skip(1)
            .map(|s| s.id.clone())
            .collect();

        let threshold = config.scoring.short_equipment_step_seconds;
        let short_equipment_steps = features
            .steps
            .iter()
            .filter(|s| s.uses_equipment() && s.duration_seconds > 0.0 && s.duration_seconds < threshold)
            .map(|s| s.step_id.clone())
            .collect();

        let uses_equipment = |id: &str| {
            features
                .steps
                .iter()
                .find(|s| s.step_id == id)
                .is_some_and(|s| s.uses_equipment())
        };
        let mut back_to_back_equipment = Vec::new();
        for steps in graph.tracks().values() {
            for pair in steps.windows(2) {
                if uses_equipment(&pair[0].id) && uses_equipment(&pair[1].id) {
                    back_to_back_equipment.push((pair[0].id.clone(), pair[1].id.clone()));
                }
            }
        }

        let transfers = derive_transfers(graph.build(), config)
            .into_iter()
            .map(|t| t.id)
            .collect();

        Self {
            grouping_bounces: grouping_bounces(graph, tables),
            station_bounces: station_bounces(graph, tables),
            merge_points,
            deep_merges,
            parallel_entry_points,
            short_equipment_steps,
            back_to_back_equipment,
            transfers,
            station_transitions: station_transitions(graph, tables),
        }
    }

    /// Count per signal, in `SIGNAL_NAMES` order
    pub fn counts(&self) -> [(&'static str, usize); 9] {
        let counts = [
            self.grouping_bounces.len(),
            self.station_bounces.len(),
            self.merge_points.len(),
            self.deep_merges.len(),
            self.parallel_entry_points.len(),
            self.short_equipment_steps.len(),
            self.back_to_back_equipment.len(),
            self.transfers.len(),
            self.station_transitions.len(),
        ];
        let mut out = [("", 0); 9];
        for (i, name) in SIGNAL_NAMES.iter().enumerate() {
            out[i] = (*name, counts[i]);
        }
        out
    }

    pub fn count(&self, signal: &str) -> usize {
        self.counts()
            .iter()
            .find(|(name, _)| *name == signal)
            .map_or(0, |(_, c)| *c)
    }
}
