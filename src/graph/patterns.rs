//! Station movement patterns within tracks
//!
//! Shared by the workflow rules and the complexity scorer so both see the
//! same bounces and transitions.

use super::index::{station_of, BuildGraph};
use crate::config::CompatibilityTables;
use serde::{Deserialize, Serialize};

/// Kind of revisit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BounceKind {
    /// A top-level area was left and later revisited
    Grouping,
    /// A station was left and revisited without leaving its area
    Station,
}

/// A revisit of a station or area within one track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounce {
    pub kind: BounceKind,
    pub track_id: String,
    /// Area or station that was revisited
    pub place: String,
    /// Last step before leaving
    pub left_at: String,
    /// First step after returning
    pub returned_at: String,
}

/// Consecutive steps of a track at two different stations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub track_id: String,
    pub from_station: String,
    pub to_station: String,
    pub step_id: String,
}

/// Maximal run of consecutive steps sharing a key
struct Run<'a> {
    key: &'a str,
    first_step: &'a str,
    last_step: &'a str,
}

fn runs<'a>(items: impl Iterator<Item = (&'a str, &'a str)>) -> Vec<Run<'a>> {
    let mut runs: Vec<Run<'a>> = Vec::new();
    for (key, step_id) in items {
        if let Some(run) = runs.last_mut().filter(|r| r.key == key) {
            run.last_step = step_id;
            continue;
        }
        runs.push(Run {
            key,
            first_step: step_id,
            last_step: step_id,
        });
    }
    runs
}

/// Per track: `(station, step id)` for steps whose station is known, in order
fn stationed_steps<'a>(
    graph: &BuildGraph<'a>,
    tables: &'a CompatibilityTables,
) -> Vec<(&'a str, Vec<(&'a str, &'a str)>)> {
    graph
        .tracks()
        .into_iter()
        .map(|(track, steps)| {
            let stationed = steps
                .into_iter()
                .filter_map(|s| station_of(s, tables).map(|st| (st, s.id.as_str())))
                .collect();
            (track, stationed)
        })
        .collect()
}

/// Areas left and later revisited within a track
pub fn grouping_bounces(graph: &BuildGraph<'_>, tables: &CompatibilityTables) -> Vec<Bounce> {
    let mut bounces = Vec::new();
    for (track, stationed) in stationed_steps(graph, tables) {
        let area_runs = runs(
            stationed
                .iter()
                .map(|(station, id)| (tables.grouping_of(station), *id)),
        );
        for (j, run) in area_runs.iter().enumerate() {
            if area_runs[..j].iter().any(|r| r.key == run.key) {
                bounces.push(Bounce {
                    kind: BounceKind::Grouping,
                    track_id: track.to_string(),
                    place: run.key.to_string(),
                    left_at: area_runs[j - 1].last_step.to_string(),
                    returned_at: run.first_step.to_string(),
                });
            }
        }
    }
    bounces
}

/// Stations left and revisited while every step in between stayed in the same area
pub fn station_bounces(graph: &BuildGraph<'_>, tables: &CompatibilityTables) -> Vec<Bounce> {
    let mut bounces = Vec::new();
    for (track, stationed) in stationed_steps(graph, tables) {
        let station_runs = runs(stationed.iter().copied());
        for (j, run) in station_runs.iter().enumerate() {
            let Some(i) = station_runs[..j].iter().rposition(|r| r.key == run.key) else {
                continue;
            };
            let area = tables.grouping_of(run.key);
            let same_area = station_runs[i + 1..j]
                .iter()
                .all(|r| tables.grouping_of(r.key) == area);
            if same_area {
                bounces.push(Bounce {
                    kind: BounceKind::Station,
                    track_id: track.to_string(),
                    place: run.key.to_string(),
                    left_at: station_runs[j - 1].last_step.to_string(),
                    returned_at: run.first_step.to_string(),
                });
            }
        }
    }
    bounces
}

/// Station changes between consecutive steps of each track
pub fn station_transitions(graph: &BuildGraph<'_>, tables: &CompatibilityTables) -> Vec<Transition> {
    let mut transitions = Vec::new();
    for (track, stationed) in stationed_steps(graph, tables) {
        for pair in stationed.windows(2) {
            let (from, _) = pair[0];
            let (to, step_id) = pair[1];
            if from != to {
                transitions.push(Transition {
                    track_id: track.to_string(),
                    from_station: from.to_string(),
                    to_station: to.to_string(),
                    step_id: step_id.to_string(),
                });
            }
        }
    }
    transitions
}
