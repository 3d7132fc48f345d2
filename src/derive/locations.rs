//! Location passes: output destination, input source and work location

use super::DerivationReport;
use crate::config::{CompatibilityTables, TechniqueVocabulary};
use crate::graph::{station_of, BuildGraph};
use crate::models::{ActionFamily, Build, Location, Step, SubLocation};
use std::collections::HashMap;

/// Where a produced assembly ends up, keyed by assembly id
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedOutput {
    pub producer_step_id: String,
    pub location: Location,
}

/// Assembly id → first producer (in step order) with a resolved output location
pub fn resolved_outputs(build: &Build) -> HashMap<String, ResolvedOutput> {
    let graph = BuildGraph::new(build);
    let mut resolved = HashMap::new();
    for step in graph.steps() {
        for output in &step.outputs {
            let Some(location) = &output.location else {
                continue;
            };
            resolved
                .entry(output.assembly_id.clone())
                .or_insert_with(|| ResolvedOutput {
                    producer_step_id: step.id.clone(),
                    location: location.clone(),
                });
        }
    }
    resolved
}

/// Sub-location an action family works at by default
pub fn family_sub_location(family: ActionFamily) -> SubLocation {
    match family {
        ActionFamily::Heat => SubLocation::Equipment,
        ActionFamily::Package => SubLocation::Packaging,
        _ => SubLocation::WorkSurface,
    }
}

/// Work location a step would be given when it has none
///
/// Returns `None` when the step has no station and none can be inferred
/// from unique equipment, or when it is a heat step without equipment.
pub fn infer_work_location(step: &Step, tables: &CompatibilityTables) -> Option<Location> {
    if let Some(explicit) = &step.work_location {
        return Some(explicit.clone());
    }
    let station = station_of(step, tables)?;

    let sub = match step.family() {
        ActionFamily::Heat => {
            let equipment = step.equipment_id.as_deref()?;
            if tables.is_valid(station, SubLocation::Equipment) {
                return Some(Location::equipment(Some(station), equipment));
            }
            SubLocation::Equipment
        }
        family => family_sub_location(family),
    };

    if tables.is_valid(station, sub) {
        return Some(Location::at(station, sub));
    }
    let fallback = tables.default_sub_location(station).unwrap_or(sub);
    Some(Location::at(station, fallback))
}

/// Generic staging spot at a station: work surface, else the station default
fn staging_location(station: &str, tables: &CompatibilityTables) -> Location {
    if tables.is_valid(station, SubLocation::WorkSurface) || !tables.is_known_station(station) {
        return Location::at(station, SubLocation::WorkSurface);
    }
    let sub = tables
        .default_sub_location(station)
        .unwrap_or(SubLocation::WorkSurface);
    Location::at(station, sub)
}

/// Station of the earliest consumer of an assembly, else of the next step
fn next_station<'a>(
    graph: &BuildGraph<'a>,
    step: &Step,
    assembly_id: &str,
    tables: &'a CompatibilityTables,
) -> Option<&'a str> {
    let consumer = graph
        .consumers_of(assembly_id)
        .iter()
        .find(|c| c.id != step.id)
        .copied();
    consumer
        .or_else(|| graph.next_step(&step.id))
        .and_then(|s| station_of(s, tables))
}

/// Pass 1: destination of outputs without an explicit location
pub fn derive_output_locations(
    build: &Build,
    tables: &CompatibilityTables,
    report: &mut DerivationReport,
) -> Build {
    let graph = BuildGraph::new(build);
    let mut updates: HashMap<(usize, usize), Location> = HashMap::new();

    for (step_idx, step) in build.steps.iter().enumerate() {
        let station = station_of(step, tables);
        for (out_idx, output) in step.outputs.iter().enumerate() {
            if output.location.is_some() {
                continue;
            }

            let location = if let (ActionFamily::Heat, Some(equipment)) =
                (step.family(), step.equipment_id.as_deref())
            {
                Some(Location::equipment(station, equipment))
            } else if graph.is_last(&step.id) {
                Some(Location::at(&tables.expo_station, SubLocation::WindowShelf))
            } else {
                station.map(|here| {
                    match next_station(&graph, step, &output.assembly_id, tables) {
                        Some(next) if next == here => infer_work_location(step, tables)
                            .unwrap_or_else(|| staging_location(here, tables)),
                        _ => staging_location(here, tables),
                    }
                })
            };

            if let Some(location) = location {
                updates.insert((step_idx, out_idx), location);
            }
        }
    }

    let mut out = build.clone();
    report.output_locations += updates.len();
    for ((step_idx, out_idx), location) in updates {
        out.steps[step_idx].outputs[out_idx].location = Some(location);
    }
    out
}

/// Pass 2: origin of inputs without an explicit location
pub fn derive_input_sources(
    build: &Build,
    tables: &CompatibilityTables,
    vocabulary: &TechniqueVocabulary,
    report: &mut DerivationReport,
) -> Build {
    let graph = BuildGraph::new(build);
    let resolved = resolved_outputs(build);
    let mut updates: HashMap<(usize, usize), Location> = HashMap::new();

    for (step_idx, step) in build.steps.iter().enumerate() {
        let retrieves = step
            .technique()
            .is_some_and(|t| vocabulary.is_storage_retrieval(t));

        for (in_idx, input) in step.inputs.iter().enumerate() {
            if input.location.is_some() {
                continue;
            }
            let has_producer =
                input.is_in_build() && !graph.producers_of(&input.assembly_id).is_empty();

            let location = if has_producer {
                resolved
                    .get(&input.assembly_id)
                    .map(|r| r.location.clone())
            } else if retrieves {
                station_of(step, tables).map(|station| {
                    if tables.is_valid(station, SubLocation::ColdStorage) {
                        Location::at(station, SubLocation::ColdStorage)
                    } else {
                        Location::at(station, SubLocation::WorkSurface)
                    }
                })
            } else {
                None
            };

            if let Some(location) = location {
                updates.insert((step_idx, in_idx), location);
            }
        }
    }

    let mut out = build.clone();
    report.input_sources += updates.len();
    for ((step_idx, in_idx), location) in updates {
        out.steps[step_idx].inputs[in_idx].location = Some(location);
    }
    out
}

/// Pass 3: work location for steps without one
pub fn derive_work_locations(
    build: &Build,
    tables: &CompatibilityTables,
    report: &mut DerivationReport,
) -> Build {
    let mut out = build.clone();
    for step in out.steps.iter_mut() {
        if step.work_location.is_some() {
            continue;
        }
        let Some(location) = infer_work_location(step, tables) else {
            continue;
        };
        if step.station_id.is_none() && location.station_id.is_some() {
            report.stations_inferred += 1;
        }
        step.work_location = Some(location);
        report.work_locations += 1;
    }
    out
}
