//! Transfer deriver
//!
//! Synthesizes the implicit movement of material between steps. For each
//! material-flow edge whose producer output location differs from where
//! the consumer works, one `DerivedTransfer` is emitted. Transfers are
//! never authored; they exist only in the derived-data bundle.

pub mod cache;
pub mod hash;

use crate::config::{PreplineConfig, SiteResolver, TransferConfig};
use crate::derive::resolved_outputs;
use crate::graph::BuildGraph;
use crate::models::{Build, Location, Step, SubLocation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

pub use cache::{get_or_derive, DerivedData, DerivedDataCache, DERIVATION_VERSION};
pub use hash::content_hash;

/// How far material travels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveType {
    SameStation,
    SameSite,
    CrossSite,
}

impl MoveType {
    pub fn name(&self) -> &'static str {
        match self {
            MoveType::SameStation => "same_station",
            MoveType::SameSite => "same_site",
            MoveType::CrossSite => "cross_site",
        }
    }
}

/// Technique inferred for a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferTechnique {
    Retrieve,
    Place,
    Pass,
    Handoff,
}

/// A movement step synthesized on a material-flow edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedTransfer {
    pub id: String,
    pub assembly_id: String,
    pub move_type: MoveType,
    pub technique: TransferTechnique,
    pub cost: f64,
    pub seconds: f64,
    pub from: Location,
    pub to: Location,
    pub producer_step_id: String,
    pub consumer_step_id: String,
}

impl DerivedTransfer {
    /// Whether this transfer should replace `other` on the same edge
    fn outranks(&self, other: &DerivedTransfer) -> bool {
        self.cost
            .total_cmp(&other.cost)
            .then_with(|| self.seconds.total_cmp(&other.seconds))
            .then_with(|| other.id.cmp(&self.id))
            .is_gt()
    }
}

pub fn transfer_id(producer: &str, consumer: &str, assembly_id: &str) -> String {
    format!("xfer:{producer}->{consumer}:{assembly_id}")
}

/// Where a consumer takes in material: work location, else its legacy
/// station/equipment fields, else the input's explicit origin
pub fn consumer_location(step: &Step, input_origin: Option<&Location>) -> Option<Location> {
    step.work_location
        .clone()
        .or_else(|| step.legacy_location())
        .or_else(|| input_origin.cloned())
}

pub fn classify_move(from: &Location, to: &Location, sites: &dyn SiteResolver) -> MoveType {
    let from_site = sites.site_for(from.station_id.as_deref(), from.equipment_id.as_deref());
    let to_site = sites.site_for(to.station_id.as_deref(), to.equipment_id.as_deref());
    match (from_site, to_site) {
        (Some(a), Some(b)) if a != b => MoveType::CrossSite,
        _ if from.station_id == to.station_id => MoveType::SameStation,
        _ => MoveType::SameSite,
    }
}

pub fn infer_technique(from: &Location, to: &Location, expo_station: &str) -> TransferTechnique {
    let to_window = to.sub_location == Some(SubLocation::WindowShelf)
        && to.station_id.as_deref() == Some(expo_station);
    if to_window {
        TransferTechnique::Handoff
    } else if from.sub_location.is_some_and(|s| s.is_storage()) {
        TransferTechnique::Retrieve
    } else if from.station_id != to.station_id {
        TransferTechnique::Pass
    } else {
        TransferTechnique::Place
    }
}

fn move_cost(config: &TransferConfig, move_type: MoveType) -> (f64, f64) {
    let mv = match move_type {
        MoveType::SameStation => config.same_station,
        MoveType::SameSite => config.same_site,
        MoveType::CrossSite => config.cross_site,
    };
    (mv.cost, mv.seconds)
}

/// Derive transfers using the configured site assignment
pub fn derive_transfers(build: &Build, config: &PreplineConfig) -> Vec<DerivedTransfer> {
    derive_transfers_with(build, config, &config.sites)
}

/// Derive transfers with a caller-supplied site resolver
pub fn derive_transfers_with(
    build: &Build,
    config: &PreplineConfig,
    sites: &dyn SiteResolver,
) -> Vec<DerivedTransfer> {
    let graph = BuildGraph::new(build);
    let resolved = resolved_outputs(build);
    let mut by_edge: HashMap<(String, String), DerivedTransfer> = HashMap::new();

    for consumer in graph.steps() {
        for input in consumer.inputs.iter().filter(|i| i.is_in_build()) {
            let Some(produced) = resolved.get(&input.assembly_id) else {
                continue;
            };
            if produced.producer_step_id == consumer.id {
                continue;
            }
            let Some(to) = consumer_location(consumer, input.location.as_ref()) else {
                continue;
            };
            let from = &produced.location;
            if from.is_equivalent(&to) {
                continue;
            }

            let move_type = classify_move(from, &to, sites);
            let technique = infer_technique(from, &to, &config.compatibility.expo_station);
            let (cost, seconds) = move_cost(&config.transfers, move_type);
            let transfer = DerivedTransfer {
                id: transfer_id(&produced.producer_step_id, &consumer.id, &input.assembly_id),
                assembly_id: input.assembly_id.clone(),
                move_type,
                technique,
                cost,
                seconds,
                from: from.clone(),
                to,
                producer_step_id: produced.producer_step_id.clone(),
                consumer_step_id: consumer.id.clone(),
            };

            let key = (
                transfer.producer_step_id.clone(),
                transfer.consumer_step_id.clone(),
            );
            match by_edge.get(&key) {
                Some(existing) if !transfer.outranks(existing) => {}
                _ => {
                    by_edge.insert(key, transfer);
                }
            }
        }
    }

    let mut transfers: Vec<DerivedTransfer> = by_edge.into_values().collect();
    transfers.sort_by(|a, b| {
        graph
            .position(&a.producer_step_id)
            .cmp(&graph.position(&b.producer_step_id))
            .then_with(|| {
                graph
                    .position(&a.consumer_step_id)
                    .cmp(&graph.position(&b.consumer_step_id))
            })
            .then_with(|| a.id.cmp(&b.id))
    });

    debug!("Derived {} transfers for build {}", transfers.len(), build.id);
    transfers
}
