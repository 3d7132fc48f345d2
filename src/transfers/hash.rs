//! Content hash over the fields that influence derived transfers
//!
//! Timestamps, notes, status and step timing are excluded, so editing
//! them does not invalidate cached transfers. The configuration that shapes
//! transfers (cost table, site assignment, expo station) is included.

use crate::config::{PreplineConfig, SiteAssignment, TransferConfig};
use crate::models::{Build, FlowRef, Location};
use anyhow::{Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};

#[derive(Serialize)]
struct StepProjection<'a> {
    id: &'a str,
    order_index: u32,
    station_id: Option<&'a str>,
    equipment_id: Option<&'a str>,
    work_location: Option<&'a Location>,
    depends_on: &'a [String],
    inputs: &'a [FlowRef],
    outputs: &'a [FlowRef],
}

#[derive(Serialize)]
struct AssemblyProjection<'a> {
    id: &'a str,
    lineage: Option<&'a str>,
}

#[derive(Serialize)]
struct HashProjection<'a> {
    build_id: &'a str,
    steps: Vec<StepProjection<'a>>,
    assemblies: Vec<AssemblyProjection<'a>>,
    transfer_costs: &'a TransferConfig,
    sites: &'a SiteAssignment,
    expo_station: &'a str,
}

/// Hex SHA-256 of the hash-relevant projection of a build plus the
/// transfer-shaping configuration
pub fn content_hash(build: &Build, config: &PreplineConfig) -> Result<String> {
    let mut steps: Vec<StepProjection> = build
        .steps
        .iter()
        .map(|s| StepProjection {
            id: &s.id,
            order_index: s.order_index,
            station_id: s.station_id.as_deref(),
            equipment_id: s.equipment_id.as_deref(),
            work_location: s.work_location.as_ref(),
            depends_on: &s.depends_on,
            inputs: &s.inputs,
            outputs: &s.outputs,
        })
        .collect();
    steps.sort_by(|a, b| a.order_index.cmp(&b.order_index).then_with(|| a.id.cmp(b.id)));

    let mut assemblies: Vec<AssemblyProjection> = build
        .assemblies
        .iter()
        .map(|a| AssemblyProjection {
            id: &a.id,
            lineage: a.lineage.as_deref(),
        })
        .collect();
    assemblies.sort_by(|a, b| a.id.cmp(b.id).then_with(|| a.lineage.cmp(&b.lineage)));

    let projection = HashProjection {
        build_id: &build.id,
        steps,
        assemblies,
        transfer_costs: &config.transfers,
        sites: &config.sites,
        expo_station: &config.compatibility.expo_station,
    };

    let bytes = serde_json::to_vec(&projection)
        .with_context(|| format!("Failed to encode hash projection for build {}", build.id))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}
