//! Rules checking steps against the kitchen's compatibility tables

use super::base::{FnRule, Findings, Rule, RuleContext, RuleScope};
use crate::models::{ActionFamily, Severity, SubLocation};
use std::sync::Arc;

pub fn rules() -> Vec<Arc<dyn Rule>> {
    vec![
        Arc::new(FnRule::new(
            "unknown-station",
            "Stations must exist in the compatibility tables",
            Severity::Hard,
            RuleScope::Step,
            unknown_station,
        )),
        Arc::new(FnRule::new(
            "unknown-equipment",
            "Equipment should exist in the compatibility tables",
            Severity::Strong,
            RuleScope::Step,
            unknown_equipment,
        )),
        Arc::new(FnRule::new(
            "work-location-valid-for-station",
            "A work location's sub-location must be valid at its station",
            Severity::Hard,
            RuleScope::Step,
            work_location_valid_for_station,
        )),
        Arc::new(FnRule::new(
            "work-location-requires-appliance",
            "An equipment work location must name the appliance",
            Severity::Hard,
            RuleScope::Step,
            work_location_requires_appliance,
        )),
        Arc::new(FnRule::new(
            "heat-work-location-equipment",
            "Heat steps should work at an equipment sub-location",
            Severity::Strong,
            RuleScope::Step,
            heat_work_location_equipment,
        )),
        Arc::new(FnRule::new(
            "technique-in-vocabulary",
            "Techniques should come from the technique vocabulary",
            Severity::Strong,
            RuleScope::Step,
            technique_in_vocabulary,
        )),
        Arc::new(FnRule::new(
            "technique-matches-family",
            "A technique must be allowed for the step's action family",
            Severity::Strong,
            RuleScope::Step,
            technique_matches_family,
        )),
        Arc::new(FnRule::new(
            "equipment-available-at-station",
            "Equipment must be available at the step's station",
            Severity::Hard,
            RuleScope::Step,
            equipment_available_at_station,
        )),
        Arc::new(FnRule::new(
            "station-required-when-ambiguous",
            "A station is required when the work location fits several stations",
            Severity::Hard,
            RuleScope::Step,
            station_required_when_ambiguous,
        )),
        Arc::new(FnRule::new(
            "shared-equipment-requires-station",
            "Equipment offered at several stations requires an explicit station",
            Severity::Hard,
            RuleScope::Step,
            shared_equipment_requires_station,
        )),
    ]
}

fn unknown_station(ctx: &RuleContext<'_>, findings: &mut Findings) {
    let tables = ctx.tables();
    for step in ctx.steps() {
        if let Some(station) = step.station_id.as_deref() {
            if !tables.is_known_station(station) {
                findings.step_field(step, "stationId", format!("Unknown station '{station}'"));
            }
        }
        let work_station = step
            .work_location
            .as_ref()
            .and_then(|l| l.station_id.as_deref());
        if let Some(station) = work_station {
            if Some(station) != step.station_id.as_deref() && !tables.is_known_station(station) {
                findings.step_field(
                    step,
                    "workLocation.stationId",
                    format!("Unknown station '{station}'"),
                );
            }
        }
    }
}

fn unknown_equipment(ctx: &RuleContext<'_>, findings: &mut Findings) {
    let tables = ctx.tables();
    for step in ctx.steps() {
        if let Some(eq) = step.equipment_id.as_deref() {
            if !tables.is_known_equipment(eq) {
                findings.step_field(step, "equipmentId", format!("Unknown equipment '{eq}'"));
            }
        }
        let work_eq = step
            .work_location
            .as_ref()
            .and_then(|l| l.equipment_id.as_deref());
        if let Some(eq) = work_eq {
            if Some(eq) != step.equipment_id.as_deref() && !tables.is_known_equipment(eq) {
                findings.step_field(
                    step,
                    "workLocation.equipmentId",
                    format!("Unknown equipment '{eq}'"),
                );
            }
        }
    }
}

fn work_location_valid_for_station(ctx: &RuleContext<'_>, findings: &mut Findings) {
    let tables = ctx.tables();
    for step in ctx.steps() {
        let Some(location) = &step.work_location else {
            continue;
        };
        let station = location
            .station_id
            .as_deref()
            .or(step.station_id.as_deref());
        let (Some(station), Some(sub)) = (station, location.sub_location) else {
            continue;
        };
        if tables.is_known_station(station) && !tables.is_valid(station, sub) {
            findings.step_field(
                step,
                "workLocation.subLocation",
                format!("Sub-location {sub} is not available at station '{station}'"),
            );
        }
    }
}

fn work_location_requires_appliance(ctx: &RuleContext<'_>, findings: &mut Findings) {
    for step in ctx.steps() {
        let Some(location) = &step.work_location else {
            continue;
        };
        if location.sub_location == Some(SubLocation::Equipment) && location.equipment_id.is_none()
        {
            findings.step_field(
                step,
                "workLocation.equipmentId",
                format!(
                    "Step '{}' works at an equipment sub-location without naming the appliance",
                    step.id
                ),
            );
        }
    }
}

fn heat_work_location_equipment(ctx: &RuleContext<'_>, findings: &mut Findings) {
    for step in ctx.steps() {
        if step.family() != ActionFamily::Heat {
            continue;
        }
        let Some(sub) = step.work_location.as_ref().and_then(|l| l.sub_location) else {
            continue;
        };
        if sub != SubLocation::Equipment {
            findings.step_field(
                step,
                "workLocation.subLocation",
                format!("Heat step '{}' works at {sub} instead of equipment", step.id),
            );
        }
    }
}

fn technique_in_vocabulary(ctx: &RuleContext<'_>, findings: &mut Findings) {
    let vocab = ctx.vocabulary();
    for step in ctx.steps() {
        if let Some(technique) = step.technique() {
            if !vocab.contains(technique) {
                findings.step_field(
                    step,
                    "action.techniqueId",
                    format!("Technique '{technique}' is not in the vocabulary"),
                );
            }
        }
    }
}

fn technique_matches_family(ctx: &RuleContext<'_>, findings: &mut Findings) {
    let vocab = ctx.vocabulary();
    for step in ctx.steps() {
        let Some(technique) = step.technique() else {
            continue;
        };
        if !vocab.allows_family(technique, step.family()) {
            findings.step_field(
                step,
                "action.techniqueId",
                format!(
                    "Technique '{}' is not used for {} steps",
                    technique,
                    step.family()
                ),
            );
        }
    }
}

fn equipment_available_at_station(ctx: &RuleContext<'_>, findings: &mut Findings) {
    let tables = ctx.tables();
    for step in ctx.steps() {
        let (Some(station), Some(eq)) = (step.effective_station(), step.equipment_id.as_deref())
        else {
            continue;
        };
        if tables.is_known_station(station)
            && tables.is_known_equipment(eq)
            && !tables.equipment_available(station, eq)
        {
            findings.step_field(
                step,
                "equipmentId",
                format!("Equipment '{eq}' is not available at station '{station}'"),
            );
        }
    }
}

fn station_required_when_ambiguous(ctx: &RuleContext<'_>, findings: &mut Findings) {
    let tables = ctx.tables();
    for step in ctx.steps() {
        if step.station_id.is_some() {
            continue;
        }
        let Some(location) = &step.work_location else {
            continue;
        };
        // Appliance ambiguity belongs to shared-equipment-requires-station
        if location.sub_location == Some(SubLocation::Equipment) {
            continue;
        }
        if tables.is_ambiguous(location) {
            let candidates = tables.candidate_stations(location);
            findings.step_field(
                step,
                "stationId",
                format!(
                    "Step '{}' works at {} which exists at {} stations ({}); a station is required",
                    step.id,
                    location.describe(),
                    candidates.len(),
                    candidates.join(", ")
                ),
            );
        }
    }
}

fn shared_equipment_requires_station(ctx: &RuleContext<'_>, findings: &mut Findings) {
    let tables = ctx.tables();
    for step in ctx.steps() {
        if step.effective_station().is_some() {
            continue;
        }
        let equipment = step.equipment_id.as_deref().or_else(|| {
            step.work_location
                .as_ref()
                .and_then(|l| l.equipment_id.as_deref())
        });
        let Some(eq) = equipment else {
            continue;
        };
        if tables.is_shared_equipment(eq) {
            findings.step_field(
                step,
                "stationId",
                format!(
                    "Equipment '{}' is shared by {}; step '{}' must name its station",
                    eq,
                    tables.stations_for_equipment(eq).join(", "),
                    step.id
                ),
            );
        }
    }
}
