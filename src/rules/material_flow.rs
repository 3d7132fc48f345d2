//! Material-flow rules: producers, consumers, flow-ref locations and lineage

use super::base::{FnRule, Findings, Rule, RuleContext, RuleScope};
use crate::graph::{find_cycles, format_cycle};
use crate::models::{ActionFamily, FlowRef, Location, Severity, Step, SubLocation};
use crate::transfers::transfer_id;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

pub fn rules() -> Vec<Arc<dyn Rule>> {
    vec![
        Arc::new(FnRule::new(
            "transfer-steps-derived-only",
            "Transfer steps are derived and must not be authored",
            Severity::Hard,
            RuleScope::Step,
            transfer_steps_derived_only,
        )),
        Arc::new(FnRule::new(
            "flow-ref-requires-sub-location",
            "A flow-ref location must carry a sub-location",
            Severity::Hard,
            RuleScope::Flow,
            flow_ref_requires_sub_location,
        )),
        Arc::new(FnRule::new(
            "flow-ref-equipment-requires-appliance",
            "A flow-ref at an equipment sub-location must name the appliance",
            Severity::Hard,
            RuleScope::Flow,
            flow_ref_equipment_requires_appliance,
        )),
        Arc::new(FnRule::new(
            "flow-ref-station-when-ambiguous",
            "A flow-ref location valid at several stations must name one",
            Severity::Hard,
            RuleScope::Flow,
            flow_ref_station_when_ambiguous,
        )),
        Arc::new(FnRule::new(
            "step-requires-output",
            "Every step must produce something",
            Severity::Hard,
            RuleScope::Step,
            step_requires_output,
        )),
        Arc::new(FnRule::new(
            "assembly-single-producer",
            "An assembly may be produced by at most one step",
            Severity::Hard,
            RuleScope::Flow,
            assembly_single_producer,
        )),
        Arc::new(FnRule::new(
            "input-has-producer",
            "In-build inputs must be produced by a step",
            Severity::Hard,
            RuleScope::Flow,
            input_has_producer,
        )),
        Arc::new(FnRule::new(
            "external-assembly-produced",
            "An input marked external is produced inside the build",
            Severity::Strong,
            RuleScope::Flow,
            external_assembly_produced,
        )),
        Arc::new(FnRule::new(
            "self-consumption",
            "A step cannot consume its own output",
            Severity::Hard,
            RuleScope::Flow,
            self_consumption,
        )),
        Arc::new(FnRule::new(
            "duplicate-flow-ref",
            "A step should not list the same assembly twice",
            Severity::Soft,
            RuleScope::Flow,
            duplicate_flow_ref,
        )),
        Arc::new(FnRule::new(
            "input-origin-matches-producer",
            "An input's origin should match where its producer leaves it",
            Severity::Soft,
            RuleScope::Flow,
            input_origin_matches_producer,
        )),
        Arc::new(FnRule::new(
            "unconsumed-intermediate",
            "Intermediate assemblies should be consumed",
            Severity::Info,
            RuleScope::Flow,
            unconsumed_intermediate,
        )),
        Arc::new(FnRule::new(
            "undeclared-assembly",
            "Referenced assemblies should be declared",
            Severity::Info,
            RuleScope::Assembly,
            undeclared_assembly,
        )),
        Arc::new(FnRule::new(
            "lineage-target-exists",
            "Lineage must point at a declared assembly",
            Severity::Strong,
            RuleScope::Assembly,
            lineage_target_exists,
        )),
        Arc::new(FnRule::new(
            "lineage-acyclic",
            "Assembly lineage must not loop",
            Severity::Hard,
            RuleScope::Assembly,
            lineage_acyclic,
        )),
    ]
}

/// `(field path, flow ref)` for every input then output of a step
fn flow_refs(step: &Step) -> impl Iterator<Item = (String, &FlowRef)> {
    let inputs = step
        .inputs
        .iter()
        .enumerate()
        .map(|(i, r)| (format!("inputs[{i}]"), r));
    let outputs = step
        .outputs
        .iter()
        .enumerate()
        .map(|(i, r)| (format!("outputs[{i}]"), r));
    inputs.chain(outputs)
}

fn located_refs(step: &Step) -> impl Iterator<Item = (String, &FlowRef, &Location)> {
    flow_refs(step).filter_map(|(path, r)| r.location.as_ref().map(|l| (path, r, l)))
}

fn transfer_steps_derived_only(ctx: &RuleContext<'_>, findings: &mut Findings) {
    for step in ctx.steps() {
        if step.family() == ActionFamily::Transfer {
            findings.step_field(
                step,
                "action.family",
                format!(
                    "Step '{}' is an authored transfer; transfers are derived from material flow",
                    step.id
                ),
            );
        }
    }
}

fn flow_ref_requires_sub_location(ctx: &RuleContext<'_>, findings: &mut Findings) {
    for step in ctx.steps() {
        for (path, flow, location) in located_refs(step) {
            if location.sub_location.is_none() {
                findings.step_field(
                    step,
                    format!("{path}.location.subLocation"),
                    format!("Location of '{}' has no sub-location", flow.assembly_id),
                );
            }
        }
    }
}

fn flow_ref_equipment_requires_appliance(ctx: &RuleContext<'_>, findings: &mut Findings) {
    for step in ctx.steps() {
        for (path, flow, location) in located_refs(step) {
            if location.sub_location == Some(SubLocation::Equipment)
                && location.equipment_id.is_none()
            {
                findings.step_field(
                    step,
                    format!("{path}.location.equipmentId"),
                    format!(
                        "Location of '{}' is on equipment but names no appliance",
                        flow.assembly_id
                    ),
                );
            }
        }
    }
}

fn flow_ref_station_when_ambiguous(ctx: &RuleContext<'_>, findings: &mut Findings) {
    let tables = ctx.tables();
    for step in ctx.steps() {
        for (path, flow, location) in located_refs(step) {
            if tables.is_ambiguous(location) {
                findings.step_field(
                    step,
                    format!("{path}.location.stationId"),
                    format!(
                        "Location {} of '{}' fits several stations; name the station",
                        location.describe(),
                        flow.assembly_id
                    ),
                );
            }
        }
    }
}

fn step_requires_output(ctx: &RuleContext<'_>, findings: &mut Findings) {
    for step in ctx.steps() {
        if step.outputs.is_empty() {
            findings.step_field(
                step,
                "outputs",
                format!("Step '{}' produces nothing", step.id),
            );
        }
    }
}

fn assembly_single_producer(ctx: &RuleContext<'_>, findings: &mut Findings) {
    for assembly_id in ctx.graph.produced_assemblies() {
        let producers = ctx.graph.producers_of(assembly_id);
        let Some((first, rest)) = producers.split_first() else {
            continue;
        };
        for step in rest {
            findings.step_field(
                step,
                "outputs",
                format!(
                    "Assembly '{}' is already produced by step '{}'",
                    assembly_id, first.id
                ),
            );
        }
    }
}

fn input_has_producer(ctx: &RuleContext<'_>, findings: &mut Findings) {
    for step in ctx.steps() {
        for (i, input) in step.inputs.iter().enumerate() {
            if input.is_in_build() && ctx.graph.producers_of(&input.assembly_id).is_empty() {
                findings.step_field(
                    step,
                    format!("inputs[{i}]"),
                    format!(
                        "In-build input '{}' has no producing step; mark it external or add a producer",
                        input.assembly_id
                    ),
                );
            }
        }
    }
}

fn external_assembly_produced(ctx: &RuleContext<'_>, findings: &mut Findings) {
    for step in ctx.steps() {
        for (i, input) in step.inputs.iter().enumerate() {
            if input.is_in_build() {
                continue;
            }
            if let Some(producer) = ctx.graph.producer_of(&input.assembly_id) {
                findings.step_field(
                    step,
                    format!("inputs[{i}].source"),
                    format!(
                        "Input '{}' is marked external but step '{}' produces it",
                        input.assembly_id, producer.id
                    ),
                );
            }
        }
    }
}

fn self_consumption(ctx: &RuleContext<'_>, findings: &mut Findings) {
    for step in ctx.steps() {
        for (i, input) in step.inputs.iter().enumerate() {
            if step.outputs.iter().any(|o| o.assembly_id == input.assembly_id) {
                findings.step_field(
                    step,
                    format!("inputs[{i}]"),
                    format!(
                        "Step '{}' consumes its own output '{}'",
                        step.id, input.assembly_id
                    ),
                );
            }
        }
    }
}

fn duplicate_flow_ref(ctx: &RuleContext<'_>, findings: &mut Findings) {
    for step in ctx.steps() {
        for (side, refs) in [("inputs", &step.inputs), ("outputs", &step.outputs)] {
            let mut seen = HashSet::new();
            for (i, flow) in refs.iter().enumerate() {
                if !seen.insert(flow.assembly_id.as_str()) {
                    findings.step_field(
                        step,
                        format!("{side}[{i}]"),
                        format!("'{}' is listed more than once in {}", flow.assembly_id, side),
                    );
                }
            }
        }
    }
}

/// Published builds must match exactly. On drafts a cross-station mismatch
/// only notes the transfer that derivation will add
fn input_origin_matches_producer(ctx: &RuleContext<'_>, findings: &mut Findings) {
    let published = ctx.build.is_published();
    for step in ctx.steps() {
        for (i, input) in step.inputs.iter().enumerate() {
            if !input.is_in_build() {
                continue;
            }
            let (Some(origin), Some(produced)) =
                (&input.location, ctx.resolved.get(&input.assembly_id))
            else {
                continue;
            };
            if produced.producer_step_id == step.id || origin.is_equivalent(&produced.location) {
                continue;
            }

            let field = format!("inputs[{i}].location");
            if origin.station_id != produced.location.station_id {
                let id = transfer_id(&produced.producer_step_id, &step.id, &input.assembly_id);
                let severity = if published {
                    Severity::Hard
                } else {
                    Severity::Info
                };
                findings.graded(
                    severity,
                    step,
                    field,
                    format!(
                        "'{}' leaves step '{}' at {} but is taken from {}; transfer {} will be derived",
                        input.assembly_id,
                        produced.producer_step_id,
                        produced.location.describe(),
                        origin.describe(),
                        id
                    ),
                );
            } else {
                let severity = if published {
                    Severity::Hard
                } else {
                    findings.severity()
                };
                findings.graded(
                    severity,
                    step,
                    field,
                    format!(
                        "'{}' leaves step '{}' at {} but is taken from {}; no transfer is derived within a station",
                        input.assembly_id,
                        produced.producer_step_id,
                        produced.location.describe(),
                        origin.describe()
                    ),
                );
            }
        }
    }
}

/// Assemblies produced by the last step are final outputs
fn unconsumed_intermediate(ctx: &RuleContext<'_>, findings: &mut Findings) {
    let finals: HashSet<&str> = ctx
        .graph
        .last_step()
        .map(|s| s.outputs.iter().map(|o| o.assembly_id.as_str()).collect())
        .unwrap_or_default();

    for assembly_id in ctx.graph.produced_assemblies() {
        if finals.contains(assembly_id) || !ctx.graph.consumers_of(assembly_id).is_empty() {
            continue;
        }
        if let Some(producer) = ctx.graph.producer_of(assembly_id) {
            findings.step_field(
                producer,
                "outputs",
                format!("Intermediate '{assembly_id}' is never consumed"),
            );
        }
    }
}

fn undeclared_assembly(ctx: &RuleContext<'_>, findings: &mut Findings) {
    let mut reported = HashSet::new();
    for step in ctx.steps() {
        for (path, flow) in flow_refs(step) {
            if flow.is_in_build()
                && !ctx.is_declared(&flow.assembly_id)
                && reported.insert(flow.assembly_id.clone())
            {
                findings.step_field(
                    step,
                    path,
                    format!("Assembly '{}' is referenced but not declared", flow.assembly_id),
                );
            }
        }
    }
    for assembly in ctx.build.assemblies.iter().filter(|a| a.stub) {
        findings
            .build(format!(
                "Assembly '{}' was auto-created as a stub; declare it",
                assembly.id
            ))
            .field_path = Some(format!("assemblies[{}]", assembly.id));
    }
}

fn lineage_target_exists(ctx: &RuleContext<'_>, findings: &mut Findings) {
    for assembly in &ctx.build.assemblies {
        let Some(target) = assembly.lineage.as_deref() else {
            continue;
        };
        if !ctx.is_declared(target) {
            findings
                .build(format!(
                    "Assembly '{}' derives from unknown assembly '{}'",
                    assembly.id, target
                ))
                .field_path = Some(format!("assemblies[{}].lineage", assembly.id));
        }
    }
}

fn lineage_acyclic(ctx: &RuleContext<'_>, findings: &mut Findings) {
    let mut edges: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for assembly in &ctx.build.assemblies {
        let next = edges.entry(assembly.id.clone()).or_default();
        if let Some(target) = &assembly.lineage {
            next.insert(target.clone());
        }
    }
    for cycle in find_cycles(&edges) {
        let head = cycle.first().cloned().unwrap_or_default();
        findings
            .build(format!("Assembly lineage loops: {}", format_cycle(&cycle)))
            .field_path = Some(format!("assemblies[{head}].lineage"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PreplineConfig;
    use crate::models::{Assembly, Build};
    use crate::rules::base::run_rule;

    fn check(rule_id: &str, build: &Build) -> Vec<crate::models::ValidationError> {
        let config = PreplineConfig::default();
        let ctx = RuleContext::new(build, &config, None);
        let rules = rules();
        let rule = rules.iter().find(|r| r.id() == rule_id).expect("rule registered");
        run_rule(rule.as_ref(), &ctx)
    }

    fn producer(id: &str, order: u32, assembly: &str) -> Step {
        Step::new(id, order, ActionFamily::Prep)
            .with_station("garnish")
            .with_output(FlowRef::new(assembly))
    }

    #[test]
    fn test_single_producer_regardless_of_status() {
        let draft = Build::new("b")
            .with_step(producer("x", 1, "a1"))
            .with_step(producer("y", 2, "a1"));
        let published = draft.clone().published();
        for build in [draft, published] {
            let errors = check("assembly-single-producer", &build);
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].severity, Severity::Hard);
            assert_eq!(errors[0].step_id.as_deref(), Some("y"));
        }
    }

    #[test]
    fn test_producer_rules() {
        let build = Build::new("b")
            .with_step(producer("x", 1, "a1"))
            .with_step(
                Step::new("y", 2, ActionFamily::Assemble)
                    .with_input(FlowRef::new("ghost"))
                    .with_input(FlowRef::external("a1"))
                    .with_output(FlowRef::new("y_out")),
            );
        assert_eq!(check("input-has-producer", &build).len(), 1);
        assert_eq!(check("external-assembly-produced", &build).len(), 1);
    }

    #[test]
    fn test_self_consumption_and_duplicates() {
        let build = Build::new("b").with_step(
            Step::new("x", 1, ActionFamily::Prep)
                .with_input(FlowRef::new("a"))
                .with_input(FlowRef::new("a"))
                .with_output(FlowRef::new("a")),
        );
        assert_eq!(check("self-consumption", &build).len(), 2);
        assert_eq!(check("duplicate-flow-ref", &build).len(), 1);
    }

    #[test]
    fn test_flow_ref_locations() {
        let ambiguous = Location {
            station_id: None,
            sub_location: Some(SubLocation::ColdStorage),
            equipment_id: None,
        };
        let no_sub = Location {
            station_id: Some("garnish".to_string()),
            sub_location: None,
            equipment_id: None,
        };
        let no_appliance = Location::at("fryer", SubLocation::Equipment);
        let build = Build::new("b").with_step(
            Step::new("x", 1, ActionFamily::Prep)
                .with_input(FlowRef::external("a").with_location(ambiguous))
                .with_input(FlowRef::external("b").with_location(no_sub))
                .with_output(FlowRef::new("c").with_location(no_appliance)),
        );
        assert_eq!(check("flow-ref-station-when-ambiguous", &build).len(), 1);
        assert_eq!(check("flow-ref-requires-sub-location", &build).len(), 1);
        assert_eq!(check("flow-ref-equipment-requires-appliance", &build).len(), 1);
    }

    #[test]
    fn test_origin_mismatch_grading() {
        let out_at = Location::at("garnish", SubLocation::WorkSurface);
        let build_with = |origin: Location| {
            Build::new("b")
                .with_step(
                    Step::new("x", 1, ActionFamily::Prep)
                        .with_station("garnish")
                        .with_output(FlowRef::new("a").with_location(out_at.clone())),
                )
                .with_step(
                    Step::new("y", 2, ActionFamily::Prep)
                        .with_station("garnish")
                        .with_input(FlowRef::new("a").with_location(origin))
                        .with_output(FlowRef::new("b")),
                )
        };

        let same_station = build_with(Location::at("garnish", SubLocation::ColdRail));
        let errors = check("input-origin-matches-producer", &same_station);
        assert_eq!(errors[0].severity, Severity::Soft);
        let errors = check("input-origin-matches-producer", &same_station.clone().published());
        assert_eq!(errors[0].severity, Severity::Hard);

        let cross = build_with(Location::at("speed_line", SubLocation::WorkSurface));
        let errors = check("input-origin-matches-producer", &cross);
        assert_eq!(errors[0].severity, Severity::Info);
        assert!(errors[0].message.contains("xfer:x->y:a"));
        let errors = check("input-origin-matches-producer", &cross.clone().published());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].severity, Severity::Hard);

        let matching = build_with(out_at.clone());
        assert!(check("input-origin-matches-producer", &matching).is_empty());
    }

    #[test]
    fn test_assembly_rules() {
        let build = Build::new("b")
            .with_assembly(Assembly::new("a").with_lineage("b"))
            .with_assembly(Assembly::new("b").with_lineage("a"))
            .with_assembly(Assembly::new("c").with_lineage("missing"))
            .with_assembly(Assembly::stub("d"))
            .with_step(producer("x", 1, "e"))
            .with_step(producer("y", 2, "f"));
        assert_eq!(check("lineage-acyclic", &build).len(), 1);
        assert_eq!(check("lineage-target-exists", &build).len(), 1);
        // 'e' and 'f' are undeclared, 'd' is a stub
        assert_eq!(check("undeclared-assembly", &build).len(), 3);
        // 'e' is never consumed, 'f' is the final output
        assert_eq!(check("unconsumed-intermediate", &build).len(), 1);
    }

    #[test]
    fn test_authored_transfer() {
        let build = Build::new("b").with_step(
            Step::new("x", 1, ActionFamily::Transfer).with_output(FlowRef::new("a")),
        );
        assert_eq!(check("transfer-steps-derived-only", &build).len(), 1);
        let empty = Build::new("b").with_step(Step::new("x", 1, ActionFamily::Prep));
        assert_eq!(check("step-requires-output", &empty).len(), 1);
    }
}
