//! Workflow-pattern rules: station movement, merges and lineage hygiene

use super::base::{FnRule, Findings, Rule, RuleContext, RuleScope};
use crate::graph::{grouping_bounces, station_bounces, Bounce};
use crate::models::{MergeRole, Severity};
use std::sync::Arc;

pub fn rules() -> Vec<Arc<dyn Rule>> {
    vec![
        Arc::new(FnRule::new(
            "grouping-bounce",
            "A track should not leave an area and come back to it",
            Severity::Strong,
            RuleScope::Workflow,
            grouping_bounce,
        )),
        Arc::new(FnRule::new(
            "station-bounce",
            "A track should not leave a station and come back within the same area",
            Severity::Soft,
            RuleScope::Workflow,
            station_bounce,
        )),
        Arc::new(FnRule::new(
            "merge-single-base",
            "Merge steps need exactly one base input",
            Severity::Strong,
            RuleScope::Flow,
            merge_single_base,
        )),
        Arc::new(FnRule::new(
            "merge-role-on-single-input",
            "Merge roles only mean something on merge steps",
            Severity::Info,
            RuleScope::Flow,
            merge_role_on_single_input,
        )),
        Arc::new(FnRule::new(
            "transform-sets-lineage",
            "One-to-one transforms should record lineage",
            Severity::Info,
            RuleScope::Assembly,
            transform_sets_lineage,
        )),
        Arc::new(FnRule::new(
            "final-output-at-expo",
            "The final step should leave its output at expo",
            Severity::Soft,
            RuleScope::Workflow,
            final_output_at_expo,
        )),
    ]
}

fn report_bounces(ctx: &RuleContext<'_>, findings: &mut Findings, bounces: Vec<Bounce>, what: &str) {
    for bounce in bounces {
        let Some(step) = ctx.graph.step(&bounce.returned_at) else {
            continue;
        };
        findings.step(
            step,
            format!(
                "Track '{}' returns to {} '{}' after leaving at step '{}'",
                bounce.track_id, what, bounce.place, bounce.left_at
            ),
        );
    }
}

fn grouping_bounce(ctx: &RuleContext<'_>, findings: &mut Findings) {
    let bounces = grouping_bounces(&ctx.graph, ctx.tables());
    report_bounces(ctx, findings, bounces, "area");
}

fn station_bounce(ctx: &RuleContext<'_>, findings: &mut Findings) {
    let bounces = station_bounces(&ctx.graph, ctx.tables());
    report_bounces(ctx, findings, bounces, "station");
}

fn merge_single_base(ctx: &RuleContext<'_>, findings: &mut Findings) {
    for step in ctx.steps().iter().filter(|s| s.inputs.len() >= 2) {
        let bases = step
            .inputs
            .iter()
            .filter(|i| i.role == Some(MergeRole::Base))
            .count();
        if bases != 1 {
            findings.step_field(
                step,
                "inputs",
                format!(
                    "Merge step '{}' has {} base inputs; exactly one is required",
                    step.id, bases
                ),
            );
        }
    }
}

fn merge_role_on_single_input(ctx: &RuleContext<'_>, findings: &mut Findings) {
    for step in ctx.steps().iter().filter(|s| s.inputs.len() == 1) {
        if step.inputs[0].role.is_some() {
            findings.step_field(
                step,
                "inputs[0].role",
                "Merge role set on a step with a single input",
            );
        }
    }
}

fn transform_sets_lineage(ctx: &RuleContext<'_>, findings: &mut Findings) {
    for step in ctx.steps() {
        let ([input], [output]) = (step.inputs.as_slice(), step.outputs.as_slice()) else {
            continue;
        };
        if !input.is_in_build() || input.assembly_id == output.assembly_id {
            continue;
        }
        let has_lineage = ctx
            .build
            .assembly(&output.assembly_id)
            .is_some_and(|a| a.lineage.is_some());
        if !has_lineage {
            findings.step_field(
                step,
                "outputs[0]",
                format!(
                    "'{}' is transformed from '{}' but records no lineage",
                    output.assembly_id, input.assembly_id
                ),
            );
        }
    }
}

fn final_output_at_expo(ctx: &RuleContext<'_>, findings: &mut Findings) {
    let Some(last) = ctx.graph.last_step() else {
        return;
    };
    let expo = ctx.tables().expo_station.as_str();
    for (i, output) in last.outputs.iter().enumerate() {
        let Some(station) = output.location.as_ref().and_then(|l| l.station_id.as_deref()) else {
            continue;
        };
        if station != expo {
            findings.step_field(
                last,
                format!("outputs[{i}].location"),
                format!(
                    "Final output '{}' ends at '{}' rather than '{}'",
                    output.assembly_id, station, expo
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PreplineConfig;
    use crate::models::{ActionFamily, Assembly, Build, FlowRef, Location, Step, SubLocation};
    use crate::rules::base::run_rule;

    fn check(rule_id: &str, build: &Build) -> Vec<crate::models::ValidationError> {
        let config = PreplineConfig::default();
        let ctx = RuleContext::new(build, &config, None);
        let rules = rules();
        let rule = rules.iter().find(|r| r.id() == rule_id).expect("rule registered");
        run_rule(rule.as_ref(), &ctx)
    }

    fn build_at(stations: &[&str]) -> Build {
        let mut build = Build::new("b");
        for (i, station) in stations.iter().enumerate() {
            build = build.with_step(
                Step::new(&format!("s{}", i + 1), i as u32 + 1, ActionFamily::Prep)
                    .with_station(station),
            );
        }
        build
    }

    #[test]
    fn test_bounces() {
        let area = build_at(&["garnish", "toaster", "garnish"]);
        let errors = check("grouping-bounce", &area);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].step_id.as_deref(), Some("s3"));
        assert!(check("station-bounce", &area).is_empty());

        let station = build_at(&["garnish", "speed_line", "garnish"]);
        assert!(check("grouping-bounce", &station).is_empty());
        assert_eq!(check("station-bounce", &station).len(), 1);
    }

    #[test]
    fn test_merge_roles() {
        let no_base = Build::new("b").with_step(
            Step::new("m", 1, ActionFamily::Assemble)
                .with_input(FlowRef::external("a"))
                .with_input(FlowRef::external("b").with_role(MergeRole::Added))
                .with_output(FlowRef::new("c")),
        );
        assert_eq!(check("merge-single-base", &no_base).len(), 1);

        let one_base = Build::new("b").with_step(
            Step::new("m", 1, ActionFamily::Assemble)
                .with_input(FlowRef::external("a").with_role(MergeRole::Base))
                .with_input(FlowRef::external("b").with_role(MergeRole::Added))
                .with_output(FlowRef::new("c")),
        );
        assert!(check("merge-single-base", &one_base).is_empty());

        let single = Build::new("b").with_step(
            Step::new("m", 1, ActionFamily::Prep)
                .with_input(FlowRef::external("a").with_role(MergeRole::Base))
                .with_output(FlowRef::new("c")),
        );
        assert_eq!(check("merge-role-on-single-input", &single).len(), 1);
    }

    #[test]
    fn test_transform_lineage() {
        let steps = |build: Build| {
            build
                .with_step(Step::new("x", 1, ActionFamily::Prep).with_output(FlowRef::new("raw")))
                .with_step(
                    Step::new("y", 2, ActionFamily::Heat)
                        .with_input(FlowRef::new("raw"))
                        .with_output(FlowRef::new("cooked")),
                )
        };
        let missing = steps(Build::new("b"));
        assert_eq!(check("transform-sets-lineage", &missing).len(), 1);
        let recorded = steps(Build::new("b").with_assembly(Assembly::new("cooked").with_lineage("raw")));
        assert!(check("transform-sets-lineage", &recorded).is_empty());
    }

    #[test]
    fn test_final_output_at_expo() {
        let at = |station: &str| {
            Build::new("b").with_step(
                Step::new("x", 1, ActionFamily::Package).with_output(
                    FlowRef::new("done").with_location(Location::at(station, SubLocation::WindowShelf)),
                ),
            )
        };
        assert!(check("final-output-at-expo", &at("expo")).is_empty());
        assert_eq!(check("final-output-at-expo", &at("garnish")).len(), 1);
        let unlocated = Build::new("b")
            .with_step(Step::new("x", 1, ActionFamily::Package).with_output(FlowRef::new("done")));
        assert!(check("final-output-at-expo", &unlocated).is_empty());
    }
}
