//! Field-presence rules keyed on a step's action family

use super::base::{FnRule, Findings, Rule, RuleContext, RuleScope};
use crate::models::{ActionFamily, PrepType, Severity, Step};
use std::sync::Arc;

pub fn rules() -> Vec<Arc<dyn Rule>> {
    vec![
        Arc::new(FnRule::new(
            "heat-requires-equipment",
            "Heat steps must name the appliance they use",
            Severity::Hard,
            RuleScope::Step,
            heat_requires_equipment,
        )),
        Arc::new(FnRule::new(
            "heat-requires-time-or-notes",
            "Heat steps need a duration or notes",
            Severity::Hard,
            RuleScope::Step,
            heat_requires_time_or_notes,
        )),
        Arc::new(FnRule::new(
            "package-requires-container",
            "Package steps need a container or packaging target",
            Severity::Hard,
            RuleScope::Step,
            package_requires_container,
        )),
        Arc::new(FnRule::new(
            "portion-requires-quantity-or-notes",
            "Portion steps need a quantity or notes",
            Severity::Strong,
            RuleScope::Step,
            portion_requires_quantity_or_notes,
        )),
        Arc::new(FnRule::new(
            "prep-requires-technique-or-notes",
            "Prep steps should name a technique or carry notes",
            Severity::Soft,
            RuleScope::Step,
            prep_requires_technique_or_notes,
        )),
        Arc::new(FnRule::new(
            "pre-service-output-location",
            "Pre-service steps need an explicit output sub-location",
            Severity::Strong,
            RuleScope::Step,
            pre_service_output_location,
        )),
        Arc::new(FnRule::new(
            "bulk-prep-requires-pre-service",
            "Bulk prep must happen before service",
            Severity::Strong,
            RuleScope::Step,
            bulk_prep_requires_pre_service,
        )),
        Arc::new(FnRule::new(
            "quantity-positive",
            "Quantities must be positive",
            Severity::Hard,
            RuleScope::Step,
            quantity_positive,
        )),
        Arc::new(FnRule::new(
            "duration-positive",
            "Durations must be positive",
            Severity::Strong,
            RuleScope::Step,
            duration_positive,
        )),
    ]
}

fn non_blank(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

fn of_family<'c, 'a>(
    ctx: &'c RuleContext<'a>,
    family: ActionFamily,
) -> impl Iterator<Item = &'a Step> + 'c {
    ctx.steps().iter().copied().filter(move |s| s.family() == family)
}

fn heat_requires_equipment(ctx: &RuleContext<'_>, findings: &mut Findings) {
    for step in of_family(ctx, ActionFamily::Heat) {
        let on_location = step
            .work_location
            .as_ref()
            .is_some_and(|l| l.equipment_id.is_some());
        if step.equipment_id.is_none() && !on_location {
            findings.step_field(
                step,
                "equipmentId",
                format!("Heat step '{}' does not name its equipment", step.id),
            );
        }
    }
}

fn heat_requires_time_or_notes(ctx: &RuleContext<'_>, findings: &mut Findings) {
    for step in of_family(ctx, ActionFamily::Heat) {
        if step.time.is_none() && !step.has_notes() {
            findings.step_field(
                step,
                "time",
                format!("Heat step '{}' has neither a duration nor notes", step.id),
            );
        }
    }
}

fn package_requires_container(ctx: &RuleContext<'_>, findings: &mut Findings) {
    for step in of_family(ctx, ActionFamily::Package) {
        if !non_blank(step.container.as_deref()) && !non_blank(step.packaging_target.as_deref()) {
            findings.step_field(
                step,
                "container",
                format!(
                    "Package step '{}' has neither a container nor a packaging target",
                    step.id
                ),
            );
        }
    }
}

fn portion_requires_quantity_or_notes(ctx: &RuleContext<'_>, findings: &mut Findings) {
    for step in of_family(ctx, ActionFamily::Portion) {
        if step.quantity.is_none() && !step.has_notes() {
            findings.step_field(
                step,
                "quantity",
                format!("Portion step '{}' has neither a quantity nor notes", step.id),
            );
        }
    }
}

fn prep_requires_technique_or_notes(ctx: &RuleContext<'_>, findings: &mut Findings) {
    for step in of_family(ctx, ActionFamily::Prep) {
        if step.technique().is_none() && !step.has_notes() {
            findings.step_field(
                step,
                "action.techniqueId",
                format!("Prep step '{}' has neither a technique nor notes", step.id),
            );
        }
    }
}

fn pre_service_output_location(ctx: &RuleContext<'_>, findings: &mut Findings) {
    for step in ctx.steps() {
        if step.prep_type != Some(PrepType::PreService) {
            continue;
        }
        for (i, output) in step.outputs.iter().enumerate() {
            let has_sub = output
                .location
                .as_ref()
                .is_some_and(|l| l.sub_location.is_some());
            if !has_sub {
                findings.step_field(
                    step,
                    format!("outputs[{i}].location"),
                    format!(
                        "Pre-service step '{}' must say where '{}' is stored",
                        step.id, output.assembly_id
                    ),
                );
            }
        }
    }
}

fn bulk_prep_requires_pre_service(ctx: &RuleContext<'_>, findings: &mut Findings) {
    for step in ctx.steps() {
        if step.bulk_prep && step.prep_type != Some(PrepType::PreService) {
            findings.step_field(
                step,
                "prepType",
                format!("Bulk prep step '{}' is not marked pre-service", step.id),
            );
        }
    }
}

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn quantity_positive(ctx: &RuleContext<'_>, findings: &mut Findings) {
    for step in ctx.steps() {
        if let Some(q) = step.quantity.as_ref().filter(|q| !positive(q.value)) {
            findings.step_field(
                step,
                "quantity.value",
                format!("Step '{}' has non-positive quantity {}", step.id, q.value),
            );
        }
        let refs = step
            .inputs
            .iter()
            .enumerate()
            .map(|(i, r)| (format!("inputs[{i}]"), r))
            .chain(
                step.outputs
                    .iter()
                    .enumerate()
                    .map(|(i, r)| (format!("outputs[{i}]"), r)),
            );
        for (path, flow) in refs {
            if let Some(q) = flow.quantity.as_ref().filter(|q| !positive(q.value)) {
                findings.step_field(
                    step,
                    format!("{path}.quantity.value"),
                    format!(
                        "Step '{}' moves non-positive quantity {} of '{}'",
                        step.id, q.value, flow.assembly_id
                    ),
                );
            }
        }
    }
}

fn duration_positive(ctx: &RuleContext<'_>, findings: &mut Findings) {
    for step in ctx.steps() {
        if let Some(seconds) = step.duration_seconds().filter(|s| !positive(*s)) {
            findings.step_field(
                step,
                "time.durationSeconds",
                format!("Step '{}' has non-positive duration {}s", step.id, seconds),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PreplineConfig;
    use crate::models::{Build, FlowRef, Location, Quantity, SubLocation};
    use crate::rules::base::run_rule;

    fn check(rule_id: &str, step: Step) -> usize {
        let build = Build::new("b").with_step(step);
        let config = PreplineConfig::default();
        let ctx = RuleContext::new(&build, &config, None);
        let rules = rules();
        let rule = rules.iter().find(|r| r.id() == rule_id).expect("rule registered");
        run_rule(rule.as_ref(), &ctx).len()
    }

    #[test]
    fn test_heat_rules() {
        let bare = Step::new("s", 1, ActionFamily::Heat).with_station("turbo");
        assert_eq!(check("heat-requires-equipment", bare.clone()), 1);
        assert_eq!(check("heat-requires-time-or-notes", bare.clone()), 1);

        let mut noted = bare.with_equipment("turbo_oven");
        noted.notes = Some("until golden".to_string());
        assert_eq!(check("heat-requires-equipment", noted.clone()), 0);
        assert_eq!(check("heat-requires-time-or-notes", noted), 0);
    }

    #[test]
    fn test_package_and_portion() {
        let mut package = Step::new("s", 1, ActionFamily::Package);
        assert_eq!(check("package-requires-container", package.clone()), 1);
        package.packaging_target = Some("wrapper".to_string());
        assert_eq!(check("package-requires-container", package), 0);

        let mut portion = Step::new("s", 1, ActionFamily::Portion);
        assert_eq!(check("portion-requires-quantity-or-notes", portion.clone()), 1);
        portion.quantity = Some(Quantity {
            value: 2.0,
            unit: "oz".to_string(),
        });
        assert_eq!(check("portion-requires-quantity-or-notes", portion), 0);
    }

    #[test]
    fn test_pre_service_rules() {
        let mut step = Step::new("s", 1, ActionFamily::Prep)
            .with_output(FlowRef::new("a"))
            .with_output(
                FlowRef::new("b").with_location(Location::at("prep", SubLocation::ColdStorage)),
            );
        step.bulk_prep = true;
        assert_eq!(check("bulk-prep-requires-pre-service", step.clone()), 1);
        step.prep_type = Some(PrepType::PreService);
        assert_eq!(check("bulk-prep-requires-pre-service", step.clone()), 0);
        assert_eq!(check("pre-service-output-location", step), 1);
    }

    #[test]
    fn test_positive_values() {
        let mut step = Step::new("s", 1, ActionFamily::Heat).with_duration(0.0);
        step.quantity = Some(Quantity {
            value: -1.0,
            unit: String::new(),
        });
        let mut flow = FlowRef::new("a");
        flow.quantity = Some(Quantity {
            value: 0.0,
            unit: "g".to_string(),
        });
        let step = step.with_input(flow);
        assert_eq!(check("quantity-positive", step.clone()), 2);
        assert_eq!(check("duration-positive", step), 1);
    }
}
