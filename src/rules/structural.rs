//! Structural rules: ids, dependency references and ordering

use super::base::{FnRule, Findings, Rule, RuleContext, RuleScope};
use crate::models::Severity;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

pub fn rules() -> Vec<Arc<dyn Rule>> {
    vec![
        Arc::new(FnRule::new(
            "non-empty-build",
            "A build must contain at least one step",
            Severity::Hard,
            RuleScope::Build,
            non_empty_build,
        )),
        Arc::new(FnRule::new(
            "unique-step-ids",
            "Step ids must be unique within a build",
            Severity::Hard,
            RuleScope::Build,
            unique_step_ids,
        )),
        Arc::new(FnRule::new(
            "unique-assembly-ids",
            "Assembly ids must be unique within a build",
            Severity::Hard,
            RuleScope::Assembly,
            unique_assembly_ids,
        )),
        Arc::new(FnRule::new(
            "dependency-refs-resolve",
            "Every dependency must name a step in the build",
            Severity::Hard,
            RuleScope::Step,
            dependency_refs_resolve,
        )),
        Arc::new(FnRule::new(
            "no-self-dependency",
            "A step cannot depend on itself",
            Severity::Hard,
            RuleScope::Step,
            no_self_dependency,
        )),
        Arc::new(FnRule::new(
            "dependency-coverage",
            "Enough steps after the first in order must declare dependencies",
            Severity::Soft,
            RuleScope::Build,
            dependency_coverage,
        )),
        Arc::new(FnRule::new(
            "unique-order-index",
            "Order indexes should be unique",
            Severity::Soft,
            RuleScope::Step,
            unique_order_index,
        )),
        Arc::new(FnRule::new(
            "dependency-order",
            "A dependency should not come later in order than its dependent",
            Severity::Soft,
            RuleScope::Step,
            dependency_order,
        )),
    ]
}

fn non_empty_build(ctx: &RuleContext<'_>, findings: &mut Findings) {
    if ctx.build.steps.is_empty() {
        findings.build(format!("Build '{}' has no steps", ctx.build.id));
    }
}

fn unique_step_ids(ctx: &RuleContext<'_>, findings: &mut Findings) {
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    for step in ctx.steps() {
        if !seen.insert(step.id.as_str()) && reported.insert(step.id.as_str()) {
            let count = ctx.build.steps.iter().filter(|s| s.id == step.id).count();
            findings.step_field(
                step,
                "id",
                format!("Step id '{}' is used by {} steps", step.id, count),
            );
        }
    }
}

fn unique_assembly_ids(ctx: &RuleContext<'_>, findings: &mut Findings) {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for assembly in &ctx.build.assemblies {
        *counts.entry(assembly.id.as_str()).or_insert(0) += 1;
    }
    for (id, count) in counts.into_iter().filter(|(_, n)| *n > 1) {
        findings
            .build(format!("Assembly id '{id}' is declared {count} times"))
            .field_path = Some(format!("assemblies[{id}]"));
    }
}

fn dependency_refs_resolve(ctx: &RuleContext<'_>, findings: &mut Findings) {
    for step in ctx.steps() {
        for (i, dep) in step.depends_on.iter().enumerate() {
            if ctx.graph.step(dep).is_none() {
                findings.step_field(
                    step,
                    format!("dependsOn[{i}]"),
                    format!("Step '{}' depends on unknown step '{}'", step.id, dep),
                );
            }
        }
    }
}

fn no_self_dependency(ctx: &RuleContext<'_>, findings: &mut Findings) {
    for step in ctx.steps() {
        if let Some(i) = step.depends_on.iter().position(|d| *d == step.id) {
            findings.step_field(
                step,
                format!("dependsOn[{i}]"),
                format!("Step '{}' depends on itself", step.id),
            );
        }
    }
}

/// The first step in order cannot depend on anything, so it is excluded
fn dependency_coverage(ctx: &RuleContext<'_>, findings: &mut Findings) {
    let eligible = ctx.steps().iter().skip(1);
    let total = eligible.len();
    if total == 0 {
        return;
    }
    let covered = eligible.filter(|s| !s.depends_on.is_empty()).count();
    let coverage = covered as f64 / total as f64;
    let threshold = ctx.config.validation.under_specified_threshold;
    if coverage < threshold {
        findings.build(format!(
            "Build is under-specified: {}/{} steps after the first declare a dependency ({:.0}% < {:.0}%)",
            covered,
            total,
            coverage * 100.0,
            threshold * 100.0
        ));
    }
}

fn unique_order_index(ctx: &RuleContext<'_>, findings: &mut Findings) {
    let mut first_at: BTreeMap<u32, &str> = BTreeMap::new();
    for step in ctx.steps() {
        match first_at.get(&step.order_index) {
            Some(first) => {
                findings.step_field(
                    step,
                    "orderIndex",
                    format!(
                        "Order index {} is shared with step '{}'",
                        step.order_index, first
                    ),
                );
            }
            None => {
                first_at.insert(step.order_index, step.id.as_str());
            }
        }
    }
}

fn dependency_order(ctx: &RuleContext<'_>, findings: &mut Findings) {
    for step in ctx.steps() {
        for (i, dep) in step.depends_on.iter().enumerate() {
            let Some(upstream) = ctx.graph.step(dep) else {
                continue;
            };
            if upstream.order_index > step.order_index {
                findings.step_field(
                    step,
                    format!("dependsOn[{i}]"),
                    format!(
                        "Step '{}' (order {}) depends on later step '{}' (order {})",
                        step.id, step.order_index, upstream.id, upstream.order_index
                    ),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PreplineConfig;
    use crate::models::{ActionFamily, Assembly, Build, Step};
    use crate::rules::base::run_rule;

    fn check(rule_id: &str, build: &Build) -> Vec<crate::models::ValidationError> {
        let config = PreplineConfig::default();
        let ctx = RuleContext::new(build, &config, None);
        let rules = rules();
        let rule = rules.iter().find(|r| r.id() == rule_id).expect("rule registered");
        run_rule(rule.as_ref(), &ctx)
    }

    #[test]
    fn test_empty_build() {
        assert_eq!(check("non-empty-build", &Build::new("b")).len(), 1);
    }

    #[test]
    fn test_duplicate_step_ids_reported_once() {
        let build = Build::new("b")
            .with_step(Step::new("s", 1, ActionFamily::Prep))
            .with_step(Step::new("s", 2, ActionFamily::Prep))
            .with_step(Step::new("s", 3, ActionFamily::Prep));
        let errors = check("unique-step-ids", &build);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("3 steps"));
    }

    #[test]
    fn test_duplicate_assembly_ids() {
        let build = Build::new("b")
            .with_assembly(Assembly::new("a"))
            .with_assembly(Assembly::new("a"));
        assert_eq!(check("unique-assembly-ids", &build).len(), 1);
    }

    #[test]
    fn test_dependency_refs() {
        let build = Build::new("b")
            .with_step(Step::new("s1", 1, ActionFamily::Prep).depending_on("s1"))
            .with_step(Step::new("s2", 2, ActionFamily::Prep).depending_on("ghost"));
        assert_eq!(check("dependency-refs-resolve", &build).len(), 1);
        assert_eq!(check("no-self-dependency", &build).len(), 1);
    }

    #[test]
    fn test_dependency_coverage() {
        let sparse = Build::new("b")
            .with_step(Step::new("s1", 1, ActionFamily::Prep))
            .with_step(Step::new("s2", 2, ActionFamily::Prep))
            .with_step(Step::new("s3", 3, ActionFamily::Prep).depending_on("s2"));
        assert_eq!(check("dependency-coverage", &sparse).len(), 1);

        let chained = Build::new("b")
            .with_step(Step::new("s1", 1, ActionFamily::Prep))
            .with_step(Step::new("s2", 2, ActionFamily::Prep).depending_on("s1"))
            .with_step(Step::new("s3", 3, ActionFamily::Prep).depending_on("s2"));
        assert!(check("dependency-coverage", &chained).is_empty());
    }

    #[test]
    fn test_order_rules() {
        let build = Build::new("b")
            .with_step(Step::new("s1", 1, ActionFamily::Prep).depending_on("s3"))
            .with_step(Step::new("s2", 1, ActionFamily::Prep))
            .with_step(Step::new("s3", 3, ActionFamily::Prep));
        assert_eq!(check("unique-order-index", &build).len(), 1);
        assert_eq!(check("dependency-order", &build).len(), 1);
    }
}
