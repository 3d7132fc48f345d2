//! Dependency cycle rule

use super::base::{Findings, Rule, RuleContext, RuleScope};
use crate::graph::{find_cycles, format_cycle};
use crate::models::Severity;
use std::collections::{BTreeMap, BTreeSet};

/// Reports each dependency cycle exactly once
///
/// Self-dependencies are left to `no-self-dependency`.
pub struct DagAcyclicRule;

impl DagAcyclicRule {
    fn dependency_edges(ctx: &RuleContext<'_>) -> BTreeMap<String, BTreeSet<String>> {
        let mut edges: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for step in ctx.steps() {
            let deps = edges.entry(step.id.clone()).or_default();
            for dep in &step.depends_on {
                if *dep != step.id && ctx.graph.step(dep).is_some() {
                    deps.insert(dep.clone());
                }
            }
        }
        edges
    }
}

impl Rule for DagAcyclicRule {
    fn id(&self) -> &'static str {
        "dag-acyclic"
    }

    fn description(&self) -> &'static str {
        "The dependency relation must not contain cycles"
    }

    fn default_severity(&self) -> Severity {
        Severity::Hard
    }

    fn scope(&self) -> RuleScope {
        RuleScope::Build
    }

    fn check(&self, ctx: &RuleContext<'_>, findings: &mut Findings) {
        for cycle in find_cycles(&Self::dependency_edges(ctx)) {
            let Some(step) = cycle.first().and_then(|id| ctx.graph.step(id)) else {
                continue;
            };
            findings.step_field(
                step,
                "dependsOn",
                format!(
                    "Dependency cycle of {} steps: {}",
                    cycle.len(),
                    format_cycle(&cycle)
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PreplineConfig;
    use crate::models::{ActionFamily, Build, Step};
    use crate::rules::base::run_rule;

    fn cycle_build(order: &[(&str, u32, &str)]) -> Build {
        let mut build = Build::new("b");
        for (id, idx, dep) in order {
            build = build.with_step(Step::new(id, *idx, ActionFamily::Prep).depending_on(dep));
        }
        build
    }

    #[test]
    fn test_three_cycle_reported_once() {
        let config = PreplineConfig::default();
        let build = cycle_build(&[("a", 1, "c"), ("b", 2, "a"), ("c", 3, "b")]);
        let ctx = RuleContext::new(&build, &config, None);
        let errors = run_rule(&DagAcyclicRule, &ctx);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].step_id.as_deref(), Some("a"));
    }

    #[test]
    fn test_cycle_independent_of_step_order() {
        let config = PreplineConfig::default();
        let forward = cycle_build(&[("a", 1, "c"), ("b", 2, "a"), ("c", 3, "b")]);
        let shuffled = cycle_build(&[("c", 1, "b"), ("a", 2, "c"), ("b", 3, "a")]);
        let ctx_a = RuleContext::new(&forward, &config, None);
        let ctx_b = RuleContext::new(&shuffled, &config, None);
        let a = run_rule(&DagAcyclicRule, &ctx_a);
        let b = run_rule(&DagAcyclicRule, &ctx_b);
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].message, b[0].message);
    }

    #[test]
    fn test_self_dependency_is_not_a_cycle_here() {
        let config = PreplineConfig::default();
        let build = cycle_build(&[("a", 1, "a")]);
        let ctx = RuleContext::new(&build, &config, None);
        assert!(run_rule(&DagAcyclicRule, &ctx).is_empty());
    }
}
