//! Bill-of-materials coverage rules
//!
//! Both rules are silent unless the caller supplies a BOM.

use super::base::{FnRule, Findings, Rule, RuleContext, RuleScope};
use crate::models::Severity;
use std::collections::HashSet;
use std::sync::Arc;

pub fn rules() -> Vec<Arc<dyn Rule>> {
    vec![
        Arc::new(FnRule::new(
            "bom-component-covered",
            "Every BOM component must be reachable from the build",
            Severity::Strong,
            RuleScope::Bom,
            bom_component_covered,
        )),
        Arc::new(FnRule::new(
            "bom-unknown-component",
            "Assembly components should appear in the BOM",
            Severity::Info,
            RuleScope::Bom,
            bom_unknown_component,
        )),
    ]
}

/// Component ids an assembly lists or a step pulls in from outside the build
fn reachable_components<'a>(ctx: &RuleContext<'a>) -> HashSet<&'a str> {
    let listed = ctx
        .build
        .assemblies
        .iter()
        .flat_map(|a| a.components.iter().map(|c| c.component_id.as_str()));
    let external = ctx
        .build
        .steps
        .iter()
        .flat_map(|s| s.inputs.iter())
        .filter(|i| !i.is_in_build())
        .map(|i| i.assembly_id.as_str());
    listed.chain(external).collect()
}

fn bom_component_covered(ctx: &RuleContext<'_>, findings: &mut Findings) {
    let Some(bom) = ctx.bom else {
        return;
    };
    let reachable = reachable_components(ctx);
    for entry in bom {
        if !reachable.contains(entry.component_id.as_str()) {
            let label = if entry.name.is_empty() {
                entry.component_id.clone()
            } else {
                format!("{} ({})", entry.component_id, entry.name)
            };
            findings
                .build(format!("BOM component {label} is not used by any assembly or input"))
                .field_path = Some(format!("bom[{}]", entry.component_id));
        }
    }
}

fn bom_unknown_component(ctx: &RuleContext<'_>, findings: &mut Findings) {
    let Some(bom) = ctx.bom else {
        return;
    };
    let known: HashSet<&str> = bom.iter().map(|e| e.component_id.as_str()).collect();
    for assembly in &ctx.build.assemblies {
        for (i, component) in assembly.components.iter().enumerate() {
            if !known.contains(component.component_id.as_str()) {
                findings
                    .build(format!(
                        "Assembly '{}' lists component '{}' which is not in the BOM",
                        assembly.id, component.component_id
                    ))
                    .field_path = Some(format!("assemblies[{}].components[{i}]", assembly.id));
            }
        }
    }
}
