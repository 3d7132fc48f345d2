//! Companion normalization run before the derivation passes
//!
//! Stubs undeclared assemblies, records lineage for 1:1 transforms, infers
//! group ids from lineage roots and assigns merge roles.

use super::DerivationReport;
use crate::models::{Assembly, Build, MergeRole};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

static VERSION_SUFFIX: OnceLock<Regex> = OnceLock::new();

fn version_suffix() -> &'static Regex {
    VERSION_SUFFIX.get_or_init(|| {
        Regex::new(r"^(?P<base>.+?)(?:[_\-.][vV]\d+|@\d+)$").expect("valid version suffix regex")
    })
}

/// Strip one trailing version marker: `_v2`, `-v3`, `.v1` or `@2`
pub fn strip_version_suffix(id: &str) -> &str {
    version_suffix()
        .captures(id)
        .and_then(|c| c.name("base"))
        .map(|m| m.as_str())
        .unwrap_or(id)
}

pub fn normalize(build: &Build, report: &mut DerivationReport) -> Build {
    let mut out = build.clone();
    stub_undeclared(&mut out, report);
    set_transform_lineage(&mut out, report);
    infer_group_ids(&mut out, report);
    assign_merge_roles(&mut out, report);
    out
}

fn stub_undeclared(build: &mut Build, report: &mut DerivationReport) {
    let mut declared: HashSet<String> = build.assemblies.iter().map(|a| a.id.clone()).collect();
    let mut order: Vec<&crate::models::Step> = build.steps.iter().collect();
    order.sort_by(|a, b| a.order_index.cmp(&b.order_index).then_with(|| a.id.cmp(&b.id)));

    let mut stubs = Vec::new();
    for step in order {
        let refs = step
            .inputs
            .iter()
            .chain(step.outputs.iter())
            .filter(|r| r.is_in_build());
        for flow in refs {
            if declared.insert(flow.assembly_id.clone()) {
                stubs.push(Assembly::stub(&flow.assembly_id));
            }
        }
    }
    report.stubs_created += stubs.len();
    build.assemblies.extend(stubs);
}

fn set_transform_lineage(build: &mut Build, report: &mut DerivationReport) {
    let mut lineage: Vec<(String, String)> = Vec::new();
    for step in &build.steps {
        let in_build: Vec<_> = step.inputs.iter().filter(|i| i.is_in_build()).collect();
        if in_build.len() != 1 || step.inputs.len() != 1 || step.outputs.len() != 1 {
            continue;
        }
        let input = &in_build[0].assembly_id;
        let output = &step.outputs[0].assembly_id;
        if input != output {
            lineage.push((output.clone(), input.clone()));
        }
    }

    for (output, input) in lineage {
        if let Some(assembly) = build
            .assemblies
            .iter_mut()
            .find(|a| a.id == output && a.lineage.is_none())
        {
            assembly.lineage = Some(input);
            report.lineage_set += 1;
        }
    }
}

/// Follow lineage pointers to the root, stopping at cycles and missing targets
pub fn lineage_root<'a>(assembly_id: &'a str, lineage: &HashMap<&'a str, &'a str>) -> &'a str {
    let mut current = assembly_id;
    let mut visited = HashSet::new();
    visited.insert(current);
    while let Some(&parent) = lineage.get(current) {
        if !visited.insert(parent) {
            break;
        }
        current = parent;
    }
    current
}

fn infer_group_ids(build: &mut Build, report: &mut DerivationReport) {
    let lineage: HashMap<&str, &str> = build
        .assemblies
        .iter()
        .filter_map(|a| a.lineage.as_deref().map(|l| (a.id.as_str(), l)))
        .collect();

    let inferred: Vec<(usize, String)> = build
        .assemblies
        .iter()
        .enumerate()
        .filter(|(_, a)| a.group_id.is_none())
        .map(|(i, a)| {
            let root = lineage_root(&a.id, &lineage);
            (i, strip_version_suffix(root).to_string())
        })
        .collect();

    for (i, group) in inferred {
        build.assemblies[i].group_id = Some(group);
        report.group_ids_set += 1;
    }
}

fn assign_merge_roles(build: &mut Build, report: &mut DerivationReport) {
    let groups: HashMap<String, Option<String>> = build
        .assemblies
        .iter()
        .map(|a| (a.id.clone(), a.group_id.clone()))
        .collect();
    let component_counts: HashMap<String, usize> = build
        .assemblies
        .iter()
        .map(|a| (a.id.clone(), a.components.len()))
        .collect();
    let group_of = |id: &str| groups.get(id).cloned().flatten();

    for step in &mut build.steps {
        if step.inputs.len() < 2 {
            continue;
        }

        let base = match step.inputs.iter().position(|i| i.role == Some(MergeRole::Base)) {
            Some(idx) => idx,
            None => {
                let output_group = step.outputs.first().and_then(|o| group_of(&o.assembly_id));
                let sharing: Vec<usize> = step
                    .inputs
                    .iter()
                    .enumerate()
                    .filter(|(_, i)| {
                        output_group.is_some() && group_of(&i.assembly_id) == output_group
                    })
                    .map(|(idx, _)| idx)
                    .collect();
                match sharing.as_slice() {
                    [only] => *only,
                    [] => 0,
                    several => several
                        .iter()
                        .copied()
                        .find(|&idx| {
                            component_counts
                                .get(&step.inputs[idx].assembly_id)
                                .is_some_and(|&n| n > 1)
                        })
                        .unwrap_or(0),
                }
            }
        };

        // A pre-marked `added` input can still be chosen as base
        for (idx, input) in step.inputs.iter_mut().enumerate() {
            let role = if idx == base {
                MergeRole::Base
            } else if input.role.is_none() {
                MergeRole::Added
            } else {
                continue;
            };
            if input.role != Some(role) {
                input.role = Some(role);
                report.merge_roles_set += 1;
            }
        }
    }
}
