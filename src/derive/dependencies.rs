//! Dependency inference from material flow

use super::DerivationReport;
use crate::graph::BuildGraph;
use crate::models::Build;

/// Pass 4: add an edge from every producer to every consumer of the same
/// assembly, keeping authored edges
pub fn derive_dependencies(build: &Build, report: &mut DerivationReport) -> Build {
    let graph = BuildGraph::new(build);
    let mut additions: Vec<(usize, Vec<String>)> = Vec::new();

    for (idx, step) in build.steps.iter().enumerate() {
        let mut added: Vec<String> = Vec::new();
        for input in step.inputs.iter().filter(|i| i.is_in_build()) {
            for producer in graph.producers_of(&input.assembly_id) {
                if producer.id == step.id
                    || step.depends_on.contains(&producer.id)
                    || added.contains(&producer.id)
                {
                    continue;
                }
                added.push(producer.id.clone());
            }
        }
        if !added.is_empty() {
            additions.push((idx, added));
        }
    }

    let mut out = build.clone();
    for (idx, added) in additions {
        report.dependencies_added += added.len();
        out.steps[idx].depends_on.extend(added);
    }
    out
}
