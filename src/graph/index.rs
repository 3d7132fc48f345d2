//! Read-only index over a build's steps
//!
//! Steps are ordered by `(order_index, id)`. Producers and consumers are
//! indexed per assembly, and the dependency relation (authored edges plus
//! material-flow edges) is held in a petgraph `DiGraph` for entry points
//! and topological order.

use crate::config::CompatibilityTables;
use crate::models::{Build, Step};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{BTreeMap, HashMap, HashSet};

pub struct BuildGraph<'a> {
    build: &'a Build,
    ordered: Vec<&'a Step>,
    positions: HashMap<&'a str, usize>,
    producers: HashMap<&'a str, Vec<&'a Step>>,
    consumers: HashMap<&'a str, Vec<&'a Step>>,
    graph: DiGraph<&'a str, ()>,
    nodes: HashMap<&'a str, NodeIndex>,
}

impl<'a> BuildGraph<'a> {
    pub fn new(build: &'a Build) -> Self {
        let mut ordered: Vec<&Step> = build.steps.iter().collect();
        ordered.sort_by(|a, b| a.order_index.cmp(&b.order_index).then_with(|| a.id.cmp(&b.id)));

        let mut positions = HashMap::new();
        for (i, step) in ordered.iter().enumerate() {
            positions.entry(step.id.as_str()).or_insert(i);
        }

        let mut producers: HashMap<&str, Vec<&Step>> = HashMap::new();
        let mut consumers: HashMap<&str, Vec<&Step>> = HashMap::new();
        for step in &ordered {
            for output in &step.outputs {
                let entry = producers.entry(output.assembly_id.as_str()).or_default();
                if !entry.iter().any(|s| std::ptr::eq(*s, *step)) {
                    entry.push(step);
                }
            }
            for input in step.inputs.iter().filter(|i| i.is_in_build()) {
                let entry = consumers.entry(input.assembly_id.as_str()).or_default();
                if !entry.iter().any(|s| std::ptr::eq(*s, *step)) {
                    entry.push(step);
                }
            }
        }

        let mut graph = DiGraph::new();
        let mut nodes = HashMap::new();
        for step in &ordered {
            if !nodes.contains_key(step.id.as_str()) {
                nodes.insert(step.id.as_str(), graph.add_node(step.id.as_str()));
            }
        }

        let mut seen_edges: HashSet<(NodeIndex, NodeIndex)> = HashSet::new();
        let mut add_edge = |graph: &mut DiGraph<&'a str, ()>, from: NodeIndex, to: NodeIndex| {
            if from != to && seen_edges.insert((from, to)) {
                graph.add_edge(from, to, ());
            }
        };
        for step in &ordered {
            let Some(&to) = nodes.get(step.id.as_str()) else {
                continue;
            };
            for dep in &step.depends_on {
                if let Some(&from) = nodes.get(dep.as_str()) {
                    add_edge(&mut graph, from, to);
                }
            }
            for input in step.inputs.iter().filter(|i| i.is_in_build()) {
                for producer in producers.get(input.assembly_id.as_str()).into_iter().flatten() {
                    if let Some(&from) = nodes.get(producer.id.as_str()) {
                        add_edge(&mut graph, from, to);
                    }
                }
            }
        }

        Self {
            build,
            ordered,
            positions,
            producers,
            consumers,
            graph,
            nodes,
        }
    }

    pub fn build(&self) -> &'a Build {
        self.build
    }

    /// Steps in `(order_index, id)` order
    pub fn steps(&self) -> &[&'a Step] {
        &self.ordered
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// First step with the given id
    pub fn step(&self, id: &str) -> Option<&'a Step> {
        self.positions.get(id).map(|&i| self.ordered[i])
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }

    /// The step after `id` in order
    pub fn next_step(&self, id: &str) -> Option<&'a Step> {
        self.position(id)
            .and_then(|i| self.ordered.get(i + 1).copied())
    }

    pub fn last_step(&self) -> Option<&'a Step> {
        self.ordered.last().copied()
    }

    pub fn is_last(&self, id: &str) -> bool {
        self.last_step().is_some_and(|s| s.id == id)
    }

    /// Steps listing the assembly among their outputs, in order
    pub fn producers_of(&self, assembly_id: &str) -> &[&'a Step] {
        self.producers
            .get(assembly_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The first producer of an assembly
    pub fn producer_of(&self, assembly_id: &str) -> Option<&'a Step> {
        self.producers_of(assembly_id).first().copied()
    }

    /// Steps consuming the assembly as an in-build input, in order
    pub fn consumers_of(&self, assembly_id: &str) -> &[&'a Step] {
        self.consumers
            .get(assembly_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Assembly ids with at least one producer, sorted
    pub fn produced_assemblies(&self) -> Vec<&'a str> {
        let mut ids: Vec<&str> = self.producers.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Steps this step directly depends on, in order
    pub fn predecessors(&self, id: &str) -> Vec<&'a Step> {
        self.neighbors(id, Direction::Incoming)
    }

    /// Steps directly depending on this step, in order
    pub fn successors(&self, id: &str) -> Vec<&'a Step> {
        self.neighbors(id, Direction::Outgoing)
    }

    fn neighbors(&self, id: &str, dir: Direction) -> Vec<&'a Step> {
        let Some(&idx) = self.nodes.get(id) else {
            return Vec::new();
        };
        let mut steps: Vec<&Step> = self
            .graph
            .neighbors_directed(idx, dir)
            .filter_map(|n| self.step(self.graph[n]))
            .collect();
        steps.sort_by_key(|s| self.position(&s.id));
        steps.dedup_by(|a, b| a.id == b.id);
        steps
    }

    /// Steps with no upstream dependency, in order
    pub fn entry_points(&self) -> Vec<&'a Step> {
        self.ordered
            .iter()
            .enumerate()
            .filter(|(i, step)| self.positions.get(step.id.as_str()) == Some(i))
            .filter(|(_, step)| {
                self.nodes.get(step.id.as_str()).is_some_and(|&idx| {
                    self.graph
                        .neighbors_directed(idx, Direction::Incoming)
                        .next()
                        .is_none()
                })
            })
            .map(|(_, step)| *step)
            .collect()
    }

    /// Topological order of the dependency graph, `None` if it has a cycle
    pub fn topological_order(&self) -> Option<Vec<&'a Step>> {
        let sorted = toposort(&self.graph, None).ok()?;
        Some(sorted.into_iter().filter_map(|n| self.step(self.graph[n])).collect())
    }

    /// Steps grouped by track id, each track in order
    pub fn tracks(&self) -> BTreeMap<&'a str, Vec<&'a Step>> {
        let mut tracks: BTreeMap<&str, Vec<&Step>> = BTreeMap::new();
        for step in &self.ordered {
            tracks.entry(step.track()).or_default().push(step);
        }
        tracks
    }
}

/// Station a step happens at: work location, else authored station, else
/// the single station offering its equipment
pub fn station_of<'a>(step: &'a Step, tables: &'a CompatibilityTables) -> Option<&'a str> {
    step.effective_station().or_else(|| {
        step.equipment_id
            .as_deref()
            .and_then(|eq| tables.station_for_unique_equipment(eq))
    })
}
