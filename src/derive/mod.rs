//! Derivation engine
//!
//! Fills in what authors leave implicit. Runs companion normalization and
//! then four ordered passes, each producing a new build:
//!
//! 1. output destinations
//! 2. input sources
//! 3. work locations
//! 4. dependency edges from material flow
//!
//! Deriving an already-derived build changes nothing and reports zero.

pub mod dependencies;
pub mod locations;
pub mod normalize;

use crate::config::PreplineConfig;
use crate::models::Build;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub use locations::{family_sub_location, infer_work_location, resolved_outputs, ResolvedOutput};
pub use normalize::{lineage_root, strip_version_suffix};

/// Counts of every field filled during derivation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivationReport {
    pub stubs_created: usize,
    pub lineage_set: usize,
    pub group_ids_set: usize,
    pub merge_roles_set: usize,
    pub output_locations: usize,
    pub input_sources: usize,
    pub work_locations: usize,
    pub stations_inferred: usize,
    pub dependencies_added: usize,
}

impl DerivationReport {
    pub fn total(&self) -> usize {
        self.stubs_created
            + self.lineage_set
            + self.group_ids_set
            + self.merge_roles_set
            + self.output_locations
            + self.input_sources
            + self.work_locations
            + self.dependencies_added
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0 && self.stations_inferred == 0
    }
}

/// A derived build plus what derivation filled in
#[derive(Debug, Clone, PartialEq)]
pub struct Derivation {
    pub build: Build,
    pub report: DerivationReport,
}

/// Run normalization and all four derivation passes
pub fn derive(build: &Build, config: &PreplineConfig) -> Derivation {
    let tables = &config.compatibility;
    let mut report = DerivationReport::default();

    let normalized = normalize::normalize(build, &mut report);
    let located = locations::derive_output_locations(&normalized, tables, &mut report);
    let sourced =
        locations::derive_input_sources(&located, tables, &config.techniques, &mut report);
    let placed = locations::derive_work_locations(&sourced, tables, &mut report);
    let derived = dependencies::derive_dependencies(&placed, &mut report);

    debug!(
        "Derivation of {}: {} stubs, {} outputs, {} inputs, {} work locations, {} dependencies",
        build.id,
        report.stubs_created,
        report.output_locations,
        report.input_sources,
        report.work_locations,
        report.dependencies_added
    );
    if !report.is_empty() {
        info!("Derived {} fields for build {}", report.total(), build.id);
    }

    Derivation {
        build: derived,
        report,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActionFamily, FlowRef, Step};

    fn implicit_build() -> Build {
        Build::new("b")
            .with_step(
                Step::new("s1", 1, ActionFamily::Prep)
                    .with_station("garnish")
                    .with_technique("retrieve")
                    .with_input(FlowRef::external("tortilla"))
                    .with_output(FlowRef::new("tortilla_cold")),
            )
            .with_step(
                Step::new("s2", 2, ActionFamily::Heat)
                    .with_technique("toast")
                    .with_equipment("conveyor_toaster")
                    .with_duration(30.0)
                    .with_input(FlowRef::new("tortilla_cold"))
                    .with_output(FlowRef::new("tortilla_hot")),
            )
            .with_step(
                Step::new("s3", 3, ActionFamily::Package)
                    .with_station("expo")
                    .with_technique("wrap")
                    .with_input(FlowRef::new("tortilla_hot"))
                    .with_output(FlowRef::new("tortilla_wrapped")),
            )
    }

    #[test]
    fn test_derive_fills_fields() {
        let config = PreplineConfig::default();
        let derived = derive(&implicit_build(), &config);
        let s2 = derived.build.step("s2").expect("s2");
        assert_eq!(s2.depends_on, vec!["s1".to_string()]);
        assert_eq!(
            s2.work_location.as_ref().and_then(|l| l.station_id.as_deref()),
            Some("toaster")
        );
        assert_eq!(derived.report.stations_inferred, 1);
        assert!(derived.report.total() > 0);
    }

    #[test]
    fn test_derive_is_a_fixpoint() {
        let config = PreplineConfig::default();
        let first = derive(&implicit_build(), &config);
        let second = derive(&first.build, &config);
        assert!(second.report.is_empty(), "{:?}", second.report);
        assert_eq!(second.build, first.build);
    }

    #[test]
    fn test_caller_build_is_not_mutated() {
        let config = PreplineConfig::default();
        let original = implicit_build();
        let snapshot = original.clone();
        let _ = derive(&original, &config);
        assert_eq!(original, snapshot);
    }
}
