//! Build validation rules
//!
//! Each rule is a pure function of a build (plus optional BOM) that reports
//! graded findings. Rules are registered in a [`Validator`] and can be
//! disabled or re-graded through `[validation.rules]` in the config file.
//!
//! # Rule families
//!
//! - `structural` - ids, dependency references, coverage and ordering
//! - `cycles` - dependency cycles, each reported once
//! - `field_presence` - fields each action family must carry
//! - `compatibility` - stations, equipment and techniques against the kitchen tables
//! - `material_flow` - producers, consumers, flow-ref locations and lineage
//! - `workflow` - station bounces, merges and final placement
//! - `bom` - bill-of-materials coverage, only when a BOM is supplied

pub mod base;
pub mod bom;
pub mod compatibility;
pub mod cycles;
pub mod engine;
pub mod field_presence;
pub mod material_flow;
pub mod structural;
pub mod workflow;

pub use base::{run_rule, CheckFn, Findings, FnRule, Rule, RuleContext, RuleScope};
pub use cycles::DagAcyclicRule;
pub use engine::{aggregate, Validator};

use crate::config::PreplineConfig;
use crate::models::{BomEntry, Build, ValidationResult};
use std::sync::Arc;

/// The built-in rule catalog
pub fn default_rules() -> Vec<Arc<dyn Rule>> {
    let mut rules = structural::rules();
    rules.push(Arc::new(DagAcyclicRule));
    rules.extend(field_presence::rules());
    rules.extend(compatibility::rules());
    rules.extend(material_flow::rules());
    rules.extend(workflow::rules());
    rules.extend(bom::rules());
    rules
}

/// Validate a build with the default catalog
pub fn validate(build: &Build, config: &PreplineConfig) -> ValidationResult {
    Validator::default().validate(build, config, None)
}

/// Validate a build with the default catalog, checking BOM coverage too
pub fn validate_with_bom(build: &Build, config: &PreplineConfig, bom: &[BomEntry]) -> ValidationResult {
    Validator::default().validate(build, config, Some(bom))
}
