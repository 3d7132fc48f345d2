//! Rule execution engine
//!
//! The `Validator` holds the rule registry and turns one build into a
//! `ValidationResult`:
//! - skips rules disabled in configuration
//! - runs the remaining rules in parallel (rayon)
//! - applies per-rule severity overrides
//! - partitions findings by severity and sorts them deterministically

use super::base::{Findings, Rule, RuleContext};
use crate::config::PreplineConfig;
use crate::models::{BomEntry, Build, Severity, ValidationError, ValidationResult};
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Registry of validation rules
pub struct Validator {
    rules: Vec<Arc<dyn Rule>>,
}

impl Default for Validator {
    fn default() -> Self {
        Self::with_default_rules()
    }
}

impl Validator {
    /// A validator with no rules registered
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// A validator with the full built-in catalog
    pub fn with_default_rules() -> Self {
        let mut validator = Self::empty();
        validator.register_all(super::default_rules());
        validator
    }

    pub fn register(&mut self, rule: Arc<dyn Rule>) {
        debug!("Registering rule: {}", rule.id());
        self.rules.push(rule);
    }

    pub fn register_all(&mut self, rules: impl IntoIterator<Item = Arc<dyn Rule>>) {
        for rule in rules {
            self.register(rule);
        }
    }

    pub fn rules(&self) -> &[Arc<dyn Rule>] {
        &self.rules
    }

    pub fn rule_ids(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.id()).collect()
    }

    pub fn rule(&self, id: &str) -> Option<&Arc<dyn Rule>> {
        self.rules.iter().find(|r| r.id() == id)
    }

    /// Validate one build as given
    ///
    /// Derivation is not run here; callers derive first when they want
    /// inferred locations and dependencies checked.
    pub fn validate(
        &self,
        build: &Build,
        config: &PreplineConfig,
        bom: Option<&[BomEntry]>,
    ) -> ValidationResult {
        let start = Instant::now();
        let ctx = RuleContext::new(build, config, bom);
        let enabled: Vec<&Arc<dyn Rule>> = self
            .rules
            .iter()
            .filter(|r| config.validation.is_rule_enabled(r.id()))
            .collect();
        debug!(
            "Validating build '{}' with {}/{} rules",
            build.id,
            enabled.len(),
            self.rules.len()
        );

        let errors: Vec<ValidationError> = enabled
            .par_iter()
            .flat_map_iter(|rule| {
                let default = rule.default_severity();
                let severity = config.validation.severity_for(rule.id(), default);
                let mut findings = Findings::new(rule.id(), default);
                rule.check(&ctx, &mut findings);
                let mut errors = findings.into_errors();
                if severity != default {
                    for e in &mut errors {
                        e.severity = severity;
                    }
                }
                errors
            })
            .collect();

        let result = aggregate(build, errors);
        info!(
            "Validated build '{}': {} hard, {} warnings, {} info in {:?}",
            build.id,
            result.hard_errors.len(),
            result.warnings.len(),
            result.infos.len(),
            start.elapsed()
        );
        result
    }

    /// Validate several builds in parallel, results in input order
    pub fn validate_batch(
        &self,
        builds: &[Build],
        config: &PreplineConfig,
        bom: Option<&[BomEntry]>,
    ) -> Vec<ValidationResult> {
        info!("Validating {} builds", builds.len());
        builds
            .par_iter()
            .map(|b| self.validate(b, config, bom))
            .collect()
    }
}

/// Partition findings by their own severity and sort each bucket
pub fn aggregate(build: &Build, mut errors: Vec<ValidationError>) -> ValidationResult {
    let order: HashMap<&str, u32> = build
        .steps
        .iter()
        .rev()
        .map(|s| (s.id.as_str(), s.order_index))
        .collect();
    errors.sort_by(|a, b| {
        let order_of = |e: &ValidationError| e.step_id.as_deref().and_then(|id| order.get(id).copied());
        a.severity
            .rank()
            .cmp(&b.severity.rank())
            .then_with(|| a.rule_id.cmp(&b.rule_id))
            .then_with(|| order_of(a).cmp(&order_of(b)))
            .then_with(|| a.step_id.cmp(&b.step_id))
            .then_with(|| a.field_path.cmp(&b.field_path))
            .then_with(|| a.message.cmp(&b.message))
    });

    let mut result = ValidationResult::default();
    for error in errors {
        match error.severity {
            Severity::Hard => result.hard_errors.push(error),
            Severity::Strong | Severity::Soft => result.warnings.push(error),
            Severity::Info => result.infos.push(error),
        }
    }
    result.valid = result.hard_errors.is_empty();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidationConfig;
    use crate::models::{ActionFamily, Step};

    #[test]
    fn test_default_catalog_has_unique_ids() {
        let validator = Validator::with_default_rules();
        let mut ids = validator.rule_ids();
        let total = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), total);
        assert!(validator.rule("dag-acyclic").is_some());
        assert!(validator.rule("bom-component-covered").is_some());
    }

    #[test]
    fn test_empty_build_is_invalid() {
        let result = Validator::default().validate(&Build::new("b"), &PreplineConfig::default(), None);
        assert!(!result.valid);
        assert!(result.has_rule("non-empty-build"));
    }

    #[test]
    fn test_disabled_rule_is_skipped() {
        let mut config = PreplineConfig::default();
        config.validation = ValidationConfig::default().disable("non-empty-build");
        let result = Validator::default().validate(&Build::new("b"), &config, None);
        assert!(!result.has_rule("non-empty-build"));
    }

    #[test]
    fn test_severity_override_moves_bucket() {
        let mut config = PreplineConfig::default();
        config.validation = ValidationConfig::default().with_severity("non-empty-build", Severity::Info);
        let result = Validator::default().validate(&Build::new("b"), &config, None);
        assert!(result.valid);
        assert_eq!(result.infos.iter().filter(|e| e.rule_id == "non-empty-build").count(), 1);
    }

    #[test]
    fn test_aggregate_sorts_by_severity_then_rule_then_order() {
        let build = Build::new("b")
            .with_step(Step::new("late", 2, ActionFamily::Prep))
            .with_step(Step::new("early", 1, ActionFamily::Prep));
        let errors = vec![
            ValidationError::new(Severity::Soft, "a-rule", "m"),
            ValidationError::new(Severity::Hard, "b-rule", "m").at_step("late"),
            ValidationError::new(Severity::Hard, "b-rule", "m").at_step("early"),
            ValidationError::new(Severity::Hard, "a-rule", "m").at_step("late"),
            ValidationError::new(Severity::Info, "a-rule", "m"),
        ];
        let result = aggregate(&build, errors);
        assert!(!result.valid);
        let hard: Vec<(&str, Option<&str>)> = result
            .hard_errors
            .iter()
            .map(|e| (e.rule_id.as_str(), e.step_id.as_deref()))
            .collect();
        assert_eq!(
            hard,
            vec![
                ("a-rule", Some("late")),
                ("b-rule", Some("early")),
                ("b-rule", Some("late")),
            ]
        );
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.infos.len(), 1);
    }
}
