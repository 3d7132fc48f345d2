//! Base rule trait and types
//!
//! This module defines the core abstractions for build validation:
//! - `Rule` trait that every rule implements
//! - `RuleContext` holding the indexed build a rule checks
//! - `Findings` collector stamping rule id and severity on each error
//! - `FnRule` adapter registering a plain function as a rule

use crate::config::{CompatibilityTables, PreplineConfig, TechniqueVocabulary};
use crate::derive::{resolved_outputs, ResolvedOutput};
use crate::graph::BuildGraph;
use crate::models::{BomEntry, Build, Severity, Step, ValidationError};
use std::collections::HashMap;

/// What a rule looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleScope {
    Build,
    Step,
    Assembly,
    Flow,
    Workflow,
    Bom,
}

impl RuleScope {
    pub fn name(&self) -> &'static str {
        match self {
            RuleScope::Build => "build",
            RuleScope::Step => "step",
            RuleScope::Assembly => "assembly",
            RuleScope::Flow => "flow",
            RuleScope::Workflow => "workflow",
            RuleScope::Bom => "bom",
        }
    }
}

/// Everything a rule may inspect, indexed once per validation
pub struct RuleContext<'a> {
    pub build: &'a Build,
    pub graph: BuildGraph<'a>,
    pub config: &'a PreplineConfig,
    pub bom: Option<&'a [BomEntry]>,
    /// Assembly id → first producer's resolved output
    pub resolved: HashMap<String, ResolvedOutput>,
}

impl<'a> RuleContext<'a> {
    pub fn new(build: &'a Build, config: &'a PreplineConfig, bom: Option<&'a [BomEntry]>) -> Self {
        Self {
            build,
            graph: BuildGraph::new(build),
            config,
            bom,
            resolved: resolved_outputs(build),
        }
    }

    pub fn tables(&self) -> &'a CompatibilityTables {
        &self.config.compatibility
    }

    pub fn vocabulary(&self) -> &'a TechniqueVocabulary {
        &self.config.techniques
    }

    /// Steps in order
    pub fn steps(&self) -> &[&'a Step] {
        self.graph.steps()
    }

    pub fn is_declared(&self, assembly_id: &str) -> bool {
        self.build.assemblies.iter().any(|a| a.id == assembly_id)
    }
}

/// Collects one rule's errors
pub struct Findings {
    rule_id: &'static str,
    severity: Severity,
    errors: Vec<ValidationError>,
}

impl Findings {
    pub fn new(rule_id: &'static str, severity: Severity) -> Self {
        Self {
            rule_id,
            severity,
            errors: Vec::new(),
        }
    }

    pub fn rule_id(&self) -> &'static str {
        self.rule_id
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Build-level error
    pub fn build(&mut self, message: impl Into<String>) -> &mut ValidationError {
        self.push(ValidationError::new(self.severity, self.rule_id, message))
    }

    pub fn step(&mut self, step: &Step, message: impl Into<String>) -> &mut ValidationError {
        self.push(ValidationError::new(self.severity, self.rule_id, message).at_step(&step.id))
    }

    pub fn step_field(
        &mut self,
        step: &Step,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> &mut ValidationError {
        self.push(
            ValidationError::new(self.severity, self.rule_id, message)
                .at_step(&step.id)
                .at_field(field),
        )
    }

    /// Step error at an explicit severity, for rules whose grade depends on context
    pub fn graded(
        &mut self,
        severity: Severity,
        step: &Step,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> &mut ValidationError {
        self.push(
            ValidationError::new(severity, self.rule_id, message)
                .at_step(&step.id)
                .at_field(field),
        )
    }

    fn push(&mut self, error: ValidationError) -> &mut ValidationError {
        self.errors.push(error);
        let last = self.errors.len() - 1;
        &mut self.errors[last]
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_errors(self) -> Vec<ValidationError> {
        self.errors
    }
}

/// Trait for all validation rules
///
/// Rules are pure: they read the context and report findings, never
/// touching the build.
///
/// # Example Implementation
///
/// ```ignore
/// pub struct NoEmptyNotes;
///
/// impl Rule for NoEmptyNotes {
///     fn id(&self) -> &'static str { "no-empty-notes" }
///     fn description(&self) -> &'static str { "Notes must not be blank" }
///     fn default_severity(&self) -> Severity { Severity::Info }
///     fn check(&self, ctx: &RuleContext<'_>, findings: &mut Findings) {
///         for step in ctx.steps() {
///             if step.notes.as_deref() == Some("") {
///                 findings.step_field(step, "notes", "Notes are blank");
///             }
///         }
///     }
/// }
/// ```
pub trait Rule: Send + Sync {
    /// Unique kebab-case identifier
    fn id(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn default_severity(&self) -> Severity;

    fn scope(&self) -> RuleScope {
        RuleScope::Step
    }

    /// Report findings for one build
    fn check(&self, ctx: &RuleContext<'_>, findings: &mut Findings);
}

pub type CheckFn = fn(&RuleContext<'_>, &mut Findings);

/// A rule backed by a plain function
pub struct FnRule {
    id: &'static str,
    description: &'static str,
    severity: Severity,
    scope: RuleScope,
    check: CheckFn,
}

impl FnRule {
    pub const fn new(
        id: &'static str,
        description: &'static str,
        severity: Severity,
        scope: RuleScope,
        check: CheckFn,
    ) -> Self {
        Self {
            id,
            description,
            severity,
            scope,
            check,
        }
    }
}

impl Rule for FnRule {
    fn id(&self) -> &'static str {
        self.id
    }

    fn description(&self) -> &'static str {
        self.description
    }

    fn default_severity(&self) -> Severity {
        self.severity
    }

    fn scope(&self) -> RuleScope {
        self.scope
    }

    fn check(&self, ctx: &RuleContext<'_>, findings: &mut Findings) {
        (self.check)(ctx, findings)
    }
}

/// Run one rule against a build outside the registry
pub fn run_rule(rule: &dyn Rule, ctx: &RuleContext<'_>) -> Vec<ValidationError> {
    let mut findings = Findings::new(rule.id(), rule.default_severity());
    rule.check(ctx, &mut findings);
    findings.into_errors()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ActionFamily;

    fn blank_notes(ctx: &RuleContext<'_>, findings: &mut Findings) {
        for step in ctx.steps() {
            if step.notes.as_deref() == Some("") {
                findings.step_field(step, "notes", "Notes are blank");
            }
        }
    }

    #[test]
    fn test_fn_rule_stamps_id_and_severity() {
        let rule = FnRule::new(
            "no-blank-notes",
            "Notes must not be blank",
            Severity::Info,
            RuleScope::Step,
            blank_notes,
        );
        let mut step = Step::new("s1", 1, ActionFamily::Prep);
        step.notes = Some(String::new());
        let build = Build::new("b").with_step(step);
        let config = PreplineConfig::default();
        let ctx = RuleContext::new(&build, &config, None);

        let errors = run_rule(&rule, &ctx);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].rule_id, "no-blank-notes");
        assert_eq!(errors[0].severity, Severity::Info);
        assert_eq!(errors[0].step_id.as_deref(), Some("s1"));
        assert_eq!(errors[0].field_path.as_deref(), Some("notes"));
        assert_eq!(rule.scope().name(), "step");
    }

    #[test]
    fn test_findings_graded_overrides_severity() {
        let step = Step::new("s1", 1, ActionFamily::Prep);
        let mut findings = Findings::new("x", Severity::Soft);
        findings.graded(Severity::Info, &step, "inputs[0]", "m");
        findings.build("n");
        let errors = findings.into_errors();
        assert_eq!(errors[0].severity, Severity::Info);
        assert_eq!(errors[1].severity, Severity::Soft);
        assert!(errors[1].step_id.is_none());
    }
}
