//! Core data models for prepline
//!
//! These models are shared by the derivation, validation and scoring
//! engines: builds, steps, material-flow refs, locations, assemblies,
//! and the findings produced by validation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Publication state of a build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    #[default]
    Draft,
    Published,
}

/// Fixed family of actions a step can perform
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum ActionFamily {
    Heat,
    Prep,
    Transfer,
    Assemble,
    Portion,
    Check,
    Package,
    #[default]
    Other,
}

impl ActionFamily {
    pub fn all() -> &'static [ActionFamily] {
        &[
            ActionFamily::Heat,
            ActionFamily::Prep,
            ActionFamily::Transfer,
            ActionFamily::Assemble,
            ActionFamily::Portion,
            ActionFamily::Check,
            ActionFamily::Package,
            ActionFamily::Other,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            ActionFamily::Heat => "heat",
            ActionFamily::Prep => "prep",
            ActionFamily::Transfer => "transfer",
            ActionFamily::Assemble => "assemble",
            ActionFamily::Portion => "portion",
            ActionFamily::Check => "check",
            ActionFamily::Package => "package",
            ActionFamily::Other => "other",
        }
    }
}

impl std::fmt::Display for ActionFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Named places within a station where material can sit or work can happen
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubLocation {
    Equipment,
    WorkSurface,
    ColdStorage,
    DryStorage,
    ColdRail,
    HotHold,
    WindowShelf,
    Packaging,
}

impl SubLocation {
    /// Sub-locations material is retrieved from rather than worked on
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            SubLocation::ColdStorage
                | SubLocation::DryStorage
                | SubLocation::ColdRail
                | SubLocation::HotHold
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            SubLocation::Equipment => "equipment",
            SubLocation::WorkSurface => "work_surface",
            SubLocation::ColdStorage => "cold_storage",
            SubLocation::DryStorage => "dry_storage",
            SubLocation::ColdRail => "cold_rail",
            SubLocation::HotHold => "hot_hold",
            SubLocation::WindowShelf => "window_shelf",
            SubLocation::Packaging => "packaging",
        }
    }
}

impl std::fmt::Display for SubLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A place in the kitchen: station plus sub-location (plus appliance for equipment)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub station_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_location: Option<SubLocation>,
    /// Appliance id, required when `sub_location` is `Equipment`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equipment_id: Option<String>,
}

impl Location {
    pub fn new(station_id: Option<&str>, sub_location: SubLocation) -> Self {
        Self {
            station_id: station_id.map(str::to_string),
            sub_location: Some(sub_location),
            equipment_id: None,
        }
    }

    pub fn at(station_id: &str, sub_location: SubLocation) -> Self {
        Self::new(Some(station_id), sub_location)
    }

    pub fn equipment(station_id: Option<&str>, equipment_id: &str) -> Self {
        Self {
            station_id: station_id.map(str::to_string),
            sub_location: Some(SubLocation::Equipment),
            equipment_id: Some(equipment_id.to_string()),
        }
    }

    /// Same station, same sub-location, and same appliance when on equipment
    pub fn is_equivalent(&self, other: &Location) -> bool {
        if self.station_id != other.station_id || self.sub_location != other.sub_location {
            return false;
        }
        if self.sub_location == Some(SubLocation::Equipment) {
            return self.equipment_id == other.equipment_id;
        }
        true
    }

    /// Short human-readable form, e.g. `toaster/equipment:conveyor_toaster`
    pub fn describe(&self) -> String {
        let station = self.station_id.as_deref().unwrap_or("?");
        let sub = self.sub_location.map(|s| s.name()).unwrap_or("?");
        match &self.equipment_id {
            Some(eq) => format!("{station}/{sub}:{eq}"),
            None => format!("{station}/{sub}"),
        }
    }
}

/// Action performed by a step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub family: ActionFamily,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technique_id: Option<String>,
}

/// Timing of a step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepTime {
    pub duration_seconds: f64,
    /// Whether a cook is hands-on for the whole duration
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    pub value: f64,
    #[serde(default)]
    pub unit: String,
}

/// When a step is performed relative to service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrepType {
    PreService,
    ALaMinute,
}

/// Where a referenced assembly comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FlowSource {
    #[default]
    InBuild,
    External,
}

/// Role of an input on a merge step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeRole {
    Base,
    Added,
}

/// A step's pointer to a consumed or produced assembly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowRef {
    pub assembly_id: String,
    #[serde(default)]
    pub source: FlowSource,
    /// Origin for inputs, destination for outputs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Quantity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<MergeRole>,
}

impl FlowRef {
    pub fn new(assembly_id: &str) -> Self {
        Self {
            assembly_id: assembly_id.to_string(),
            source: FlowSource::InBuild,
            location: None,
            quantity: None,
            role: None,
        }
    }

    pub fn external(assembly_id: &str) -> Self {
        Self {
            source: FlowSource::External,
            ..Self::new(assembly_id)
        }
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_role(mut self, role: MergeRole) -> Self {
        self.role = Some(role);
        self
    }

    pub fn is_in_build(&self) -> bool {
        self.source == FlowSource::InBuild
    }
}

/// One node of the preparation DAG
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: String,
    pub order_index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_id: Option<String>,
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub station_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equipment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<StepTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Quantity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packaging_target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prep_type: Option<PrepType>,
    #[serde(default)]
    pub bulk_prep: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_location: Option<Location>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub inputs: Vec<FlowRef>,
    #[serde(default)]
    pub outputs: Vec<FlowRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Step {
    pub fn new(id: &str, order_index: u32, family: ActionFamily) -> Self {
        Self {
            id: id.to_string(),
            order_index,
            action: Action {
                family,
                technique_id: None,
            },
            ..Default::default()
        }
    }

    pub fn with_technique(mut self, technique: &str) -> Self {
        self.action.technique_id = Some(technique.to_string());
        self
    }

    pub fn with_station(mut self, station: &str) -> Self {
        self.station_id = Some(station.to_string());
        self
    }

    pub fn with_equipment(mut self, equipment: &str) -> Self {
        self.equipment_id = Some(equipment.to_string());
        self
    }

    pub fn with_track(mut self, track: &str) -> Self {
        self.track_id = Some(track.to_string());
        self
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.time = Some(StepTime {
            duration_seconds: seconds,
            is_active: true,
        });
        self
    }

    pub fn with_notes(mut self, notes: &str) -> Self {
        self.notes = Some(notes.to_string());
        self
    }

    pub fn with_packaging_target(mut self, target: &str) -> Self {
        self.packaging_target = Some(target.to_string());
        self
    }

    pub fn with_work_location(mut self, location: Location) -> Self {
        self.work_location = Some(location);
        self
    }

    pub fn with_input(mut self, input: FlowRef) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn with_output(mut self, output: FlowRef) -> Self {
        self.outputs.push(output);
        self
    }

    pub fn depending_on(mut self, step_id: &str) -> Self {
        self.depends_on.push(step_id.to_string());
        self
    }

    pub fn family(&self) -> ActionFamily {
        self.action.family
    }

    pub fn technique(&self) -> Option<&str> {
        self.action.technique_id.as_deref()
    }

    pub fn has_notes(&self) -> bool {
        self.notes.as_deref().is_some_and(|n| !n.trim().is_empty())
    }

    pub fn duration_seconds(&self) -> Option<f64> {
        self.time.as_ref().map(|t| t.duration_seconds)
    }

    /// Track the step belongs to; steps without one share the default track
    pub fn track(&self) -> &str {
        self.track_id.as_deref().unwrap_or(DEFAULT_TRACK)
    }

    /// Location from pre-work-location documents: station plus appliance
    pub fn legacy_location(&self) -> Option<Location> {
        match (&self.station_id, &self.equipment_id) {
            (_, Some(eq)) => Some(Location::equipment(self.station_id.as_deref(), eq)),
            (Some(station), None) => Some(Location {
                station_id: Some(station.clone()),
                sub_location: None,
                equipment_id: None,
            }),
            (None, None) => None,
        }
    }

    /// Station the step happens at, preferring the work location's station
    pub fn effective_station(&self) -> Option<&str> {
        self.work_location
            .as_ref()
            .and_then(|l| l.station_id.as_deref())
            .or(self.station_id.as_deref())
    }
}

/// Track id shared by steps that do not declare one
pub const DEFAULT_TRACK: &str = "default";

/// A component entry underlying an assembly
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentEntry {
    pub component_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// A named unit of material flowing between steps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Assembly {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    /// Predecessor assembly this one was transformed from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lineage: Option<String>,
    #[serde(default)]
    pub components: Vec<ComponentEntry>,
    /// Created by derivation because it was referenced but not declared
    #[serde(default)]
    pub stub: bool,
}

impl Assembly {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Default::default()
        }
    }

    pub fn stub(id: &str) -> Self {
        Self {
            stub: true,
            ..Self::new(id)
        }
    }

    pub fn with_lineage(mut self, predecessor: &str) -> Self {
        self.lineage = Some(predecessor.to_string());
        self
    }

    pub fn with_group(mut self, group_id: &str) -> Self {
        self.group_id = Some(group_id.to_string());
        self
    }

    pub fn with_components(mut self, components: &[&str]) -> Self {
        self.components = components
            .iter()
            .map(|c| ComponentEntry {
                component_id: c.to_string(),
                kind: None,
            })
            .collect();
        self
    }
}

/// Complete authored + derived representation of a preparation workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Build {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub status: BuildStatus,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub assemblies: Vec<Assembly>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Build {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Default::default()
        }
    }

    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_assembly(mut self, assembly: Assembly) -> Self {
        self.assemblies.push(assembly);
        self
    }

    pub fn published(mut self) -> Self {
        self.status = BuildStatus::Published;
        self
    }

    pub fn is_published(&self) -> bool {
        self.status == BuildStatus::Published
    }

    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn assembly(&self, id: &str) -> Option<&Assembly> {
        self.assemblies.iter().find(|a| a.id == id)
    }

    /// Parse a build document from JSON
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Bill-of-materials entry used for coverage checking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BomEntry {
    pub component_id: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub name: String,
}

/// Severity levels for validation findings, most severe first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Blocks publication
    Hard,
    Strong,
    Soft,
    Info,
}

impl Severity {
    /// Sort rank, 0 is most severe
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Hard => 0,
            Severity::Strong => 1,
            Severity::Soft => 2,
            Severity::Info => 3,
        }
    }

    pub fn parse(value: &str) -> Option<Severity> {
        match value.trim().to_lowercase().as_str() {
            "hard" => Some(Severity::Hard),
            "strong" => Some(Severity::Strong),
            "soft" => Some(Severity::Soft),
            "info" => Some(Severity::Info),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Hard => write!(f, "hard"),
            Severity::Strong => write!(f, "strong"),
            Severity::Soft => write!(f, "soft"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// A single validation finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    pub severity: Severity,
    pub rule_id: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_path: Option<String>,
}

impl ValidationError {
    pub fn new(severity: Severity, rule_id: &str, message: impl Into<String>) -> Self {
        Self {
            severity,
            rule_id: rule_id.to_string(),
            message: message.into(),
            step_id: None,
            field_path: None,
        }
    }

    pub fn at_step(mut self, step_id: &str) -> Self {
        self.step_id = Some(step_id.to_string());
        self
    }

    pub fn at_field(mut self, field_path: impl Into<String>) -> Self {
        self.field_path = Some(field_path.into());
        self
    }
}

/// Outcome of validating one build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub valid: bool,
    pub hard_errors: Vec<ValidationError>,
    /// Strong and soft findings
    pub warnings: Vec<ValidationError>,
    pub infos: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn all(&self) -> impl Iterator<Item = &ValidationError> {
        self.hard_errors
            .iter()
            .chain(self.warnings.iter())
            .chain(self.infos.iter())
    }

    pub fn has_rule(&self, rule_id: &str) -> bool {
        self.all().any(|e| e.rule_id == rule_id)
    }

    pub fn count_rule(&self, rule_id: &str) -> usize {
        self.all().filter(|e| e.rule_id == rule_id).count()
    }

    pub fn summary(&self) -> FindingsSummary {
        FindingsSummary::from_errors(self.all())
    }
}

/// Summary of findings by severity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingsSummary {
    pub hard: usize,
    pub strong: usize,
    pub soft: usize,
    pub info: usize,
    pub total: usize,
    pub by_rule: HashMap<String, usize>,
}

impl FindingsSummary {
    pub fn from_errors<'a>(errors: impl IntoIterator<Item = &'a ValidationError>) -> Self {
        let mut summary = Self::default();
        for e in errors {
            match e.severity {
                Severity::Hard => summary.hard += 1,
                Severity::Strong => summary.strong += 1,
                Severity::Soft => summary.soft += 1,
                Severity::Info => summary.info += 1,
            }
            *summary.by_rule.entry(e.rule_id.clone()).or_insert(0) += 1;
            summary.total += 1;
        }
        summary
    }
}
