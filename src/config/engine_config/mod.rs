//! Engine-level configuration
//!
//! Loads configuration from `prepline.toml` or `.preplinerc.json` in a
//! directory. Every section is optional and falls back to the reference
//! kitchen defaults.
//!
//! # Configuration Format
//!
//! ```toml
//! # prepline.toml
//!
//! [validation]
//! under_specified_threshold = 0.8
//!
//! [validation.rules.station-bounce]
//! enabled = false
//!
//! [validation.rules.final-output-at-expo]
//! severity = "strong"
//!
//! [transfers.cross_site]
//! cost = 8.0
//! seconds = 300.0
//!
//! [scoring.location]
//! hot_side = 2.5
//! ```

use super::compatibility::CompatibilityTables;
use super::scoring::ScoringConfig;
use super::sites::SiteAssignment;
use super::techniques::TechniqueVocabulary;
use crate::models::Severity;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Preferred config file name
pub const TOML_CONFIG_FILE: &str = "prepline.toml";
/// Fallback config file name
pub const JSON_CONFIG_FILE: &str = ".preplinerc.json";

/// Errors raised while loading or checking configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config value: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Complete configuration threaded through derivation, validation and scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PreplineConfig {
    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default)]
    pub validation: ValidationConfig,

    #[serde(default)]
    pub transfers: TransferConfig,

    #[serde(default)]
    pub compatibility: CompatibilityTables,

    #[serde(default)]
    pub techniques: TechniqueVocabulary,

    #[serde(default)]
    pub sites: SiteAssignment,
}

/// Per-rule enable/severity override
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RuleOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
}

/// Validation engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Minimum fraction of steps that must declare a dependency
    #[serde(default = "default_under_specified_threshold")]
    pub under_specified_threshold: f64,

    /// Overrides keyed by rule id (any casing; normalized on lookup)
    #[serde(default)]
    pub rules: HashMap<String, RuleOverride>,
}

fn default_under_specified_threshold() -> f64 {
    0.75
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            under_specified_threshold: default_under_specified_threshold(),
            rules: HashMap::new(),
        }
    }
}

impl ValidationConfig {
    /// Override for a rule, matched on normalized id
    pub fn rule_override(&self, rule_id: &str) -> Option<&RuleOverride> {
        let wanted = normalize_rule_id(rule_id);
        self.rules
            .iter()
            .find(|(k, _)| normalize_rule_id(k) == wanted)
            .map(|(_, v)| v)
    }

    pub fn is_rule_enabled(&self, rule_id: &str) -> bool {
        self.rule_override(rule_id)
            .and_then(|o| o.enabled)
            .unwrap_or(true)
    }

    pub fn severity_for(&self, rule_id: &str, default: Severity) -> Severity {
        self.rule_override(rule_id)
            .and_then(|o| o.severity)
            .unwrap_or(default)
    }

    pub fn disable(mut self, rule_id: &str) -> Self {
        self.rules.entry(rule_id.to_string()).or_default().enabled = Some(false);
        self
    }

    pub fn with_severity(mut self, rule_id: &str, severity: Severity) -> Self {
        self.rules.entry(rule_id.to_string()).or_default().severity = Some(severity);
        self
    }
}

/// Cost and time of one kind of material move
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoveCost {
    pub cost: f64,
    pub seconds: f64,
}

/// Cost table for derived transfers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransferConfig {
    #[serde(default = "default_same_station")]
    pub same_station: MoveCost,
    #[serde(default = "default_same_site")]
    pub same_site: MoveCost,
    #[serde(default = "default_cross_site")]
    pub cross_site: MoveCost,
}

fn default_same_station() -> MoveCost {
    MoveCost {
        cost: 1.0,
        seconds: 5.0,
    }
}
fn default_same_site() -> MoveCost {
    MoveCost {
        cost: 2.0,
        seconds: 15.0,
    }
}
fn default_cross_site() -> MoveCost {
    MoveCost {
        cost: 5.0,
        seconds: 120.0,
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            same_station: default_same_station(),
            same_site: default_same_site(),
            cross_site: default_cross_site(),
        }
    }
}

impl PreplineConfig {
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field invariants
    pub fn validate(&self) -> ConfigResult<()> {
        self.scoring.check().map_err(ConfigError::Invalid)?;
        self.compatibility.check().map_err(ConfigError::Invalid)?;

        let threshold = self.validation.under_specified_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "validation.under_specified_threshold must be in (0, 1], got {threshold}"
            )));
        }

        for (name, mv) in [
            ("same_station", self.transfers.same_station),
            ("same_site", self.transfers.same_site),
            ("cross_site", self.transfers.cross_site),
        ] {
            if mv.cost < 0.0 || mv.seconds < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "transfers.{name} cost and seconds must not be negative"
                )));
            }
        }
        Ok(())
    }
}

fn read_file(path: &Path) -> ConfigResult<String> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Load configuration from a directory
///
/// Tries `prepline.toml` first, then `.preplinerc.json`. A directory with
/// neither yields the defaults; a file that exists but fails to parse or
/// validate is an error.
pub fn load_config(dir: &Path) -> ConfigResult<PreplineConfig> {
    let toml_path = dir.join(TOML_CONFIG_FILE);
    if toml_path.exists() {
        let config = PreplineConfig::from_toml_str(&read_file(&toml_path)?)?;
        debug!("Loaded config from {}", toml_path.display());
        return Ok(config);
    }

    let json_path = dir.join(JSON_CONFIG_FILE);
    if json_path.exists() {
        let config = PreplineConfig::from_json_str(&read_file(&json_path)?)?;
        debug!("Loaded config from {}", json_path.display());
        return Ok(config);
    }

    debug!("No config found in {}, using defaults", dir.display());
    Ok(PreplineConfig::default())
}

/// Normalize a rule id to kebab-case
///
/// Accepts `DagAcyclicRule`, `dag_acyclic`, `DAGAcyclic` or `dag-acyclic`
/// and returns `dag-acyclic`.
pub fn normalize_rule_id(name: &str) -> String {
    let mut result = String::new();
    let chars: Vec<char> = name.trim().chars().collect();

    for (i, c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev_is_lower = i > 0 && (chars[i - 1].is_lowercase() || chars[i - 1].is_ascii_digit());
            let is_acronym_end = i > 0
                && chars[i - 1].is_uppercase()
                && i + 1 < chars.len()
                && chars[i + 1].is_lowercase();

            if prev_is_lower || is_acronym_end {
                result.push('-');
            }
            result.extend(c.to_lowercase());
        } else if *c == '_' || *c == ' ' {
            result.push('-');
        } else {
            result.push(*c);
        }
    }

    result.trim_end_matches("-rule").to_string()
}
