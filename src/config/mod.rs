//! Configuration module for prepline
//!
//! This module handles:
//! - Engine configuration files (prepline.toml / .preplinerc.json)
//! - Scoring weights and rating thresholds
//! - Kitchen compatibility tables, site assignment and technique vocabulary
//! - Validation rule overrides and transfer costs

pub mod compatibility;
mod engine_config;
pub mod scoring;
pub mod sites;
pub mod techniques;

pub use compatibility::{CompatibilityTables, StationProfile};
pub use engine_config::{
    load_config, normalize_rule_id, ConfigError, ConfigResult, MoveCost, PreplineConfig,
    RuleOverride, TransferConfig, ValidationConfig, JSON_CONFIG_FILE, TOML_CONFIG_FILE,
};
pub use scoring::{CategoryMultipliers, RatingMode, ScoringConfig, WeightTable};
pub use sites::{SiteAssignment, SiteResolver};
pub use techniques::{TechniqueDef, TechniqueVocabulary};
