//! prepline - derivation, validation and complexity scoring for kitchen builds
//!
//! A build is a preparation workflow modelled as a DAG of steps that
//! consume and produce assemblies. This crate:
//!
//! - derives what authors leave implicit (locations, dependencies, lineage)
//! - derives the transfers material makes between steps, with an on-disk cache
//! - validates builds against a catalog of graded rules
//! - scores build complexity, alone or across a portfolio
//!
//! All engines are pure functions of a build and a [`PreplineConfig`].

pub mod config;
pub mod derive;
pub mod graph;
pub mod models;
pub mod rules;
pub mod scoring;
pub mod transfers;

pub use config::{load_config, ConfigError, PreplineConfig};
pub use derive::{derive, Derivation, DerivationReport};
pub use models::{Build, Severity, ValidationError, ValidationResult};
pub use rules::{validate, validate_with_bom, Validator};
pub use scoring::{score_build, score_portfolio, ComplexityScorer, Rating, ScoreReport};
pub use transfers::{derive_transfers, get_or_derive, DerivedData, DerivedDataCache, DerivedTransfer};
