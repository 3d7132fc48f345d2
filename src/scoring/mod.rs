//! Complexity scoring for builds
//!
//! Estimates how hard a build is to execute on the line from the steps it
//! contains and the shape of its workflow.
//!
//! # Scoring Formula
//!
//! ```text
//! Step score = side weight + technique weight + action-family weight + equipment weight
//!
//! Raw score  = Σ side                      × location multiplier
//!            + Σ (technique + family)      × technique multiplier
//!            + Σ equipment                 × equipment multiplier
//!            + station transitions         × station-movement multiplier
//!            + step count                  × task-count multiplier
//!            + Σ signal count × signal weight
//! ```
//!
//! # Structural Signals
//!
//! - **grouping_bounce**: a track leaves an area and comes back
//! - **station_bounce**: a track leaves a station and comes back within the area
//! - **merge_point** / **deep_merge**: steps with ≥2 / ≥3 inputs
//! - **parallel_entry_point**: entry points beyond the first
//! - **short_equipment_step**: equipment steps under the configured threshold
//! - **back_to_back_equipment**: consecutive equipment steps in a track
//! - **transfer**: derived material moves
//! - **station_transition**: station changes (weighted 0 by default, since
//!   the station-movement category already counts them)
//!
//! # Ratings
//!
//! Fixed mode rates on three ascending cut-points (default 20 / 40 / 70).
//! Percentile mode rates on the quartiles of the portfolio being scored.
//!
//! # Normalization
//!
//! Within a portfolio, `normalized = min(raw / p95 × 100, 100)`, or 0 when
//! p95 is 0.

mod complexity_scorer;
mod features;
mod impact;
mod portfolio;
mod signals;

pub use complexity_scorer::{
    CategoryScore, ComplexityScorer, Rating, ScoreReport, SignalScore, StepContribution,
    TOP_CONTRIBUTORS,
};
pub use features::{BuildFeatures, StepFeatures};
pub use impact::{
    preview_weight_impact, BuildImpact, ImpactCounts, ImpactPreview, ImpactStats, StatsDelta,
};
pub use portfolio::{percentile, score_portfolio, PortfolioResult, PortfolioStats, RankedBuild};
pub use signals::{StructuralSignals, SIGNAL_NAMES};

use crate::config::PreplineConfig;
use crate::models::Build;

/// Score one build with the given configuration
pub fn score_build(build: &Build, config: &PreplineConfig) -> ScoreReport {
    ComplexityScorer::new(config).score(build)
}
