//! Complexity scorer
//!
//! Combines per-step weights, category multipliers and structural signals
//! into a raw score and a rating.

use super::features::{BuildFeatures, StepFeatures};
use super::signals::StructuralSignals;
use crate::config::{PreplineConfig, RatingMode};
use crate::graph::BuildGraph;
use crate::models::Build;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Steps listed in a report's top contributors
pub const TOP_CONTRIBUTORS: usize = 5;

/// Complexity band of a build
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl Rating {
    pub fn name(&self) -> &'static str {
        match self {
            Rating::Low => "low",
            Rating::Medium => "medium",
            Rating::High => "high",
            Rating::VeryHigh => "very_high",
        }
    }

    /// Band for `value` given three ascending cut-points
    pub fn from_cut_points(value: f64, cut_points: [f64; 3]) -> Rating {
        let [low, medium, high] = cut_points;
        if value < low {
            Rating::Low
        } else if value < medium {
            Rating::Medium
        } else if value < high {
            Rating::High
        } else {
            Rating::VeryHigh
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Ledger line for one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepContribution {
    pub step_id: String,
    pub location: f64,
    pub technique: f64,
    pub family: f64,
    pub equipment: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryScore {
    pub name: String,
    /// Sum before the multiplier
    pub base: f64,
    pub multiplier: f64,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalScore {
    pub name: String,
    pub count: usize,
    pub weight: f64,
    pub score: f64,
}

/// Complete score of one build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreReport {
    pub build_id: String,
    pub raw_score: f64,
    /// Set when scored within a portfolio
    pub normalized_score: Option<f64>,
    pub rating: Rating,
    pub categories: Vec<CategoryScore>,
    pub signal_score: f64,
    pub signal_scores: Vec<SignalScore>,
    pub steps: Vec<StepContribution>,
    /// Highest step totals first, ties by step id
    pub top_contributors: Vec<StepContribution>,
    pub features: BuildFeatures,
    pub signals: StructuralSignals,
}

impl ScoreReport {
    pub fn category(&self, name: &str) -> Option<&CategoryScore> {
        self.categories.iter().find(|c| c.name == name)
    }
}

fn top_contributors(steps: &[StepContribution]) -> Vec<StepContribution> {
    let mut top = steps.to_vec();
    top.sort_by(|a, b| b.total.total_cmp(&a.total).then_with(|| a.step_id.cmp(&b.step_id)));
    top.truncate(TOP_CONTRIBUTORS);
    top
}

/// Complexity scorer over a fixed configuration
pub struct ComplexityScorer<'a> {
    config: &'a PreplineConfig,
}

impl<'a> ComplexityScorer<'a> {
    pub fn new(config: &'a PreplineConfig) -> Self {
        Self { config }
    }

    /// Score one build as given
    ///
    /// Percentile ratings need a portfolio; a lone build is rated on the
    /// fixed cut-points until the portfolio re-rates it.
    pub fn score(&self, build: &Build) -> ScoreReport {
        let scoring = &self.config.scoring;
        let graph = BuildGraph::new(build);
        let features = BuildFeatures::extract(&graph, &self.config.compatibility);
        let signals = StructuralSignals::detect(&graph, &features, self.config);

        let steps: Vec<StepContribution> = features
            .steps
            .iter()
            .map(|s| self.step_contribution(s))
            .collect();

        let mult = &scoring.category_multipliers;
        let sum = |f: fn(&StepContribution) -> f64| steps.iter().map(f).sum::<f64>();
        let categories = vec![
            category("location", sum(|c| c.location), mult.location),
            category("technique", sum(|c| c.technique + c.family), mult.technique),
            category("equipment", sum(|c| c.equipment), mult.equipment),
            category(
                "station_movement",
                signals.station_transitions.len() as f64,
                mult.station_movement,
            ),
            category("task_count", features.step_count as f64, mult.task_count),
        ];

        let signal_scores: Vec<SignalScore> = signals
            .counts()
            .iter()
            .map(|(name, count)| {
                let weight = scoring.signal_weight(name);
                SignalScore {
                    name: name.to_string(),
                    count: *count,
                    weight,
                    score: *count as f64 * weight,
                }
            })
            .collect();
        let signal_score: f64 = signal_scores.iter().map(|s| s.score).sum();
        let raw_score = categories.iter().map(|c| c.score).sum::<f64>() + signal_score;

        debug!(
            "Scored build '{}': raw={:.2} (signals={:.2}) over {} steps",
            build.id, raw_score, signal_score, features.step_count
        );

        let top_contributors = top_contributors(&steps);
        ScoreReport {
            build_id: build.id.clone(),
            raw_score,
            normalized_score: None,
            rating: Rating::from_cut_points(raw_score, scoring.rating_thresholds),
            categories,
            signal_score,
            signal_scores,
            steps,
            top_contributors,
            features,
            signals,
        }
    }

    fn step_contribution(&self, step: &StepFeatures) -> StepContribution {
        let scoring = &self.config.scoring;
        let location = scoring.side_weight(&step.side);
        let technique = scoring.technique_weight(step.technique.as_deref());
        let family = scoring.family_weight(step.family);
        let equipment = scoring.equipment_weight(step.equipment.as_deref());
        StepContribution {
            step_id: step.step_id.clone(),
            location,
            technique,
            family,
            equipment,
            total: location + technique + family + equipment,
        }
    }

    /// Rating for a raw score under the configured mode
    ///
    /// `quartiles` are the portfolio's p25/p50/p75 and are only consulted
    /// in percentile mode.
    pub fn rate(&self, raw_score: f64, quartiles: Option<[f64; 3]>) -> Rating {
        match (self.config.scoring.rating_mode, quartiles) {
            (RatingMode::Percentile, Some([p25, p50, p75])) => {
                if raw_score <= p25 {
                    Rating::Low
                } else if raw_score <= p50 {
                    Rating::Medium
                } else if raw_score <= p75 {
                    Rating::High
                } else {
                    Rating::VeryHigh
                }
            }
            _ => Rating::from_cut_points(raw_score, self.config.scoring.rating_thresholds),
        }
    }

    /// Markdown explanation of a score report
    pub fn explain(&self, report: &ScoreReport) -> String {
        let mut lines = Vec::new();

        lines.push(format!(
            "# Complexity Score: {:.1} ({})\n",
            report.raw_score, report.rating
        ));
        if let Some(normalized) = report.normalized_score {
            lines.push(format!("Normalized within portfolio: {normalized:.1}/100\n"));
        }

        lines.push("## Scoring Formula\n".to_string());
        lines.push("```".to_string());
        lines.push("Step     = side + technique + action family + equipment".to_string());
        lines.push("Raw      = Σ category × multiplier + Σ signal count × signal weight".to_string());
        lines.push("```\n".to_string());

        lines.push("## Categories\n".to_string());
        for c in &report.categories {
            lines.push(format!(
                "- **{}**: {:.2} × {:.2} = {:.2}",
                c.name, c.base, c.multiplier, c.score
            ));
        }
        lines.push(String::new());

        lines.push("## Top Contributing Steps\n".to_string());
        for c in &report.top_contributors {
            lines.push(format!(
                "- `{}`: {:.2} (side {:.2}, technique {:.2}, family {:.2}, equipment {:.2})",
                c.step_id, c.total, c.location, c.technique, c.family, c.equipment
            ));
        }
        lines.push(String::new());

        lines.push(format!("## Structural Signals: {:.2}\n", report.signal_score));
        let active: Vec<&SignalScore> = report.signal_scores.iter().filter(|s| s.count > 0).collect();
        if active.is_empty() {
            lines.push("- none".to_string());
        }
        for s in active {
            lines.push(format!(
                "- {}: {} × {:.2} = {:.2}",
                s.name, s.count, s.weight, s.score
            ));
        }

        lines.join("\n")
    }
}

fn category(name: &str, base: f64, multiplier: f64) -> CategoryScore {
    CategoryScore {
        name: name.to_string(),
        base,
        multiplier,
        score: base * multiplier,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActionFamily, Step};

    fn line_build() -> Build {
        Build::new("b")
            .with_step(Step::new("a", 1, ActionFamily::Prep).with_station("garnish").with_technique("slice"))
            .with_step(
                Step::new("b", 2, ActionFamily::Heat)
                    .with_station("fryer")
                    .with_equipment("fryer")
                    .with_technique("fry")
                    .with_duration(180.0)
                    .depending_on("a"),
            )
    }

    #[test]
    fn test_step_ledger() {
        let config = PreplineConfig::default();
        let report = ComplexityScorer::new(&config).score(&line_build());
        let fry = &report.steps[1];
        assert_eq!(fry.location, 2.0);
        assert_eq!(fry.technique, 2.0);
        assert_eq!(fry.family, 1.0);
        assert_eq!(fry.equipment, 2.0);
        assert_eq!(fry.total, 7.0);
    }

    #[test]
    fn test_raw_score_sums_categories_and_signals() {
        let config = PreplineConfig::default();
        let report = ComplexityScorer::new(&config).score(&line_build());
        // slice: 1 + 1.5 + 0.5 + 0 ; fry: 2 + 2 + 1 + 2
        assert_eq!(report.category("location").map(|c| c.score), Some(3.0));
        assert_eq!(report.category("technique").map(|c| c.score), Some(5.0));
        assert_eq!(report.category("equipment").map(|c| c.score), Some(2.0));
        assert_eq!(report.category("station_movement").map(|c| c.score), Some(2.0));
        assert_eq!(report.category("task_count").map(|c| c.score), Some(1.0));
        let categories: f64 = report.categories.iter().map(|c| c.score).sum();
        assert!((report.raw_score - categories - report.signal_score).abs() < 1e-9);
        assert_eq!(report.rating, Rating::Low);
    }

    #[test]
    fn test_fixed_cut_points() {
        let cuts = [20.0, 40.0, 70.0];
        assert_eq!(Rating::from_cut_points(19.9, cuts), Rating::Low);
        assert_eq!(Rating::from_cut_points(20.0, cuts), Rating::Medium);
        assert_eq!(Rating::from_cut_points(69.0, cuts), Rating::High);
        assert_eq!(Rating::from_cut_points(70.0, cuts), Rating::VeryHigh);
    }

    #[test]
    fn test_percentile_rating_falls_back_without_portfolio() {
        let mut config = PreplineConfig::default();
        config.scoring.rating_mode = RatingMode::Percentile;
        let scorer = ComplexityScorer::new(&config);
        assert_eq!(scorer.rate(25.0, None), Rating::Medium);
        assert_eq!(scorer.rate(25.0, Some([5.0, 10.0, 20.0])), Rating::VeryHigh);
        assert_eq!(scorer.rate(5.0, Some([5.0, 10.0, 20.0])), Rating::Low);
    }

    #[test]
    fn test_explain_mentions_formula_and_signals() {
        let config = PreplineConfig::default();
        let scorer = ComplexityScorer::new(&config);
        let report = scorer.score(&line_build());
        let text = scorer.explain(&report);
        assert!(text.starts_with("# Complexity Score"));
        assert!(text.contains("## Scoring Formula"));
        assert!(text.contains("`b`"));
        assert!(text.contains("station_movement"));
    }
}
