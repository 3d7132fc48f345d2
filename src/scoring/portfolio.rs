//! Portfolio scoring: many builds scored together, normalized and ranked

use super::complexity_scorer::{ComplexityScorer, ScoreReport};
use crate::config::{PreplineConfig, RatingMode};
use crate::models::Build;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Distribution of raw scores across a portfolio
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Population standard deviation
    pub std_dev: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
}

impl PortfolioStats {
    pub fn from_scores(scores: &[f64]) -> Self {
        if scores.is_empty() {
            return Self::default();
        }
        let mut sorted = scores.to_vec();
        sorted.sort_by(f64::total_cmp);

        let n = sorted.len() as f64;
        let mean = sorted.iter().sum::<f64>() / n;
        let variance = sorted.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;

        Self {
            count: sorted.len(),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            mean,
            std_dev: variance.sqrt(),
            p25: percentile(&sorted, 25.0),
            p50: percentile(&sorted, 50.0),
            p75: percentile(&sorted, 75.0),
            p95: percentile(&sorted, 95.0),
        }
    }

    /// raw ÷ p95 × 100, capped at 100; 0 when p95 is 0
    pub fn normalize(&self, raw_score: f64) -> f64 {
        if self.p95 <= 0.0 {
            return 0.0;
        }
        (raw_score / self.p95 * 100.0).min(100.0)
    }

    pub fn quartiles(&self) -> [f64; 3] {
        [self.p25, self.p50, self.p75]
    }
}

/// Percentile of ascending-sorted values with linear interpolation between ranks
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = (p / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            let frac = rank - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * frac
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedBuild {
    /// 1-based
    pub rank: usize,
    /// Position of the build in the scored slice
    pub input_index: usize,
    pub build_id: String,
    pub raw_score: f64,
    pub normalized_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioResult {
    /// In input order
    pub reports: Vec<ScoreReport>,
    pub stats: PortfolioStats,
    /// Highest raw score first, ties by build id
    pub ranking: Vec<RankedBuild>,
}

impl PortfolioResult {
    pub fn report(&self, build_id: &str) -> Option<&ScoreReport> {
        self.reports.iter().find(|r| r.build_id == build_id)
    }

    pub fn rank_of(&self, build_id: &str) -> Option<usize> {
        self.ranking
            .iter()
            .find(|r| r.build_id == build_id)
            .map(|r| r.rank)
    }

    /// Rank of each build, indexed like `reports`
    pub fn ranks_in_input_order(&self) -> Vec<usize> {
        let mut ranks = vec![0; self.reports.len()];
        for r in &self.ranking {
            if let Some(slot) = ranks.get_mut(r.input_index) {
                *slot = r.rank;
            }
        }
        ranks
    }
}

/// Score every build in parallel, then normalize, re-rate and rank
pub fn score_portfolio(builds: &[Build], config: &PreplineConfig) -> PortfolioResult {
    let scorer = ComplexityScorer::new(config);
    let mut reports: Vec<ScoreReport> = builds.par_iter().map(|b| scorer.score(b)).collect();

    let raw: Vec<f64> = reports.iter().map(|r| r.raw_score).collect();
    let stats = PortfolioStats::from_scores(&raw);
    let quartiles = (config.scoring.rating_mode == RatingMode::Percentile).then(|| stats.quartiles());

    for report in &mut reports {
        report.normalized_score = Some(stats.normalize(report.raw_score));
        report.rating = scorer.rate(report.raw_score, quartiles);
    }

    let mut order: Vec<(usize, &ScoreReport)> = reports.iter().enumerate().collect();
    order.sort_by(|(ai, a), (bi, b)| {
        b.raw_score
            .total_cmp(&a.raw_score)
            .then_with(|| a.build_id.cmp(&b.build_id))
            .then_with(|| ai.cmp(bi))
    });
    let ranking = order
        .iter()
        .enumerate()
        .map(|(i, (input_index, r))| RankedBuild {
            rank: i + 1,
            input_index: *input_index,
            build_id: r.build_id.clone(),
            raw_score: r.raw_score,
            normalized_score: r.normalized_score.unwrap_or(0.0),
        })
        .collect();

    info!(
        "Scored portfolio of {} builds: mean={:.2}, p95={:.2}",
        stats.count, stats.mean, stats.p95
    );

    PortfolioResult {
        reports,
        stats,
        ranking,
    }
}
