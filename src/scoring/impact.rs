//! Weight-impact preview
//!
//! Scores one portfolio under a baseline and a proposed configuration and
//! reports what the change would do to ranks, ratings and the distribution.

use super::complexity_scorer::Rating;
use super::portfolio::{score_portfolio, PortfolioStats};
use crate::config::PreplineConfig;
use crate::models::Build;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildImpact {
    pub build_id: String,
    pub baseline_score: f64,
    pub proposed_score: f64,
    pub score_delta: f64,
    pub baseline_rank: usize,
    pub proposed_rank: usize,
    /// Positive when the build moves towards rank 1
    pub rank_delta: i64,
    pub baseline_rating: Rating,
    pub proposed_rating: Rating,
}

impl BuildImpact {
    pub fn rating_changed(&self) -> bool {
        self.baseline_rating != self.proposed_rating
    }
}

/// Proposed minus baseline for each portfolio statistic
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsDelta {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
}

impl StatsDelta {
    fn between(baseline: &PortfolioStats, proposed: &PortfolioStats) -> Self {
        Self {
            min: proposed.min - baseline.min,
            max: proposed.max - baseline.max,
            mean: proposed.mean - baseline.mean,
            std_dev: proposed.std_dev - baseline.std_dev,
            p50: proposed.p50 - baseline.p50,
            p75: proposed.p75 - baseline.p75,
            p95: proposed.p95 - baseline.p95,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactCounts {
    pub builds: usize,
    pub rating_changes: usize,
    pub rank_changes: usize,
    pub score_increased: usize,
    pub score_decreased: usize,
    pub unchanged: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactStats {
    pub baseline: PortfolioStats,
    pub proposed: PortfolioStats,
    pub delta: StatsDelta,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactPreview {
    /// In input order
    pub build_impacts: Vec<BuildImpact>,
    /// `"{from}→{to}: N"` for every rating change, sorted by band
    pub migrations: Vec<String>,
    pub stats: ImpactStats,
    pub counts: ImpactCounts,
}

pub fn preview_weight_impact(
    builds: &[Build],
    baseline: &PreplineConfig,
    proposed: &PreplineConfig,
) -> ImpactPreview {
    let before = score_portfolio(builds, baseline);
    let after = score_portfolio(builds, proposed);

    let baseline_ranks = before.ranks_in_input_order();
    let proposed_ranks = after.ranks_in_input_order();
    let mut build_impacts = Vec::with_capacity(builds.len());
    for (i, (old, new)) in before.reports.iter().zip(&after.reports).enumerate() {
        let baseline_rank = baseline_ranks[i];
        let proposed_rank = proposed_ranks[i];
        build_impacts.push(BuildImpact {
            build_id: old.build_id.clone(),
            baseline_score: old.raw_score,
            proposed_score: new.raw_score,
            score_delta: new.raw_score - old.raw_score,
            baseline_rank,
            proposed_rank,
            rank_delta: baseline_rank as i64 - proposed_rank as i64,
            baseline_rating: old.rating,
            proposed_rating: new.rating,
        });
    }

    let mut moves: BTreeMap<(Rating, Rating), usize> = BTreeMap::new();
    for impact in build_impacts.iter().filter(|i| i.rating_changed()) {
        *moves
            .entry((impact.baseline_rating, impact.proposed_rating))
            .or_insert(0) += 1;
    }
    let migrations = moves
        .iter()
        .map(|((from, to), n)| format!("{from}→{to}: {n}"))
        .collect();

    let counts = ImpactCounts {
        builds: build_impacts.len(),
        rating_changes: build_impacts.iter().filter(|i| i.rating_changed()).count(),
        rank_changes: build_impacts.iter().filter(|i| i.rank_delta != 0).count(),
        score_increased: build_impacts.iter().filter(|i| i.score_delta > 0.0).count(),
        score_decreased: build_impacts.iter().filter(|i| i.score_delta < 0.0).count(),
        unchanged: build_impacts.iter().filter(|i| i.score_delta == 0.0).count(),
    };

    info!(
        "Weight impact over {} builds: {} rating changes, {} rank changes",
        counts.builds, counts.rating_changes, counts.rank_changes
    );

    ImpactPreview {
        build_impacts,
        migrations,
        stats: ImpactStats {
            baseline: before.stats,
            proposed: after.stats,
            delta: StatsDelta::between(&before.stats, &after.stats),
        },
        counts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActionFamily, Step};

    fn build(id: &str, stations: &[&str]) -> Build {
        let mut build = Build::new(id);
        for (i, station) in stations.iter().enumerate() {
            build = build.with_step(
                Step::new(&format!("s{i}"), i as u32 + 1, ActionFamily::Heat).with_station(station),
            );
        }
        build
    }

    #[test]
    fn test_identical_configs_change_nothing() {
        let builds = vec![build("a", &["garnish"]), build("b", &["fryer", "turbo"])];
        let config = PreplineConfig::default();
        let preview = preview_weight_impact(&builds, &config, &config);
        assert_eq!(preview.counts.builds, 2);
        assert_eq!(preview.counts.unchanged, 2);
        assert!(preview.migrations.is_empty());
        assert_eq!(preview.stats.delta, StatsDelta::default());
    }

    #[test]
    fn test_heavier_hot_side_migrates_hot_builds() {
        let builds = vec![
            build("cold", &["garnish"]),
            build("hot", &["fryer", "fryer", "fryer", "fryer"]),
        ];
        let baseline = PreplineConfig::default();
        let mut proposed = PreplineConfig::default();
        proposed.scoring = proposed.scoring.with_side_weight("hot_side", 10.0);

        let preview = preview_weight_impact(&builds, &baseline, &proposed);
        let hot = &preview.build_impacts[1];
        // 4 × (2 + 1 + 1) + 2 + 1.5 = 19.5 → 4 × (10 + 1 + 1) + 2 + 1.5 = 51.5
        assert_eq!(hot.baseline_rating, Rating::Low);
        assert_eq!(hot.proposed_rating, Rating::High);
        assert_eq!(preview.migrations, vec!["low→high: 1".to_string()]);
        assert_eq!(preview.counts.score_increased, 1);
        assert_eq!(preview.build_impacts[0].score_delta, 0.0);
        assert!(preview.stats.delta.max > 0.0);
    }

    #[test]
    fn test_duplicate_build_ids_keep_their_own_ranks() {
        let builds = vec![
            build("dup", &["garnish"]),
            build("dup", &["fryer", "fryer", "fryer", "fryer"]),
        ];
        let config = PreplineConfig::default();
        let preview = preview_weight_impact(&builds, &config, &config);
        let ranks: Vec<(usize, usize)> = preview
            .build_impacts
            .iter()
            .map(|i| (i.baseline_rank, i.proposed_rank))
            .collect();
        assert_eq!(ranks, vec![(2, 2), (1, 1)]);
        assert_eq!(preview.counts.rank_changes, 0);
    }
}
