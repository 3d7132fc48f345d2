//! Complexity scoring tests over whole builds

mod common;

use prepline::config::{PreplineConfig, RatingMode};
use prepline::derive;
use prepline::scoring::{
    preview_weight_impact, score_build, score_portfolio, ComplexityScorer, Rating,
};

#[test]
fn test_tortilla_rates_low() {
    common::init_tracing();
    let report = score_build(&common::tortilla(), &PreplineConfig::default());
    assert_eq!(report.rating, Rating::Low, "raw score {}", report.raw_score);
    assert_eq!(report.features.step_count, 3);
    assert_eq!(report.signals.transfers.len(), 2);
    assert_eq!(report.signals.station_transitions.len(), 2);
}

#[test]
fn test_top_contributors_ranked_by_step_total() {
    let report = score_build(&common::tortilla(), &PreplineConfig::default());
    let top: Vec<(&str, f64)> = report
        .top_contributors
        .iter()
        .map(|c| (c.step_id.as_str(), c.total))
        .collect();
    // Heat at the toaster outweighs the tied cold and expo steps
    assert_eq!(top, vec![("s2", 5.0), ("s1", 2.0), ("s3", 2.0)]);

    let explanation = ComplexityScorer::new(&PreplineConfig::default()).explain(&report);
    let s2 = explanation.find("- `s2`").expect("s2 listed");
    let s1 = explanation.find("- `s1`").expect("s1 listed");
    assert!(s2 < s1);
}

#[test]
fn test_heavier_hot_side_never_lowers_raw_score() {
    let baseline = PreplineConfig::default();
    let mut heavier = PreplineConfig::default();
    heavier.scoring = heavier.scoring.with_side_weight("hot_side", 4.0);

    let builds = [
        common::tortilla(),
        common::heat_missing(),
        common::raw_tortilla(),
        derive(&common::raw_tortilla(), &baseline).build,
        common::three_cycle(&["a", "b", "c"]),
    ];
    for build in &builds {
        let before = score_build(build, &baseline).raw_score;
        let after = score_build(build, &heavier).raw_score;
        assert!(after >= before, "build {}: {} -> {}", build.id, before, after);
    }
    let tortilla = common::tortilla();
    assert!(score_build(&tortilla, &heavier).raw_score > score_build(&tortilla, &baseline).raw_score);
}

#[test]
fn test_portfolio_normalization_and_ranking() {
    let config = PreplineConfig::default();
    let builds = vec![
        common::tortilla(),
        common::heat_missing(),
        common::three_cycle(&["a", "b", "c"]),
    ];
    let result = score_portfolio(&builds, &config);
    assert_eq!(result.reports.len(), 3);
    assert_eq!(result.stats.count, 3);
    assert!(result.stats.min <= result.stats.p50 && result.stats.p50 <= result.stats.max);
    for report in &result.reports {
        let normalized = report.normalized_score.expect("normalized in portfolio");
        assert!((0.0..=100.0).contains(&normalized));
    }
    for pair in result.ranking.windows(2) {
        assert!(pair[0].raw_score >= pair[1].raw_score);
    }
    assert_eq!(result.ranking[0].rank, 1);
}

#[test]
fn test_percentile_mode_spreads_ratings() {
    let mut config = PreplineConfig::default();
    config.scoring.rating_mode = RatingMode::Percentile;
    let builds = vec![
        common::heat_missing(),
        common::tortilla(),
        common::three_cycle(&["a", "b", "c"]),
    ];
    let result = score_portfolio(&builds, &config);
    let lowest = result.ranking.last().expect("ranked");
    let highest = &result.ranking[0];
    assert_eq!(result.report(&lowest.build_id).map(|r| r.rating), Some(Rating::Low));
    assert_eq!(
        result.report(&highest.build_id).map(|r| r.rating),
        Some(Rating::VeryHigh)
    );
}

#[test]
fn test_weight_impact_preview() {
    let builds = vec![common::tortilla(), common::heat_missing()];
    let baseline = PreplineConfig::default();
    let mut proposed = PreplineConfig::default();
    proposed.scoring.rating_thresholds = [1.0, 2.0, 3.0];

    let preview = preview_weight_impact(&builds, &baseline, &proposed);
    assert_eq!(preview.counts.builds, 2);
    assert_eq!(preview.counts.unchanged, 2);
    assert_eq!(preview.counts.rating_changes, 2);
    assert!(preview.migrations.iter().all(|m| m.starts_with("low→")));
}

#[test]
fn test_explain_report() {
    let config = PreplineConfig::default();
    let scorer = ComplexityScorer::new(&config);
    let report = scorer.score(&common::tortilla());
    let text = scorer.explain(&report);
    assert!(text.contains("(low)"));
    assert!(text.contains("transfer: 2"));
}
