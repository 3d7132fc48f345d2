//! Validation engine tests against whole builds

mod common;

use prepline::config::{PreplineConfig, ValidationConfig};
use prepline::models::{
    ActionFamily, BomEntry, Build, BuildStatus, FlowRef, Location, Severity, Step, SubLocation,
};
use prepline::rules::{validate, validate_with_bom, Validator};

#[test]
fn test_tortilla_is_valid_and_clean() {
    common::init_tracing();
    let result = validate(&common::tortilla(), &PreplineConfig::default());
    assert!(result.valid, "unexpected hard errors: {:?}", result.hard_errors);
    assert!(result.warnings.is_empty(), "unexpected warnings: {:?}", result.warnings);
    assert!(result.infos.is_empty(), "unexpected infos: {:?}", result.infos);
}

#[test]
fn test_heat_step_missing_equipment_and_time() {
    common::init_tracing();
    let result = validate(&common::heat_missing(), &PreplineConfig::default());
    assert!(!result.valid);
    let ids: Vec<&str> = result.hard_errors.iter().map(|e| e.rule_id.as_str()).collect();
    assert_eq!(ids, vec!["heat-requires-equipment", "heat-requires-time-or-notes"]);
    assert!(result.hard_errors.iter().all(|e| e.step_id.as_deref() == Some("h1")));
}

#[test]
fn test_cycle_reported_once_in_any_listing_order() {
    let config = PreplineConfig::default();
    let mut messages = Vec::new();
    for order in [["a", "b", "c"], ["c", "b", "a"], ["b", "c", "a"]] {
        let result = validate(&common::three_cycle(&order), &config);
        let cycles: Vec<_> = result
            .hard_errors
            .iter()
            .filter(|e| e.rule_id == "dag-acyclic")
            .collect();
        assert_eq!(cycles.len(), 1, "order {order:?}");
        assert_eq!(cycles[0].step_id.as_deref(), Some("a"));
        messages.push(cycles[0].message.clone());
    }
    messages.dedup();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("a → b → c → a") || messages[0].contains("a → c → b → a"));
}

#[test]
fn test_single_producer_error_regardless_of_status() {
    let config = PreplineConfig::default();
    let draft = Build::new("dup")
        .with_step(
            Step::new("x", 1, ActionFamily::Prep)
                .with_technique("slice")
                .with_station("prep")
                .with_output(FlowRef::new("a1")),
        )
        .with_step(
            Step::new("y", 2, ActionFamily::Prep)
                .with_technique("dice")
                .with_station("prep")
                .with_output(FlowRef::new("a1")),
        );
    for build in [draft.clone(), draft.published()] {
        let result = validate(&build, &config);
        assert!(!result.valid);
        assert_eq!(result.count_rule("assembly-single-producer"), 1);
    }
}

#[test]
fn test_valid_iff_no_hard_errors() {
    let config = PreplineConfig::default();
    let builds = vec![
        common::tortilla(),
        common::heat_missing(),
        common::three_cycle(&["a", "b", "c"]),
        common::raw_tortilla(),
        Build::new("empty"),
    ];
    let results = Validator::default().validate_batch(&builds, &config, None);
    assert_eq!(results.len(), builds.len());
    for result in &results {
        assert_eq!(result.valid, result.hard_errors.is_empty());
        assert!(result.hard_errors.iter().all(|e| e.severity == Severity::Hard));
        assert!(result.infos.iter().all(|e| e.severity == Severity::Info));
        assert!(result
            .warnings
            .iter()
            .all(|e| matches!(e.severity, Severity::Strong | Severity::Soft)));
    }
    assert_eq!(results[1], validate(&builds[1], &config));
}

#[test]
fn test_bom_coverage_only_with_bom() {
    let config = PreplineConfig::default();
    let build = common::tortilla();
    let bom = vec![
        BomEntry {
            component_id: "tortilla".to_string(),
            kind: "ingredient".to_string(),
            name: "Flour tortilla".to_string(),
        },
        BomEntry {
            component_id: "foil".to_string(),
            kind: "packaging".to_string(),
            name: String::new(),
        },
    ];
    let result = validate_with_bom(&build, &config, &bom);
    assert_eq!(result.count_rule("bom-component-covered"), 1);
    assert!(result.valid);
    assert!(!validate(&build, &config).has_rule("bom-component-covered"));
}

#[test]
fn test_config_file_regrades_rules() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(
        dir.path().join("prepline.toml"),
        r#"
[validation.rules.heat-requires-equipment]
severity = "soft"

[validation.rules.heat-requires-time-or-notes]
enabled = false
"#,
    )
    .expect("write config");
    let config = prepline::load_config(dir.path()).expect("load config");

    let result = validate(&common::heat_missing(), &config);
    assert!(result.valid);
    assert!(!result.has_rule("heat-requires-time-or-notes"));
    let regraded: Vec<_> = result
        .warnings
        .iter()
        .filter(|e| e.rule_id == "heat-requires-equipment")
        .collect();
    assert_eq!(regraded.len(), 1);
    assert_eq!(regraded[0].severity, Severity::Soft);

    let defaults = PreplineConfig {
        validation: ValidationConfig::default(),
        ..config
    };
    assert!(!validate(&common::heat_missing(), &defaults).valid);
}

#[test]
fn test_cross_station_origin_mismatch_blocks_published_build() {
    let config = PreplineConfig::default();
    let mut published = common::tortilla();
    published.steps[1].inputs[0].location = Some(Location::at("speed_line", SubLocation::ColdRail));

    let result = validate(&published, &config);
    assert!(!result.valid);
    assert!(result
        .hard_errors
        .iter()
        .any(|e| e.rule_id == "input-origin-matches-producer" && e.step_id.as_deref() == Some("s2")));

    let mut draft = published.clone();
    draft.status = BuildStatus::Draft;
    let result = validate(&draft, &config);
    assert!(!result
        .hard_errors
        .iter()
        .any(|e| e.rule_id == "input-origin-matches-producer"));
    assert!(result
        .infos
        .iter()
        .any(|e| e.rule_id == "input-origin-matches-producer"));
}
