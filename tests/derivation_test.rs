//! Derivation engine tests

mod common;

use prepline::config::PreplineConfig;
use prepline::derive;
use prepline::models::{ActionFamily, Build, FlowRef, Location, Step, SubLocation};
use prepline::rules::validate;

#[test]
fn test_raw_tortilla_derives_into_a_valid_build() {
    common::init_tracing();
    let config = PreplineConfig::default();
    let raw = common::raw_tortilla();
    let derived = derive(&raw, &config);

    assert!(derived.report.dependencies_added >= 2);
    assert!(derived.report.output_locations >= 3);
    let step = |id: &str| derived.build.step(id).expect("step present");
    assert_eq!(step("r2").depends_on, vec!["r1".to_string()]);
    assert_eq!(step("r3").depends_on, vec!["r2".to_string()]);
    assert_eq!(
        step("r2").work_location,
        Some(Location::equipment(Some("toaster"), "conveyor_toaster"))
    );
    assert_eq!(
        step("r3").outputs[0].location,
        Some(Location::at("expo", SubLocation::WindowShelf))
    );
    assert_eq!(
        step("r1").inputs[0].location,
        Some(Location::at("garnish", SubLocation::ColdStorage))
    );

    let toasted = derived.build.assembly("tortilla_toasted").expect("stub declared");
    assert!(toasted.stub);
    assert_eq!(toasted.lineage.as_deref(), Some("tortilla_cold"));

    let result = validate(&derived.build, &config);
    assert!(result.valid, "unexpected hard errors: {:?}", result.hard_errors);
}

#[test]
fn test_derivation_is_a_fixpoint() {
    let config = PreplineConfig::default();
    for build in [common::raw_tortilla(), common::tortilla(), common::heat_missing()] {
        let once = derive(&build, &config);
        let twice = derive(&once.build, &config);
        assert_eq!(twice.build, once.build, "build {}", build.id);
        assert!(twice.report.is_empty(), "build {}: {:?}", build.id, twice.report);
    }
}

#[test]
fn test_derivation_does_not_mutate_input() {
    let config = PreplineConfig::default();
    let raw = common::raw_tortilla();
    let before = raw.clone();
    let _ = derive(&raw, &config);
    assert_eq!(raw, before);
}

#[test]
fn test_dependencies_follow_flow_regardless_of_input_order() {
    let config = PreplineConfig::default();
    let merge = |inputs: [&str; 2]| {
        Build::new("m")
            .with_step(Step::new("x", 1, ActionFamily::Prep).with_output(FlowRef::new("a1")))
            .with_step(Step::new("w", 2, ActionFamily::Prep).with_output(FlowRef::new("b1")))
            .with_step(
                Step::new("y", 3, ActionFamily::Assemble)
                    .with_input(FlowRef::new(inputs[0]))
                    .with_input(FlowRef::new(inputs[1]))
                    .with_output(FlowRef::new("c1")),
            )
    };
    for inputs in [["a1", "b1"], ["b1", "a1"]] {
        let derived = derive(&merge(inputs), &config);
        let y = derived.build.step("y").expect("step y");
        assert!(y.depends_on.contains(&"x".to_string()), "inputs {inputs:?}");
        assert!(y.depends_on.contains(&"w".to_string()), "inputs {inputs:?}");
    }
}
