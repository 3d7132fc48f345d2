//! Shared fixtures for integration tests

#![allow(dead_code)]

use prepline::models::{ActionFamily, Build, FlowRef, Location, Step, SubLocation};
use std::path::PathBuf;
use std::sync::Once;

static INIT: Once = Once::new();

/// Install a tracing subscriber once; `RUST_LOG=prepline=debug` shows engine logs
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

pub fn load_fixture(name: &str) -> Build {
    let path = fixtures_path().join(name);
    let json = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read fixture {}: {}", path.display(), e));
    Build::from_json(&json).unwrap_or_else(|e| panic!("Failed to parse fixture {name}: {e}"))
}

/// Three steps with every location explicit: retrieve, toast, wrap
pub fn tortilla() -> Build {
    load_fixture("tortilla.json")
}

/// The tortilla workflow as an author would first write it: stations and
/// flow only, no locations, dependencies or lineage
pub fn raw_tortilla() -> Build {
    Build::new("tortilla-raw")
        .with_step(
            Step::new("r1", 1, ActionFamily::Prep)
                .with_technique("retrieve")
                .with_station("garnish")
                .with_input(FlowRef::external("tortilla"))
                .with_output(FlowRef::new("tortilla_cold")),
        )
        .with_step(
            Step::new("r2", 2, ActionFamily::Heat)
                .with_technique("toast")
                .with_station("toaster")
                .with_equipment("conveyor_toaster")
                .with_duration(30.0)
                .with_input(FlowRef::new("tortilla_cold"))
                .with_output(FlowRef::new("tortilla_toasted")),
        )
        .with_step(
            Step::new("r3", 3, ActionFamily::Package)
                .with_technique("wrap")
                .with_station("expo")
                .with_input(FlowRef::new("tortilla_toasted"))
                .with_output(FlowRef::new("tortilla_wrapped"))
                .with_packaging_target("wrapper"),
        )
}

/// A heat step with neither equipment nor time/notes
pub fn heat_missing() -> Build {
    Build::new("heat-missing").with_step(
        Step::new("h1", 1, ActionFamily::Heat)
            .with_station("turbo")
            .with_output(
                FlowRef::new("warm_bread").with_location(Location::at("turbo", SubLocation::HotHold)),
            ),
    )
}

/// Steps `a → b → c → a` listed in the given order
pub fn three_cycle(order: &[&str]) -> Build {
    let dep = |id: &str| match id {
        "a" => "c",
        "b" => "a",
        _ => "b",
    };
    let mut build = Build::new("cycle");
    for (i, id) in order.iter().enumerate() {
        build = build.with_step(
            Step::new(id, i as u32 + 1, ActionFamily::Prep)
                .with_technique("slice")
                .with_station("prep")
                .depending_on(dep(id))
                .with_output(FlowRef::new(&format!("{id}_out"))),
        );
    }
    build
}
