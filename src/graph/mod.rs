//! Index and pattern queries over a build's step graph

pub mod cycles;
pub mod index;
pub mod patterns;

pub use cycles::{find_cycles, format_cycle, normalize_cycle};
pub use index::{station_of, BuildGraph};
pub use patterns::{
    grouping_bounces, station_bounces, station_transitions, Bounce, BounceKind, Transition,
};
