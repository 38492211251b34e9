//! Shared fixtures for unit, integration and bench code.
//!
//! A small two-hospital region with two base stations, plus parameter
//! presets sized so a handful of calls exercises every episode shape.

use bevy_ecs::prelude::World;

use crate::chargers::{ChargerSiteSpec, SiteKind};
use crate::ecs::EngineKind;
use crate::network::{NetworkBuilder, RoadNetwork};
use crate::scenario::build::build_scenario;
use crate::scenario::params::{ArrivalProcess, ScenarioParams};

pub const BASE_WEST: u32 = 101;
pub const TOWN_CENTER: u32 = 102;
pub const HOSPITAL_EAST: u32 = 103;
pub const VILLAGE: u32 = 104;
pub const BASE_NORTH: u32 = 105;
pub const HOSPITAL_NORTH: u32 = 106;

/// Six-node demo region. `HOSPITAL_EAST` gets chargers in
/// [`demo_chargers`], `HOSPITAL_NORTH` stays bare.
pub fn demo_network() -> RoadNetwork {
    NetworkBuilder::new(0.95)
        .node(BASE_WEST, 0.0, 0.0, 2.0)
        .node(TOWN_CENTER, 6.0, 0.0, 3.0)
        .node(HOSPITAL_EAST, 12.0, 0.0, 2.0)
        .node(VILLAGE, 6.0, 5.0, 2.0)
        .node(BASE_NORTH, 0.0, 8.0, 1.0)
        .node(HOSPITAL_NORTH, 12.0, 8.0, 1.0)
        .edge(BASE_WEST, TOWN_CENTER, 5.0, 6.0)
        .edge(TOWN_CENTER, HOSPITAL_EAST, 5.0, 6.0)
        .edge(TOWN_CENTER, VILLAGE, 4.0, 5.0)
        .edge(VILLAGE, HOSPITAL_NORTH, 6.0, 7.0)
        .edge(BASE_NORTH, VILLAGE, 6.0, 7.0)
        .edge(BASE_WEST, BASE_NORTH, 7.0, 8.0)
        .edge(HOSPITAL_EAST, HOSPITAL_NORTH, 7.0, 8.0)
        .hospital(HOSPITAL_EAST)
        .hospital(HOSPITAL_NORTH)
        .build()
}

/// Charger layout: a mixed pool at the east hospital, chargers at both
/// bases, nothing at the north hospital.
pub fn demo_chargers() -> Vec<ChargerSiteSpec> {
    vec![
        ChargerSiteSpec {
            node: HOSPITAL_EAST,
            site: SiteKind::Hospital,
            fast_count: 1,
            fast_kw: 50.0,
            regular_count: 1,
            regular_kw: 11.0,
        },
        ChargerSiteSpec {
            node: BASE_WEST,
            site: SiteKind::Base,
            fast_count: 0,
            fast_kw: 0.0,
            regular_count: 2,
            regular_kw: 11.0,
        },
        ChargerSiteSpec {
            node: BASE_NORTH,
            site: SiteKind::Base,
            fast_count: 1,
            fast_kw: 50.0,
            regular_count: 0,
            regular_kw: 0.0,
        },
    ]
}

/// Two-ambulance preset on the demo region with a short fixed call count.
pub fn demo_params(engine: EngineKind) -> ScenarioParams {
    ScenarioParams::default()
        .with_engine(engine)
        .with_fleet(2, vec![BASE_WEST, BASE_NORTH])
        .with_process(ArrivalProcess::Calls(5))
        .with_chargers(demo_chargers())
}

/// A world with the demo network and `params` built in, ready for
/// [`crate::runner::initialize_simulation`].
pub fn demo_world(params: ScenarioParams) -> World {
    let mut world = World::new();
    build_scenario(&mut world, demo_network(), params).expect("demo scenario must build");
    world
}
