//! Scenario construction: validates the parameters, pre-draws the random
//! streams, inserts every resource and spawns the fleet.

use bevy_ecs::prelude::World;

use crate::battery::Battery;
use crate::chargers::ChargingStationRegistry;
use crate::clock::SimulationClock;
use crate::draws::DrawStreams;
use crate::ecs::{Activity, Ambulance, FleetRoster, WaitingPatients};
use crate::error::{SimulationError, SimulationFault};
use crate::locks::PreemptibleLock;
use crate::network::RoadNetwork;
use crate::records::SimRecords;
use crate::scenario::params::ScenarioParams;
use crate::systems::arrivals::ArrivalState;

/// Prepare `world` for one run. After this, [`crate::runner::initialize_simulation`]
/// and the schedule drive everything.
pub fn build_scenario(
    world: &mut World,
    network: RoadNetwork,
    params: ScenarioParams,
) -> Result<(), SimulationError> {
    if params.num_ambulances == 0 {
        return Err(SimulationError::InvalidParameter {
            detail: "fleet must have at least one ambulance",
        });
    }
    if params.bases.is_empty() {
        return Err(SimulationError::InvalidParameter {
            detail: "at least one base station is required",
        });
    }
    for &base in &params.bases {
        if !network.contains(base) {
            return Err(SimulationError::InvalidParameter {
                detail: "base station is not a network node",
            });
        }
    }
    for charger in &params.chargers {
        if !network.contains(charger.node) {
            return Err(SimulationError::InvalidParameter {
                detail: "charging site is not a network node",
            });
        }
    }
    if network.hospitals().is_empty() {
        return Err(SimulationError::InvalidParameter {
            detail: "network has no hospitals",
        });
    }

    let draws = DrawStreams::generate(&params)?;

    world.insert_resource(SimulationClock::default());
    world.insert_resource(SimulationFault::default());
    world.insert_resource(SimRecords::default());
    world.insert_resource(WaitingPatients::default());
    world.insert_resource(ArrivalState::default());
    world.insert_resource(ChargingStationRegistry::from_specs(&params.chargers));

    let mut roster = FleetRoster::default();
    for id in 0..params.num_ambulances as u32 {
        let base = params.base_for(id);
        let entity = world
            .spawn((
                Ambulance {
                    id,
                    engine: params.engine,
                    base,
                    location: base,
                    battery: Battery::new(params.battery_capacity_kwh),
                    lock: PreemptibleLock::new(1),
                },
                Activity::default(),
            ))
            .id();
        roster.push(entity);
    }
    world.insert_resource(roster);
    world.insert_resource(draws);
    world.insert_resource(network);
    world.insert_resource(params);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::NetworkBuilder;
    use crate::scenario::params::ArrivalProcess;

    fn tiny_network() -> RoadNetwork {
        NetworkBuilder::new(0.95)
            .node(1, 0.0, 0.0, 1.0)
            .node(2, 5.0, 0.0, 1.0)
            .edge(1, 2, 3.0, 4.0)
            .hospital(2)
            .build()
    }

    #[test]
    fn spawns_the_fleet_over_its_bases() {
        let mut world = World::new();
        let params = ScenarioParams::default()
            .with_fleet(3, vec![1, 2])
            .with_process(ArrivalProcess::Calls(1));
        build_scenario(&mut world, tiny_network(), params).unwrap();

        let roster = world.resource::<FleetRoster>();
        assert_eq!(roster.len(), 3);
        let entities: Vec<_> = roster.iter().collect();
        let bases: Vec<_> = entities
            .iter()
            .map(|&e| world.get::<Ambulance>(e).unwrap().base)
            .collect();
        assert_eq!(bases, vec![1, 2, 1]);
        let ids: Vec<_> = entities
            .iter()
            .map(|&e| world.get::<Ambulance>(e).unwrap().id)
            .collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn rejects_bases_outside_the_network() {
        let mut world = World::new();
        let params = ScenarioParams::default().with_fleet(1, vec![99]);
        let err = build_scenario(&mut world, tiny_network(), params).unwrap_err();
        assert!(matches!(err, SimulationError::InvalidParameter { .. }));
    }

    #[test]
    fn rejects_an_empty_fleet() {
        let mut world = World::new();
        let params = ScenarioParams::default().with_fleet(0, vec![1]);
        let err = build_scenario(&mut world, tiny_network(), params).unwrap_err();
        assert!(matches!(err, SimulationError::InvalidParameter { .. }));
    }
}
