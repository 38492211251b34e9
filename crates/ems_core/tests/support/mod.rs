#![allow(dead_code)]

use bevy_ecs::prelude::{Entity, World};

use ems_core::clock::SimulationClock;
use ems_core::ecs::{Ambulance, FleetRoster};
use ems_core::locks::{Acquisition, PreemptibleLock, PRIORITY_RELIEF};
use ems_core::records::SimRecords;

/// Fleet entities in roster (ambulance id) order.
pub fn fleet_entities(world: &World) -> Vec<Entity> {
    world.resource::<FleetRoster>().iter().collect()
}

/// Acquire a relief hold on the ambulance's lock, as the drive and charge
/// paths do, and return the request id.
pub fn grab_relief_hold(lock: &mut PreemptibleLock, now: f64) -> u64 {
    match lock.request(PRIORITY_RELIEF, now).unwrap() {
        Acquisition::Granted { request } => request,
        other => panic!("relief hold not granted: {other:?}"),
    }
}

/// Drain the ambulance's battery down to `level` kWh.
pub fn set_battery_level(world: &mut World, entity: Entity, level: f64) {
    let mut ambulance = world.get_mut::<Ambulance>(entity).unwrap();
    let current = ambulance.battery.level();
    let id = ambulance.id;
    ambulance.battery.drain(current - level, id).unwrap();
}

pub fn now(world: &World) -> f64 {
    world.resource::<SimulationClock>().now()
}

pub fn records(world: &World) -> &SimRecords {
    world.resource::<SimRecords>()
}
