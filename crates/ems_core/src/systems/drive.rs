//! Relief legs: driving back to base after an episode, and the charging
//! detours an electric ambulance needs to get there.

use bevy_ecs::prelude::{Entity, Res, ResMut};

use crate::battery::driving_cost_kwh;
use crate::chargers::{ChargingStationRegistry, SiteKind};
use crate::clock::{CurrentEvent, EventKind, SimulationClock};
use crate::dispatch::base_reachable;
use crate::ecs::{Activity, Ambulance, ChargeKind, DriveToBase, Fleet};
use crate::error::{SimulationError, SimulationFault};
use crate::locks::{Acquisition, PRIORITY_RELIEF};
use crate::network::RoadNetwork;
use crate::records::{AmbulanceRecord, SimRecords};
use crate::scenario::params::ScenarioParams;

use super::charging::start_charge_session;

/// Acquire the relief hold and set off towards base, sirens off.
///
/// Also used for a zero-length leg when the ambulance is already at base;
/// the `ReachedBase` event then fires at the same instant and runs the
/// base-charging step.
pub(crate) fn begin_drive_to_base(
    entity: Entity,
    ambulance: &mut Ambulance,
    activity: &mut Activity,
    clock: &mut SimulationClock,
    net: &RoadNetwork,
    fault: &mut SimulationFault,
) {
    if activity.assigned || activity.helping || activity.charge.is_some() {
        fault.latch(SimulationError::ActivityConflict {
            ambulance: ambulance.id,
            detail: "relief drive requested while otherwise occupied",
        });
        return;
    }
    let now = clock.now();
    let lock_request = match ambulance.lock.request(PRIORITY_RELIEF, now) {
        Ok(Acquisition::Granted { request }) => request,
        Ok(_) => {
            fault.latch(SimulationError::LockContended {
                ambulance: ambulance.id,
            });
            return;
        }
        Err(err) => {
            fault.latch(err);
            return;
        }
    };

    let minutes = net.quiet_minutes(ambulance.location, ambulance.base);
    let seq = clock.schedule_in(minutes, EventKind::ReachedBase, Some(entity));
    activity.drive = Some(DriveToBase {
        from: ambulance.location,
        started_at: now,
        lock_request,
        event_seq: seq,
    });
}

/// Start the relief phase after an episode: drive home, or top up at the
/// hospital first when the battery cannot carry the drive.
#[allow(clippy::too_many_arguments)]
pub(crate) fn start_relief(
    entity: Entity,
    ambulance: &mut Ambulance,
    activity: &mut Activity,
    clock: &mut SimulationClock,
    net: &RoadNetwork,
    params: &ScenarioParams,
    registry: &mut ChargingStationRegistry,
    records: &mut SimRecords,
    fault: &mut SimulationFault,
) {
    if base_reachable(net, params, ambulance) {
        begin_drive_to_base(entity, ambulance, activity, clock, net, fault);
        return;
    }
    // Reachability guarantees the episode left enough battery to make it to
    // a hospital charger; anything else is a dispatch defect.
    if !net.is_hospital(ambulance.location) {
        fault.latch(SimulationError::Stranded {
            ambulance: ambulance.id,
            node: ambulance.location,
        });
        return;
    }
    if !registry.hospital_has_chargers(ambulance.location) {
        fault.latch(SimulationError::NoChargerAtHospital {
            ambulance: ambulance.id,
            node: ambulance.location,
        });
        return;
    }

    let now = clock.now();
    let lock_request = match ambulance.lock.request(PRIORITY_RELIEF, now) {
        Ok(Acquisition::Granted { request }) => request,
        Ok(_) => {
            fault.latch(SimulationError::LockContended {
                ambulance: ambulance.id,
            });
            return;
        }
        Err(err) => {
            fault.latch(err);
            return;
        }
    };
    let needed = driving_cost_kwh(
        net.distance_km(ambulance.location, ambulance.base),
        params.driving_usage_kwh_per_km,
    );
    let target = needed - ambulance.battery.level();
    start_charge_session(
        entity,
        activity,
        ambulance.location,
        SiteKind::Hospital,
        ChargeKind::Hospital,
        target,
        Some(lock_request),
        clock,
        registry,
        records,
        fault,
    );
}

/// The relief leg completed: book the driven energy, park at base and, for
/// electric vehicles, recharge to full.
pub fn reached_base_system(
    current: Res<CurrentEvent>,
    mut clock: ResMut<SimulationClock>,
    net: Res<RoadNetwork>,
    params: Res<ScenarioParams>,
    mut registry: ResMut<ChargingStationRegistry>,
    mut records: ResMut<SimRecords>,
    mut fault: ResMut<SimulationFault>,
    mut fleet: Fleet,
) {
    let Some(entity) = current.0.subject else {
        return;
    };
    let Ok((_, mut ambulance, mut activity)) = fleet.get_mut(entity) else {
        return;
    };
    let Some(drive) = activity.drive else {
        return;
    };
    // Stale arrival of a leg that was preempted after scheduling.
    if drive.event_seq != current.0.seq {
        return;
    }
    let now = clock.now();

    if ambulance.engine.is_electric() {
        let km = net.distance_km(drive.from, ambulance.base);
        let cost = driving_cost_kwh(km, params.driving_usage_kwh_per_km);
        records.push_ambulance_event(AmbulanceRecord::driving(
            ambulance.id as u64,
            now,
            ambulance.battery.level(),
            cost,
            drive.from,
            ambulance.base,
            km,
        ));
        let ambulance_id = ambulance.id;
        if let Err(err) = ambulance.battery.drain(cost, ambulance_id) {
            fault.latch(err);
            return;
        }
    } else {
        records.push_ambulance_event(AmbulanceRecord::diesel_driving(
            ambulance.id as u64,
            now,
            drive.from,
            ambulance.base,
        ));
    }

    ambulance.location = ambulance.base;
    activity.drive = None;
    if ambulance.lock.release(drive.lock_request, now).is_some() {
        fault.latch(SimulationError::LockContended {
            ambulance: ambulance.id,
        });
        return;
    }

    if ambulance.engine.is_electric() {
        let lock_request = match ambulance.lock.request(PRIORITY_RELIEF, now) {
            Ok(Acquisition::Granted { request }) => request,
            Ok(_) => {
                fault.latch(SimulationError::LockContended {
                    ambulance: ambulance.id,
                });
                return;
            }
            Err(err) => {
                fault.latch(err);
                return;
            }
        };
        let target = ambulance.battery.deficit();
        let base = ambulance.base;
        start_charge_session(
            entity,
            &mut activity,
            base,
            SiteKind::Base,
            ChargeKind::Base,
            target,
            Some(lock_request),
            clock.as_mut(),
            registry.as_mut(),
            records.as_mut(),
            fault.as_mut(),
        );
    }
}
