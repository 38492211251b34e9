//! The patient episode: assignment, the siren drive out, on-site aid, the
//! optional hospital leg, and release back into relief.
//!
//! `begin_service` is the single entry point for putting an ambulance on a
//! patient; it acquires the service hold and, when that preempts a relief
//! activity, settles the interrupted drive or charge synchronously before
//! the episode starts.

use bevy_ecs::prelude::{Entity, Res, ResMut};

use crate::battery::{driving_cost_kwh, idle_cost_kwh};
use crate::chargers::{ChargingStationRegistry, SiteKind};
use crate::clock::{CurrentEvent, EventKind, SimulationClock};
use crate::dispatch::patient_reachable;
use crate::draws::DrawStreams;
use crate::ecs::{
    Activity, Ambulance, ChargeKind, Fleet, ServiceEpisode, WaitingPatient, WaitingPatients,
};
use crate::error::{SimulationError, SimulationFault};
use crate::locks::{Acquisition, Hold, PRIORITY_SERVICE};
use crate::network::RoadNetwork;
use crate::records::{AmbulanceRecord, SimRecords};
use crate::scenario::params::ScenarioParams;

use super::charging::{apply_charger_grant, interrupt_charge, start_charge_session, PendingGrant};
use super::drive::start_relief;

/// Claim the ambulance for `patient` and send it out under sirens.
#[allow(clippy::too_many_arguments)]
pub(crate) fn begin_service(
    entity: Entity,
    patient: WaitingPatient,
    clock: &mut SimulationClock,
    net: &RoadNetwork,
    params: &ScenarioParams,
    registry: &mut ChargingStationRegistry,
    records: &mut SimRecords,
    fault: &mut SimulationFault,
    fleet: &mut Fleet,
) {
    let mut pending = None;
    {
        let Ok((_, mut ambulance, mut activity)) = fleet.get_mut(entity) else {
            return;
        };
        let now = clock.now();
        activity.assigned = true;

        let lock_request = match ambulance.lock.request(PRIORITY_SERVICE, now) {
            Ok(Acquisition::Granted { request }) => request,
            Ok(Acquisition::Preempting { request, victim }) => {
                pending = settle_preemption(
                    &mut ambulance,
                    &mut activity,
                    victim,
                    now,
                    net,
                    params,
                    registry,
                    records,
                    fault,
                );
                if fault.get().is_some() {
                    return;
                }
                request
            }
            Ok(Acquisition::Queued { .. }) => {
                fault.latch(SimulationError::DoubleService {
                    ambulance: ambulance.id,
                });
                return;
            }
            Err(err) => {
                fault.latch(err);
                return;
            }
        };

        activity.helping = true;
        let drive_minutes = net.siren_minutes(ambulance.location, patient.node);
        let row = records.patient_mut(patient.idx);
        row.assigned_ambulance = Some(ambulance.id as u64);
        row.waiting_time = Some(now - patient.call_time);
        row.driving_time_to_patient = Some(drive_minutes);

        activity.service = Some(ServiceEpisode {
            patient_idx: patient.idx,
            patient_node: patient.node,
            hospital: patient.hospital,
            call_time: patient.call_time,
            to_hospital: patient.to_hospital,
            lock_request,
            response_time: None,
        });
        clock.schedule_in(drive_minutes, EventKind::ReachedPatient, Some(entity));
    }
    if let Some(pending) = pending {
        apply_charger_grant(pending, clock, fleet, fault);
    }
}

/// Close the books on the relief activity a service request just evicted.
///
/// An interrupted drive is cut short where the ambulance got to: the point
/// on the base leg proportional to the elapsed time, snapped to the nearest
/// node, with the driven stretch billed to the battery. An interrupted
/// charge keeps what it gained so far.
#[allow(clippy::too_many_arguments)]
fn settle_preemption(
    ambulance: &mut Ambulance,
    activity: &mut Activity,
    victim: Hold,
    now: f64,
    net: &RoadNetwork,
    params: &ScenarioParams,
    registry: &mut ChargingStationRegistry,
    records: &mut SimRecords,
    fault: &mut SimulationFault,
) -> Option<PendingGrant> {
    if activity
        .drive
        .map_or(false, |d| d.lock_request == victim.request)
    {
        let drive = activity.drive.take().unwrap();
        let total = net.quiet_minutes(drive.from, ambulance.base);
        let fraction = if total > 0.0 {
            ((now - drive.started_at) / total).min(1.0)
        } else {
            1.0
        };
        let (x, y) = net.position_along(drive.from, ambulance.base, fraction);
        let reached = net.closest_node(x, y);

        if ambulance.engine.is_electric() {
            let km = net.distance_km(drive.from, reached);
            let cost = driving_cost_kwh(km, params.driving_usage_kwh_per_km);
            records.push_ambulance_event(AmbulanceRecord::driving(
                ambulance.id as u64,
                now,
                ambulance.battery.level(),
                cost,
                drive.from,
                reached,
                km,
            ));
            let ambulance_id = ambulance.id;
            if let Err(err) = ambulance.battery.drain(cost, ambulance_id) {
                fault.latch(err);
            }
        } else {
            records.push_ambulance_event(AmbulanceRecord::diesel_driving(
                ambulance.id as u64,
                now,
                drive.from,
                reached,
            ));
        }
        ambulance.location = reached;
        return None;
    }

    if activity
        .charge
        .map_or(false, |c| c.lock_request == Some(victim.request))
    {
        let kind = activity.charge.map(|c| c.kind);
        let pending = interrupt_charge(ambulance, activity, now, registry, records, fault);
        // A hospital top-up runs exactly until base reachability is
        // restored; dispatch must never take the vehicle off it.
        if kind == Some(ChargeKind::Hospital) {
            fault.latch(SimulationError::HospitalChargeInterrupted {
                ambulance: ambulance.id,
            });
        }
        return pending;
    }

    fault.latch(SimulationError::ActivityConflict {
        ambulance: ambulance.id,
        detail: "preempted hold matches neither a drive nor a charge",
    });
    None
}

/// End-of-episode bookkeeping on the ambulance itself.
fn close_episode(
    ambulance: &mut Ambulance,
    activity: &mut Activity,
    now: f64,
    records: &mut SimRecords,
    fault: &mut SimulationFault,
) {
    let Some(episode) = activity.service.take() else {
        fault.latch(SimulationError::ActivityConflict {
            ambulance: ambulance.id,
            detail: "episode closing without a service record",
        });
        return;
    };
    let row = records.patient_mut(episode.patient_idx);
    row.finish_time = Some(now);
    row.response_time = episode.response_time;

    activity.helping = false;
    activity.assigned = false;
    if ambulance.lock.release(episode.lock_request, now).is_some() {
        fault.latch(SimulationError::LockContended {
            ambulance: ambulance.id,
        });
    }
}

/// After an episode the ambulance first looks at the waiting queue, oldest
/// call first, and serves the first patient it can reach from where it
/// stands; only with nothing to take over does it start the relief phase.
#[allow(clippy::too_many_arguments)]
fn take_over_or_relieve(
    entity: Entity,
    clock: &mut SimulationClock,
    net: &RoadNetwork,
    params: &ScenarioParams,
    registry: &mut ChargingStationRegistry,
    records: &mut SimRecords,
    fault: &mut SimulationFault,
    waiting: &mut WaitingPatients,
    fleet: &mut Fleet,
) {
    let now = clock.now();
    let next = {
        let Ok((_, ambulance, activity)) = fleet.get(entity) else {
            return;
        };
        let mut found = None;
        for (i, patient) in waiting.iter().enumerate() {
            match patient_reachable(
                net,
                registry,
                params,
                ambulance,
                activity,
                ambulance.location,
                patient.node,
                patient.hospital,
                now,
            ) {
                Ok(true) => {
                    found = Some(i);
                    break;
                }
                Ok(false) => {}
                Err(err) => {
                    fault.latch(err);
                    return;
                }
            }
        }
        found
    };

    match next {
        Some(i) => {
            let Some(patient) = waiting.remove(i) else {
                return;
            };
            begin_service(
                entity, patient, clock, net, params, registry, records, fault, fleet,
            );
        }
        None => {
            let Ok((_, mut ambulance, mut activity)) = fleet.get_mut(entity) else {
                return;
            };
            start_relief(
                entity,
                &mut ambulance,
                &mut activity,
                clock,
                net,
                params,
                registry,
                records,
                fault,
            );
        }
    }
}

/// Arrived at the patient: bill the siren leg and start on-site aid.
pub fn reached_patient_system(
    current: Res<CurrentEvent>,
    mut clock: ResMut<SimulationClock>,
    net: Res<RoadNetwork>,
    params: Res<ScenarioParams>,
    draws: Res<DrawStreams>,
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
    let Some(episode) = activity.service.as_mut() else {
        return;
    };
    let now = clock.now();

    if ambulance.engine.is_electric() {
        let km = net.distance_km(ambulance.location, episode.patient_node);
        let cost = driving_cost_kwh(km, params.driving_usage_kwh_per_km);
        records.push_ambulance_event(AmbulanceRecord::driving(
            ambulance.id as u64,
            now,
            ambulance.battery.level(),
            cost,
            ambulance.location,
            episode.patient_node,
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
            ambulance.location,
            episode.patient_node,
        ));
    }

    ambulance.location = episode.patient_node;
    episode.response_time = Some(now - episode.call_time);
    records.patient_mut(episode.patient_idx).ambulance_arrival_time = Some(now);

    let aid_minutes = draws.aid_minutes[episode.patient_idx];
    clock.schedule_in(aid_minutes, EventKind::AidCompleted, Some(entity));
}

/// On-site aid done: bill the idle time, then either head for the hospital
/// or close the episode on the spot.
pub fn aid_completed_system(
    current: Res<CurrentEvent>,
    mut clock: ResMut<SimulationClock>,
    net: Res<RoadNetwork>,
    params: Res<ScenarioParams>,
    draws: Res<DrawStreams>,
    mut registry: ResMut<ChargingStationRegistry>,
    mut records: ResMut<SimRecords>,
    mut fault: ResMut<SimulationFault>,
    mut waiting: ResMut<WaitingPatients>,
    mut fleet: Fleet,
) {
    let Some(entity) = current.0.subject else {
        return;
    };
    let now = clock.now();
    let mut episode_over = false;

    {
        let Ok((_, mut ambulance, mut activity)) = fleet.get_mut(entity) else {
            return;
        };
        let Some(episode) = activity.service else {
            return;
        };
        let aid_minutes = draws.aid_minutes[episode.patient_idx];
        records.patient_mut(episode.patient_idx).on_site_aid_time = Some(aid_minutes);

        if ambulance.engine.is_electric() {
            let cost = idle_cost_kwh(aid_minutes, params.idle_usage_kwh_per_hour);
            records.push_ambulance_event(AmbulanceRecord::idle(
                ambulance.id as u64,
                now,
                ambulance.battery.level(),
                cost,
                aid_minutes,
            ));
            let ambulance_id = ambulance.id;
            if let Err(err) = ambulance.battery.drain(cost, ambulance_id) {
                fault.latch(err);
                return;
            }
        } else {
            records.push_ambulance_event(AmbulanceRecord::diesel_idle(
                ambulance.id as u64,
                now,
                aid_minutes,
            ));
        }

        let row = records.patient_mut(episode.patient_idx);
        row.to_hospital = Some(episode.to_hospital);
        if episode.to_hospital {
            let minutes = net.siren_minutes(ambulance.location, episode.hospital);
            row.hospital = Some(episode.hospital);
            row.driving_time_to_hospital = Some(minutes);
            clock.schedule_in(minutes, EventKind::ReachedHospital, Some(entity));
        } else {
            close_episode(&mut ambulance, &mut activity, now, &mut records, &mut fault);
            episode_over = true;
        }
    }

    if episode_over && fault.get().is_none() {
        take_over_or_relieve(
            entity,
            clock.as_mut(),
            &net,
            &params,
            registry.as_mut(),
            records.as_mut(),
            fault.as_mut(),
            waiting.as_mut(),
            &mut fleet,
        );
    }
}

/// Arrived at the hospital: bill the leg, start the hand-over, and plug in
/// for its duration when the hospital can charge.
pub fn reached_hospital_system(
    current: Res<CurrentEvent>,
    mut clock: ResMut<SimulationClock>,
    net: Res<RoadNetwork>,
    params: Res<ScenarioParams>,
    draws: Res<DrawStreams>,
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
    let Some(episode) = activity.service else {
        return;
    };
    let now = clock.now();

    if ambulance.engine.is_electric() {
        let km = net.distance_km(ambulance.location, episode.hospital);
        let cost = driving_cost_kwh(km, params.driving_usage_kwh_per_km);
        records.push_ambulance_event(AmbulanceRecord::driving(
            ambulance.id as u64,
            now,
            ambulance.battery.level(),
            cost,
            ambulance.location,
            episode.hospital,
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
            ambulance.location,
            episode.hospital,
        ));
    }
    ambulance.location = episode.hospital;

    let drop_off_minutes = draws.drop_off_minutes[episode.patient_idx];
    records.patient_mut(episode.patient_idx).drop_off_time = Some(drop_off_minutes);
    clock.schedule_in(drop_off_minutes, EventKind::DropOffCompleted, Some(entity));

    // Opportunistic charging while the patient is handed over; the drop-off
    // end interrupts whatever is still running.
    if ambulance.engine.is_electric() && registry.hospital_has_chargers(episode.hospital) {
        let target = ambulance.battery.deficit();
        start_charge_session(
            entity,
            &mut activity,
            episode.hospital,
            SiteKind::Hospital,
            ChargeKind::DropOff,
            target,
            None,
            clock.as_mut(),
            registry.as_mut(),
            records.as_mut(),
            fault.as_mut(),
        );
    }
}

/// Hand-over done: unplug if still charging, close the episode, and look
/// for the next thing to do.
pub fn drop_off_completed_system(
    current: Res<CurrentEvent>,
    mut clock: ResMut<SimulationClock>,
    net: Res<RoadNetwork>,
    params: Res<ScenarioParams>,
    mut registry: ResMut<ChargingStationRegistry>,
    mut records: ResMut<SimRecords>,
    mut fault: ResMut<SimulationFault>,
    mut waiting: ResMut<WaitingPatients>,
    mut fleet: Fleet,
) {
    let Some(entity) = current.0.subject else {
        return;
    };
    let now = clock.now();
    let mut pending = None;

    {
        let Ok((_, mut ambulance, mut activity)) = fleet.get_mut(entity) else {
            return;
        };
        if activity.service.is_none() {
            return;
        }
        if activity.charge.is_some() {
            pending = interrupt_charge(
                &mut ambulance,
                &mut activity,
                now,
                registry.as_mut(),
                records.as_mut(),
                fault.as_mut(),
            );
        }
        close_episode(&mut ambulance, &mut activity, now, &mut records, &mut fault);
    }

    if let Some(pending) = pending {
        apply_charger_grant(pending, clock.as_mut(), &mut fleet, fault.as_mut());
    }
    if fault.get().is_none() {
        take_over_or_relieve(
            entity,
            clock.as_mut(),
            &net,
            &params,
            registry.as_mut(),
            records.as_mut(),
            fault.as_mut(),
            waiting.as_mut(),
            &mut fleet,
        );
    }
}
