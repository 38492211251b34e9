//! Periodic waiting-queue sweep for electric fleets.
//!
//! Reachability can flip from no to yes without any ambulance changing
//! activity, purely because batteries charge and relief drives progress. The
//! sweep re-runs dispatch over the queue on a fixed period, oldest call
//! first, restarting from the front after every success so freed capacity
//! is exhausted within one event. It keeps polling until a settle window
//! after the last arrival has passed.

use bevy_ecs::prelude::{Res, ResMut};

use crate::chargers::ChargingStationRegistry;
use crate::clock::{CurrentEvent, EventKind, SimulationClock};
use crate::dispatch::select_ambulance;
use crate::ecs::{Fleet, FleetRoster, WaitingPatients};
use crate::error::SimulationFault;
use crate::network::RoadNetwork;
use crate::records::SimRecords;
use crate::scenario::params::ScenarioParams;

use super::arrivals::ArrivalState;
use super::service::begin_service;

#[allow(clippy::too_many_arguments)]
pub fn queue_sweep_system(
    _current: Res<CurrentEvent>,
    mut clock: ResMut<SimulationClock>,
    net: Res<RoadNetwork>,
    params: Res<ScenarioParams>,
    state: Res<ArrivalState>,
    roster: Res<FleetRoster>,
    mut registry: ResMut<ChargingStationRegistry>,
    mut records: ResMut<SimRecords>,
    mut fault: ResMut<SimulationFault>,
    mut waiting: ResMut<WaitingPatients>,
    mut fleet: Fleet,
) {
    let now = clock.now();
    if let Some(last) = state.last_arrival {
        if now >= last + params.settle_window_min {
            return;
        }
    }

    loop {
        let mut selected = None;
        for (pos, patient) in waiting.iter().enumerate() {
            match select_ambulance(&net, &registry, &params, &roster, &fleet, patient, now) {
                Ok(Some(outcome)) => {
                    selected = Some((pos, outcome));
                    break;
                }
                Ok(None) => {}
                Err(err) => {
                    fault.latch(err);
                    return;
                }
            }
        }
        let Some((pos, outcome)) = selected else {
            break;
        };
        let Some(patient) = waiting.remove(pos) else {
            break;
        };
        let row = records.patient_mut(patient.idx);
        row.ambulances_available = Some(outcome.available);
        row.ambulances_not_assignable = Some(outcome.not_assignable);
        begin_service(
            outcome.entity,
            patient,
            clock.as_mut(),
            &net,
            &params,
            registry.as_mut(),
            records.as_mut(),
            fault.as_mut(),
            &mut fleet,
        );
        if fault.get().is_some() {
            return;
        }
    }

    clock.schedule_in(params.sweep_interval_min, EventKind::QueueSweep, None);
}
