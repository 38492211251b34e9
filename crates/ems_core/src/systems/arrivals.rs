//! The arrival stream: emergency calls appear at pre-drawn times, get a
//! location and hospital, and go straight through dispatch.

use bevy_ecs::prelude::{Res, ResMut, Resource};

use crate::chargers::ChargingStationRegistry;
use crate::clock::{CurrentEvent, EventKind, SimulationClock};
use crate::dispatch::select_ambulance;
use crate::draws::DrawStreams;
use crate::ecs::{Fleet, FleetRoster, WaitingPatient, WaitingPatients};
use crate::error::{SimulationError, SimulationFault};
use crate::network::RoadNetwork;
use crate::records::{PatientRecord, SimRecords};
use crate::scenario::params::{ArrivalProcess, ScenarioParams};

use super::service::begin_service;

/// Progress of the arrival stream.
#[derive(Debug, Resource, Default)]
pub struct ArrivalState {
    pub next_call: usize,
    /// Set once the final call has arrived; the queue sweep polls for a
    /// settle window past this point and then stops.
    pub last_arrival: Option<f64>,
}

/// Kick off the run: schedule the first arrival and, for electric fleets,
/// the first waiting-queue sweep.
pub fn simulation_started_system(
    _current: Res<CurrentEvent>,
    mut clock: ResMut<SimulationClock>,
    params: Res<ScenarioParams>,
    draws: Res<DrawStreams>,
) {
    clock.schedule_in(draws.interarrival[0], EventKind::PatientArrival, None);
    if params.engine.is_electric() {
        clock.schedule_at(0.0, EventKind::QueueSweep, None);
    }
}

/// One emergency call: record it, queue it, and try to dispatch at once.
#[allow(clippy::too_many_arguments)]
pub fn patient_arrival_system(
    _current: Res<CurrentEvent>,
    mut clock: ResMut<SimulationClock>,
    net: Res<RoadNetwork>,
    params: Res<ScenarioParams>,
    draws: Res<DrawStreams>,
    mut state: ResMut<ArrivalState>,
    roster: Res<FleetRoster>,
    mut registry: ResMut<ChargingStationRegistry>,
    mut records: ResMut<SimRecords>,
    mut fault: ResMut<SimulationFault>,
    mut waiting: ResMut<WaitingPatients>,
    mut fleet: Fleet,
) {
    let now = clock.now();
    let idx = state.next_call;
    state.next_call += 1;

    let node = net.sample_location(draws.location_uniform[idx]);
    let patient = WaitingPatient {
        idx,
        call_time: now,
        node,
        hospital: net.nearest_hospital(node),
        to_hospital: draws.to_hospital[idx],
    };
    records.patients.push(PatientRecord::new(idx as u64, now, node));
    waiting.push(patient);

    match select_ambulance(&net, &registry, &params, &roster, &fleet, &patient, now) {
        Ok(Some(outcome)) => {
            let row = records.patient_mut(idx);
            row.ambulances_available = Some(outcome.available);
            row.ambulances_not_assignable = Some(outcome.not_assignable);
            let pos = waiting.iter().position(|p| p.idx == idx);
            if let Some(pos) = pos {
                if let Some(patient) = waiting.remove(pos) {
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
                }
            }
        }
        Ok(None) => {}
        Err(err) => {
            fault.latch(err);
            return;
        }
    }

    if idx + 1 < draws.num_calls() {
        let gap = draws.interarrival[idx + 1];
        if let ArrivalProcess::Horizon(horizon) = params.process {
            if now + gap > horizon {
                fault.latch(SimulationError::ArrivalPastHorizon {
                    time: now + gap,
                    horizon,
                });
                return;
            }
        }
        clock.schedule_in(gap, EventKind::PatientArrival, None);
    } else {
        state.last_arrival = Some(now);
    }
}
