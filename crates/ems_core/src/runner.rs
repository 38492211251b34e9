//! Simulation runner: advances the clock and routes events into the ECS.
//!
//! Each step pops the next event from [`SimulationClock`], inserts it as
//! [`CurrentEvent`], then runs the schedule; run conditions make exactly one
//! handler fire per event. A latched [`SimulationFault`] stops the run
//! before the next pop.

use bevy_ecs::prelude::Res;
use bevy_ecs::prelude::{Schedule, World};
use bevy_ecs::schedule::IntoSystemConfigs;

use crate::clock::{CurrentEvent, EventKind, SimulationClock};
use crate::ecs::WaitingPatients;
use crate::error::{SimulationError, SimulationFault};
use crate::systems::{
    arrivals::{patient_arrival_system, simulation_started_system},
    charging::charge_completed_system,
    drive::reached_base_system,
    service::{
        aid_completed_system, drop_off_completed_system, reached_hospital_system,
        reached_patient_system,
    },
    sweep::queue_sweep_system,
};

// Condition functions for each event kind
fn is_simulation_started(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::SimulationStarted)
        .unwrap_or(false)
}

fn is_patient_arrival(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::PatientArrival)
        .unwrap_or(false)
}

fn is_reached_patient(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::ReachedPatient)
        .unwrap_or(false)
}

fn is_aid_completed(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::AidCompleted)
        .unwrap_or(false)
}

fn is_reached_hospital(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::ReachedHospital)
        .unwrap_or(false)
}

fn is_drop_off_completed(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::DropOffCompleted)
        .unwrap_or(false)
}

fn is_reached_base(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::ReachedBase)
        .unwrap_or(false)
}

fn is_charge_completed(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::ChargeCompleted)
        .unwrap_or(false)
}

fn is_queue_sweep(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::QueueSweep)
        .unwrap_or(false)
}

/// Runs one simulation step: pops the next event, inserts it as
/// [`CurrentEvent`], then runs the schedule. Returns `false` once the clock
/// is empty or a fault has been latched.
pub fn run_next_event(world: &mut World, schedule: &mut Schedule) -> bool {
    if world.resource::<SimulationFault>().get().is_some() {
        return false;
    }
    let event = match world.resource_mut::<SimulationClock>().pop_next() {
        Some(e) => e,
        None => return false,
    };
    world.insert_resource(CurrentEvent(event));
    schedule.run(world);
    true
}

/// Runs simulation steps until the event queue drains, a fault stops the
/// run, or `max_steps` is reached. Returns the number of steps executed.
pub fn run_until_empty(world: &mut World, schedule: &mut Schedule, max_steps: usize) -> usize {
    let mut steps = 0;
    while steps < max_steps && run_next_event(world, schedule) {
        steps += 1;
    }
    steps
}

/// Builds the simulation schedule: one handler per event kind, gated by run
/// conditions so only the matching one fires.
pub fn simulation_schedule() -> Schedule {
    let mut schedule = Schedule::default();

    schedule.add_systems(
        (
            // SimulationStarted
            simulation_started_system.run_if(is_simulation_started),
            // PatientArrival
            patient_arrival_system.run_if(is_patient_arrival),
            // ReachedPatient
            reached_patient_system.run_if(is_reached_patient),
            // AidCompleted
            aid_completed_system.run_if(is_aid_completed),
            // ReachedHospital
            reached_hospital_system.run_if(is_reached_hospital),
            // DropOffCompleted
            drop_off_completed_system.run_if(is_drop_off_completed),
            // ReachedBase
            reached_base_system.run_if(is_reached_base),
            // ChargeCompleted
            charge_completed_system.run_if(is_charge_completed),
            // QueueSweep
            queue_sweep_system.run_if(is_queue_sweep),
        )
            .chain(),
    );

    schedule
}

/// Initializes the simulation by scheduling the SimulationStarted event at
/// time 0. Call this after building the scenario and before running events.
pub fn initialize_simulation(world: &mut World) {
    let mut clock = world.resource_mut::<SimulationClock>();
    clock.schedule_at(0.0, EventKind::SimulationStarted, None);
}

/// End-of-run consistency: surface a latched fault, and reject runs that
/// drained the event queue with patients still waiting.
pub fn finish_run(world: &mut World) -> Result<(), SimulationError> {
    if let Some(err) = world.resource_mut::<SimulationFault>().take() {
        return Err(err);
    }
    let waiting = world.resource::<WaitingPatients>();
    if !waiting.is_empty() {
        return Err(SimulationError::PatientsLeftWaiting {
            count: waiting.len(),
        });
    }
    Ok(())
}

/// Full run on a prepared world: initialize, drain the queue, check.
pub fn run_to_completion(world: &mut World, max_steps: usize) -> Result<usize, SimulationError> {
    let mut schedule = simulation_schedule();
    initialize_simulation(world);
    let steps = run_until_empty(world, &mut schedule, max_steps);
    finish_run(world)?;
    Ok(steps)
}
