mod support;

use ems_core::battery::charging_minutes;
use ems_core::chargers::{ChargingStationRegistry, PoolChoice, SiteKind};
use ems_core::clock::{EventKind, SimulationClock};
use ems_core::ecs::{
    Activity, Ambulance, ChargeKind, ChargePhase, ChargeSession, DriveToBase, EngineKind,
    WaitingPatient, WaitingPatients,
};
use ems_core::locks::ChargerResponse;
use ems_core::records::{PatientRecord, SimRecords};
use ems_core::runner::{finish_run, run_until_empty, simulation_schedule};
use ems_core::systems::arrivals::ArrivalState;
use ems_core::test_helpers::{
    demo_params, demo_world, BASE_WEST, HOSPITAL_EAST, HOSPITAL_NORTH, TOWN_CENTER, VILLAGE,
};

use support::{fleet_entities, grab_relief_hold, records};

const EPS: f64 = 1e-9;

/// A service request catches an ambulance halfway through its relief drive:
/// the drive is cut at the point reached, snapped to the nearest node, the
/// driven stretch is billed, and the stale arrival event is discarded.
#[test]
fn dispatch_preempts_a_relief_drive_at_the_point_reached() {
    let mut world = demo_world(demo_params(EngineKind::Electric).with_fleet(1, vec![BASE_WEST]));
    let entity = fleet_entities(&world)[0];

    // Put the ambulance on a relief drive HOSPITAL_EAST -> BASE_WEST
    // started at t = 0. Full leg: 10 siren minutes, quiet.
    let total = 10.0 / 0.95;
    let request = {
        let mut ambulance = world.get_mut::<Ambulance>(entity).unwrap();
        ambulance.location = HOSPITAL_EAST;
        grab_relief_hold(&mut ambulance.lock, 0.0)
    };
    let seq = world.resource_mut::<SimulationClock>().schedule_at(
        total,
        EventKind::ReachedBase,
        Some(entity),
    );
    world.get_mut::<Activity>(entity).unwrap().drive = Some(DriveToBase {
        from: HOSPITAL_EAST,
        started_at: 0.0,
        lock_request: request,
        event_seq: seq,
    });

    // A patient waits at the village; a sweep halfway through the drive
    // dispatches the driving ambulance.
    let halfway = 5.0 / 0.95;
    world
        .resource_mut::<SimRecords>()
        .patients
        .push(PatientRecord::new(0, 0.0, VILLAGE));
    world.resource_mut::<WaitingPatients>().push(WaitingPatient {
        idx: 0,
        call_time: 0.0,
        node: VILLAGE,
        hospital: HOSPITAL_NORTH,
        to_hospital: false,
    });
    world.resource_mut::<ArrivalState>().last_arrival = Some(0.0);
    world
        .resource_mut::<SimulationClock>()
        .schedule_at(halfway, EventKind::QueueSweep, None);

    let mut schedule = simulation_schedule();
    run_until_empty(&mut world, &mut schedule, 10_000);
    finish_run(&mut world).unwrap();

    // Halfway along the (12,0) -> (0,0) leg is (6,0), the town center.
    let first_leg = &records(&world).ambulance_events[0];
    assert_eq!(first_leg.source, Some(HOSPITAL_EAST));
    assert_eq!(first_leg.target, Some(TOWN_CENTER));
    assert!((first_leg.driven_km.unwrap() - 6.0).abs() < EPS);
    assert!((first_leg.battery_decrease.unwrap() - 2.4).abs() < EPS);

    let aid = world.resource::<ems_core::draws::DrawStreams>().aid_minutes[0];
    let patient = &records(&world).patients[0];
    assert_eq!(patient.assigned_ambulance, Some(0));
    assert!((patient.waiting_time.unwrap() - halfway).abs() < EPS);
    // Siren leg from the snapped node to the patient.
    assert!((patient.driving_time_to_patient.unwrap() - 4.0).abs() < EPS);
    assert!((patient.response_time.unwrap() - (halfway + 4.0)).abs() < EPS);
    assert!((patient.finish_time.unwrap() - (halfway + 4.0 + aid)).abs() < EPS);

    // Relieved again afterwards: home and recharged.
    let ambulance = world.get::<Ambulance>(entity).unwrap();
    assert_eq!(ambulance.location, BASE_WEST);
    assert!(ambulance.battery.is_full());
    let base_charges: Vec<_> = records(&world)
        .ambulance_events
        .iter()
        .filter(|r| r.charging_type == Some(ChargeKind::Base.code()))
        .collect();
    assert_eq!(base_charges.len(), 1);
    assert_eq!(base_charges[0].charging_success, Some(1));
    assert_eq!(base_charges[0].charging_interrupted, Some(0));
}

/// A service request catches an ambulance plugged in at base: the session
/// keeps the energy gained so far, logs an interrupted-but-successful row,
/// and the stale completion event is discarded.
#[test]
fn dispatch_interrupts_an_active_base_charge() {
    let mut world = demo_world(demo_params(EngineKind::Electric).with_fleet(1, vec![BASE_WEST]));
    let entity = fleet_entities(&world)[0];
    support::set_battery_level(&mut world, entity, 100.0);

    let request = {
        let mut ambulance = world.get_mut::<Ambulance>(entity).unwrap();
        grab_relief_hold(&mut ambulance.lock, 0.0)
    };
    let ticket = {
        let mut registry = world.resource_mut::<ChargingStationRegistry>();
        let pool = registry
            .site_mut(BASE_WEST, SiteKind::Base)
            .unwrap()
            .pool_mut(PoolChoice::Regular)
            .unwrap();
        match pool.slots.request(entity, 0.0) {
            ChargerResponse::Granted { ticket } => ticket,
            other => panic!("slot not granted: {other:?}"),
        }
    };
    let seq = world.resource_mut::<SimulationClock>().schedule_at(
        charging_minutes(50.0, 11.0),
        EventKind::ChargeCompleted,
        Some(entity),
    );
    world.get_mut::<Activity>(entity).unwrap().charge = Some(ChargeSession {
        site: BASE_WEST,
        kind: ChargeKind::Base,
        fast: false,
        speed_kw: 11.0,
        target_kwh: 50.0,
        ticket,
        requested_at: 0.0,
        lock_request: Some(request),
        phase: ChargePhase::Charging {
            since: 0.0,
            event_seq: seq,
        },
    });

    world
        .resource_mut::<SimRecords>()
        .patients
        .push(PatientRecord::new(0, 0.0, TOWN_CENTER));
    world.resource_mut::<WaitingPatients>().push(WaitingPatient {
        idx: 0,
        call_time: 0.0,
        node: TOWN_CENTER,
        hospital: HOSPITAL_EAST,
        to_hospital: true,
    });
    world.resource_mut::<ArrivalState>().last_arrival = Some(0.0);
    world
        .resource_mut::<SimulationClock>()
        .schedule_at(60.0, EventKind::QueueSweep, None);

    let mut schedule = simulation_schedule();
    run_until_empty(&mut world, &mut schedule, 10_000);
    finish_run(&mut world).unwrap();

    // One hour at 11 kW before the interrupt.
    let interrupted = &records(&world).ambulance_events[0];
    assert_eq!(interrupted.charging_type, Some(ChargeKind::Base.code()));
    assert_eq!(interrupted.charging_success, Some(1));
    assert_eq!(interrupted.charging_interrupted, Some(1));
    assert!((interrupted.battery_increase.unwrap() - 11.0).abs() < EPS);
    assert!((interrupted.battery_before.unwrap() - 100.0).abs() < EPS);

    // The hospital drop-off produced a charging row of its own kind.
    assert!(records(&world)
        .ambulance_events
        .iter()
        .any(|r| r.charging_type == Some(ChargeKind::DropOff.code())));

    let patient = &records(&world).patients[0];
    assert_eq!(patient.assigned_ambulance, Some(0));
    assert!((patient.waiting_time.unwrap() - 60.0).abs() < EPS);
    assert!(patient.finish_time.is_some());

    let ambulance = world.get::<Ambulance>(entity).unwrap();
    assert_eq!(ambulance.location, BASE_WEST);
    assert!(ambulance.battery.is_full());
}
