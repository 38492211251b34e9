//! Ambulance selection and reachability.
//!
//! Dispatch picks, among the ambulances not serving anyone, the one with the
//! shortest siren drive to the patient, after filtering out electric
//! vehicles whose battery cannot cover the worst-case episode. An ambulance
//! driving back to base competes from the point it has reached so far, an
//! ambulance on a charger competes with the energy gained so far.

use bevy_ecs::prelude::Entity;

use crate::battery::{driving_cost_kwh, gained_kwh, idle_cost_kwh};
use crate::chargers::ChargingStationRegistry;
use crate::ecs::{Activity, Ambulance, ChargePhase, ChargeSession, Fleet, FleetRoster, WaitingPatient};
use crate::error::SimulationError;
use crate::network::{NodeId, RoadNetwork};
use crate::scenario::params::ScenarioParams;

/// Where the ambulance effectively is at `now`: its last node, or the node
/// nearest to the point reached on an in-progress relief drive.
pub fn effective_location(
    net: &RoadNetwork,
    ambulance: &Ambulance,
    activity: &Activity,
    now: f64,
) -> NodeId {
    match &activity.drive {
        Some(drive) => {
            let total = net.quiet_minutes(drive.from, ambulance.base);
            let fraction = if total > 0.0 {
                ((now - drive.started_at) / total).min(1.0)
            } else {
                1.0
            };
            let (x, y) = net.position_along(drive.from, ambulance.base, fraction);
            net.closest_node(x, y)
        }
        None => ambulance.location,
    }
}

/// Whether the ambulance can serve this patient without running flat.
///
/// Diesel vehicles always can. An electric vehicle must cover the drive to
/// the patient, a worst-case on-site idle (the aid-time cutoff), and the
/// onward legs: with chargers at the hospital, to the hospital and
/// alternatively straight to base; without, to base both directly and via
/// the hospital.
#[allow(clippy::too_many_arguments)]
pub fn patient_reachable(
    net: &RoadNetwork,
    registry: &ChargingStationRegistry,
    params: &ScenarioParams,
    ambulance: &Ambulance,
    activity: &Activity,
    effective: NodeId,
    patient: NodeId,
    hospital: NodeId,
    now: f64,
) -> Result<bool, SimulationError> {
    if !ambulance.engine.is_electric() {
        return Ok(true);
    }
    if activity.drive.is_some() && activity.is_charging() {
        return Err(SimulationError::ActivityConflict {
            ambulance: ambulance.id,
            detail: "driving to base while plugged into a charger",
        });
    }

    let usage = params.driving_usage_kwh_per_km;
    let cost = |from: NodeId, to: NodeId| driving_cost_kwh(net.distance_km(from, to), usage);

    let idle_buffer = idle_cost_kwh(params.aid_time.cutoff, params.idle_usage_kwh_per_hour);
    let to_patient = cost(effective, patient);
    let route_aph = to_patient + idle_buffer + cost(patient, hospital);
    let route_apb = to_patient + idle_buffer + cost(patient, ambulance.base);
    let route_aphb = route_aph + cost(hospital, ambulance.base);

    let mut available = ambulance.battery.level();
    if let Some(drive) = &activity.drive {
        available -= cost(drive.from, effective);
    }
    if let Some(ChargeSession {
        speed_kw,
        phase: ChargePhase::Charging { since, .. },
        ..
    }) = &activity.charge
    {
        available += gained_kwh(*since, now, *speed_kw);
    }

    if registry.hospital_has_chargers(hospital) {
        Ok(available >= route_aph && available >= route_apb)
    } else {
        Ok(available >= route_apb && available >= route_aphb)
    }
}

/// Whether an electric ambulance can drive from its current node back to
/// base on the remaining charge.
pub fn base_reachable(net: &RoadNetwork, params: &ScenarioParams, ambulance: &Ambulance) -> bool {
    if !ambulance.engine.is_electric() {
        return true;
    }
    let needed = driving_cost_kwh(
        net.distance_km(ambulance.location, ambulance.base),
        params.driving_usage_kwh_per_km,
    );
    ambulance.battery.level() >= needed
}

/// A successful selection plus the fleet counts recorded with it.
#[derive(Debug, Clone, Copy)]
pub struct DispatchOutcome {
    pub entity: Entity,
    pub ambulance_id: u32,
    /// Ambulances not serving anyone when the patient was considered.
    pub available: u64,
    /// Of those, how many failed the reachability check.
    pub not_assignable: u64,
}

/// Pick the free, reachability-cleared ambulance with the shortest siren
/// drive to the patient. Scans in roster (ascending id) order, so ties go
/// to the lowest id. `Ok(None)` means the patient stays in the queue.
pub fn select_ambulance(
    net: &RoadNetwork,
    registry: &ChargingStationRegistry,
    params: &ScenarioParams,
    roster: &FleetRoster,
    fleet: &Fleet,
    patient: &WaitingPatient,
    now: f64,
) -> Result<Option<DispatchOutcome>, SimulationError> {
    let mut available = 0u64;
    let mut not_assignable = 0u64;
    let mut best: Option<(Entity, u32, f64)> = None;

    for entity in roster.iter() {
        let Ok((_, ambulance, activity)) = fleet.get(entity) else {
            continue;
        };
        if !activity.is_free() {
            continue;
        }
        available += 1;

        let effective = effective_location(net, ambulance, activity, now);
        let reachable = patient_reachable(
            net,
            registry,
            params,
            ambulance,
            activity,
            effective,
            patient.node,
            patient.hospital,
            now,
        )?;
        if !reachable {
            not_assignable += 1;
            continue;
        }

        let minutes = net.siren_minutes(effective, patient.node);
        if best.map_or(true, |(_, _, best_minutes)| minutes < best_minutes) {
            best = Some((entity, ambulance.id, minutes));
        }
    }

    Ok(best.map(|(entity, ambulance_id, _)| DispatchOutcome {
        entity,
        ambulance_id,
        available,
        not_assignable,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battery::Battery;
    use crate::chargers::{ChargerSiteSpec, SiteKind};
    use crate::ecs::{DriveToBase, EngineKind};
    use crate::locks::PreemptibleLock;
    use crate::network::NetworkBuilder;

    // 1 --4min/10km-- 2 --4min/10km-- 3, hospital at 3, base at 1.
    fn line_network() -> RoadNetwork {
        NetworkBuilder::new(0.95)
            .node(1, 0.0, 0.0, 1.0)
            .node(2, 10.0, 0.0, 1.0)
            .node(3, 20.0, 0.0, 1.0)
            .edge(1, 2, 4.0, 10.0)
            .edge(2, 3, 4.0, 10.0)
            .hospital(3)
            .build()
    }

    fn electric(base: NodeId, location: NodeId, level: f64) -> Ambulance {
        let mut battery = Battery::new(150.0);
        battery.drain(150.0 - level, 0).unwrap();
        Ambulance {
            id: 0,
            engine: EngineKind::Electric,
            base,
            location,
            battery,
            lock: PreemptibleLock::new(1),
        }
    }

    fn params() -> ScenarioParams {
        ScenarioParams::default()
    }

    #[test]
    fn diesel_is_always_reachable() {
        let net = line_network();
        let registry = ChargingStationRegistry::default();
        let mut ambulance = electric(1, 1, 0.0);
        ambulance.engine = EngineKind::Diesel;
        let ok = patient_reachable(
            &net,
            &registry,
            &params(),
            &ambulance,
            &Activity::default(),
            1,
            3,
            3,
            0.0,
        )
        .unwrap();
        assert!(ok);
    }

    #[test]
    fn reachability_boundary_is_inclusive() {
        let net = line_network();
        let registry = ChargingStationRegistry::default();
        let p = params();

        // From base 1 to patient at 2, hospital at 3, no chargers anywhere:
        // route a-p-b = 10km + idle + 10km, route a-p-h-b = 10 + idle + 10 + 20.
        let idle = idle_cost_kwh(p.aid_time.cutoff, p.idle_usage_kwh_per_hour);
        let aphb = driving_cost_kwh(40.0, p.driving_usage_kwh_per_km) + idle;

        let at_boundary = electric(1, 1, aphb);
        let ok = patient_reachable(
            &net,
            &registry,
            &p,
            &at_boundary,
            &Activity::default(),
            1,
            2,
            3,
            0.0,
        )
        .unwrap();
        assert!(ok, "exact energy must pass");

        let below = electric(1, 1, aphb - 1e-9);
        let ok = patient_reachable(
            &net,
            &registry,
            &p,
            &below,
            &Activity::default(),
            1,
            2,
            3,
            0.0,
        )
        .unwrap();
        assert!(!ok);
    }

    #[test]
    fn hospital_chargers_relax_the_return_leg() {
        let net = line_network();
        let registry = ChargingStationRegistry::from_specs(&[ChargerSiteSpec {
            node: 3,
            site: SiteKind::Hospital,
            fast_count: 1,
            fast_kw: 50.0,
            regular_count: 0,
            regular_kw: 0.0,
        }]);
        let p = params();

        // Enough for a-p-h and a-p-b but not for a-p-h-b.
        let idle = idle_cost_kwh(p.aid_time.cutoff, p.idle_usage_kwh_per_hour);
        let level = driving_cost_kwh(20.0, p.driving_usage_kwh_per_km) + idle;
        let ambulance = electric(1, 1, level);

        let with_chargers = patient_reachable(
            &net,
            &registry,
            &p,
            &ambulance,
            &Activity::default(),
            1,
            2,
            3,
            0.0,
        )
        .unwrap();
        assert!(with_chargers);

        let without = patient_reachable(
            &net,
            &ChargingStationRegistry::default(),
            &p,
            &ambulance,
            &Activity::default(),
            1,
            2,
            3,
            0.0,
        )
        .unwrap();
        assert!(!without);
    }

    #[test]
    fn relief_drive_moves_the_effective_location() {
        let net = line_network();
        let ambulance = electric(1, 3, 150.0);
        let mut activity = Activity::default();
        activity.drive = Some(DriveToBase {
            from: 3,
            started_at: 0.0,
            lock_request: 0,
            event_seq: 0,
        });

        // Full leg 3 -> 1 takes 8 / 0.95 minutes; at half of it the midpoint
        // (10, 0) snaps to node 2.
        let halfway = 4.0 / 0.95;
        assert_eq!(effective_location(&net, &ambulance, &activity, halfway), 2);
        assert_eq!(effective_location(&net, &ambulance, &activity, 0.0), 3);
    }

    #[test]
    fn in_progress_drive_discounts_the_driven_stretch() {
        let net = line_network();
        let registry = ChargingStationRegistry::default();
        let p = params();

        // Battery exactly covers the worst route from node 2 but the
        // ambulance still owes the 3 -> 2 stretch of its relief drive.
        let idle = idle_cost_kwh(p.aid_time.cutoff, p.idle_usage_kwh_per_hour);
        let from_2 = driving_cost_kwh(10.0 + 10.0 + 20.0, p.driving_usage_kwh_per_km) + idle;
        let ambulance = electric(1, 3, from_2);
        let mut activity = Activity::default();
        activity.drive = Some(DriveToBase {
            from: 3,
            started_at: 0.0,
            lock_request: 0,
            event_seq: 0,
        });

        let now = 4.0 / 0.95;
        let effective = effective_location(&net, &ambulance, &activity, now);
        assert_eq!(effective, 2);
        let ok = patient_reachable(
            &net, &registry, &p, &ambulance, &activity, effective, 2, 3, now,
        )
        .unwrap();
        assert!(!ok, "driven stretch must be charged against the battery");
    }

    #[test]
    fn base_reachability_uses_plain_distance() {
        let net = line_network();
        let p = params();
        let exact = electric(1, 3, driving_cost_kwh(20.0, p.driving_usage_kwh_per_km));
        assert!(base_reachable(&net, &p, &exact));
        let short = electric(1, 3, driving_cost_kwh(20.0, p.driving_usage_kwh_per_km) - 1e-9);
        assert!(!base_reachable(&net, &p, &short));
    }
}
