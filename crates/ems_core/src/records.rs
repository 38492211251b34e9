//! In-memory output tables.
//!
//! One row per patient, filled in as the episode progresses, and one
//! append-only battery/usage event log for the fleet. Both tables mirror the
//! parquet schemas in [`crate::records_export`]; absent values stay `None`
//! and export as nulls.

use bevy_ecs::prelude::Resource;
use serde::Serialize;

use crate::network::NodeId;

/// Lifecycle row of one emergency call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientRecord {
    pub patient_id: u64,
    pub response_time: Option<f64>,
    pub arrival_time: f64,
    pub location: NodeId,
    /// Fleet count not serving anyone at dispatch; written on success only.
    pub ambulances_available: Option<u64>,
    /// Of those, how many failed the reachability check.
    pub ambulances_not_assignable: Option<u64>,
    pub assigned_ambulance: Option<u64>,
    pub waiting_time: Option<f64>,
    pub driving_time_to_patient: Option<f64>,
    pub ambulance_arrival_time: Option<f64>,
    pub on_site_aid_time: Option<f64>,
    pub to_hospital: Option<bool>,
    pub hospital: Option<NodeId>,
    pub driving_time_to_hospital: Option<f64>,
    pub drop_off_time: Option<f64>,
    pub finish_time: Option<f64>,
}

impl PatientRecord {
    pub fn new(patient_id: u64, arrival_time: f64, location: NodeId) -> Self {
        Self {
            patient_id,
            response_time: None,
            arrival_time,
            location,
            ambulances_available: None,
            ambulances_not_assignable: None,
            assigned_ambulance: None,
            waiting_time: None,
            driving_time_to_patient: None,
            ambulance_arrival_time: None,
            on_site_aid_time: None,
            to_hospital: None,
            hospital: None,
            driving_time_to_hospital: None,
            drop_off_time: None,
            finish_time: None,
        }
    }
}

/// One battery usage or charging event of an ambulance.
///
/// `use_or_charge` is 0 for battery use, 1 for charging. Usage rows set
/// `idle_or_driving` (0 idle, 1 driving); charging rows set the `charging_*`
/// group. Diesel fleets log movement and idle rows without battery figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AmbulanceRecord {
    pub ambulance_id: u64,
    pub time: f64,
    pub battery_before: Option<f64>,
    pub battery_after: Option<f64>,
    pub use_or_charge: u64,
    pub idle_or_driving: Option<u64>,
    pub idle_time: Option<f64>,
    pub source: Option<NodeId>,
    pub target: Option<NodeId>,
    pub driven_km: Option<f64>,
    pub battery_decrease: Option<f64>,
    pub charging_type: Option<u64>,
    pub charging_location: Option<NodeId>,
    pub speed_kw: Option<f64>,
    pub charging_success: Option<u64>,
    pub waiting_time: Option<f64>,
    pub charging_interrupted: Option<u64>,
    pub charging_time: Option<f64>,
    pub battery_increase: Option<f64>,
}

impl AmbulanceRecord {
    fn blank(ambulance_id: u64, time: f64) -> Self {
        Self {
            ambulance_id,
            time,
            battery_before: None,
            battery_after: None,
            use_or_charge: 0,
            idle_or_driving: None,
            idle_time: None,
            source: None,
            target: None,
            driven_km: None,
            battery_decrease: None,
            charging_type: None,
            charging_location: None,
            speed_kw: None,
            charging_success: None,
            waiting_time: None,
            charging_interrupted: None,
            charging_time: None,
            battery_increase: None,
        }
    }

    /// Battery spent on a driven leg. `before` is the level as the row is
    /// written, ahead of applying the decrease.
    pub fn driving(
        ambulance_id: u64,
        time: f64,
        before: f64,
        decrease: f64,
        source: NodeId,
        target: NodeId,
        driven_km: f64,
    ) -> Self {
        Self {
            battery_before: Some(before),
            battery_after: Some(before - decrease),
            idle_or_driving: Some(1),
            source: Some(source),
            target: Some(target),
            driven_km: Some(driven_km),
            battery_decrease: Some(decrease),
            ..Self::blank(ambulance_id, time)
        }
    }

    /// Battery spent idling on site for `idle_time` minutes.
    pub fn idle(ambulance_id: u64, time: f64, before: f64, decrease: f64, idle_time: f64) -> Self {
        Self {
            battery_before: Some(before),
            battery_after: Some(before - decrease),
            idle_or_driving: Some(0),
            idle_time: Some(idle_time),
            battery_decrease: Some(decrease),
            ..Self::blank(ambulance_id, time)
        }
    }

    /// Movement of a diesel vehicle; no battery bookkeeping.
    pub fn diesel_driving(ambulance_id: u64, time: f64, source: NodeId, target: NodeId) -> Self {
        Self {
            idle_or_driving: Some(1),
            source: Some(source),
            target: Some(target),
            ..Self::blank(ambulance_id, time)
        }
    }

    pub fn diesel_idle(ambulance_id: u64, time: f64, idle_time: f64) -> Self {
        Self {
            idle_or_driving: Some(0),
            idle_time: Some(idle_time),
            ..Self::blank(ambulance_id, time)
        }
    }

    /// Outcome of a charging session. A session that never reached a plug
    /// reports `increase: None` and keeps the charged-time columns null.
    #[allow(clippy::too_many_arguments)]
    pub fn charging(
        ambulance_id: u64,
        time: f64,
        before: f64,
        charging_type: u64,
        location: NodeId,
        speed_kw: f64,
        waiting_time: f64,
        interrupted: bool,
        charged: Option<(f64, f64)>,
    ) -> Self {
        let (charging_time, increase) = match charged {
            Some((charging_time, increase)) => (Some(charging_time), Some(increase)),
            None => (None, None),
        };
        Self {
            battery_before: Some(before),
            battery_after: Some(before + increase.unwrap_or(0.0)),
            use_or_charge: 1,
            charging_type: Some(charging_type),
            charging_location: Some(location),
            speed_kw: Some(speed_kw),
            charging_success: Some(u64::from(charged.is_some())),
            waiting_time: Some(waiting_time),
            charging_interrupted: Some(u64::from(interrupted)),
            charging_time,
            battery_increase: increase,
            ..Self::blank(ambulance_id, time)
        }
    }
}

/// Output of one simulation run.
#[derive(Debug, Resource, Default)]
pub struct SimRecords {
    /// Indexed by patient id; rows are created in arrival order.
    pub patients: Vec<PatientRecord>,
    pub ambulance_events: Vec<AmbulanceRecord>,
    /// How often both charger pools of a site were full at selection.
    pub no_free_charger: u64,
}

impl SimRecords {
    pub fn patient_mut(&mut self, idx: usize) -> &mut PatientRecord {
        &mut self.patients[idx]
    }

    pub fn push_ambulance_event(&mut self, event: AmbulanceRecord) {
        self.ambulance_events.push(event);
    }

    /// Response times of all fully served patients.
    pub fn response_times(&self) -> impl Iterator<Item = f64> + '_ {
        self.patients.iter().filter_map(|p| p.response_time)
    }

    pub fn mean_response_time(&self) -> Option<f64> {
        let mut count = 0usize;
        let mut sum = 0.0;
        for t in self.response_times() {
            count += 1;
            sum += t;
        }
        (count > 0).then(|| sum / count as f64)
    }
}
