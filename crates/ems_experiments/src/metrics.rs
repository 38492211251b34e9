//! Metric extraction from the record tables of a finished run.

use bevy_ecs::prelude::World;
use ems_core::records::SimRecords;

use crate::parameters::ParameterSet;

/// Aggregated metrics of a single simulation run.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SimulationResult {
    pub run_id: usize,
    /// Short configuration tag, e.g. `electric_f4_fast_bases_r0`.
    pub label: String,
    pub seed: u64,
    /// Number of emergency calls in the run.
    pub total_patients: usize,
    /// Calls whose episode finished.
    pub patients_served: usize,
    pub mean_response_time: f64,
    pub median_response_time: f64,
    pub p90_response_time: f64,
    pub max_response_time: f64,
    /// Mean time between the call and the dispatch decision.
    pub mean_waiting_time: f64,
    /// Charging sessions that delivered energy.
    pub charging_sessions: usize,
    /// Of those, sessions cut short by a dispatch.
    pub charging_interrupted: usize,
    /// Queued sessions cancelled before a slot was granted.
    pub failed_charging_sessions: usize,
    /// How often every charger pool of a site was occupied at selection.
    pub no_free_charger: u64,
    pub total_km_driven: f64,
    /// Mean share of the run each ambulance spent on an episode.
    pub mean_busy_fraction: f64,
}

/// (mean, median, p90, max) of a sample; zeros for an empty one.
fn stats(values: &[f64]) -> (f64, f64, f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0, 0.0, 0.0);
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mean = sorted.iter().sum::<f64>() / sorted.len() as f64;
    let median = if sorted.len() % 2 == 0 {
        (sorted[sorted.len() / 2 - 1] + sorted[sorted.len() / 2]) / 2.0
    } else {
        sorted[sorted.len() / 2]
    };
    let p90_idx = ((sorted.len() - 1) as f64 * 0.9) as usize;
    let p90 = sorted[p90_idx.min(sorted.len() - 1)];
    let max = sorted[sorted.len() - 1];

    (mean, median, p90, max)
}

/// Extract run metrics from the record tables.
pub fn extract_metrics(world: &World, param_set: &ParameterSet) -> SimulationResult {
    let records = world.resource::<SimRecords>();
    summarize_records(records, param_set)
}

/// Same as [`extract_metrics`], operating on detached record tables.
pub fn summarize_records(records: &SimRecords, param_set: &ParameterSet) -> SimulationResult {
    let response_times: Vec<f64> = records.response_times().collect();
    let (mean_response_time, median_response_time, p90_response_time, max_response_time) =
        stats(&response_times);

    let waiting_times: Vec<f64> = records
        .patients
        .iter()
        .filter_map(|p| p.waiting_time)
        .collect();
    let mean_waiting_time = if waiting_times.is_empty() {
        0.0
    } else {
        waiting_times.iter().sum::<f64>() / waiting_times.len() as f64
    };

    let mut charging_sessions = 0;
    let mut charging_interrupted = 0;
    let mut failed_charging_sessions = 0;
    let mut total_km_driven = 0.0;
    for row in &records.ambulance_events {
        match row.charging_success {
            Some(1) => {
                charging_sessions += 1;
                if row.charging_interrupted == Some(1) {
                    charging_interrupted += 1;
                }
            }
            Some(_) => failed_charging_sessions += 1,
            None => {}
        }
        if let Some(km) = row.driven_km {
            total_km_driven += km;
        }
    }

    // Busy time of an episode runs from dispatch to release; the run length
    // is the last recorded moment of either table.
    let run_end = records
        .patients
        .iter()
        .filter_map(|p| p.finish_time)
        .chain(records.ambulance_events.iter().map(|r| r.time))
        .fold(0.0_f64, f64::max);
    let mut busy = vec![0.0; param_set.num_ambulances];
    for patient in &records.patients {
        if let (Some(id), Some(wait), Some(finish)) = (
            patient.assigned_ambulance,
            patient.waiting_time,
            patient.finish_time,
        ) {
            if let Some(slot) = busy.get_mut(id as usize) {
                *slot += finish - (patient.arrival_time + wait);
            }
        }
    }
    let mean_busy_fraction = if run_end > 0.0 && !busy.is_empty() {
        busy.iter().map(|b| b / run_end).sum::<f64>() / busy.len() as f64
    } else {
        0.0
    };

    SimulationResult {
        run_id: param_set.run_id,
        label: param_set.label(),
        seed: param_set.seed,
        total_patients: records.patients.len(),
        patients_served: records
            .patients
            .iter()
            .filter(|p| p.finish_time.is_some())
            .count(),
        mean_response_time,
        median_response_time,
        p90_response_time,
        max_response_time,
        mean_waiting_time,
        charging_sessions,
        charging_interrupted,
        failed_charging_sessions,
        no_free_charger: records.no_free_charger,
        total_km_driven,
        mean_busy_fraction,
    }
}
