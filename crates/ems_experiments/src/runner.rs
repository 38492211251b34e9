//! Parallel simulation execution using rayon.

use bevy_ecs::prelude::World;
use ems_core::error::SimulationError;
use ems_core::records::SimRecords;
use ems_core::runner::run_to_completion;
use ems_core::scenario::build_scenario;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;

use crate::metrics::{summarize_records, SimulationResult};
use crate::parameters::ParameterSet;

/// Step ceiling per run; generous for any study-sized scenario.
const MAX_STEPS: usize = 10_000_000;

/// Run one parameter set to completion and keep the full record tables
/// alongside the metric summary.
pub fn run_single_simulation_with_records(
    param_set: &ParameterSet,
) -> Result<(SimulationResult, SimRecords), SimulationError> {
    let mut world = World::new();
    build_scenario(&mut world, param_set.network(), param_set.scenario_params())?;
    run_to_completion(&mut world, MAX_STEPS)?;

    let records = world
        .remove_resource::<SimRecords>()
        .unwrap_or_default();
    let result = summarize_records(&records, param_set);
    Ok((result, records))
}

/// Run a single simulation and return its metric summary.
pub fn run_single_simulation(param_set: &ParameterSet) -> Result<SimulationResult, SimulationError> {
    run_single_simulation_with_records(param_set).map(|(result, _)| result)
}

/// Run a sweep in parallel across the available CPU cores.
///
/// Results come back in input order; a failed run carries the fault that
/// stopped it. `num_threads` of `None` uses rayon's default pool size.
pub fn run_parameter_sweep(
    parameter_sets: Vec<ParameterSet>,
    num_threads: Option<usize>,
) -> Vec<Result<SimulationResult, SimulationError>> {
    run_parameter_sweep_with_progress(parameter_sets, num_threads, true)
}

/// [`run_parameter_sweep`] with an optional progress bar.
pub fn run_parameter_sweep_with_progress(
    parameter_sets: Vec<ParameterSet>,
    num_threads: Option<usize>,
    show_progress: bool,
) -> Vec<Result<SimulationResult, SimulationError>> {
    let total = parameter_sets.len();
    let progress = if show_progress && total > 0 {
        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
                )
                .unwrap()
                .progress_chars("#>-"),
        );
        Some(bar)
    } else {
        None
    };

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads.unwrap_or(0))
        .build()
        .expect("failed to create thread pool");

    let progress_ref = progress.clone();
    let results = pool.install(|| {
        parameter_sets
            .par_iter()
            .map(|param_set| {
                let result = run_single_simulation(param_set);
                if let Some(ref bar) = progress_ref {
                    bar.inc(1);
                }
                result
            })
            .collect()
    });

    if let Some(ref bar) = progress {
        bar.finish_with_message("Completed");
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::ParameterSpace;
    use ems_core::ecs::EngineKind;
    use ems_core::scenario::ArrivalProcess;

    fn quick_space() -> ParameterSpace {
        ParameterSpace::grid()
            .fleet_sizes(vec![2])
            .processes(vec![ArrivalProcess::Calls(6)])
    }

    #[test]
    fn single_runs_complete_for_both_engine_types() {
        for set in quick_space().generate() {
            let (result, records) = run_single_simulation_with_records(&set).unwrap();
            assert_eq!(result.total_patients, 6);
            assert_eq!(result.patients_served, 6);
            assert!(result.mean_response_time > 0.0);
            assert_eq!(records.patients.len(), 6);
            if set.engine == EngineKind::Diesel {
                assert_eq!(result.charging_sessions, 0);
            }
        }
    }

    #[test]
    fn sweep_preserves_input_order() {
        let sets = quick_space().replications(2).generate();
        let labels: Vec<String> = sets.iter().map(|s| s.label()).collect();

        let results = run_parameter_sweep_with_progress(sets, Some(2), false);
        assert_eq!(results.len(), labels.len());
        for (result, label) in results.iter().zip(&labels) {
            assert_eq!(&result.as_ref().unwrap().label, label);
        }
    }
}
