//! Example: diesel vs electric fleets across charger scenarios.
//!
//! Runs a grid of configurations in parallel, prints a per-configuration
//! summary, and exports the results to `experiment_results/`.

use ems_core::ecs::EngineKind;
use ems_core::scenario::ArrivalProcess;
use ems_experiments::parameters::ChargerScenario;
use ems_experiments::{export_to_csv, export_to_json, run_parameter_sweep, ParameterSpace};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Starting fleet comparison sweep...");

    let space = ParameterSpace::grid()
        .engines(vec![EngineKind::Diesel, EngineKind::Electric])
        .fleet_sizes(vec![2, 4, 6])
        .processes(vec![ArrivalProcess::Horizon(720.0)])
        .charger_scenarios(vec![
            ChargerScenario::regular_bases(),
            ChargerScenario::fast_bases(),
            ChargerScenario::bases_and_hospitals(),
        ])
        .replications(5);

    let parameter_sets = space.generate();
    println!("Generated {} runs", parameter_sets.len());

    let outcomes = run_parameter_sweep(parameter_sets, None);

    let mut results = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(result) => results.push(result),
            Err(error) => eprintln!("run failed: {error}"),
        }
    }
    println!("Completed {} runs", results.len());

    println!("\n{:<40} {:>8} {:>10} {:>10} {:>8}", "run", "served", "mean_rt", "p90_rt", "waits");
    for result in &results {
        println!(
            "{:<40} {:>8} {:>10.2} {:>10.2} {:>8.2}",
            result.label,
            result.patients_served,
            result.mean_response_time,
            result.p90_response_time,
            result.mean_waiting_time,
        );
    }

    if let Some(best) = results
        .iter()
        .filter(|r| r.patients_served == r.total_patients)
        .min_by(|a, b| a.mean_response_time.total_cmp(&b.mean_response_time))
    {
        println!("\nBest configuration: {}", best.label);
        println!("Mean response time: {:.2} min", best.mean_response_time);
        println!("Charging sessions: {} ({} interrupted)", best.charging_sessions, best.charging_interrupted);
    }

    std::fs::create_dir_all("experiment_results")?;
    export_to_csv(&results, "experiment_results/summary.csv")?;
    export_to_json(&results, "experiment_results/summary.json")?;
    println!("\nSummaries written to experiment_results/");

    Ok(())
}
