//! Result export: CSV and JSON summaries, parquet record tables per run.

use std::error::Error;
use std::fs::File;
use std::path::Path;

use ems_core::records::SimRecords;
use ems_core::records_export::{write_ambulance_events_parquet, write_patients_parquet};

use crate::metrics::SimulationResult;
use crate::parameters::ParameterSet;

/// Write the summary table as CSV, one row per run, headers from the
/// metric field names.
pub fn export_to_csv(
    results: &[SimulationResult],
    path: impl AsRef<Path>,
) -> Result<(), Box<dyn Error>> {
    let mut writer = csv::Writer::from_path(path)?;
    for result in results {
        writer.serialize(result)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the summary as a JSON array.
pub fn export_to_json(
    results: &[SimulationResult],
    path: impl AsRef<Path>,
) -> Result<(), Box<dyn Error>> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, results)?;
    Ok(())
}

/// Write the full record tables of one run into `dir` as
/// `patients_<label>.parquet` and `ambulance_events_<label>.parquet`.
pub fn write_run_tables(
    records: &SimRecords,
    param_set: &ParameterSet,
    dir: impl AsRef<Path>,
) -> Result<(), Box<dyn Error>> {
    let dir = dir.as_ref();
    let label = param_set.label();
    write_patients_parquet(dir.join(format!("patients_{label}.parquet")), records)?;
    write_ambulance_events_parquet(
        dir.join(format!("ambulance_events_{label}.parquet")),
        records,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::ParameterSpace;
    use crate::runner::run_single_simulation_with_records;
    use ems_core::scenario::ArrivalProcess;
    use tempfile::tempdir;

    fn sample_result() -> SimulationResult {
        SimulationResult {
            run_id: 0,
            label: "electric_f2_bases_and_hospitals_r0".to_string(),
            seed: 110,
            total_patients: 6,
            patients_served: 6,
            mean_response_time: 9.5,
            median_response_time: 8.0,
            p90_response_time: 15.0,
            max_response_time: 21.0,
            mean_waiting_time: 1.2,
            charging_sessions: 7,
            charging_interrupted: 1,
            failed_charging_sessions: 0,
            no_free_charger: 0,
            total_km_driven: 88.5,
            mean_busy_fraction: 0.4,
        }
    }

    #[test]
    fn csv_export_writes_headers_and_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("summary.csv");
        export_to_csv(&[sample_result()], &path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert!(lines.next().unwrap().contains("mean_response_time"));
        assert!(lines.next().unwrap().contains("electric_f2"));
    }

    #[test]
    fn json_export_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("summary.json");
        export_to_json(&[sample_result()], &path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed[0]["patients_served"], 6);
        assert_eq!(parsed[0]["seed"], 110);
    }

    #[test]
    fn run_tables_land_next_to_each_other() {
        let set = &ParameterSpace::grid()
            .fleet_sizes(vec![2])
            .processes(vec![ArrivalProcess::Calls(3)])
            .generate()[0];
        let (_, records) = run_single_simulation_with_records(set).unwrap();

        let dir = tempdir().unwrap();
        write_run_tables(&records, set, dir.path()).unwrap();

        let label = set.label();
        assert!(dir.path().join(format!("patients_{label}.parquet")).exists());
        assert!(dir
            .path()
            .join(format!("ambulance_events_{label}.parquet"))
            .exists());
    }
}
