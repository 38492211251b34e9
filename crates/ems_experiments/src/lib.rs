//! Parallel experimentation driver for the ambulance fleet simulation.
//!
//! This crate runs batches of simulations with varying parameters, extracts
//! per-run metrics from the record tables, and exports the summaries for
//! analysis. A typical study compares diesel against electric fleets across
//! charger scenarios, with several replications per configuration.
//!
//! # Quick Start
//!
//! ```no_run
//! use ems_experiments::{run_parameter_sweep, ParameterSpace};
//!
//! // Define parameter space (grid search), 5 replications each
//! let space = ParameterSpace::grid()
//!     .fleet_sizes(vec![2, 4])
//!     .replications(5);
//!
//! // Generate parameter sets and run them in parallel
//! let parameter_sets = space.generate();
//! let results = run_parameter_sweep(parameter_sets, None);
//! ```
//!
//! # Architecture
//!
//! - [`parameters`]: parameter grid expansion and per-run seeding
//! - [`runner`]: parallel execution using rayon
//! - [`metrics`]: metric extraction from the record tables
//! - [`export`]: CSV/JSON summary writers and per-run parquet passthrough

pub mod export;
pub mod metrics;
pub mod parameters;
pub mod runner;

pub use export::{export_to_csv, export_to_json, write_run_tables};
pub use metrics::SimulationResult;
pub use parameters::{ParameterSet, ParameterSpace};
pub use runner::{run_parameter_sweep, run_single_simulation};
