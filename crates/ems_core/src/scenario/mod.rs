pub mod build;
pub mod params;

pub use build::build_scenario;
pub use params::{ArrivalProcess, LogNormalParams, ScenarioParams};
