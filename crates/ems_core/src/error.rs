use std::error::Error;
use std::fmt;

use bevy_ecs::prelude::Resource;

use crate::network::NodeId;

/// Fatal simulation failures. Every variant is a logic or configuration
/// defect: the run must stop, nothing here is recoverable.
#[derive(Debug, Clone, PartialEq)]
pub enum SimulationError {
    /// A second priority-1 request reached an ambulance already serving a patient.
    DoubleService { ambulance: u32 },
    /// The ambulance lock had waiters at a moment that must be uncontended.
    LockContended { ambulance: u32 },
    /// A lock request used a priority outside the {1, 2} scheme.
    InvalidPriority { priority: u8 },
    /// Mutually exclusive activity flags were observed together.
    ActivityConflict { ambulance: u32, detail: &'static str },
    /// Battery fell below zero beyond the floating-point tolerance.
    BatteryDepleted { ambulance: u32, level: f64 },
    /// Battery rose above capacity beyond the floating-point tolerance.
    BatteryOverfull { ambulance: u32, level: f64 },
    /// An ambulance cannot reach its base and is not at a hospital.
    Stranded { ambulance: u32, node: NodeId },
    /// An ambulance cannot reach its base and its hospital has no chargers.
    NoChargerAtHospital { ambulance: u32, node: NodeId },
    /// A charging site has neither a fast nor a regular charger configured.
    NoChargerConfigured { node: NodeId },
    /// A hospital top-up charge was interrupted; the reachability margin
    /// makes this impossible unless dispatch is defective.
    HospitalChargeInterrupted { ambulance: u32 },
    /// Patients were still waiting when the event queue drained.
    PatientsLeftWaiting { count: usize },
    /// The arrival process produced no calls.
    NoCalls,
    /// A distribution parameter outside its valid range.
    InvalidParameter { detail: &'static str },
    /// A generated arrival fell outside the configured time horizon.
    ArrivalPastHorizon { time: f64, horizon: f64 },
    /// A charger grant arrived for an ambulance that was not waiting for one.
    UnexpectedChargerGrant { ambulance: u32 },
}

impl fmt::Display for SimulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulationError::DoubleService { ambulance } => write!(
                f,
                "ambulance {ambulance} was assigned a patient while already serving one"
            ),
            SimulationError::LockContended { ambulance } => write!(
                f,
                "ambulance {ambulance} lock has waiters at an uncontended point"
            ),
            SimulationError::InvalidPriority { priority } => {
                write!(f, "lock priority {priority} is outside the {{1, 2}} scheme")
            }
            SimulationError::ActivityConflict { ambulance, detail } => {
                write!(f, "ambulance {ambulance} activity conflict: {detail}")
            }
            SimulationError::BatteryDepleted { ambulance, level } => {
                write!(f, "ambulance {ambulance} battery fell to {level} kWh")
            }
            SimulationError::BatteryOverfull { ambulance, level } => {
                write!(f, "ambulance {ambulance} battery rose to {level} kWh")
            }
            SimulationError::Stranded { ambulance, node } => write!(
                f,
                "ambulance {ambulance} cannot reach its base from node {node} and is not at a hospital"
            ),
            SimulationError::NoChargerAtHospital { ambulance, node } => write!(
                f,
                "ambulance {ambulance} cannot reach its base and hospital {node} has no chargers"
            ),
            SimulationError::NoChargerConfigured { node } => {
                write!(f, "no charger configured at site {node}")
            }
            SimulationError::HospitalChargeInterrupted { ambulance } => write!(
                f,
                "hospital top-up charge of ambulance {ambulance} was interrupted"
            ),
            SimulationError::PatientsLeftWaiting { count } => {
                write!(f, "{count} patient(s) still waiting after the event queue drained")
            }
            SimulationError::NoCalls => write!(f, "arrival process generated zero calls"),
            SimulationError::InvalidParameter { detail } => {
                write!(f, "invalid parameter: {detail}")
            }
            SimulationError::ArrivalPastHorizon { time, horizon } => {
                write!(f, "arrival at {time} exceeds the process horizon {horizon}")
            }
            SimulationError::UnexpectedChargerGrant { ambulance } => {
                write!(f, "charger granted to ambulance {ambulance} which is not waiting")
            }
        }
    }
}

impl Error for SimulationError {}

/// Latches the first fatal error raised while the schedule runs.
///
/// Systems cannot return `Result`, so invariant checks store their failure
/// here and the runner stops before popping the next event.
#[derive(Resource, Debug, Default)]
pub struct SimulationFault(Option<SimulationError>);

impl SimulationFault {
    /// Record `err` unless an earlier fault is already latched.
    pub fn latch(&mut self, err: SimulationError) {
        if self.0.is_none() {
            self.0 = Some(err);
        }
    }

    pub fn get(&self) -> Option<&SimulationError> {
        self.0.as_ref()
    }

    pub fn take(&mut self) -> Option<SimulationError> {
        self.0.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_keeps_first_error() {
        let mut fault = SimulationFault::default();
        fault.latch(SimulationError::NoCalls);
        fault.latch(SimulationError::DoubleService { ambulance: 3 });
        assert_eq!(fault.get(), Some(&SimulationError::NoCalls));
    }

    #[test]
    fn display_names_the_ambulance() {
        let err = SimulationError::BatteryDepleted {
            ambulance: 7,
            level: -0.5,
        };
        assert!(err.to_string().contains("ambulance 7"));
    }
}
