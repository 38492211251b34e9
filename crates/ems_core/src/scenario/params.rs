use bevy_ecs::prelude::Resource;
use serde::Serialize;

use crate::chargers::ChargerSiteSpec;
use crate::ecs::EngineKind;
use crate::network::NodeId;

/// Default emergency call rate: one call per 7.75 minutes on average.
const DEFAULT_CALL_RATE_PER_MIN: f64 = 1.0 / 7.75;

/// Default fraction of patients that must be transported to a hospital.
const DEFAULT_HOSPITAL_PROBABILITY: f64 = 0.63;

/// Default arrival window for the fixed-horizon process (minutes).
const DEFAULT_ARRIVAL_HORIZON_MIN: f64 = 720.0;

/// How the arrival stream is bounded: either a fixed number of calls or all
/// calls whose cumulative interarrival time fits inside a horizon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum ArrivalProcess {
    Calls(usize),
    Horizon(f64),
}

/// Shifted lognormal with rejection outside `[0, cutoff]`. A sample is
/// `exp(N(ln scale, sigma)) + location`, redrawn while negative or past the
/// cutoff.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LogNormalParams {
    pub sigma: f64,
    pub location: f64,
    pub scale: f64,
    pub cutoff: f64,
}

impl LogNormalParams {
    /// On-site aid duration, fitted on historical deployments.
    pub fn on_site_aid() -> Self {
        Self {
            sigma: 0.38,
            location: -10.01,
            scale: 37.00,
            cutoff: 88.0,
        }
    }

    /// Hospital hand-over duration, fitted on historical deployments.
    pub fn drop_off() -> Self {
        Self {
            sigma: 0.39,
            location: -8.25,
            scale: 35.89,
            cutoff: 88.0,
        }
    }
}

/// Full configuration of one simulation run.
///
/// Inserted into the world as a resource; systems read it for energy rates,
/// the relief-driving penalty and the reachability buffer.
#[derive(Debug, Clone, Resource, Serialize)]
pub struct ScenarioParams {
    pub num_ambulances: usize,
    pub engine: EngineKind,
    /// Base station per ambulance, cycled when shorter than the fleet.
    pub bases: Vec<NodeId>,
    pub seed: u64,
    pub process: ArrivalProcess,
    /// Rate of the exponential interarrival distribution (calls per minute).
    pub call_rate_per_min: f64,
    pub hospital_probability: f64,
    pub aid_time: LogNormalParams,
    pub drop_off_time: LogNormalParams,
    pub battery_capacity_kwh: f64,
    pub driving_usage_kwh_per_km: f64,
    pub idle_usage_kwh_per_hour: f64,
    /// Travel-time factor without sirens; relief legs take `siren / penalty`.
    pub no_siren_penalty: f64,
    pub chargers: Vec<ChargerSiteSpec>,
    /// Waiting-queue sweep period for electric fleets (minutes).
    pub sweep_interval_min: f64,
    /// How long the sweep keeps polling after the last arrival (minutes).
    pub settle_window_min: f64,
}

impl Default for ScenarioParams {
    fn default() -> Self {
        Self {
            num_ambulances: 20,
            engine: EngineKind::Electric,
            bases: vec![0],
            seed: 110,
            process: ArrivalProcess::Horizon(DEFAULT_ARRIVAL_HORIZON_MIN),
            call_rate_per_min: DEFAULT_CALL_RATE_PER_MIN,
            hospital_probability: DEFAULT_HOSPITAL_PROBABILITY,
            aid_time: LogNormalParams::on_site_aid(),
            drop_off_time: LogNormalParams::drop_off(),
            battery_capacity_kwh: 150.0,
            driving_usage_kwh_per_km: 0.4,
            idle_usage_kwh_per_hour: 5.0,
            no_siren_penalty: 0.95,
            chargers: Vec::new(),
            sweep_interval_min: 1.0,
            settle_window_min: 100.0,
        }
    }
}

impl ScenarioParams {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_engine(mut self, engine: EngineKind) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_fleet(mut self, num_ambulances: usize, bases: Vec<NodeId>) -> Self {
        self.num_ambulances = num_ambulances;
        self.bases = bases;
        self
    }

    pub fn with_process(mut self, process: ArrivalProcess) -> Self {
        self.process = process;
        self
    }

    pub fn with_call_rate(mut self, rate_per_min: f64) -> Self {
        self.call_rate_per_min = rate_per_min;
        self
    }

    pub fn with_chargers(mut self, chargers: Vec<ChargerSiteSpec>) -> Self {
        self.chargers = chargers;
        self
    }

    /// Base node of the ambulance with the given id.
    pub fn base_for(&self, ambulance_id: u32) -> NodeId {
        self.bases[ambulance_id as usize % self.bases.len()]
    }
}
