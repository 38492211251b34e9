//! Parameter grids for fleet studies.
//!
//! A [`ParameterSpace`] expands into one [`ParameterSet`] per combination of
//! engine type, fleet size, call rate, arrival process and charger scenario,
//! times the requested number of replications. Every run gets its own seed,
//! `base_seed + run_id`, so replications differ while the whole sweep stays
//! reproducible.

use ems_core::chargers::{ChargerSiteSpec, SiteKind};
use ems_core::ecs::EngineKind;
use ems_core::network::{NetworkBuilder, NodeId, RoadNetwork};
use ems_core::scenario::{ArrivalProcess, ScenarioParams};
use serde::Serialize;

pub const CENTRAL_BASE: NodeId = 1;
pub const CENTRAL_HOSPITAL: NodeId = 2;
pub const SUBURB: NodeId = 3;
pub const SOUTH_BASE: NodeId = 4;
pub const SOUTH_HOSPITAL: NodeId = 5;
pub const WEST_VILLAGE: NodeId = 6;
pub const INDUSTRIAL_PARK: NodeId = 7;

/// The study region: seven nodes, two hospitals, two ambulance bases.
/// Distances are km, edge times siren minutes.
pub fn region_network() -> RoadNetwork {
    NetworkBuilder::new(0.95)
        .node(CENTRAL_BASE, 10.0, 10.0, 3.0)
        .node(CENTRAL_HOSPITAL, 12.0, 10.0, 2.0)
        .node(SUBURB, 4.0, 10.0, 4.0)
        .node(SOUTH_BASE, 10.0, 2.0, 2.0)
        .node(SOUTH_HOSPITAL, 14.0, 4.0, 1.0)
        .node(WEST_VILLAGE, 0.0, 6.0, 2.0)
        .node(INDUSTRIAL_PARK, 16.0, 12.0, 1.0)
        .edge(CENTRAL_BASE, CENTRAL_HOSPITAL, 3.0, 2.5)
        .edge(CENTRAL_BASE, SUBURB, 7.0, 6.0)
        .edge(SUBURB, WEST_VILLAGE, 6.0, 5.0)
        .edge(CENTRAL_BASE, SOUTH_BASE, 9.0, 8.0)
        .edge(SOUTH_BASE, SOUTH_HOSPITAL, 5.0, 4.5)
        .edge(CENTRAL_HOSPITAL, INDUSTRIAL_PARK, 5.0, 4.0)
        .edge(CENTRAL_HOSPITAL, SOUTH_HOSPITAL, 8.0, 7.0)
        .edge(SOUTH_HOSPITAL, INDUSTRIAL_PARK, 9.0, 8.5)
        .hospital(CENTRAL_HOSPITAL)
        .hospital(SOUTH_HOSPITAL)
        .build()
}

/// A named charger layout for the study region.
#[derive(Debug, Clone, Serialize)]
pub struct ChargerScenario {
    pub name: String,
    pub specs: Vec<ChargerSiteSpec>,
}

impl ChargerScenario {
    /// Two regular chargers at each base, nothing at the hospitals.
    pub fn regular_bases() -> Self {
        Self {
            name: "regular_bases".to_string(),
            specs: vec![
                base_spec(CENTRAL_BASE, 0, 2),
                base_spec(SOUTH_BASE, 0, 2),
            ],
        }
    }

    /// A fast charger next to a regular one at each base.
    pub fn fast_bases() -> Self {
        Self {
            name: "fast_bases".to_string(),
            specs: vec![
                base_spec(CENTRAL_BASE, 1, 1),
                base_spec(SOUTH_BASE, 1, 1),
            ],
        }
    }

    /// Fast bases plus a fast charger at each hospital.
    pub fn bases_and_hospitals() -> Self {
        let mut scenario = Self::fast_bases();
        scenario.name = "bases_and_hospitals".to_string();
        scenario.specs.push(hospital_spec(CENTRAL_HOSPITAL, 1, 0));
        scenario.specs.push(hospital_spec(SOUTH_HOSPITAL, 1, 0));
        scenario
    }
}

fn base_spec(node: NodeId, fast: usize, regular: usize) -> ChargerSiteSpec {
    ChargerSiteSpec {
        node,
        site: SiteKind::Base,
        fast_count: fast,
        fast_kw: 50.0,
        regular_count: regular,
        regular_kw: 11.0,
    }
}

fn hospital_spec(node: NodeId, fast: usize, regular: usize) -> ChargerSiteSpec {
    ChargerSiteSpec {
        node,
        site: SiteKind::Hospital,
        fast_count: fast,
        fast_kw: 50.0,
        regular_count: regular,
        regular_kw: 11.0,
    }
}

/// One simulation run of the sweep.
#[derive(Debug, Clone, Serialize)]
pub struct ParameterSet {
    pub run_id: usize,
    pub replication: usize,
    pub engine: EngineKind,
    pub num_ambulances: usize,
    pub call_rate_per_min: f64,
    pub process: ArrivalProcess,
    pub charger_scenario: ChargerScenario,
    pub seed: u64,
}

impl ParameterSet {
    /// Scenario parameters for this run, fleet split over the two bases.
    pub fn scenario_params(&self) -> ScenarioParams {
        ScenarioParams::default()
            .with_engine(self.engine)
            .with_fleet(self.num_ambulances, vec![CENTRAL_BASE, SOUTH_BASE])
            .with_call_rate(self.call_rate_per_min)
            .with_process(self.process)
            .with_chargers(self.charger_scenario.specs.clone())
            .with_seed(self.seed)
    }

    pub fn network(&self) -> RoadNetwork {
        region_network()
    }

    /// Short human-readable tag for progress output and file names.
    pub fn label(&self) -> String {
        let engine = match self.engine {
            EngineKind::Diesel => "diesel",
            EngineKind::Electric => "electric",
        };
        format!(
            "{engine}_f{}_{}_r{}",
            self.num_ambulances, self.charger_scenario.name, self.replication
        )
    }
}

/// Grid of parameter variations to explore.
pub struct ParameterSpace {
    engines: Vec<EngineKind>,
    fleet_sizes: Vec<usize>,
    call_rates: Vec<f64>,
    processes: Vec<ArrivalProcess>,
    charger_scenarios: Vec<ChargerScenario>,
    base_seed: u64,
    replications: usize,
}

impl ParameterSpace {
    /// Default grid: both engine types, one mid-size fleet, the default
    /// arrival intensity, the full charger scenario, one replication.
    pub fn grid() -> Self {
        let defaults = ScenarioParams::default();
        Self {
            engines: vec![EngineKind::Diesel, EngineKind::Electric],
            fleet_sizes: vec![4],
            call_rates: vec![defaults.call_rate_per_min],
            processes: vec![defaults.process],
            charger_scenarios: vec![ChargerScenario::bases_and_hospitals()],
            base_seed: defaults.seed,
            replications: 1,
        }
    }

    pub fn engines(mut self, engines: Vec<EngineKind>) -> Self {
        self.engines = engines;
        self
    }

    pub fn fleet_sizes(mut self, fleet_sizes: Vec<usize>) -> Self {
        self.fleet_sizes = fleet_sizes;
        self
    }

    pub fn call_rates(mut self, call_rates: Vec<f64>) -> Self {
        self.call_rates = call_rates;
        self
    }

    pub fn processes(mut self, processes: Vec<ArrivalProcess>) -> Self {
        self.processes = processes;
        self
    }

    pub fn charger_scenarios(mut self, scenarios: Vec<ChargerScenario>) -> Self {
        self.charger_scenarios = scenarios;
        self
    }

    pub fn base_seed(mut self, base_seed: u64) -> Self {
        self.base_seed = base_seed;
        self
    }

    pub fn replications(mut self, replications: usize) -> Self {
        self.replications = replications;
        self
    }

    /// Expand the grid into parameter sets. Diesel fleets never touch a
    /// charger, so they pair with the first charger scenario only instead of
    /// duplicating runs across all of them.
    pub fn generate(&self) -> Vec<ParameterSet> {
        let mut sets = Vec::new();
        for &engine in &self.engines {
            let scenarios: &[ChargerScenario] = match engine {
                EngineKind::Diesel => &self.charger_scenarios[..1],
                EngineKind::Electric => &self.charger_scenarios,
            };
            for &num_ambulances in &self.fleet_sizes {
                for &call_rate_per_min in &self.call_rates {
                    for &process in &self.processes {
                        for scenario in scenarios {
                            for replication in 0..self.replications {
                                let run_id = sets.len();
                                sets.push(ParameterSet {
                                    run_id,
                                    replication,
                                    engine,
                                    num_ambulances,
                                    call_rate_per_min,
                                    process,
                                    charger_scenario: scenario.clone(),
                                    seed: self.base_seed + run_id as u64,
                                });
                            }
                        }
                    }
                }
            }
        }
        sets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_pairs_diesel_with_a_single_charger_scenario() {
        let sets = ParameterSpace::grid()
            .charger_scenarios(vec![
                ChargerScenario::regular_bases(),
                ChargerScenario::fast_bases(),
                ChargerScenario::bases_and_hospitals(),
            ])
            .generate();

        let diesel = sets
            .iter()
            .filter(|s| s.engine == EngineKind::Diesel)
            .count();
        let electric = sets
            .iter()
            .filter(|s| s.engine == EngineKind::Electric)
            .count();
        assert_eq!(diesel, 1);
        assert_eq!(electric, 3);
    }

    #[test]
    fn every_run_gets_a_distinct_consecutive_seed() {
        let sets = ParameterSpace::grid()
            .fleet_sizes(vec![2, 4])
            .replications(3)
            .base_seed(500)
            .generate();

        assert_eq!(sets.len(), 12);
        for (i, set) in sets.iter().enumerate() {
            assert_eq!(set.run_id, i);
            assert_eq!(set.seed, 500 + i as u64);
        }
    }

    #[test]
    fn scenario_params_carry_the_run_configuration() {
        let set = &ParameterSpace::grid()
            .engines(vec![EngineKind::Electric])
            .fleet_sizes(vec![6])
            .generate()[0];
        let params = set.scenario_params();

        assert_eq!(params.engine, EngineKind::Electric);
        assert_eq!(params.num_ambulances, 6);
        assert_eq!(params.seed, set.seed);
        // Fleet alternates over the two bases.
        assert_eq!(params.base_for(0), CENTRAL_BASE);
        assert_eq!(params.base_for(1), SOUTH_BASE);
        assert_eq!(params.base_for(2), CENTRAL_BASE);
    }

    #[test]
    fn region_network_connects_every_node_to_both_hospitals() {
        let network = region_network();
        for node in network.node_ids() {
            for &hospital in &[CENTRAL_HOSPITAL, SOUTH_HOSPITAL] {
                assert!(network.siren_minutes(node, hospital).is_finite());
            }
        }
    }
}
