//! Charging infrastructure: per-site fast and regular charger pools.
//!
//! Hospitals and base stations each carry up to two pools. Pool selection
//! prefers a fast charger, falls back to a free regular one, and queues at
//! the fast pool when everything is taken.

use std::collections::HashMap;

use bevy_ecs::prelude::Resource;
use serde::Serialize;

use crate::error::SimulationError;
use crate::locks::ChargerQueue;
use crate::network::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SiteKind {
    Hospital,
    Base,
}

/// One row of the charger scenario table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChargerSiteSpec {
    pub node: NodeId,
    pub site: SiteKind,
    pub fast_count: usize,
    pub fast_kw: f64,
    pub regular_count: usize,
    pub regular_kw: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolChoice {
    Fast,
    Regular,
}

#[derive(Debug)]
pub struct ChargerPool {
    pub slots: ChargerQueue,
    pub speed_kw: f64,
}

impl ChargerPool {
    fn new(count: usize, speed_kw: f64) -> Self {
        Self {
            slots: ChargerQueue::new(count),
            speed_kw,
        }
    }
}

/// Chargers at one site. Either pool may be absent.
#[derive(Debug, Default)]
pub struct ChargingSite {
    fast: Option<ChargerPool>,
    regular: Option<ChargerPool>,
}

impl ChargingSite {
    /// Pick a pool for a new session. With both pools present the fast one
    /// wins if it has a free slot, then the regular one; when both are full
    /// the session queues at the fast pool and the shortage is counted.
    pub fn choose(
        &self,
        node: NodeId,
        no_free_charger: &mut u64,
    ) -> Result<PoolChoice, SimulationError> {
        match (&self.fast, &self.regular) {
            (None, Some(_)) => Ok(PoolChoice::Regular),
            (Some(_), None) => Ok(PoolChoice::Fast),
            (Some(fast), Some(regular)) => {
                if fast.slots.has_free_slot() {
                    Ok(PoolChoice::Fast)
                } else if regular.slots.has_free_slot() {
                    Ok(PoolChoice::Regular)
                } else {
                    *no_free_charger += 1;
                    Ok(PoolChoice::Fast)
                }
            }
            (None, None) => Err(SimulationError::NoChargerConfigured { node }),
        }
    }

    pub fn pool(&self, choice: PoolChoice) -> Option<&ChargerPool> {
        match choice {
            PoolChoice::Fast => self.fast.as_ref(),
            PoolChoice::Regular => self.regular.as_ref(),
        }
    }

    pub fn pool_mut(&mut self, choice: PoolChoice) -> Option<&mut ChargerPool> {
        match choice {
            PoolChoice::Fast => self.fast.as_mut(),
            PoolChoice::Regular => self.regular.as_mut(),
        }
    }

    fn has_any_pool(&self) -> bool {
        self.fast.is_some() || self.regular.is_some()
    }
}

/// All charging sites of the scenario, keyed by node and site type.
///
/// A hospital row with zero chargers of both types is not entered at all,
/// which is what reachability checks rely on: "hospital has chargers" means
/// the hospital key exists. Base rows are always entered, even empty ones.
#[derive(Debug, Resource, Default)]
pub struct ChargingStationRegistry {
    sites: HashMap<(NodeId, SiteKind), ChargingSite>,
}

impl ChargingStationRegistry {
    pub fn from_specs(specs: &[ChargerSiteSpec]) -> Self {
        let mut sites = HashMap::new();
        for spec in specs {
            if spec.site == SiteKind::Hospital && spec.fast_count == 0 && spec.regular_count == 0 {
                continue;
            }
            let site = ChargingSite {
                fast: (spec.fast_count > 0)
                    .then(|| ChargerPool::new(spec.fast_count, spec.fast_kw)),
                regular: (spec.regular_count > 0)
                    .then(|| ChargerPool::new(spec.regular_count, spec.regular_kw)),
            };
            sites.insert((spec.node, spec.site), site);
        }
        Self { sites }
    }

    pub fn site(&self, node: NodeId, kind: SiteKind) -> Option<&ChargingSite> {
        self.sites.get(&(node, kind))
    }

    pub fn site_mut(&mut self, node: NodeId, kind: SiteKind) -> Option<&mut ChargingSite> {
        self.sites.get_mut(&(node, kind))
    }

    /// Whether the hospital can charge ambulances at all.
    pub fn hospital_has_chargers(&self, node: NodeId) -> bool {
        self.sites
            .get(&(node, SiteKind::Hospital))
            .is_some_and(|site| site.has_any_pool())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy_ecs::prelude::World;

    fn spec(site: SiteKind, fast: usize, regular: usize) -> ChargerSiteSpec {
        ChargerSiteSpec {
            node: 5,
            site,
            fast_count: fast,
            fast_kw: 50.0,
            regular_count: regular,
            regular_kw: 11.0,
        }
    }

    #[test]
    fn empty_hospital_rows_are_not_registered() {
        let registry = ChargingStationRegistry::from_specs(&[spec(SiteKind::Hospital, 0, 0)]);
        assert!(!registry.hospital_has_chargers(5));
        assert!(registry.site(5, SiteKind::Hospital).is_none());
    }

    #[test]
    fn empty_base_rows_are_registered_but_unusable() {
        let registry = ChargingStationRegistry::from_specs(&[spec(SiteKind::Base, 0, 0)]);
        let site = registry.site(5, SiteKind::Base).unwrap();
        let mut counter = 0;
        assert_eq!(
            site.choose(5, &mut counter),
            Err(SimulationError::NoChargerConfigured { node: 5 })
        );
    }

    #[test]
    fn single_pool_sites_have_no_choice() {
        let registry = ChargingStationRegistry::from_specs(&[spec(SiteKind::Base, 0, 2)]);
        let site = registry.site(5, SiteKind::Base).unwrap();
        let mut counter = 0;
        assert_eq!(site.choose(5, &mut counter), Ok(PoolChoice::Regular));
        assert_eq!(counter, 0);
    }

    #[test]
    fn full_pools_queue_at_the_fast_one_and_count_the_shortage() {
        let mut world = World::new();
        let a = world.spawn_empty().id();
        let b = world.spawn_empty().id();
        let c = world.spawn_empty().id();

        let mut registry = ChargingStationRegistry::from_specs(&[spec(SiteKind::Hospital, 1, 1)]);
        let site = registry.site_mut(5, SiteKind::Hospital).unwrap();
        let mut counter = 0;

        assert_eq!(site.choose(5, &mut counter), Ok(PoolChoice::Fast));
        site.pool_mut(PoolChoice::Fast).unwrap().slots.request(a, 0.0);

        assert_eq!(site.choose(5, &mut counter), Ok(PoolChoice::Regular));
        site.pool_mut(PoolChoice::Regular)
            .unwrap()
            .slots
            .request(b, 0.0);

        assert_eq!(site.choose(5, &mut counter), Ok(PoolChoice::Fast));
        assert_eq!(counter, 1);
        site.pool_mut(PoolChoice::Fast).unwrap().slots.request(c, 1.0);
        assert_eq!(site.pool(PoolChoice::Fast).unwrap().slots.queue_len(), 1);
    }
}
