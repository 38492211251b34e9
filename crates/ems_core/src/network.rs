use std::collections::HashMap;

use bevy_ecs::prelude::Resource;
use pathfinding::prelude::dijkstra_all;

/// Location-node identifier (postal-code style label, not a dense index).
pub type NodeId = u32;

#[derive(Debug, Clone, Copy)]
struct NodeInfo {
    id: NodeId,
    x: f64,
    y: f64,
    /// Cumulative population share in node order; used for arrival sampling.
    cumulative_share: f64,
}

/// The road network as consumed by the simulation: coordinates per node,
/// a siren travel-time matrix (minutes), a distance matrix (km), and the
/// hospital set. Matrices are row-major over node order.
///
/// Siren-off legs (returning to base) are slower: their time is the siren
/// time divided by `no_siren_penalty` (< 1). Distances do not depend on the
/// siren.
#[derive(Resource, Debug, Clone)]
pub struct RoadNetwork {
    nodes: Vec<NodeInfo>,
    index: HashMap<NodeId, usize>,
    siren_minutes: Vec<f64>,
    distance_km: Vec<f64>,
    hospitals: Vec<NodeId>,
    no_siren_penalty: f64,
}

impl RoadNetwork {
    /// Assemble a network from explicit matrices.
    ///
    /// `nodes` is `(id, x, y, inhabitant_weight)`; weights are normalized
    /// into cumulative shares. Matrices are indexed in `nodes` order.
    pub fn from_matrices(
        nodes: Vec<(NodeId, f64, f64, f64)>,
        siren_minutes: Vec<f64>,
        distance_km: Vec<f64>,
        hospitals: Vec<NodeId>,
        no_siren_penalty: f64,
    ) -> Self {
        let n = nodes.len();
        assert_eq!(siren_minutes.len(), n * n, "travel-time matrix shape");
        assert_eq!(distance_km.len(), n * n, "distance matrix shape");

        let total_weight: f64 = nodes.iter().map(|(_, _, _, w)| *w).sum();
        let mut cumulative = 0.0;
        let infos = nodes
            .iter()
            .map(|&(id, x, y, w)| {
                cumulative += w / total_weight;
                NodeInfo {
                    id,
                    x,
                    y,
                    cumulative_share: cumulative,
                }
            })
            .collect::<Vec<_>>();
        let index = infos
            .iter()
            .enumerate()
            .map(|(i, info)| (info.id, i))
            .collect();

        Self {
            nodes: infos,
            index,
            siren_minutes,
            distance_km,
            hospitals,
            no_siren_penalty,
        }
    }

    fn idx(&self, node: NodeId) -> usize {
        self.index[&node]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().map(|n| n.id)
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.index.contains_key(&node)
    }

    pub fn hospitals(&self) -> &[NodeId] {
        &self.hospitals
    }

    pub fn is_hospital(&self, node: NodeId) -> bool {
        self.hospitals.contains(&node)
    }

    pub fn coords(&self, node: NodeId) -> (f64, f64) {
        let info = &self.nodes[self.idx(node)];
        (info.x, info.y)
    }

    /// Siren-on driving minutes between two nodes.
    pub fn siren_minutes(&self, from: NodeId, to: NodeId) -> f64 {
        self.siren_minutes[self.idx(from) * self.nodes.len() + self.idx(to)]
    }

    /// Siren-off driving minutes between two nodes.
    pub fn quiet_minutes(&self, from: NodeId, to: NodeId) -> f64 {
        self.siren_minutes(from, to) / self.no_siren_penalty
    }

    pub fn distance_km(&self, from: NodeId, to: NodeId) -> f64 {
        self.distance_km[self.idx(from) * self.nodes.len() + self.idx(to)]
    }

    /// Point reached after driving `fraction` of the leg, linearly between
    /// the endpoint coordinates.
    pub fn position_along(&self, from: NodeId, to: NodeId, fraction: f64) -> (f64, f64) {
        let (sx, sy) = self.coords(from);
        let (tx, ty) = self.coords(to);
        (
            (1.0 - fraction) * sx + fraction * tx,
            (1.0 - fraction) * sy + fraction * ty,
        )
    }

    /// Euclidean-nearest node to a free coordinate; first node wins ties.
    pub fn closest_node(&self, x: f64, y: f64) -> NodeId {
        let mut best = self.nodes[0].id;
        let mut best_d2 = f64::INFINITY;
        for info in &self.nodes {
            let d2 = (info.x - x).powi(2) + (info.y - y).powi(2);
            if d2 < best_d2 {
                best_d2 = d2;
                best = info.id;
            }
        }
        best
    }

    /// Hospital with minimal siren time from `from`; first listed wins ties.
    pub fn nearest_hospital(&self, from: NodeId) -> NodeId {
        let mut best = self.hospitals[0];
        let mut best_minutes = f64::INFINITY;
        for &hospital in &self.hospitals {
            let minutes = self.siren_minutes(from, hospital);
            if minutes < best_minutes {
                best_minutes = minutes;
                best = hospital;
            }
        }
        best
    }

    /// Map a uniform draw to an arrival node via cumulative inhabitant
    /// shares: the first node whose cumulative share exceeds the draw.
    pub fn sample_location(&self, uniform: f64) -> NodeId {
        for info in &self.nodes {
            if info.cumulative_share > uniform {
                return info.id;
            }
        }
        // Cumulative shares end at 1.0; reachable only for uniform >= 1.0.
        self.nodes[self.nodes.len() - 1].id
    }
}

/// Builds a [`RoadNetwork`] from an undirected edge list, deriving both
/// matrices from time-optimal Dijkstra paths. Synthetic scenarios and test
/// fixtures use this; production inputs arrive as ready matrices.
#[derive(Debug, Default)]
pub struct NetworkBuilder {
    nodes: Vec<(NodeId, f64, f64, f64)>,
    edges: HashMap<NodeId, Vec<(NodeId, f64, f64)>>,
    hospitals: Vec<NodeId>,
    no_siren_penalty: f64,
}

impl NetworkBuilder {
    pub fn new(no_siren_penalty: f64) -> Self {
        Self {
            no_siren_penalty,
            ..Self::default()
        }
    }

    pub fn node(mut self, id: NodeId, x: f64, y: f64, inhabitant_weight: f64) -> Self {
        self.nodes.push((id, x, y, inhabitant_weight));
        self
    }

    /// Undirected road segment: siren minutes one way, km one way.
    pub fn edge(mut self, a: NodeId, b: NodeId, siren_minutes: f64, km: f64) -> Self {
        self.edges.entry(a).or_default().push((b, siren_minutes, km));
        self.edges.entry(b).or_default().push((a, siren_minutes, km));
        self
    }

    pub fn hospital(mut self, id: NodeId) -> Self {
        self.hospitals.push(id);
        self
    }

    pub fn build(self) -> RoadNetwork {
        // Dijkstra needs Ord edge costs; micro-minute integers keep the
        // fixture matrices exact for edge weights with <= 6 decimals.
        const SCALE: f64 = 1e6;
        let n = self.nodes.len();
        let order: HashMap<NodeId, usize> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, (id, ..))| (*id, i))
            .collect();

        let mut siren_minutes = vec![0.0; n * n];
        let mut distance_km = vec![0.0; n * n];

        for (source, ..) in &self.nodes {
            let reached = dijkstra_all(source, |node: &NodeId| {
                self.edges
                    .get(node)
                    .into_iter()
                    .flatten()
                    .map(|(next, minutes, _)| (*next, (minutes * SCALE) as u64))
                    .collect::<Vec<_>>()
            });
            let row = order[source] * n;
            for (target, (_, cost)) in &reached {
                siren_minutes[row + order[target]] = *cost as f64 / SCALE;
                distance_km[row + order[target]] = self.km_along(&reached, *source, *target);
            }
        }

        RoadNetwork::from_matrices(
            self.nodes.clone(),
            siren_minutes,
            distance_km,
            self.hospitals.clone(),
            self.no_siren_penalty,
        )
    }

    fn km_along(
        &self,
        reached: &HashMap<NodeId, (NodeId, u64)>,
        source: NodeId,
        target: NodeId,
    ) -> f64 {
        let mut km = 0.0;
        let mut node = target;
        while node != source {
            let (parent, _) = reached[&node];
            km += self
                .edges
                .get(&parent)
                .into_iter()
                .flatten()
                .find(|(next, ..)| *next == node)
                .map(|(_, _, step_km)| *step_km)
                .unwrap_or(0.0);
            node = parent;
        }
        km
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_network() -> RoadNetwork {
        // 10 --- 20 --- 30, hospital at 30.
        NetworkBuilder::new(0.95)
            .node(10, 0.0, 0.0, 1.0)
            .node(20, 1.0, 0.0, 2.0)
            .node(30, 2.0, 0.0, 1.0)
            .edge(10, 20, 4.0, 3.0)
            .edge(20, 30, 6.0, 5.0)
            .hospital(30)
            .build()
    }

    #[test]
    fn dijkstra_fills_multi_hop_entries() {
        let net = line_network();
        assert_eq!(net.siren_minutes(10, 30), 10.0);
        assert_eq!(net.distance_km(10, 30), 8.0);
        assert_eq!(net.siren_minutes(30, 10), 10.0);
        assert_eq!(net.siren_minutes(20, 20), 0.0);
    }

    #[test]
    fn quiet_minutes_apply_the_penalty() {
        let net = line_network();
        assert!((net.quiet_minutes(10, 20) - 4.0 / 0.95).abs() < 1e-12);
    }

    #[test]
    fn interpolation_and_snap() {
        let net = line_network();
        let (x, y) = net.position_along(10, 30, 0.25);
        assert!((x - 0.5).abs() < 1e-12);
        assert_eq!(y, 0.0);
        assert_eq!(net.closest_node(x, y), 10);
        assert_eq!(net.closest_node(1.4, 0.1), 20);
    }

    #[test]
    fn nearest_hospital_prefers_first_on_ties() {
        let net = NetworkBuilder::new(0.95)
            .node(1, 0.0, 0.0, 1.0)
            .node(2, 1.0, 0.0, 1.0)
            .node(3, 2.0, 0.0, 1.0)
            .edge(1, 2, 5.0, 4.0)
            .edge(1, 3, 5.0, 4.0)
            .hospital(2)
            .hospital(3)
            .build();
        assert_eq!(net.nearest_hospital(1), 2);
    }

    #[test]
    fn location_sampling_walks_cumulative_shares() {
        let net = line_network();
        // Shares: 0.25, 0.75, 1.0 cumulative.
        assert_eq!(net.sample_location(0.0), 10);
        assert_eq!(net.sample_location(0.25), 20);
        assert_eq!(net.sample_location(0.74), 20);
        assert_eq!(net.sample_location(0.75), 30);
        assert_eq!(net.sample_location(0.999), 30);
    }
}
