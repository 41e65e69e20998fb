//! Tiered network topology
//!
//! Nodes, tiers and links live in arenas owned by `Network` and refer to each
//! other by dense ids. The petgraph graph carries only ids: node weights are
//! `NodeId`s and edge weights are `LinkId`s into the link arena, so the
//! congestion state of a link is shared by both traversal directions.

use crate::config::TopologySpec;
use crate::cost::EdgeCost;
use crate::link::Link;
use crate::{LinkId, NodeId, Result, RoutingError, TierId};
use petgraph::algo::astar;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// A node in the tiered network
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub tier: TierId,
    /// `T{tier}_N{index}` where index is the position within the tier
    pub label: String,
}

/// One hierarchical level of the network
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tier {
    pub id: TierId,
    pub nodes: Vec<NodeId>,
}

/// The tiered network graph
#[derive(Debug, Clone)]
pub struct Network {
    name: String,
    graph: UnGraph<NodeId, LinkId>,
    nodes: Vec<Node>,
    tiers: Vec<Tier>,
    links: Vec<Link>,
    link_index: HashMap<(NodeId, NodeId), LinkId>,
}

fn pair_key(a: NodeId, b: NodeId) -> (NodeId, NodeId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl Network {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            graph: UnGraph::default(),
            nodes: Vec::new(),
            tiers: Vec::new(),
            links: Vec::new(),
            link_index: HashMap::new(),
        }
    }

    /// Build a tiered topology from a generation spec
    ///
    /// Node `i` of tier `k` (k ≥ 1) is wired to the tier `k-1` nodes
    /// `(i + c) mod len(tier k-1)` for `c` in `0..connectivity[k-1]`.
    /// Capacity overrides are keyed by `(node in tier k, node in tier k-1)`.
    pub fn generate(spec: &TopologySpec) -> Result<Self> {
        spec.validate()?;

        let overrides: HashMap<(NodeId, NodeId), f64> = spec
            .capacity_overrides
            .iter()
            .map(|o| ((o.from, o.to), o.capacity))
            .collect();
        let mut applied = 0usize;

        let mut network = Network::new(spec.name.clone());
        for &count in &spec.nodes_per_tier {
            let tier = network.add_tier();
            for _ in 0..count {
                network.add_node(tier)?;
            }
        }

        for k in 1..spec.tier_count {
            let upper = network.tiers[k - 1].nodes.clone();
            let lower = network.tiers[k].nodes.clone();
            let default_capacity = spec.default_capacity[k - 1];

            for (i, &node) in lower.iter().enumerate() {
                for c in 0..spec.default_connectivity[k - 1] {
                    let peer = upper[(i + c) % upper.len()];
                    if network.link_between(node, peer).is_some() {
                        debug!(%node, %peer, "connectivity wrapped onto existing link");
                        continue;
                    }
                    let capacity = match overrides.get(&(node, peer)) {
                        Some(&capacity) => {
                            applied += 1;
                            capacity
                        }
                        None => default_capacity,
                    };
                    network.add_link(node, peer, capacity)?;
                }
            }
        }

        if applied < overrides.len() {
            warn!(
                unused = overrides.len() - applied,
                "capacity overrides reference node pairs that were never wired"
            );
        }

        let stats = network.stats();
        info!(
            name = %network.name,
            tiers = stats.tiers,
            nodes = stats.nodes,
            links = stats.links,
            "generated network"
        );
        Ok(network)
    }

    /// Append an empty tier below the existing ones
    pub fn add_tier(&mut self) -> TierId {
        let id = TierId(self.tiers.len());
        self.tiers.push(Tier { id, nodes: Vec::new() });
        id
    }

    pub fn add_node(&mut self, tier: TierId) -> Result<NodeId> {
        let slot = self
            .tiers
            .get_mut(tier.0)
            .ok_or(RoutingError::TierNotFound(tier))?;
        let id = NodeId(self.nodes.len());
        let label = format!("T{}_N{}", tier.0, slot.nodes.len());
        slot.nodes.push(id);

        let idx = self.graph.add_node(id);
        debug_assert_eq!(idx.index(), id.0);
        self.nodes.push(Node { id, tier, label });
        Ok(id)
    }

    /// Add an undirected link; at most one link per node pair
    pub fn add_link(&mut self, a: NodeId, b: NodeId, capacity: f64) -> Result<LinkId> {
        let from = self.index(a).ok_or(RoutingError::NodeNotFound(a))?;
        let to = self.index(b).ok_or(RoutingError::NodeNotFound(b))?;
        if a == b {
            return Err(RoutingError::Config(format!("self-loop on node {a}")));
        }
        if !(capacity.is_finite() && capacity > 0.0) {
            return Err(RoutingError::Config(format!(
                "link {a}-{b} capacity must be positive, got {capacity}"
            )));
        }
        let key = pair_key(a, b);
        if self.link_index.contains_key(&key) {
            return Err(RoutingError::DuplicateLink(a, b));
        }

        let id = LinkId(self.links.len());
        self.graph.add_edge(from, to, id);
        self.links.push(Link::new(id, a, b, capacity));
        self.link_index.insert(key, id);
        Ok(id)
    }

    fn index(&self, id: NodeId) -> Option<NodeIndex> {
        (id.0 < self.nodes.len()).then(|| NodeIndex::new(id.0))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    /// Nodes of the given tiers, in tier order then position order
    pub fn nodes_in_tiers(&self, tiers: &[TierId]) -> Result<Vec<&Node>> {
        let mut out = Vec::new();
        for tier in tiers {
            let slot = self
                .tiers
                .get(tier.0)
                .ok_or(RoutingError::TierNotFound(*tier))?;
            out.extend(slot.nodes.iter().map(|id| &self.nodes[id.0]));
        }
        Ok(out)
    }

    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(id.0)
    }

    pub(crate) fn link_mut(&mut self, id: LinkId) -> &mut Link {
        &mut self.links[id.0]
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn link_between(&self, a: NodeId, b: NodeId) -> Option<&Link> {
        self.link_index
            .get(&pair_key(a, b))
            .map(|id| &self.links[id.0])
    }

    /// Sum of the expected delays along a link sequence
    pub fn path_delay(&self, path: &[LinkId]) -> f64 {
        path.iter().map(|id| self.links[id.0].expected_delay()).sum()
    }

    /// Ordered node walk for a link sequence starting at `source`
    pub fn node_walk(&self, source: NodeId, path: &[LinkId]) -> Vec<NodeId> {
        let mut walk = Vec::with_capacity(path.len() + 1);
        walk.push(source);
        let mut at = source;
        for id in path {
            match self.links[id.0].opposite(at) {
                Some(next) => {
                    walk.push(next);
                    at = next;
                }
                None => break,
            }
        }
        walk
    }

    /// Least-cost link sequence from `source` to `destination`
    ///
    /// `cost_fn(u, v, link)` weighs traversing `link` from `u` to `v` and must
    /// be non-negative. Returns `None` when either node is unknown or the
    /// destination is unreachable; `source == destination` yields an empty
    /// path.
    pub fn shortest_path<F>(&self, source: NodeId, destination: NodeId, mut cost_fn: F) -> Option<Vec<LinkId>>
    where
        F: FnMut(NodeId, NodeId, &Link) -> f64,
    {
        let from = self.index(source)?;
        let to = self.index(destination)?;

        // A* with a zero heuristic is Dijkstra that also returns the path
        let (_, walk) = astar(
            &self.graph,
            from,
            |n| n == to,
            |e| cost_fn(self.graph[e.source()], self.graph[e.target()], &self.links[e.weight().0]),
            |_| 0.0,
        )?;

        walk.windows(2)
            .map(|hop| {
                self.link_index
                    .get(&pair_key(self.graph[hop[0]], self.graph[hop[1]]))
                    .copied()
            })
            .collect()
    }

    /// Shortest path under one of the named cost models
    pub fn route(&self, source: NodeId, destination: NodeId, cost: EdgeCost) -> Option<Vec<LinkId>> {
        self.shortest_path(source, destination, |_, _, link| cost.weigh(link))
    }

    /// Sum of the load carried by every link
    pub fn total_load(&self) -> f64 {
        self.links.iter().map(|l| l.load()).sum()
    }

    pub fn stats(&self) -> NetworkStats {
        NetworkStats {
            tiers: self.tiers.len(),
            nodes: self.nodes.len(),
            links: self.links.len(),
            total_capacity: self.links.iter().map(|l| l.capacity).sum(),
            total_load: self.total_load(),
            saturated_links: self.links.iter().filter(|l| l.is_saturated()).count(),
        }
    }
}

/// Network statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkStats {
    pub tiers: usize,
    pub nodes: usize,
    pub links: usize,
    pub total_capacity: f64,
    pub total_load: f64,
    pub saturated_links: usize,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::CapacityOverride;

    /// Three tiers of [2, 3, 6] nodes, one override on (8, 3)
    pub(crate) fn three_tier_spec() -> TopologySpec {
        TopologySpec {
            name: "NT".to_string(),
            tier_count: 3,
            nodes_per_tier: vec![2, 3, 6],
            default_capacity: vec![200.0, 100.0],
            default_connectivity: vec![2, 2],
            capacity_overrides: vec![CapacityOverride {
                from: NodeId(8),
                to: NodeId(3),
                capacity: 50.0,
            }],
        }
    }

    #[test]
    fn test_generate_counts_and_labels() {
        let network = Network::generate(&three_tier_spec()).unwrap();
        let stats = network.stats();

        assert_eq!(stats.tiers, 3);
        assert_eq!(stats.nodes, 11);
        // 3 nodes x 2 up-links + 6 nodes x 2 up-links
        assert_eq!(stats.links, 18);
        assert_eq!(network.name(), "NT");

        assert_eq!(network.node(NodeId(0)).unwrap().label, "T0_N0");
        assert_eq!(network.node(NodeId(4)).unwrap().label, "T1_N2");
        assert_eq!(network.node(NodeId(10)).unwrap().label, "T2_N5");
        assert_eq!(network.node(NodeId(7)).unwrap().tier, TierId(2));
    }

    #[test]
    fn test_generate_round_robin_wiring() {
        let network = Network::generate(&three_tier_spec()).unwrap();

        // T2_N3 (node 8) -> tier 1 positions 0, 1 (nodes 2, 3)
        assert!(network.link_between(NodeId(8), NodeId(2)).is_some());
        assert!(network.link_between(NodeId(8), NodeId(3)).is_some());
        assert!(network.link_between(NodeId(8), NodeId(4)).is_none());

        // T2_N2 (node 7) -> positions 2, 0 (nodes 4, 2)
        assert!(network.link_between(NodeId(7), NodeId(4)).is_some());
        assert!(network.link_between(NodeId(7), NodeId(2)).is_some());

        // T1_N2 (node 4) -> tier 0 positions 0, 1
        assert_eq!(network.link_between(NodeId(4), NodeId(0)).unwrap().capacity, 200.0);
        assert_eq!(network.link_between(NodeId(1), NodeId(4)).unwrap().capacity, 200.0);
    }

    #[test]
    fn test_generate_applies_override() {
        let network = Network::generate(&three_tier_spec()).unwrap();
        assert_eq!(network.link_between(NodeId(8), NodeId(3)).unwrap().capacity, 50.0);
        assert_eq!(network.link_between(NodeId(8), NodeId(2)).unwrap().capacity, 100.0);
    }

    #[test]
    fn test_generate_rejects_mismatched_lengths() {
        let mut spec = three_tier_spec();
        spec.nodes_per_tier = vec![2, 3];
        assert!(matches!(Network::generate(&spec), Err(RoutingError::Config(_))));

        let mut spec = three_tier_spec();
        spec.default_capacity = vec![200.0];
        assert!(matches!(Network::generate(&spec), Err(RoutingError::Config(_))));

        let mut spec = three_tier_spec();
        spec.default_connectivity = vec![2, 2, 2];
        assert!(matches!(Network::generate(&spec), Err(RoutingError::Config(_))));
    }

    #[test]
    fn test_generate_wraparound_creates_one_link_per_pair() {
        let spec = TopologySpec {
            name: "wrap".to_string(),
            tier_count: 2,
            nodes_per_tier: vec![2, 3],
            default_capacity: vec![10.0],
            default_connectivity: vec![3],
            capacity_overrides: Vec::new(),
        };
        let network = Network::generate(&spec).unwrap();
        // every lower node reaches both upper nodes exactly once
        assert_eq!(network.links().len(), 6);
    }

    #[test]
    fn test_nodes_in_tiers() {
        let network = Network::generate(&three_tier_spec()).unwrap();
        let ids: Vec<NodeId> = network
            .nodes_in_tiers(&[TierId(0), TierId(1)])
            .unwrap()
            .iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(ids, (0..5).map(NodeId).collect::<Vec<_>>());

        assert!(matches!(
            network.nodes_in_tiers(&[TierId(9)]),
            Err(RoutingError::TierNotFound(TierId(9)))
        ));
    }

    #[test]
    fn test_add_link_validation() {
        let mut network = Network::new("manual");
        let tier = network.add_tier();
        let a = network.add_node(tier).unwrap();
        let b = network.add_node(tier).unwrap();

        network.add_link(a, b, 10.0).unwrap();
        assert!(matches!(network.add_link(b, a, 10.0), Err(RoutingError::DuplicateLink(..))));
        assert!(matches!(network.add_link(a, a, 10.0), Err(RoutingError::Config(_))));
        assert!(matches!(network.add_link(a, NodeId(5), 10.0), Err(RoutingError::NodeNotFound(_))));
        assert!(matches!(network.add_node(TierId(3)), Err(RoutingError::TierNotFound(_))));

        let c = network.add_node(tier).unwrap();
        assert!(matches!(network.add_link(a, c, 0.0), Err(RoutingError::Config(_))));
        assert!(matches!(network.add_link(a, c, f64::NAN), Err(RoutingError::Config(_))));
    }

    #[test]
    fn test_shortest_path_inverse_capacity() {
        let network = Network::generate(&three_tier_spec()).unwrap();
        let path = network.route(NodeId(5), NodeId(6), EdgeCost::InverseCapacity).unwrap();

        // T2_N0 and T2_N1 share parent T1_N1
        assert_eq!(network.node_walk(NodeId(5), &path), vec![NodeId(5), NodeId(3), NodeId(6)]);
    }

    #[test]
    fn test_shortest_path_avoids_override() {
        let network = Network::generate(&three_tier_spec()).unwrap();
        // Direct 8-3 (capacity 50) ties with 8 -> 2 -> {0,1} -> 3 at 0.02
        let path = network.route(NodeId(8), NodeId(3), EdgeCost::InverseCapacity).unwrap();
        let cost: f64 = path.iter().map(|id| 1.0 / network.link(*id).unwrap().capacity).sum();
        assert!(cost <= 1.0 / 50.0 + 1e-12);
        assert_eq!(*network.node_walk(NodeId(8), &path).last().unwrap(), NodeId(3));
    }

    #[test]
    fn test_shortest_path_edge_cases() {
        let mut network = Network::new("islands");
        let tier = network.add_tier();
        let a = network.add_node(tier).unwrap();
        let b = network.add_node(tier).unwrap();
        let c = network.add_node(tier).unwrap();
        network.add_link(a, b, 10.0).unwrap();

        assert_eq!(network.route(a, a, EdgeCost::InverseCapacity), Some(Vec::new()));
        assert_eq!(network.route(a, c, EdgeCost::InverseCapacity), None);
        assert_eq!(network.route(a, NodeId(42), EdgeCost::InverseCapacity), None);
    }

    #[test]
    fn test_custom_cost_function() {
        let mut network = Network::new("diamond");
        let tier = network.add_tier();
        let nodes: Vec<NodeId> = (0..4).map(|_| network.add_node(tier).unwrap()).collect();
        let top = network.add_link(nodes[0], nodes[1], 100.0).unwrap();
        network.add_link(nodes[1], nodes[3], 100.0).unwrap();
        network.add_link(nodes[0], nodes[2], 10.0).unwrap();
        network.add_link(nodes[2], nodes[3], 10.0).unwrap();

        // Penalize the top branch explicitly
        let path = network
            .shortest_path(nodes[0], nodes[3], |_, _, link| if link.id == top { 100.0 } else { 1.0 })
            .unwrap();
        assert_eq!(network.node_walk(nodes[0], &path), vec![nodes[0], nodes[2], nodes[3]]);
    }
}
