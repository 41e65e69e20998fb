//! Routing solution
//!
//! A `Solution` owns the network, the flow registry and the global delay
//! bound. Construction places every flow on its inverse-capacity shortest
//! path; `make_feasible` (see `restore`) and `minimize_average_delay` (see
//! `optimize`) then move flows around through `reroute`.

use crate::cost::EdgeCost;
use crate::flow::{Flow, FlowRegistry, FlowSpec};
use crate::network::Network;
use crate::report::{FlowReport, LinkReport, RoutingPlan};
use crate::{FlowId, LinkId, Result, RoutingError};
use chrono::Utc;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct Solution {
    pub(crate) network: Network,
    pub(crate) flows: FlowRegistry,
    max_delay: f64,
    priority_scale: f64,
    pub(crate) best_paths: Vec<Vec<LinkId>>,
    pub(crate) best_avg_delay: f64,
}

impl Solution {
    /// Register `flows` on `network` and give each its initial path
    ///
    /// Priorities are rescaled to `1 + (p - 1) * priority_scale`. Fails if a
    /// flow has an unknown endpoint, no path, or a non-positive size or
    /// priority, or if `max_delay` is not positive.
    pub fn new(network: Network, flows: Vec<FlowSpec>, max_delay: f64, priority_scale: f64) -> Result<Self> {
        if !(max_delay.is_finite() && max_delay > 0.0) {
            return Err(RoutingError::Config(format!("max_delay must be positive, got {max_delay}")));
        }
        if !priority_scale.is_finite() {
            return Err(RoutingError::Config(format!(
                "priority_scale must be finite, got {priority_scale}"
            )));
        }

        let mut solution = Self {
            network,
            flows: FlowRegistry::new(),
            max_delay,
            priority_scale,
            best_paths: Vec::new(),
            best_avg_delay: 0.0,
        };

        for (i, spec) in flows.iter().enumerate() {
            if !(spec.size.is_finite() && spec.size > 0.0) {
                return Err(RoutingError::InvalidFlow(i, format!("size must be positive, got {}", spec.size)));
            }
            if !(spec.priority.is_finite() && spec.priority > 0.0) {
                return Err(RoutingError::InvalidFlow(
                    i,
                    format!("priority must be positive, got {}", spec.priority),
                ));
            }
            let priority = 1.0 + (spec.priority - 1.0) * priority_scale;
            if priority <= 0.0 {
                return Err(RoutingError::InvalidFlow(
                    i,
                    format!("priority {} rescales to non-positive {priority}", spec.priority),
                ));
            }
            for endpoint in [spec.source, spec.destination] {
                if !solution.network.contains(endpoint) {
                    return Err(RoutingError::NodeNotFound(endpoint));
                }
            }

            let path = solution
                .network
                .route(spec.source, spec.destination, EdgeCost::InverseCapacity)
                .ok_or(RoutingError::NoPath(spec.source, spec.destination))?;
            let id = solution.flows.register(spec, priority);
            solution.flows.reassign(&mut solution.network, id, path);
        }

        solution.best_paths = solution.flows.snapshot();
        solution.best_avg_delay = solution.average_delay();
        info!(
            flows = solution.flows.len(),
            max_delay,
            average_delay = solution.best_avg_delay,
            feasible = solution.is_feasible(),
            "initial placement complete"
        );
        Ok(solution)
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn flows(&self) -> &FlowRegistry {
        &self.flows
    }

    pub fn flow(&self, id: FlowId) -> Option<&Flow> {
        self.flows.get(id)
    }

    pub fn max_delay(&self) -> f64 {
        self.max_delay
    }

    pub fn priority_scale(&self) -> f64 {
        self.priority_scale
    }

    /// Best average delay recorded by the optimizer (initial placement until then)
    pub fn best_avg_delay(&self) -> f64 {
        self.best_avg_delay
    }

    pub fn best_paths(&self) -> &[Vec<LinkId>] {
        &self.best_paths
    }

    /// End-to-end delay of a flow on its current path
    pub fn flow_delay(&self, id: FlowId) -> f64 {
        self.flows
            .get(id)
            .map(|f| self.network.path_delay(f.path()))
            .unwrap_or(0.0)
    }

    pub fn is_flow_feasible(&self, id: FlowId) -> bool {
        self.flow_delay(id) <= self.max_delay
    }

    pub fn is_feasible(&self) -> bool {
        self.flows.ids().all(|id| self.is_flow_feasible(id))
    }

    pub fn infeasible_flows(&self) -> Vec<FlowId> {
        self.flows.ids().filter(|id| !self.is_flow_feasible(*id)).collect()
    }

    /// Priority-weighted network average delay
    ///
    /// ```text
    /// D = Σ_links (λ · d(λ) · p̄) / Σ_flows size
    /// ```
    pub fn average_delay(&self) -> f64 {
        let total = self.flows.total_size();
        if total <= 0.0 {
            return 0.0;
        }
        let weighted: f64 = self
            .network
            .links()
            .iter()
            .map(|l| l.load() * l.expected_delay() * l.avg_priority())
            .sum();
        weighted / total
    }

    /// Re-route one flow along the cheapest path under `cost`
    ///
    /// Returns true if the flow's path changed. A flow whose endpoints have
    /// become unreachable keeps its current path.
    pub(crate) fn reroute(&mut self, id: FlowId, cost: EdgeCost) -> bool {
        let Some(flow) = self.flows.get(id) else {
            return false;
        };
        let Some(path) = self.network.route(flow.source, flow.destination, cost) else {
            debug!(flow = %id, "no path under {:?}, keeping current route", cost);
            return false;
        };
        if path == flow.path() {
            return false;
        }
        debug!(flow = %id, hops = path.len(), "rerouted under {:?}", cost);
        self.flows.reassign(&mut self.network, id, path);
        true
    }

    /// Report for one flow: endpoints, node path and delay
    pub fn describe_flow(&self, id: FlowId) -> Option<FlowReport> {
        let flow = self.flows.get(id)?;
        let nodes = self.network.node_walk(flow.source, flow.path());
        let labels = nodes
            .iter()
            .filter_map(|n| self.network.node(*n))
            .map(|n| n.label.clone())
            .collect();
        let delay = self.flow_delay(id);
        Some(FlowReport {
            id,
            source: flow.source,
            destination: flow.destination,
            size: flow.size,
            priority: flow.priority,
            nodes,
            labels,
            delay,
            feasible: delay <= self.max_delay,
        })
    }

    /// Serializable snapshot of the current assignment
    pub fn plan(&self) -> RoutingPlan {
        RoutingPlan {
            network: self.network.name().to_string(),
            max_delay: self.max_delay,
            feasible: self.is_feasible(),
            average_delay: self.average_delay(),
            flows: self.flows.ids().filter_map(|id| self.describe_flow(id)).collect(),
            links: self
                .network
                .links()
                .iter()
                .filter(|l| !l.members().is_empty())
                .map(LinkReport::from)
                .collect(),
            stats: self.network.stats(),
            computed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::network::tests::three_tier_spec;
    use crate::NodeId;

    /// Recompute every link aggregate from the registry and compare
    pub(crate) fn assert_consistent(solution: &Solution) {
        for link in solution.network().links() {
            let riders: Vec<&Flow> = solution.flows().iter().filter(|f| f.uses(link.id)).collect();
            let members: Vec<FlowId> = riders.iter().map(|f| f.id).collect();
            assert_eq!(link.members().iter().copied().collect::<Vec<_>>(), members);

            let load: f64 = riders.iter().map(|f| f.size).sum();
            assert!((link.load() - load).abs() < 1e-6, "load drift on {}", link.id);

            let avg = if load > 0.0 {
                riders.iter().map(|f| f.priority * f.size).sum::<f64>() / load
            } else {
                0.0
            };
            assert!((link.avg_priority() - avg).abs() < 1e-6, "priority drift on {}", link.id);
        }
    }

    /// Nodes 0..4: top branch 0-1-3 (capacity 100), bottom branch 0-2-3
    pub(crate) fn two_branch(bottom_capacity: f64) -> Network {
        let mut network = Network::new("two-branch");
        let tier = network.add_tier();
        for _ in 0..4 {
            network.add_node(tier).unwrap();
        }
        network.add_link(NodeId(0), NodeId(1), 100.0).unwrap();
        network.add_link(NodeId(1), NodeId(3), 100.0).unwrap();
        network.add_link(NodeId(0), NodeId(2), bottom_capacity).unwrap();
        network.add_link(NodeId(2), NodeId(3), bottom_capacity).unwrap();
        network
    }

    #[test]
    fn test_initial_path_and_delay() {
        let network = Network::generate(&three_tier_spec()).unwrap();
        let solution = Solution::new(network, vec![FlowSpec::new(NodeId(5), NodeId(6), 10.0)], 1.0, 1.0).unwrap();

        let flow = solution.flow(FlowId(0)).unwrap();
        assert_eq!(
            solution.network().node_walk(flow.source, flow.path()),
            vec![NodeId(5), NodeId(3), NodeId(6)]
        );

        // Each traversed link carries exactly the flow's 10 units
        let expected: f64 = flow
            .path()
            .iter()
            .map(|id| 1.0 / (solution.network().link(*id).unwrap().capacity - 10.0))
            .sum();
        assert!((solution.flow_delay(FlowId(0)) - expected).abs() < 1e-12);
        assert!((expected - 2.0 / 90.0).abs() < 1e-12);
        assert!(solution.is_feasible());
        assert_consistent(&solution);
    }

    #[test]
    fn test_two_flows_on_one_link() {
        let mut network = Network::new("single");
        let tier = network.add_tier();
        let a = network.add_node(tier).unwrap();
        let b = network.add_node(tier).unwrap();
        network.add_link(a, b, 100.0).unwrap();

        let flows = vec![
            FlowSpec::new(a, b, 30.0).with_priority(3.0),
            FlowSpec::new(b, a, 20.0).with_priority(1.5),
        ];
        let solution = Solution::new(network, flows, 1.0, 1.0).unwrap();

        let link = &solution.network().links()[0];
        assert!((link.load() - 50.0).abs() < 1e-12);
        assert!((link.avg_priority() - (3.0 * 30.0 + 1.5 * 20.0) / 50.0).abs() < 1e-12);

        // 50 * (1/50) * 2.4 over 50 units of demand
        assert!((solution.average_delay() - 2.4 / 50.0).abs() < 1e-12);
    }

    #[test]
    fn test_priority_rescaling() {
        let network = two_branch(50.0);
        let flows = vec![
            FlowSpec::new(NodeId(0), NodeId(3), 10.0).with_priority(3.0),
            FlowSpec::new(NodeId(0), NodeId(3), 10.0),
        ];
        let solution = Solution::new(network, flows, 1.0, 0.5).unwrap();
        assert!((solution.flow(FlowId(0)).unwrap().priority - 2.0).abs() < 1e-12);
        assert!((solution.flow(FlowId(1)).unwrap().priority - 1.0).abs() < 1e-12);

        let flattened = Solution::new(
            two_branch(50.0),
            vec![FlowSpec::new(NodeId(0), NodeId(3), 10.0).with_priority(7.0)],
            1.0,
            0.0,
        )
        .unwrap();
        assert_eq!(flattened.flow(FlowId(0)).unwrap().priority, 1.0);
    }

    #[test]
    fn test_construction_errors() {
        let spec = |s, d, size| vec![FlowSpec::new(NodeId(s), NodeId(d), size)];

        assert!(matches!(
            Solution::new(two_branch(50.0), spec(0, 9, 1.0), 1.0, 1.0),
            Err(RoutingError::NodeNotFound(NodeId(9)))
        ));
        assert!(matches!(
            Solution::new(two_branch(50.0), spec(0, 3, 0.0), 1.0, 1.0),
            Err(RoutingError::InvalidFlow(0, _))
        ));
        assert!(matches!(
            Solution::new(two_branch(50.0), spec(0, 3, 1.0), 0.0, 1.0),
            Err(RoutingError::Config(_))
        ));
        assert!(matches!(
            Solution::new(
                two_branch(50.0),
                vec![FlowSpec::new(NodeId(0), NodeId(3), 1.0).with_priority(0.2)],
                1.0,
                2.0
            ),
            Err(RoutingError::InvalidFlow(0, _))
        ));

        let mut islands = Network::new("islands");
        let tier = islands.add_tier();
        islands.add_node(tier).unwrap();
        islands.add_node(tier).unwrap();
        assert!(matches!(
            Solution::new(islands, spec(0, 1, 1.0), 1.0, 1.0),
            Err(RoutingError::NoPath(NodeId(0), NodeId(1)))
        ));
    }

    #[test]
    fn test_saturated_flow_is_infeasible_not_an_error() {
        let flows = vec![FlowSpec::new(NodeId(0), NodeId(3), 120.0)];
        let solution = Solution::new(two_branch(50.0), flows, 1.0, 1.0).unwrap();
        assert!(!solution.is_feasible());
        assert_eq!(solution.infeasible_flows(), vec![FlowId(0)]);
        assert!(solution.flow_delay(FlowId(0)) >= crate::INFEASIBLE_DELAY);
    }

    #[test]
    fn test_describe_flow_and_plan() {
        let network = Network::generate(&three_tier_spec()).unwrap();
        let solution = Solution::new(network, vec![FlowSpec::new(NodeId(5), NodeId(6), 10.0)], 1.0, 1.0).unwrap();

        let report = solution.describe_flow(FlowId(0)).unwrap();
        assert_eq!(report.labels, vec!["T2_N0", "T1_N1", "T2_N1"]);
        let text = report.to_string();
        assert!(text.contains("5 -> 6"));
        assert!(text.contains("5 -> 3 -> 6"));
        assert!(text.contains("0.022222"));

        let plan = solution.plan();
        assert_eq!(plan.network, "NT");
        assert!(plan.feasible);
        assert_eq!(plan.flows.len(), 1);
        assert_eq!(plan.links.len(), 2);
        assert!(solution.describe_flow(FlowId(3)).is_none());
    }

    #[test]
    fn test_reroute_reports_change() {
        let flows = vec![
            FlowSpec::new(NodeId(0), NodeId(3), 10.0),
            FlowSpec::new(NodeId(0), NodeId(3), 70.0),
        ];
        let mut solution = Solution::new(two_branch(50.0), flows, 1.0, 1.0).unwrap();

        assert!(!solution.reroute(FlowId(0), EdgeCost::InverseCapacity));
        // Top branch at load 80: 100 / 20² per link against 50 / 50² below
        assert!(solution.reroute(FlowId(0), EdgeCost::DelayDerivative));
        let flow = solution.flow(FlowId(0)).unwrap();
        assert_eq!(
            solution.network().node_walk(flow.source, flow.path()),
            vec![NodeId(0), NodeId(2), NodeId(3)]
        );
        assert!(!solution.reroute(FlowId(0), EdgeCost::DelayDerivative));
        assert!(!solution.reroute(FlowId(42), EdgeCost::DelayDerivative));
        assert_consistent(&solution);
    }
}
