//! Link congestion model
//!
//! Every link is treated as a single-server queue: with aggregate load `λ`
//! on a link of capacity `μ`, the expected per-unit delay is
//!
//! ```text
//! d(λ) = 1 / (μ - λ)      for λ < μ
//! d(λ) = INFEASIBLE_DELAY for λ ≥ μ
//! ```
//!
//! Links also keep the size-weighted mean priority of the flows routed over
//! them. Both aggregates are maintained incrementally by `admit` / `release`
//! and are only ever touched through `FlowRegistry::reassign`.

use crate::{FlowId, LinkId, NodeId};
use std::collections::BTreeSet;

/// Delay reported for a saturated link (9 decimal precision)
///
/// Finite so that path sums and cost comparisons stay totally ordered.
pub const INFEASIBLE_DELAY: f64 = 1_000_000_000.000000000;

/// Queueing delay of a link with the given capacity and load
#[inline]
pub fn queue_delay(capacity: f64, load: f64) -> f64 {
    if load < capacity {
        1.0 / (capacity - load)
    } else {
        INFEASIBLE_DELAY
    }
}

/// An undirected, capacity-bounded link between two nodes
#[derive(Debug, Clone)]
pub struct Link {
    pub id: LinkId,
    pub endpoints: (NodeId, NodeId),
    /// Service capacity (same unit as flow sizes)
    pub capacity: f64,
    load: f64,
    avg_priority: f64,
    members: BTreeSet<FlowId>,
}

impl Link {
    pub(crate) fn new(id: LinkId, a: NodeId, b: NodeId, capacity: f64) -> Self {
        Self {
            id,
            endpoints: (a, b),
            capacity,
            load: 0.0,
            avg_priority: 0.0,
            members: BTreeSet::new(),
        }
    }

    /// Aggregate size of the flows currently routed over this link
    pub fn load(&self) -> f64 {
        self.load
    }

    /// Size-weighted mean priority of member flows (0 when idle)
    pub fn avg_priority(&self) -> f64 {
        self.avg_priority
    }

    /// Flows currently routed over this link
    pub fn members(&self) -> &BTreeSet<FlowId> {
        &self.members
    }

    pub fn carries(&self, flow: FlowId) -> bool {
        self.members.contains(&flow)
    }

    pub fn connects(&self, a: NodeId, b: NodeId) -> bool {
        self.endpoints == (a, b) || self.endpoints == (b, a)
    }

    /// The endpoint opposite `node`, if `node` is an endpoint at all
    pub fn opposite(&self, node: NodeId) -> Option<NodeId> {
        match self.endpoints {
            (a, b) if a == node => Some(b),
            (a, b) if b == node => Some(a),
            _ => None,
        }
    }

    pub fn utilization(&self) -> f64 {
        self.load / self.capacity
    }

    pub fn is_saturated(&self) -> bool {
        self.load >= self.capacity
    }

    /// Expected per-unit delay at the current load
    pub fn expected_delay(&self) -> f64 {
        queue_delay(self.capacity, self.load)
    }

    /// Delay the link would have after `extra` more load
    pub fn delay_with(&self, extra: f64) -> f64 {
        queue_delay(self.capacity, self.load + extra)
    }

    /// `μ / (μ - λ)²`: marginal delay of one more unit of load
    pub fn delay_derivative(&self) -> f64 {
        if self.load < self.capacity {
            let residual = self.capacity - self.load;
            self.capacity / (residual * residual)
        } else {
            INFEASIBLE_DELAY
        }
    }

    /// Delay derivative scaled by the mean priority of the current traffic
    pub fn priority_weighted_derivative(&self) -> f64 {
        if self.load < self.capacity {
            let residual = self.capacity - self.load;
            self.capacity * self.avg_priority / (residual * residual)
        } else {
            INFEASIBLE_DELAY
        }
    }

    /// Add a flow's contribution. No-op if the flow is already a member.
    pub(crate) fn admit(&mut self, flow: FlowId, size: f64, priority: f64) {
        if !self.members.insert(flow) {
            return;
        }
        let total = self.load + size;
        self.avg_priority = (self.avg_priority * self.load + priority * size) / total;
        self.load = total;
    }

    /// Remove a flow's contribution. No-op if the flow is not a member.
    pub(crate) fn release(&mut self, flow: FlowId, size: f64, priority: f64) {
        if !self.members.remove(&flow) {
            return;
        }
        if self.members.is_empty() {
            // Drop accumulated rounding error with the last member
            self.load = 0.0;
            self.avg_priority = 0.0;
            return;
        }
        let total = self.load - size;
        self.avg_priority = (self.avg_priority * self.load - priority * size) / total;
        self.load = total;
    }
}
