//! Edge cost models for path placement
//!
//! | Model                        | Cost of traversing a link               |
//! |------------------------------|-----------------------------------------|
//! | `InverseCapacity`            | `1 / μ`                                 |
//! | `MarginalDelayExcluding`     | `d(λ)` if member, else `d(λ + size)`    |
//! | `DelayDerivative`            | `μ / (μ - λ)²`                          |
//! | `PriorityWeightedDerivative` | `μ · p̄ / (μ - λ)²`                      |
//!
//! Saturated links cost `INFEASIBLE_DELAY` under every load-aware model.

use crate::flow::Flow;
use crate::link::Link;
use crate::FlowId;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EdgeCost {
    /// Congestion-oblivious placement
    InverseCapacity,
    /// Delay the link would show with this flow on it, without counting
    /// the flow twice on links it already occupies
    MarginalDelayExcluding { flow: FlowId, size: f64 },
    /// Sensitivity of link delay to one more unit of load
    DelayDerivative,
    /// Delay sensitivity weighted by the priority of the traffic already there
    PriorityWeightedDerivative,
}

impl EdgeCost {
    pub fn marginal_delay_excluding(flow: &Flow) -> Self {
        EdgeCost::MarginalDelayExcluding {
            flow: flow.id,
            size: flow.size,
        }
    }

    /// Weight of a single link under this model
    pub fn weigh(&self, link: &Link) -> f64 {
        match *self {
            EdgeCost::InverseCapacity => 1.0 / link.capacity,
            EdgeCost::MarginalDelayExcluding { flow, size } => {
                if link.carries(flow) {
                    link.expected_delay()
                } else {
                    link.delay_with(size)
                }
            }
            EdgeCost::DelayDerivative => link.delay_derivative(),
            EdgeCost::PriorityWeightedDerivative => link.priority_weighted_derivative(),
        }
    }
}
