//! Flow Routing - delay-bounded traffic placement
//!
//! Routes a fixed set of traffic demands (flows) across a tiered network so
//! that every flow's end-to-end queueing delay stays under a global bound,
//! then minimizes the priority-weighted average delay inside that bound:
//!
//! - Tiered topology generation and manual construction
//! - Per-link congestion model (M/M/1 style `1 / (capacity - load)`)
//! - Incremental load and weighted-priority bookkeeping
//! - Pluggable edge costs for shortest-path placement
//! - Three-phase feasibility restoration
//! - Deterministic delay-minimizing local search
//!
//! # Pipeline
//!
//! ```text
//! Network::generate ─▶ Solution::new (inverse-capacity paths)
//!                   ─▶ make_feasible (self-relief, buddy displacement, retry)
//!                   ─▶ minimize_average_delay (perturb / accept / revert)
//!                   ─▶ plan()
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub mod config;
pub mod cost;
pub mod flow;
pub mod link;
pub mod network;
pub mod optimize;
pub mod report;
pub mod restore;
pub mod solution;

pub use config::{CapacityOverride, OptimizerConfig, RestorerConfig, Scenario, SolverConfig, TopologySpec};
pub use cost::EdgeCost;
pub use flow::{Flow, FlowRegistry, FlowSpec};
pub use link::{Link, INFEASIBLE_DELAY};
pub use network::{Network, NetworkStats, Node, Tier};
pub use optimize::OptimizationReport;
pub use report::{FlowReport, LinkReport, RoutingPlan};
pub use restore::RestorePhase;
pub use solution::Solution;

/// Routing errors
#[derive(Error, Debug)]
pub enum RoutingError {
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),
    #[error("Tier not found: {0}")]
    TierNotFound(TierId),
    #[error("Link already exists between {0} and {1}")]
    DuplicateLink(NodeId, NodeId),
    #[error("No path found between {0} and {1}")]
    NoPath(NodeId, NodeId),
    #[error("Invalid flow {0}: {1}")]
    InvalidFlow(usize, String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RoutingError>;

/// Dense node identifier, assigned in creation order starting at 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub usize);

/// Dense tier identifier; tier 0 is the top of the hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TierId(pub usize);

/// Dense link identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkId(pub usize);

/// Flow identifier, equal to the flow's position in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for TierId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "F{}", self.0)
    }
}
