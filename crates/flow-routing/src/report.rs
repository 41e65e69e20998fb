//! Human-readable and serializable views of a solution

use crate::link::Link;
use crate::network::NetworkStats;
use crate::{FlowId, LinkId, NodeId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One flow's placement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowReport {
    pub id: FlowId,
    pub source: NodeId,
    pub destination: NodeId,
    pub size: f64,
    pub priority: f64,
    /// Ordered node walk from source to destination
    pub nodes: Vec<NodeId>,
    pub labels: Vec<String>,
    /// End-to-end delay on the current path
    pub delay: f64,
    pub feasible: bool,
}

impl fmt::Display for FlowReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let walk = self
            .nodes
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(" -> ");
        write!(
            f,
            "flow {}: {} -> {} via [{}] ({}) size {:.3} priority {:.3} delay {:.6}",
            self.id,
            self.source,
            self.destination,
            walk,
            self.labels.join(" -> "),
            self.size,
            self.priority,
            self.delay
        )?;
        if !self.feasible {
            write!(f, " (over bound)")?;
        }
        Ok(())
    }
}

/// Aggregate state of one loaded link
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkReport {
    pub id: LinkId,
    pub endpoints: (NodeId, NodeId),
    pub capacity: f64,
    pub load: f64,
    pub utilization: f64,
    pub avg_priority: f64,
    pub delay: f64,
    pub flows: Vec<FlowId>,
}

impl From<&Link> for LinkReport {
    fn from(link: &Link) -> Self {
        Self {
            id: link.id,
            endpoints: link.endpoints,
            capacity: link.capacity,
            load: link.load(),
            utilization: link.utilization(),
            avg_priority: link.avg_priority(),
            delay: link.expected_delay(),
            flows: link.members().iter().copied().collect(),
        }
    }
}

/// Final routing plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingPlan {
    pub network: String,
    pub max_delay: f64,
    pub feasible: bool,
    pub average_delay: f64,
    pub flows: Vec<FlowReport>,
    /// Links carrying at least one flow
    pub links: Vec<LinkReport>,
    pub stats: NetworkStats,
    pub computed_at: DateTime<Utc>,
}
