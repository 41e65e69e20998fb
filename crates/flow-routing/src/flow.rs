//! Flows and the flow registry
//!
//! The registry owns every flow's current path. `reassign` is the only way a
//! path changes, and it keeps each link's load, weighted priority and member
//! set in step with the registry.

use crate::network::Network;
use crate::{FlowId, LinkId, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

fn default_priority() -> f64 {
    1.0
}

/// A traffic demand as supplied by the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowSpec {
    pub source: NodeId,
    pub destination: NodeId,
    /// Demand volume, same unit as link capacity
    pub size: f64,
    #[serde(default = "default_priority")]
    pub priority: f64,
}

impl FlowSpec {
    pub fn new(source: NodeId, destination: NodeId, size: f64) -> Self {
        Self {
            source,
            destination,
            size,
            priority: default_priority(),
        }
    }

    pub fn with_priority(mut self, priority: f64) -> Self {
        self.priority = priority;
        self
    }
}

/// A registered flow and its assigned path
#[derive(Debug, Clone)]
pub struct Flow {
    pub id: FlowId,
    pub source: NodeId,
    pub destination: NodeId,
    pub size: f64,
    /// Effective priority after solver rescaling
    pub priority: f64,
    path: Vec<LinkId>,
}

impl Flow {
    pub fn path(&self) -> &[LinkId] {
        &self.path
    }

    pub fn uses(&self, link: LinkId) -> bool {
        self.path.contains(&link)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FlowRegistry {
    flows: Vec<Flow>,
}

impl FlowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a flow with an empty path
    pub(crate) fn register(&mut self, spec: &FlowSpec, priority: f64) -> FlowId {
        let id = FlowId(self.flows.len());
        self.flows.push(Flow {
            id,
            source: spec.source,
            destination: spec.destination,
            size: spec.size,
            priority,
            path: Vec::new(),
        });
        id
    }

    pub fn get(&self, id: FlowId) -> Option<&Flow> {
        self.flows.get(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Flow> {
        self.flows.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = FlowId> {
        (0..self.flows.len()).map(FlowId)
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    pub fn total_size(&self) -> f64 {
        self.flows.iter().map(|f| f.size).sum()
    }

    /// Move a flow onto `path`
    ///
    /// Releases the flow from every link of its old path, admits it on every
    /// link of the new one, then stores the new path. The network is borrowed
    /// mutably for the whole call, so no caller sees a half-applied move.
    pub(crate) fn reassign(&mut self, network: &mut Network, id: FlowId, path: Vec<LinkId>) {
        let flow = &mut self.flows[id.0];
        for link in &flow.path {
            network.link_mut(*link).release(id, flow.size, flow.priority);
        }
        for link in &path {
            network.link_mut(*link).admit(id, flow.size, flow.priority);
        }
        flow.path = path;
    }

    /// Every flow's current path, in registry order
    pub fn snapshot(&self) -> Vec<Vec<LinkId>> {
        self.flows.iter().map(|f| f.path.clone()).collect()
    }

    /// Put every flow back on the path recorded in `snapshot`
    pub(crate) fn restore(&mut self, network: &mut Network, snapshot: &[Vec<LinkId>]) {
        for (i, path) in snapshot.iter().enumerate() {
            if self.flows[i].path != *path {
                self.reassign(network, FlowId(i), path.clone());
            }
        }
    }

    /// Other flows sharing at least one link with `id`, smallest first
    pub fn buddies(&self, network: &Network, id: FlowId) -> Vec<FlowId> {
        let Some(flow) = self.get(id) else {
            return Vec::new();
        };
        let shared: BTreeSet<FlowId> = flow
            .path
            .iter()
            .filter_map(|link| network.link(*link))
            .flat_map(|link| link.members().iter().copied())
            .filter(|other| *other != id)
            .collect();

        let mut buddies: Vec<FlowId> = shared.into_iter().collect();
        // BTreeSet order breaks size ties by id; the sort is stable
        buddies.sort_by(|a, b| {
            self.flows[a.0]
                .size
                .partial_cmp(&self.flows[b.0].size)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        buddies
    }
}
