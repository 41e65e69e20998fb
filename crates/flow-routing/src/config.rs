//! Topology, solver and scenario configuration
//!
//! All structs deserialize from JSON. Solver tuning knobs fall back to the
//! defaults below when omitted.

use crate::flow::FlowSpec;
use crate::network::Network;
use crate::solution::Solution;
use crate::{NodeId, Result, RoutingError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Passes over all flows allowed per restoration phase
pub const DEFAULT_MAX_PASSES: usize = 10;

/// Initial acceptance slack of the delay optimizer (9 decimal precision)
pub const DEFAULT_OFFSHOOT: f64 = 0.150000000;

/// Slack shrink factor applied after every optimizer sweep (9 decimal precision)
pub const DEFAULT_COOLING_FACTOR: f64 = 0.800000000;

/// Upper bound on optimizer sweeps
pub const DEFAULT_MAX_SWEEPS: usize = 1000;

/// Capacity replacing the tier default on one generated link
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacityOverride {
    /// Node in the lower tier
    pub from: NodeId,
    /// Node in the tier above
    pub to: NodeId,
    pub capacity: f64,
}

/// Input to `Network::generate`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologySpec {
    pub name: String,
    pub tier_count: usize,
    pub nodes_per_tier: Vec<usize>,
    /// Capacity of links between tier k and tier k-1, indexed by k-1
    pub default_capacity: Vec<f64>,
    /// Up-links per node of tier k, indexed by k-1
    pub default_connectivity: Vec<usize>,
    #[serde(default)]
    pub capacity_overrides: Vec<CapacityOverride>,
}

impl TopologySpec {
    pub fn validate(&self) -> Result<()> {
        if self.tier_count == 0 {
            return Err(RoutingError::Config("at least one tier is required".to_string()));
        }
        if self.nodes_per_tier.len() != self.tier_count {
            return Err(RoutingError::Config(format!(
                "nodes_per_tier has {} entries for {} tiers",
                self.nodes_per_tier.len(),
                self.tier_count
            )));
        }
        if self.default_capacity.len() != self.tier_count - 1 {
            return Err(RoutingError::Config(format!(
                "default_capacity has {} entries, expected {}",
                self.default_capacity.len(),
                self.tier_count - 1
            )));
        }
        if self.default_connectivity.len() != self.tier_count - 1 {
            return Err(RoutingError::Config(format!(
                "default_connectivity has {} entries, expected {}",
                self.default_connectivity.len(),
                self.tier_count - 1
            )));
        }
        if let Some(tier) = self.nodes_per_tier.iter().position(|&n| n == 0) {
            return Err(RoutingError::Config(format!("tier {tier} has no nodes")));
        }
        for (k, capacity) in self.default_capacity.iter().enumerate() {
            if !(capacity.is_finite() && *capacity > 0.0) {
                return Err(RoutingError::Config(format!(
                    "default capacity between tiers {} and {} must be positive, got {capacity}",
                    k,
                    k + 1
                )));
            }
        }
        for o in &self.capacity_overrides {
            if !(o.capacity.is_finite() && o.capacity > 0.0) {
                return Err(RoutingError::Config(format!(
                    "override {}-{} capacity must be positive, got {}",
                    o.from, o.to, o.capacity
                )));
            }
        }
        Ok(())
    }
}

/// Feasibility restorer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RestorerConfig {
    /// Passes over all flows per phase
    pub max_passes: usize,
}

impl Default for RestorerConfig {
    fn default() -> Self {
        Self {
            max_passes: DEFAULT_MAX_PASSES,
        }
    }
}

/// Delay optimizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Relative slack over the best average delay a tentative move may keep
    pub offshoot: f64,
    /// Multiplier applied to `offshoot` after each sweep
    pub cooling_factor: f64,
    pub max_sweeps: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            offshoot: DEFAULT_OFFSHOOT,
            cooling_factor: DEFAULT_COOLING_FACTOR,
            max_sweeps: DEFAULT_MAX_SWEEPS,
        }
    }
}

impl OptimizerConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.offshoot.is_finite() && self.offshoot >= 0.0) {
            return Err(RoutingError::Config(format!(
                "offshoot must be non-negative, got {}",
                self.offshoot
            )));
        }
        if !(self.cooling_factor > 0.0 && self.cooling_factor <= 1.0) {
            return Err(RoutingError::Config(format!(
                "cooling_factor must be in (0, 1], got {}",
                self.cooling_factor
            )));
        }
        Ok(())
    }
}

fn default_priority_scale() -> f64 {
    1.0
}

/// Global delay bound plus solver tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Upper bound on every flow's end-to-end delay
    pub max_delay: f64,
    /// Priorities are rescaled to `1 + (p - 1) * priority_scale`
    #[serde(default = "default_priority_scale")]
    pub priority_scale: f64,
    #[serde(default)]
    pub restorer: RestorerConfig,
    #[serde(default)]
    pub optimizer: OptimizerConfig,
}

impl SolverConfig {
    pub fn new(max_delay: f64) -> Self {
        Self {
            max_delay,
            priority_scale: default_priority_scale(),
            restorer: RestorerConfig::default(),
            optimizer: OptimizerConfig::default(),
        }
    }
}

/// A complete planning input: topology, demands and solver settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub topology: TopologySpec,
    pub flows: Vec<FlowSpec>,
    pub solver: SolverConfig,
}

impl Scenario {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Generate the topology and place every flow on its initial path
    pub fn build(&self) -> Result<Solution> {
        self.solver.optimizer.validate()?;
        let network = Network::generate(&self.topology)?;
        Solution::new(
            network,
            self.flows.clone(),
            self.solver.max_delay,
            self.solver.priority_scale,
        )
    }
}
