//! Feasibility restoration
//!
//! Drives every flow's end-to-end delay under `max_delay` in three escalating
//! phases, each limited to `max_passes` passes over the flow list:
//!
//! 1. Self-relief: an infeasible flow re-routes itself on the path that would
//!    be least congested once it is on it (`MarginalDelayExcluding`).
//! 2. Buddy displacement: flows sharing a link with an infeasible flow are
//!    pushed off, smallest first (`DelayDerivative`), until it is feasible.
//!    Displaced buddies are not moved back.
//! 3. Retry: self-relief again, for flows left infeasible by phase 2.
//!
//! The targets of a pass are the flows infeasible when the pass starts;
//! flows that were feasible then are never re-routed for their own sake.
//! Running out of passes is reported as `false`, not as an error.

use crate::config::RestorerConfig;
use crate::cost::EdgeCost;
use crate::solution::Solution;
use crate::FlowId;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestorePhase {
    SelfRelief,
    BuddyDisplacement,
    Retry,
}

impl RestorePhase {
    pub const ALL: [RestorePhase; 3] = [
        RestorePhase::SelfRelief,
        RestorePhase::BuddyDisplacement,
        RestorePhase::Retry,
    ];
}

impl Solution {
    /// Run the restorer with default settings
    pub fn make_feasible(&mut self) -> bool {
        self.make_feasible_with(&RestorerConfig::default())
    }

    /// Returns true if every flow meets `max_delay` on exit
    pub fn make_feasible_with(&mut self, config: &RestorerConfig) -> bool {
        for phase in RestorePhase::ALL {
            for pass in 0..config.max_passes {
                if self.is_feasible() {
                    info!(?phase, pass, "all flows within delay bound");
                    return true;
                }
                if !self.run_pass(phase) {
                    debug!(?phase, pass, "pass moved nothing, leaving phase");
                    break;
                }
            }
        }

        let remaining = self.infeasible_flows();
        if remaining.is_empty() {
            info!("all flows within delay bound");
            true
        } else {
            warn!(
                infeasible = remaining.len(),
                max_delay = self.max_delay(),
                "restoration budget exhausted"
            );
            false
        }
    }

    /// One pass of `phase` over the flows infeasible at its start
    ///
    /// Returns true if any path changed. An unchanged state would replay the
    /// same pass, so the caller can leave the phase early.
    pub(crate) fn run_pass(&mut self, phase: RestorePhase) -> bool {
        let targets = self.infeasible_flows();
        debug!(?phase, targets = targets.len(), "starting pass");

        let mut moved = false;
        for id in targets {
            if self.is_flow_feasible(id) {
                continue;
            }
            moved |= match phase {
                RestorePhase::SelfRelief | RestorePhase::Retry => self.relieve(id),
                RestorePhase::BuddyDisplacement => self.displace_buddies(id),
            };
        }
        moved
    }

    fn relieve(&mut self, id: FlowId) -> bool {
        let Some(flow) = self.flow(id) else {
            return false;
        };
        let cost = EdgeCost::marginal_delay_excluding(flow);
        self.reroute(id, cost)
    }

    /// Push buddies of `id` elsewhere, smallest first, until `id` is feasible
    pub(crate) fn displace_buddies(&mut self, id: FlowId) -> bool {
        let mut moved = false;
        for buddy in self.flows.buddies(&self.network, id) {
            moved |= self.reroute(buddy, EdgeCost::DelayDerivative);
            if self.is_flow_feasible(id) {
                debug!(flow = %id, %buddy, "feasible after displacement");
                break;
            }
        }
        moved
    }
}
