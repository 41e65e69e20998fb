//! Average-delay minimization
//!
//! Deterministic local search over feasible assignments. Each sweep visits
//! every flow in registry order and tentatively re-routes it under
//! `PriorityWeightedDerivative`:
//!
//! - new average > best · (1 + offshoot), or any flow over the bound: revert
//! - new average < best: accept and snapshot all paths as the new best
//! - otherwise: keep the move without recording it as best
//!
//! `offshoot` shrinks by `cooling_factor` after each sweep and the search
//! stops after a sweep with no new best. The slack lets a sweep drift through
//! slightly worse states, but nothing is random: the same input always yields
//! the same plan. Every flow ends on its best recorded path.

use crate::config::OptimizerConfig;
use crate::cost::EdgeCost;
use crate::solution::Solution;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Outcome of one optimizer run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptimizationReport {
    pub initial_avg_delay: f64,
    pub best_avg_delay: f64,
    pub sweeps: usize,
    /// Moves that set a new best
    pub improvements: usize,
    /// Moves kept inside the slack window without improving
    pub drifts: usize,
    pub reverts: usize,
    /// Best average after each sweep
    pub best_by_sweep: Vec<f64>,
    /// False if `max_sweeps` ran out while still improving
    pub converged: bool,
}

impl Solution {
    /// Run the optimizer with default settings
    pub fn minimize_average_delay(&mut self) -> OptimizationReport {
        self.minimize_average_delay_with(&OptimizerConfig::default())
    }

    /// Requires a feasible solution; an infeasible one is left untouched
    pub fn minimize_average_delay_with(&mut self, config: &OptimizerConfig) -> OptimizationReport {
        let initial = self.average_delay();
        let mut report = OptimizationReport {
            initial_avg_delay: initial,
            best_avg_delay: initial,
            ..Default::default()
        };
        if !self.is_feasible() {
            warn!(
                infeasible = self.infeasible_flows().len(),
                "optimizer needs a feasible starting point, skipping"
            );
            return report;
        }

        self.best_paths = self.flows.snapshot();
        self.best_avg_delay = initial;
        let mut offshoot = config.offshoot;

        while report.sweeps < config.max_sweeps {
            report.sweeps += 1;
            let mut improved = false;

            for id in self.flows.ids() {
                let Some(previous) = self.flow(id).map(|f| f.path().to_vec()) else {
                    continue;
                };
                if !self.reroute(id, EdgeCost::PriorityWeightedDerivative) {
                    continue;
                }

                let avg = self.average_delay();
                if avg > self.best_avg_delay * (1.0 + offshoot) || !self.is_feasible() {
                    debug!(flow = %id, avg, best = self.best_avg_delay, "revert");
                    self.flows.reassign(&mut self.network, id, previous);
                    report.reverts += 1;
                } else if avg < self.best_avg_delay {
                    debug!(flow = %id, avg, best = self.best_avg_delay, "new best");
                    self.best_avg_delay = avg;
                    self.best_paths = self.flows.snapshot();
                    report.improvements += 1;
                    improved = true;
                } else {
                    report.drifts += 1;
                }
            }

            offshoot *= config.cooling_factor;
            report.best_by_sweep.push(self.best_avg_delay);
            if !improved {
                report.converged = true;
                break;
            }
        }

        let best = std::mem::take(&mut self.best_paths);
        self.flows.restore(&mut self.network, &best);
        self.best_paths = best;

        report.best_avg_delay = self.best_avg_delay;
        info!(
            initial = report.initial_avg_delay,
            best = report.best_avg_delay,
            sweeps = report.sweeps,
            improvements = report.improvements,
            converged = report.converged,
            "average delay minimized"
        );
        report
    }
}
