// sandglass: Dynamic Discretization Discovery for service network design
// Copyright (C) 2023 The sandglass authors
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! The solvers: the full uniform-discretization model and the Dynamic Discretization Discovery
//! fixed point.
//!
//! [`solve_snd`] discretizes time at a uniform grid and solves the design model once. This is
//! exact but quickly intractable for fine grids.
//!
//! [`solve_csnd`] instead starts from the coarsest useful discretization and iterates: solve the
//! relaxed design model (a lower bound), ask the identification model whether the solution can be
//! implemented in continuous time, and if not, insert the offending time points and repeat. Every
//! iteration either terminates or strictly grows the discretization by time points realized by
//! the current solution, so the loop reaches a fixed point after finitely many rounds.

use std::time::{Duration, Instant};

use good_lp::ResolutionError;
use log::{info, warn};
use thiserror::Error;

use crate::{
    expansion::{regular_discretization, relaxed_initial_discretization, DiscretizedGraph},
    instance::Instance,
    solution::Solution,
};

mod design;
mod identification;

use identification::Identification;

/// Error thrown by the solvers. Infeasibility of an instance is *not* an error: the solvers
/// return `None` in that case.
#[derive(Debug, Error)]
pub enum SndError {
    /// The optimizer terminated without an optimal solution (and not by proving infeasibility).
    #[error("{0}")]
    Resolution(#[from] ResolutionError),
}

/// Statistics of a [`solve_csnd_with_budget`] run.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SearchStats {
    /// Number of design/identification rounds performed.
    pub iterations: usize,
    /// Best proven lower bound on the total cost.
    pub lower_bound: f64,
    /// Number of timed nodes in the final discretization.
    pub expanded_nodes: usize,
}

impl std::fmt::Display for SearchStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} iterations, lower bound {}, {} timed nodes",
            self.iterations, self.lower_bound, self.expanded_nodes
        )
    }
}

/// Solve the service network design problem over the full uniform discretization with the given
/// grid width. Returns `None` if the instance is infeasible for this discretization.
pub fn solve_snd(ins: &Instance, delta_t: i64) -> Result<Option<Solution>, SndError> {
    let time_horizon = ins
        .commodities
        .iter()
        .map(|com| ((com.deadline + delta_t - 1) / delta_t) * delta_t)
        .max()
        .unwrap_or(0);
    let discretization =
        regular_discretization(ins.flat_graph.node_count(), time_horizon, delta_t);
    let g = DiscretizedGraph::new(&ins.flat_graph, discretization, false);
    info!("solving the full model over {} timed nodes", g.num_nodes());
    design::solve(ins, &g, None)
}

/// Solve the service network design problem with Dynamic Discretization Discovery and a 24 hour
/// time budget. Returns `None` if the instance is infeasible.
pub fn solve_csnd(ins: &Instance) -> Result<Option<Solution>, SndError> {
    solve_csnd_with_budget(ins, Duration::from_secs(24 * 60 * 60)).0
}

/// Solve the service network design problem with Dynamic Discretization Discovery.
///
/// Starting from the coarsest discretization (every release time at its source, every deadline at
/// its sink), repeatedly solve the relaxed design model and the identification model, refining
/// the discretization until the relaxed solution is implementable. When the time budget runs out
/// between solves, `None` is returned and the statistics carry the last proven lower bound.
pub fn solve_csnd_with_budget(
    ins: &Instance,
    time_budget: Duration,
) -> (Result<Option<Solution>, SndError>, SearchStats) {
    let discretization =
        relaxed_initial_discretization(ins.flat_graph.node_count(), &ins.commodities);
    let mut g = DiscretizedGraph::new(&ins.flat_graph, discretization, true);

    let mut stats = SearchStats {
        lower_bound: f64::NEG_INFINITY,
        ..Default::default()
    };
    let start_time = Instant::now();
    let deadline = start_time + time_budget;

    loop {
        stats.expanded_nodes = g.num_nodes();
        if Instant::now() >= deadline {
            warn!("time budget is not large enough, returning after {stats}");
            return (Ok(None), stats);
        }
        let remaining_budget = deadline.duration_since(Instant::now());

        // solve the relaxed model for the current discretization
        let mut sol = match design::solve(ins, &g, Some(remaining_budget)) {
            Ok(Some(sol)) => sol,
            Ok(None) => return (Ok(None), stats),
            Err(_) if Instant::now() >= deadline => {
                warn!("time budget is not large enough, returning after {stats}");
                return (Ok(None), stats);
            }
            Err(e) => return (Err(e), stats),
        };
        stats.lower_bound = stats.lower_bound.max(sol.total_cost);

        // check whether the solution can be implemented in continuous time
        let identification = match identification::identify(&mut sol, ins) {
            Ok(identification) => identification,
            Err(e) => return (Err(e), stats),
        };

        stats.iterations += 1;
        match identification {
            Identification::Implementable => {
                info!(
                    "iteration {}: lower bound {} is implementable, {} timed nodes",
                    stats.iterations, stats.lower_bound, stats.expanded_nodes
                );
                return (Ok(Some(sol)), stats);
            }
            Identification::Refine { points, conflicts } => {
                info!(
                    "iteration {}: lower bound {}, {} conflicts, {} timed nodes",
                    stats.iterations, stats.lower_bound, conflicts, stats.expanded_nodes
                );
                for (flat_node, time) in points {
                    g.refine(flat_node, time);
                }
            }
        }
    }
}
