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

//! The identification model: the auxiliary MIP that decides whether a relaxed solution can be
//! implemented in continuous time.
//!
//! For every commodity and every position along its service sequence, a continuous dispatch time
//! and a continuous duration are chosen. A duration must normally cover the real travel time of
//! its service; a binary *shorten* variable allows it to drop to the (possibly too short) relaxed
//! travel time instead, at objective cost one. Dispatch times must respect the commodity's
//! release and deadline, must leave room for the chosen durations, and commodities sharing a
//! service must share its dispatch time (consolidation).
//!
//! If no service needs to be shortened, the relaxed solution is implementable and the dispatch
//! times are written back into the services. Otherwise, every shortened service yields a new time
//! point at its end node, to be inserted into the discretization.
//!
//! Variables are keyed by the position along the commodity's path, not by the visited node, so
//! that a commodity visiting the same node twice stays unambiguous.

use std::collections::{BTreeSet, HashMap};

use good_lp::{
    constraint, solvers::coin_cbc::coin_cbc as create_solver, variable, Expression,
    ProblemVariables, Solution as LpSolution, SolverModel, Variable,
};
use itertools::Itertools;
use log::debug;
use petgraph::graph::NodeIndex;

use super::SndError;
use crate::{instance::Instance, solution::Solution};

/// Outcome of the identification model.
#[derive(Debug)]
pub(super) enum Identification {
    /// The relaxed solution is implementable. The service times have been updated to the
    /// continuous dispatch times.
    Implementable,
    /// The relaxed solution is not implementable.
    Refine {
        /// The `(flat node, time)` insertions to refine the discretization by, sorted and
        /// deduplicated.
        points: Vec<(NodeIndex, i64)>,
        /// Number of shortened services (the objective value of the model). One insertion can
        /// absorb several shortened services, so this may exceed the number of points.
        conflicts: usize,
    },
}

/// Variables of the identification model, keyed by `(commodity id, position along its path)`.
#[derive(Debug)]
struct IdentVars {
    /// Continuous dispatch time of a commodity at the start of a service (`gamma`).
    dispatch: HashMap<(usize, usize), Variable>,
    /// Continuous time a commodity spends on a service (`theta`), bounded below by the relaxed
    /// travel time of the current solution.
    duration: HashMap<(usize, usize), Variable>,
    /// Binary indicator that a service must be shortened below its real travel time (`sigma`).
    shorten: HashMap<(usize, usize), Variable>,
}

/// Build and solve the identification model for a relaxed solution.
///
/// On success, either the solution's services carry their final times, or a list of time points
/// to insert is returned. The model itself is always feasible (shortening every service
/// reproduces the relaxed solution), so an infeasible resolution is an error.
pub(super) fn identify(sol: &mut Solution, ins: &Instance) -> Result<Identification, SndError> {
    let (problem, vars, objective) = setup_vars(sol, ins);
    let mut model = create_solver(problem.minimise(objective));

    // disable logging during tests
    #[cfg(any(test, feature = "hide-cbc-output"))]
    model.set_parameter("logLevel", "0");

    linking_constraints(&mut model, &vars, sol, ins);
    time_consistency_constraints(&mut model, &vars, ins, sol);
    time_window_constraints(&mut model, &vars, ins, sol);
    dispatch_consolidation_constraints(&mut model, &vars, sol);

    let lp = model.solve()?;

    let shortened: Vec<(usize, usize)> = vars
        .shorten
        .iter()
        .filter(|(_, &var)| lp.value(var) > 0.5)
        .map(|(&key, _)| key)
        .collect();
    debug!("{} services need to be shortened", shortened.len());

    if shortened.is_empty() {
        update_timed_services(sol, &lp, &vars);
        Ok(Identification::Implementable)
    } else {
        Ok(Identification::Refine {
            points: nodes_to_insert(sol, &shortened),
            conflicts: shortened.len(),
        })
    }
}

/// Create all variables, together with the objective expression: the number of shortened
/// services.
fn setup_vars(sol: &Solution, ins: &Instance) -> (ProblemVariables, IdentVars, Expression) {
    let mut problem = ProblemVariables::new();
    let mut objective = Expression::from(0);

    let mut dispatch = HashMap::new();
    let mut duration = HashMap::new();
    let mut shorten = HashMap::new();
    for com in &ins.commodities {
        for (pos, &s) in sol.commodity_paths[com.id].services.iter().enumerate() {
            let service = &sol.services[s];
            let relaxed_travel_time = (service.end_time - service.start_time) as f64;
            dispatch.insert((com.id, pos), problem.add(variable().min(0)));
            duration.insert(
                (com.id, pos),
                problem.add(variable().min(relaxed_travel_time)),
            );
            let sigma = problem.add(variable().binary());
            objective += sigma;
            shorten.insert((com.id, pos), sigma);
        }
    }

    (
        problem,
        IdentVars {
            dispatch,
            duration,
            shorten,
        },
        objective,
    )
}

/// Link durations to the shorten indicators: a duration must cover the real travel time unless
/// its service is shortened, in which case it may drop to the relaxed travel time.
fn linking_constraints(
    problem: &mut impl SolverModel,
    vars: &IdentVars,
    sol: &Solution,
    ins: &Instance,
) {
    for com in &ins.commodities {
        for (pos, &s) in sol.commodity_paths[com.id].services.iter().enumerate() {
            let service = &sol.services[s];
            let real = service.travel_time as f64;
            let relaxed = (service.end_time - service.start_time) as f64;
            let duration = vars.duration[&(com.id, pos)];
            let sigma = vars.shorten[&(com.id, pos)];
            problem.add_constraint(constraint!(duration >= real - (real - relaxed) * sigma));
        }
    }
}

/// A commodity can only be dispatched on its next service once the previous one has arrived.
fn time_consistency_constraints(
    problem: &mut impl SolverModel,
    vars: &IdentVars,
    ins: &Instance,
    sol: &Solution,
) {
    for com in &ins.commodities {
        let n_services = sol.commodity_paths[com.id].services.len();
        for pos in 0..n_services.saturating_sub(1) {
            let dispatch = vars.dispatch[&(com.id, pos)];
            let duration = vars.duration[&(com.id, pos)];
            let next_dispatch = vars.dispatch[&(com.id, pos + 1)];
            problem.add_constraint(constraint!(dispatch + duration <= next_dispatch));
        }
    }
}

/// The first dispatch must respect the release time, and the last arrival the deadline.
fn time_window_constraints(
    problem: &mut impl SolverModel,
    vars: &IdentVars,
    ins: &Instance,
    sol: &Solution,
) {
    for com in &ins.commodities {
        let n_services = sol.commodity_paths[com.id].services.len();
        if n_services == 0 {
            continue;
        }
        let release = com.release as f64;
        let deadline = com.deadline as f64;
        let first = vars.dispatch[&(com.id, 0)];
        problem.add_constraint(constraint!(first >= release));
        let last_dispatch = vars.dispatch[&(com.id, n_services - 1)];
        let last_duration = vars.duration[&(com.id, n_services - 1)];
        problem.add_constraint(constraint!(last_dispatch + last_duration <= deadline));
    }
}

/// Commodities sharing a service must share its dispatch time.
fn dispatch_consolidation_constraints(
    problem: &mut impl SolverModel,
    vars: &IdentVars,
    sol: &Solution,
) {
    for (s, service) in sol.services.iter().enumerate() {
        if service.commodities.len() < 2 {
            continue;
        }
        for (&com_a, &com_b) in service.commodities.iter().tuple_combinations() {
            let pos_a = position_of(sol, com_a, s);
            let pos_b = position_of(sol, com_b, s);
            let dispatch_a = vars.dispatch[&(com_a, pos_a)];
            let dispatch_b = vars.dispatch[&(com_b, pos_b)];
            problem.add_constraint(constraint!(dispatch_a == dispatch_b));
        }
    }
}

/// Position of a service in the path of a commodity that rides it.
fn position_of(sol: &Solution, com_id: usize, service: usize) -> usize {
    sol.commodity_paths[com_id]
        .services
        .iter()
        .position(|&s| s == service)
        .expect("a service lies on the path of every commodity it transports")
}

/// Write the continuous dispatch times back into the services: the start time is the dispatch
/// time of any commodity on board, and the end time follows from the real travel time.
fn update_timed_services(sol: &mut Solution, lp: &impl LpSolution, vars: &IdentVars) {
    let Solution {
        services,
        commodity_paths,
        ..
    } = sol;
    for (s, service) in services.iter_mut().enumerate() {
        let Some(&com) = service.commodities.first() else {
            // a service without commodities cannot shift; pin its arrival to its dispatch
            service.end_time = service.start_time + service.travel_time;
            continue;
        };
        let pos = commodity_paths[com]
            .services
            .iter()
            .position(|&other| other == s)
            .expect("a service lies on the path of every commodity it transports");
        service.start_time = lp.value(vars.dispatch[&(com, pos)]).round() as i64;
        service.end_time = service.start_time + service.travel_time;
    }
}

/// The time points to insert for every shortened service: the true arrival time
/// `start + travel_time` at the end node, deduplicated and sorted.
fn nodes_to_insert(sol: &Solution, shortened: &[(usize, usize)]) -> Vec<(NodeIndex, i64)> {
    let mut points = BTreeSet::new();
    for &(com_id, pos) in shortened {
        let service = &sol.services[sol.commodity_paths[com_id].services[pos]];
        points.insert((service.end_node, service.start_time + service.travel_time));
    }
    points.into_iter().collect()
}
