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

//! The design/flow model: the outer MIP over the current time-expanded graph.
//!
//! Integer design variables decide how many vehicles operate each travel arc, binary flow
//! variables route each commodity over travel and holding arcs. The objective is the sum of fixed
//! vehicle costs and per-unit flow costs. Flow is conserved at every timed node, and on every
//! travel arc the transported quantity is bounded by the capacity of the operated vehicles.

use std::{collections::HashMap, time::Duration};

use good_lp::{
    constraint, solvers::coin_cbc::coin_cbc as create_solver, variable, Expression,
    ProblemVariables, ResolutionError, Solution as LpSolution, SolverModel, Variable,
};
use log::{debug, info};
use petgraph::{graph::EdgeIndex, visit::EdgeRef, Direction};

use super::SndError;
use crate::{
    expansion::DiscretizedGraph,
    instance::{Commodity, Instance},
    solution::{CommodityPath, Solution, TimedService},
};

/// All variables of the design/flow model.
#[derive(Debug)]
struct DesignVars {
    /// Integer number of vehicles per travel arc of the expanded graph.
    y: HashMap<EdgeIndex, Variable>,
    /// Binary flow of each commodity over each arc (travel and holding) of the expanded graph.
    x: HashMap<(EdgeIndex, usize), Variable>,
}

/// Build and solve the design/flow model over the given expansion.
///
/// Returns `None` if the model is infeasible for the current discretization. Any other
/// non-optimal resolution is an error. An optional timeout is handed to the solver.
pub(super) fn solve(
    ins: &Instance,
    g: &DiscretizedGraph<'_>,
    timeout: Option<Duration>,
) -> Result<Option<Solution>, SndError> {
    let (problem, vars, objective) = setup_vars(ins, g);
    let mut model = create_solver(problem.minimise(objective));

    // disable logging during tests
    #[cfg(any(test, feature = "hide-cbc-output"))]
    model.set_parameter("logLevel", "0");

    if let Some(t) = timeout {
        model.set_parameter("seconds", &t.as_secs().to_string());
    }

    flow_conservation_constraints(&mut model, &vars, ins, g);
    capacity_constraints(&mut model, &vars, ins, g);

    debug!(
        "design model with {} rows and {} columns",
        model.as_inner().num_rows(),
        model.as_inner().num_cols()
    );

    info!("Solving the design model...");
    match model.solve() {
        Ok(solution) => Ok(Some(extract_solution(&solution, &vars, ins, g))),
        Err(ResolutionError::Infeasible) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Create all variables of the model, together with the objective expression.
fn setup_vars(
    ins: &Instance,
    g: &DiscretizedGraph<'_>,
) -> (ProblemVariables, DesignVars, Expression) {
    let mut problem = ProblemVariables::new();
    let mut objective = Expression::from(0);

    // one integer design variable per expanded copy of a flat arc, paying the fixed cost
    let mut y = HashMap::new();
    for flat_arc in g.flat().edge_indices() {
        let fixed_cost = g.flat()[flat_arc].fixed_cost;
        for &arc in g.expanded_arcs(flat_arc) {
            let var = problem.add(variable().integer().min(0));
            objective += fixed_cost * var;
            y.insert(arc, var);
        }
    }

    // one binary flow variable per arc and commodity, paying the flow cost per unit. Holding
    // arcs have zero flow cost.
    let mut x = HashMap::new();
    for arc in g.graph().edge_indices() {
        let flow_cost = g.graph()[arc].flow_cost;
        for com in &ins.commodities {
            let var = problem.add(variable().binary());
            objective += flow_cost * com.quantity * var;
            x.insert((arc, com.id), var);
        }
    }

    (problem, DesignVars { y, x }, objective)
}

/// Require flow conservation for every commodity at every timed node: `+1` at the commodity's
/// source, `-1` at its sink, `0` elsewhere.
///
/// The source of a commodity is the first timed copy of its source node no earlier than its
/// release time, and its sink is the first timed copy of its sink node no earlier than its
/// deadline.
fn flow_conservation_constraints(
    problem: &mut impl SolverModel,
    vars: &DesignVars,
    ins: &Instance,
    g: &DiscretizedGraph<'_>,
) {
    for com in &ins.commodities {
        let source = g.first_node_at_or_after(com.source_node, com.release);
        let sink = g.first_node_at_or_after(com.sink_node, com.deadline);
        for node in g.graph().node_indices() {
            let rhs = if node == source {
                1
            } else if node == sink {
                -1
            } else {
                0
            };
            let outflow: Expression = g
                .graph()
                .edges_directed(node, Direction::Outgoing)
                .map(|e| vars.x[&(e.id(), com.id)])
                .sum();
            let inflow: Expression = g
                .graph()
                .edges_directed(node, Direction::Incoming)
                .map(|e| vars.x[&(e.id(), com.id)])
                .sum();
            problem.add_constraint(constraint!(outflow - inflow == rhs));
        }
    }
}

/// Bound the transported quantity on every travel arc by the capacity of the vehicles operating
/// it. Holding arcs carry no capacity constraint.
fn capacity_constraints(
    problem: &mut impl SolverModel,
    vars: &DesignVars,
    ins: &Instance,
    g: &DiscretizedGraph<'_>,
) {
    for arc in g.graph().edge_indices() {
        if let Some(vehicle_capacity) = g.graph()[arc].capacity {
            let flow: Expression = ins
                .commodities
                .iter()
                .map(|com| com.quantity * vars.x[&(arc, com.id)])
                .sum();
            let capacity = vehicle_capacity * vars.y[&arc];
            problem.add_constraint(constraint!(flow <= capacity));
        }
    }
}

/// Read the variable values back into a [`Solution`]: one [`TimedService`] per travel arc with a
/// positive vehicle count, and one ordered service sequence per commodity.
fn extract_solution(
    lp: &impl LpSolution,
    vars: &DesignVars,
    ins: &Instance,
    g: &DiscretizedGraph<'_>,
) -> Solution {
    let mut services = Vec::new();
    let mut commodity_paths = vec![CommodityPath::default(); ins.commodities.len()];
    let mut total_flow_cost = 0.0;
    let mut total_fixed_cost = 0.0;

    for flat_arc in g.flat().edge_indices() {
        for &arc in g.expanded_arcs(flat_arc) {
            let n_vehicles = lp.value(vars.y[&arc]).round() as u32;
            if n_vehicles == 0 {
                continue;
            }
            let data = g.graph()[arc];
            let (i, j) = g.graph().edge_endpoints(arc).expect("arc is in the graph");

            let cost = f64::from(n_vehicles) * data.fixed_cost;
            total_fixed_cost += cost;

            // determine the commodities on board and charge them their flow cost
            let mut commodities = Vec::new();
            for com in &ins.commodities {
                if lp.value(vars.x[&(arc, com.id)]) > 0.5 {
                    commodities.push(com.id);
                    let arc_flow_cost = com.quantity * data.flow_cost;
                    commodity_paths[com.id].flow_cost += arc_flow_cost;
                    commodity_paths[com.id].duration += data.travel_time;
                    commodity_paths[com.id].services.push(services.len());
                    total_flow_cost += arc_flow_cost;
                }
            }

            services.push(TimedService {
                start_node: g.timed_node(i).flat_node,
                end_node: g.timed_node(j).flat_node,
                start_time: g.timed_node(i).time,
                end_time: g.timed_node(j).time,
                travel_time: data.travel_time,
                n_vehicles,
                cost,
                capacity: f64::from(n_vehicles)
                    * data.capacity.expect("travel arcs carry a capacity"),
                commodities,
            });
        }
    }

    // order the services of each commodity along its path
    for com in &ins.commodities {
        commodity_paths[com.id].services =
            sort_services(&services, &commodity_paths[com.id].services, com);
    }

    Solution {
        services,
        commodity_paths,
        total_flow_cost,
        total_fixed_cost,
        total_cost: total_flow_cost + total_fixed_cost,
    }
}

/// Order the unordered service multiset of a commodity along its path: repeatedly pick the
/// earliest service departing from the current node no earlier than the current time, then
/// advance to its end node and arrival time.
///
/// A step with no matching service means the flow and design values are inconsistent, which is a
/// bug, and panics.
fn sort_services(services: &[TimedService], unordered: &[usize], com: &Commodity) -> Vec<usize> {
    let mut remaining = unordered.to_vec();
    let mut ordered = Vec::with_capacity(remaining.len());
    let mut current_node = com.source_node;
    let mut current_time = i64::MIN;
    while !remaining.is_empty() {
        let pick = remaining
            .iter()
            .enumerate()
            .filter(|(_, &s)| {
                services[s].start_node == current_node && services[s].start_time >= current_time
            })
            .min_by_key(|(_, &s)| services[s].start_time)
            .map(|(pos, _)| pos)
            .unwrap_or_else(|| {
                panic!(
                    "no service can continue commodity {} at node {} after time {current_time}",
                    com.id,
                    current_node.index()
                )
            });
        let service = remaining.swap_remove(pick);
        current_node = services[service].end_node;
        current_time = services[service].end_time;
        ordered.push(service);
    }
    ordered
}
