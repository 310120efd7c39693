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

//! Solutions of the service network design problem: the operated timed services, the path of each
//! commodity over them, and the aggregate costs.

use petgraph::graph::NodeIndex;

/// The scheduled use of a flat arc at a particular dispatch time, operated by one or more
/// vehicles and carrying one or more commodities.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedService {
    /// Flat node the service departs from.
    pub start_node: NodeIndex,
    /// Flat node the service arrives at.
    pub end_node: NodeIndex,
    /// Dispatch time.
    pub start_time: i64,
    /// Arrival time. In a relaxed solution this may be earlier than `start_time + travel_time`;
    /// once a solution is accepted it is exactly that sum.
    pub end_time: i64,
    /// The real travel time of the underlying flat arc.
    pub travel_time: i64,
    /// Number of vehicles operating the service.
    pub n_vehicles: u32,
    /// Fixed cost of the vehicles operating the service.
    pub cost: f64,
    /// Total capacity of the vehicles operating the service.
    pub capacity: f64,
    /// Ids of the commodities transported, in increasing order.
    pub commodities: Vec<usize>,
}

impl TimedService {
    /// Render the service as a timed arc `((i, t), (j, t'))`.
    pub fn arc(&self) -> String {
        format!(
            "(({}, {}),({}, {}))",
            self.start_node.index(),
            self.start_time,
            self.end_node.index(),
            self.end_time
        )
    }
}

/// The route of a single commodity: the services it rides on, in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommodityPath {
    /// Total time spent travelling, i.e. the sum of the real travel times along the path.
    pub duration: i64,
    /// Total flow cost incurred by this commodity.
    pub flow_cost: f64,
    /// Indices into [`Solution::services`], in the order the commodity rides them.
    pub services: Vec<usize>,
}

/// A complete solution: all operated services, one path per commodity, and the aggregate costs.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    /// All operated services.
    pub services: Vec<TimedService>,
    /// One path per commodity, indexed by commodity id.
    pub commodity_paths: Vec<CommodityPath>,
    /// Sum of all flow costs.
    pub total_flow_cost: f64,
    /// Sum of all fixed costs.
    pub total_fixed_cost: f64,
    /// Total cost of the solution.
    pub total_cost: f64,
}

impl std::fmt::Display for Solution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Solution with cost {} = {} flow cost + {} fixed cost",
            self.total_cost, self.total_flow_cost, self.total_fixed_cost
        )?;
        writeln!(f, "Services:")?;
        for service in &self.services {
            writeln!(
                f,
                "{}x {}, travel time: {}, cost {}, capacity {}",
                service.n_vehicles,
                service.arc(),
                service.travel_time,
                service.cost,
                service.capacity
            )?;
        }
        writeln!(f, "Commodity paths:")?;
        for (com_id, path) in self.commodity_paths.iter().enumerate() {
            let arcs = path
                .services
                .iter()
                .map(|&s| self.services[s].arc())
                .collect::<Vec<_>>()
                .join(", ");
            writeln!(
                f,
                "Com {}: flow cost {}, duration {}, path: {}",
                com_id, path.flow_cost, path.duration, arcs
            )?;
        }
        Ok(())
    }
}
