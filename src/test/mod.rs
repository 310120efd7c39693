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

//! Tests for the instance reader, the time-expanded graph, and the solvers, sharing a tiny
//! three-node fixture.

use petgraph::graph::NodeIndex;

use crate::instance::{ArcData, Commodity, FlatGraph, Instance, NodeData};

mod expansion;

/// A tiny instance: a triangle `0 -> 1 -> 2` with a direct diagonal `0 -> 2`, all arcs with
/// travel time 1 and vehicle capacity 2, and three unit commodities whose time windows force
/// two of them onto the same service.
fn tiny_instance() -> Instance {
    let mut flat_graph = FlatGraph::new();
    let n0 = flat_graph.add_node(NodeData { name: "1".into() });
    let n1 = flat_graph.add_node(NodeData { name: "2".into() });
    let n2 = flat_graph.add_node(NodeData { name: "3".into() });
    flat_graph.add_edge(
        n0,
        n1,
        ArcData {
            travel_time: 1,
            flow_cost: 1.0,
            fixed_cost: 1.0,
            capacity: Some(2.0),
        },
    );
    flat_graph.add_edge(
        n1,
        n2,
        ArcData {
            travel_time: 1,
            flow_cost: 1.0,
            fixed_cost: 1.0,
            capacity: Some(2.0),
        },
    );
    flat_graph.add_edge(
        n0,
        n2,
        ArcData {
            travel_time: 1,
            flow_cost: 2.0,
            fixed_cost: 2.0,
            capacity: Some(2.0),
        },
    );
    let commodities = vec![
        Commodity {
            id: 0,
            source_node: n0,
            sink_node: n2,
            quantity: 1.0,
            release: 0,
            deadline: 3,
        },
        Commodity {
            id: 1,
            source_node: n1,
            sink_node: n2,
            quantity: 1.0,
            release: 1,
            deadline: 2,
        },
        Commodity {
            id: 2,
            source_node: n0,
            sink_node: n1,
            quantity: 1.0,
            release: 1,
            deadline: 2,
        },
    ];
    Instance {
        flat_graph,
        commodities,
    }
}

/// The uniform unit grid over four time points, for all three nodes of the tiny instance.
fn tiny_full_discretization() -> Vec<Vec<i64>> {
    vec![vec![0, 1, 2, 3], vec![0, 1, 2, 3], vec![0, 1, 2, 3]]
}

/// The initial relaxed discretization of the tiny instance.
fn tiny_initial_relaxed_discretization() -> Vec<Vec<i64>> {
    vec![vec![0, 1], vec![0, 1, 2], vec![0, 2, 3]]
}

/// Shorthand for a [`NodeIndex`].
fn n(i: usize) -> NodeIndex {
    NodeIndex::new(i)
}
