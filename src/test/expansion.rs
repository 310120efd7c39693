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

//! Tests for the construction and refinement of the time-expanded graph.

use petgraph::{
    graph::NodeIndex,
    visit::{EdgeRef, IntoEdgeReferences},
};

use super::{n, tiny_full_discretization, tiny_initial_relaxed_discretization, tiny_instance};
use crate::expansion::{
    regular_discretization, relaxed_initial_discretization, DiscretizedGraph,
};

/// A timed arc described by its endpoints `((flat, time), (flat, time))`.
type TimedArc = ((usize, i64), (usize, i64));

/// The timed copy of `flat_node` at exactly `time`.
fn node_at(g: &DiscretizedGraph<'_>, flat_node: usize, time: i64) -> NodeIndex {
    let times = g.times(n(flat_node));
    let k = times.partition_point(|&t| t < time);
    assert!(
        k < times.len() && times[k] == time,
        "no timed node ({flat_node}, {time})"
    );
    g.expanded_nodes(n(flat_node))[k]
}

/// All arcs of the expanded graph as `((flat, time), (flat, time))` pairs, unsorted.
fn timed_arcs(g: &DiscretizedGraph<'_>) -> Vec<TimedArc> {
    g.graph()
        .edge_references()
        .map(|e| {
            let i = g.timed_node(e.source());
            let j = g.timed_node(e.target());
            (
                (i.flat_node.index(), i.time),
                (j.flat_node.index(), j.time),
            )
        })
        .collect()
}

/// Number of arcs between two timed nodes.
fn arcs_between(g: &DiscretizedGraph<'_>, i: (usize, i64), j: (usize, i64)) -> usize {
    g.graph()
        .edges_connecting(node_at(g, i.0, i.1), node_at(g, j.0, j.1))
        .count()
}

/// Check all structural invariants of an expansion: strictly increasing time points mirrored by
/// the node map, exactly one holding arc per consecutive pair, consistent arc data, and the
/// rounding invariant of every travel arc.
fn check_consistency(g: &DiscretizedGraph<'_>) {
    let mut n_travel_arcs = 0;
    for flat_node in g.flat().node_indices() {
        let times = g.times(flat_node);
        let copies = g.expanded_nodes(flat_node);
        assert_eq!(times.len(), copies.len());
        assert!(times.windows(2).all(|w| w[0] < w[1]));
        for (&time, &copy) in times.iter().zip(copies) {
            assert_eq!(g.timed_node(copy).flat_node, flat_node);
            assert_eq!(g.timed_node(copy).time, time);
        }
        // exactly one holding arc between consecutive copies
        for pair in copies.windows(2) {
            let holding: Vec<_> = g.graph().edges_connecting(pair[0], pair[1]).collect();
            assert_eq!(holding.len(), 1);
            assert!(holding[0].weight().is_holding());
            assert_eq!(holding[0].weight().travel_time, 0);
        }
    }
    for flat_arc in g.flat().edge_indices() {
        let data = g.flat()[flat_arc];
        let (u, w) = g.flat().edge_endpoints(flat_arc).unwrap();
        for &arc in g.expanded_arcs(flat_arc) {
            n_travel_arcs += 1;
            let (i, j) = g.graph().edge_endpoints(arc).unwrap();
            assert_eq!(g.timed_node(i).flat_node, u);
            assert_eq!(g.timed_node(j).flat_node, w);
            assert_eq!(g.graph()[arc], data);
            let arrival = g.timed_node(i).time + data.travel_time;
            if g.relaxed() {
                assert!(g.timed_node(j).time <= arrival);
            } else {
                assert!(g.timed_node(j).time >= arrival);
            }
        }
    }
    // the arc map covers every non-holding arc of the graph
    let n_non_holding = g
        .graph()
        .edge_references()
        .filter(|e| !e.weight().is_holding())
        .count();
    assert_eq!(n_travel_arcs, n_non_holding);
}

#[test]
fn test_regular_discretization() {
    assert_eq!(regular_discretization(3, 3, 1), tiny_full_discretization());
    assert_eq!(
        regular_discretization(2, 5, 2),
        vec![vec![0, 2, 4], vec![0, 2, 4]]
    );
}

#[test]
fn test_relaxed_initial_discretization() {
    let ins = tiny_instance();
    assert_eq!(
        relaxed_initial_discretization(ins.flat_graph.node_count(), &ins.commodities),
        tiny_initial_relaxed_discretization()
    );
}

#[test]
fn test_fully_discretized_graph() {
    let ins = tiny_instance();
    let g = DiscretizedGraph::new(&ins.flat_graph, tiny_full_discretization(), false);

    // each flat node once for each time step, ordered correctly
    assert_eq!(g.num_nodes(), 12);
    for flat_node in 0..3 {
        for time in 0..4 {
            let copy = g.expanded_nodes(n(flat_node))[time as usize];
            assert_eq!(g.timed_node(copy).flat_node, n(flat_node));
            assert_eq!(g.timed_node(copy).time, time);
        }
    }

    // 9 holding arcs and 9 travel arcs. All travel times are 1, so every travel arc connects
    // consecutive time steps exactly.
    assert_eq!(g.num_arcs(), 18);
    for (flat_arc, (i_flat, j_flat)) in [(0, (0, 1)), (1, (1, 2)), (2, (0, 2))] {
        let copies = g.expanded_arcs(petgraph::graph::EdgeIndex::new(flat_arc));
        assert_eq!(copies.len(), 3);
        for (time, &arc) in copies.iter().enumerate() {
            let (i, j) = g.graph().edge_endpoints(arc).unwrap();
            assert_eq!(g.timed_node(i).flat_node, n(i_flat));
            assert_eq!(g.timed_node(j).flat_node, n(j_flat));
            assert_eq!(g.timed_node(i).time, time as i64);
            assert_eq!(g.timed_node(j).time, time as i64 + 1);
        }
    }

    check_consistency(&g);
}

#[test]
fn test_initial_relaxed_discretized_graph() {
    let ins = tiny_instance();
    let g = DiscretizedGraph::new(
        &ins.flat_graph,
        tiny_initial_relaxed_discretization(),
        true,
    );

    let nodes_expanded = [
        (0, 0),
        (0, 1),
        (1, 0),
        (1, 1),
        (1, 2),
        (2, 0),
        (2, 2),
        (2, 3),
    ];
    assert_eq!(g.num_nodes(), nodes_expanded.len());
    for node in g.graph().node_indices() {
        let timed = g.timed_node(node);
        assert!(nodes_expanded.contains(&(timed.flat_node.index(), timed.time)));
    }

    let arcs_expanded: Vec<TimedArc> = vec![
        // travel arcs
        ((0, 0), (1, 1)),
        ((0, 1), (1, 2)),
        ((1, 0), (2, 0)),
        ((1, 1), (2, 2)),
        ((1, 2), (2, 3)),
        ((0, 0), (2, 0)),
        ((0, 1), (2, 2)),
        // holding arcs
        ((0, 0), (0, 1)),
        ((1, 0), (1, 1)),
        ((1, 1), (1, 2)),
        ((2, 0), (2, 2)),
        ((2, 2), (2, 3)),
    ];
    assert_eq!(g.num_arcs(), arcs_expanded.len());
    for arc in timed_arcs(&g) {
        assert!(arcs_expanded.contains(&arc), "unexpected arc {arc:?}");
    }

    check_consistency(&g);
}

#[test]
fn test_refining_relaxed_discretization() {
    let ins = tiny_instance();
    let mut g = DiscretizedGraph::new(
        &ins.flat_graph,
        tiny_initial_relaxed_discretization(),
        true,
    );
    let old_n_nodes = g.num_nodes();
    let old_n_arcs = g.num_arcs();

    g.refine(n(2), 1);

    // one additional node, registered at the right position
    assert_eq!(g.num_nodes(), old_n_nodes + 1);
    assert_eq!(g.times(n(2)), &[0, 1, 2, 3]);
    let new = node_at(&g, 2, 1);
    assert_eq!(g.timed_node(new).flat_node, n(2));
    assert_eq!(g.timed_node(new).time, 1);

    // 1. both ingoing travel arcs arriving at time >= 1 are redirected to the new node
    // 2. one holding arc is replaced by two
    // 3. no travel arcs leave the new node (flat node 2 has no outgoing arcs)
    assert_eq!(g.num_arcs(), old_n_arcs + 1);
    let arcs = timed_arcs(&g);
    for removed in [((0, 0), (2, 0)), ((1, 0), (2, 0)), ((2, 0), (2, 2))] {
        assert!(!arcs.contains(&removed), "arc {removed:?} should be gone");
    }
    for added in [
        ((0, 0), (2, 1)),
        ((1, 0), (2, 1)),
        ((2, 0), (2, 1)),
        ((2, 1), (2, 2)),
    ] {
        assert_eq!(arcs_between(&g, added.0, added.1), 1);
    }

    check_consistency(&g);
}

#[test]
fn test_refining_past_the_last_time_point() {
    let ins = tiny_instance();
    let mut g = DiscretizedGraph::new(
        &ins.flat_graph,
        tiny_initial_relaxed_discretization(),
        true,
    );
    let old_n_arcs = g.num_arcs();

    // flat node 2 has no outgoing arcs, and no travel arc arrives at time 5 or later: only the
    // holding chain grows.
    g.refine(n(2), 5);
    assert_eq!(g.times(n(2)), &[0, 2, 3, 5]);
    assert_eq!(g.num_arcs(), old_n_arcs + 1);
    assert_eq!(arcs_between(&g, (2, 3), (2, 5)), 1);

    check_consistency(&g);
}

#[test]
fn test_refining_unrelaxed_discretization() {
    let ins = tiny_instance();
    let mut g = DiscretizedGraph::new(
        &ins.flat_graph,
        regular_discretization(3, 2, 2),
        false,
    );

    // all travel times are 1, so every travel arc rounds up to the next grid point, and all
    // arcs departing at time 2 leave the horizon
    assert_eq!(g.num_nodes(), 6);
    assert_eq!(g.num_arcs(), 3 + 3);
    assert_eq!(arcs_between(&g, (0, 0), (1, 2)), 1);

    g.refine(n(1), 1);

    // the arc (0, 0) -> (1, 2) arrives at time 1 and is shortened to the new node, and the new
    // node reaches (2, 2) exactly at the grid point
    assert_eq!(g.num_nodes(), 7);
    assert_eq!(g.num_arcs(), 8);
    let arcs = timed_arcs(&g);
    assert!(!arcs.contains(&((0, 0), (1, 2))));
    for added in [
        ((0, 0), (1, 1)),
        ((1, 1), (2, 2)),
        ((1, 0), (1, 1)),
        ((1, 1), (1, 2)),
    ] {
        assert_eq!(arcs_between(&g, added.0, added.1), 1);
    }

    check_consistency(&g);
}

#[test]
#[should_panic(expected = "already exists")]
fn test_refining_existing_time_point_panics() {
    let ins = tiny_instance();
    let mut g = DiscretizedGraph::new(
        &ins.flat_graph,
        tiny_initial_relaxed_discretization(),
        true,
    );
    g.refine(n(2), 2);
}

#[test]
#[should_panic(expected = "no time point before")]
fn test_refining_before_first_time_point_panics() {
    let ins = tiny_instance();
    let mut g = DiscretizedGraph::new(
        &ins.flat_graph,
        tiny_initial_relaxed_discretization(),
        true,
    );
    g.refine(n(0), -1);
}
