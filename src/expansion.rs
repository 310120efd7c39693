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

//! The time-expanded graph and its incremental refinement.
//!
//! A [`DiscretizedGraph`] is the product of the flat network with a per-node list of discrete time
//! points. Its nodes are pairs `(v, t)`. Consecutive time points of the same flat node are linked
//! by *holding arcs* (zero cost, zero time, no capacity). Every flat arc is mirrored by one
//! *travel arc* per departure node, whose arrival node depends on the mode:
//!
//! - In *relaxed* mode, the arrival time is rounded **down** to the latest time point of the head
//!   node that is not later than the true arrival. Travel arcs may therefore be shorter than
//!   physically possible, and the induced design problem is a lower bound (a relaxation) of the
//!   fully discretized problem.
//! - In *non-relaxed* mode, the arrival time is exact or rounded **up** to the next available time
//!   point. Arcs that would leave the time horizon are omitted.
//!
//! The relaxation is tightened by [`DiscretizedGraph::refine`], which inserts a single new time
//! point and locally rewires the holding chain and the affected travel arcs. All arc edits keep
//! the flat-to-expanded index maps synchronized, so model builders can iterate over the expanded
//! copies of a flat arc at any time.

use std::collections::BTreeSet;

use petgraph::{
    graph::{EdgeIndex, NodeIndex},
    stable_graph::StableDiGraph,
    visit::EdgeRef,
    Direction,
};

use crate::instance::{ArcData, Commodity, FlatGraph};

/// A node of the time-expanded graph: a flat node paired with a time point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimedNode {
    /// The flat node this timed node is a copy of.
    pub flat_node: NodeIndex,
    /// The time point of this copy, in multiples of `delta_t`.
    pub time: i64,
}

/// The time-expanded graph over a flat network, together with the per-node time points and the
/// maps from flat nodes and arcs to their expanded copies.
#[derive(Debug)]
pub struct DiscretizedGraph<'a> {
    /// The expanded graph itself. A stable graph, so that arc indices survive the removals
    /// performed during refinement.
    graph: StableDiGraph<TimedNode, ArcData>,
    /// The flat network the expansion is built from.
    flat: &'a FlatGraph,
    /// For each flat node (by index), the strictly increasing list of its time points.
    node_to_times: Vec<Vec<i64>>,
    /// For each flat node (by index), its timed copies in the order of `node_to_times`.
    flat_to_expanded_nodes: Vec<Vec<NodeIndex>>,
    /// For each flat arc (by index), all its travel-arc copies.
    flat_to_expanded_arcs: Vec<Vec<EdgeIndex>>,
    /// Whether arrival times are rounded down (relaxed) or up (non-relaxed).
    relaxed: bool,
}

impl<'a> DiscretizedGraph<'a> {
    /// Build the time-expanded graph for the given per-node time points.
    ///
    /// `node_to_times` must contain one strictly increasing, non-empty list per flat node.
    pub fn new(flat: &'a FlatGraph, node_to_times: Vec<Vec<i64>>, relaxed: bool) -> Self {
        assert_eq!(
            node_to_times.len(),
            flat.node_count(),
            "one time point list per flat node"
        );
        let mut g = Self {
            graph: StableDiGraph::default(),
            flat,
            node_to_times,
            flat_to_expanded_nodes: vec![Vec::new(); flat.node_count()],
            flat_to_expanded_arcs: vec![Vec::new(); flat.edge_count()],
            relaxed,
        };
        g.add_timed_nodes();
        g.add_holding_arcs();
        g.add_travel_arcs();
        g
    }

    /// Add one timed node per flat node and time point, in time order.
    fn add_timed_nodes(&mut self) {
        for flat_node in self.flat.node_indices() {
            for &time in &self.node_to_times[flat_node.index()] {
                let timed = self.graph.add_node(TimedNode { flat_node, time });
                self.flat_to_expanded_nodes[flat_node.index()].push(timed);
            }
        }
    }

    /// Link consecutive timed copies of each flat node with a holding arc.
    fn add_holding_arcs(&mut self) {
        for flat_node in self.flat.node_indices() {
            let copies = &self.flat_to_expanded_nodes[flat_node.index()];
            for k in 1..copies.len() {
                self.graph
                    .add_edge(copies[k - 1], copies[k], ArcData::holding());
            }
        }
    }

    /// Mirror every flat arc by one travel arc per departure node.
    ///
    /// For each flat arc `(u, w)`, the sorted departure nodes of `u` are swept once while a
    /// pointer into the sorted arrival nodes of `w` advances monotonically, which makes the
    /// construction `O(|T(u)| + |T(w)|)` per flat arc.
    fn add_travel_arcs(&mut self) {
        for arc in self.flat.edge_indices() {
            let data = self.flat[arc];
            let (u, w) = self.flat.edge_endpoints(arc).expect("arc is in the graph");
            let starts = &self.flat_to_expanded_nodes[u.index()];
            let ends = &self.flat_to_expanded_nodes[w.index()];
            let mut j = 0;
            for &start in starts {
                let arrival = self.graph[start].time + data.travel_time;
                // find the latest arrival node whose time is not higher than the arrival time
                while j + 1 < ends.len() && self.graph[ends[j + 1]].time <= arrival {
                    j += 1;
                }
                let mut offset = 0;
                if !self.relaxed && self.graph[ends[j]].time != arrival {
                    // round up to the next time point, or omit the arc past the horizon
                    offset = 1;
                    if j + offset >= ends.len() {
                        continue;
                    }
                }
                let expanded = self.graph.add_edge(start, ends[j + offset], data);
                self.flat_to_expanded_arcs[arc.index()].push(expanded);
            }
        }
    }

    /// Insert the time point `time` at `flat_node` and locally rewire the graph.
    ///
    /// The time point must not yet exist, and a smaller time point must already be present.
    /// Violating either precondition indicates a bug in the caller and panics.
    pub fn refine(&mut self, flat_node: NodeIndex, time: i64) {
        let times = &self.node_to_times[flat_node.index()];
        let k = times.partition_point(|&t| t < time);
        assert!(
            k == times.len() || times[k] != time,
            "time point {time} already exists at flat node {}",
            flat_node.index()
        );
        assert!(
            k > 0,
            "no time point before {time} at flat node {}",
            flat_node.index()
        );

        let prev = self.flat_to_expanded_nodes[flat_node.index()][k - 1];
        // the node after the insertion point, if the new time point is not the latest one
        let next = self.flat_to_expanded_nodes[flat_node.index()].get(k).copied();

        self.node_to_times[flat_node.index()].insert(k, time);
        let new = self.graph.add_node(TimedNode { flat_node, time });
        self.flat_to_expanded_nodes[flat_node.index()].insert(k, new);

        self.refine_holding_arc(new, prev, next);
        self.add_travel_arcs_new_node(new);
        if self.relaxed {
            self.lengthen_travel_arcs(new, prev, time);
        } else if let Some(next) = next {
            self.shorten_travel_arcs(new, next, time);
        }
    }

    /// Splice the new node into the holding chain: `prev -> new`, and if a later time point
    /// exists, replace `prev -> next` by `new -> next`.
    fn refine_holding_arc(&mut self, new: NodeIndex, prev: NodeIndex, next: Option<NodeIndex>) {
        self.graph.add_edge(prev, new, ArcData::holding());
        if let Some(next) = next {
            let holding = self
                .graph
                .find_edge(prev, next)
                .expect("holding arc between consecutive time points");
            self.graph.remove_edge(holding);
            self.graph.add_edge(new, next, ArcData::holding());
        }
    }

    /// Add one outgoing travel arc from the new node per outgoing flat arc.
    fn add_travel_arcs_new_node(&mut self, new: NodeIndex) {
        let TimedNode { flat_node, time } = self.graph[new];
        let outgoing: Vec<(NodeIndex, EdgeIndex, ArcData)> = self
            .flat
            .edges(flat_node)
            .map(|e| (e.target(), e.id(), *e.weight()))
            .collect();
        for (head, flat_arc, data) in outgoing {
            let arrival = time + data.travel_time;
            let times = &self.node_to_times[head.index()];
            let copies = &self.flat_to_expanded_nodes[head.index()];
            // first time point of the head node that is no earlier than the arrival time
            let k = times.partition_point(|&t| t < arrival);
            let target = if self.relaxed {
                if k == times.len() {
                    // no later time point: round down to the last one
                    *copies.last().expect("every flat node has a time point")
                } else if times[k] == arrival {
                    copies[k]
                } else {
                    copies[k - 1]
                }
            } else if k == times.len() {
                // the arc would leave the time horizon
                continue;
            } else {
                copies[k]
            };
            let expanded = self.graph.add_edge(new, target, data);
            self.flat_to_expanded_arcs[flat_arc.index()].push(expanded);
        }
    }

    /// Relaxed mode: redirect to the new node every travel arc into `prev` whose true arrival
    /// time is no earlier than the new time point. The new point is the latest one not later
    /// than their arrival, so they must now round down to it.
    fn lengthen_travel_arcs(&mut self, new: NodeIndex, prev: NodeIndex, time: i64) {
        let ingoing: Vec<(NodeIndex, EdgeIndex, ArcData)> = self
            .graph
            .edges_directed(prev, Direction::Incoming)
            .map(|e| (e.source(), e.id(), *e.weight()))
            .collect();
        for (tail, arc, data) in ingoing {
            // skip holding arcs
            if self.graph[tail].flat_node == self.graph[prev].flat_node {
                continue;
            }
            let arrival = self.graph[tail].time + data.travel_time;
            if arrival >= time {
                self.redirect_travel_arc(arc, tail, new);
            }
        }
    }

    /// Non-relaxed mode: redirect to the new node every travel arc into `next` whose true
    /// arrival time lies in `[time, next.time)`. Those arcs were rounded up to `next` and the
    /// new point is now a tighter upper bound on their arrival.
    fn shorten_travel_arcs(&mut self, new: NodeIndex, next: NodeIndex, time: i64) {
        let next_time = self.graph[next].time;
        let ingoing: Vec<(NodeIndex, EdgeIndex, ArcData)> = self
            .graph
            .edges_directed(next, Direction::Incoming)
            .map(|e| (e.source(), e.id(), *e.weight()))
            .collect();
        for (tail, arc, data) in ingoing {
            // skip holding arcs
            if self.graph[tail].flat_node == self.graph[next].flat_node {
                continue;
            }
            let arrival = self.graph[tail].time + data.travel_time;
            if arrival >= time && arrival < next_time {
                self.redirect_travel_arc(arc, tail, new);
            }
        }
    }

    /// Replace the travel arc `arc` (leaving `tail`) by an arc from `tail` to `target`, keeping
    /// the flat-to-expanded arc map synchronized.
    fn redirect_travel_arc(&mut self, arc: EdgeIndex, tail: NodeIndex, target: NodeIndex) {
        let data = self.graph[arc];
        let flat_arc =
            self.flat_arc_between(self.graph[tail].flat_node, self.graph[target].flat_node);
        let copies = &mut self.flat_to_expanded_arcs[flat_arc.index()];
        let pos = copies
            .iter()
            .position(|&e| e == arc)
            .expect("travel arc is registered for its flat arc");
        copies.remove(pos);
        self.graph.remove_edge(arc);
        let new_arc = self.graph.add_edge(tail, target, data);
        self.flat_to_expanded_arcs[flat_arc.index()].push(new_arc);
    }

    /// Look up the flat arc between two flat nodes. The flat graph is simple, so there is at most
    /// one; a missing arc indicates an inconsistent expansion and panics.
    fn flat_arc_between(&self, tail: NodeIndex, head: NodeIndex) -> EdgeIndex {
        self.flat
            .find_edge(tail, head)
            .expect("flat arc between the endpoints of a travel arc")
    }

    /// The expanded graph.
    pub fn graph(&self) -> &StableDiGraph<TimedNode, ArcData> {
        &self.graph
    }

    /// The flat network the expansion was built from.
    pub fn flat(&self) -> &FlatGraph {
        self.flat
    }

    /// Whether the expansion rounds arrival times down (relaxed) or up.
    pub fn relaxed(&self) -> bool {
        self.relaxed
    }

    /// Number of timed nodes.
    pub fn num_nodes(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of arcs (holding and travel).
    pub fn num_arcs(&self) -> usize {
        self.graph.edge_count()
    }

    /// The strictly increasing time points of a flat node.
    pub fn times(&self, flat_node: NodeIndex) -> &[i64] {
        &self.node_to_times[flat_node.index()]
    }

    /// The timed copies of a flat node, in time order.
    pub fn expanded_nodes(&self, flat_node: NodeIndex) -> &[NodeIndex] {
        &self.flat_to_expanded_nodes[flat_node.index()]
    }

    /// All travel-arc copies of a flat arc.
    pub fn expanded_arcs(&self, flat_arc: EdgeIndex) -> &[EdgeIndex] {
        &self.flat_to_expanded_arcs[flat_arc.index()]
    }

    /// The timed node behind an index of the expanded graph.
    pub fn timed_node(&self, node: NodeIndex) -> &TimedNode {
        &self.graph[node]
    }

    /// The first timed copy of `flat_node` whose time is no earlier than `time`. Panics if no
    /// such copy exists.
    pub fn first_node_at_or_after(&self, flat_node: NodeIndex, time: i64) -> NodeIndex {
        let k = self.node_to_times[flat_node.index()].partition_point(|&t| t < time);
        self.flat_to_expanded_nodes[flat_node.index()][k]
    }
}

/// A uniform grid `0, delta_t, 2 * delta_t, ..` up to `last_time`, for every flat node.
pub fn regular_discretization(n_nodes: usize, last_time: i64, delta_t: i64) -> Vec<Vec<i64>> {
    (0..n_nodes)
        .map(|_| (0..=last_time / delta_t).map(|n| n * delta_t).collect())
        .collect()
}

/// The coarsest discretization for the relaxed expansion: time `0` everywhere, plus the release
/// time of every commodity at its source and the deadline at its sink.
pub fn relaxed_initial_discretization(n_nodes: usize, commodities: &[Commodity]) -> Vec<Vec<i64>> {
    let mut node_times: Vec<BTreeSet<i64>> = vec![BTreeSet::from([0]); n_nodes];
    for com in commodities {
        node_times[com.source_node.index()].insert(com.release);
        node_times[com.sink_node.index()].insert(com.deadline);
    }
    node_times
        .into_iter()
        .map(|times| times.into_iter().collect())
        .collect()
}
