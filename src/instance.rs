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

//! The problem instance: the flat (physical) network and the commodities that must be routed over
//! it, together with reading and writing of `.dow` instance files.
//!
//! All times are converted to integer multiples of the base discretization step `delta_t` when an
//! instance is read. Lower bounds (release times, travel times) are rounded up, upper bounds
//! (deadlines) are rounded down, so that any schedule feasible for the integer times is feasible
//! for the original continuous times.

use std::{fmt::Write, path::Path};

use petgraph::graph::{DiGraph, NodeIndex};
use thiserror::Error;

/// The flat (time-independent) network.
pub type FlatGraph = DiGraph<NodeData, ArcData>;

/// Data attached to a node of the flat graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeData {
    /// External name of the node, as it appears in the instance file.
    pub name: String,
}

/// Data attached to an arc, both in the flat graph and in the time-expanded graph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArcData {
    /// Time to traverse the arc, in multiples of `delta_t`.
    pub travel_time: i64,
    /// Cost per unit of flow per traversal.
    pub flow_cost: f64,
    /// Cost per vehicle operating the arc.
    pub fixed_cost: f64,
    /// Capacity of a single vehicle. `None` exactly on holding arcs, which can store an unlimited
    /// amount of flow at a node between two consecutive time points.
    pub capacity: Option<f64>,
}

impl ArcData {
    /// Create the data of a holding arc: zero times and costs, undefined capacity.
    pub fn holding() -> Self {
        Self {
            travel_time: 0,
            flow_cost: 0.0,
            fixed_cost: 0.0,
            capacity: None,
        }
    }

    /// Whether this arc is a holding arc. Holding arcs carry no capacity.
    pub fn is_holding(&self) -> bool {
        self.capacity.is_none()
    }
}

/// A commodity that must be shipped from its source to its sink within its time window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Commodity {
    /// Index of the commodity in [`Instance::commodities`].
    pub id: usize,
    /// Source node in the flat graph.
    pub source_node: NodeIndex,
    /// Sink node in the flat graph.
    pub sink_node: NodeIndex,
    /// Amount of flow to ship.
    pub quantity: f64,
    /// Earliest departure time at the source, in multiples of `delta_t`.
    pub release: i64,
    /// Latest arrival time at the sink, in multiples of `delta_t`.
    pub deadline: i64,
}

/// A complete problem instance. Immutable after loading.
#[derive(Debug, Clone)]
pub struct Instance {
    /// The flat network.
    pub flat_graph: FlatGraph,
    /// All commodities, ordered by their `id`.
    pub commodities: Vec<Commodity>,
}

/// Error while reading an instance file.
#[derive(Debug, Error)]
pub enum InstanceError {
    /// The file could not be read.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// The file content is malformed.
    #[error("parse error on line {line}: {reason}")]
    Parse {
        /// 1-based line number at which parsing failed.
        line: usize,
        /// Description of what went wrong.
        reason: String,
    },
}

impl Instance {
    /// Read an instance in the modified dow format, converting all times to integer multiples of
    /// `delta_t`.
    ///
    /// The format is plain text, one record per line: a header comment, a line with the number of
    /// nodes, arcs and commodities, one line per arc
    /// (`<i> <j> <flow_cost> <capacity> <fixed_cost> <travel_time>`), and one line per commodity
    /// (`<source> <sink> <quantity> <release> <deadline>`). Node ids are 1-based in the file.
    pub fn from_dow_file(path: impl AsRef<Path>, delta_t: f64) -> Result<Self, InstanceError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_dow_str(&content, delta_t)
    }

    /// Parse an instance in the modified dow format from a string. See [`Instance::from_dow_file`].
    pub fn from_dow_str(content: &str, delta_t: f64) -> Result<Self, InstanceError> {
        let mut lines = content.lines().enumerate();

        // the first line is a header comment
        let _ = next_line(&mut lines, "header")?;

        let (line_no, counts) = next_line(&mut lines, "size header")?;
        let mut counts = counts.split_whitespace();
        let n_nodes: usize = parse_field(counts.next(), line_no, "number of nodes")?;
        let n_arcs: usize = parse_field(counts.next(), line_no, "number of arcs")?;
        let n_commodities: usize = parse_field(counts.next(), line_no, "number of commodities")?;

        let mut flat_graph = FlatGraph::with_capacity(n_nodes, n_arcs);
        for i in 0..n_nodes {
            flat_graph.add_node(NodeData {
                name: (i + 1).to_string(),
            });
        }

        for _ in 0..n_arcs {
            let (line_no, line) = next_line(&mut lines, "arc")?;
            let mut fields = line.split_whitespace();
            let i: usize = parse_field(fields.next(), line_no, "arc tail")?;
            let j: usize = parse_field(fields.next(), line_no, "arc head")?;
            let flow_cost: f64 = parse_field(fields.next(), line_no, "flow cost")?;
            let capacity: f64 = parse_field(fields.next(), line_no, "capacity")?;
            let fixed_cost: f64 = parse_field(fields.next(), line_no, "fixed cost")?;
            let travel_time: f64 = parse_field(fields.next(), line_no, "travel time")?;
            let (i, j) = (node_id(i, n_nodes, line_no)?, node_id(j, n_nodes, line_no)?);
            flat_graph.add_edge(
                i,
                j,
                ArcData {
                    travel_time: (travel_time / delta_t).ceil() as i64,
                    flow_cost,
                    fixed_cost,
                    capacity: Some(capacity),
                },
            );
        }

        let mut commodities = Vec::with_capacity(n_commodities);
        for _ in 0..n_commodities {
            let (line_no, line) = next_line(&mut lines, "commodity")?;
            let mut fields = line.split_whitespace();
            let source: usize = parse_field(fields.next(), line_no, "source node")?;
            let sink: usize = parse_field(fields.next(), line_no, "sink node")?;
            let quantity: f64 = parse_field(fields.next(), line_no, "quantity")?;
            let release: f64 = parse_field(fields.next(), line_no, "release time")?;
            let deadline: f64 = parse_field(fields.next(), line_no, "deadline")?;
            commodities.push(Commodity {
                id: commodities.len(),
                source_node: node_id(source, n_nodes, line_no)?,
                sink_node: node_id(sink, n_nodes, line_no)?,
                quantity,
                release: (release / delta_t).ceil() as i64,
                deadline: (deadline / delta_t).floor() as i64,
            });
        }

        Ok(Self {
            flat_graph,
            commodities,
        })
    }

    /// Write the instance back into the modified dow format, scaling all integer times by
    /// `delta_t`. Parsing the result with the same `delta_t` yields the identical instance.
    pub fn to_dow_string(&self, delta_t: f64) -> String {
        let g = &self.flat_graph;
        let mut out = String::new();
        writeln!(out, "timed instance (delta_t = {delta_t})").unwrap();
        writeln!(
            out,
            "{} {} {}",
            g.node_count(),
            g.edge_count(),
            self.commodities.len()
        )
        .unwrap();
        for arc in g.edge_indices() {
            let (i, j) = g.edge_endpoints(arc).expect("arc is in the graph");
            let data = &g[arc];
            let capacity = data.capacity.expect("flat arcs carry a capacity");
            writeln!(
                out,
                "{} {} {} {} {} {:.2}",
                g[i].name,
                g[j].name,
                data.flow_cost,
                capacity,
                data.fixed_cost,
                data.travel_time as f64 * delta_t,
            )
            .unwrap();
        }
        for com in &self.commodities {
            writeln!(
                out,
                "{} {} {} {:.2} {:.2}",
                g[com.source_node].name,
                g[com.sink_node].name,
                com.quantity,
                com.release as f64 * delta_t,
                com.deadline as f64 * delta_t,
            )
            .unwrap();
        }
        out
    }
}

/// Take the next line of the file, or fail with a message naming the missing record.
fn next_line<'a>(
    lines: &mut impl Iterator<Item = (usize, &'a str)>,
    expected: &str,
) -> Result<(usize, &'a str), InstanceError> {
    match lines.next() {
        Some((idx, line)) => Ok((idx + 1, line)),
        None => Err(InstanceError::Parse {
            line: 0,
            reason: format!("unexpected end of file, expected a {expected} record"),
        }),
    }
}

/// Parse a single whitespace-separated field, or fail with the line number and field name.
fn parse_field<T: std::str::FromStr>(
    field: Option<&str>,
    line: usize,
    what: &str,
) -> Result<T, InstanceError> {
    field
        .ok_or_else(|| InstanceError::Parse {
            line,
            reason: format!("missing field: {what}"),
        })?
        .parse()
        .map_err(|_| InstanceError::Parse {
            line,
            reason: format!("invalid {what}"),
        })
}

/// Convert a 1-based node id from the file into a [`NodeIndex`], checking its range.
fn node_id(id: usize, n_nodes: usize, line: usize) -> Result<NodeIndex, InstanceError> {
    if id == 0 || id > n_nodes {
        Err(InstanceError::Parse {
            line,
            reason: format!("node id {id} out of range 1..={n_nodes}"),
        })
    } else {
        Ok(NodeIndex::new(id - 1))
    }
}
