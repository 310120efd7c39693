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

//! # sandglass: Dynamic Discretization Discovery for service network design
//!
//! This crate solves the capacitated service network design problem with time windows: given a
//! physical transportation network and a set of commodities with release times and deadlines,
//! jointly decide which timed vehicle services to operate and how to route the commodities over
//! them, minimizing fixed vehicle costs plus per-unit flow costs.
//!
//! Discretizing time at a fine uniform grid makes the resulting integer program intractable.
//! Instead, this crate implements the Dynamic Discretization Discovery scheme of Boland et al.:
//!
//! ```bibtex
//! @ARTICLE{boland2017continuous,
//!     year = {2017},
//!     journal = {Operations Research},
//!     volume = {65},
//!     number = {5},
//!     author = {Boland, Natashia and Hewitt, Mike and Marshall, Luke and Savelsbergh, Martin},
//!     title = {The Continuous-Time Service Network Design Problem},
//!     doi = {10.1287/opre.2017.1624}
//! }
//! ```
//!
//! The engine maintains a coarse, per-node set of time points, solves a *relaxed* design model
//! over the induced time-expanded graph (a lower bound, since arrival times are rounded down),
//! and asks an auxiliary *identification* model whether the relaxed solution can be implemented
//! in continuous time. If not, the time points realized by the offending services are inserted
//! into the discretization, and the loop repeats. The lower bound grows monotonically, and the
//! loop terminates since all inserted time points stem from a finite set.
//!
//! ## Structure
//! The source code of this crate is structured as follows:
//! - The module [`instance`] defines the flat network and the commodities ([`Instance`]) and
//!   reads and writes `.dow` instance files.
//! - The module [`expansion`] contains the time-expanded graph
//!   ([`expansion::DiscretizedGraph`]) with its incremental refinement operator, the heart of
//!   the scheme.
//! - The module [`solver`] contains the design/flow model, the identification model, and the
//!   fixed-point drivers [`solve_snd`] and [`solve_csnd`].
//! - The module [`solution`] defines the resulting timed services and commodity paths
//!   ([`Solution`]).

#![deny(
    missing_docs,
    clippy::missing_docs_in_private_items,
    missing_debug_implementations,
    rust_2018_idioms
)]

pub mod expansion;
pub mod instance;
pub mod solution;
pub mod solver;
#[cfg(test)]
mod test;

pub use instance::Instance;
pub use solution::Solution;
pub use solver::{solve_csnd, solve_snd, SndError};
