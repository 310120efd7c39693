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

use clap::Parser;

use sandglass::{solve_csnd, solve_snd, Instance};

/// Solve a timed C instance with the given discretization.
#[derive(Debug, Parser)]
struct Cli {
    /// Number of the instance to solve.
    number: u32,
    /// Time discretization to use (in hours).
    delta_t: f64,
    /// Solve with the full uniform-discretization model instead of DDD.
    #[clap(short = 'f')]
    full_model: bool,
}

fn main() {
    pretty_env_logger::init_timed();

    let args = Cli::parse();
    let path = format!("instances/C_timed/c{}.dow", args.number);

    let ins = match Instance::from_dow_file(&path, args.delta_t) {
        Ok(ins) => ins,
        Err(e) => {
            eprintln!("could not read {path}: {e}");
            std::process::exit(2);
        }
    };

    let result = if args.full_model {
        solve_snd(&ins, 1)
    } else {
        solve_csnd(&ins)
    };

    match result {
        Ok(Some(sol)) => print!("{sol}"),
        Ok(None) => {
            println!("instance is infeasible for delta_t = {}", args.delta_t);
            std::process::exit(1);
        }
        Err(e) => panic!("optimization failed: {e}"),
    }
}
