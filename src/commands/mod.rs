// vzprune applies retention policies to vzdump backup archives
// Copyright (C) 2025  Javier Lancha Vázquez <javier.lancha@gmail.com>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use anyhow::Result;
use clap::{ArgGroup, Parser};

use crate::global;

pub mod cmd_prune;

// CLI arguments
#[derive(Parser, Debug)]
#[clap(
    version = env!("CARGO_PKG_VERSION"), // Version from crate metadata
    about = "Applies a retention policy to vzdump backup archives",
)]
pub struct Cli {
    #[clap(flatten)]
    pub args: cmd_prune::CmdArgs,

    // Global arguments
    #[clap(flatten)]
    pub global_args: GlobalArgs,
}

#[derive(Parser, Debug)]
#[clap(group = ArgGroup::new("verbosity_group").multiple(false))]
pub struct GlobalArgs {
    /// Disable logging (verbosity = 0)
    #[clap(long, value_parser, group = "verbosity_group")]
    pub quiet: bool,

    /// Set the verbosity level [0-3]
    #[clap(short = 'v', long, value_parser, group = "verbosity_group")]
    pub verbosity: Option<u32>,
}

pub fn run(args: &Cli) -> Result<()> {
    global::set_global_opts_with_args(&args.global_args);
    cmd_prune::run(&args.global_args, &args.args).map(|_report| ())
}
