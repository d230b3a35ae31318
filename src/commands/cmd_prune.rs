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

use std::{path::PathBuf, time::Instant};

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use colored::Colorize;

use super::GlobalArgs;
use crate::{
    backend::{self, localfs::LocalFS},
    config::RunConfig,
    engine::{self, RunReport},
    global::defaults::{ALL_ENTITIES, DEFAULT_SSH_PORT, DEFAULT_SSH_USER},
    retention::SystemClock,
    ui, utils,
};

#[derive(Parser, Debug)]
#[clap(group = ArgGroup::new("policy").required(true).multiple(false))]
pub struct CmdArgs {
    /// Directory that holds the backups.
    #[arg(short = 'd', long, value_parser)]
    pub dumpdir: PathBuf,

    /// Move disposed backups here instead of deleting them. With --host, the directory
    /// on the remote host.
    #[arg(short = 'a', long, value_parser)]
    pub archive_dir: Option<PathBuf>,

    /// Upload disposed backups to this host over SFTP. Requires --archive-dir.
    #[arg(long)]
    pub host: Option<String>,

    /// SSH port of the remote host.
    #[arg(long, default_value_t = DEFAULT_SSH_PORT)]
    pub port: u16,

    /// User on the remote host.
    #[arg(short = 'u', long, default_value = DEFAULT_SSH_USER)]
    pub user: String,

    /// SSH private key
    #[arg(long, value_parser)]
    pub private_key: Option<PathBuf>,

    /// SSH public key
    #[arg(long, value_parser)]
    pub public_key: Option<PathBuf>,

    /// Expected host key of the remote host (base64 key or SHA256 fingerprint).
    #[arg(long)]
    pub host_key: Option<String>,

    /// Path to a file to read the remote password. Prompted if no credential is given.
    #[arg(short = 'p', long, value_parser)]
    pub password_file: Option<PathBuf>,

    /// Only process these VM or container ids. Repeatable or comma separated;
    /// 'all' selects every entity.
    #[arg(long = "vmid", value_delimiter = ',', default_value = ALL_ENTITIES)]
    pub vmids: Vec<String>,

    /// Dispose of backups older than this many days.
    #[arg(long, allow_negative_numbers = true, group = "policy")]
    pub max_age: Option<i64>,

    /// Keep only this many backups of each VM or container.
    #[arg(long, allow_negative_numbers = true, group = "policy")]
    pub max_count: Option<i64>,

    /// Perform a dry run: show which backups would be disposed of without touching them.
    #[arg(long)]
    pub dry_run: bool,
}

pub fn run(_global_args: &GlobalArgs, args: &CmdArgs) -> Result<RunReport> {
    let start = Instant::now();

    let config = RunConfig::from_args(args).with_context(|| "Invalid configuration")?;
    let action = config.disposal_action();

    if config.mode.is_dry_run() {
        ui::cli::log!("{} Nothing will be modified", ui::cli::dry_run_tag());
    }
    ui::cli::log!(
        "Applying {} to {} (entities: {}, action: {})",
        config.policy.to_string().bold(),
        config.backup_dir.display(),
        config.entity_filter,
        action
    );

    let mut transport = backend::open_transport(config.remote.as_ref(), &action, config.mode)
        .with_context(|| "Failed to open the remote session")?;

    let result = engine::execute(&config, &LocalFS::new(), transport.as_mut(), &SystemClock);
    transport.close();
    let report = result.with_context(|| {
        format!(
            "Retention run on {} aborted",
            config.backup_dir.display()
        )
    })?;

    let backups = utils::format_count(report.disposed, "backup", "backups");
    let size = utils::format_size(report.bytes);
    if config.mode.is_live() {
        ui::cli::log!("Removed {} ({}), kept {}", backups, size, report.kept);
    } else {
        ui::cli::log!("This would remove {} ({}), keep {}", backups, size, report.kept);
    }
    ui::cli::verbose_1!(
        "Finished in {}",
        utils::pretty_print_duration(start.elapsed())
    );

    Ok(report)
}
