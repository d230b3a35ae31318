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

use chrono::NaiveDateTime;

use crate::{
    backend::{RemoteTransport, StorageBackend},
    catalog::{self, EntityKey, filename::format_timestamp},
    config::RunConfig,
    disposal::{DisposalStats, Disposer},
    error::Result,
    retention::{self, Clock},
    ui, utils,
};

/// What a run did, or would have done in a dry run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub entities: usize,
    pub kept: usize,
    pub disposed: usize,
    pub files: usize,
    pub bytes: u64,
}

/// Applies the retention policy of `config` to its backup directory.
///
/// The whole catalog is built and evaluated before the first file is touched, so a
/// malformed filename or an invalid policy never leaves a half-processed directory.
/// Any disposal error aborts the rest of the run. Disposals that already happened are
/// not rolled back.
pub fn execute(
    config: &RunConfig,
    backend: &dyn StorageBackend,
    transport: &mut dyn RemoteTransport,
    clock: &dyn Clock,
) -> Result<RunReport> {
    config.policy.validate()?;

    let catalog = catalog::build_catalog(backend, &config.backup_dir, &config.entity_filter)?;

    let mut report = RunReport {
        entities: catalog.num_entities(),
        ..Default::default()
    };
    let mut plan: Vec<(&EntityKey, Vec<NaiveDateTime>)> = Vec::new();

    for (entity, timestamps) in catalog.groups() {
        let decision = retention::evaluate(timestamps, &config.policy, clock)?;

        ui::cli::log!(
            "{}: keeping {}, disposing of {}",
            entity,
            decision.keep.len(),
            decision.dispose.len()
        );
        for timestamp in &decision.keep {
            ui::cli::verbose_1!("  keep {}", format_timestamp(timestamp));
        }

        report.kept += decision.keep.len();
        if !decision.dispose.is_empty() {
            plan.push((entity, decision.dispose));
        }
    }

    if plan.is_empty() {
        return Ok(report);
    }

    let mut disposer = Disposer::new(
        &config.backup_dir,
        backend,
        transport,
        config.disposal_action(),
    );
    disposer.check_target(config.mode)?;

    let mut totals = DisposalStats::default();
    for (entity, timestamps) in plan {
        for timestamp in &timestamps {
            totals += disposer.dispose_occasion(entity, timestamp, config.mode)?;
            report.disposed += 1;
        }
    }
    report.files = totals.files;
    report.bytes = totals.bytes;

    ui::cli::verbose_1!(
        "Disposed of {} ({})",
        utils::format_count(report.files, "file", "files"),
        utils::format_size(report.bytes)
    );

    Ok(report)
}
