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

use std::{
    io,
    ops::AddAssign,
    path::{Path, PathBuf},
};

use chrono::NaiveDateTime;

use crate::{
    backend::{RemoteTransport, StorageBackend},
    catalog::{EntityKey, filename::occasion_prefix},
    error::{Result, RetentionError},
    global::defaults::MANIFEST_EXTENSION,
    ui, utils,
};

/// Whether disposals actually happen or are only reported.
///
/// Passed explicitly to every disposal call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Live,
    DryRun,
}

impl RunMode {
    pub fn from_dry_run(dry_run: bool) -> Self {
        if dry_run { RunMode::DryRun } else { RunMode::Live }
    }

    #[inline]
    pub fn is_live(self) -> bool {
        self == RunMode::Live
    }

    #[inline]
    pub fn is_dry_run(self) -> bool {
        self == RunMode::DryRun
    }
}

/// What happens to the files of a disposed backup. Chosen once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisposalAction {
    Delete,
    /// Move into a local archive directory.
    MoveLocal(PathBuf),
    /// Upload into a directory of the remote host, then delete the local copy.
    UploadThenDelete(PathBuf),
}

impl DisposalAction {
    pub fn select(archive_dir: Option<&Path>, remote_configured: bool) -> Self {
        match (archive_dir, remote_configured) {
            (None, _) => DisposalAction::Delete,
            (Some(dir), false) => DisposalAction::MoveLocal(dir.to_path_buf()),
            (Some(dir), true) => DisposalAction::UploadThenDelete(dir.to_path_buf()),
        }
    }
}

impl std::fmt::Display for DisposalAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisposalAction::Delete => write!(f, "delete"),
            DisposalAction::MoveLocal(dir) => write!(f, "move to {}", dir.display()),
            DisposalAction::UploadThenDelete(dir) => {
                write!(f, "upload to remote {} and delete", dir.display())
            }
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DisposalStats {
    pub files: usize,
    pub bytes: u64,
}

impl AddAssign for DisposalStats {
    fn add_assign(&mut self, other: Self) {
        self.files += other.files;
        self.bytes += other.bytes;
    }
}

/// Applies the run's disposal action to the files of backup occasions.
pub struct Disposer<'a> {
    backup_dir: &'a Path,
    backend: &'a dyn StorageBackend,
    transport: &'a mut dyn RemoteTransport,
    action: DisposalAction,
}

impl<'a> Disposer<'a> {
    pub fn new(
        backup_dir: &'a Path,
        backend: &'a dyn StorageBackend,
        transport: &'a mut dyn RemoteTransport,
        action: DisposalAction,
    ) -> Self {
        Self {
            backup_dir,
            backend,
            transport,
            action,
        }
    }

    /// Fails with `ArchiveTargetUnwritable` if the local archive directory cannot take
    /// new files. A dry run only checks that the directory exists.
    pub fn check_target(&self, mode: RunMode) -> Result<()> {
        let DisposalAction::MoveLocal(dest) = &self.action else {
            return Ok(());
        };

        let check = match mode {
            RunMode::Live => self.backend.check_writable_dir(dest),
            RunMode::DryRun if self.backend.is_dir(dest) => Ok(()),
            RunMode::DryRun => Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                "not a directory",
            )),
        };

        check.map_err(|e| RetentionError::ArchiveTargetUnwritable {
            path: dest.clone(),
            reason: e.to_string(),
        })
    }

    /// Lists every file that belongs to a backup occasion: the payload files that share
    /// its prefix, then the manifest.
    ///
    /// The manifest comes last so that an aborted disposal leaves a set that the next
    /// scan still catalogs.
    pub fn resolve_files(
        &self,
        entity: &EntityKey,
        timestamp: &NaiveDateTime,
    ) -> Result<Vec<PathBuf>> {
        let prefix = occasion_prefix(entity, timestamp);

        let entries = self.backend.read_dir(self.backup_dir).map_err(|source| {
            RetentionError::DirectoryUnreadable {
                path: self.backup_dir.to_path_buf(),
                source,
            }
        })?;

        let mut files: Vec<PathBuf> = entries
            .into_iter()
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with(&prefix))
            })
            .filter(|path| self.backend.is_file(path))
            .collect();
        files.sort();
        // Stable: payload files keep their name order.
        files.sort_by_key(|path| is_manifest(path));

        Ok(files)
    }

    /// Disposes of every file of one backup occasion.
    pub fn dispose_occasion(
        &mut self,
        entity: &EntityKey,
        timestamp: &NaiveDateTime,
        mode: RunMode,
    ) -> Result<DisposalStats> {
        let files = self.resolve_files(entity, timestamp)?;
        ui::cli::verbose_2!(
            "Backup {} of {} has {}",
            crate::catalog::filename::format_timestamp(timestamp),
            entity,
            utils::format_count(files.len(), "file", "files")
        );

        let mut stats = DisposalStats::default();
        for path in &files {
            stats.bytes += self.dispose_file(path, mode)?;
            stats.files += 1;
        }

        Ok(stats)
    }

    /// Disposes of a single file and returns its size.
    ///
    /// In `RunMode::DryRun` the action is only logged.
    pub fn dispose_file(&mut self, path: &Path, mode: RunMode) -> Result<u64> {
        let size = self
            .backend
            .file_size(path)
            .map_err(|source| RetentionError::LocalDisposalFailed {
                action: "stat",
                path: path.to_path_buf(),
                source,
            })?;

        let verb = |live: &str, dry: &str| match mode {
            RunMode::Live => live.to_string(),
            RunMode::DryRun => format!("{} {}", ui::cli::dry_run_tag(), dry),
        };

        match &self.action {
            DisposalAction::Delete => {
                ui::cli::log!("{} {}", verb("Removing", "Would remove"), path.display());
                if mode.is_live() {
                    self.remove_local(path)?;
                }
            }
            DisposalAction::MoveLocal(dest) => {
                let target = target_path(path, dest)?;
                ui::cli::log!(
                    "{} {} -> {}",
                    verb("Moving", "Would move"),
                    path.display(),
                    target.display()
                );
                if mode.is_live() {
                    self.move_local(path, dest, &target)?;
                }
            }
            DisposalAction::UploadThenDelete(dest) => {
                let target = target_path(path, dest)?;
                ui::cli::log!(
                    "{} {} -> remote:{} ({})",
                    verb("Uploading", "Would upload"),
                    path.display(),
                    target.display(),
                    utils::format_size(size)
                );
                if mode.is_live() {
                    // The local copy goes away only once the upload is confirmed.
                    self.transport.put(path, dest)?;
                    self.remove_local(path)?;
                }
            }
        }

        Ok(size)
    }

    fn remove_local(&self, path: &Path) -> Result<()> {
        self.backend
            .remove_file(path)
            .map_err(|source| RetentionError::LocalDisposalFailed {
                action: "remove",
                path: path.to_path_buf(),
                source,
            })
    }

    fn move_local(&self, path: &Path, dest: &Path, target: &Path) -> Result<()> {
        let unwritable = |e: io::Error| RetentionError::ArchiveTargetUnwritable {
            path: dest.to_path_buf(),
            reason: format!("failed to move {}: {}", path.display(), e),
        };

        // rename(2) silently replaces an existing target.
        if self.backend.is_file(target) || self.backend.is_dir(target) {
            return Err(RetentionError::ArchiveTargetUnwritable {
                path: dest.to_path_buf(),
                reason: format!("{} already exists", target.display()),
            });
        }

        match self.backend.rename(path, target) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
                ui::cli::verbose_2!("{} is on another filesystem, copying", dest.display());
                if let Err(e) = self.backend.copy(path, target) {
                    // Best effort: the source is still intact.
                    let _ = self.backend.remove_file(target);
                    return Err(unwritable(e));
                }
                self.remove_local(path)
            }
            Err(e) if !self.backend.is_file(path) => Err(RetentionError::LocalDisposalFailed {
                action: "move",
                path: path.to_path_buf(),
                source: e,
            }),
            Err(e) => Err(unwritable(e)),
        }
    }
}

fn is_manifest(path: &Path) -> bool {
    path.extension()
        .is_some_and(|extension| extension == MANIFEST_EXTENSION)
}

/// Path of `path` once placed in `dest_dir`.
fn target_path(path: &Path, dest_dir: &Path) -> Result<PathBuf> {
    path.file_name()
        .map(|name| dest_dir.join(name))
        .ok_or_else(|| RetentionError::LocalDisposalFailed {
            action: "dispose of",
            path: path.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"),
        })
}
