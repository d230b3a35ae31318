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

//! Helpers shared by unit and integration tests.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;

use crate::{
    backend::RemoteTransport,
    catalog::filename::format_timestamp,
    error::{self, RetentionError},
    global::defaults::{BACKUP_MARKER, MANIFEST_EXTENSION},
};

/// Creates the manifest and the given payload files of a backup occasion.
///
/// `entity` is the key as it appears in filenames, e.g. `qemu-101`. Every file contains
/// its own name so that moved or uploaded copies can be told apart.
pub fn create_backup(
    dir: &Path,
    entity: &str,
    timestamp: &NaiveDateTime,
    payload_extensions: &[&str],
) -> Result<Vec<PathBuf>> {
    let stem = format!("{}-{}-{}", BACKUP_MARKER, entity, format_timestamp(timestamp));

    let mut paths = Vec::new();
    for extension in std::iter::once(MANIFEST_EXTENSION).chain(payload_extensions.iter().copied())
    {
        let path = dir.join(format!("{stem}.{extension}"));
        std::fs::write(&path, path.to_string_lossy().as_bytes())
            .with_context(|| format!("Failed to create test backup file {path:?}"))?;
        paths.push(path);
    }

    Ok(paths)
}

/// Names of the files directly inside a directory, sorted.
pub fn list_names(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        names.push(entry?.file_name().to_string_lossy().to_string());
    }
    names.sort();
    Ok(names)
}

/// A remote transport that keeps uploads in memory.
#[derive(Debug, Default)]
pub struct MockTransport {
    /// `(remote path, contents)` of every confirmed upload.
    pub uploads: Vec<(PathBuf, Vec<u8>)>,
    /// Number of `put` calls, successful or not.
    pub put_calls: usize,
    /// Number of `close` calls.
    pub close_calls: usize,
    /// Number of uploads that succeed before every further one fails.
    fail_after: Option<usize>,
    connected: bool,
}

impl MockTransport {
    /// A transport in the connected state.
    pub fn connected() -> Self {
        Self {
            connected: true,
            ..Default::default()
        }
    }

    /// A connected transport whose uploads always fail.
    pub fn failing() -> Self {
        Self::failing_after(0)
    }

    /// A connected transport that accepts `successes` uploads and fails the rest.
    pub fn failing_after(successes: usize) -> Self {
        Self {
            connected: true,
            fail_after: Some(successes),
            ..Default::default()
        }
    }
}

impl RemoteTransport for MockTransport {
    fn put(&mut self, local_path: &Path, remote_dir: &Path) -> error::Result<u64> {
        self.put_calls += 1;

        if !self.connected {
            return Err(RetentionError::InvalidSessionState {
                operation: "upload through",
                state: "closed",
            });
        }

        let transfer_failed = |reason: String| RetentionError::RemoteTransferFailed {
            path: local_path.to_path_buf(),
            remote_dir: remote_dir.to_path_buf(),
            reason,
        };

        if self.fail_after.is_some_and(|successes| self.uploads.len() >= successes) {
            return Err(transfer_failed("connection reset by peer".to_string()));
        }

        let contents = std::fs::read(local_path).map_err(|e| transfer_failed(e.to_string()))?;
        let name = local_path
            .file_name()
            .ok_or_else(|| transfer_failed("path has no file name".to_string()))?;
        let size = contents.len() as u64;
        self.uploads.push((remote_dir.join(name), contents));
        Ok(size)
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn close(&mut self) {
        self.close_calls += 1;
        self.connected = false;
    }
}
