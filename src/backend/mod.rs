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

pub mod localfs;
pub mod sftp;

use std::{
    io,
    path::{Path, PathBuf},
};

use crate::{
    config::RemoteConfig,
    disposal::{DisposalAction, RunMode},
    error::{Result, RetentionError},
};
use sftp::SftpTransport;

/// Abstraction of the local filesystem that holds the backups.
///
/// All the paths are absolute or relative to the working directory. Errors are
/// returned as plain `io::Error` so that callers can classify them.
pub trait StorageBackend {
    /// Lists all paths directly inside a directory.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;

    /// Returns true if the path is a regular file.
    fn is_file(&self, path: &Path) -> bool;

    /// Returns true if the path is a directory.
    fn is_dir(&self, path: &Path) -> bool;

    fn file_size(&self, path: &Path) -> io::Result<u64>;

    /// Removes a file.
    fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Renames a file. Fails with `ErrorKind::CrossesDevices` if both paths are not on
    /// the same filesystem.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Copies the contents of a file, returning the number of bytes copied.
    fn copy(&self, from: &Path, to: &Path) -> io::Result<u64>;

    /// Checks that new files can be created inside a directory.
    fn check_writable_dir(&self, path: &Path) -> io::Result<()>;
}

/// A file transfer session with the remote archive.
///
/// A run holds at most one transport and reuses it for every upload.
pub trait RemoteTransport {
    /// Uploads a local file into `remote_dir`, keeping its base name, and returns the
    /// number of bytes transferred.
    ///
    /// Returns `Ok` only once the remote copy is confirmed complete. On error the
    /// local file has not been touched.
    fn put(&mut self, local_path: &Path, remote_dir: &Path) -> Result<u64>;

    fn is_connected(&self) -> bool;

    /// Closes the session. Closing more than once is a no-op.
    fn close(&mut self);
}

/// The transport of runs that never upload: no remote host configured, or a dry run.
#[derive(Debug, Default)]
pub struct AbsentTransport;

impl RemoteTransport for AbsentTransport {
    fn put(&mut self, _local_path: &Path, _remote_dir: &Path) -> Result<u64> {
        Err(RetentionError::InvalidSessionState {
            operation: "upload through",
            state: "absent",
        })
    }

    fn is_connected(&self) -> bool {
        false
    }

    fn close(&mut self) {}
}

/// Opens the transport for a run.
///
/// An SFTP session is only established when the run uploads to a configured remote
/// and is live. Dry runs never touch the network.
pub fn open_transport(
    remote: Option<&RemoteConfig>,
    action: &DisposalAction,
    mode: RunMode,
) -> Result<Box<dyn RemoteTransport>> {
    match (remote, action) {
        (Some(remote), DisposalAction::UploadThenDelete(remote_dir)) if mode.is_live() => {
            let mut transport = SftpTransport::new();
            transport.connect(remote, remote_dir)?;
            Ok(Box::new(transport))
        }
        _ => Ok(Box::new(AbsentTransport)),
    }
}
