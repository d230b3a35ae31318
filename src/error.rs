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

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RetentionError>;

/// Every way a retention run can fail. All of them are fatal for the run.
#[derive(Debug, Error)]
pub enum RetentionError {
    /// Mutually exclusive or missing options. Raised before any scan.
    #[error("configuration conflict: {0}")]
    ConfigurationConflict(String),

    #[error("cannot read backup directory {path:?}")]
    DirectoryUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A manifest was recognized but its timestamp could not be parsed.
    #[error("malformed backup filename '{name}': {reason}")]
    MalformedFilename { name: String, reason: String },

    #[error("invalid retention value: {0}")]
    InvalidPolicyValue(String),

    #[error("archive target {path:?} is not writable: {reason}")]
    ArchiveTargetUnwritable { path: PathBuf, reason: String },

    #[error("remote authentication with {user}@{host} failed: {reason}")]
    RemoteAuthFailed {
        user: String,
        host: String,
        reason: String,
    },

    #[error("failed to upload {path:?} to remote directory {remote_dir:?}: {reason}")]
    RemoteTransferFailed {
        path: PathBuf,
        remote_dir: PathBuf,
        reason: String,
    },

    #[error("failed to {action} {path:?}")]
    LocalDisposalFailed {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A session operation was attempted in the wrong state, e.g. an upload through a
    /// session that is not connected. This is a bug in the caller.
    #[error("cannot {operation} a remote session that is {state}")]
    InvalidSessionState {
        operation: &'static str,
        state: &'static str,
    },
}
