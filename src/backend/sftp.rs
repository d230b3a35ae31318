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
    fs::File,
    net::TcpStream,
    path::Path,
};

use base64::{
    Engine,
    engine::general_purpose::{STANDARD, STANDARD_NO_PAD},
};
use secrecy::ExposeSecret;
use ssh2::{HashType, RenameFlags, Session, Sftp};

use super::RemoteTransport;
use crate::{
    config::{RemoteAuth, RemoteConfig},
    error::{Result, RetentionError},
    global::defaults::{PARTIAL_UPLOAD_SUFFIX, REMOTE_DIR_MODE, SSH_KEEPALIVE_INTERVAL},
    ui, utils,
};

enum SessionState {
    Unopened,
    Connected { session: Session, sftp: Sftp },
    Closed,
}

impl SessionState {
    fn name(&self) -> &'static str {
        match self {
            SessionState::Unopened => "unopened",
            SessionState::Connected { .. } => "connected",
            SessionState::Closed => "closed",
        }
    }
}

/// A single authenticated SFTP session, reused for every upload of a run.
///
/// Goes through `Unopened -> Connected -> Closed`. The session is closed when the
/// transport is dropped, so early returns never leak a connection.
pub struct SftpTransport {
    state: SessionState,
    user: String,
    host: String,
}

impl Default for SftpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl SftpTransport {
    pub fn new() -> Self {
        Self {
            state: SessionState::Unopened,
            user: String::new(),
            host: String::new(),
        }
    }

    /// Connects, authenticates and makes sure `remote_dir` exists.
    pub fn connect(&mut self, config: &RemoteConfig, remote_dir: &Path) -> Result<()> {
        if !matches!(self.state, SessionState::Unopened) {
            return Err(RetentionError::InvalidSessionState {
                operation: "connect",
                state: self.state.name(),
            });
        }

        self.user = config.user.clone();
        self.host = config.host.clone();

        let auth_failed = |reason: String| RetentionError::RemoteAuthFailed {
            user: config.user.clone(),
            host: config.host.clone(),
            reason,
        };

        let tcp = TcpStream::connect((config.host.as_str(), config.port)).map_err(|e| {
            auth_failed(format!(
                "failed to connect to {}:{}: {e}",
                config.host, config.port
            ))
        })?;
        let mut session =
            Session::new().map_err(|e| auth_failed(format!("failed to create SSH session: {e}")))?;
        session.set_tcp_stream(tcp);
        session
            .handshake()
            .map_err(|e| auth_failed(format!("failed to perform SSH handshake: {e}")))?;

        if let Some(expected) = &config.expected_host_key {
            let (key_blob, _key_type) = session
                .host_key()
                .ok_or_else(|| auth_failed("server did not present a host key".to_string()))?;
            let fingerprint = session.host_key_hash(HashType::Sha256);
            if !host_key_matches(expected, key_blob, fingerprint) {
                return Err(auth_failed(
                    "host key does not match the expected key".to_string(),
                ));
            }
        }

        match &config.auth {
            RemoteAuth::PrivateKey {
                private_key,
                public_key,
            } => session
                .userauth_pubkey_file(&config.user, public_key.as_deref(), private_key, None)
                .map_err(|e| {
                    auth_failed(format!(
                        "failed to authenticate with key {private_key:?}: {e}"
                    ))
                })?,
            RemoteAuth::Password(password) => session
                .userauth_password(&config.user, password.expose_secret())
                .map_err(|e| auth_failed(format!("failed to authenticate with password: {e}")))?,
            RemoteAuth::Deferred => {
                return Err(auth_failed("no credentials were given".to_string()));
            }
        }

        if !session.authenticated() {
            return Err(auth_failed("server rejected the credentials".to_string()));
        }

        session.set_keepalive(true, SSH_KEEPALIVE_INTERVAL);

        let sftp = session
            .sftp()
            .map_err(|e| auth_failed(format!("failed to create SFTP session: {e}")))?;

        create_dir_all_exact(&sftp, remote_dir).map_err(|reason| {
            RetentionError::RemoteTransferFailed {
                path: remote_dir.to_path_buf(),
                remote_dir: remote_dir.to_path_buf(),
                reason,
            }
        })?;

        ui::cli::verbose_1!(
            "Opened SFTP session with {}@{}:{}",
            config.user,
            config.host,
            config.port
        );
        self.state = SessionState::Connected { session, sftp };
        Ok(())
    }
}

impl RemoteTransport for SftpTransport {
    fn put(&mut self, local_path: &Path, remote_dir: &Path) -> Result<u64> {
        let SessionState::Connected { sftp, .. } = &self.state else {
            return Err(RetentionError::InvalidSessionState {
                operation: "upload through",
                state: self.state.name(),
            });
        };

        let transfer_failed = |reason: String| RetentionError::RemoteTransferFailed {
            path: local_path.to_path_buf(),
            remote_dir: remote_dir.to_path_buf(),
            reason,
        };

        let file_name = local_path
            .file_name()
            .ok_or_else(|| transfer_failed("path has no file name".to_string()))?;
        let final_path = remote_dir.join(file_name);
        let mut part_name = file_name.to_os_string();
        part_name.push(PARTIAL_UPLOAD_SUFFIX);
        let part_path = remote_dir.join(part_name);

        let mut local = File::open(local_path)
            .map_err(|e| transfer_failed(format!("failed to open local file: {e}")))?;
        let expected_size = local
            .metadata()
            .map_err(|e| transfer_failed(format!("failed to stat local file: {e}")))?
            .len();

        match upload_verified(sftp, &mut local, &part_path, &final_path, expected_size) {
            Ok(bytes) => {
                ui::cli::verbose_2!(
                    "Uploaded {} to {}@{}:{:?}",
                    utils::format_size(bytes),
                    self.user,
                    self.host,
                    final_path
                );
                Ok(bytes)
            }
            Err(reason) => {
                // Best effort: the upload already failed, a stale part file is harmless.
                let _ = sftp.unlink(&part_path);
                Err(transfer_failed(reason))
            }
        }
    }

    fn is_connected(&self) -> bool {
        matches!(self.state, SessionState::Connected { .. })
    }

    fn close(&mut self) {
        let previous = std::mem::replace(&mut self.state, SessionState::Closed);
        if let SessionState::Connected { session, sftp } = previous {
            drop(sftp);
            if let Err(e) = session.disconnect(None, "retention run finished", None) {
                ui::cli::warning!(
                    "Failed to disconnect cleanly from {}@{}: {}",
                    self.user,
                    self.host,
                    e
                );
            }
            ui::cli::verbose_1!("Closed SFTP session with {}@{}", self.user, self.host);
        }
    }
}

impl Drop for SftpTransport {
    fn drop(&mut self) {
        self.close();
    }
}

/// Streams `local` into `part_path`, checks the remote size and moves it to `final_path`.
fn upload_verified(
    sftp: &Sftp,
    local: &mut File,
    part_path: &Path,
    final_path: &Path,
    expected_size: u64,
) -> std::result::Result<u64, String> {
    let mut remote = sftp
        .create(part_path)
        .map_err(|e| format!("failed to create remote file {part_path:?}: {e}"))?;
    let bytes = std::io::copy(local, &mut remote)
        .map_err(|e| format!("failed to write remote file {part_path:?}: {e}"))?;
    drop(remote);

    let stat = sftp
        .stat(part_path)
        .map_err(|e| format!("failed to stat remote file {part_path:?}: {e}"))?;
    if bytes != expected_size || stat.size != Some(expected_size) {
        return Err(format!(
            "size mismatch after upload: local file has {expected_size} bytes, remote has {:?}",
            stat.size
        ));
    }

    sftp.rename(part_path, final_path, Some(RenameFlags::all()))
        .map_err(|e| format!("failed to rename {part_path:?} to {final_path:?}: {e}"))?;

    Ok(bytes)
}

/// Creates a remote directory and all its missing parents.
fn create_dir_all_exact(sftp: &Sftp, path: &Path) -> std::result::Result<(), String> {
    if let Ok(stat) = sftp.stat(path) {
        if stat.is_dir() {
            return Ok(());
        }
        return Err(format!("path {path:?} exists but is not a directory"));
    }

    if let Some(parent) = path.parent() {
        if parent != Path::new("") {
            create_dir_all_exact(sftp, parent)?;
        }
    }

    sftp.mkdir(path, REMOTE_DIR_MODE)
        .map_err(|e| format!("failed to create remote directory {path:?}: {e}"))
}

/// Compares the server host key with the expected one.
///
/// `expected` is either an OpenSSH fingerprint (`SHA256:<base64>`) or a base64 key blob,
/// optionally preceded by the key type as in a `known_hosts` line.
pub(crate) fn host_key_matches(expected: &str, key_blob: &[u8], sha256: Option<&[u8]>) -> bool {
    let expected = expected.trim();

    if let Some(fingerprint) = expected.strip_prefix("SHA256:") {
        return match sha256 {
            Some(hash) => STANDARD_NO_PAD.encode(hash) == fingerprint.trim_end_matches('='),
            None => false,
        };
    }

    match expected.split_whitespace().last() {
        Some(blob) => STANDARD.encode(key_blob) == blob,
        None => false,
    }
}
