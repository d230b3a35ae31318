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

//! Validated configuration of a retention run.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::{
    catalog::EntityFilter,
    commands::cmd_prune::CmdArgs,
    disposal::{DisposalAction, RunMode},
    error::{Result, RetentionError},
    retention::RetentionPolicy,
    ui,
};

/// Credentials for the remote host. Exactly one kind is used.
#[derive(Debug)]
pub enum RemoteAuth {
    PrivateKey {
        private_key: PathBuf,
        public_key: Option<PathBuf>,
    },
    Password(SecretString),
    /// No credential given in a dry run. Dry runs never connect, so none is asked for.
    Deferred,
}

#[derive(Debug)]
pub struct RemoteConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub auth: RemoteAuth,
    /// Host key the server must present, as a base64 blob or a `SHA256:` fingerprint.
    pub expected_host_key: Option<String>,
}

#[derive(Debug)]
pub struct RunConfig {
    pub backup_dir: PathBuf,
    /// Local archive directory, or the directory on the remote host if `remote` is set.
    pub archive_dir: Option<PathBuf>,
    pub remote: Option<RemoteConfig>,
    pub entity_filter: EntityFilter,
    pub policy: RetentionPolicy,
    pub mode: RunMode,
}

impl RunConfig {
    /// A run that deletes the disposed backups of every entity.
    pub fn new(backup_dir: PathBuf, policy: RetentionPolicy, mode: RunMode) -> Self {
        Self {
            backup_dir,
            archive_dir: None,
            remote: None,
            entity_filter: EntityFilter::all(),
            policy,
            mode,
        }
    }

    /// Validates the command line options.
    ///
    /// Every conflict is detected before any file is read. The only side effects are
    /// reading the password file and prompting for a password when a remote host is
    /// given without credentials.
    pub fn from_args(args: &CmdArgs) -> Result<Self> {
        let conflict = |msg: &str| Err(RetentionError::ConfigurationConflict(msg.to_string()));

        let policy = match (args.max_age, args.max_count) {
            (Some(_), Some(_)) => {
                return conflict("--max-age and --max-count are mutually exclusive");
            }
            (None, None) => return conflict("one of --max-age or --max-count is required"),
            (Some(days), None) => RetentionPolicy::MaxAge(days),
            (None, Some(count)) => RetentionPolicy::MaxCount(count),
        };
        policy.validate()?;

        let host = args.host.as_deref().map(str::trim);
        let has_credentials = args.private_key.is_some()
            || args.public_key.is_some()
            || args.password_file.is_some()
            || args.host_key.is_some();

        match host {
            Some("") => return conflict("--host must not be empty"),
            Some(_) if args.archive_dir.is_none() => {
                return conflict("--host requires --archive-dir");
            }
            None if has_credentials => {
                return conflict("remote credentials are only valid together with --host");
            }
            _ => {}
        }
        if args.private_key.is_some() && args.password_file.is_some() {
            return conflict("--private-key and --password-file are mutually exclusive");
        }
        if args.public_key.is_some() && args.private_key.is_none() {
            return conflict("--public-key requires --private-key");
        }

        let mode = RunMode::from_dry_run(args.dry_run);

        let remote = match host {
            Some(host) => Some(RemoteConfig {
                host: host.to_string(),
                port: args.port,
                user: args.user.clone(),
                auth: resolve_auth(args, host, mode)?,
                expected_host_key: args.host_key.clone(),
            }),
            None => None,
        };

        Ok(Self {
            backup_dir: args.dumpdir.clone(),
            archive_dir: args.archive_dir.clone(),
            remote,
            entity_filter: EntityFilter::from_values(&args.vmids),
            policy,
            mode,
        })
    }

    pub fn disposal_action(&self) -> DisposalAction {
        DisposalAction::select(self.archive_dir.as_deref(), self.remote.is_some())
    }
}

fn resolve_auth(args: &CmdArgs, host: &str, mode: RunMode) -> Result<RemoteAuth> {
    if let Some(private_key) = &args.private_key {
        return Ok(RemoteAuth::PrivateKey {
            private_key: private_key.clone(),
            public_key: args.public_key.clone(),
        });
    }

    if args.password_file.is_none() && mode.is_dry_run() {
        return Ok(RemoteAuth::Deferred);
    }

    let password = match &args.password_file {
        Some(path) => {
            let contents = std::fs::read_to_string(path).map_err(|e| {
                RetentionError::ConfigurationConflict(format!(
                    "cannot read password file {path:?}: {e}"
                ))
            })?;
            SecretString::from(contents.trim_end_matches(['\r', '\n']).to_string())
        }
        None => ui::cli::request_password(&format!("{}@{}'s password", args.user, host))
            .map_err(|e| RetentionError::RemoteAuthFailed {
                user: args.user.clone(),
                host: host.to_string(),
                reason: format!("{e:#}"),
            })?,
    };

    Ok(RemoteAuth::Password(password))
}
