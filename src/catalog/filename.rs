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

//! Grammar of managed backup filenames.
//!
//! Every artifact of a backup occasion is named
//! `vzdump-<type>-<id>-<YYYY>_<MM>_<DD>-<hh>_<mm>_<ss>.<ext>`. Only the manifest
//! (`.log`) marks an occasion; payload files share the same prefix with any other
//! extension.

use std::{fmt, str::FromStr, sync::LazyLock};

use chrono::NaiveDateTime;
use regex::Regex;

use crate::{
    error::{Result, RetentionError},
    global::defaults::{BACKUP_MARKER, MANIFEST_EXTENSION, TIMESTAMP_FORMAT},
};

static MANIFEST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^{}-(qemu|lxc)-([^-]+)-([^.]+)\.{}$",
        regex::escape(BACKUP_MARKER),
        regex::escape(MANIFEST_EXTENSION)
    ))
    .expect("manifest grammar must be a valid regex")
});

static TIMESTAMP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}_\d{2}_\d{2}-\d{2}_\d{2}_\d{2}$")
        .expect("timestamp grammar must be a valid regex")
});

/// Kind of entity that owns a backup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityType {
    /// A QEMU virtual machine.
    Qemu,
    /// An LXC container.
    Lxc,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Qemu => "qemu",
            EntityType::Lxc => "lxc",
        }
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "qemu" => Ok(EntityType::Qemu),
            "lxc" => Ok(EntityType::Lxc),
            _ => Err(format!("unknown entity type '{s}'")),
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies the owner of a group of backups, e.g. `qemu-101`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityKey {
    entity_type: EntityType,
    entity_id: String,
}

impl EntityKey {
    pub fn new(entity_type: EntityType, entity_id: impl Into<String>) -> Self {
        Self {
            entity_type,
            entity_id: entity_id.into(),
        }
    }

    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.entity_type, self.entity_id)
    }
}

/// One backup occasion of one entity, as described by its manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupSetDescriptor {
    pub entity: EntityKey,
    pub timestamp: NaiveDateTime,
}

impl BackupSetDescriptor {
    /// Prefix shared by every file of this occasion.
    pub fn file_prefix(&self) -> String {
        occasion_prefix(&self.entity, &self.timestamp)
    }
}

/// Formats a timestamp the way it is embedded in backup filenames.
pub fn format_timestamp(timestamp: &NaiveDateTime) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// Returns `vzdump-<entity>-<timestamp>.`, the prefix of every file of an occasion.
pub fn occasion_prefix(entity: &EntityKey, timestamp: &NaiveDateTime) -> String {
    format!(
        "{}-{}-{}.",
        BACKUP_MARKER,
        entity,
        format_timestamp(timestamp)
    )
}

/// Parses a file name against the manifest grammar.
///
/// Returns `Ok(None)` for names that are not manifests (payload files, foreign files).
/// A name that is recognized as a manifest but carries an unparsable timestamp is a
/// `MalformedFilename` error, never a silent skip.
pub fn parse_manifest_name(name: &str) -> Result<Option<BackupSetDescriptor>> {
    let Some(captures) = MANIFEST_RE.captures(name) else {
        return Ok(None);
    };

    let malformed = |reason: String| RetentionError::MalformedFilename {
        name: name.to_string(),
        reason,
    };

    let entity_type = EntityType::from_str(&captures[1]).map_err(malformed)?;
    let entity_id = &captures[2];
    let timestamp_str = &captures[3];

    if !TIMESTAMP_RE.is_match(timestamp_str) {
        return Err(malformed(format!(
            "timestamp '{timestamp_str}' does not match YYYY_MM_DD-hh_mm_ss"
        )));
    }

    let timestamp = NaiveDateTime::parse_from_str(timestamp_str, TIMESTAMP_FORMAT)
        .map_err(|e| malformed(format!("invalid timestamp '{timestamp_str}': {e}")))?;

    Ok(Some(BackupSetDescriptor {
        entity: EntityKey::new(entity_type, entity_id),
        timestamp,
    }))
}
