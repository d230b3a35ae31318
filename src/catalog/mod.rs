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

pub mod filename;

use std::{
    collections::{BTreeMap, BTreeSet},
    path::Path,
};

use chrono::NaiveDateTime;

pub use filename::{BackupSetDescriptor, EntityKey, EntityType, parse_manifest_name};

use crate::{
    backend::StorageBackend,
    error::{Result, RetentionError},
    global::defaults::ALL_ENTITIES,
    ui,
};

/// Set of entity ids a run is restricted to. An empty set selects every entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityFilter {
    ids: BTreeSet<String>,
}

impl EntityFilter {
    /// A filter that accepts every entity.
    pub fn all() -> Self {
        Self::default()
    }

    /// Builds a filter from user supplied ids. The `all` sentinel anywhere in the list
    /// disables filtering.
    pub fn from_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ids = BTreeSet::new();
        for value in values {
            let value = value.as_ref().trim();
            if value.eq_ignore_ascii_case(ALL_ENTITIES) {
                return Self::all();
            }
            if !value.is_empty() {
                ids.insert(value.to_string());
            }
        }
        Self { ids }
    }

    pub fn is_all(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn matches(&self, entity_id: &str) -> bool {
        self.is_all() || self.ids.contains(entity_id)
    }
}

impl std::fmt::Display for EntityFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_all() {
            f.write_str(ALL_ENTITIES)
        } else {
            let ids: Vec<&str> = self.ids.iter().map(String::as_str).collect();
            f.write_str(&ids.join(","))
        }
    }
}

/// Backup occasions of a directory, grouped by entity.
///
/// Timestamps keep the order in which they were encountered. Ordering them is the
/// job of the retention evaluator.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    groups: BTreeMap<EntityKey, Vec<NaiveDateTime>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, descriptor: BackupSetDescriptor) {
        self.groups
            .entry(descriptor.entity)
            .or_default()
            .push(descriptor.timestamp);
    }

    /// Iterates over the entity groups, ordered by entity key.
    pub fn groups(&self) -> impl Iterator<Item = (&EntityKey, &[NaiveDateTime])> {
        self.groups
            .iter()
            .map(|(entity, timestamps)| (entity, timestamps.as_slice()))
    }

    pub fn get(&self, entity: &EntityKey) -> Option<&[NaiveDateTime]> {
        self.groups.get(entity).map(Vec::as_slice)
    }

    pub fn num_entities(&self) -> usize {
        self.groups.len()
    }

    pub fn num_occasions(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Scans `dir` (not recursively) and catalogs every backup occasion that has a manifest.
///
/// A manifest with an unparsable timestamp aborts the scan with `MalformedFilename`.
pub fn build_catalog(
    backend: &dyn StorageBackend,
    dir: &Path,
    filter: &EntityFilter,
) -> Result<Catalog> {
    let mut entries = backend
        .read_dir(dir)
        .map_err(|source| RetentionError::DirectoryUnreadable {
            path: dir.to_path_buf(),
            source,
        })?;
    entries.sort();

    let mut catalog = Catalog::new();

    for path in entries {
        if !backend.is_file(&path) {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(descriptor) = parse_manifest_name(name)? else {
            continue;
        };

        if !filter.matches(descriptor.entity.entity_id()) {
            ui::cli::verbose_2!("Skipping {} (entity not selected)", name);
            continue;
        }

        ui::cli::verbose_1!(
            "Found backup {} of {}",
            filename::format_timestamp(&descriptor.timestamp),
            descriptor.entity
        );
        catalog.insert(descriptor);
    }

    Ok(catalog)
}
