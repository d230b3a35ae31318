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

use std::path::Path;

use anyhow::Result;
use chrono::NaiveDateTime;

use vzprune::testing::create_backup;

mod test_engine;

/// Payload extensions of a typical VM backup.
const VM_PAYLOAD: &[&str] = &["vma.zst", "vma.zst.notes"];

/// Creates one VM backup per timestamp.
fn create_vm_backups(dir: &Path, entity: &str, timestamps: &[NaiveDateTime]) -> Result<()> {
    for timestamp in timestamps {
        create_backup(dir, entity, timestamp, VM_PAYLOAD)?;
    }
    Ok(())
}
