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

// -- Filename grammar --
/// Literal tag that prefixes every managed backup artifact.
pub const BACKUP_MARKER: &str = "vzdump";
/// Extension of the manifest file whose presence marks a backup occasion.
pub const MANIFEST_EXTENSION: &str = "log";
/// chrono format of the timestamp embedded in backup filenames.
pub const TIMESTAMP_FORMAT: &str = "%Y_%m_%d-%H_%M_%S";

// -- Remote --
pub const DEFAULT_SSH_PORT: u16 = 22;
pub const DEFAULT_SSH_USER: &str = "root";
/// Seconds between SSH keepalive messages while the session is open.
pub const SSH_KEEPALIVE_INTERVAL: u32 = 30;
/// Suffix of a remote file while its upload is still in progress.
pub const PARTIAL_UPLOAD_SUFFIX: &str = ".part";
pub const REMOTE_DIR_MODE: i32 = 0o755;

// -- Entity filter --
/// Entity filter value that selects every entity.
pub const ALL_ENTITIES: &str = "all";

// Display
pub const DEFAULT_VERBOSITY: u32 = 1;
