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

#[allow(non_upper_case_globals)]
pub mod size {
    pub const KiB: u64 = 1024;
    pub const MiB: u64 = KiB * 1024;
    pub const GiB: u64 = MiB * 1024;
    pub const TiB: u64 = GiB * 1024;
}

/// Formats a byte count with binary units, e.g. `1.18 KiB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [(u64, &str); 4] = [
        (size::TiB, "TiB"),
        (size::GiB, "GiB"),
        (size::MiB, "MiB"),
        (size::KiB, "KiB"),
    ];

    for (unit, name) in UNITS {
        if bytes >= unit {
            return format!("{:.2} {}", (bytes as f64) / (unit as f64), name);
        }
    }
    format!("{} B", bytes)
}

pub fn format_count<T>(count: T, singular: &str, plural: &str) -> String
where
    T: std::fmt::Display + PartialEq + From<u8>,
{
    if count == T::from(1) {
        format!("{} {}", count, singular)
    } else {
        format!("{} {}", count, plural)
    }
}

/// Formats a duration with its two most significant units, e.g. `1h 5m`.
pub fn pretty_print_duration(duration: std::time::Duration) -> String {
    let total_seconds = duration.as_secs();
    let parts = [
        (total_seconds / (24 * 3600), "d"),
        ((total_seconds % (24 * 3600)) / 3600, "h"),
        ((total_seconds % 3600) / 60, "m"),
        (total_seconds % 60, "s"),
    ];

    let formatted: Vec<String> = parts
        .iter()
        .skip_while(|(value, _)| *value == 0)
        .take(2)
        .filter(|(value, _)| *value > 0)
        .map(|(value, unit)| format!("{value}{unit}"))
        .collect();

    if !formatted.is_empty() {
        formatted.join(" ")
    } else if duration.subsec_millis() > 0 {
        format!("{}ms", duration.subsec_millis())
    } else {
        "0s".to_string()
    }
}
