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

pub mod clock;

use chrono::{NaiveDateTime, TimeDelta};

pub use clock::{Clock, FixedClock, SystemClock};

use crate::error::{Result, RetentionError};

/// How many backups of each entity survive a run. The two kinds are never combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// Dispose of backups strictly older than `now - days`.
    MaxAge(i64),
    /// Keep the `count` most recent backups of each entity.
    MaxCount(i64),
}

impl RetentionPolicy {
    /// Rejects values that make no sense for the policy.
    pub fn validate(&self) -> Result<()> {
        match *self {
            RetentionPolicy::MaxCount(count) if count < 0 => Err(
                RetentionError::InvalidPolicyValue(format!(
                    "max count must not be negative, got {count}"
                )),
            ),
            RetentionPolicy::MaxAge(days) if TimeDelta::try_days(days).is_none() => {
                Err(RetentionError::InvalidPolicyValue(format!(
                    "max age of {days} days is out of range"
                )))
            }
            _ => Ok(()),
        }
    }
}

impl std::fmt::Display for RetentionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetentionPolicy::MaxAge(days) => write!(f, "max age of {days} days"),
            RetentionPolicy::MaxCount(count) => write!(f, "max count of {count}"),
        }
    }
}

/// Outcome of applying a policy to the backups of one entity. Both lists are sorted
/// from oldest to newest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionDecision {
    pub keep: Vec<NaiveDateTime>,
    pub dispose: Vec<NaiveDateTime>,
}

/// Splits the backups of one entity into the ones to keep and the ones to dispose of.
///
/// `timestamps` may come in any order and is not modified. `clock` is only read for
/// `MaxAge`.
pub fn evaluate(
    timestamps: &[NaiveDateTime],
    policy: &RetentionPolicy,
    clock: &dyn Clock,
) -> Result<RetentionDecision> {
    policy.validate()?;

    let mut sorted = timestamps.to_vec();
    // Stable: equal timestamps keep their encounter order.
    sorted.sort_by(|a, b| b.cmp(a));

    let (mut keep, mut dispose): (Vec<_>, Vec<_>) = match *policy {
        RetentionPolicy::MaxCount(count) => {
            let count = usize::try_from(count).unwrap_or(usize::MAX);
            let split = count.min(sorted.len());
            let dispose = sorted.split_off(split);
            (sorted, dispose)
        }
        RetentionPolicy::MaxAge(days) => {
            // A negative age never disposes of anything.
            if days < 0 {
                (sorted, Vec::new())
            } else {
                match TimeDelta::try_days(days)
                    .and_then(|age| clock.now().checked_sub_signed(age))
                {
                    Some(cutoff) => sorted.into_iter().partition(|t| *t >= cutoff),
                    None => (sorted, Vec::new()),
                }
            }
        }
    };

    keep.reverse();
    dispose.reverse();

    Ok(RetentionDecision { keep, dispose })
}

/// Returns the backups of one entity that the policy disposes of, oldest first.
pub fn select_for_disposal(
    timestamps: &[NaiveDateTime],
    policy: &RetentionPolicy,
    clock: &dyn Clock,
) -> Result<Vec<NaiveDateTime>> {
    Ok(evaluate(timestamps, policy, clock)?.dispose)
}
