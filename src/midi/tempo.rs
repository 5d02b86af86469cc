// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Tick to seconds conversion.

use super::TimeDivision;

/// 120 BPM, in microseconds per quarter note.
pub const DEFAULT_TEMPO: u32 = 500_000;

/// A tempo in effect from `tick` on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoChange {
    pub tick: u64,
    pub micros_per_quarter: u32,
    /// Seconds from the start of the file to `tick`.
    pub seconds: f64,
}

impl TempoChange {
    pub fn bpm(&self) -> f64 {
        60_000_000.0 / self.micros_per_quarter as f64
    }
}

/// The tempo changes of a file, sorted by tick, always starting at tick 0.
#[derive(Debug, Clone, PartialEq)]
pub struct TempoMap {
    division: TimeDivision,
    changes: Vec<TempoChange>,
}

impl TempoMap {
    /// Builds the map from (tick, microseconds per quarter) pairs in any order.
    /// Of several changes on one tick the last one given wins.
    pub fn new(division: TimeDivision, mut tempos: Vec<(u64, u32)>) -> TempoMap {
        tempos.sort_by_key(|(tick, _)| *tick);

        let mut changes: Vec<TempoChange> = Vec::with_capacity(tempos.len() + 1);
        changes.push(TempoChange {
            tick: 0,
            micros_per_quarter: DEFAULT_TEMPO,
            seconds: 0.0,
        });
        for (tick, micros_per_quarter) in tempos {
            let micros_per_quarter = micros_per_quarter.max(1);
            let Some(last) = changes.last_mut() else {
                continue;
            };
            if last.tick == tick {
                last.micros_per_quarter = micros_per_quarter;
                continue;
            }
            let seconds = last.seconds
                + (tick - last.tick) as f64 * division.seconds_per_tick(last.micros_per_quarter);
            changes.push(TempoChange {
                tick,
                micros_per_quarter,
                seconds,
            });
        }

        TempoMap { division, changes }
    }

    pub fn changes(&self) -> &[TempoChange] {
        &self.changes
    }

    /// The tempo change in effect at a tick.
    fn segment(&self, tick: u64) -> &TempoChange {
        let index = self.changes.partition_point(|c| c.tick <= tick);
        &self.changes[index.saturating_sub(1)]
    }

    /// Seconds from the start of the file to `tick`.
    pub fn ticks_to_seconds(&self, tick: u64) -> f64 {
        let segment = self.segment(tick);
        segment.seconds
            + (tick - segment.tick) as f64 * self.division.seconds_per_tick(segment.micros_per_quarter)
    }

    /// The first tick at or after `seconds`.
    pub fn seconds_to_ticks(&self, seconds: f64) -> u64 {
        let seconds = seconds.max(0.0);
        let index = self.changes.partition_point(|c| c.seconds <= seconds);
        let segment = &self.changes[index.saturating_sub(1)];
        let per_tick = self.division.seconds_per_tick(segment.micros_per_quarter);
        // The epsilon keeps float noise from pushing an exact tick to the next one.
        let ticks = ((seconds - segment.seconds) / per_tick - 1e-6).ceil().max(0.0);
        segment.tick + ticks as u64
    }

    /// The tempo in BPM at a tick.
    pub fn bpm_at(&self, tick: u64) -> f64 {
        self.segment(tick).bpm()
    }
}
