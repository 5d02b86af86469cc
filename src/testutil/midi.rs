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

//! Builds Standard MIDI Files for tests.

/// Encodes a variable length quantity.
pub fn vlq(mut value: u32) -> Vec<u8> {
    let mut bytes = vec![(value & 0x7F) as u8];
    value >>= 7;
    while value > 0 {
        bytes.push(((value & 0x7F) as u8) | 0x80);
        value >>= 7;
    }
    bytes.reverse();
    bytes
}

/// A track written from events at absolute ticks. Events must be added in tick order.
#[derive(Default, Clone)]
pub struct TrackBuilder {
    events: Vec<(u32, Vec<u8>)>,
}

impl TrackBuilder {
    pub fn new() -> TrackBuilder {
        TrackBuilder::default()
    }

    /// Adds an event with its status byte included.
    pub fn raw(mut self, tick: u32, bytes: &[u8]) -> TrackBuilder {
        self.events.push((tick, bytes.to_vec()));
        self
    }

    pub fn note_on(self, tick: u32, channel: u8, key: u8, velocity: u8) -> TrackBuilder {
        self.raw(tick, &[0x90 | channel, key, velocity])
    }

    pub fn note_off(self, tick: u32, channel: u8, key: u8) -> TrackBuilder {
        self.raw(tick, &[0x80 | channel, key, 0])
    }

    pub fn controller(self, tick: u32, channel: u8, controller: u8, value: u8) -> TrackBuilder {
        self.raw(tick, &[0xB0 | channel, controller, value])
    }

    pub fn program(self, tick: u32, channel: u8, program: u8) -> TrackBuilder {
        self.raw(tick, &[0xC0 | channel, program])
    }

    /// A pitch bend with a 14-bit value, 8192 being centered.
    pub fn pitch_bend(self, tick: u32, channel: u8, value: u16) -> TrackBuilder {
        self.raw(
            tick,
            &[0xE0 | channel, (value & 0x7F) as u8, (value >> 7) as u8],
        )
    }

    pub fn tempo_bpm(self, tick: u32, bpm: f64) -> TrackBuilder {
        let micros = (60_000_000.0 / bpm).round() as u32;
        let bytes = micros.to_be_bytes();
        self.raw(tick, &[0xFF, 0x51, 0x03, bytes[1], bytes[2], bytes[3]])
    }

    pub fn meta(self, tick: u32, kind: u8, data: &[u8]) -> TrackBuilder {
        let mut bytes = vec![0xFF, kind];
        bytes.extend(vlq(data.len() as u32));
        bytes.extend(data);
        self.raw(tick, &bytes)
    }

    pub fn name(self, tick: u32, name: &str) -> TrackBuilder {
        self.meta(tick, 0x03, name.as_bytes())
    }

    pub fn sysex(self, tick: u32, data: &[u8]) -> TrackBuilder {
        let mut bytes = vec![0xF0];
        bytes.extend(vlq(data.len() as u32));
        bytes.extend(data);
        self.raw(tick, &bytes)
    }

    /// The MTrk body, terminated with an end of track event at the last tick.
    pub fn body(&self) -> Vec<u8> {
        let mut body = Vec::new();
        let mut last = 0;
        for (tick, bytes) in &self.events {
            body.extend(vlq(tick - last));
            body.extend(bytes);
            last = *tick;
        }
        body.extend([0x00, 0xFF, 0x2F, 0x00]);
        body
    }
}

/// A complete file: MThd followed by one MTrk per track.
pub struct MidiBuilder {
    format: u16,
    division: u16,
    tracks: Vec<Vec<u8>>,
}

impl MidiBuilder {
    pub fn new(division: u16) -> MidiBuilder {
        MidiBuilder {
            format: 1,
            division,
            tracks: Vec::new(),
        }
    }

    pub fn format(mut self, format: u16) -> MidiBuilder {
        self.format = format;
        self
    }

    pub fn track(mut self, track: TrackBuilder) -> MidiBuilder {
        self.tracks.push(track.body());
        self
    }

    /// Adds a track from an already encoded MTrk body.
    pub fn raw_track(mut self, body: &[u8]) -> MidiBuilder {
        self.tracks.push(body.to_vec());
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut bytes = b"MThd".to_vec();
        bytes.extend(6u32.to_be_bytes());
        bytes.extend(self.format.to_be_bytes());
        bytes.extend((self.tracks.len() as u16).to_be_bytes());
        bytes.extend(self.division.to_be_bytes());
        for track in &self.tracks {
            bytes.extend(b"MTrk");
            bytes.extend((track.len() as u32).to_be_bytes());
            bytes.extend(track);
        }
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vlq() {
        assert_eq!(vlq(0), vec![0x00]);
        assert_eq!(vlq(0x7F), vec![0x7F]);
        assert_eq!(vlq(0x80), vec![0x81, 0x00]);
        assert_eq!(vlq(0x0FFF_FFFF), vec![0xFF, 0xFF, 0xFF, 0x7F]);
    }
}
