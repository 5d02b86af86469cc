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

//! Standard MIDI File loading.
//!
//! A file is decoded into per-track event lists with absolute ticks, a tempo map,
//! and the metadata the sequencer and the command line need: the loop region
//! marked with controllers 2 and 4, a title, and the tick of the last channel event.

use std::{fs, path::Path};

use midly::MidiMessage;
use tracing::{debug, info};

use crate::bytes::{decode_text, ByteReader};
use crate::error::FormatError;

pub mod parser;
pub mod tempo;

pub use tempo::{TempoChange, TempoMap, DEFAULT_TEMPO};

/// Marks the loop start when it appears once in a file.
pub const CC_LOOP_START: u8 = 2;
/// Marks the loop end when it appears once in a file.
pub const CC_LOOP_END: u8 = 4;

/// How ticks relate to time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeDivision {
    /// Ticks per quarter note; seconds depend on the tempo.
    Metrical(u16),
    /// Ticks per SMPTE frame; tempo changes do not apply.
    Smpte { fps: u8, ticks_per_frame: u8 },
}

impl TimeDivision {
    pub fn from_raw(raw: u16) -> TimeDivision {
        if raw & 0x8000 == 0 {
            TimeDivision::Metrical(raw)
        } else {
            TimeDivision::Smpte {
                fps: ((raw >> 8) as u8 as i8).unsigned_abs(),
                ticks_per_frame: (raw & 0xFF) as u8,
            }
        }
    }

    /// The length of one tick at a tempo in microseconds per quarter note.
    pub fn seconds_per_tick(&self, micros_per_quarter: u32) -> f64 {
        match *self {
            TimeDivision::Metrical(ticks) => {
                micros_per_quarter as f64 / 1_000_000.0 / ticks.max(1) as f64
            }
            TimeDivision::Smpte {
                fps,
                ticks_per_frame,
            } => {
                // 29 means 30 drop frame.
                let fps = if fps == 29 { 29.97 } else { fps as f64 };
                1.0 / (fps * ticks_per_frame as f64).max(1.0)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    Channel { channel: u8, message: MidiMessage },
    /// Microseconds per quarter note.
    Tempo(u32),
    Meta { kind: u8, data: Vec<u8> },
    /// The payload after the F0/F7 status and its length.
    SysEx(Vec<u8>),
}

/// An event at an absolute tick.
#[derive(Debug, Clone, PartialEq)]
pub struct MidiEvent {
    pub tick: u64,
    pub kind: EventKind,
}

impl MidiEvent {
    fn note_on_key(&self) -> Option<u8> {
        match self.kind {
            EventKind::Channel {
                message: MidiMessage::NoteOn { key, vel },
                ..
            } if vel.as_int() > 0 => Some(key.as_int()),
            _ => None,
        }
    }

    fn controller(&self) -> Option<u8> {
        match self.kind {
            EventKind::Channel {
                message: MidiMessage::Controller { controller, .. },
                ..
            } => Some(controller.as_int()),
            _ => None,
        }
    }
}

/// The part of a file that repeats, in ticks. `end` is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopRegion {
    pub start: u64,
    pub end: u64,
}

/// A loop boundary marker. Only a marker that appears exactly once counts.
#[derive(Clone, Copy)]
enum LoopMark {
    Unset,
    At(u64),
    Repeated,
}

impl LoopMark {
    fn mark(&mut self, tick: u64) {
        *self = match *self {
            LoopMark::Unset => LoopMark::At(tick),
            _ => LoopMark::Repeated,
        };
    }

    fn tick(self) -> Option<u64> {
        match self {
            LoopMark::At(tick) => Some(tick),
            _ => None,
        }
    }
}

/// A decoded Standard MIDI File.
#[derive(Clone)]
pub struct ParsedMidi {
    format: u16,
    division: TimeDivision,
    tracks: Vec<Vec<MidiEvent>>,
    tempo: TempoMap,
    loop_region: LoopRegion,
    title: Option<String>,
    track_names: Vec<Option<String>>,
    first_note_on: Option<u64>,
    last_event_tick: u64,
    key_range: Option<(u8, u8)>,
}

impl ParsedMidi {
    /// Decodes a Standard MIDI File.
    pub fn load(bytes: &[u8]) -> Result<ParsedMidi, FormatError> {
        let mut reader = ByteReader::new(bytes, "MThd");
        let header = parser::read_header(&mut reader)?;
        if header.tracks == 0 {
            return Err(FormatError::NoTracks);
        }

        let mut tracks = Vec::with_capacity(header.tracks as usize);
        // Format 2 tracks are independent patterns played one after another.
        let mut offset = 0;
        for index in 0..header.tracks as usize {
            let mut track = parser::read_track(&mut reader, index)?;
            if header.format == 2 {
                track.events.iter_mut().for_each(|e| e.tick += offset);
                offset += track.end_tick;
            }
            tracks.push(track.events);
        }

        let parsed = ParsedMidi::from_tracks(header.format, header.division, tracks);
        info!(
            format = parsed.format,
            tracks = parsed.tracks.len(),
            division = ?parsed.division,
            duration = parsed.duration(),
            title = parsed.title.as_deref().unwrap_or(""),
            "MIDI file loaded"
        );
        Ok(parsed)
    }

    /// Reads and decodes a Standard MIDI File from disk.
    pub fn from_file(path: &Path) -> Result<ParsedMidi, FormatError> {
        ParsedMidi::load(&fs::read(path)?)
    }

    fn from_tracks(format: u16, division: TimeDivision, tracks: Vec<Vec<MidiEvent>>) -> ParsedMidi {
        let mut tempos = Vec::new();
        let mut loop_start = LoopMark::Unset;
        let mut loop_end = LoopMark::Unset;
        let mut first_note_on: Option<u64> = None;
        let mut last_event_tick = 0;
        let mut key_range: Option<(u8, u8)> = None;
        let mut track_names = Vec::with_capacity(tracks.len());

        for track in &tracks {
            let mut name = None;
            for event in track {
                match &event.kind {
                    EventKind::Tempo(micros) => tempos.push((event.tick, *micros)),
                    EventKind::Meta { kind, data }
                        if *kind == parser::META_TRACK_NAME && name.is_none() =>
                    {
                        name = Some(decode_text(data));
                    }
                    EventKind::Channel { .. } => last_event_tick = last_event_tick.max(event.tick),
                    _ => {}
                }
                match event.controller() {
                    Some(CC_LOOP_START) => loop_start.mark(event.tick),
                    Some(CC_LOOP_END) => loop_end.mark(event.tick),
                    _ => {}
                }
                if let Some(key) = event.note_on_key() {
                    first_note_on = Some(first_note_on.map_or(event.tick, |t| t.min(event.tick)));
                    key_range = Some(key_range.map_or((key, key), |(lo, hi)| (lo.min(key), hi.max(key))));
                }
            }
            track_names.push(name);
        }

        let mut loop_region = LoopRegion {
            start: loop_start.tick().unwrap_or(0),
            end: loop_end.tick().unwrap_or(last_event_tick),
        };
        if loop_region.start >= loop_region.end {
            debug!(
                start = loop_region.start,
                end = loop_region.end,
                "Ignoring empty loop region"
            );
            loop_region = LoopRegion {
                start: 0,
                end: last_event_tick,
            };
        }

        let title = ParsedMidi::title_of(&tracks, &track_names);
        ParsedMidi {
            format,
            division,
            tempo: TempoMap::new(division, tempos),
            tracks,
            loop_region,
            title,
            track_names,
            first_note_on,
            last_event_tick,
            key_range,
        }
    }

    /// The first track's name is the title of a single track file. With several
    /// tracks it only counts when the first track holds no notes.
    fn title_of(tracks: &[Vec<MidiEvent>], names: &[Option<String>]) -> Option<String> {
        let first = tracks.first()?;
        if tracks.len() > 1 && first.iter().any(|e| e.note_on_key().is_some()) {
            return None;
        }
        names
            .first()
            .cloned()
            .flatten()
            .filter(|name| !name.is_empty())
    }

    pub fn format(&self) -> u16 {
        self.format
    }

    pub fn division(&self) -> TimeDivision {
        self.division
    }

    /// Events of each track with absolute ticks, in file order.
    pub fn tracks(&self) -> &[Vec<MidiEvent>] {
        &self.tracks
    }

    pub fn tempo(&self) -> &TempoMap {
        &self.tempo
    }

    pub fn loop_region(&self) -> LoopRegion {
        self.loop_region
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn track_names(&self) -> &[Option<String>] {
        &self.track_names
    }

    pub fn first_note_on(&self) -> Option<u64> {
        self.first_note_on
    }

    /// The tick of the last channel event.
    pub fn last_event_tick(&self) -> u64 {
        self.last_event_tick
    }

    /// The lowest and highest key played.
    pub fn key_range(&self) -> Option<(u8, u8)> {
        self.key_range
    }

    pub fn event_count(&self) -> usize {
        self.tracks.iter().map(Vec::len).sum()
    }

    /// Seconds until the last channel event.
    pub fn duration(&self) -> f64 {
        self.tempo.ticks_to_seconds(self.last_event_tick)
    }
}

impl std::fmt::Debug for ParsedMidi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParsedMidi")
            .field("format", &self.format)
            .field("division", &self.division)
            .field("tracks", &self.tracks.len())
            .field("events", &self.event_count())
            .field("loop_region", &self.loop_region)
            .field("title", &self.title)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::midi::{MidiBuilder, TrackBuilder};

    fn load(builder: MidiBuilder) -> ParsedMidi {
        ParsedMidi::load(&builder.build()).expect("midi should load")
    }

    #[test]
    fn test_time_division() {
        assert_eq!(TimeDivision::from_raw(480), TimeDivision::Metrical(480));
        assert_eq!(
            TimeDivision::from_raw(0xE728),
            TimeDivision::Smpte {
                fps: 25,
                ticks_per_frame: 40
            }
        );
        let per_tick = TimeDivision::Metrical(480).seconds_per_tick(DEFAULT_TEMPO);
        assert!((per_tick * 480.0 - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_tempo_change_across_tracks() {
        let midi = load(
            MidiBuilder::new(480)
                .track(TrackBuilder::new().tempo_bpm(480, 90.0))
                .track(
                    TrackBuilder::new()
                        .note_on(0, 0, 60, 100)
                        .note_off(960, 0, 60),
                )
                .track(TrackBuilder::new().note_on(240, 1, 64, 90)),
        );
        assert_eq!(midi.tracks().len(), 3);
        assert!((midi.tempo().ticks_to_seconds(480) - 1.0).abs() < 1e-6);
        assert!((midi.tempo().ticks_to_seconds(960) - 5.0 / 3.0).abs() < 1e-6);
        assert_eq!(midi.last_event_tick(), 960);
        assert!((midi.duration() - 5.0 / 3.0).abs() < 1e-6);
        assert_eq!(midi.first_note_on(), Some(0));
        assert_eq!(midi.key_range(), Some((60, 64)));
    }

    #[test]
    fn test_loop_markers() {
        let midi = load(
            MidiBuilder::new(480).track(
                TrackBuilder::new()
                    .controller(100, 0, CC_LOOP_START, 0)
                    .note_on(200, 0, 60, 100)
                    .controller(500, 0, CC_LOOP_END, 0)
                    .note_off(900, 0, 60),
            ),
        );
        assert_eq!(midi.loop_region(), LoopRegion { start: 100, end: 500 });
    }

    #[test]
    fn test_repeated_loop_markers_revert() {
        let midi = load(
            MidiBuilder::new(480).track(
                TrackBuilder::new()
                    .controller(100, 0, CC_LOOP_START, 0)
                    .controller(200, 0, CC_LOOP_START, 0)
                    .controller(500, 0, CC_LOOP_END, 0)
                    .note_on(600, 0, 60, 100),
            ),
        );
        assert_eq!(midi.loop_region(), LoopRegion { start: 0, end: 500 });

        let midi = load(
            MidiBuilder::new(480).track(
                TrackBuilder::new()
                    .controller(100, 0, CC_LOOP_START, 0)
                    .controller(300, 0, CC_LOOP_END, 0)
                    .controller(500, 0, CC_LOOP_END, 0)
                    .note_on(600, 0, 60, 100),
            ),
        );
        assert_eq!(midi.loop_region(), LoopRegion { start: 100, end: 600 });
    }

    #[test]
    fn test_default_and_inverted_loop() {
        let midi = load(MidiBuilder::new(96).track(TrackBuilder::new().note_on(384, 0, 60, 1)));
        assert_eq!(midi.loop_region(), LoopRegion { start: 0, end: 384 });

        let midi = load(
            MidiBuilder::new(96).track(
                TrackBuilder::new()
                    .controller(100, 0, CC_LOOP_END, 0)
                    .controller(200, 0, CC_LOOP_START, 0)
                    .note_on(300, 0, 60, 1),
            ),
        );
        assert_eq!(midi.loop_region(), LoopRegion { start: 0, end: 300 });
    }

    #[test]
    fn test_title() {
        let midi = load(
            MidiBuilder::new(480)
                .track(TrackBuilder::new().name(0, "Song Title").tempo_bpm(0, 100.0))
                .track(TrackBuilder::new().name(0, "Bass").note_on(0, 0, 40, 100)),
        );
        assert_eq!(midi.title(), Some("Song Title"));
        assert_eq!(
            midi.track_names(),
            &[Some("Song Title".to_string()), Some("Bass".to_string())]
        );

        let midi = load(
            MidiBuilder::new(480)
                .track(TrackBuilder::new().name(0, "Lead").note_on(0, 0, 60, 100))
                .track(TrackBuilder::new().name(0, "Bass")),
        );
        assert_eq!(midi.title(), None);

        let midi = load(
            MidiBuilder::new(480)
                .format(0)
                .track(TrackBuilder::new().name(0, "Solo\0junk").note_on(0, 0, 60, 100)),
        );
        assert_eq!(midi.title(), Some("Solo"));
    }

    #[test]
    fn test_running_status_in_file() {
        // Note on, then two more note ons under running status, the last with
        // velocity 0.
        let body = [
            0x00, 0x90, 0x3C, 0x64, 0x60, 0x3E, 0x64, 0x60, 0x3C, 0x00, 0x00, 0xFF, 0x2F, 0x00,
        ];
        let midi = load(MidiBuilder::new(96).format(0).raw_track(&body));
        assert_eq!(midi.event_count(), 3);
        assert_eq!(midi.first_note_on(), Some(0));
        assert_eq!(midi.key_range(), Some((60, 62)));
        assert_eq!(midi.last_event_tick(), 192);
        assert!((midi.duration() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_format2_tracks_follow_each_other() {
        let midi = load(
            MidiBuilder::new(480)
                .format(2)
                .track(TrackBuilder::new().note_on(0, 0, 60, 100).note_off(480, 0, 60))
                .track(TrackBuilder::new().note_on(0, 0, 62, 100).note_off(240, 0, 62)),
        );
        assert_eq!(midi.tracks()[1][0].tick, 480);
        assert_eq!(midi.last_event_tick(), 720);
    }

    #[test]
    fn test_header_errors() {
        let mut bytes = MidiBuilder::new(480).track(TrackBuilder::new()).build();
        bytes[3] = b'x';
        assert!(matches!(
            ParsedMidi::load(&bytes),
            Err(FormatError::UnexpectedChunk { .. })
        ));

        let mut bytes = MidiBuilder::new(480).track(TrackBuilder::new()).build();
        bytes[7] = 8;
        assert!(matches!(
            ParsedMidi::load(&bytes),
            Err(FormatError::InvalidHeaderSize { size: 8, .. })
        ));

        let mut bytes = MidiBuilder::new(480).track(TrackBuilder::new()).build();
        bytes[14] = b'X';
        assert!(matches!(
            ParsedMidi::load(&bytes),
            Err(FormatError::UnexpectedChunk { .. })
        ));

        assert!(matches!(
            ParsedMidi::load(&MidiBuilder::new(480).build()),
            Err(FormatError::NoTracks)
        ));

        let bytes = MidiBuilder::new(480)
            .track(TrackBuilder::new().note_on(0, 0, 60, 100))
            .build();
        assert!(matches!(
            ParsedMidi::load(&bytes[..bytes.len() - 2]),
            Err(FormatError::Truncated { .. })
        ));
    }
}
