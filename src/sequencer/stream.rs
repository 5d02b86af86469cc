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

//! Every track merged into one stream ordered by tick.

use crate::midi::{EventKind, ParsedMidi};

/// An event with its time resolved through the tempo map.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEvent {
    pub tick: u64,
    pub seconds: f64,
    pub track: usize,
    pub kind: EventKind,
}

#[derive(Debug, Clone, Default)]
pub struct EventStream {
    events: Vec<StreamEvent>,
}

impl EventStream {
    pub fn new(midi: &ParsedMidi) -> EventStream {
        let mut events: Vec<StreamEvent> = midi
            .tracks()
            .iter()
            .enumerate()
            .flat_map(|(track, events)| {
                events.iter().map(move |event| StreamEvent {
                    tick: event.tick,
                    seconds: 0.0,
                    track,
                    kind: event.kind.clone(),
                })
            })
            .collect();
        // The sort is stable: equal ticks keep track order, then event order.
        events.sort_by_key(|event| event.tick);

        let tempo = midi.tempo();
        for event in events.iter_mut() {
            event.seconds = tempo.ticks_to_seconds(event.tick);
        }
        EventStream { events }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&StreamEvent> {
        self.events.get(index)
    }

    pub fn events(&self) -> &[StreamEvent] {
        &self.events
    }

    /// The index of the first event at or after `tick`.
    pub fn position(&self, tick: u64) -> usize {
        self.events.partition_point(|event| event.tick < tick)
    }
}

#[cfg(test)]
mod tests {
    use midly::MidiMessage;

    use super::*;
    use crate::testutil::midi::{MidiBuilder, TrackBuilder};

    fn keys(stream: &EventStream) -> Vec<(u64, usize, u8)> {
        stream
            .events()
            .iter()
            .filter_map(|e| match e.kind {
                EventKind::Channel {
                    message: MidiMessage::NoteOn { key, .. },
                    ..
                } => Some((e.tick, e.track, key.as_int())),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_merge_is_stable() {
        let midi = ParsedMidi::load(
            &MidiBuilder::new(480)
                .track(
                    TrackBuilder::new()
                        .note_on(0, 0, 60, 100)
                        .note_on(480, 0, 61, 100)
                        .note_on(480, 0, 62, 100),
                )
                .track(
                    TrackBuilder::new()
                        .note_on(240, 1, 70, 100)
                        .note_on(480, 1, 71, 100),
                )
                .build(),
        )
        .unwrap();
        let stream = EventStream::new(&midi);
        assert_eq!(
            keys(&stream),
            vec![
                (0, 0, 60),
                (240, 1, 70),
                (480, 0, 61),
                (480, 0, 62),
                (480, 1, 71)
            ]
        );
    }

    #[test]
    fn test_seconds_and_position() {
        let midi = ParsedMidi::load(
            &MidiBuilder::new(480)
                .track(TrackBuilder::new().tempo_bpm(480, 60.0))
                .track(
                    TrackBuilder::new()
                        .note_on(480, 0, 60, 100)
                        .note_off(960, 0, 60),
                )
                .build(),
        )
        .unwrap();
        let stream = EventStream::new(&midi);
        let last = stream.get(stream.len() - 1).unwrap();
        assert_eq!(last.tick, 960);
        assert!((last.seconds - 1.5).abs() < 1e-9);

        assert_eq!(stream.position(0), 0);
        // The tempo event and the note on share tick 480.
        assert_eq!(stream.position(480), 0);
        assert_eq!(stream.position(481), 2);
        assert_eq!(stream.position(10_000), stream.len());
    }
}
