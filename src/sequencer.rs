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

//! Plays a [`ParsedMidi`] through a [`SynthControl`].
//!
//! Playback time comes from the synthesizer's [`AudioClock`], so the sequencer
//! stays locked to the audio that has actually been rendered. Each [`Sequencer::poll`]
//! dispatches every event that has become due. Seeking replays the state changing
//! events before the target without sounding any notes.

use midly::MidiMessage;
use tracing::{debug, info, warn};

use crate::midi::{EventKind, LoopRegion, ParsedMidi};
use crate::synth::channel::CC_RESET_CONTROLLERS;
use crate::synth::{AudioClock, SynthControl};

pub mod driver;
pub mod stream;

use self::stream::EventStream;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
    /// The end of the file was reached with looping off.
    Finished,
}

pub struct Sequencer {
    control: SynthControl,
    clock: AudioClock,
    midi: ParsedMidi,
    stream: EventStream,
    /// The next event to dispatch.
    cursor: usize,
    state: PlaybackState,
    /// Song time at `anchor_clock`.
    anchor_song: f64,
    /// Audio clock time when playback last started or jumped.
    anchor_clock: f64,
    looping: bool,
    loop_region: LoopRegion,
    /// Loops left to play, or None to loop forever.
    loops_remaining: Option<u32>,
    loops_played: u32,
}

impl Sequencer {
    /// Creates a stopped sequencer. The clock must be the one the synthesizer
    /// for `control` advances.
    pub fn new(control: SynthControl, clock: AudioClock, midi: ParsedMidi) -> Sequencer {
        Sequencer {
            control,
            clock,
            stream: EventStream::new(&midi),
            loop_region: midi.loop_region(),
            midi,
            cursor: 0,
            state: PlaybackState::Stopped,
            anchor_song: 0.0,
            anchor_clock: 0.0,
            looping: false,
            loops_remaining: None,
            loops_played: 0,
        }
    }

    /// Stops playback and replaces the file.
    pub fn load(&mut self, midi: ParsedMidi) {
        self.stop();
        self.stream = EventStream::new(&midi);
        self.loop_region = midi.loop_region();
        self.midi = midi;
        self.loops_played = 0;
    }

    pub fn midi(&self) -> &ParsedMidi {
        &self.midi
    }

    pub fn control(&self) -> &SynthControl {
        &self.control
    }

    /// The control side, for live input alongside the file.
    pub fn control_mut(&mut self) -> &mut SynthControl {
        &mut self.control
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_paused(&self) -> bool {
        self.state == PlaybackState::Paused
    }

    pub fn is_finished(&self) -> bool {
        self.state == PlaybackState::Finished
    }

    /// Seconds from the start of the file to its last channel event.
    pub fn duration(&self) -> f64 {
        self.midi.duration()
    }

    /// The playback position in seconds.
    pub fn current_time(&self) -> f64 {
        match self.state {
            PlaybackState::Playing => {
                self.anchor_song + (self.clock.seconds() - self.anchor_clock).max(0.0)
            }
            _ => self.anchor_song,
        }
    }

    pub fn current_tick(&self) -> u64 {
        self.midi.tempo().seconds_to_ticks(self.current_time())
    }

    /// Starts or resumes playback. Stopped and finished playback always starts
    /// over, as does `reset_time`.
    pub fn play(&mut self, reset_time: bool) {
        if reset_time || matches!(self.state, PlaybackState::Stopped | PlaybackState::Finished) {
            self.relocate(0, 0.0);
            self.loops_played = 0;
        }
        self.anchor_clock = self.clock.seconds();
        self.state = PlaybackState::Playing;
        info!(
            title = self.midi.title().unwrap_or(""),
            position = self.anchor_song,
            "Playback started"
        );
    }

    /// Pauses at the current position and releases sounding notes.
    pub fn pause(&mut self) {
        if self.state != PlaybackState::Playing {
            return;
        }
        self.anchor_song = self.current_time();
        self.state = PlaybackState::Paused;
        self.control.stop_all(false);
        debug!(position = self.anchor_song, "Playback paused");
    }

    /// Stops immediately. Pending note offs are dropped and every voice is killed.
    pub fn stop(&mut self) {
        self.control.stop_all(true);
        self.state = PlaybackState::Stopped;
        self.cursor = 0;
        self.anchor_song = 0.0;
        info!("Playback stopped");
    }

    /// Moves to a time in seconds. A stopped or finished sequencer becomes paused
    /// at the new position.
    pub fn seek(&mut self, seconds: f64) {
        let seconds = seconds.max(0.0);
        let tick = self.midi.tempo().seconds_to_ticks(seconds);
        self.relocate(tick, seconds);
        if self.state != PlaybackState::Playing {
            self.state = PlaybackState::Paused;
        }
    }

    /// Moves to a tick.
    pub fn seek_ticks(&mut self, tick: u64) {
        self.seek(self.midi.tempo().ticks_to_seconds(tick));
    }

    pub fn set_loop(&mut self, enabled: bool) {
        self.looping = enabled;
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// Limits how many times the loop repeats. None loops until looping is turned
    /// off.
    pub fn set_loop_count(&mut self, count: Option<u32>) {
        self.loops_remaining = count;
    }

    pub fn loop_region(&self) -> LoopRegion {
        self.loop_region
    }

    /// Replaces the loop region. Empty regions are refused.
    pub fn set_loop_region(&mut self, start: u64, end: u64) -> bool {
        if start >= end {
            warn!(start, end, "Refusing empty loop region");
            return false;
        }
        self.loop_region = LoopRegion { start, end };
        true
    }

    /// How often playback has jumped back to the loop start.
    pub fn loops_played(&self) -> u32 {
        self.loops_played
    }

    /// The region to loop over, if looping is on and the region has a length. A
    /// song whose events all sit on one tick plays once.
    fn active_loop(&self) -> Option<LoopRegion> {
        let region = self.loop_region;
        (self.looping && self.loops_remaining != Some(0) && region.start < region.end)
            .then_some(region)
    }

    /// Dispatches every event that is due and handles the loop and the end of the
    /// file. Returns the state afterwards.
    pub fn poll(&mut self) -> PlaybackState {
        if self.state != PlaybackState::Playing {
            return self.state;
        }

        let mut now = self.current_time();
        loop {
            let loop_end = self.active_loop().map(|region| region.end);
            while let Some(event) = self.stream.get(self.cursor) {
                if event.seconds > now || loop_end.is_some_and(|end| event.tick >= end) {
                    break;
                }
                dispatch(&mut self.control, &event.kind);
                self.cursor += 1;
            }

            let Some(region) = self.active_loop() else {
                if self.cursor >= self.stream.len() {
                    self.finish(now);
                }
                return self.state;
            };

            let tempo = self.midi.tempo();
            let end_seconds = tempo.ticks_to_seconds(region.end);
            if now < end_seconds {
                return self.state;
            }
            let start_seconds = tempo.ticks_to_seconds(region.start);
            let overshoot = now - end_seconds;

            self.loops_played += 1;
            if let Some(remaining) = self.loops_remaining.as_mut() {
                *remaining = remaining.saturating_sub(1);
            }
            debug!(
                start = region.start,
                end = region.end,
                loops = self.loops_played,
                "Looping"
            );
            self.relocate(region.start, start_seconds + overshoot);
            now = self.current_time();
        }
    }

    fn finish(&mut self, now: f64) {
        self.control.stop_all(false);
        self.anchor_song = now;
        self.state = PlaybackState::Finished;
        info!(duration = now, "Playback finished");
    }

    /// Releases sounding notes, rebuilds channel state as it would be at `tick`
    /// and continues from there at song time `seconds`.
    fn relocate(&mut self, tick: u64, seconds: f64) {
        self.control.stop_all(false);
        let cursor = self.stream.position(tick);

        self.control.begin_snapshot();
        self.control.reset_channels();
        let mut pending = Coalesced::new(self.control.channels().len());
        for event in &self.stream.events()[..cursor] {
            match &event.kind {
                EventKind::Channel { channel, message } => {
                    let channel = *channel as usize;
                    match *message {
                        MidiMessage::NoteOn { .. } | MidiMessage::NoteOff { .. } => {}
                        MidiMessage::ProgramChange { program } => {
                            let bank = self
                                .control
                                .channel(channel)
                                .map_or(0, |state| state.pending_bank());
                            pending.program(channel, bank, program.as_int());
                        }
                        MidiMessage::PitchBend { bend } => pending.bend(channel, bend.0.as_int()),
                        MidiMessage::Controller { controller, .. }
                            if controller.as_int() == CC_RESET_CONTROLLERS =>
                        {
                            pending.flush(&mut self.control);
                            self.control.dispatch(channel, *message);
                        }
                        other => self.control.dispatch(channel, other),
                    }
                }
                EventKind::SysEx(data) => {
                    pending.flush(&mut self.control);
                    self.control.system_exclusive(data);
                }
                EventKind::Tempo(_) | EventKind::Meta { .. } => {}
            }
        }
        pending.flush(&mut self.control);
        self.control.end_snapshot();

        self.cursor = cursor;
        self.anchor_song = seconds;
        self.anchor_clock = self.clock.seconds();
        debug!(tick, seconds, "Relocated");
    }
}

/// Program and pitch bend changes held back during a seek so only the last one
/// per channel is applied. Flushed before anything that resets channels.
struct Coalesced {
    programs: Vec<Option<(u16, u8)>>,
    bends: Vec<Option<u16>>,
}

impl Coalesced {
    fn new(channels: usize) -> Coalesced {
        Coalesced {
            programs: vec![None; channels],
            bends: vec![None; channels],
        }
    }

    fn program(&mut self, channel: usize, bank: u16, program: u8) {
        if let Some(slot) = self.programs.get_mut(channel) {
            *slot = Some((bank, program));
        }
    }

    fn bend(&mut self, channel: usize, value: u16) {
        if let Some(slot) = self.bends.get_mut(channel) {
            *slot = Some(value);
        }
    }

    fn flush(&mut self, control: &mut SynthControl) {
        for (channel, slot) in self.programs.iter_mut().enumerate() {
            if let Some((bank, program)) = slot.take() {
                control.select_program(channel, bank, program);
            }
        }
        for (channel, slot) in self.bends.iter_mut().enumerate() {
            if let Some(value) = slot.take() {
                control.pitch_wheel(channel, value);
            }
        }
    }
}

fn dispatch(control: &mut SynthControl, kind: &EventKind) {
    match kind {
        EventKind::Channel { channel, message } => control.dispatch(*channel as usize, *message),
        EventKind::SysEx(data) => control.system_exclusive(data),
        EventKind::Tempo(_) | EventKind::Meta { .. } => {}
    }
}

impl std::fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequencer")
            .field("state", &self.state)
            .field("position", &self.current_time())
            .field("cursor", &self.cursor)
            .field("events", &self.stream.len())
            .field("looping", &self.looping)
            .field("loop_region", &self.loop_region)
            .finish()
    }
}
