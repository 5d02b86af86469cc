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

//! The control side of the synthesizer.
//!
//! [`SynthControl`] is the only writer of channel state. It turns MIDI into
//! resolved voice commands for the render side and tells listeners what happened.

use std::sync::Arc;

use midly::{
    live::{LiveEvent, SystemCommon},
    num::u7,
    MidiMessage,
};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::UnknownEvent;
use crate::soundfont::SoundFont;

use super::channel::{
    ChannelState, Channels, CC_ALL_NOTES_OFF, CC_ALL_SOUND_OFF, CC_HOLD_PEDAL,
    CC_RESET_CONTROLLERS, CHANNELS_PER_PORT,
};
use super::command::{ChannelSnapshot, CommandSender, NoteStart, SynthCommand};
use super::params::VoiceParams;

/// GS parts map to channels with the rhythm part first.
const GS_PART_CHANNELS: [usize; 16] = [9, 0, 1, 2, 3, 4, 5, 6, 7, 8, 10, 11, 12, 13, 14, 15];

/// Callbacks for anything that wants to follow what the synthesizer is playing.
/// Every method defaults to doing nothing.
pub trait EventListener: Send {
    fn on_note_on(&mut self, _channel: usize, _key: u8, _velocity: u8) {}
    fn on_note_off(&mut self, _channel: usize, _key: u8) {}
    fn on_program_change(&mut self, _channel: usize, _bank: u16, _program: u8, _preset: &str) {}
    fn on_controller_change(&mut self, _channel: usize, _controller: u8, _value: u8) {}
    fn on_pitch_wheel(&mut self, _channel: usize, _value: u16) {}
}

pub struct SynthControl {
    font: Arc<SoundFont>,
    channels: Channels,
    sender: CommandSender,
    snapshot: Arc<Mutex<ChannelSnapshot>>,
    listeners: Vec<Box<dyn EventListener>>,
    next_note_id: u64,
    /// While set, channel changes are only published by `end_snapshot`.
    in_snapshot: bool,
}

impl SynthControl {
    pub(crate) fn new(
        font: Arc<SoundFont>,
        sender: CommandSender,
        snapshot: Arc<Mutex<ChannelSnapshot>>,
    ) -> SynthControl {
        let mut control = SynthControl {
            font,
            channels: Channels::new(1),
            sender,
            snapshot,
            listeners: Vec::new(),
            next_note_id: 0,
            in_snapshot: false,
        };
        control.select_default_presets(0);
        control
    }

    pub fn font(&self) -> &Arc<SoundFont> {
        &self.font
    }

    pub fn channels(&self) -> &Channels {
        &self.channels
    }

    pub fn channel(&self, channel: usize) -> Option<&ChannelState> {
        self.channels.get(channel)
    }

    pub fn add_listener(&mut self, listener: Box<dyn EventListener>) {
        self.listeners.push(listener);
    }

    fn send(&self, command: SynthCommand) {
        // A full queue is logged by the sender and the command dropped. Releases
        // have a reserve on top of the capacity.
        let _ = self.sender.send(command);
    }

    /// Selects program 0 of each channel's bank from `first` on.
    fn select_default_presets(&mut self, first: usize) {
        for state in self.channels.iter_mut().skip(first) {
            let bank = state.pending_bank();
            let (preset, _) = self.font.find_preset(bank, 0);
            state.set_program(bank, 0, preset);
        }
    }

    fn publish_channel(&self, channel: usize) {
        if self.in_snapshot {
            return;
        }
        if let Some(state) = self.channels.get(channel) {
            self.send(SynthCommand::Channel {
                channel,
                mix: state.mix(),
            });
        }
    }

    /// Stages every channel mix and asks the render side to swap them in at once.
    fn publish_all(&self) {
        self.snapshot
            .lock()
            .stage(self.channels.iter().map(ChannelState::mix));
        self.send(SynthCommand::SwapChannels);
    }

    /// Starts a batch of channel changes that the render side sees all at once.
    pub fn begin_snapshot(&mut self) {
        self.in_snapshot = true;
    }

    /// Publishes the changes made since `begin_snapshot`.
    pub fn end_snapshot(&mut self) {
        self.in_snapshot = false;
        self.publish_all();
    }

    /// Starts one voice per matching sample layer.
    pub fn note_on(&mut self, channel: usize, key: u8, velocity: u8) {
        if velocity == 0 {
            self.note_off(channel, key);
            return;
        }
        let Some(state) = self.channels.get(channel) else {
            warn!(channel, key, "Note on for an unknown channel");
            return;
        };
        let Some(preset) = self.font.preset(state.preset()) else {
            return;
        };

        let note_id = self.next_note_id;
        self.next_note_id += 1;

        let samples = self.font.samples();
        let sender = &self.sender;
        let mut layers = 0;
        preset.for_each_layer(self.font.instruments(), key, velocity, |layer| {
            let Some(sample) = samples.get(layer.sample) else {
                return;
            };
            layers += 1;
            let _ = sender.send(SynthCommand::StartVoice(NoteStart {
                note_id,
                channel,
                key,
                sample: layer.sample,
                params: VoiceParams::new(&layer, sample, key, velocity),
            }));
        });
        if layers == 0 {
            warn!(
                channel,
                key,
                velocity,
                preset = preset.name(),
                "No samples for note"
            );
        }

        for listener in self.listeners.iter_mut() {
            listener.on_note_on(channel, key, velocity);
        }
    }

    /// Releases a note, or queues the release while the hold pedal is down.
    pub fn note_off(&mut self, channel: usize, key: u8) {
        let Some(state) = self.channels.get_mut(channel) else {
            return;
        };
        if !state.hold_note(key) {
            self.send(SynthCommand::NoteOff { channel, key });
        }
        for listener in self.listeners.iter_mut() {
            listener.on_note_off(channel, key);
        }
    }

    pub fn controller_change(&mut self, channel: usize, controller: u8, value: u8) {
        let Some(state) = self.channels.get_mut(channel) else {
            return;
        };
        match controller {
            CC_HOLD_PEDAL => {
                for key in state.set_hold_pedal(value >= 64) {
                    self.send(SynthCommand::NoteOff { channel, key });
                }
            }
            CC_ALL_SOUND_OFF => {
                state.clear_held_notes();
                self.send(SynthCommand::KillAll {
                    channel: Some(channel),
                });
            }
            CC_ALL_NOTES_OFF => {
                state.clear_held_notes();
                self.send(SynthCommand::ReleaseAll {
                    channel: Some(channel),
                });
            }
            CC_RESET_CONTROLLERS => {
                for key in state.reset_controllers() {
                    self.send(SynthCommand::NoteOff { channel, key });
                }
                self.publish_channel(channel);
            }
            _ => {
                if state.set_controller(controller, value) {
                    self.publish_channel(channel);
                } else {
                    debug!(channel, controller, value, "Ignoring controller");
                }
            }
        }

        for listener in self.listeners.iter_mut() {
            listener.on_controller_change(channel, controller, value);
        }
    }

    /// Selects a preset from the channel's bank. Missing presets fall back.
    pub fn program_change(&mut self, channel: usize, program: u8) {
        let Some(state) = self.channels.get(channel) else {
            return;
        };
        self.select_program(channel, state.pending_bank(), program);
    }

    /// Selects a preset from an explicit bank, regardless of the bank select
    /// controller.
    pub fn select_program(&mut self, channel: usize, bank: u16, program: u8) {
        let Some(state) = self.channels.get_mut(channel) else {
            return;
        };
        let (preset, fallback) = self.font.find_preset(bank, program as u16);
        if let Some(fallback) = fallback {
            warn!(channel, fallback = %fallback, "Preset fallback");
        }
        state.set_program(bank, program, preset);

        let name = self.font.preset(preset).map_or("", |p| p.name());
        debug!(channel, bank, program, preset = name, "Program change");
        for listener in self.listeners.iter_mut() {
            listener.on_program_change(channel, bank, program, name);
        }
    }

    /// Sets the pitch wheel, a 14 bit value centered on 8192.
    pub fn pitch_wheel(&mut self, channel: usize, value: u16) {
        let Some(state) = self.channels.get_mut(channel) else {
            return;
        };
        state.set_pitch_bend(value);
        self.publish_channel(channel);
        for listener in self.listeners.iter_mut() {
            listener.on_pitch_wheel(channel, value);
        }
    }

    /// Transposes a channel by a number of semitones. Drum channels ignore it.
    pub fn transpose_channel(&mut self, channel: usize, semitones: f64) {
        if let Some(state) = self.channels.get_mut(channel) {
            state.set_transpose(semitones);
            self.publish_channel(channel);
        }
    }

    /// Handles GM and GS system exclusive messages. The leading 0xF0 and trailing
    /// 0xF7 are optional.
    pub fn system_exclusive(&mut self, data: &[u8]) {
        let data = data.strip_prefix(&[0xF0]).unwrap_or(data);
        let data = data.strip_suffix(&[0xF7]).unwrap_or(data);
        match data {
            // GM system on.
            [0x7E, _, 0x09, 0x01, ..] => {
                info!("GM system on");
                self.reset();
            }
            // GS reset.
            [0x41, _, 0x42, 0x12, 0x40, 0x00, 0x7F, 0x00, ..] => {
                info!("GS reset");
                self.reset();
            }
            // GS use for rhythm part.
            [0x41, _, 0x42, 0x12, 0x40, part, 0x15, value, ..] if part & 0xF0 == 0x10 => {
                let channel = GS_PART_CHANNELS[(part & 0x0F) as usize];
                self.set_drums(channel, *value != 0);
            }
            _ => {
                warn!(
                    err = %UnknownEvent::SystemExclusive { len: data.len() },
                    "Ignoring system exclusive message"
                );
            }
        }
    }

    /// Switches a channel between melodic and drum presets, keeping its program.
    pub fn set_drums(&mut self, channel: usize, drums: bool) {
        let Some(state) = self.channels.get_mut(channel) else {
            return;
        };
        state.set_percussion(drums);
        let program = state.program();
        debug!(channel, drums, "Rhythm part");
        self.program_change(channel, program);
        self.publish_channel(channel);
    }

    /// Routes a decoded channel message to the entry points.
    pub fn dispatch(&mut self, channel: usize, message: MidiMessage) {
        match message {
            MidiMessage::NoteOn { key, vel } => self.note_on(channel, key.as_int(), vel.as_int()),
            MidiMessage::NoteOff { key, .. } => self.note_off(channel, key.as_int()),
            MidiMessage::Controller { controller, value } => {
                self.controller_change(channel, controller.as_int(), value.as_int())
            }
            MidiMessage::ProgramChange { program } => self.program_change(channel, program.as_int()),
            MidiMessage::PitchBend { bend } => self.pitch_wheel(channel, bend.0.as_int()),
            MidiMessage::Aftertouch { .. } | MidiMessage::ChannelAftertouch { .. } => {}
        }
    }

    /// Parses and handles one raw live MIDI message, on the first port.
    pub fn process_midi_event(&mut self, bytes: &[u8]) {
        match LiveEvent::parse(bytes) {
            Ok(LiveEvent::Midi { channel, message }) => {
                self.dispatch(channel.as_int() as usize, message)
            }
            Ok(LiveEvent::Common(SystemCommon::SysEx(data))) => {
                self.system_exclusive(u7::slice_as_int(data))
            }
            Ok(event) => debug!(event = ?event, "Ignoring live MIDI event"),
            Err(e) => warn!(
                err = %UnknownEvent::Live(e.to_string()),
                "Ignoring live MIDI message"
            ),
        }
    }

    /// Stops every voice. A forced stop also lifts the hold pedal and kills voices
    /// instead of releasing them.
    pub fn stop_all(&mut self, force: bool) {
        for state in self.channels.iter_mut() {
            state.clear_held_notes();
            if force {
                state.set_hold_pedal(false);
            }
        }
        if force {
            self.send(SynthCommand::KillAll { channel: None });
        } else {
            self.send(SynthCommand::ReleaseAll { channel: None });
        }
    }

    /// Returns every channel to its power-on state without publishing it. Used
    /// inside a snapshot.
    pub fn reset_channels(&mut self) {
        self.channels.reset();
        self.select_default_presets(0);
    }

    /// Returns every channel to its power-on state, programs included.
    pub fn reset(&mut self) {
        self.reset_channels();
        if !self.in_snapshot {
            self.publish_all();
        }
    }

    /// Adds sixteen more channels and returns the first new channel.
    pub fn add_port(&mut self) -> usize {
        let first = self.channels.add_port();
        self.select_default_presets(first);
        info!(
            ports = self.channels.len() / CHANNELS_PER_PORT,
            "Added MIDI port"
        );
        if !self.in_snapshot {
            self.publish_all();
        }
        first
    }
}

impl std::fmt::Debug for SynthControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthControl")
            .field("channels", &self.channels.len())
            .field("listeners", &self.listeners.len())
            .field("sender", &self.sender)
            .finish()
    }
}
