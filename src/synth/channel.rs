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

//! Per-channel MIDI state.
//!
//! [`ChannelState`] is the full controller state and lives on the control side.
//! [`ChannelMix`] is the small part of it that the render side needs, and is what
//! crosses the command queue.

use crate::soundfont::PERCUSSION_BANK;

pub const CHANNELS_PER_PORT: usize = 16;

/// Channel 10 of every port plays drums.
pub const PERCUSSION_CHANNEL: usize = 9;

/// The pitch wheel value that means no bend.
pub const PITCH_BEND_CENTER: u16 = 8192;

/// Every channel is scaled by this before volume and expression.
pub const CHANNEL_LOUDNESS: f64 = 0.5;

const DEFAULT_VOLUME: f64 = 100.0 / 127.0;
const DEFAULT_BEND_RANGE: f64 = 2.0;
const DEFAULT_BRIGHTNESS: u8 = 64;

/// Cents of vibrato depth the modulation wheel adds at full travel.
const MODULATION_DEPTH_CENTS: f64 = 50.0;

/// Installed the first time any vibrato parameter is changed.
const DEFAULT_VIBRATO: ChannelVibrato = ChannelVibrato {
    depth_cents: 30.0,
    rate_hz: 6.0,
    delay: 0.6,
};

/// NRPN MSB of the vibrato parameters.
const NRPN_VIBRATO: u8 = 1;
const NRPN_VIBRATO_RATE: u8 = 8;
const NRPN_VIBRATO_DEPTH: u8 = 9;
const NRPN_VIBRATO_DELAY: u8 = 10;

const RPN_BEND_RANGE: u16 = 0;
const RPN_FINE_TUNING: u16 = 1;
const RPN_COARSE_TUNING: u16 = 2;
const RPN_NULL: u16 = 0x3FFF;

pub const CC_BANK_SELECT: u8 = 0;
pub const CC_MODULATION: u8 = 1;
pub const CC_DATA_ENTRY: u8 = 6;
pub const CC_VOLUME: u8 = 7;
pub const CC_PAN: u8 = 10;
pub const CC_EXPRESSION: u8 = 11;
pub const CC_HOLD_PEDAL: u8 = 64;
pub const CC_BRIGHTNESS: u8 = 74;
pub const CC_NRPN_LSB: u8 = 98;
pub const CC_NRPN_MSB: u8 = 99;
pub const CC_RPN_LSB: u8 = 100;
pub const CC_RPN_MSB: u8 = 101;
pub const CC_ALL_SOUND_OFF: u8 = 120;
pub const CC_RESET_CONTROLLERS: u8 = 121;
pub const CC_ALL_NOTES_OFF: u8 = 123;

/// The channel-wide vibrato LFO.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChannelVibrato {
    pub depth_cents: f64,
    pub rate_hz: f64,
    pub delay: f64,
}

impl ChannelVibrato {
    fn is_unset(&self) -> bool {
        self.depth_cents == 0.0 && self.rate_hz == 0.0 && self.delay == 0.0
    }
}

/// What the render side needs to know about a channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelMix {
    /// Linear gain from loudness, volume and expression.
    pub gain: f64,
    /// -1 (left) to 1 (right), added to each voice's own pan.
    pub pan: f64,
    /// Pitch bend plus transpose, in semitones.
    pub bend_semitones: f64,
    /// Playback rate multiplier from the tuning RPNs.
    pub tuning: f64,
    /// Added to the depth of every zone vibrato.
    pub modulation_cents: f64,
    pub vibrato: ChannelVibrato,
}

impl Default for ChannelMix {
    fn default() -> Self {
        ChannelState::new(false).mix()
    }
}

/// Which parameter a data entry message changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DataEntry {
    Idle,
    RegisteredCoarse,
    RegisteredFine,
    NonRegisteredCoarse,
    NonRegisteredFine,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelState {
    /// The bank used by the next program change.
    bank_select: u16,
    bank: u16,
    program: u8,
    /// Index of the selected preset in the SoundFont.
    preset: usize,
    percussion: bool,
    pitch_bend: u16,
    bend_range: f64,
    transpose: f64,
    hold_pedal: bool,
    held_notes: Vec<u8>,
    volume: f64,
    expression: f64,
    pan: f64,
    brightness: u8,
    modulation: u8,
    coarse_tuning: f64,
    fine_tuning: f64,
    vibrato: ChannelVibrato,
    data_entry: DataEntry,
    rpn: u16,
    nrpn_msb: u8,
    nrpn_lsb: u8,
}

impl ChannelState {
    pub fn new(percussion: bool) -> ChannelState {
        let bank = if percussion { PERCUSSION_BANK } else { 0 };
        ChannelState {
            bank_select: bank,
            bank,
            program: 0,
            preset: 0,
            percussion,
            pitch_bend: PITCH_BEND_CENTER,
            bend_range: DEFAULT_BEND_RANGE,
            transpose: 0.0,
            hold_pedal: false,
            held_notes: Vec::new(),
            volume: DEFAULT_VOLUME,
            expression: 1.0,
            pan: 0.0,
            brightness: DEFAULT_BRIGHTNESS,
            modulation: 0,
            coarse_tuning: 0.0,
            fine_tuning: 0.0,
            vibrato: ChannelVibrato::default(),
            data_entry: DataEntry::Idle,
            rpn: RPN_NULL,
            nrpn_msb: 0,
            nrpn_lsb: 0,
        }
    }

    pub fn mix(&self) -> ChannelMix {
        let bend = (self.pitch_bend as f64 - PITCH_BEND_CENTER as f64) / PITCH_BEND_CENTER as f64
            * self.bend_range;
        let transpose = if self.percussion { 0.0 } else { self.transpose };
        ChannelMix {
            gain: CHANNEL_LOUDNESS * self.volume * self.expression,
            pan: self.pan,
            bend_semitones: bend + transpose,
            tuning: 2f64.powf((self.coarse_tuning + self.fine_tuning) / 12.0),
            modulation_cents: self.modulation as f64 / 128.0 * MODULATION_DEPTH_CENTS,
            vibrato: self.vibrato,
        }
    }

    /// Returns every controller to its power-on value. Held notes are returned so
    /// that they can be released.
    pub fn reset_controllers(&mut self) -> Vec<u8> {
        self.pitch_bend = PITCH_BEND_CENTER;
        self.bend_range = DEFAULT_BEND_RANGE;
        self.volume = DEFAULT_VOLUME;
        self.expression = 1.0;
        self.pan = 0.0;
        self.brightness = DEFAULT_BRIGHTNESS;
        self.modulation = 0;
        self.coarse_tuning = 0.0;
        self.fine_tuning = 0.0;
        self.vibrato = ChannelVibrato::default();
        self.data_entry = DataEntry::Idle;
        self.rpn = RPN_NULL;
        self.set_hold_pedal(false)
    }

    /// Applies a controller that only changes channel state. Returns false for
    /// controllers this does not handle.
    pub fn set_controller(&mut self, controller: u8, value: u8) -> bool {
        match controller {
            CC_BANK_SELECT => {
                if !self.percussion {
                    self.bank_select = value as u16;
                }
            }
            CC_MODULATION => self.modulation = value,
            CC_VOLUME => self.volume = value as f64 / 127.0,
            CC_PAN => self.pan = (value as f64 - 64.0) / 64.0,
            CC_EXPRESSION => self.expression = value as f64 / 127.0,
            CC_BRIGHTNESS => self.brightness = value,
            CC_DATA_ENTRY => self.data_entry(value),
            CC_RPN_MSB => {
                self.rpn = (value as u16) << 7 | (self.rpn & 0x7F);
                self.select_registered(DataEntry::RegisteredCoarse);
            }
            CC_RPN_LSB => {
                self.rpn = (self.rpn & 0x3F80) | value as u16;
                self.select_registered(DataEntry::RegisteredFine);
            }
            CC_NRPN_MSB => {
                self.nrpn_msb = value;
                self.data_entry = DataEntry::NonRegisteredCoarse;
            }
            CC_NRPN_LSB => {
                self.nrpn_lsb = value;
                self.data_entry = DataEntry::NonRegisteredFine;
            }
            _ => return false,
        }
        true
    }

    fn select_registered(&mut self, state: DataEntry) {
        self.data_entry = if self.rpn == RPN_NULL {
            DataEntry::Idle
        } else {
            state
        };
    }

    fn data_entry(&mut self, value: u8) {
        match self.data_entry {
            DataEntry::RegisteredCoarse | DataEntry::RegisteredFine => match self.rpn {
                RPN_BEND_RANGE => self.bend_range = value as f64,
                RPN_FINE_TUNING => self.fine_tuning = (value as f64 - 64.0) / 64.0,
                RPN_COARSE_TUNING => self.coarse_tuning = value as f64 - 64.0,
                _ => {}
            },
            DataEntry::NonRegisteredFine if self.nrpn_msb == NRPN_VIBRATO => {
                self.vibrato_parameter(self.nrpn_lsb, value)
            }
            _ => {}
        }
    }

    fn vibrato_parameter(&mut self, parameter: u8, value: u8) {
        if value == 64 {
            return;
        }
        if self.vibrato.is_unset() {
            self.vibrato = DEFAULT_VIBRATO;
        }
        let value = value as f64;
        match parameter {
            NRPN_VIBRATO_RATE => self.vibrato.rate_hz = value / 64.0 * 8.0,
            NRPN_VIBRATO_DEPTH => self.vibrato.depth_cents = value / 2.0,
            NRPN_VIBRATO_DELAY => self.vibrato.delay = value / 64.0 / 3.0,
            _ => {}
        }
    }

    /// Sets the pedal. Releasing it returns the notes it was holding.
    pub fn set_hold_pedal(&mut self, down: bool) -> Vec<u8> {
        self.hold_pedal = down;
        if down {
            Vec::new()
        } else {
            std::mem::take(&mut self.held_notes)
        }
    }

    /// Queues a note off while the pedal is down. Returns false if the pedal is up.
    pub fn hold_note(&mut self, key: u8) -> bool {
        if !self.hold_pedal {
            return false;
        }
        if !self.held_notes.contains(&key) {
            self.held_notes.push(key);
        }
        true
    }

    /// Forgets any queued note offs.
    pub fn clear_held_notes(&mut self) {
        self.held_notes.clear();
    }

    pub fn set_pitch_bend(&mut self, value: u16) {
        self.pitch_bend = value.min(0x3FFF);
    }

    /// The bank the next program change will select from.
    pub fn pending_bank(&self) -> u16 {
        if self.percussion {
            PERCUSSION_BANK
        } else {
            self.bank_select
        }
    }

    pub fn set_program(&mut self, bank: u16, program: u8, preset: usize) {
        self.bank = bank;
        self.program = program;
        self.preset = preset;
    }

    pub fn set_percussion(&mut self, percussion: bool) {
        self.percussion = percussion;
        self.bank_select = if percussion { PERCUSSION_BANK } else { 0 };
    }

    pub fn set_transpose(&mut self, semitones: f64) {
        self.transpose = semitones;
    }

    pub fn bank(&self) -> u16 {
        self.bank
    }

    pub fn program(&self) -> u8 {
        self.program
    }

    pub fn preset(&self) -> usize {
        self.preset
    }

    pub fn is_percussion(&self) -> bool {
        self.percussion
    }

    pub fn pitch_bend(&self) -> u16 {
        self.pitch_bend
    }

    pub fn bend_range(&self) -> f64 {
        self.bend_range
    }

    pub fn hold_pedal(&self) -> bool {
        self.hold_pedal
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn pan(&self) -> f64 {
        self.pan
    }

    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    /// Transpose set by the host, in semitones.
    pub fn transpose(&self) -> f64 {
        self.transpose
    }

    pub fn vibrato(&self) -> ChannelVibrato {
        self.vibrato
    }
}

/// The channel table, sixteen channels per port.
#[derive(Debug, Clone, PartialEq)]
pub struct Channels {
    states: Vec<ChannelState>,
}

impl Channels {
    pub fn new(ports: usize) -> Channels {
        let mut channels = Channels { states: Vec::new() };
        for _ in 0..ports.max(1) {
            channels.add_port();
        }
        channels
    }

    /// Adds sixteen channels and returns the index of the first.
    pub fn add_port(&mut self) -> usize {
        let first = self.states.len();
        self.states
            .extend((0..CHANNELS_PER_PORT).map(|i| ChannelState::new(i == PERCUSSION_CHANNEL)));
        first
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn get(&self, channel: usize) -> Option<&ChannelState> {
        self.states.get(channel)
    }

    pub fn get_mut(&mut self, channel: usize) -> Option<&mut ChannelState> {
        self.states.get_mut(channel)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChannelState> {
        self.states.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ChannelState> {
        self.states.iter_mut()
    }

    /// Resets every channel to its power-on state, including programs. Transpose
    /// belongs to the host and is kept.
    pub fn reset(&mut self) {
        for (i, state) in self.states.iter_mut().enumerate() {
            let transpose = state.transpose;
            *state = ChannelState::new(i % CHANNELS_PER_PORT == PERCUSSION_CHANNEL);
            state.transpose = transpose;
        }
    }
}
