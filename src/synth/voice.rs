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

//! Voices and the fixed-size voice pool.
//!
//! A voice plays one sample for one note. The pool is allocated once when the
//! synthesizer is created, and a finished voice is simply a free slot.

use std::f64::consts::{FRAC_PI_4, TAU};

use crate::error::ResourceExhaustion;

use super::channel::ChannelMix;
use super::command::NoteStart;
use super::envelope::{Envelope, EnvelopePhase};
use super::params::{LoopMode, VoiceParams};

/// The pool sheds releasing voices once more than this share of it is in use.
const PRESSURE_NUMERATOR: usize = 9;
const PRESSURE_DENOMINATOR: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VoiceState {
    /// Delay and attack.
    Starting,
    /// Hold, decay and sustain.
    Sustaining,
    Releasing,
    #[default]
    Finished,
    /// Fading out over the kill fade.
    Killed,
}

impl VoiceState {
    /// Whether the note is still held.
    pub fn is_sounding(self) -> bool {
        matches!(self, VoiceState::Starting | VoiceState::Sustaining)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Voice {
    note_id: u64,
    channel: usize,
    key: u8,
    sample: usize,
    params: VoiceParams,
    envelope: Envelope,
    state: VoiceState,
    /// Playback position in sample frames.
    position: f64,
    looping: bool,
    /// Pitch offset in semitones from bend and transpose.
    bend: f64,
    /// Seconds since the voice started.
    time: f64,
    /// Allocation order, used to pick voices to shed.
    age: u64,
}

impl Voice {
    /// Starts the voice and returns its exclusive class (0 for none).
    pub fn start(&mut self, note: &NoteStart, bend: f64, output_rate: f64) -> u32 {
        let params = note.params;
        *self = Voice {
            note_id: note.note_id,
            channel: note.channel,
            key: note.key,
            sample: note.sample,
            params,
            envelope: Envelope::new(&params.envelope, params.velocity_gain(), output_rate),
            state: VoiceState::Starting,
            position: params.start as f64,
            looping: params.loop_mode != LoopMode::None,
            bend,
            time: 0.0,
            age: self.age,
        };
        params.exclusive_class
    }

    /// Moves a held voice into its release.
    pub fn release(&mut self) {
        if !self.state.is_sounding() {
            return;
        }
        if self.params.loop_mode == LoopMode::UntilRelease {
            self.looping = false;
        }
        self.envelope.release();
        self.state = VoiceState::Releasing;
    }

    /// Fades the voice out over `fade` seconds, whatever it is doing.
    pub fn kill(&mut self, fade: f64) {
        if matches!(self.state, VoiceState::Finished | VoiceState::Killed) {
            return;
        }
        self.envelope.release_over(fade);
        self.state = VoiceState::Killed;
    }

    /// Retunes the voice by a number of semitones without touching the envelope.
    pub fn bend(&mut self, semitones: f64) {
        self.bend = semitones;
    }

    pub fn state(&self) -> VoiceState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state != VoiceState::Finished
    }

    pub fn note_id(&self) -> u64 {
        self.note_id
    }

    pub fn channel(&self) -> usize {
        self.channel
    }

    pub fn key(&self) -> u8 {
        self.key
    }

    pub fn sample(&self) -> usize {
        self.sample
    }

    pub fn exclusive_class(&self) -> u32 {
        self.params.exclusive_class
    }

    pub fn params(&self) -> &VoiceParams {
        &self.params
    }

    /// The pitch offset in cents of both vibrato LFOs at the voice's current time.
    fn vibrato_cents(&self, mix: &ChannelMix) -> f64 {
        let mut cents = 0.0;
        let zone = &self.params.vibrato;
        let depth = zone.depth_cents + mix.modulation_cents;
        if depth != 0.0 && self.time >= zone.delay {
            cents += depth * (TAU * zone.rate_hz * (self.time - zone.delay)).sin();
        }
        let channel = &mix.vibrato;
        if channel.depth_cents != 0.0 && self.time >= channel.delay {
            cents += channel.depth_cents * (TAU * channel.rate_hz * (self.time - channel.delay)).sin();
        }
        cents
    }

    /// Mixes one block of the voice into `left` and `right`. Pitch, pan and gain are
    /// fixed for the block.
    pub fn render(
        &mut self,
        data: &[f32],
        mix: &ChannelMix,
        output_rate: f64,
        left: &mut [f32],
        right: &mut [f32],
    ) -> VoiceState {
        if !self.is_active() {
            return self.state;
        }

        let step = self.params.rate(self.bend)
            * mix.tuning
            * 2f64.powf(self.vibrato_cents(mix) / 1200.0)
            * self.params.sample_rate as f64
            / output_rate;

        let pan = (self.params.pan + mix.pan).clamp(-1.0, 1.0);
        let angle = (pan + 1.0) * FRAC_PI_4;
        let gain = mix.gain;
        let (left_gain, right_gain) = ((angle.cos() * gain) as f32, (angle.sin() * gain) as f32);

        let end = self.params.end.min(data.len());
        let loop_start = self.params.loop_start as f64;
        let loop_end = self.params.loop_end;
        let loop_len = (loop_end - self.params.loop_start) as f64;

        let frames = left.len().min(right.len());
        for i in 0..frames {
            let level = self.envelope.next_level();
            let index = self.position as usize;
            if self.envelope.is_done() || index >= end {
                self.state = VoiceState::Finished;
                break;
            }

            let next = if self.looping && index + 1 >= loop_end {
                self.params.loop_start
            } else {
                index + 1
            };
            let a = data[index];
            let b = if next < end { data[next] } else { 0.0 };
            let frac = (self.position - index as f64) as f32;
            let value = (a + (b - a) * frac) * level as f32;

            left[i] += value * left_gain;
            right[i] += value * right_gain;

            self.position += step;
            if self.looping && self.position >= loop_end as f64 {
                self.position = loop_start + (self.position - loop_start) % loop_len;
            }
        }

        if self.state == VoiceState::Starting
            && !matches!(
                self.envelope.phase(),
                EnvelopePhase::Delay | EnvelopePhase::Attack
            )
        {
            self.state = VoiceState::Sustaining;
        }
        self.time += frames as f64 / output_rate;
        self.state
    }
}

/// A fixed number of voice slots.
pub struct VoicePool {
    voices: Vec<Voice>,
    next_age: u64,
}

impl VoicePool {
    pub fn new(capacity: usize) -> VoicePool {
        VoicePool {
            voices: vec![Voice::default(); capacity],
            next_age: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.voices.len()
    }

    pub fn active_count(&self) -> usize {
        self.voices.iter().filter(|v| v.is_active()).count()
    }

    /// Claims a free slot.
    pub fn allocate(&mut self) -> Result<&mut Voice, ResourceExhaustion> {
        let capacity = self.voices.len();
        let age = self.next_age;
        match self.voices.iter_mut().find(|v| !v.is_active()) {
            Some(voice) => {
                self.next_age += 1;
                voice.age = age;
                Ok(voice)
            }
            None => Err(ResourceExhaustion::VoicePool { capacity }),
        }
    }

    /// Kills the oldest releasing voice when the pool is nearly full. Returns
    /// whether a voice was shed.
    pub fn relieve_pressure(&mut self, fade: f64) -> bool {
        if self.active_count() * PRESSURE_DENOMINATOR <= self.capacity() * PRESSURE_NUMERATOR {
            return false;
        }
        match self
            .voices
            .iter_mut()
            .filter(|v| v.state == VoiceState::Releasing)
            .min_by_key(|v| v.age)
        {
            Some(voice) => {
                voice.kill(fade);
                true
            }
            None => false,
        }
    }

    /// Kills every voice on the channel in the exclusive class, except those
    /// started by the note `except`.
    pub fn kill_exclusive(&mut self, channel: usize, class: u32, except: u64, fade: f64) -> usize {
        let mut killed = 0;
        for voice in self.voices.iter_mut().filter(|v| {
            v.is_active()
                && v.channel == channel
                && v.params.exclusive_class == class
                && v.note_id != except
        }) {
            voice.kill(fade);
            killed += 1;
        }
        killed
    }

    /// Releases the held voices of a key.
    pub fn release_note(&mut self, channel: usize, key: u8) {
        self.voices
            .iter_mut()
            .filter(|v| v.channel == channel && v.key == key)
            .for_each(Voice::release);
    }

    /// Releases every held voice, optionally only on one channel.
    pub fn release_all(&mut self, channel: Option<usize>) {
        self.voices
            .iter_mut()
            .filter(|v| channel.map_or(true, |c| v.channel == c))
            .for_each(Voice::release);
    }

    /// Kills every voice, optionally only on one channel.
    pub fn kill_all(&mut self, channel: Option<usize>, fade: f64) {
        self.voices
            .iter_mut()
            .filter(|v| channel.map_or(true, |c| v.channel == c))
            .for_each(|v| v.kill(fade));
    }

    /// Applies a new pitch offset to the voices of a channel.
    pub fn bend(&mut self, channel: usize, semitones: f64) {
        self.voices
            .iter_mut()
            .filter(|v| v.is_active() && v.channel == channel)
            .for_each(|v| v.bend(semitones));
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    pub fn voices_mut(&mut self) -> &mut [Voice] {
        &mut self.voices
    }
}
