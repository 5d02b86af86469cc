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

//! Translation of resolved generators into concrete voice parameters.
//!
//! Additive generators are the instrument value (or the default) plus the preset
//! offset. Substitution generators only ever come from the instrument level. Every
//! result is clamped to the generator's range before it is converted.

use crate::soundfont::generator::GeneratorType;
use crate::soundfont::{Sample, SampleLink, ZoneLayer};

/// Initial attenuation is scaled by this factor before conversion. It is empirical:
/// banks authored against EMU hardware expect it.
pub const ATTENUATION_CORRECTION: f64 = 0.4;

/// Release times are capped so that voices always end.
pub const MAX_RELEASE_SECONDS: f64 = 5.0;

/// Sustain never reaches zero.
pub const MIN_SUSTAIN_LEVEL: f64 = 0.001;

/// Attack plus delay below this starts the voice at its peak.
pub const INSTANT_ATTACK_SECONDS: f64 = 0.01;

/// The key the key-scaled envelope generators are centered on.
const ENVELOPE_KEY_CENTER: i32 = 60;

/// Coarse address offsets count in blocks of this many points.
const COARSE_OFFSET: i64 = 32768;

pub fn timecents_to_seconds(timecents: f64) -> f64 {
    2f64.powf(timecents / 1200.0)
}

pub fn decibels_to_gain(decibels: f64) -> f64 {
    10f64.powf(decibels / 20.0)
}

/// Converts absolute cents to Hz (0 cents is 8.176 Hz, 6900 cents is 440 Hz).
pub fn absolute_cents_to_hz(cents: f64) -> f64 {
    440.0 * 2f64.powf((cents - 6900.0) / 1200.0)
}

/// The playback rate for a note relative to the sample's root key, before bend and
/// channel tuning. `scale` is the scale tuning influence, where 1 is 100 cents per key.
pub fn playback_rate(note: f64, root_key: f64, pitch_correction: f64, tune: f64, scale: f64) -> f64 {
    let rate = 2f64.powf((note - root_key) / 12.0) * 2f64.powf(pitch_correction / 1200.0) * tune;
    1.0 + (rate - 1.0) * scale
}

/// Maps the scale tuning generator to an influence factor. Invalid values mean full
/// influence.
pub fn scale_influence(scale_tuning: i32) -> f64 {
    if scale_tuning < 0 {
        1.0
    } else {
        scale_tuning as f64 / 100.0
    }
}

/// Resolves one generator for a zone pairing.
pub fn resolve(layer: &ZoneLayer, ty: GeneratorType) -> i32 {
    let instrument = layer
        .instrument
        .get(ty)
        .map(i32::from)
        .unwrap_or_else(|| ty.default_value());
    if ty.is_substitution() {
        return ty.clamp(instrument);
    }
    let preset = layer.preset.get(ty).map(i32::from).unwrap_or(0);
    ty.clamp(instrument + preset)
}

/// How the sample loop is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopMode {
    #[default]
    None,
    /// Loop for the whole life of the voice.
    Continuous,
    /// Loop until the note is released, then play out the rest of the sample.
    UntilRelease,
}

impl LoopMode {
    fn from_sample_modes(value: i32) -> LoopMode {
        match value & 3 {
            1 => LoopMode::Continuous,
            3 => LoopMode::UntilRelease,
            _ => LoopMode::None,
        }
    }
}

/// The volume envelope. Times are in seconds, levels are linear gains.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EnvelopeParams {
    pub delay: f64,
    pub attack: f64,
    pub hold: f64,
    pub decay: f64,
    pub release: f64,
    /// The level reached at the end of the attack.
    pub peak: f64,
    /// The level held while the note is down, after the decay.
    pub sustain: f64,
}

/// Per-zone vibrato LFO.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VibratoParams {
    pub depth_cents: f64,
    pub rate_hz: f64,
    pub delay: f64,
}

/// Sample address offsets, in points, each combining its fine and coarse generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AddressOffsets {
    pub start: i64,
    pub end: i64,
    pub loop_start: i64,
    pub loop_end: i64,
}

/// Everything a voice needs to play one sample for one note.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VoiceParams {
    /// The key used for pitch and key scaling, after any keyNum override.
    pub key: u8,
    /// The velocity used for gain, after any velocity override.
    pub velocity: u8,
    pub root_key: u8,
    pub pitch_correction: i8,
    pub sample_rate: u32,
    pub coarse_tune: i32,
    pub fine_tune: i32,
    pub scale_tuning: f64,
    pub pan: f64,
    pub exclusive_class: u32,
    pub loop_mode: LoopMode,
    pub offsets: AddressOffsets,
    /// First frame played.
    pub start: usize,
    /// One past the last frame played.
    pub end: usize,
    pub loop_start: usize,
    pub loop_end: usize,
    pub envelope: EnvelopeParams,
    pub vibrato: VibratoParams,
}

impl VoiceParams {
    /// Translates a zone pairing for a note.
    pub fn new(layer: &ZoneLayer, sample: &Sample, key: u8, velocity: u8) -> VoiceParams {
        let get = |ty| resolve(layer, ty);

        let key = match get(GeneratorType::KeyNum) {
            k if k >= 0 => k as u8,
            _ => key,
        };
        let velocity = match get(GeneratorType::Velocity) {
            v if v >= 0 => v as u8,
            _ => velocity,
        };
        let root_key = match get(GeneratorType::OverridingRootKey) {
            k if k >= 0 => k as u8,
            _ => sample.root_key(),
        };

        let offsets = AddressOffsets {
            start: get(GeneratorType::StartAddrsOffset) as i64
                + COARSE_OFFSET * get(GeneratorType::StartAddrsCoarseOffset) as i64,
            end: get(GeneratorType::EndAddrsOffset) as i64
                + COARSE_OFFSET * get(GeneratorType::EndAddrsCoarseOffset) as i64,
            loop_start: get(GeneratorType::StartloopAddrsOffset) as i64
                + COARSE_OFFSET * get(GeneratorType::StartloopAddrsCoarseOffset) as i64,
            loop_end: get(GeneratorType::EndloopAddrsOffset) as i64
                + COARSE_OFFSET * get(GeneratorType::EndloopAddrsCoarseOffset) as i64,
        };

        let len = sample.len() as i64;
        let start = offsets.start.clamp(0, len);
        let end = (len + offsets.end).clamp(start, len);
        let loop_start = (sample.loop_start() as i64 + offsets.loop_start).clamp(start, end);
        let loop_end = (sample.loop_end() as i64 + offsets.loop_end).clamp(loop_start, end);

        let mut loop_mode = LoopMode::from_sample_modes(get(GeneratorType::SampleModes));
        if loop_end <= loop_start {
            loop_mode = LoopMode::None;
        }

        let mut pan = get(GeneratorType::Pan) as f64 / 500.0;
        if layer.instrument.get(GeneratorType::Pan).is_none()
            && layer.preset.get(GeneratorType::Pan).is_none()
        {
            pan = match sample.link() {
                SampleLink::Left => -1.0,
                SampleLink::Right => 1.0,
                _ => pan,
            };
        }

        VoiceParams {
            key,
            velocity,
            root_key,
            pitch_correction: sample.pitch_correction(),
            sample_rate: sample.sample_rate(),
            coarse_tune: get(GeneratorType::CoarseTune),
            fine_tune: get(GeneratorType::FineTune),
            scale_tuning: scale_influence(get(GeneratorType::ScaleTuning)),
            pan,
            exclusive_class: get(GeneratorType::ExclusiveClass) as u32,
            loop_mode,
            offsets,
            start: start as usize,
            end: end as usize,
            loop_start: loop_start as usize,
            loop_end: loop_end as usize,
            envelope: envelope(layer, key),
            vibrato: VibratoParams {
                depth_cents: get(GeneratorType::VibLfoToPitch) as f64,
                rate_hz: absolute_cents_to_hz(get(GeneratorType::FreqVibLfo) as f64),
                delay: timecents_to_seconds(get(GeneratorType::DelayVibLfo) as f64),
            },
        }
    }

    /// The tuning factor of the coarse and fine tune generators.
    pub fn tune_factor(&self) -> f64 {
        2f64.powf((self.coarse_tune * 100 + self.fine_tune) as f64 / 1200.0)
    }

    /// The playback rate for `semitones` of bend, relative to the sample's own rate.
    pub fn rate(&self, semitones: f64) -> f64 {
        playback_rate(
            self.key as f64,
            self.root_key as f64,
            self.pitch_correction as f64,
            self.tune_factor(),
            self.scale_tuning,
        ) * 2f64.powf(semitones / 12.0)
    }

    /// The gain the velocity applies to the envelope levels.
    pub fn velocity_gain(&self) -> f64 {
        self.velocity as f64 / 127.0
    }
}

fn envelope(layer: &ZoneLayer, key: u8) -> EnvelopeParams {
    let get = |ty| resolve(layer, ty) as f64;
    let key_offset = (ENVELOPE_KEY_CENTER - key as i32) as f64;

    let attenuation = get(GeneratorType::InitialAttenuation) / 10.0 * ATTENUATION_CORRECTION;
    let sustain_db = get(GeneratorType::SustainVolEnv) / 10.0;
    let peak = decibels_to_gain(-attenuation);

    EnvelopeParams {
        delay: timecents_to_seconds(get(GeneratorType::DelayVolEnv)),
        attack: timecents_to_seconds(get(GeneratorType::AttackVolEnv)),
        hold: timecents_to_seconds(
            get(GeneratorType::HoldVolEnv) + key_offset * get(GeneratorType::KeyNumToVolEnvHold),
        ),
        decay: timecents_to_seconds(
            get(GeneratorType::DecayVolEnv) + key_offset * get(GeneratorType::KeyNumToVolEnvDecay),
        ),
        release: timecents_to_seconds(get(GeneratorType::ReleaseVolEnv)).min(MAX_RELEASE_SECONDS),
        peak,
        sustain: (peak * decibels_to_gain(-sustain_db)).max(MIN_SUSTAIN_LEVEL),
    }
}
