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

//! The per-sample volume envelope.
//!
//! Delay is silent, the attack ramps linearly to the peak, hold keeps the peak and
//! the decay falls exponentially to the sustain level. Release falls exponentially
//! from wherever the envelope is to silence.

use super::params::{EnvelopeParams, INSTANT_ATTACK_SECONDS, MIN_SUSTAIN_LEVEL};

/// The level a release decays to before the voice is finished.
const SILENCE: f64 = 1e-5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvelopePhase {
    Delay,
    Attack,
    Hold,
    Decay,
    Sustain,
    Release,
    #[default]
    Done,
}

impl EnvelopePhase {
    fn is_timed(self) -> bool {
        !matches!(self, EnvelopePhase::Sustain | EnvelopePhase::Done)
    }

    fn next(self) -> EnvelopePhase {
        match self {
            EnvelopePhase::Delay => EnvelopePhase::Attack,
            EnvelopePhase::Attack => EnvelopePhase::Hold,
            EnvelopePhase::Hold => EnvelopePhase::Decay,
            EnvelopePhase::Decay => EnvelopePhase::Sustain,
            EnvelopePhase::Sustain => EnvelopePhase::Sustain,
            EnvelopePhase::Release | EnvelopePhase::Done => EnvelopePhase::Done,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Envelope {
    phase: EnvelopePhase,
    level: f64,
    /// Samples left in the current phase.
    remaining: u64,
    /// Added per sample during the attack.
    increment: f64,
    /// Multiplied per sample during decay and release.
    factor: f64,
    peak: f64,
    sustain: f64,
    delay: u64,
    attack: u64,
    hold: u64,
    decay: u64,
    release: f64,
    rate: f64,
}

fn samples(seconds: f64, rate: f64) -> u64 {
    (seconds * rate).round().max(0.0) as u64
}

impl Envelope {
    /// Starts an envelope. `gain` scales the peak and sustain levels.
    pub fn new(params: &EnvelopeParams, gain: f64, rate: f64) -> Envelope {
        let mut envelope = Envelope {
            phase: EnvelopePhase::Delay,
            level: 0.0,
            remaining: 0,
            increment: 0.0,
            factor: 1.0,
            peak: params.peak * gain,
            sustain: (params.sustain * gain).max(MIN_SUSTAIN_LEVEL),
            delay: samples(params.delay, rate),
            attack: samples(params.attack, rate),
            hold: samples(params.hold, rate),
            decay: samples(params.decay, rate),
            release: params.release,
            rate,
        };
        if params.delay + params.attack < INSTANT_ATTACK_SECONDS {
            envelope.enter(EnvelopePhase::Hold);
        } else {
            envelope.enter(EnvelopePhase::Delay);
        }
        envelope
    }

    fn enter(&mut self, phase: EnvelopePhase) {
        self.phase = phase;
        match phase {
            EnvelopePhase::Delay => {
                self.level = 0.0;
                self.remaining = self.delay;
            }
            EnvelopePhase::Attack => {
                self.remaining = self.attack;
                if self.attack > 0 {
                    self.increment = (self.peak - self.level) / self.attack as f64;
                }
            }
            EnvelopePhase::Hold => {
                self.level = self.peak;
                self.remaining = self.hold;
            }
            EnvelopePhase::Decay => {
                self.remaining = self.decay;
                self.factor = if self.decay > 0 && self.peak > 0.0 {
                    (self.sustain / self.peak).powf(1.0 / self.decay as f64)
                } else {
                    1.0
                };
            }
            EnvelopePhase::Sustain => {
                self.level = self.sustain;
                self.remaining = 0;
            }
            EnvelopePhase::Release => {}
            EnvelopePhase::Done => {
                self.level = 0.0;
                self.remaining = 0;
            }
        }
    }

    /// Advances one sample and returns the level.
    pub fn next_level(&mut self) -> f64 {
        while self.remaining == 0 && self.phase.is_timed() {
            self.enter(self.phase.next());
        }
        match self.phase {
            EnvelopePhase::Attack => self.level += self.increment,
            EnvelopePhase::Decay | EnvelopePhase::Release => self.level *= self.factor,
            _ => {}
        }
        if self.phase.is_timed() {
            self.remaining -= 1;
        }
        self.level
    }

    /// Starts the release using the envelope's own release time.
    pub fn release(&mut self) {
        self.release_over(self.release);
    }

    /// Starts a release over the given time, from the current level.
    pub fn release_over(&mut self, seconds: f64) {
        if self.phase == EnvelopePhase::Done {
            return;
        }
        if self.level <= SILENCE {
            self.enter(EnvelopePhase::Done);
            return;
        }
        let count = samples(seconds, self.rate).max(1);
        self.factor = (SILENCE / self.level).powf(1.0 / count as f64);
        self.remaining = count;
        self.phase = EnvelopePhase::Release;
    }

    pub fn phase(&self) -> EnvelopePhase {
        self.phase
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    pub fn is_done(&self) -> bool {
        self.phase == EnvelopePhase::Done
    }

    pub fn is_releasing(&self) -> bool {
        matches!(self.phase, EnvelopePhase::Release | EnvelopePhase::Done)
    }
}
