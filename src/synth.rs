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

//! The voice engine.
//!
//! [`create`] returns two halves. [`SynthControl`] takes MIDI on the control side
//! and owns all channel state. [`Synthesizer`] lives on the audio thread, owns the
//! voice pool and renders blocks. They share nothing mutable except an ordered
//! command queue and a staged channel snapshot.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use parking_lot::Mutex;
use tracing::info;

use crate::config::{ConfigError, SynthConfig};
use crate::soundfont::SoundFont;

pub mod channel;
pub mod command;
pub mod control;
pub mod engine;
pub mod envelope;
pub mod params;
pub mod voice;

pub use self::control::{EventListener, SynthControl};
pub use self::engine::Synthesizer;
pub use self::voice::VoiceState;

use self::command::ChannelSnapshot;
use self::engine::EngineSettings;

/// Playback time as the number of frames rendered so far.
#[derive(Clone)]
pub struct AudioClock {
    frames: Arc<AtomicU64>,
    sample_rate: u32,
}

impl AudioClock {
    pub fn new(sample_rate: u32) -> AudioClock {
        AudioClock {
            frames: Arc::new(AtomicU64::new(0)),
            sample_rate: sample_rate.max(1),
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }

    pub fn seconds(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub(crate) fn advance(&self, frames: u64) {
        self.frames.fetch_add(frames, Ordering::AcqRel);
    }
}

impl std::fmt::Debug for AudioClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioClock")
            .field("frames", &self.frames())
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

/// Creates the control and render halves of a synthesizer for a SoundFont.
pub fn create(
    font: Arc<SoundFont>,
    config: &SynthConfig,
) -> Result<(SynthControl, Synthesizer), ConfigError> {
    let (sender, receiver) = command::queue(config.command_queue_capacity());
    let snapshot = Arc::new(Mutex::new(ChannelSnapshot::default()));
    let clock = AudioClock::new(config.sample_rate());

    let control = SynthControl::new(font.clone(), sender, snapshot.clone());
    let synthesizer = Synthesizer::new(
        font,
        receiver,
        snapshot,
        clock,
        EngineSettings {
            max_voices: config.max_voices(),
            block_size: config.block_size(),
            kill_fade: config.kill_fade()?.as_secs_f64(),
            layout: config.output(),
            gain: config.gain(),
            channels: control.channels().len(),
        },
    );
    info!(
        sample_rate = config.sample_rate(),
        voices = config.max_voices(),
        block_size = config.block_size(),
        "Synthesizer created"
    );
    Ok((control, synthesizer))
}
