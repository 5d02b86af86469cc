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

//! The render side of the synthesizer.

use std::sync::Arc;

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use tracing::warn;

use crate::config::OutputLayout;
use crate::soundfont::SoundFont;

use super::channel::ChannelMix;
use super::command::{ChannelSnapshot, NoteStart, SynthCommand};
use super::voice::VoicePool;
use super::AudioClock;

/// Renders audio from the voice pool. Owned by the audio thread.
pub struct Synthesizer {
    font: Arc<SoundFont>,
    receiver: Receiver<SynthCommand>,
    snapshot: Arc<Mutex<ChannelSnapshot>>,
    /// Set when a swap could not take the snapshot lock. Commands wait behind it.
    swap_pending: bool,
    channels: Vec<ChannelMix>,
    pool: VoicePool,
    output_rate: f64,
    kill_fade: f64,
    block_size: usize,
    layout: OutputLayout,
    gain: f32,
    left: Vec<f32>,
    right: Vec<f32>,
    output: Vec<f32>,
    clock: AudioClock,
}

pub(crate) struct EngineSettings {
    pub max_voices: usize,
    pub block_size: usize,
    pub kill_fade: f64,
    pub layout: OutputLayout,
    pub gain: f32,
    pub channels: usize,
}

impl Synthesizer {
    pub(crate) fn new(
        font: Arc<SoundFont>,
        receiver: Receiver<SynthCommand>,
        snapshot: Arc<Mutex<ChannelSnapshot>>,
        clock: AudioClock,
        settings: EngineSettings,
    ) -> Synthesizer {
        let block_size = settings.block_size.max(1);
        Synthesizer {
            font,
            receiver,
            snapshot,
            swap_pending: false,
            channels: vec![ChannelMix::default(); settings.channels],
            pool: VoicePool::new(settings.max_voices),
            output_rate: clock.sample_rate() as f64,
            kill_fade: settings.kill_fade,
            block_size,
            layout: settings.layout,
            gain: settings.gain,
            left: vec![0.0; block_size],
            right: vec![0.0; block_size],
            output: vec![0.0; block_size * 2],
            clock,
        }
    }

    pub fn clock(&self) -> &AudioClock {
        &self.clock
    }

    pub fn active_voices(&self) -> usize {
        self.pool.active_count()
    }

    pub fn pool(&self) -> &VoicePool {
        &self.pool
    }

    pub fn channel_mix(&self, channel: usize) -> Option<&ChannelMix> {
        self.channels.get(channel)
    }

    /// Applies queued commands in order. Stops early if a channel swap has to wait
    /// for the control side.
    fn drain_commands(&mut self) {
        if self.swap_pending && !self.try_swap() {
            return;
        }
        while let Ok(command) = self.receiver.try_recv() {
            match command {
                SynthCommand::StartVoice(note) => self.start_voice(&note),
                SynthCommand::NoteOff { channel, key } => self.pool.release_note(channel, key),
                SynthCommand::Channel { channel, mix } => {
                    if let Some(current) = self.channels.get_mut(channel) {
                        *current = mix;
                        self.pool.bend(channel, mix.bend_semitones);
                    }
                }
                SynthCommand::SwapChannels => {
                    self.swap_pending = true;
                    if !self.try_swap() {
                        return;
                    }
                }
                SynthCommand::ReleaseAll { channel } => self.pool.release_all(channel),
                SynthCommand::KillAll { channel } => self.pool.kill_all(channel, self.kill_fade),
            }
        }
    }

    fn try_swap(&mut self) -> bool {
        let Some(mut snapshot) = self.snapshot.try_lock() else {
            return false;
        };
        if snapshot.apply(&mut self.channels) {
            for (channel, mix) in self.channels.iter().enumerate() {
                self.pool.bend(channel, mix.bend_semitones);
            }
        }
        self.swap_pending = false;
        true
    }

    fn start_voice(&mut self, note: &NoteStart) {
        let class = note.params.exclusive_class;
        if class != 0 {
            self.pool
                .kill_exclusive(note.channel, class, note.note_id, self.kill_fade);
        }
        self.pool.relieve_pressure(self.kill_fade);

        let bend = self
            .channels
            .get(note.channel)
            .map_or(0.0, |mix| mix.bend_semitones);
        match self.pool.allocate() {
            Ok(voice) => {
                voice.start(note, bend, self.output_rate);
            }
            Err(e) => warn!(
                err = %e,
                channel = note.channel,
                key = note.key,
                "Dropping note"
            ),
        }
    }

    /// Renders `frames` stereo frames, laid out as configured. The returned slice
    /// holds `frames * 2` samples.
    pub fn render(&mut self, frames: usize) -> &[f32] {
        self.drain_commands();

        if self.left.len() < frames {
            self.left.resize(frames, 0.0);
            self.right.resize(frames, 0.0);
            self.output.resize(frames * 2, 0.0);
        }
        self.left[..frames].fill(0.0);
        self.right[..frames].fill(0.0);

        let samples = self.font.samples();
        let mut start = 0;
        while start < frames {
            let end = (start + self.block_size).min(frames);
            for voice in self.pool.voices_mut().iter_mut().filter(|v| v.is_active()) {
                let mix = self
                    .channels
                    .get(voice.channel())
                    .copied()
                    .unwrap_or_default();
                let data = samples.get(voice.sample()).map_or(&[][..], |s| s.data());
                voice.render(
                    data,
                    &mix,
                    self.output_rate,
                    &mut self.left[start..end],
                    &mut self.right[start..end],
                );
            }
            start = end;
        }

        let gain = self.gain;
        let output = &mut self.output[..frames * 2];
        match self.layout {
            OutputLayout::Interleaved => {
                for (i, frame) in output.chunks_exact_mut(2).enumerate() {
                    frame[0] = self.left[i] * gain;
                    frame[1] = self.right[i] * gain;
                }
            }
            OutputLayout::Planar => {
                let (left, right) = output.split_at_mut(frames);
                for i in 0..frames {
                    left[i] = self.left[i] * gain;
                    right[i] = self.right[i] * gain;
                }
            }
        }

        self.clock.advance(frames as u64);
        &self.output[..frames * 2]
    }
}

impl std::fmt::Debug for Synthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synthesizer")
            .field("voices", &self.pool.capacity())
            .field("active", &self.pool.active_count())
            .field("channels", &self.channels.len())
            .field("layout", &self.layout)
            .field("frames", &self.clock.frames())
            .finish()
    }
}
