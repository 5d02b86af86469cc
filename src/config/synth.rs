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

use std::time::Duration;

use duration_string::DurationString;
use serde::Deserialize;

use super::ConfigError;

const DEFAULT_SAMPLE_RATE: u32 = 44100;
const DEFAULT_MAX_VOICES: usize = 256;
const DEFAULT_BLOCK_SIZE: usize = 128;
const DEFAULT_KILL_FADE: Duration = Duration::from_millis(50);
const DEFAULT_COMMAND_QUEUE_CAPACITY: usize = 4096;
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5);
const DEFAULT_GAIN: f32 = 1.0;

/// The kill fade is kept short enough to free voices quickly but long enough
/// not to click.
const MIN_KILL_FADE: Duration = Duration::from_millis(50);
const MAX_KILL_FADE: Duration = Duration::from_millis(100);

/// How rendered stereo frames are laid out.
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputLayout {
    /// L R L R ...
    #[default]
    Interleaved,
    /// All left samples, then all right samples.
    Planar,
}

/// A YAML representation of the synthesizer configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct SynthConfig {
    /// Output sample rate in Hz (default: 44100).
    sample_rate: Option<u32>,

    /// Size of the voice pool (default: 256).
    max_voices: Option<usize>,

    /// Frames rendered between pitch and gain updates (default: 128).
    block_size: Option<usize>,

    /// Fade used when voices are killed, e.g. "75ms" (default: 50ms).
    kill_fade: Option<String>,

    /// Capacity of the control to render command queue (default: 4096).
    command_queue_capacity: Option<usize>,

    /// How often the sequencer driver polls for due events (default: 5ms).
    poll_interval: Option<String>,

    /// Layout of rendered buffers (default: interleaved).
    output: Option<OutputLayout>,

    /// Master gain applied to the mix (default: 1.0).
    gain: Option<f32>,
}

impl SynthConfig {
    /// Returns the output sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE).max(1)
    }

    /// Returns the number of voices in the pool.
    pub fn max_voices(&self) -> usize {
        self.max_voices.unwrap_or(DEFAULT_MAX_VOICES).max(1)
    }

    /// Returns the render block size in frames.
    pub fn block_size(&self) -> usize {
        self.block_size.unwrap_or(DEFAULT_BLOCK_SIZE).max(1)
    }

    /// Returns the kill fade, clamped to 50..=100ms.
    pub fn kill_fade(&self) -> Result<Duration, ConfigError> {
        let fade = parse_duration("kill_fade", &self.kill_fade)?.unwrap_or(DEFAULT_KILL_FADE);
        Ok(fade.clamp(MIN_KILL_FADE, MAX_KILL_FADE))
    }

    /// Returns the command queue capacity.
    pub fn command_queue_capacity(&self) -> usize {
        self.command_queue_capacity
            .unwrap_or(DEFAULT_COMMAND_QUEUE_CAPACITY)
            .max(1)
    }

    /// Returns the sequencer driver poll interval.
    pub fn poll_interval(&self) -> Result<Duration, ConfigError> {
        Ok(parse_duration("poll_interval", &self.poll_interval)?.unwrap_or(DEFAULT_POLL_INTERVAL))
    }

    /// Returns the output layout.
    pub fn output(&self) -> OutputLayout {
        self.output.unwrap_or_default()
    }

    /// Returns the master gain.
    pub fn gain(&self) -> f32 {
        self.gain.unwrap_or(DEFAULT_GAIN)
    }
}

fn parse_duration(field: &'static str, value: &Option<String>) -> Result<Option<Duration>, ConfigError> {
    match value {
        Some(value) => match DurationString::from_string(value.clone()) {
            Ok(duration) => Ok(Some(duration.into())),
            Err(e) => Err(ConfigError::Duration {
                field,
                value: value.clone(),
                reason: e.to_string(),
            }),
        },
        None => Ok(None),
    }
}

#[cfg(test)]
mod test {
    use config::{Config, File, FileFormat};

    use super::*;

    fn parse(yaml: &str) -> SynthConfig {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse("{}");
        assert_eq!(config.sample_rate(), 44100);
        assert_eq!(config.max_voices(), 256);
        assert_eq!(config.block_size(), 128);
        assert_eq!(config.kill_fade().unwrap(), Duration::from_millis(50));
        assert_eq!(config.command_queue_capacity(), 4096);
        assert_eq!(config.poll_interval().unwrap(), Duration::from_millis(5));
        assert_eq!(config.output(), OutputLayout::Interleaved);
        assert_eq!(config.gain(), 1.0);
    }

    #[test]
    fn test_values() {
        let config = parse(
            r#"
            sample_rate: 48000
            max_voices: 64
            block_size: 32
            kill_fade: 75ms
            command_queue_capacity: 16
            poll_interval: 2ms
            output: planar
            gain: 0.5
        "#,
        );
        assert_eq!(config.sample_rate(), 48000);
        assert_eq!(config.max_voices(), 64);
        assert_eq!(config.block_size(), 32);
        assert_eq!(config.kill_fade().unwrap(), Duration::from_millis(75));
        assert_eq!(config.command_queue_capacity(), 16);
        assert_eq!(config.poll_interval().unwrap(), Duration::from_millis(2));
        assert_eq!(config.output(), OutputLayout::Planar);
        assert_eq!(config.gain(), 0.5);
    }

    #[test]
    fn test_kill_fade_is_clamped() {
        assert_eq!(
            parse("kill_fade: 1ms").kill_fade().unwrap(),
            Duration::from_millis(50)
        );
        assert_eq!(
            parse("kill_fade: 2s").kill_fade().unwrap(),
            Duration::from_millis(100)
        );
    }

    #[test]
    fn test_bad_duration() {
        let err = parse("poll_interval: soon").poll_interval().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Duration {
                field: "poll_interval",
                ..
            }
        ));
    }
}
