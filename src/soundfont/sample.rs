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

//! Sample headers and PCM extraction.

use std::sync::Arc;

use tracing::warn;

use crate::bytes::ByteReader;
use crate::error::FormatError;

/// The size of a sample header record in the shdr chunk.
pub const SAMPLE_HEADER_SIZE: usize = 46;

/// Bytes per sample point in the smpl chunk (16-bit PCM).
const BYTES_PER_POINT: usize = 2;

/// The original pitch value meaning "unpitched".
const UNPITCHED: u8 = 255;

/// The key used for unpitched samples.
const DEFAULT_ROOT_KEY: u8 = 60;

/// The stereo role of a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleLink {
    Mono,
    Right,
    Left,
    Linked,
}

impl SampleLink {
    fn from_type(sample_type: u16) -> SampleLink {
        match sample_type & 0x7FFF {
            2 => SampleLink::Right,
            4 => SampleLink::Left,
            8 => SampleLink::Linked,
            _ => SampleLink::Mono,
        }
    }
}

/// A sample header as stored in the shdr chunk. Positions are in sample points
/// relative to the start of the smpl chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SampleHeader {
    pub name: String,
    pub start: u32,
    pub end: u32,
    pub loop_start: u32,
    pub loop_end: u32,
    pub sample_rate: u32,
    pub original_pitch: u8,
    pub pitch_correction: i8,
    pub link_index: u16,
    pub sample_type: u16,
}

impl SampleHeader {
    pub fn read(reader: &mut ByteReader) -> Result<SampleHeader, FormatError> {
        Ok(SampleHeader {
            name: reader.fixed_str(20)?,
            start: reader.u32_le()?,
            end: reader.u32_le()?,
            loop_start: reader.u32_le()?,
            loop_end: reader.u32_le()?,
            sample_rate: reader.u32_le()?,
            original_pitch: reader.u8()?,
            pitch_correction: reader.i8()?,
            link_index: reader.u16_le()?,
            sample_type: reader.u16_le()?,
        })
    }
}

/// Immutable mono sample data with its playback metadata.
#[derive(Clone, PartialEq)]
pub struct Sample {
    name: String,
    sample_rate: u32,
    root_key: u8,
    pitch_correction: i8,
    /// Loop start, in frames relative to the first frame of `data`.
    loop_start: usize,
    /// Loop end, in frames relative to the first frame of `data`.
    loop_end: usize,
    link: SampleLink,
    link_index: u16,
    rom: bool,
    data: Arc<[f32]>,
}

impl Sample {
    /// Extracts a sample from the raw smpl bytes. Header positions count sample
    /// points, so they are doubled to address the 16-bit little endian data.
    pub(crate) fn extract(header: &SampleHeader, smpl: &[u8]) -> Sample {
        let rom = header.sample_type & 0x8000 != 0;
        let available = smpl.len() / BYTES_PER_POINT;
        let mut start = header.start as usize;
        let mut end = header.end as usize;
        if end > available || start > end {
            if !rom {
                warn!(
                    sample = header.name.as_str(),
                    start, end, available, "Sample header points outside of the sample data"
                );
            }
            end = end.min(available);
            start = start.min(end);
        }

        let bytes = &smpl[start * BYTES_PER_POINT..end * BYTES_PER_POINT];
        let data: Arc<[f32]> = bytes
            .chunks_exact(BYTES_PER_POINT)
            .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0)
            .collect();

        let len = data.len();
        let loop_start = (header.loop_start as usize).saturating_sub(start).min(len);
        let loop_end = (header.loop_end as usize).saturating_sub(start).min(len);

        Sample {
            name: header.name.clone(),
            sample_rate: header.sample_rate,
            root_key: if header.original_pitch == UNPITCHED {
                DEFAULT_ROOT_KEY
            } else {
                header.original_pitch.min(127)
            },
            pitch_correction: header.pitch_correction,
            loop_start,
            loop_end,
            link: SampleLink::from_type(header.sample_type),
            link_index: header.link_index,
            rom,
            data,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// The MIDI key at which the sample plays at its recorded pitch.
    pub fn root_key(&self) -> u8 {
        self.root_key
    }

    /// Pitch correction in cents.
    pub fn pitch_correction(&self) -> i8 {
        self.pitch_correction
    }

    pub fn loop_start(&self) -> usize {
        self.loop_start
    }

    pub fn loop_end(&self) -> usize {
        self.loop_end
    }

    pub fn link(&self) -> SampleLink {
        self.link
    }

    /// The index of the sample's stereo partner in the sample list.
    pub fn link_index(&self) -> u16 {
        self.link_index
    }

    pub fn is_rom(&self) -> bool {
        self.rom
    }

    /// Normalized PCM frames.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl std::fmt::Debug for Sample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sample")
            .field("name", &self.name)
            .field("frames", &self.data.len())
            .field("sample_rate", &self.sample_rate)
            .field("root_key", &self.root_key)
            .field("link", &self.link)
            .finish()
    }
}
