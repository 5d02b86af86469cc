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

//! Error types shared by the decoders and the synthesis engine.
//!
//! Only [`FormatError`] is fatal. The other types describe conditions that are
//! recovered locally and reported through logging.

/// A malformed SoundFont2 or Standard MIDI File container.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("expected chunk {expected:?}, found {found:?}")]
    UnexpectedChunk { expected: String, found: String },
    #[error("invalid RIFF form type {0:?}, expected \"sfbk\"")]
    InvalidFormType(String),
    #[error("invalid {chunk} header size {size}")]
    InvalidHeaderSize { chunk: &'static str, size: u32 },
    #[error("chunk {chunk} is truncated: needed {needed} bytes, {available} available")]
    Truncated {
        chunk: String,
        needed: usize,
        available: usize,
    },
    #[error("chunk {chunk} size {size} is not a multiple of its {record} byte record")]
    InvalidRecordSize {
        chunk: &'static str,
        size: usize,
        record: usize,
    },
    #[error("data byte {byte:#04x} in track {track} without a running status")]
    MissingRunningStatus { track: usize, byte: u8 },
    #[error("{kind} index {index} out of range (count {count})")]
    InvalidReference {
        kind: &'static str,
        index: usize,
        count: usize,
    },
    #[error("the SoundFont contains no presets")]
    NoPresets,
    #[error("the MIDI file contains no tracks")]
    NoTracks,
}

/// A preset request that could not be satisfied exactly.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "preset {requested_bank}:{requested_program} not found, using {bank}:{program} ({name})"
)]
pub struct LookupFallback {
    pub requested_bank: u16,
    pub requested_program: u16,
    pub bank: u16,
    pub program: u16,
    pub name: String,
}

/// A request that could not be served because a fixed-size resource was full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ResourceExhaustion {
    #[error("voice pool exhausted ({capacity} voices)")]
    VoicePool { capacity: usize },
    #[error("command queue full ({capacity} commands)")]
    CommandQueue { capacity: usize },
}

/// An event that is recognised structurally but not supported.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnknownEvent {
    #[error("unknown status byte {status:#04x}")]
    Status { status: u8 },
    #[error("unsupported system exclusive message ({len} bytes)")]
    SystemExclusive { len: usize },
    #[error("unparseable live MIDI message: {0}")]
    Live(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = FormatError::UnexpectedChunk {
            expected: "MThd".to_string(),
            found: "RIFF".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "expected chunk \"MThd\", found \"RIFF\""
        );

        let fallback = LookupFallback {
            requested_bank: 3,
            requested_program: 5,
            bank: 0,
            program: 5,
            name: "Piano".to_string(),
        };
        assert_eq!(
            fallback.to_string(),
            "preset 3:5 not found, using 0:5 (Piano)"
        );

        assert_eq!(
            ResourceExhaustion::VoicePool { capacity: 4 }.to_string(),
            "voice pool exhausted (4 voices)"
        );
        assert_eq!(
            UnknownEvent::Status { status: 0xF4 }.to_string(),
            "unknown status byte 0xf4"
        );
    }
}
