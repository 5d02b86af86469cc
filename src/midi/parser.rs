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

//! Standard MIDI File chunk and event decoding.

use midly::{
    num::{u14, u7},
    MidiMessage, PitchBend,
};
use tracing::warn;

use crate::bytes::{fourcc_name, ByteReader};
use crate::error::{FormatError, UnknownEvent};

use super::{EventKind, MidiEvent, TimeDivision};

const HEADER_SIZE: u32 = 6;

pub const META_TRACK_NAME: u8 = 0x03;
pub const META_END_OF_TRACK: u8 = 0x2F;
pub const META_SET_TEMPO: u8 = 0x51;

/// The MThd chunk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Header {
    pub format: u16,
    pub tracks: u16,
    pub division: TimeDivision,
}

/// The events of one MTrk chunk, with ticks relative to the track start.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTrack {
    pub events: Vec<MidiEvent>,
    /// The tick decoding stopped at, normally the end of track event.
    pub end_tick: u64,
}

fn expect_chunk(reader: &mut ByteReader, id: &[u8; 4]) -> Result<u32, FormatError> {
    let found = reader.fourcc()?;
    if &found != id {
        return Err(FormatError::UnexpectedChunk {
            expected: fourcc_name(id),
            found: fourcc_name(&found),
        });
    }
    reader.u32_be()
}

pub fn read_header(reader: &mut ByteReader) -> Result<Header, FormatError> {
    let size = expect_chunk(reader, b"MThd")?;
    if size != HEADER_SIZE {
        return Err(FormatError::InvalidHeaderSize {
            chunk: "MThd",
            size,
        });
    }
    Ok(Header {
        format: reader.u16_be()?,
        tracks: reader.u16_be()?,
        division: TimeDivision::from_raw(reader.u16_be()?),
    })
}

/// Reads one MTrk chunk. `index` is only used for diagnostics.
pub fn read_track(reader: &mut ByteReader, index: usize) -> Result<RawTrack, FormatError> {
    let size = expect_chunk(reader, b"MTrk")? as usize;
    let mut track = ByteReader::new(reader.take(size)?, "MTrk");
    decode_events(&mut track, index)
}

fn decode_events(reader: &mut ByteReader, index: usize) -> Result<RawTrack, FormatError> {
    let mut events = Vec::new();
    let mut tick: u64 = 0;
    // Only channel messages set the running status.
    let mut running: Option<u8> = None;

    while !reader.is_empty() {
        tick += reader.vlq()? as u64;
        let Some(byte) = reader.peek() else {
            return Err(FormatError::Truncated {
                chunk: "MTrk".to_string(),
                needed: 1,
                available: 0,
            });
        };
        let status = if byte & 0x80 == 0 {
            running.ok_or(FormatError::MissingRunningStatus { track: index, byte })?
        } else {
            reader.u8()?
        };

        let kind = match status {
            0x80..=0xEF => {
                running = Some(status);
                let first = reader.u8()?;
                let second = match status & 0xF0 {
                    0xC0 | 0xD0 => 0,
                    _ => reader.u8()?,
                };
                EventKind::Channel {
                    channel: status & 0x0F,
                    message: channel_message(status, first, second),
                }
            }
            0xFF => {
                let kind = reader.u8()?;
                let len = reader.vlq()? as usize;
                let data = reader.take(len)?;
                match kind {
                    META_END_OF_TRACK => break,
                    META_SET_TEMPO if data.len() >= 3 => {
                        EventKind::Tempo(u32::from_be_bytes([0, data[0], data[1], data[2]]))
                    }
                    _ => EventKind::Meta {
                        kind,
                        data: data.to_vec(),
                    },
                }
            }
            0xF0 | 0xF7 => {
                let len = reader.vlq()? as usize;
                EventKind::SysEx(reader.take(len)?.to_vec())
            }
            _ => {
                // System common and realtime bytes carry no length in a file; they
                // are skipped as if they had no data.
                warn!(
                    track = index,
                    tick,
                    err = %UnknownEvent::Status { status },
                    "Skipping event"
                );
                continue;
            }
        };
        events.push(MidiEvent { tick, kind });
    }

    Ok(RawTrack {
        events,
        end_tick: tick,
    })
}

/// Builds a channel message from its status and data bytes.
pub fn channel_message(status: u8, first: u8, second: u8) -> MidiMessage {
    let (a, b) = (u7::from(first & 0x7F), u7::from(second & 0x7F));
    match status & 0xF0 {
        0x80 => MidiMessage::NoteOff { key: a, vel: b },
        0x90 => MidiMessage::NoteOn { key: a, vel: b },
        0xA0 => MidiMessage::Aftertouch { key: a, vel: b },
        0xB0 => MidiMessage::Controller {
            controller: a,
            value: b,
        },
        0xC0 => MidiMessage::ProgramChange { program: a },
        0xD0 => MidiMessage::ChannelAftertouch { vel: a },
        _ => MidiMessage::PitchBend {
            bend: PitchBend(u14::from(
                ((second as u16 & 0x7F) << 7) | (first as u16 & 0x7F),
            )),
        },
    }
}
