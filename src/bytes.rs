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

//! Bounds-checked cursor over a byte slice, used by both container decoders.

use crate::error::FormatError;

/// A forward-only reader over borrowed bytes. Every read is bounds checked and
/// reports the chunk it was reading on failure.
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
    chunk: &'a str,
}

impl<'a> ByteReader<'a> {
    /// Creates a reader over the given bytes. The chunk name is used for error messages.
    pub fn new(data: &'a [u8], chunk: &'a str) -> ByteReader<'a> {
        ByteReader {
            data,
            pos: 0,
            chunk,
        }
    }

    /// The current read offset.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// The number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Whether all bytes have been consumed.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Takes the next `len` bytes.
    pub fn take(&mut self, len: usize) -> Result<&'a [u8], FormatError> {
        if len > self.remaining() {
            return Err(FormatError::Truncated {
                chunk: self.chunk.to_string(),
                needed: len,
                available: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Looks at the next byte without consuming it.
    pub fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    pub fn u8(&mut self) -> Result<u8, FormatError> {
        Ok(self.take(1)?[0])
    }

    pub fn i8(&mut self) -> Result<i8, FormatError> {
        Ok(self.u8()? as i8)
    }

    pub fn u16_le(&mut self) -> Result<u16, FormatError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn i16_le(&mut self) -> Result<i16, FormatError> {
        Ok(self.u16_le()? as i16)
    }

    pub fn u32_le(&mut self) -> Result<u32, FormatError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn u16_be(&mut self) -> Result<u16, FormatError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn u32_be(&mut self) -> Result<u32, FormatError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Reads a four character code.
    pub fn fourcc(&mut self) -> Result<[u8; 4], FormatError> {
        let b = self.take(4)?;
        Ok([b[0], b[1], b[2], b[3]])
    }

    /// Reads a MIDI variable-length quantity (at most four bytes).
    pub fn vlq(&mut self) -> Result<u32, FormatError> {
        let mut value: u32 = 0;
        for _ in 0..4 {
            let byte = self.u8()?;
            value = (value << 7) | u32::from(byte & 0x7F);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Ok(value)
    }

    /// Reads a fixed-width, NUL-padded text field.
    pub fn fixed_str(&mut self, len: usize) -> Result<String, FormatError> {
        Ok(decode_text(self.take(len)?))
    }
}

/// Decodes NUL-terminated text, replacing invalid UTF-8 and trimming whitespace.
pub fn decode_text(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).trim().to_string()
}

/// Renders a four character code for error messages.
pub fn fourcc_name(code: &[u8]) -> String {
    String::from_utf8_lossy(code).into_owned()
}
