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

//! Modulator records. They are decoded and attached to zones but not evaluated.

use crate::bytes::ByteReader;
use crate::error::FormatError;

/// The size of a modulator record in the pmod/imod chunks.
pub const MODULATOR_RECORD_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Modulator {
    pub source: u16,
    pub destination: u16,
    pub amount: i16,
    pub amount_source: u16,
    pub transform: u16,
}

impl Modulator {
    pub(crate) fn read(reader: &mut ByteReader) -> Result<Modulator, FormatError> {
        Ok(Modulator {
            source: reader.u16_le()?,
            destination: reader.u16_le()?,
            amount: reader.i16_le()?,
            amount_source: reader.u16_le()?,
            transform: reader.u16_le()?,
        })
    }

    /// Modulators are considered identical when everything but the amount matches.
    pub fn is_identical(&self, other: &Modulator) -> bool {
        self.source == other.source
            && self.destination == other.destination
            && self.amount_source == other.amount_source
            && self.transform == other.transform
    }
}
