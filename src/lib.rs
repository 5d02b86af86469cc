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

//! A SoundFont2 synthesizer and Standard MIDI File sequencer.
//!
//! Load an instrument bank with [`load_sound_font`] and a performance with
//! [`load_midi`]. [`synth::create`] builds the control and render halves of a
//! synthesizer, and a [`sequencer::Sequencer`] plays the performance through the
//! control half while the render half produces audio blocks.

pub mod bytes;
pub mod config;
pub mod error;
pub mod midi;
pub mod playsync;
pub mod sequencer;
pub mod soundfont;
pub mod synth;
pub mod util;

#[cfg(test)]
mod test;
#[cfg(test)]
mod testutil;

pub use crate::error::FormatError;
pub use crate::midi::ParsedMidi;
pub use crate::soundfont::SoundFont;

/// Decodes a SoundFont2 bank.
pub fn load_sound_font(bytes: &[u8]) -> Result<SoundFont, FormatError> {
    SoundFont::load(bytes)
}

/// Decodes a Standard MIDI File.
pub fn load_midi(bytes: &[u8]) -> Result<ParsedMidi, FormatError> {
    ParsedMidi::load(bytes)
}
