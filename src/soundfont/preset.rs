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

//! Presets, instruments and the zone-pair resolution performed for every note.

use super::zone::{GeneratorSet, ZoneList};
use crate::bytes::ByteReader;
use crate::error::FormatError;

/// The size of a preset header record in the phdr chunk.
pub const PRESET_HEADER_SIZE: usize = 38;

/// The size of an instrument header record in the inst chunk.
pub const INSTRUMENT_HEADER_SIZE: usize = 22;

/// The bank reserved for percussion kits.
pub const PERCUSSION_BANK: u16 = 128;

/// A preset header as stored in the phdr chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PresetHeader {
    pub name: String,
    pub program: u16,
    pub bank: u16,
    pub bag_index: u16,
    pub library: u32,
    pub genre: u32,
    pub morphology: u32,
}

impl PresetHeader {
    pub fn read(reader: &mut ByteReader) -> Result<PresetHeader, FormatError> {
        Ok(PresetHeader {
            name: strip_bank_prefix(&reader.fixed_str(20)?),
            program: reader.u16_le()?,
            bank: reader.u16_le()?,
            bag_index: reader.u16_le()?,
            library: reader.u32_le()?,
            genre: reader.u32_le()?,
            morphology: reader.u32_le()?,
        })
    }
}

/// An instrument header as stored in the inst chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct InstrumentHeader {
    pub name: String,
    pub bag_index: u16,
}

impl InstrumentHeader {
    pub fn read(reader: &mut ByteReader) -> Result<InstrumentHeader, FormatError> {
        Ok(InstrumentHeader {
            name: reader.fixed_str(20)?,
            bag_index: reader.u16_le()?,
        })
    }
}

/// Removes a leading "000:001" style bank:program tag that some editors write into names.
fn strip_bank_prefix(name: &str) -> String {
    let bytes = name.as_bytes();
    let tagged = bytes.len() >= 7
        && bytes[..3].iter().all(u8::is_ascii_digit)
        && bytes[3] == b':'
        && bytes[4..7].iter().all(u8::is_ascii_digit);
    if tagged {
        name[7..].trim().to_string()
    } else {
        name.to_string()
    }
}

/// A playable preset, identified by bank and program.
#[derive(Debug, Clone, PartialEq)]
pub struct Preset {
    name: String,
    bank: u16,
    program: u16,
    library: u32,
    genre: u32,
    morphology: u32,
    zones: ZoneList,
}

impl Preset {
    pub(crate) fn new(header: PresetHeader, zones: ZoneList) -> Preset {
        Preset {
            name: header.name,
            bank: header.bank,
            program: header.program,
            library: header.library,
            genre: header.genre,
            morphology: header.morphology,
            zones,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bank(&self) -> u16 {
        self.bank
    }

    pub fn program(&self) -> u16 {
        self.program
    }

    pub fn library(&self) -> u32 {
        self.library
    }

    pub fn genre(&self) -> u32 {
        self.genre
    }

    pub fn morphology(&self) -> u32 {
        self.morphology
    }

    pub fn zones(&self) -> &ZoneList {
        &self.zones
    }

    pub fn is_percussion(&self) -> bool {
        self.bank == PERCUSSION_BANK
    }

    /// Calls `f` once for every (preset zone, instrument zone) pair that covers the
    /// key and velocity. Nothing is allocated, so this can run while rendering.
    pub fn for_each_layer<F>(&self, instruments: &[Instrument], key: u8, velocity: u8, mut f: F)
    where
        F: FnMut(ZoneLayer),
    {
        for preset_zone in self.zones.zones() {
            if !preset_zone.matches(key, velocity) {
                continue;
            }
            let Some(instrument) = preset_zone.target().and_then(|i| instruments.get(i)) else {
                continue;
            };
            let preset_generators = self.zones.effective_generators(preset_zone);

            for instrument_zone in instrument.zones.zones() {
                if !instrument_zone.matches(key, velocity) {
                    continue;
                }
                let Some(sample) = instrument_zone.target() else {
                    continue;
                };
                f(ZoneLayer {
                    sample,
                    preset: preset_generators,
                    instrument: instrument.zones.effective_generators(instrument_zone),
                });
            }
        }
    }

    /// Collects the layers for a key and velocity.
    pub fn layers(&self, instruments: &[Instrument], key: u8, velocity: u8) -> Vec<ZoneLayer> {
        let mut layers = Vec::new();
        self.for_each_layer(instruments, key, velocity, |layer| layers.push(layer));
        layers
    }
}

/// An instrument: a set of sample zones.
#[derive(Debug, Clone, PartialEq)]
pub struct Instrument {
    name: String,
    zones: ZoneList,
}

impl Instrument {
    pub(crate) fn new(header: InstrumentHeader, zones: ZoneList) -> Instrument {
        Instrument {
            name: header.name,
            zones,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn zones(&self) -> &ZoneList {
        &self.zones
    }
}

/// One sample to play for a note, with the generators of both levels after global
/// zone inheritance. The two levels are kept apart so the resolver can apply the
/// additive and substitution rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneLayer {
    pub sample: usize,
    pub preset: GeneratorSet,
    pub instrument: GeneratorSet,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soundfont::generator::GeneratorType;
    use crate::soundfont::zone::Zone;

    fn set(values: &[(GeneratorType, i16)]) -> GeneratorSet {
        let mut set = GeneratorSet::new();
        for (ty, amount) in values {
            set.set(*ty, *amount);
        }
        set
    }

    fn header(name: &str) -> PresetHeader {
        PresetHeader {
            name: name.to_string(),
            program: 0,
            bank: 0,
            bag_index: 0,
            library: 0,
            genre: 0,
            morphology: 0,
        }
    }

    #[test]
    fn test_strip_bank_prefix() {
        assert_eq!(strip_bank_prefix("000:001 Piano"), "Piano");
        assert_eq!(strip_bank_prefix("Piano 1"), "Piano 1");
        assert_eq!(strip_bank_prefix("12:3 odd"), "12:3 odd");
    }

    #[test]
    fn test_layers_velocity_split() {
        // One instrument with a soft and a loud sample, and a global zone with a pan.
        let soft = Zone::new(
            set(&[(GeneratorType::VelRange, 63 << 8), (GeneratorType::SampleId, 0)]),
            Vec::new(),
            Some(0),
        );
        let loud = Zone::new(
            set(&[
                (GeneratorType::VelRange, (127 << 8) | 64),
                (GeneratorType::SampleId, 1),
            ]),
            Vec::new(),
            Some(1),
        );
        let global = Zone::new(set(&[(GeneratorType::Pan, 250)]), Vec::new(), None);
        let instrument = Instrument::new(
            InstrumentHeader {
                name: "inst".to_string(),
                bag_index: 0,
            },
            ZoneList::new(Some(global), vec![soft, loud]),
        );

        let preset_zone = Zone::new(
            set(&[(GeneratorType::Instrument, 0), (GeneratorType::CoarseTune, 1)]),
            Vec::new(),
            Some(0),
        );
        let preset = Preset::new(header("p"), ZoneList::new(None, vec![preset_zone]));

        let layers = preset.layers(&[instrument.clone()], 60, 30);
        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0].sample, 0);
        assert_eq!(layers[0].instrument.get(GeneratorType::Pan), Some(250));
        assert_eq!(layers[0].preset.get(GeneratorType::CoarseTune), Some(1));

        let layers = preset.layers(&[instrument.clone()], 60, 100);
        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0].sample, 1);

        // A dangling instrument reference yields nothing.
        assert!(preset.layers(&[], 60, 100).is_empty());
    }
}
