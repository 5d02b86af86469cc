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

//! SoundFont2 decoding.
//!
//! The RIFF container is walked in the fixed order the format requires:
//! INFO, sdta and then the nine pdta sub-chunks. Zones are linked to their
//! generators through the bag arrays and the terminal records are dropped.

use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::bytes::{decode_text, fourcc_name, ByteReader};
use crate::error::{FormatError, LookupFallback};

pub mod generator;
pub mod modulator;
pub mod preset;
pub mod sample;
pub mod zone;

use self::generator::{GeneratorType, GENERATOR_RECORD_SIZE};
use self::modulator::{Modulator, MODULATOR_RECORD_SIZE};
pub use self::preset::{Instrument, Preset, ZoneLayer, PERCUSSION_BANK};
use self::preset::{InstrumentHeader, PresetHeader, INSTRUMENT_HEADER_SIZE, PRESET_HEADER_SIZE};
pub use self::sample::{Sample, SampleLink};
use self::sample::{SampleHeader, SAMPLE_HEADER_SIZE};
use self::zone::{build_zones, Bag, RawGenerator, BAG_RECORD_SIZE};

/// The order of the sub-chunks of the pdta list.
const PDTA_CHUNKS: [&str; 9] = [
    "phdr", "pbag", "pmod", "pgen", "inst", "ibag", "imod", "igen", "shdr",
];

/// Metadata from the INFO list. None of it is needed for synthesis.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SoundFontInfo {
    /// The ifil version as (major, minor).
    pub version: Option<(u16, u16)>,
    /// Every other INFO sub-chunk as (tag, text), in file order.
    pub entries: Vec<(String, String)>,
}

impl SoundFontInfo {
    /// Looks up a text entry by its four character tag.
    pub fn get(&self, tag: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(t, _)| t == tag)
            .map(|(_, text)| text.as_str())
    }

    /// The bank name (INAM).
    pub fn name(&self) -> Option<&str> {
        self.get("INAM")
    }
}

/// A decoded SoundFont2 bank. Immutable after loading.
#[derive(Debug, Clone, PartialEq)]
pub struct SoundFont {
    info: SoundFontInfo,
    presets: Vec<Preset>,
    instruments: Vec<Instrument>,
    samples: Vec<Sample>,
}

/// A RIFF chunk borrowed from the input.
struct Chunk<'a> {
    id: [u8; 4],
    data: &'a [u8],
}

impl<'a> Chunk<'a> {
    fn read(reader: &mut ByteReader<'a>) -> Result<Chunk<'a>, FormatError> {
        let id = reader.fourcc()?;
        let size = reader.u32_le()? as usize;
        let data = reader.take(size)?;
        // Chunks are padded to an even size.
        if size % 2 == 1 && !reader.is_empty() {
            reader.take(1)?;
        }
        Ok(Chunk { id, data })
    }

    fn expect(reader: &mut ByteReader<'a>, id: &str) -> Result<Chunk<'a>, FormatError> {
        let chunk = Chunk::read(reader)?;
        if chunk.id != id.as_bytes() {
            return Err(FormatError::UnexpectedChunk {
                expected: id.to_string(),
                found: fourcc_name(&chunk.id),
            });
        }
        Ok(chunk)
    }

    /// Reads a LIST chunk and checks its list type.
    fn expect_list(reader: &mut ByteReader<'a>, list_type: &str) -> Result<&'a [u8], FormatError> {
        let chunk = Chunk::expect(reader, "LIST")?;
        let mut body = ByteReader::new(chunk.data, "LIST");
        let found = body.fourcc()?;
        if found != list_type.as_bytes() {
            return Err(FormatError::UnexpectedChunk {
                expected: list_type.to_string(),
                found: fourcc_name(&found),
            });
        }
        body.take(body.remaining())
    }
}

/// Splits a chunk into fixed-size records.
fn read_records<'a, T>(
    chunk: &Chunk<'a>,
    name: &'static str,
    record_size: usize,
    read: impl Fn(&mut ByteReader<'a>) -> Result<T, FormatError>,
) -> Result<Vec<T>, FormatError> {
    if chunk.data.len() % record_size != 0 {
        return Err(FormatError::InvalidRecordSize {
            chunk: name,
            size: chunk.data.len(),
            record: record_size,
        });
    }
    let mut reader = ByteReader::new(chunk.data, name);
    let mut records = Vec::with_capacity(chunk.data.len() / record_size);
    while !reader.is_empty() {
        records.push(read(&mut reader)?);
    }
    Ok(records)
}

/// Returns the bag records from `start` up to and including `end`, the first bag of
/// the next header.
fn bag_slice<'b>(bags: &'b [Bag], start: u16, end: u16) -> Result<&'b [Bag], FormatError> {
    let (start, end) = (start as usize, end as usize);
    if start > end || end >= bags.len() {
        return Err(FormatError::InvalidReference {
            kind: "bag",
            index: end,
            count: bags.len(),
        });
    }
    Ok(&bags[start..=end])
}

fn read_info(data: &[u8]) -> Result<SoundFontInfo, FormatError> {
    let mut reader = ByteReader::new(data, "INFO");
    let mut info = SoundFontInfo::default();
    while !reader.is_empty() {
        let chunk = Chunk::read(&mut reader)?;
        if &chunk.id == b"ifil" {
            let mut version = ByteReader::new(chunk.data, "ifil");
            info.version = Some((version.u16_le()?, version.u16_le()?));
        } else {
            info.entries
                .push((fourcc_name(&chunk.id), decode_text(chunk.data)));
        }
    }
    Ok(info)
}

impl SoundFont {
    /// Decodes a SoundFont2 file from memory.
    pub fn load(bytes: &[u8]) -> Result<SoundFont, FormatError> {
        let mut file = ByteReader::new(bytes, "RIFF");
        let riff = Chunk::expect(&mut file, "RIFF")?;
        let mut riff = ByteReader::new(riff.data, "RIFF");
        let form = riff.fourcc()?;
        if &form != b"sfbk" {
            return Err(FormatError::InvalidFormType(fourcc_name(&form)));
        }

        let info = read_info(Chunk::expect_list(&mut riff, "INFO")?)?;

        let mut sdta = ByteReader::new(Chunk::expect_list(&mut riff, "sdta")?, "sdta");
        let smpl = if sdta.is_empty() {
            &[][..]
        } else {
            Chunk::expect(&mut sdta, "smpl")?.data
        };

        let mut pdta = ByteReader::new(Chunk::expect_list(&mut riff, "pdta")?, "pdta");
        let mut chunks = Vec::with_capacity(PDTA_CHUNKS.len());
        for id in PDTA_CHUNKS {
            chunks.push(Chunk::expect(&mut pdta, id)?);
        }

        let preset_headers = read_records(&chunks[0], "phdr", PRESET_HEADER_SIZE, PresetHeader::read)?;
        let preset_bags = read_records(&chunks[1], "pbag", BAG_RECORD_SIZE, Bag::read)?;
        let preset_mods = read_records(&chunks[2], "pmod", MODULATOR_RECORD_SIZE, Modulator::read)?;
        let preset_gens =
            read_records(&chunks[3], "pgen", GENERATOR_RECORD_SIZE, RawGenerator::read)?;
        let instrument_headers = read_records(
            &chunks[4],
            "inst",
            INSTRUMENT_HEADER_SIZE,
            InstrumentHeader::read,
        )?;
        let instrument_bags = read_records(&chunks[5], "ibag", BAG_RECORD_SIZE, Bag::read)?;
        let instrument_mods =
            read_records(&chunks[6], "imod", MODULATOR_RECORD_SIZE, Modulator::read)?;
        let instrument_gens =
            read_records(&chunks[7], "igen", GENERATOR_RECORD_SIZE, RawGenerator::read)?;
        let sample_headers = read_records(&chunks[8], "shdr", SAMPLE_HEADER_SIZE, SampleHeader::read)?;

        // The last sample header is the terminal "EOS" record.
        let sample_count = sample_headers.len().saturating_sub(1);
        let samples: Vec<Sample> = sample_headers[..sample_count]
            .iter()
            .map(|header| Sample::extract(header, smpl))
            .collect();

        // Each header's zones run up to the next header's first bag. The last
        // header only closes that arithmetic and is discarded.
        let mut instruments = Vec::with_capacity(instrument_headers.len().saturating_sub(1));
        for pair in instrument_headers.windows(2) {
            let bags = bag_slice(&instrument_bags, pair[0].bag_index, pair[1].bag_index)?;
            let zones = build_zones(
                bags,
                &instrument_gens,
                &instrument_mods,
                GeneratorType::SampleId,
            )?;
            for zone in zones.zones() {
                if let Some(sample) = zone.target().filter(|&s| s >= samples.len()) {
                    return Err(FormatError::InvalidReference {
                        kind: "sample",
                        index: sample,
                        count: samples.len(),
                    });
                }
            }
            instruments.push(Instrument::new(pair[0].clone(), zones));
        }

        let mut presets = Vec::with_capacity(preset_headers.len().saturating_sub(1));
        for pair in preset_headers.windows(2) {
            let bags = bag_slice(&preset_bags, pair[0].bag_index, pair[1].bag_index)?;
            let zones = build_zones(bags, &preset_gens, &preset_mods, GeneratorType::Instrument)?;
            for zone in zones.zones() {
                if let Some(instrument) = zone.target().filter(|&i| i >= instruments.len()) {
                    return Err(FormatError::InvalidReference {
                        kind: "instrument",
                        index: instrument,
                        count: instruments.len(),
                    });
                }
            }
            debug!(
                name = pair[0].name.as_str(),
                bank = pair[0].bank,
                program = pair[0].program,
                zones = zones.zones().len(),
                "Preset decoded"
            );
            presets.push(Preset::new(pair[0].clone(), zones));
        }

        if presets.is_empty() {
            return Err(FormatError::NoPresets);
        }

        info!(
            name = info.name().unwrap_or("unnamed"),
            presets = presets.len(),
            instruments = instruments.len(),
            samples = samples.len(),
            "SoundFont loaded"
        );

        Ok(SoundFont {
            info,
            presets,
            instruments,
            samples,
        })
    }

    /// Reads and decodes a SoundFont2 file from disk.
    pub fn from_file(path: &Path) -> Result<SoundFont, FormatError> {
        SoundFont::load(&fs::read(path)?)
    }

    pub fn info(&self) -> &SoundFontInfo {
        &self.info
    }

    pub fn presets(&self) -> &[Preset] {
        &self.presets
    }

    pub fn instruments(&self) -> &[Instrument] {
        &self.instruments
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Finds the preset for a bank and program. When there is no exact match the
    /// result falls back, in order, to the same program in any non-percussion bank,
    /// to a percussion preset when percussion was requested, and finally to the first
    /// preset in the file. The fallback is returned alongside the preset index.
    pub fn find_preset(&self, bank: u16, program: u16) -> (usize, Option<LookupFallback>) {
        if let Some(index) = self
            .presets
            .iter()
            .position(|p| p.bank() == bank && p.program() == program)
        {
            return (index, None);
        }

        let fallback = (if bank == PERCUSSION_BANK {
            self.presets
                .iter()
                .position(|p| p.is_percussion() && p.program() == program)
                .or_else(|| self.presets.iter().position(|p| p.is_percussion()))
        } else {
            self.presets
                .iter()
                .position(|p| !p.is_percussion() && p.program() == program)
        })
        .unwrap_or(0);

        let preset = &self.presets[fallback];
        (
            fallback,
            Some(LookupFallback {
                requested_bank: bank,
                requested_program: program,
                bank: preset.bank(),
                program: preset.program(),
                name: preset.name().to_string(),
            }),
        )
    }

    /// Like [`SoundFont::find_preset`], logging any fallback.
    pub fn get_preset(&self, bank: u16, program: u16) -> &Preset {
        let (index, fallback) = self.find_preset(bank, program);
        if let Some(fallback) = fallback {
            warn!(%fallback, "Preset lookup fell back");
        }
        &self.presets[index]
    }

    /// Finds a preset by its exact name, falling back to the first preset.
    pub fn get_preset_by_name(&self, name: &str) -> &Preset {
        match self.presets.iter().find(|p| p.name() == name.trim()) {
            Some(preset) => preset,
            None => {
                warn!(name, "Preset name not found, using the first preset");
                &self.presets[0]
            }
        }
    }

    pub fn preset(&self, index: usize) -> Option<&Preset> {
        self.presets.get(index)
    }
}
