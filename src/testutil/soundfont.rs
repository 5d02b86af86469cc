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

//! Builds SoundFont2 byte streams for tests.

use std::f64::consts::PI;

use crate::soundfont::generator::GeneratorType;

/// Guard points written after every sample, as SF2 requires.
const SAMPLE_PADDING: usize = 46;

/// A sample to write into the smpl chunk.
#[derive(Clone)]
pub struct TestSample {
    name: String,
    points: Vec<i16>,
    loop_start: u32,
    loop_end: u32,
    sample_rate: u32,
    root_key: u8,
    pitch_correction: i8,
    sample_type: u16,
}

impl TestSample {
    /// A half-scale sine with a 32 frame period, looped over its middle.
    pub fn sine(name: &str, frames: usize, root_key: u8) -> TestSample {
        let points = (0..frames)
            .map(|i| ((2.0 * PI * i as f64 / 32.0).sin() * 16384.0) as i16)
            .collect();
        TestSample {
            name: name.to_string(),
            points,
            loop_start: 8.min(frames as u32),
            loop_end: frames.saturating_sub(8) as u32,
            sample_rate: 44100,
            root_key,
            pitch_correction: 0,
            sample_type: 1,
        }
    }

    /// A constant signal, which makes gain and envelope checks exact.
    pub fn constant(name: &str, frames: usize, value: i16) -> TestSample {
        TestSample {
            name: name.to_string(),
            points: vec![value; frames],
            loop_start: 0,
            loop_end: frames as u32,
            sample_rate: 44100,
            root_key: 60,
            pitch_correction: 0,
            sample_type: 1,
        }
    }

    pub fn with_loop(mut self, start: u32, end: u32) -> TestSample {
        self.loop_start = start;
        self.loop_end = end;
        self
    }

    pub fn with_rate(mut self, sample_rate: u32) -> TestSample {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_correction(mut self, cents: i8) -> TestSample {
        self.pitch_correction = cents;
        self
    }

    pub fn with_type(mut self, sample_type: u16) -> TestSample {
        self.sample_type = sample_type;
        self
    }
}

type Generators = Vec<(GeneratorType, i16)>;

/// An instrument: an optional global zone and zones referencing samples by index.
#[derive(Clone)]
pub struct TestInstrument {
    name: String,
    global: Option<Generators>,
    zones: Vec<(Generators, u16)>,
}

impl TestInstrument {
    pub fn new(name: &str) -> TestInstrument {
        TestInstrument {
            name: name.to_string(),
            global: None,
            zones: Vec::new(),
        }
    }

    pub fn global(mut self, generators: &[(GeneratorType, i16)]) -> TestInstrument {
        self.global = Some(generators.to_vec());
        self
    }

    pub fn zone(mut self, sample: u16, generators: &[(GeneratorType, i16)]) -> TestInstrument {
        self.zones.push((generators.to_vec(), sample));
        self
    }
}

/// A preset: an optional global zone and zones referencing instruments by index.
#[derive(Clone)]
pub struct TestPreset {
    name: String,
    bank: u16,
    program: u16,
    global: Option<Generators>,
    zones: Vec<(Generators, u16)>,
}

impl TestPreset {
    pub fn new(name: &str, bank: u16, program: u16) -> TestPreset {
        TestPreset {
            name: name.to_string(),
            bank,
            program,
            global: None,
            zones: Vec::new(),
        }
    }

    pub fn global(mut self, generators: &[(GeneratorType, i16)]) -> TestPreset {
        self.global = Some(generators.to_vec());
        self
    }

    pub fn zone(mut self, instrument: u16, generators: &[(GeneratorType, i16)]) -> TestPreset {
        self.zones.push((generators.to_vec(), instrument));
        self
    }
}

/// Assembles a complete RIFF/sfbk file.
#[derive(Default)]
pub struct SoundFontBuilder {
    samples: Vec<TestSample>,
    instruments: Vec<TestInstrument>,
    presets: Vec<TestPreset>,
    swap: Option<(usize, usize)>,
}

impl SoundFontBuilder {
    pub fn new() -> SoundFontBuilder {
        SoundFontBuilder::default()
    }

    pub fn sample(mut self, sample: TestSample) -> SoundFontBuilder {
        self.samples.push(sample);
        self
    }

    pub fn instrument(mut self, instrument: TestInstrument) -> SoundFontBuilder {
        self.instruments.push(instrument);
        self
    }

    pub fn preset(mut self, preset: TestPreset) -> SoundFontBuilder {
        self.presets.push(preset);
        self
    }

    /// Writes two pdta sub-chunks in swapped order, producing an invalid file.
    pub fn swap_pdta_chunks(mut self, a: usize, b: usize) -> SoundFontBuilder {
        self.swap = Some((a, b));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut info = Vec::new();
        info.extend(chunk(b"ifil", &[2, 0, 1, 0]));
        info.extend(chunk(b"INAM", b"Test Bank\0"));
        info.extend(chunk(b"isng", b"EMU8000\0"));

        let mut smpl = Vec::new();
        let mut shdr = Vec::new();
        let mut offset = 0u32;
        for sample in &self.samples {
            for point in &sample.points {
                smpl.extend(point.to_le_bytes());
            }
            smpl.extend(std::iter::repeat(0u8).take(SAMPLE_PADDING * 2));
            let len = sample.points.len() as u32;
            shdr.extend(name20(&sample.name));
            shdr.extend(offset.to_le_bytes());
            shdr.extend((offset + len).to_le_bytes());
            shdr.extend((offset + sample.loop_start).to_le_bytes());
            shdr.extend((offset + sample.loop_end).to_le_bytes());
            shdr.extend(sample.sample_rate.to_le_bytes());
            shdr.push(sample.root_key);
            shdr.push(sample.pitch_correction as u8);
            shdr.extend(0u16.to_le_bytes());
            shdr.extend(sample.sample_type.to_le_bytes());
            offset += len + SAMPLE_PADDING as u32;
        }
        shdr.extend(name20("EOS"));
        shdr.extend([0u8; 26]);

        let instruments: Vec<_> = self
            .instruments
            .iter()
            .map(|i| (i.name.clone(), 0, 0, i.global.clone(), i.zones.clone()))
            .collect();
        let (inst, ibag, imod, igen) = zone_chunks(&instruments, GeneratorType::SampleId, false);

        let presets: Vec<_> = self
            .presets
            .iter()
            .map(|p| (p.name.clone(), p.bank, p.program, p.global.clone(), p.zones.clone()))
            .collect();
        let (phdr, pbag, pmod, pgen) = zone_chunks(&presets, GeneratorType::Instrument, true);

        let mut pdta_chunks = vec![
            chunk(b"phdr", &phdr),
            chunk(b"pbag", &pbag),
            chunk(b"pmod", &pmod),
            chunk(b"pgen", &pgen),
            chunk(b"inst", &inst),
            chunk(b"ibag", &ibag),
            chunk(b"imod", &imod),
            chunk(b"igen", &igen),
            chunk(b"shdr", &shdr),
        ];
        if let Some((a, b)) = self.swap {
            pdta_chunks.swap(a, b);
        }

        let mut body = b"sfbk".to_vec();
        body.extend(list(b"INFO", &info));
        body.extend(list(b"sdta", &chunk(b"smpl", &smpl)));
        body.extend(list(b"pdta", &pdta_chunks.concat()));
        chunk(b"RIFF", &body)
    }
}

type ZoneOwner = (String, u16, u16, Option<Generators>, Vec<(Generators, u16)>);

/// Writes the header, bag, modulator and generator chunks for presets or instruments.
fn zone_chunks(
    owners: &[ZoneOwner],
    reference: GeneratorType,
    presets: bool,
) -> (Vec<u8>, Vec<u8>, Vec<u8>, Vec<u8>) {
    let mut headers = Vec::new();
    let mut bags = Vec::new();
    let mut generators = Vec::new();
    let mut bag_count = 0u16;

    for (name, bank, program, global, zones) in owners {
        headers.extend(name20(name));
        if presets {
            headers.extend(program.to_le_bytes());
            headers.extend(bank.to_le_bytes());
        }
        headers.extend(bag_count.to_le_bytes());
        if presets {
            headers.extend([0u8; 12]);
        }

        if let Some(global) = global {
            bags.extend(gen_start(&generators).to_le_bytes());
            bags.extend(0u16.to_le_bytes());
            write_generators(&mut generators, global);
            bag_count += 1;
        }
        for (list, target) in zones {
            bags.extend(gen_start(&generators).to_le_bytes());
            bags.extend(0u16.to_le_bytes());
            let mut list = list.clone();
            list.push((reference, *target as i16));
            write_generators(&mut generators, &list);
            bag_count += 1;
        }
    }

    headers.extend(name20(if presets { "EOP" } else { "EOI" }));
    if presets {
        headers.extend([0u8; 4]);
    }
    headers.extend(bag_count.to_le_bytes());
    if presets {
        headers.extend([0u8; 12]);
    }

    bags.extend(gen_start(&generators).to_le_bytes());
    bags.extend(0u16.to_le_bytes());
    generators.extend([0u8; 4]);

    (headers, bags, vec![0u8; 10], generators)
}

fn write_generators(generators: &mut Vec<u8>, list: &[(GeneratorType, i16)]) {
    for (ty, amount) in list {
        generators.extend(ty.id().to_le_bytes());
        generators.extend(amount.to_le_bytes());
    }
}

fn gen_start(generators: &[u8]) -> u16 {
    (generators.len() / 4) as u16
}

fn name20(name: &str) -> [u8; 20] {
    let mut bytes = [0u8; 20];
    for (slot, byte) in bytes.iter_mut().zip(name.bytes().take(19)) {
        *slot = byte;
    }
    bytes
}

/// A RIFF chunk, padded to an even length.
pub fn chunk(id: &[u8; 4], data: &[u8]) -> Vec<u8> {
    let mut bytes = id.to_vec();
    bytes.extend((data.len() as u32).to_le_bytes());
    bytes.extend(data);
    if data.len() % 2 == 1 {
        bytes.push(0);
    }
    bytes
}

fn list(kind: &[u8; 4], data: &[u8]) -> Vec<u8> {
    let mut body = kind.to_vec();
    body.extend(data);
    chunk(b"LIST", &body)
}

/// A small general purpose bank:
///
/// * 0:0 "Piano", a sine split at key 60 with a velocity layer above 100.
/// * 0:1 "Pad", a sine with a slow attack and release that loops until release.
/// * 128:0 "Drums", an open and a closed hi-hat sharing exclusive class 1.
pub fn general_bank() -> Vec<u8> {
    SoundFontBuilder::new()
        .sample(TestSample::sine("low", 2048, 48))
        .sample(TestSample::sine("high", 2048, 72))
        .sample(TestSample::constant("hat", 4096, 8192))
        .instrument(
            TestInstrument::new("piano")
                .global(&[(GeneratorType::ReleaseVolEnv, -1200)])
                .zone(
                    0,
                    &[
                        (GeneratorType::KeyRange, 59 << 8),
                        (GeneratorType::SampleModes, 1),
                    ],
                )
                .zone(
                    1,
                    &[
                        (GeneratorType::KeyRange, (127 << 8) | 60),
                        (GeneratorType::SampleModes, 1),
                    ],
                )
                .zone(
                    1,
                    &[
                        (GeneratorType::KeyRange, (127 << 8) | 60),
                        (GeneratorType::VelRange, (127 << 8) | 101),
                        (GeneratorType::SampleModes, 1),
                        (GeneratorType::Pan, 250),
                    ],
                ),
        )
        .instrument(
            TestInstrument::new("pad").zone(
                0,
                &[
                    (GeneratorType::AttackVolEnv, 0),
                    (GeneratorType::ReleaseVolEnv, 0),
                    (GeneratorType::SampleModes, 3),
                ],
            ),
        )
        .instrument(
            TestInstrument::new("hats")
                .zone(
                    2,
                    &[
                        (GeneratorType::KeyRange, (42 << 8) | 42),
                        (GeneratorType::ExclusiveClass, 1),
                        (GeneratorType::SampleModes, 1),
                    ],
                )
                .zone(
                    2,
                    &[
                        (GeneratorType::KeyRange, (46 << 8) | 46),
                        (GeneratorType::ExclusiveClass, 1),
                        (GeneratorType::SampleModes, 1),
                    ],
                ),
        )
        .preset(TestPreset::new("Piano", 0, 0).zone(0, &[]))
        .preset(TestPreset::new("Pad", 0, 1).zone(1, &[]))
        .preset(TestPreset::new("Drums", 128, 0).zone(2, &[]))
        .build()
}
