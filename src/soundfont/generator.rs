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

//! SoundFont2 generator identifiers and their value limits.

use std::fmt;

/// The size of a generator record in the pgen/igen chunks.
pub const GENERATOR_RECORD_SIZE: usize = 4;

/// Every generator defined by SoundFont 2.01, in enumeration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum GeneratorType {
    StartAddrsOffset = 0,
    EndAddrsOffset = 1,
    StartloopAddrsOffset = 2,
    EndloopAddrsOffset = 3,
    StartAddrsCoarseOffset = 4,
    ModLfoToPitch = 5,
    VibLfoToPitch = 6,
    ModEnvToPitch = 7,
    InitialFilterFc = 8,
    InitialFilterQ = 9,
    ModLfoToFilterFc = 10,
    ModEnvToFilterFc = 11,
    EndAddrsCoarseOffset = 12,
    ModLfoToVolume = 13,
    Unused1 = 14,
    ChorusEffectsSend = 15,
    ReverbEffectsSend = 16,
    Pan = 17,
    Unused2 = 18,
    Unused3 = 19,
    Unused4 = 20,
    DelayModLfo = 21,
    FreqModLfo = 22,
    DelayVibLfo = 23,
    FreqVibLfo = 24,
    DelayModEnv = 25,
    AttackModEnv = 26,
    HoldModEnv = 27,
    DecayModEnv = 28,
    SustainModEnv = 29,
    ReleaseModEnv = 30,
    KeyNumToModEnvHold = 31,
    KeyNumToModEnvDecay = 32,
    DelayVolEnv = 33,
    AttackVolEnv = 34,
    HoldVolEnv = 35,
    DecayVolEnv = 36,
    SustainVolEnv = 37,
    ReleaseVolEnv = 38,
    KeyNumToVolEnvHold = 39,
    KeyNumToVolEnvDecay = 40,
    Instrument = 41,
    Reserved1 = 42,
    KeyRange = 43,
    VelRange = 44,
    StartloopAddrsCoarseOffset = 45,
    KeyNum = 46,
    Velocity = 47,
    InitialAttenuation = 48,
    Reserved2 = 49,
    EndloopAddrsCoarseOffset = 50,
    CoarseTune = 51,
    FineTune = 52,
    SampleId = 53,
    SampleModes = 54,
    Reserved3 = 55,
    ScaleTuning = 56,
    ExclusiveClass = 57,
    OverridingRootKey = 58,
    Unused5 = 59,
    EndOper = 60,
}

/// How a generator combines across the preset and instrument levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combination {
    /// Preset and instrument values are summed.
    Additive,
    /// Only the instrument level value applies.
    Substitution,
}

/// The static description of one generator type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorInfo {
    pub name: &'static str,
    pub min: i32,
    pub max: i32,
    pub default: i32,
    pub combination: Combination,
}

const fn add(name: &'static str, min: i32, max: i32, default: i32) -> GeneratorInfo {
    GeneratorInfo {
        name,
        min,
        max,
        default,
        combination: Combination::Additive,
    }
}

const fn sub(name: &'static str, min: i32, max: i32, default: i32) -> GeneratorInfo {
    GeneratorInfo {
        name,
        min,
        max,
        default,
        combination: Combination::Substitution,
    }
}

/// Key and velocity ranges default to the full 0-127 span, packed as lo | hi << 8.
const FULL_RANGE: i32 = 127 << 8;

/// Indexed by the generator's numeric id.
static GENERATOR_TABLE: [GeneratorInfo; 61] = [
    sub("startAddrsOffset", 0, 32768, 0),
    sub("endAddrsOffset", -32768, 32768, 0),
    sub("startloopAddrsOffset", -32768, 32768, 0),
    sub("endloopAddrsOffset", -32768, 32768, 0),
    sub("startAddrsCoarseOffset", 0, 32768, 0),
    add("modLfoToPitch", -12000, 12000, 0),
    add("vibLfoToPitch", -12000, 12000, 0),
    add("modEnvToPitch", -12000, 12000, 0),
    add("initialFilterFc", 1500, 13500, 13500),
    add("initialFilterQ", 0, 960, 0),
    add("modLfoToFilterFc", -12000, 12000, 0),
    add("modEnvToFilterFc", -12000, 12000, 0),
    sub("endAddrsCoarseOffset", -32768, 32768, 0),
    add("modLfoToVolume", -960, 960, 0),
    add("unused1", 0, 0, 0),
    add("chorusEffectsSend", 0, 1000, 0),
    add("reverbEffectsSend", 0, 1000, 0),
    add("pan", -500, 500, 0),
    add("unused2", 0, 0, 0),
    add("unused3", 0, 0, 0),
    add("unused4", 0, 0, 0),
    add("delayModLFO", -12000, 5000, -12000),
    add("freqModLFO", -16000, 4500, 0),
    add("delayVibLFO", -12000, 5000, -12000),
    add("freqVibLFO", -16000, 4500, 0),
    add("delayModEnv", -12000, 5000, -12000),
    add("attackModEnv", -12000, 8000, -12000),
    add("holdModEnv", -12000, 5000, -12000),
    add("decayModEnv", -12000, 8000, -12000),
    add("sustainModEnv", 0, 1000, 0),
    add("releaseModEnv", -12000, 8000, -12000),
    add("keyNumToModEnvHold", -1200, 1200, 0),
    add("keyNumToModEnvDecay", -1200, 1200, 0),
    add("delayVolEnv", -12000, 5000, -12000),
    add("attackVolEnv", -12000, 8000, -12000),
    add("holdVolEnv", -12000, 5000, -12000),
    add("decayVolEnv", -12000, 8000, -12000),
    add("sustainVolEnv", 0, 1440, 0),
    add("releaseVolEnv", -7200, 8000, -7200),
    add("keyNumToVolEnvHold", -1200, 1200, 0),
    add("keyNumToVolEnvDecay", -1200, 1200, 0),
    sub("instrument", 0, 65535, 0),
    add("reserved1", 0, 0, 0),
    sub("keyRange", 0, 32639, FULL_RANGE),
    sub("velRange", 0, 32639, FULL_RANGE),
    sub("startloopAddrsCoarseOffset", -32768, 32768, 0),
    sub("keyNum", -1, 127, -1),
    sub("velocity", -1, 127, -1),
    add("initialAttenuation", -250, 1440, 0),
    add("reserved2", 0, 0, 0),
    sub("endloopAddrsCoarseOffset", -32768, 32768, 0),
    add("coarseTune", -120, 120, 0),
    add("fineTune", -99, 99, 0),
    sub("sampleID", 0, 65535, 0),
    sub("sampleModes", 0, 3, 0),
    add("reserved3", 0, 0, 0),
    add("scaleTuning", 0, 1200, 100),
    sub("exclusiveClass", 0, 99999, 0),
    sub("overridingRootKey", -1, 127, -1),
    add("unused5", 0, 0, 0),
    add("endOper", 0, 0, 0),
];

const ALL: [GeneratorType; 61] = {
    use GeneratorType::*;
    [
        StartAddrsOffset,
        EndAddrsOffset,
        StartloopAddrsOffset,
        EndloopAddrsOffset,
        StartAddrsCoarseOffset,
        ModLfoToPitch,
        VibLfoToPitch,
        ModEnvToPitch,
        InitialFilterFc,
        InitialFilterQ,
        ModLfoToFilterFc,
        ModEnvToFilterFc,
        EndAddrsCoarseOffset,
        ModLfoToVolume,
        Unused1,
        ChorusEffectsSend,
        ReverbEffectsSend,
        Pan,
        Unused2,
        Unused3,
        Unused4,
        DelayModLfo,
        FreqModLfo,
        DelayVibLfo,
        FreqVibLfo,
        DelayModEnv,
        AttackModEnv,
        HoldModEnv,
        DecayModEnv,
        SustainModEnv,
        ReleaseModEnv,
        KeyNumToModEnvHold,
        KeyNumToModEnvDecay,
        DelayVolEnv,
        AttackVolEnv,
        HoldVolEnv,
        DecayVolEnv,
        SustainVolEnv,
        ReleaseVolEnv,
        KeyNumToVolEnvHold,
        KeyNumToVolEnvDecay,
        Instrument,
        Reserved1,
        KeyRange,
        VelRange,
        StartloopAddrsCoarseOffset,
        KeyNum,
        Velocity,
        InitialAttenuation,
        Reserved2,
        EndloopAddrsCoarseOffset,
        CoarseTune,
        FineTune,
        SampleId,
        SampleModes,
        Reserved3,
        ScaleTuning,
        ExclusiveClass,
        OverridingRootKey,
        Unused5,
        EndOper,
    ]
};

impl GeneratorType {
    /// The number of generator types.
    pub const COUNT: usize = 61;

    /// Maps a raw generator id to its type. Ids beyond `endOper` are not generators.
    pub fn from_id(id: u16) -> Option<GeneratorType> {
        ALL.get(id as usize).copied()
    }

    /// All generator types in id order.
    pub fn all() -> impl Iterator<Item = GeneratorType> {
        ALL.iter().copied()
    }

    pub fn id(self) -> u16 {
        self as u16
    }

    pub fn info(self) -> &'static GeneratorInfo {
        &GENERATOR_TABLE[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.info().name
    }

    pub fn default_value(self) -> i32 {
        self.info().default
    }

    /// Whether the preset level value is ignored for this generator.
    pub fn is_substitution(self) -> bool {
        self.info().combination == Combination::Substitution
    }

    /// Clamps a value to this generator's allowed range.
    pub fn clamp(self, value: i32) -> i32 {
        let info = self.info();
        value.clamp(info.min, info.max)
    }
}

impl fmt::Display for GeneratorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An inclusive key or velocity range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub lo: u8,
    pub hi: u8,
}

impl Range {
    /// The full 0-127 range.
    pub const FULL: Range = Range { lo: 0, hi: 127 };

    /// Unpacks a range stored in a generator amount.
    pub fn from_amount(amount: i16) -> Range {
        let raw = amount as u16;
        Range {
            lo: (raw & 0x7F) as u8,
            hi: ((raw >> 8) & 0x7F) as u8,
        }
    }

    pub fn contains(&self, value: u8) -> bool {
        value >= self.lo && value <= self.hi
    }
}

impl Default for Range {
    fn default() -> Self {
        Range::FULL
    }
}

/// A single generator record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generator {
    pub ty: GeneratorType,
    pub amount: i16,
}

impl Generator {
    pub fn new(ty: GeneratorType, amount: i16) -> Generator {
        Generator { ty, amount }
    }

    /// The amount as an unsigned index, for instrument and sample references.
    pub fn index(&self) -> usize {
        self.amount as u16 as usize
    }

    pub fn range(&self) -> Range {
        Range::from_amount(self.amount)
    }
}
