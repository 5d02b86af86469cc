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

//! Zones and the bag arithmetic that links them to generator and modulator ranges.

use tracing::debug;

use super::generator::{Generator, GeneratorType, Range};
use super::modulator::Modulator;
use crate::bytes::ByteReader;
use crate::error::FormatError;

/// The size of a bag record in the pbag/ibag chunks.
pub const BAG_RECORD_SIZE: usize = 4;

/// A bag record: the first generator and modulator belonging to a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Bag {
    pub generator_index: u16,
    pub modulator_index: u16,
}

impl Bag {
    pub fn read(reader: &mut ByteReader) -> Result<Bag, FormatError> {
        Ok(Bag {
            generator_index: reader.u16_le()?,
            modulator_index: reader.u16_le()?,
        })
    }
}

/// A generator record as stored in the file. The id may not be a known generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RawGenerator {
    pub id: u16,
    pub amount: i16,
}

impl RawGenerator {
    pub fn read(reader: &mut ByteReader) -> Result<RawGenerator, FormatError> {
        Ok(RawGenerator {
            id: reader.u16_le()?,
            amount: reader.i16_le()?,
        })
    }
}

/// A fixed-size map from generator type to value, one slot per type.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct GeneratorSet {
    values: [Option<i16>; GeneratorType::COUNT],
}

impl GeneratorSet {
    pub fn new() -> GeneratorSet {
        GeneratorSet {
            values: [None; GeneratorType::COUNT],
        }
    }

    pub fn get(&self, ty: GeneratorType) -> Option<i16> {
        self.values[ty as usize]
    }

    pub fn set(&mut self, ty: GeneratorType, amount: i16) {
        self.values[ty as usize] = Some(amount);
    }

    /// Fills every slot that is still empty from `defaults`. Used to apply a global
    /// zone underneath a local one.
    pub fn inherit(&mut self, defaults: &GeneratorSet) {
        for (slot, default) in self.values.iter_mut().zip(defaults.values.iter()) {
            if slot.is_none() {
                *slot = *default;
            }
        }
    }

    /// Iterates over the defined generators in id order.
    pub fn iter(&self) -> impl Iterator<Item = Generator> + '_ {
        GeneratorType::all()
            .zip(self.values.iter())
            .filter_map(|(ty, value)| value.map(|amount| Generator::new(ty, amount)))
    }

    pub fn len(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for GeneratorSet {
    fn default() -> Self {
        GeneratorSet::new()
    }
}

impl std::fmt::Debug for GeneratorSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|g| (g.ty.name(), g.amount)))
            .finish()
    }
}

/// A key/velocity scoped set of generators. Preset zones reference an instrument,
/// instrument zones reference a sample. A zone without a reference is a global zone.
#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    key_range: Range,
    vel_range: Range,
    generators: GeneratorSet,
    modulators: Vec<Modulator>,
    target: Option<usize>,
}

impl Zone {
    pub fn new(generators: GeneratorSet, modulators: Vec<Modulator>, target: Option<usize>) -> Zone {
        let key_range = generators
            .get(GeneratorType::KeyRange)
            .map(Range::from_amount)
            .unwrap_or_default();
        let vel_range = generators
            .get(GeneratorType::VelRange)
            .map(Range::from_amount)
            .unwrap_or_default();
        Zone {
            key_range,
            vel_range,
            generators,
            modulators,
            target,
        }
    }

    pub fn key_range(&self) -> Range {
        self.key_range
    }

    pub fn vel_range(&self) -> Range {
        self.vel_range
    }

    pub fn generators(&self) -> &GeneratorSet {
        &self.generators
    }

    pub fn modulators(&self) -> &[Modulator] {
        &self.modulators
    }

    /// The referenced instrument (preset zones) or sample (instrument zones).
    pub fn target(&self) -> Option<usize> {
        self.target
    }

    pub fn is_global(&self) -> bool {
        self.target.is_none()
    }

    pub fn matches(&self, key: u8, velocity: u8) -> bool {
        self.key_range.contains(key) && self.vel_range.contains(velocity)
    }
}

/// The zones belonging to one preset or instrument.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ZoneList {
    global: Option<Zone>,
    zones: Vec<Zone>,
}

impl ZoneList {
    pub fn new(global: Option<Zone>, zones: Vec<Zone>) -> ZoneList {
        ZoneList { global, zones }
    }

    pub fn global(&self) -> Option<&Zone> {
        self.global.as_ref()
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    /// The generators of `zone` with the global zone's generators filled in underneath.
    pub fn effective_generators(&self, zone: &Zone) -> GeneratorSet {
        let mut generators = zone.generators;
        if let Some(global) = &self.global {
            generators.inherit(&global.generators);
        }
        generators
    }
}

/// Builds the zones of one header from its slice of the bag array.
///
/// `bags` must contain one extra record past the header's last zone, because a
/// zone's generator and modulator counts are the difference to the next bag.
pub(crate) fn build_zones(
    bags: &[Bag],
    generators: &[RawGenerator],
    modulators: &[Modulator],
    reference: GeneratorType,
) -> Result<ZoneList, FormatError> {
    let mut global = None;
    let mut zones = Vec::new();

    for (index, pair) in bags.windows(2).enumerate() {
        let gen_range = pair[0].generator_index as usize..pair[1].generator_index as usize;
        let mod_range = pair[0].modulator_index as usize..pair[1].modulator_index as usize;
        let gen_slice = generators
            .get(gen_range.clone())
            .ok_or(FormatError::InvalidReference {
                kind: "generator",
                index: gen_range.end,
                count: generators.len(),
            })?;
        let mod_slice = modulators
            .get(mod_range.clone())
            .ok_or(FormatError::InvalidReference {
                kind: "modulator",
                index: mod_range.end,
                count: modulators.len(),
            })?;

        let mut set = GeneratorSet::new();
        for raw in gen_slice {
            match GeneratorType::from_id(raw.id) {
                Some(ty) => set.set(ty, raw.amount),
                None => debug!(id = raw.id, "Skipping unknown generator"),
            }
        }

        let target = set
            .get(reference)
            .map(|amount| Generator::new(reference, amount).index());
        let zone = Zone::new(set, mod_slice.to_vec(), target);

        if zone.is_global() {
            if index == 0 {
                global = Some(zone);
            } else {
                debug!(zone = index, "Ignoring zone without a reference");
            }
        } else {
            zones.push(zone);
        }
    }

    Ok(ZoneList::new(global, zones))
}
