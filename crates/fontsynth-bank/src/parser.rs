//! SF2 reader: RIFF `sfbk` image to [`SoundBank`].
//!
//! Layout: `LIST INFO` (text fields, optional `DMOD`), `LIST sdta` (`smpl`,
//! optional `sm24`), `LIST pdta` (`phdr pbag pmod pgen inst ibag imod igen
//! shdr`). Header and bag tables end with a terminal record that only
//! delimits the previous entry's range.

use crate::bank::{BankInfo, SoundBank};
use crate::error::{Error, Result};
use crate::generator::{Generator, GeneratorType};
use crate::modulator::Modulator;
use crate::preset::{Instrument, Preset};
use crate::riff::{read_riff, records, ByteReader, Chunk, ChunkIter};
use crate::sample::Sample;
use crate::zone::{InstrumentZone, PresetZone, ZoneParams, ZoneRange};
use std::sync::Arc;
use tracing::{debug, trace, warn};

const PHDR_SIZE: usize = 38;
const INST_SIZE: usize = 22;
const BAG_SIZE: usize = 4;
const MOD_SIZE: usize = 10;
const GEN_SIZE: usize = 4;
const SHDR_SIZE: usize = 46;

pub(crate) fn parse(data: &[u8]) -> Result<SoundBank> {
    let (form, chunks) = read_riff(data)?;
    if &form != b"sfbk" {
        return Err(Error::format("RIFF", "form type is not 'sfbk'"));
    }

    let mut info = None;
    let mut sdta = None;
    let mut pdta = None;
    for chunk in chunks {
        let chunk = chunk?;
        if !chunk.is_list() {
            trace!("skipping top-level chunk '{}'", chunk.name());
            continue;
        }
        let (list_form, sub) = chunk.list()?;
        match &list_form {
            b"INFO" => info = Some(sub),
            b"sdta" => sdta = Some(sub),
            b"pdta" => pdta = Some(sub),
            other => trace!("skipping list '{}'", String::from_utf8_lossy(other)),
        }
    }

    let (info, dmod) = parse_info(info.ok_or(Error::MissingChunk("INFO"))?)?;
    let sample_data = SampleData::read(sdta.ok_or(Error::MissingChunk("sdta"))?)?;
    let pdta = Pdta::read(pdta.ok_or(Error::MissingChunk("pdta"))?)?;

    let mut bank = SoundBank {
        info,
        ..Default::default()
    };
    if let Some(custom) = dmod {
        let mut defaults = custom;
        crate::modulator::add_unique(&mut defaults, &bank.default_modulators);
        bank.default_modulators = defaults;
        bank.custom_defaults = true;
    }

    bank.samples = read_samples(&pdta.shdr, &sample_data)?;
    bank.instruments = read_instruments(&pdta, bank.samples.len())?;
    bank.presets = read_presets(&pdta, bank.instruments.len())?;
    bank.sort_presets();

    debug!(
        "Parsed bank '{}': {} presets, {} instruments, {} samples",
        bank.info.name,
        bank.presets.len(),
        bank.instruments.len(),
        bank.samples.len()
    );
    Ok(bank)
}

fn parse_info(chunks: ChunkIter<'_>) -> Result<(BankInfo, Option<Vec<Modulator>>)> {
    let mut info = BankInfo::default();
    let mut dmod = None;
    for chunk in chunks {
        let chunk = chunk?;
        match &chunk.id {
            b"ifil" => {
                let mut r = ByteReader::new(chunk.data);
                info.version = (r.u16()?, r.u16()?);
            }
            b"INAM" => info.name = crate::riff::decode_string(chunk.data),
            id if id.eq_ignore_ascii_case(b"DMOD") => {
                let mut records = read_modulators(&chunk)?;
                records.pop();
                let mods: Vec<Modulator> = records.into_iter().flatten().collect();
                debug!("Bank defines {} custom default modulators", mods.len());
                dmod = Some(mods);
            }
            _ => {
                let value = crate::riff::decode_string(chunk.data);
                trace!("INFO '{}' = '{}'", chunk.name(), value);
                info.fields.push((chunk.name(), value));
            }
        }
    }
    Ok((info, dmod))
}

/// The raw `smpl` (16-bit) and optional `sm24` (low byte) payloads.
struct SampleData<'a> {
    smpl: &'a [u8],
    sm24: Option<&'a [u8]>,
}

impl<'a> SampleData<'a> {
    fn read(chunks: ChunkIter<'a>) -> Result<Self> {
        let mut smpl = None;
        let mut sm24 = None;
        for chunk in chunks {
            let chunk = chunk?;
            match &chunk.id {
                b"smpl" => smpl = Some(chunk.data),
                b"sm24" => sm24 = Some(chunk.data),
                _ => trace!("skipping sdta chunk '{}'", chunk.name()),
            }
        }
        let smpl = smpl.ok_or(Error::MissingChunk("smpl"))?;
        let frames = smpl.len() / 2;
        let sm24 = sm24.filter(|low| {
            let ok = low.len() >= frames;
            if !ok {
                warn!("sm24 chunk is shorter than smpl, ignoring 24-bit data");
            }
            ok
        });
        Ok(Self { smpl, sm24 })
    }

    fn frames(&self) -> usize {
        self.smpl.len() / 2
    }

    fn convert(&self, start: usize, end: usize) -> Arc<[f32]> {
        (start..end)
            .map(|i| {
                let hi = i16::from_le_bytes([self.smpl[i * 2], self.smpl[i * 2 + 1]]);
                match self.sm24 {
                    Some(low) => ((hi as i32) << 8 | low[i] as i32) as f32 / 8_388_608.0,
                    None => hi as f32 / 32768.0,
                }
            })
            .collect()
    }
}

/// The nine `pdta` tables.
struct Pdta<'a> {
    phdr: Chunk<'a>,
    pbag: Vec<Bag>,
    pmod: Vec<Option<Modulator>>,
    pgen: Vec<RawGenerator>,
    inst: Chunk<'a>,
    ibag: Vec<Bag>,
    imod: Vec<Option<Modulator>>,
    igen: Vec<RawGenerator>,
    shdr: Chunk<'a>,
}

impl<'a> Pdta<'a> {
    fn read(chunks: ChunkIter<'a>) -> Result<Self> {
        const TAGS: [&[u8; 4]; 9] = [
            b"phdr", b"pbag", b"pmod", b"pgen", b"inst", b"ibag", b"imod", b"igen", b"shdr",
        ];
        const NAMES: [&str; 9] = [
            "phdr", "pbag", "pmod", "pgen", "inst", "ibag", "imod", "igen", "shdr",
        ];
        let mut found: [Option<Chunk<'a>>; 9] = [None; 9];
        for chunk in chunks {
            let chunk = chunk?;
            match TAGS.iter().position(|t| **t == chunk.id) {
                Some(i) => found[i] = Some(chunk),
                None => trace!("skipping pdta chunk '{}'", chunk.name()),
            }
        }
        let mut take = |i: usize| found[i].take().ok_or(Error::MissingChunk(NAMES[i]));

        Ok(Self {
            phdr: take(0)?,
            pbag: read_bags(&take(1)?)?,
            pmod: read_modulators(&take(2)?)?,
            pgen: read_generators(&take(3)?)?,
            inst: take(4)?,
            ibag: read_bags(&take(5)?)?,
            imod: read_modulators(&take(6)?)?,
            igen: read_generators(&take(7)?)?,
            shdr: take(8)?,
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct Bag {
    generator: usize,
    modulator: usize,
}

#[derive(Debug, Clone, Copy)]
struct RawGenerator {
    oper: u16,
    amount: i16,
}

fn read_bags(chunk: &Chunk<'_>) -> Result<Vec<Bag>> {
    records(chunk, BAG_SIZE)?
        .map(|rec| {
            let mut r = ByteReader::new(rec);
            Ok(Bag {
                generator: r.u16()? as usize,
                modulator: r.u16()? as usize,
            })
        })
        .collect()
}

fn read_generators(chunk: &Chunk<'_>) -> Result<Vec<RawGenerator>> {
    records(chunk, GEN_SIZE)?
        .map(|rec| {
            let mut r = ByteReader::new(rec);
            Ok(RawGenerator {
                oper: r.u16()?,
                amount: r.i16()?,
            })
        })
        .collect()
}

/// Modulator records in file order. Records with an unusable destination
/// (links, ids past `overridingRootKey`) become `None` so bag indices still
/// line up.
fn read_modulators(chunk: &Chunk<'_>) -> Result<Vec<Option<Modulator>>> {
    records(chunk, MOD_SIZE)?
        .map(|rec| {
            let mut r = ByteReader::new(rec);
            let source = r.u16()?;
            let dest = r.u16()?;
            let amount = r.i16()?;
            let amount_source = r.u16()?;
            let transform = r.u16()?;
            let destination = GeneratorType::from_id(dest).filter(|g| g.id() <= 58);
            if destination.is_none() {
                trace!("dropping modulator with destination {dest}");
            }
            Ok(destination.map(|d| Modulator::new(source, amount_source, d, amount, transform)))
        })
        .collect()
}

/// A zone before its target index is validated.
struct RawZone {
    params: ZoneParams,
    target: Option<usize>,
}

/// Build the zones of one header whose bags span `bag_start..bag_end`.
fn read_zones(
    owner: &str,
    bags: &[Bag],
    bag_start: usize,
    bag_end: usize,
    generators: &[RawGenerator],
    modulators: &[Option<Modulator>],
    target: GeneratorType,
) -> Result<Vec<RawZone>> {
    if bag_start > bag_end || bag_end >= bags.len() {
        return Err(Error::format(
            owner,
            format!("bag range {bag_start}..{bag_end} outside a table of {}", bags.len()),
        ));
    }
    let mut zones = Vec::with_capacity(bag_end - bag_start);
    for window in bags[bag_start..=bag_end].windows(2) {
        let (bag, next) = (window[0], window[1]);
        if bag.generator > next.generator
            || next.generator > generators.len()
            || bag.modulator > next.modulator
            || next.modulator > modulators.len()
        {
            return Err(Error::format(owner, "zone generator/modulator indices out of order"));
        }

        let mut zone = RawZone {
            params: ZoneParams::default(),
            target: None,
        };
        for raw in &generators[bag.generator..next.generator] {
            let Some(ty) = GeneratorType::from_id(raw.oper) else {
                trace!("{owner}: skipping unknown generator {}", raw.oper);
                continue;
            };
            let generator = Generator::new(ty, raw.amount);
            match ty {
                GeneratorType::KeyRange => {
                    let (lo, hi) = generator.range_bounds();
                    zone.params.key_range = Some(ZoneRange::new(lo, hi));
                }
                GeneratorType::VelRange => {
                    let (lo, hi) = generator.range_bounds();
                    zone.params.vel_range = Some(ZoneRange::new(lo, hi));
                }
                GeneratorType::EndOper => {}
                t if t == target => zone.target = Some(raw.amount as u16 as usize),
                GeneratorType::Instrument | GeneratorType::SampleId => {}
                _ => zone.params.generators.push(generator),
            }
        }
        zone.params.modulators = modulators[bag.modulator..next.modulator]
            .iter()
            .flatten()
            .copied()
            .collect();
        zones.push(zone);
    }
    Ok(zones)
}

/// Split raw zones into (global, targeted) and drop invalid ones.
fn split_global(owner: &str, zones: Vec<RawZone>, targets: usize) -> (ZoneParams, Vec<(ZoneParams, usize)>) {
    let mut global = ZoneParams::default();
    let mut out = Vec::with_capacity(zones.len());
    for (i, zone) in zones.into_iter().enumerate() {
        match zone.target {
            Some(t) if t < targets => out.push((zone.params, t)),
            Some(t) => warn!("{owner}: zone {i} references missing index {t}, discarded"),
            None if i == 0 => global = zone.params,
            None => warn!("{owner}: zone {i} has no target and is not first, discarded"),
        }
    }
    (global, out)
}

fn read_instruments(pdta: &Pdta<'_>, sample_count: usize) -> Result<Vec<Instrument>> {
    let headers = records(&pdta.inst, INST_SIZE)?
        .map(|rec| {
            let mut r = ByteReader::new(rec);
            Ok((r.string(20)?, r.u16()? as usize))
        })
        .collect::<Result<Vec<_>>>()?;
    if headers.is_empty() {
        return Err(Error::format("inst", "missing terminal record"));
    }

    headers
        .windows(2)
        .map(|pair| {
            let (name, bag_start) = &pair[0];
            let bag_end = pair[1].1;
            let zones = read_zones(
                name,
                &pdta.ibag,
                *bag_start,
                bag_end,
                &pdta.igen,
                &pdta.imod,
                GeneratorType::SampleId,
            )?;
            let (global, zones) = split_global(name, zones, sample_count);
            Ok(Instrument {
                name: name.clone(),
                global,
                zones: zones
                    .into_iter()
                    .map(|(params, sample)| InstrumentZone { params, sample })
                    .collect(),
            })
        })
        .collect()
}

fn read_presets(pdta: &Pdta<'_>, instrument_count: usize) -> Result<Vec<Preset>> {
    struct Header {
        name: String,
        program: u16,
        bank: u16,
        bag: usize,
        library: u32,
        genre: u32,
        morphology: u32,
    }

    let headers = records(&pdta.phdr, PHDR_SIZE)?
        .map(|rec| {
            let mut r = ByteReader::new(rec);
            Ok(Header {
                name: r.string(20)?,
                program: r.u16()?,
                bank: r.u16()?,
                bag: r.u16()? as usize,
                library: r.u32()?,
                genre: r.u32()?,
                morphology: r.u32()?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    if headers.is_empty() {
        return Err(Error::format("phdr", "missing terminal record"));
    }

    headers
        .windows(2)
        .map(|pair| {
            let h = &pair[0];
            let zones = read_zones(
                &h.name,
                &pdta.pbag,
                h.bag,
                pair[1].bag,
                &pdta.pgen,
                &pdta.pmod,
                GeneratorType::Instrument,
            )?;
            let (global, zones) = split_global(&h.name, zones, instrument_count);
            Ok(Preset {
                name: h.name.clone(),
                program: h.program,
                bank: h.bank,
                library: h.library,
                genre: h.genre,
                morphology: h.morphology,
                global,
                zones: zones
                    .into_iter()
                    .map(|(params, instrument)| PresetZone { params, instrument })
                    .collect(),
            })
        })
        .collect()
}

fn read_samples(shdr: &Chunk<'_>, data: &SampleData<'_>) -> Result<Vec<Sample>> {
    let mut recs: Vec<_> = records(shdr, SHDR_SIZE)?.collect();
    // terminal "EOS" record
    recs.pop();

    let frames = data.frames();
    recs.into_iter()
        .map(|rec| {
            let mut r = ByteReader::new(rec);
            let name = r.string(20)?;
            let start = r.u32()? as usize;
            let end = r.u32()? as usize;
            let loop_start = r.u32()? as usize;
            let loop_end = r.u32()? as usize;
            let sample_rate = r.u32()?;
            let original_key = r.u8()?;
            let pitch_correction = r.i8()?;
            let link = r.u16()?;
            let sample_type = r.u16()?;

            let end = end.min(frames);
            let start = start.min(end);
            if end - start == 0 {
                warn!("Sample '{name}' has no data");
            }

            // loop points are absolute; one before the sample start is invalid
            let before_start = loop_start < start || loop_end < start;
            let (rel_start, rel_end) = if before_start {
                (0, 0)
            } else {
                ((loop_start - start) as u32, (loop_end - start) as u32)
            };
            let mut sample = Sample {
                name,
                data: data.convert(start, end),
                sample_rate,
                // 255 marks "unpitched"; play those at middle C
                original_key: if original_key > 127 { 60 } else { original_key },
                pitch_correction,
                loop_start: rel_start,
                loop_end: rel_end,
                link,
                sample_type,
            };
            if sample.sanitize_loop() || before_start {
                warn!(
                    "Sample '{}' has an invalid loop ({}..{}), looping disabled",
                    sample.name, loop_start, loop_end
                );
            }
            Ok(sample)
        })
        .collect()
}
