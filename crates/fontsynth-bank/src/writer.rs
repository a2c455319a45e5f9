//! SF2 serialization of a [`SoundBank`].

use crate::bank::SoundBank;
use crate::generator::{Generator, GeneratorType};
use crate::modulator::Modulator;
use crate::riff::{encode_string, write_chunk, write_list};
use crate::zone::ZoneParams;
use tracing::debug;

/// Silent frames written after each sample, as SF2 requires.
const SAMPLE_PADDING: usize = 46;

/// Flattened zone tables for one level (preset or instrument).
#[derive(Default)]
struct ZoneTables {
    bags: Vec<u8>,
    generators: Vec<u8>,
    modulators: Vec<u8>,
    gen_count: usize,
    mod_count: usize,
    bag_count: usize,
}

impl ZoneTables {
    /// Append one zone; `target` is the `instrument`/`sampleID` generator.
    fn push_zone(&mut self, params: &ZoneParams, target: Option<Generator>) {
        self.bags.extend_from_slice(&(self.gen_count as u16).to_le_bytes());
        self.bags.extend_from_slice(&(self.mod_count as u16).to_le_bytes());
        self.bag_count += 1;

        if let Some(range) = params.key_range {
            self.push_generator(Generator::range(GeneratorType::KeyRange, range.lo, range.hi));
        }
        if let Some(range) = params.vel_range {
            self.push_generator(Generator::range(GeneratorType::VelRange, range.lo, range.hi));
        }
        for g in &params.generators {
            self.push_generator(*g);
        }
        if let Some(target) = target {
            self.push_generator(target);
        }
        for m in &params.modulators {
            write_modulator(&mut self.modulators, m);
            self.mod_count += 1;
        }
    }

    fn push_generator(&mut self, g: Generator) {
        self.generators.extend_from_slice(&g.ty.id().to_le_bytes());
        self.generators.extend_from_slice(&g.amount.to_le_bytes());
        self.gen_count += 1;
    }

    /// Terminal bag, generator and modulator records.
    fn finish(&mut self) {
        self.bags.extend_from_slice(&(self.gen_count as u16).to_le_bytes());
        self.bags.extend_from_slice(&(self.mod_count as u16).to_le_bytes());
        self.generators.extend_from_slice(&[0; 4]);
        self.modulators.extend_from_slice(&[0; 10]);
    }
}

fn write_modulator(out: &mut Vec<u8>, m: &Modulator) {
    out.extend_from_slice(&m.source.to_raw().to_le_bytes());
    out.extend_from_slice(&m.destination.id().to_le_bytes());
    out.extend_from_slice(&m.amount.to_le_bytes());
    out.extend_from_slice(&m.amount_source.to_raw().to_le_bytes());
    out.extend_from_slice(&m.transform.to_le_bytes());
}

impl SoundBank {
    /// Serialize to an SF2 image readable by [`SoundBank::from_bytes`].
    ///
    /// Samples are written as 16-bit PCM; 24-bit precision is not kept.
    pub fn write_sf2(&self) -> Vec<u8> {
        let mut body = Vec::new();
        write_list(&mut body, b"LIST", b"INFO", &self.info_chunk());

        let (smpl, offsets) = self.sample_data();
        let mut sdta = Vec::with_capacity(smpl.len() + 8);
        write_chunk(&mut sdta, b"smpl", &smpl);
        write_list(&mut body, b"LIST", b"sdta", &sdta);

        write_list(&mut body, b"LIST", b"pdta", &self.pdta_chunk(&offsets));

        let mut out = Vec::with_capacity(body.len() + 12);
        write_list(&mut out, b"RIFF", b"sfbk", &body);
        debug!(
            "Wrote bank '{}' ({} bytes, {} presets)",
            self.info.name,
            out.len(),
            self.presets.len()
        );
        out
    }

    fn info_chunk(&self) -> Vec<u8> {
        let mut info = Vec::new();
        let (major, minor) = self.info.version;
        let mut version = major.to_le_bytes().to_vec();
        version.extend_from_slice(&minor.to_le_bytes());
        write_chunk(&mut info, b"ifil", &version);

        if self.info.field("isng").is_none() {
            write_chunk(&mut info, b"isng", b"EMU8000\0");
        }
        let mut name = self.info.name.clone().into_bytes();
        name.push(0);
        write_chunk(&mut info, b"INAM", &name);

        for (tag, value) in &self.info.fields {
            let Ok(id) = <[u8; 4]>::try_from(tag.as_bytes()) else {
                continue;
            };
            let mut text = value.clone().into_bytes();
            text.push(0);
            write_chunk(&mut info, &id, &text);
        }

        if self.custom_defaults {
            let mut dmod = Vec::with_capacity((self.default_modulators.len() + 1) * 10);
            for m in &self.default_modulators {
                write_modulator(&mut dmod, m);
            }
            dmod.extend_from_slice(&[0; 10]);
            write_chunk(&mut info, b"DMOD", &dmod);
        }
        info
    }

    /// PCM payload and the start frame of each sample.
    fn sample_data(&self) -> (Vec<u8>, Vec<u32>) {
        let frames: usize = self
            .samples
            .iter()
            .map(|s| s.len() + SAMPLE_PADDING)
            .sum();
        let mut pcm = Vec::with_capacity(frames * 2);
        let mut offsets = Vec::with_capacity(self.samples.len());
        let mut cursor = 0u32;
        for sample in &self.samples {
            offsets.push(cursor);
            for &v in sample.data.iter() {
                let v = (v * 32768.0).round().clamp(-32768.0, 32767.0) as i16;
                pcm.extend_from_slice(&v.to_le_bytes());
            }
            pcm.resize(pcm.len() + SAMPLE_PADDING * 2, 0);
            cursor += (sample.len() + SAMPLE_PADDING) as u32;
        }
        (pcm, offsets)
    }

    fn pdta_chunk(&self, offsets: &[u32]) -> Vec<u8> {
        let mut phdr = Vec::new();
        let mut preset_zones = ZoneTables::default();
        for preset in &self.presets {
            encode_string(&mut phdr, &preset.name, 20);
            phdr.extend_from_slice(&preset.program.to_le_bytes());
            phdr.extend_from_slice(&preset.bank.to_le_bytes());
            phdr.extend_from_slice(&(preset_zones.bag_count as u16).to_le_bytes());
            phdr.extend_from_slice(&preset.library.to_le_bytes());
            phdr.extend_from_slice(&preset.genre.to_le_bytes());
            phdr.extend_from_slice(&preset.morphology.to_le_bytes());

            if !preset.global.is_empty() {
                preset_zones.push_zone(&preset.global, None);
            }
            for zone in &preset.zones {
                let target = Generator::new(GeneratorType::Instrument, zone.instrument as i16);
                preset_zones.push_zone(&zone.params, Some(target));
            }
        }
        encode_string(&mut phdr, "EOP", 20);
        phdr.extend_from_slice(&[0; 4]);
        phdr.extend_from_slice(&(preset_zones.bag_count as u16).to_le_bytes());
        phdr.extend_from_slice(&[0; 12]);
        preset_zones.finish();

        let mut inst = Vec::new();
        let mut inst_zones = ZoneTables::default();
        for instrument in &self.instruments {
            encode_string(&mut inst, &instrument.name, 20);
            inst.extend_from_slice(&(inst_zones.bag_count as u16).to_le_bytes());
            if !instrument.global.is_empty() {
                inst_zones.push_zone(&instrument.global, None);
            }
            for zone in &instrument.zones {
                let target = Generator::new(GeneratorType::SampleId, zone.sample as i16);
                inst_zones.push_zone(&zone.params, Some(target));
            }
        }
        encode_string(&mut inst, "EOI", 20);
        inst.extend_from_slice(&(inst_zones.bag_count as u16).to_le_bytes());
        inst_zones.finish();

        let mut shdr = Vec::new();
        for (sample, &start) in self.samples.iter().zip(offsets) {
            encode_string(&mut shdr, &sample.name, 20);
            let end = start + sample.len() as u32;
            for v in [
                start,
                end,
                start + sample.loop_start,
                start + sample.loop_end,
                sample.sample_rate,
            ] {
                shdr.extend_from_slice(&v.to_le_bytes());
            }
            shdr.push(sample.original_key);
            shdr.push(sample.pitch_correction as u8);
            shdr.extend_from_slice(&sample.link.to_le_bytes());
            shdr.extend_from_slice(&sample.sample_type.to_le_bytes());
        }
        encode_string(&mut shdr, "EOS", 20);
        shdr.extend_from_slice(&[0; 26]);

        let mut pdta = Vec::new();
        write_chunk(&mut pdta, b"phdr", &phdr);
        write_chunk(&mut pdta, b"pbag", &preset_zones.bags);
        write_chunk(&mut pdta, b"pmod", &preset_zones.modulators);
        write_chunk(&mut pdta, b"pgen", &preset_zones.generators);
        write_chunk(&mut pdta, b"inst", &inst);
        write_chunk(&mut pdta, b"ibag", &inst_zones.bags);
        write_chunk(&mut pdta, b"imod", &inst_zones.modulators);
        write_chunk(&mut pdta, b"igen", &inst_zones.generators);
        write_chunk(&mut pdta, b"shdr", &shdr);
        pdta
    }
}
