//! Hand-built QuickTime files for tests.

use std::path::{Path, PathBuf};

use crate::dng_pipeline::common::bitpack::pack_msb;

const IDENTITY_MATRIX: [i32; 9] = [0x0001_0000, 0, 0, 0, 0x0001_0000, 0, 0, 0, 0x4000_0000];

pub(crate) fn atom(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 8);
    out.extend_from_slice(&(body.len() as u32 + 8).to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(body);
    out
}

fn container(kind: &[u8; 4], children: &[Vec<u8>]) -> Vec<u8> {
    atom(kind, &children.concat())
}

fn be32(values: &[u32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_be_bytes()).collect()
}

/// A frame of MSB-packed samples with a deterministic ramp.
pub(crate) fn packed_frame(width: u32, height: u32, bits: u16, seed: u16) -> Vec<u8> {
    let max = (1u32 << bits) - 1;
    let samples: Vec<u16> = (0..width * height)
        .map(|i| ((i + u32::from(seed) * 7) % (max + 1)) as u16)
        .collect();
    pack_msb(&samples, bits, width as usize)
}

#[derive(Debug, Clone)]
pub(crate) struct MovFixture {
    pub width: u16,
    pub height: u16,
    pub depth: u16,
    pub codec: [u8; 4],
    pub timescale: u32,
    pub frame_duration: u32,
    pub samples: Vec<Vec<u8>>,
    pub samples_per_chunk: u32,
    pub matrix: [i32; 9],
    pub timecode: Option<(u32, u8, bool)>,
    pub metadata: Vec<(String, String)>,
    pub legacy_text: Vec<([u8; 3], String)>,
}

impl MovFixture {
    pub fn new(width: u16, height: u16, depth: u16) -> Self {
        Self {
            width,
            height,
            depth,
            codec: *b"aprn",
            timescale: 24_000,
            frame_duration: 1_000,
            samples: Vec::new(),
            samples_per_chunk: 1,
            matrix: IDENTITY_MATRIX,
            timecode: None,
            metadata: Vec::new(),
            legacy_text: Vec::new(),
        }
    }

    /// Fixture holding `count` valid packed frames.
    pub fn with_packed_frames(width: u16, height: u16, bits: u16, count: u16) -> Self {
        let samples = (0..count)
            .map(|i| packed_frame(u32::from(width), u32::from(height), bits, i))
            .collect();
        Self::new(width, height, bits).with_samples(samples)
    }

    pub fn with_samples(mut self, samples: Vec<Vec<u8>>) -> Self {
        self.samples = samples;
        self
    }

    pub fn with_samples_per_chunk(mut self, n: u32) -> Self {
        self.samples_per_chunk = n.max(1);
        self
    }

    pub fn with_codec(mut self, codec: &[u8; 4]) -> Self {
        self.codec = *codec;
        self
    }

    pub fn with_matrix(mut self, matrix: [i32; 9]) -> Self {
        self.matrix = matrix;
        self
    }

    pub fn with_timecode(mut self, start_frame: u32, fps: u8, drop_frame: bool) -> Self {
        self.timecode = Some((start_frame, fps, drop_frame));
        self
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.push((key.to_string(), value.to_string()));
        self
    }

    pub fn with_legacy_text(mut self, code: &[u8; 3], value: &str) -> Self {
        self.legacy_text.push((*code, value.to_string()));
        self
    }

    pub fn write_to(&self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, self.build()).expect("write fixture");
        path
    }

    pub fn build(&self) -> Vec<u8> {
        let ftyp = atom(b"ftyp", b"qt  \0\0\x02\0qt  ");
        let data_start = ftyp.len() as u64 + 8;

        let mut mdat = Vec::new();
        let mut chunk_offsets = Vec::new();
        for chunk in self.samples.chunks(self.samples_per_chunk as usize) {
            chunk_offsets.push((data_start + mdat.len() as u64) as u32);
            for sample in chunk {
                mdat.extend_from_slice(sample);
            }
        }
        let timecode_offset = (data_start + mdat.len() as u64) as u32;
        if let Some((start, _, _)) = self.timecode {
            mdat.extend_from_slice(&start.to_be_bytes());
        }

        let mut moov_children = vec![self.video_trak(&chunk_offsets)];
        if let Some((_, fps, drop_frame)) = self.timecode {
            moov_children.push(self.timecode_trak(timecode_offset, fps, drop_frame));
        }
        if !self.metadata.is_empty() {
            moov_children.push(self.meta());
        }
        if !self.legacy_text.is_empty() {
            moov_children.push(self.udta());
        }

        let mut out = ftyp;
        out.extend(atom(b"mdat", &mdat));
        out.extend(container(b"moov", &moov_children));
        out
    }

    fn tkhd(&self) -> Vec<u8> {
        let mut body = be32(&[0x0000_000F, 0, 0, 1, 0, 0]);
        body.extend_from_slice(&[0u8; 16]);
        for value in self.matrix {
            body.extend_from_slice(&value.to_be_bytes());
        }
        body.extend(be32(&[u32::from(self.width) << 16, u32::from(self.height) << 16]));
        atom(b"tkhd", &body)
    }

    fn mdhd(&self) -> Vec<u8> {
        let duration = self.frame_duration * self.samples.len() as u32;
        let mut body = be32(&[0, 0, 0, self.timescale, duration]);
        body.extend_from_slice(&[0u8; 4]);
        atom(b"mdhd", &body)
    }

    fn hdlr(subtype: &[u8; 4]) -> Vec<u8> {
        let mut body = be32(&[0]);
        body.extend_from_slice(b"mhlr");
        body.extend_from_slice(subtype);
        body.extend(be32(&[0, 0, 0]));
        body.push(0);
        atom(b"hdlr", &body)
    }

    fn video_trak(&self, chunk_offsets: &[u32]) -> Vec<u8> {
        let mut entry = Vec::new();
        entry.extend_from_slice(&86u32.to_be_bytes());
        entry.extend_from_slice(&self.codec);
        entry.extend_from_slice(&[0u8; 6]);
        entry.extend_from_slice(&1u16.to_be_bytes());
        entry.extend_from_slice(&[0u8; 16]);
        entry.extend_from_slice(&self.width.to_be_bytes());
        entry.extend_from_slice(&self.height.to_be_bytes());
        entry.extend(be32(&[0x0048_0000, 0x0048_0000, 0]));
        entry.extend_from_slice(&1u16.to_be_bytes());
        entry.extend_from_slice(&[0u8; 32]);
        entry.extend_from_slice(&self.depth.to_be_bytes());
        entry.extend_from_slice(&(-1i16).to_be_bytes());

        let mut stsd = be32(&[0, 1]);
        stsd.extend(entry);

        let count = self.samples.len() as u32;
        let spc = self.samples_per_chunk;
        let mut stsc_entries = vec![(1u32, spc)];
        let remainder = count % spc;
        if remainder != 0 && count > spc {
            stsc_entries.push((chunk_offsets.len() as u32, remainder));
        } else if remainder != 0 {
            stsc_entries[0].1 = remainder;
        }
        let mut stsc = be32(&[0, stsc_entries.len() as u32]);
        for (first, n) in stsc_entries {
            stsc.extend(be32(&[first, n, 1]));
        }

        let mut stsz = be32(&[0, 0, count]);
        stsz.extend(self.samples.iter().flat_map(|s| (s.len() as u32).to_be_bytes()));

        let mut stco = be32(&[0, chunk_offsets.len() as u32]);
        stco.extend(be32(chunk_offsets));

        let stbl = container(
            b"stbl",
            &[
                atom(b"stsd", &stsd),
                atom(b"stts", &be32(&[0, 1, count, self.frame_duration])),
                atom(b"stsc", &stsc),
                atom(b"stsz", &stsz),
                atom(b"stco", &stco),
            ],
        );
        let mdia = container(
            b"mdia",
            &[self.mdhd(), Self::hdlr(b"vide"), container(b"minf", &[stbl])],
        );
        container(b"trak", &[self.tkhd(), mdia])
    }

    fn timecode_trak(&self, offset: u32, fps: u8, drop_frame: bool) -> Vec<u8> {
        let mut entry = Vec::new();
        entry.extend_from_slice(&34u32.to_be_bytes());
        entry.extend_from_slice(b"tmcd");
        entry.extend_from_slice(&[0u8; 6]);
        entry.extend_from_slice(&1u16.to_be_bytes());
        entry.extend(be32(&[0, u32::from(drop_frame), self.timescale, self.frame_duration]));
        entry.push(fps);
        entry.push(0);

        let mut stsd = be32(&[0, 1]);
        stsd.extend(entry);

        let stbl = container(
            b"stbl",
            &[
                atom(b"stsd", &stsd),
                atom(b"stts", &be32(&[0, 1, 1, self.frame_duration])),
                atom(b"stsc", &be32(&[0, 1, 1, 1, 1])),
                atom(b"stsz", &be32(&[0, 4, 1])),
                atom(b"stco", &be32(&[0, 1, offset])),
            ],
        );
        let mdia = container(
            b"mdia",
            &[self.mdhd(), Self::hdlr(b"tmcd"), container(b"minf", &[stbl])],
        );
        container(b"trak", &[self.tkhd(), mdia])
    }

    fn meta(&self) -> Vec<u8> {
        let mut keys = be32(&[0, self.metadata.len() as u32]);
        let mut items = Vec::new();
        for (index, (key, value)) in self.metadata.iter().enumerate() {
            keys.extend_from_slice(&(key.len() as u32 + 8).to_be_bytes());
            keys.extend_from_slice(b"mdta");
            keys.extend_from_slice(key.as_bytes());

            let mut data = be32(&[1, 0]);
            data.extend_from_slice(value.as_bytes());
            let item_kind = (index as u32 + 1).to_be_bytes();
            items.push(atom(&item_kind, &atom(b"data", &data)));
        }
        container(
            b"meta",
            &[Self::hdlr(b"mdta"), atom(b"keys", &keys), container(b"ilst", &items)],
        )
    }

    fn udta(&self) -> Vec<u8> {
        let children: Vec<Vec<u8>> = self
            .legacy_text
            .iter()
            .map(|(code, value)| {
                let kind = [0xA9, code[0], code[1], code[2]];
                let mut body = Vec::new();
                body.extend_from_slice(&(value.len() as u16).to_be_bytes());
                body.extend_from_slice(&0u16.to_be_bytes());
                body.extend_from_slice(value.as_bytes());
                atom(&kind, &body)
            })
            .collect();
        container(b"udta", &children)
    }
}
