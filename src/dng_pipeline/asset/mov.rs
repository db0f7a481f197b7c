//! QuickTime / ISO-BMFF atom walker.
//!
//! Only the atoms needed to locate video samples and describe the asset are
//! interpreted; everything else is skipped by size. All values are big-endian.

use std::collections::BTreeMap;
use std::io::{self, Read, Seek, SeekFrom};

use byteorder::{BigEndian, ReadBytesExt};
use tracing::{debug, trace};

use crate::dng_pipeline::asset::types::{FourCc, KEY_MAKE, KEY_MODEL, KEY_SOFTWARE};

const MOOV: FourCc = FourCc::new(b"moov");
const TRAK: FourCc = FourCc::new(b"trak");
const TKHD: FourCc = FourCc::new(b"tkhd");
const MDIA: FourCc = FourCc::new(b"mdia");
const MDHD: FourCc = FourCc::new(b"mdhd");
const HDLR: FourCc = FourCc::new(b"hdlr");
const MINF: FourCc = FourCc::new(b"minf");
const STBL: FourCc = FourCc::new(b"stbl");
const STSD: FourCc = FourCc::new(b"stsd");
const STTS: FourCc = FourCc::new(b"stts");
const STSC: FourCc = FourCc::new(b"stsc");
const STSZ: FourCc = FourCc::new(b"stsz");
const STCO: FourCc = FourCc::new(b"stco");
const CO64: FourCc = FourCc::new(b"co64");
const META: FourCc = FourCc::new(b"meta");
const KEYS: FourCc = FourCc::new(b"keys");
const ILST: FourCc = FourCc::new(b"ilst");
const DATA: FourCc = FourCc::new(b"data");
const UDTA: FourCc = FourCc::new(b"udta");

pub(crate) const HANDLER_VIDEO: FourCc = FourCc::new(b"vide");
pub(crate) const HANDLER_TIMECODE: FourCc = FourCc::new(b"tmcd");

/// Legacy `udta` text atoms and the metadata key each one maps to.
const UDTA_TEXT_KEYS: [([u8; 4], &str); 3] = [
    ([0xA9, b'm', b'a', b'k'], KEY_MAKE),
    ([0xA9, b'm', b'o', b'd'], KEY_MODEL),
    ([0xA9, b's', b'w', b'r'], KEY_SOFTWARE),
];

/// Well-known-type indicator for UTF-8 text in `data` atoms.
const DATA_TYPE_UTF8: u32 = 1;

/// Upper bound on a constant-size `stsz` table, which carries no per-sample
/// entries to check against its body length. About 190 hours at 24 fps.
const MAX_UNIFORM_SAMPLES: u32 = 1 << 24;

/// tmcd sample entry flag: drop-frame counting.
const TMCD_FLAG_DROP_FRAME: u32 = 0x0001;

fn invalid(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct AtomHeader {
    pub kind: FourCc,
    pub start: u64,
    pub header_len: u64,
    pub size: u64,
}

impl AtomHeader {
    pub fn body_start(&self) -> u64 {
        self.start + self.header_len
    }

    pub fn end(&self) -> u64 {
        self.start + self.size
    }
}

/// Reads the header of the atom at the current position, or `None` when
/// fewer than eight bytes remain before `limit`.
pub(crate) fn read_atom_header<R: Read + Seek>(reader: &mut R, limit: u64) -> io::Result<Option<AtomHeader>> {
    let start = reader.stream_position()?;
    if start.checked_add(8).is_none_or(|end| end > limit) {
        return Ok(None);
    }
    let size32 = reader.read_u32::<BigEndian>()?;
    let mut kind = [0u8; 4];
    reader.read_exact(&mut kind)?;

    let (size, header_len) = match size32 {
        0 => (limit - start, 8),
        1 => (reader.read_u64::<BigEndian>()?, 16),
        n => (u64::from(n), 8),
    };

    if size < header_len || start.checked_add(size).is_none_or(|end| end > limit) {
        return Err(invalid(format!(
            "atom '{}' at {} has invalid size {}",
            FourCc(kind),
            start,
            size
        )));
    }

    Ok(Some(AtomHeader {
        kind: FourCc(kind),
        start,
        header_len,
        size,
    }))
}

/// Lists the atoms stored back to back in `[start, end)`.
pub(crate) fn child_atoms<R: Read + Seek>(reader: &mut R, start: u64, end: u64) -> io::Result<Vec<AtomHeader>> {
    let mut atoms = Vec::new();
    reader.seek(SeekFrom::Start(start))?;
    while let Some(header) = read_atom_header(reader, end)? {
        trace!(kind = %header.kind, start = header.start, size = header.size, "atom");
        reader.seek(SeekFrom::Start(header.end()))?;
        atoms.push(header);
    }
    Ok(atoms)
}

fn read_body<R: Read + Seek>(reader: &mut R, header: &AtomHeader) -> io::Result<Vec<u8>> {
    reader.seek(SeekFrom::Start(header.body_start()))?;
    let len = usize::try_from(header.size - header.header_len)
        .map_err(|_| invalid(format!("atom '{}' too large", header.kind)))?;
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body)?;
    Ok(body)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct VideoSampleEntry {
    pub codec: FourCc,
    pub width: u16,
    pub height: u16,
    pub depth: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TimecodeSampleEntry {
    pub flags: u32,
    pub timescale: u32,
    pub frame_duration: u32,
    pub frames_per_second: u8,
}

impl TimecodeSampleEntry {
    pub fn drop_frame(&self) -> bool {
        self.flags & TMCD_FLAG_DROP_FRAME != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SampleLocation {
    pub offset: u64,
    pub size: u32,
    pub decode_time: u64,
    pub duration: u32,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Track {
    pub handler: Option<FourCc>,
    pub timescale: u32,
    pub matrix: [i32; 9],
    pub video_entry: Option<VideoSampleEntry>,
    pub timecode_entry: Option<TimecodeSampleEntry>,
    /// First sample of a timecode track: the starting frame counter.
    pub timecode_start: Option<u32>,
    pub samples: Vec<SampleLocation>,
}

impl Track {
    pub fn is_video(&self) -> bool {
        self.handler == Some(HANDLER_VIDEO) && self.video_entry.is_some()
    }

    pub fn is_timecode(&self) -> bool {
        self.handler == Some(HANDLER_TIMECODE) && self.timecode_entry.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Movie {
    pub tracks: Vec<Track>,
    pub metadata: BTreeMap<String, String>,
}

impl Movie {
    /// The first ProRes RAW video track, or else the first video track.
    pub fn video_track(&self) -> Option<&Track> {
        self.tracks
            .iter()
            .filter(|t| t.is_video())
            .find(|t| t.video_entry.is_some_and(|e| e.codec.is_prores_raw()))
            .or_else(|| self.tracks.iter().find(|t| t.is_video()))
    }

    pub fn timecode_track(&self) -> Option<&Track> {
        self.tracks.iter().find(|t| t.is_timecode())
    }
}

pub(crate) fn parse_movie<R: Read + Seek>(reader: &mut R) -> io::Result<Movie> {
    let len = reader.seek(SeekFrom::End(0))?;
    let top = child_atoms(reader, 0, len)?;
    let moov = top
        .iter()
        .find(|a| a.kind == MOOV)
        .ok_or_else(|| invalid("no 'moov' atom found"))?;

    let mut movie = Movie::default();
    let mut legacy_metadata = BTreeMap::new();

    for atom in child_atoms(reader, moov.body_start(), moov.end())? {
        match atom.kind {
            TRAK => movie.tracks.push(parse_track(reader, &atom)?),
            META => movie.metadata.extend(parse_meta(reader, &atom)?),
            UDTA => parse_udta(reader, &atom, &mut legacy_metadata)?,
            _ => {}
        }
    }

    for (key, value) in legacy_metadata {
        movie.metadata.entry(key).or_insert(value);
    }

    for track in movie.tracks.iter_mut().filter(|t| t.is_timecode()) {
        if let Some(first) = track.samples.first()
            && first.size >= 4
        {
            reader.seek(SeekFrom::Start(first.offset))?;
            track.timecode_start = Some(reader.read_u32::<BigEndian>()?);
        }
    }

    debug!(
        tracks = movie.tracks.len(),
        metadata = movie.metadata.len(),
        "Parsed movie header"
    );
    Ok(movie)
}

#[derive(Default)]
struct SampleTables {
    sizes: Vec<u32>,
    chunk_offsets: Vec<u64>,
    /// (first_chunk, samples_per_chunk), first_chunk is 1-based.
    sample_to_chunk: Vec<(u32, u32)>,
    /// (sample_count, sample_delta)
    time_to_sample: Vec<(u32, u32)>,
}

fn parse_track<R: Read + Seek>(reader: &mut R, trak: &AtomHeader) -> io::Result<Track> {
    let mut track = Track::default();
    let mut stbl = None;

    for atom in child_atoms(reader, trak.body_start(), trak.end())? {
        match atom.kind {
            TKHD => track.matrix = parse_tkhd_matrix(&read_body(reader, &atom)?)?,
            MDIA => {
                for media in child_atoms(reader, atom.body_start(), atom.end())? {
                    match media.kind {
                        MDHD => track.timescale = parse_mdhd_timescale(&read_body(reader, &media)?)?,
                        HDLR => track.handler = Some(parse_hdlr(&read_body(reader, &media)?)?),
                        MINF => {
                            stbl = child_atoms(reader, media.body_start(), media.end())?
                                .into_iter()
                                .find(|a| a.kind == STBL);
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    let Some(stbl) = stbl else {
        return Ok(track);
    };

    let mut tables = SampleTables::default();
    for atom in child_atoms(reader, stbl.body_start(), stbl.end())? {
        match atom.kind {
            STSD => parse_stsd(&read_body(reader, &atom)?, &mut track)?,
            STTS => tables.time_to_sample = parse_pairs(&read_body(reader, &atom)?)?,
            STSC => tables.sample_to_chunk = parse_stsc(&read_body(reader, &atom)?)?,
            STSZ => tables.sizes = parse_stsz(&read_body(reader, &atom)?)?,
            STCO => tables.chunk_offsets = parse_chunk_offsets(&read_body(reader, &atom)?, false)?,
            CO64 => tables.chunk_offsets = parse_chunk_offsets(&read_body(reader, &atom)?, true)?,
            _ => {}
        }
    }

    track.samples = locate_samples(&tables)?;
    Ok(track)
}

fn parse_tkhd_matrix(body: &[u8]) -> io::Result<[i32; 9]> {
    let mut cursor = io::Cursor::new(body);
    let version = cursor.read_u8()?;
    cursor.set_position(4);
    // creation, modification, track id, reserved, duration
    let skip: u64 = if version == 1 { 8 + 8 + 4 + 4 + 8 } else { 4 + 4 + 4 + 4 + 4 };
    // reserved(8) layer(2) alternate group(2) volume(2) reserved(2)
    cursor.set_position(4 + skip + 16);
    let mut matrix = [0i32; 9];
    for value in &mut matrix {
        *value = cursor.read_i32::<BigEndian>()?;
    }
    Ok(matrix)
}

fn parse_mdhd_timescale(body: &[u8]) -> io::Result<u32> {
    let mut cursor = io::Cursor::new(body);
    let version = cursor.read_u8()?;
    cursor.set_position(if version == 1 { 4 + 16 } else { 4 + 8 });
    cursor.read_u32::<BigEndian>()
}

fn parse_hdlr(body: &[u8]) -> io::Result<FourCc> {
    let mut cursor = io::Cursor::new(body);
    cursor.set_position(8);
    Ok(FourCc::from_u32(cursor.read_u32::<BigEndian>()?))
}

fn parse_stsd(body: &[u8], track: &mut Track) -> io::Result<()> {
    let mut cursor = io::Cursor::new(body);
    cursor.set_position(4);
    let entry_count = cursor.read_u32::<BigEndian>()?;
    if entry_count == 0 {
        return Ok(());
    }
    let _entry_size = cursor.read_u32::<BigEndian>()?;
    let codec = FourCc::from_u32(cursor.read_u32::<BigEndian>()?);
    // reserved(6) data reference index(2)
    cursor.set_position(cursor.position() + 8);

    match track.handler {
        Some(HANDLER_VIDEO) => {
            // version(2) revision(2) vendor(4) temporal quality(4) spatial quality(4)
            cursor.set_position(cursor.position() + 16);
            let width = cursor.read_u16::<BigEndian>()?;
            let height = cursor.read_u16::<BigEndian>()?;
            // hres(4) vres(4) data size(4) frame count(2) compressor name(32)
            cursor.set_position(cursor.position() + 46);
            let depth = cursor.read_u16::<BigEndian>()?;
            track.video_entry = Some(VideoSampleEntry {
                codec,
                width,
                height,
                depth,
            });
        }
        Some(HANDLER_TIMECODE) => {
            let _reserved = cursor.read_u32::<BigEndian>()?;
            let flags = cursor.read_u32::<BigEndian>()?;
            let timescale = cursor.read_u32::<BigEndian>()?;
            let frame_duration = cursor.read_u32::<BigEndian>()?;
            let frames_per_second = cursor.read_u8()?;
            track.timecode_entry = Some(TimecodeSampleEntry {
                flags,
                timescale,
                frame_duration,
                frames_per_second,
            });
        }
        _ => {}
    }
    Ok(())
}

/// Rejects a table count whose entries cannot fit in the rest of `body`.
fn check_count(body: &[u8], count: u32, entry_len: usize) -> io::Result<()> {
    let available = body.len().saturating_sub(8) / entry_len;
    if count as usize > available {
        return Err(invalid(format!(
            "table declares {} entries but only {} fit in {} bytes",
            count,
            available,
            body.len()
        )));
    }
    Ok(())
}

fn parse_pairs(body: &[u8]) -> io::Result<Vec<(u32, u32)>> {
    let mut cursor = io::Cursor::new(body);
    cursor.set_position(4);
    let count = cursor.read_u32::<BigEndian>()?;
    check_count(body, count, 8)?;
    (0..count)
        .map(|_| Ok((cursor.read_u32::<BigEndian>()?, cursor.read_u32::<BigEndian>()?)))
        .collect()
}

fn parse_stsc(body: &[u8]) -> io::Result<Vec<(u32, u32)>> {
    let mut cursor = io::Cursor::new(body);
    cursor.set_position(4);
    let count = cursor.read_u32::<BigEndian>()?;
    check_count(body, count, 12)?;
    (0..count)
        .map(|_| {
            let first_chunk = cursor.read_u32::<BigEndian>()?;
            let samples_per_chunk = cursor.read_u32::<BigEndian>()?;
            let _description_index = cursor.read_u32::<BigEndian>()?;
            Ok((first_chunk, samples_per_chunk))
        })
        .collect()
}

fn parse_stsz(body: &[u8]) -> io::Result<Vec<u32>> {
    let mut cursor = io::Cursor::new(body);
    cursor.set_position(4);
    let uniform_size = cursor.read_u32::<BigEndian>()?;
    let count = cursor.read_u32::<BigEndian>()?;
    if uniform_size != 0 {
        if count > MAX_UNIFORM_SAMPLES {
            return Err(invalid(format!("stsz declares {} samples", count)));
        }
        return Ok(vec![uniform_size; count as usize]);
    }
    check_count(&body[4..], count, 4)?;
    (0..count).map(|_| cursor.read_u32::<BigEndian>()).collect()
}

fn parse_chunk_offsets(body: &[u8], wide: bool) -> io::Result<Vec<u64>> {
    let mut cursor = io::Cursor::new(body);
    cursor.set_position(4);
    let count = cursor.read_u32::<BigEndian>()?;
    check_count(body, count, if wide { 8 } else { 4 })?;
    (0..count)
        .map(|_| {
            if wide {
                cursor.read_u64::<BigEndian>()
            } else {
                cursor.read_u32::<BigEndian>().map(u64::from)
            }
        })
        .collect()
}

/// Resolves the chunk / size / timing tables into one entry per sample.
fn locate_samples(tables: &SampleTables) -> io::Result<Vec<SampleLocation>> {
    let total = tables.sizes.len();
    let mut samples = Vec::with_capacity(total);
    let mut stsc_index = 0;

    for (chunk_index, &chunk_offset) in tables.chunk_offsets.iter().enumerate() {
        let chunk_number = chunk_index as u32 + 1;
        while stsc_index + 1 < tables.sample_to_chunk.len()
            && tables.sample_to_chunk[stsc_index + 1].0 <= chunk_number
        {
            stsc_index += 1;
        }
        let per_chunk = tables
            .sample_to_chunk
            .get(stsc_index)
            .filter(|(first, _)| *first <= chunk_number)
            .map_or(0, |(_, n)| *n);

        let mut offset = chunk_offset;
        for _ in 0..per_chunk {
            let Some(&size) = tables.sizes.get(samples.len()) else {
                break;
            };
            samples.push(SampleLocation {
                offset,
                size,
                decode_time: 0,
                duration: 0,
            });
            offset = offset
                .checked_add(u64::from(size))
                .ok_or_else(|| invalid(format!("chunk {} runs past the end of the address space", chunk_number)))?;
        }
    }

    if samples.len() != total {
        return Err(invalid(format!(
            "sample table lists {} samples but chunks locate {}",
            total,
            samples.len()
        )));
    }

    let mut deltas = tables
        .time_to_sample
        .iter()
        .flat_map(|&(count, delta)| std::iter::repeat_n(delta, count as usize));
    let mut time = 0u64;
    for sample in &mut samples {
        let delta = deltas.next().unwrap_or(0);
        sample.decode_time = time;
        sample.duration = delta;
        time += u64::from(delta);
    }

    Ok(samples)
}

/// `meta` is a full atom in ISO files and a plain container in QuickTime.
fn meta_children_start<R: Read + Seek>(reader: &mut R, meta: &AtomHeader) -> io::Result<u64> {
    if meta.size - meta.header_len < 4 {
        return Ok(meta.body_start());
    }
    reader.seek(SeekFrom::Start(meta.body_start()))?;
    let first = reader.read_u32::<BigEndian>()?;
    Ok(if first == 0 { meta.body_start() + 4 } else { meta.body_start() })
}

fn parse_meta<R: Read + Seek>(reader: &mut R, meta: &AtomHeader) -> io::Result<BTreeMap<String, String>> {
    let start = meta_children_start(reader, meta)?;
    let mut keys: Vec<String> = Vec::new();
    let mut items: Vec<(u32, String)> = Vec::new();

    for atom in child_atoms(reader, start, meta.end())? {
        match atom.kind {
            KEYS => keys = parse_keys(&read_body(reader, &atom)?)?,
            ILST => {
                for item in child_atoms(reader, atom.body_start(), atom.end())? {
                    let key_index = u32::from_be_bytes(item.kind.0);
                    for data in child_atoms(reader, item.body_start(), item.end())? {
                        if data.kind != DATA {
                            continue;
                        }
                        if let Some(value) = parse_data_text(&read_body(reader, &data)?)? {
                            items.push((key_index, value));
                        }
                    }
                }
            }
            _ => {}
        }
    }

    Ok(items
        .into_iter()
        .filter_map(|(index, value)| {
            let key = keys.get((index as usize).checked_sub(1)?)?;
            Some((key.clone(), value))
        })
        .collect())
}

fn parse_keys(body: &[u8]) -> io::Result<Vec<String>> {
    let mut cursor = io::Cursor::new(body);
    cursor.set_position(4);
    let count = cursor.read_u32::<BigEndian>()?;
    let mut keys = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let size = cursor.read_u32::<BigEndian>()?;
        let _namespace = cursor.read_u32::<BigEndian>()?;
        let len = size
            .checked_sub(8)
            .ok_or_else(|| invalid(format!("metadata key with size {}", size)))?;
        let mut name = vec![0u8; len as usize];
        cursor.read_exact(&mut name)?;
        keys.push(String::from_utf8_lossy(&name).into_owned());
    }
    Ok(keys)
}

fn parse_data_text(body: &[u8]) -> io::Result<Option<String>> {
    let mut cursor = io::Cursor::new(body);
    let type_indicator = cursor.read_u32::<BigEndian>()? & 0x00FF_FFFF;
    let _locale = cursor.read_u32::<BigEndian>()?;
    if type_indicator != DATA_TYPE_UTF8 {
        return Ok(None);
    }
    let text = &body[8..];
    Ok(Some(String::from_utf8_lossy(text).trim_end_matches('\0').to_string()))
}

fn parse_udta<R: Read + Seek>(
    reader: &mut R,
    udta: &AtomHeader,
    metadata: &mut BTreeMap<String, String>,
) -> io::Result<()> {
    for atom in child_atoms(reader, udta.body_start(), udta.end())? {
        if atom.kind == META {
            for (key, value) in parse_meta(reader, &atom)? {
                metadata.entry(key).or_insert(value);
            }
            continue;
        }
        let Some((_, key)) = UDTA_TEXT_KEYS.iter().find(|(code, _)| *code == atom.kind.0) else {
            continue;
        };
        let body = read_body(reader, &atom)?;
        if body.len() < 4 {
            continue;
        }
        let text_len = usize::from(u16::from_be_bytes([body[0], body[1]]));
        let text = &body[4..(4 + text_len).min(body.len())];
        metadata
            .entry(key.to_string())
            .or_insert_with(|| String::from_utf8_lossy(text).trim_end_matches('\0').to_string());
    }
    Ok(())
}
