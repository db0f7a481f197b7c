//! Minimal TIFF/DNG reader for IFD0.
//!
//! Covers what this crate writes: classic TIFF in either byte order, one
//! directory, uncompressed strips.

use std::collections::BTreeMap;
use std::path::Path;

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::dng_pipeline::common::bitpack::unpack_msb;
use crate::dng_pipeline::common::error::{ConversionError, Result};
use crate::dng_pipeline::dng::tags::{self, TagValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TiffByteOrder {
    LittleEndian,
    BigEndian,
}

/// A parsed DNG: its IFD0 fields plus the file bytes they point into.
#[derive(Debug, Clone)]
pub struct DngFile {
    byte_order: TiffByteOrder,
    tags: BTreeMap<u16, TagValue>,
    data: Vec<u8>,
}

fn invalid(msg: impl Into<String>) -> ConversionError {
    ConversionError::InvalidDng(msg.into())
}

impl DngFile {
    pub fn read(path: &Path) -> Result<Self> {
        Self::parse(std::fs::read(path)?)
    }

    pub fn parse(data: Vec<u8>) -> Result<Self> {
        if data.len() < 8 {
            return Err(invalid("file is shorter than a TIFF header"));
        }
        let (byte_order, tags) = match &data[..2] {
            b"II" => (TiffByteOrder::LittleEndian, parse_ifd0::<LittleEndian>(&data)?),
            b"MM" => (TiffByteOrder::BigEndian, parse_ifd0::<BigEndian>(&data)?),
            _ => return Err(invalid("missing TIFF byte-order mark")),
        };
        Ok(Self { byte_order, tags, data })
    }

    pub fn byte_order(&self) -> TiffByteOrder {
        self.byte_order
    }

    pub fn tag(&self, tag: u16) -> Option<&TagValue> {
        self.tags.get(&tag)
    }

    /// First value of an integer tag.
    pub fn u32(&self, tag: u16) -> Option<u32> {
        self.tag(tag).and_then(TagValue::as_u32)
    }

    /// Tags in ascending numeric order.
    pub fn tags(&self) -> impl Iterator<Item = (u16, &TagValue)> {
        self.tags.iter().map(|(t, v)| (*t, v))
    }

    /// Bytes of the first image strip.
    pub fn strip(&self) -> Result<&[u8]> {
        let offset = self
            .u32(tags::STRIP_OFFSETS)
            .ok_or_else(|| invalid("missing StripOffsets"))? as usize;
        let len = self
            .u32(tags::STRIP_BYTE_COUNTS)
            .ok_or_else(|| invalid("missing StripByteCounts"))? as usize;
        self.data
            .get(offset..offset + len)
            .ok_or_else(|| invalid(format!("strip {}+{} lies outside the file", offset, len)))
    }

    /// Decodes the CFA strip into row-major samples.
    pub fn samples(&self) -> Result<Vec<u16>> {
        let width = self.u32(tags::IMAGE_WIDTH).ok_or_else(|| invalid("missing ImageWidth"))? as usize;
        let height = self.u32(tags::IMAGE_LENGTH).ok_or_else(|| invalid("missing ImageLength"))? as usize;
        let bits = self.u32(tags::BITS_PER_SAMPLE).ok_or_else(|| invalid("missing BitsPerSample"))? as u16;
        if !(1..=16).contains(&bits) {
            return Err(invalid(format!("unsupported BitsPerSample {}", bits)));
        }
        if self.u32(tags::COMPRESSION).unwrap_or(1) != 1 {
            return Err(invalid("compressed strips are not supported"));
        }

        let strip = self.strip()?;
        let samples = if bits == 16 {
            let mut samples = vec![0u16; strip.len() / 2];
            match self.byte_order {
                TiffByteOrder::LittleEndian => LittleEndian::read_u16_into(&strip[..samples.len() * 2], &mut samples),
                TiffByteOrder::BigEndian => BigEndian::read_u16_into(&strip[..samples.len() * 2], &mut samples),
            }
            samples
        } else {
            unpack_msb(strip, bits, width)
        };

        if samples.len() != width * height {
            return Err(invalid(format!(
                "strip holds {} samples, expected {}x{}",
                samples.len(),
                width,
                height
            )));
        }
        Ok(samples)
    }
}

fn type_size(field_type: u16) -> Option<usize> {
    Some(match field_type {
        1 | 2 | 6 | 7 => 1,
        3 | 8 => 2,
        4 | 9 | 11 => 4,
        5 | 10 | 12 => 8,
        _ => return None,
    })
}

fn parse_ifd0<B: ByteOrder>(data: &[u8]) -> Result<BTreeMap<u16, TagValue>> {
    if B::read_u16(&data[2..4]) != 42 {
        return Err(invalid("not a classic TIFF (magic is not 42)"));
    }
    let ifd = B::read_u32(&data[4..8]) as usize;
    let count_bytes = data
        .get(ifd..ifd + 2)
        .ok_or_else(|| invalid(format!("IFD0 offset {} is outside the file", ifd)))?;
    let entries = B::read_u16(count_bytes) as usize;

    let mut tags = BTreeMap::new();
    for i in 0..entries {
        let at = ifd + 2 + i * 12;
        let entry = data
            .get(at..at + 12)
            .ok_or_else(|| invalid(format!("IFD entry {} is truncated", i)))?;
        let tag = B::read_u16(&entry[0..2]);
        let field_type = B::read_u16(&entry[2..4]);
        let count = B::read_u32(&entry[4..8]) as usize;

        let Some(size) = type_size(field_type) else {
            continue;
        };
        let total = size
            .checked_mul(count)
            .ok_or_else(|| invalid(format!("tag {} has an absurd count", tag)))?;
        let bytes = if total <= 4 {
            &entry[8..8 + total]
        } else {
            let offset = B::read_u32(&entry[8..12]) as usize;
            data.get(offset..offset + total)
                .ok_or_else(|| invalid(format!("tag {} points outside the file", tag)))?
        };

        tags.insert(tag, decode_value::<B>(field_type, bytes));
    }
    Ok(tags)
}

fn decode_value<B: ByteOrder>(field_type: u16, bytes: &[u8]) -> TagValue {
    match field_type {
        1 => TagValue::Byte(bytes.to_vec()),
        2 => TagValue::Ascii(
            String::from_utf8_lossy(bytes)
                .trim_end_matches('\0')
                .to_string(),
        ),
        3 => TagValue::Short(bytes.chunks_exact(2).map(B::read_u16).collect()),
        4 => TagValue::Long(bytes.chunks_exact(4).map(B::read_u32).collect()),
        5 => TagValue::Rational(
            bytes
                .chunks_exact(8)
                .map(|c| (B::read_u32(&c[..4]), B::read_u32(&c[4..])))
                .collect(),
        ),
        10 => TagValue::SRational(
            bytes
                .chunks_exact(8)
                .map(|c| (B::read_i32(&c[..4]), B::read_i32(&c[4..])))
                .collect(),
        ),
        _ => TagValue::Undefined(bytes.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Big-endian TIFF with one IFD: width 2, height 1, 16-bit, one strip.
    fn big_endian_tiff() -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"MM");
        out.extend_from_slice(&42u16.to_be_bytes());
        out.extend_from_slice(&8u32.to_be_bytes());

        let entries: [(u16, u16, u32, u32); 6] = [
            (tags::IMAGE_WIDTH, 4, 1, 2),
            (tags::IMAGE_LENGTH, 4, 1, 1),
            (tags::BITS_PER_SAMPLE, 3, 1, 16 << 16),
            (tags::STRIP_OFFSETS, 4, 1, 8 + 2 + 6 * 12 + 4),
            (tags::STRIP_BYTE_COUNTS, 4, 1, 4),
            (tags::CFA_PATTERN, 1, 4, 0x0001_0102),
        ];
        out.extend_from_slice(&(entries.len() as u16).to_be_bytes());
        for (tag, field_type, count, value) in entries {
            out.extend_from_slice(&tag.to_be_bytes());
            out.extend_from_slice(&field_type.to_be_bytes());
            out.extend_from_slice(&count.to_be_bytes());
            out.extend_from_slice(&value.to_be_bytes());
        }
        out.extend_from_slice(&0u32.to_be_bytes());
        out.extend_from_slice(&[0x0F, 0xFF, 0x00, 0x40]);
        out
    }

    #[test]
    fn test_parses_big_endian() {
        let dng = DngFile::parse(big_endian_tiff()).unwrap();
        assert_eq!(dng.byte_order(), TiffByteOrder::BigEndian);
        assert_eq!(dng.u32(tags::BITS_PER_SAMPLE), Some(16));
        assert_eq!(dng.tag(tags::CFA_PATTERN), Some(&TagValue::Byte(vec![0, 1, 1, 2])));
        assert_eq!(dng.samples().unwrap(), vec![0x0FFF, 0x0040]);
    }

    #[test]
    fn test_rejects_non_tiff() {
        assert!(matches!(
            DngFile::parse(b"GIF89a\0\0\0\0".to_vec()),
            Err(ConversionError::InvalidDng(_))
        ));
        assert!(DngFile::parse(b"II".to_vec()).is_err());
    }

    #[test]
    fn test_strip_outside_file() {
        let mut bytes = big_endian_tiff();
        bytes.truncate(bytes.len() - 2);
        let dng = DngFile::parse(bytes).unwrap();
        assert!(dng.strip().is_err());
    }
}
