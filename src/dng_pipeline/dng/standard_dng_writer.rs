use std::io::{BufWriter, Seek, Write};
use std::path::Path;

use tiff::encoder::{Rational, SRational, TiffEncoder};
use tiff::tags::Tag;
use tracing::{debug, instrument};

use crate::dng_pipeline::common::bitpack::pack_msb;
use crate::dng_pipeline::common::error::{ConversionError, Result};
use crate::dng_pipeline::decode::types::DecodedFrame;
use crate::dng_pipeline::dng::tags::{self, DngTagSet, TagValue};
use crate::dng_pipeline::dng::types::SampleLayout;
use crate::dng_pipeline::dng::writer::DngWriter;

pub const DEFAULT_SOFTWARE: &str = concat!("prawdec ", env!("CARGO_PKG_VERSION"));

/// Writes uncompressed single-strip CFA DNGs with the `tiff` encoder.
#[derive(Debug, Clone)]
pub struct StandardDngWriter {
    layout: SampleLayout,
    software: String,
    overwrite: bool,
}

impl Default for StandardDngWriter {
    fn default() -> Self {
        Self {
            layout: SampleLayout::default(),
            software: DEFAULT_SOFTWARE.to_string(),
            overwrite: true,
        }
    }
}

impl StandardDngWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_layout(mut self, layout: SampleLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_software(mut self, software: impl Into<String>) -> Self {
        self.software = software.into();
        self
    }

    /// When false, writing onto an existing file fails instead of replacing it.
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn layout(&self) -> SampleLayout {
        self.layout
    }

    /// Encodes `frame` as a complete DNG into `output`.
    pub fn encode<W: Write + Seek>(&self, frame: &DecodedFrame, output: W) -> Result<()> {
        let frame_index = frame.frame_index();
        let fail = |e: tiff::TiffError| ConversionError::Write {
            frame_index,
            cause: e.to_string(),
        };

        let metadata = &frame.metadata;
        let tag_set = DngTagSet::for_frame(metadata, self.layout, &self.software);
        let bits = self.layout.stored_bits(metadata.bits_per_sample);

        let mut encoder = TiffEncoder::new(output).map_err(fail)?;
        let mut ifd = encoder.image_directory().map_err(fail)?;

        let strip_offset = match bits {
            16 => ifd.write_data(&frame.pixels[..]).map_err(fail)?,
            _ => {
                let packed = pack_msb(&frame.pixels, bits, metadata.width as usize);
                ifd.write_data(&packed[..]).map_err(fail)?
            }
        };
        let strip_offset = u32::try_from(strip_offset).map_err(|_| ConversionError::Write {
            frame_index,
            cause: format!("strip offset {} does not fit a classic TIFF", strip_offset),
        })?;
        ifd.write_tag(Tag::Unknown(tags::STRIP_OFFSETS), &[strip_offset][..])
            .map_err(fail)?;

        for (tag, value) in tag_set.iter() {
            let tag = Tag::Unknown(tag);
            let written = match value {
                TagValue::Byte(v) | TagValue::Undefined(v) => ifd.write_tag(tag, &v[..]),
                TagValue::Ascii(s) => ifd.write_tag(tag, s.as_str()),
                TagValue::Short(v) => ifd.write_tag(tag, &v[..]),
                TagValue::Long(v) => ifd.write_tag(tag, &v[..]),
                TagValue::Rational(v) => {
                    let values: Vec<Rational> = v.iter().map(|&(n, d)| Rational { n, d }).collect();
                    ifd.write_tag(tag, &values[..])
                }
                TagValue::SRational(v) => {
                    let values: Vec<SRational> = v.iter().map(|&(n, d)| SRational { n, d }).collect();
                    ifd.write_tag(tag, &values[..])
                }
            };
            written.map_err(fail)?;
        }

        ifd.finish().map_err(fail)?;
        debug!(tags = tag_set.len() + 1, bits, "Encoded DNG");
        Ok(())
    }
}

impl DngWriter for StandardDngWriter {
    /// Writes `frame` to `output` atomically.
    ///
    /// The DNG is first encoded into a temporary file next to `output`,
    /// flushed to disk, then renamed into place.
    ///
    /// # Arguments
    ///
    /// * `frame` - Validated mosaic with its final metadata
    /// * `output` - Destination path of the `.dng` file
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The file exists at `output` and is complete
    /// * `Err(ConversionError::Write)` - Nothing was left at `output`
    #[instrument(skip_all, fields(frame = frame.frame_index(), path = %output.display()))]
    fn write(&self, frame: DecodedFrame, output: &Path) -> Result<()> {
        let frame_index = frame.frame_index();
        let fail = |cause: String| ConversionError::Write { frame_index, cause };

        if !self.overwrite && output.exists() {
            return Err(fail(format!("{} already exists", output.display())));
        }

        let dir = output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let mut temp = tempfile::Builder::new()
            .prefix(".prawdec-")
            .suffix(".dng.part")
            .tempfile_in(dir)
            .map_err(|e| fail(format!("creating temporary file in {}: {}", dir.display(), e)))?;

        {
            let mut writer = BufWriter::new(temp.as_file_mut());
            self.encode(&frame, &mut writer)?;
            writer.flush().map_err(|e| fail(e.to_string()))?;
        }
        temp.as_file().sync_all().map_err(|e| fail(e.to_string()))?;

        let persisted = if self.overwrite {
            temp.persist(output)
        } else {
            temp.persist_noclobber(output)
        };
        persisted.map_err(|e| fail(e.error.to_string()))?;

        debug!("Wrote DNG");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::dng_pipeline::dng::reader::DngFile;
    use crate::dng_pipeline::metadata::types::{BayerPattern, FrameMetadata};

    fn frame(width: u32, height: u32, bits: u16) -> DecodedFrame {
        let mut metadata = FrameMetadata::new(width, height, bits);
        metadata.black_level = 64;
        let max = metadata.max_sample_value();
        let pixels = (0..width * height).map(|i| (i * 37 % (max + 1)) as u16).collect();
        DecodedFrame { metadata, pixels }
    }

    fn encode(writer: &StandardDngWriter, frame: &DecodedFrame) -> DngFile {
        let mut cursor = Cursor::new(Vec::new());
        writer.encode(frame, &mut cursor).unwrap();
        DngFile::parse(cursor.into_inner()).unwrap()
    }

    #[test]
    fn test_packed_twelve_bit_round_trip() {
        let frame = frame(100, 50, 12);
        let dng = encode(&StandardDngWriter::new(), &frame);

        assert_eq!(dng.u32(tags::IMAGE_WIDTH), Some(100));
        assert_eq!(dng.u32(tags::IMAGE_LENGTH), Some(50));
        assert_eq!(dng.u32(tags::BITS_PER_SAMPLE), Some(12));
        assert_eq!(dng.u32(tags::PHOTOMETRIC_INTERPRETATION), Some(32803));
        assert_eq!(dng.u32(tags::BLACK_LEVEL), Some(64));
        assert_eq!(dng.u32(tags::WHITE_LEVEL), Some(4095));
        assert_eq!(dng.u32(tags::STRIP_BYTE_COUNTS), Some(7500));
        assert_eq!(
            dng.tag(tags::CFA_PATTERN).and_then(TagValue::as_u32_vec),
            Some(vec![0, 1, 1, 2])
        );
        assert_eq!(dng.samples().unwrap(), frame.pixels);
    }

    #[test]
    fn test_widened_round_trip() {
        let frame = frame(100, 50, 12);
        let writer = StandardDngWriter::new().with_layout(SampleLayout::Widened16);
        let dng = encode(&writer, &frame);

        assert_eq!(dng.u32(tags::BITS_PER_SAMPLE), Some(16));
        assert_eq!(dng.u32(tags::STRIP_BYTE_COUNTS), Some(10_000));
        assert_eq!(dng.u32(tags::WHITE_LEVEL), Some(4095));
        assert_eq!(dng.samples().unwrap(), frame.pixels);
    }

    #[test]
    fn test_odd_width_rows_are_byte_aligned() {
        let mut frame = frame(3, 2, 10);
        frame.metadata.bayer_pattern = BayerPattern::Bggr;
        let dng = encode(&StandardDngWriter::new(), &frame);
        // ceil(3 * 10 / 8) = 4 bytes per row
        assert_eq!(dng.u32(tags::STRIP_BYTE_COUNTS), Some(8));
        assert_eq!(dng.samples().unwrap(), frame.pixels);
    }

    #[test]
    fn test_software_and_version_tags() {
        let writer = StandardDngWriter::new().with_software("prawdec test");
        let dng = encode(&writer, &frame(4, 2, 14));
        assert_eq!(dng.tag(tags::SOFTWARE).and_then(TagValue::as_str), Some("prawdec test"));
        assert_eq!(
            dng.tag(tags::DNG_VERSION).and_then(TagValue::as_u32_vec),
            Some(vec![1, 4, 0, 0])
        );
        assert_eq!(dng.u32(tags::ORIENTATION), Some(1));
    }

    #[test]
    fn test_write_persists_file_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip_000000.dng");
        StandardDngWriter::new().write(frame(8, 4, 12), &path).unwrap();

        let dng = DngFile::read(&path).unwrap();
        assert_eq!(dng.u32(tags::IMAGE_WIDTH), Some(8));
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn test_no_clobber_refuses_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip_000000.dng");
        std::fs::write(&path, b"keep me").unwrap();

        let writer = StandardDngWriter::new().with_overwrite(false);
        let err = writer.write(frame(8, 4, 12), &path).unwrap_err();
        assert!(matches!(err, ConversionError::Write { frame_index: 0, .. }));
        assert_eq!(std::fs::read(&path).unwrap(), b"keep me");
    }

    #[test]
    fn test_missing_directory_is_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("clip_000000.dng");
        let err = StandardDngWriter::new().write(frame(8, 4, 12), &path).unwrap_err();
        assert!(matches!(err, ConversionError::Write { .. }));
        assert!(!path.exists());
    }
}
