//! DNG tag numbers and the tag set describing one frame.

use std::collections::BTreeMap;
use std::fmt;

use crate::dng_pipeline::dng::types::SampleLayout;
use crate::dng_pipeline::metadata::types::FrameMetadata;

pub const NEW_SUBFILE_TYPE: u16 = 254;
pub const IMAGE_WIDTH: u16 = 256;
pub const IMAGE_LENGTH: u16 = 257;
pub const BITS_PER_SAMPLE: u16 = 258;
pub const COMPRESSION: u16 = 259;
pub const PHOTOMETRIC_INTERPRETATION: u16 = 262;
pub const MAKE: u16 = 271;
pub const MODEL: u16 = 272;
pub const STRIP_OFFSETS: u16 = 273;
pub const ORIENTATION: u16 = 274;
pub const SAMPLES_PER_PIXEL: u16 = 277;
pub const ROWS_PER_STRIP: u16 = 278;
pub const STRIP_BYTE_COUNTS: u16 = 279;
pub const PLANAR_CONFIGURATION: u16 = 284;
pub const SOFTWARE: u16 = 305;
pub const CFA_REPEAT_PATTERN_DIM: u16 = 33421;
pub const CFA_PATTERN: u16 = 33422;
pub const EXPOSURE_TIME: u16 = 33434;
pub const ISO_SPEED_RATINGS: u16 = 34855;
pub const DNG_VERSION: u16 = 50706;
pub const DNG_BACKWARD_VERSION: u16 = 50707;
pub const UNIQUE_CAMERA_MODEL: u16 = 50708;
pub const CFA_PLANE_COLOR: u16 = 50710;
pub const CFA_LAYOUT: u16 = 50711;
pub const BLACK_LEVEL_REPEAT_DIM: u16 = 50713;
pub const BLACK_LEVEL: u16 = 50714;
pub const WHITE_LEVEL: u16 = 50717;
pub const COLOR_MATRIX_1: u16 = 50721;
pub const AS_SHOT_NEUTRAL: u16 = 50728;
pub const CALIBRATION_ILLUMINANT_1: u16 = 50778;
pub const TIME_CODES: u16 = 51043;
pub const FRAME_RATE: u16 = 51044;

pub const PHOTOMETRIC_CFA: u16 = 32803;
pub const COMPRESSION_NONE: u16 = 1;

/// Denominator used for matrix and neutral values.
const FIXED_POINT_DENOMINATOR: i32 = 10_000;

/// A TIFF field value, typed the way it is stored in the file.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Byte(Vec<u8>),
    Ascii(String),
    Short(Vec<u16>),
    Long(Vec<u32>),
    Rational(Vec<(u32, u32)>),
    SRational(Vec<(i32, i32)>),
    /// Any other field type, kept as raw bytes.
    Undefined(Vec<u8>),
}

impl TagValue {
    /// First value of an integer field.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            TagValue::Byte(v) | TagValue::Undefined(v) => v.first().map(|b| u32::from(*b)),
            TagValue::Short(v) => v.first().map(|s| u32::from(*s)),
            TagValue::Long(v) => v.first().copied(),
            _ => None,
        }
    }

    /// All values of an integer field.
    pub fn as_u32_vec(&self) -> Option<Vec<u32>> {
        match self {
            TagValue::Byte(v) | TagValue::Undefined(v) => Some(v.iter().map(|b| u32::from(*b)).collect()),
            TagValue::Short(v) => Some(v.iter().map(|s| u32::from(*s)).collect()),
            TagValue::Long(v) => Some(v.clone()),
            _ => None,
        }
    }

    pub fn as_f64_vec(&self) -> Option<Vec<f64>> {
        match self {
            TagValue::Rational(v) => Some(v.iter().map(|&(n, d)| ratio(f64::from(n), f64::from(d))).collect()),
            TagValue::SRational(v) => Some(v.iter().map(|&(n, d)| ratio(f64::from(n), f64::from(d))).collect()),
            other => other.as_u32_vec().map(|v| v.into_iter().map(f64::from).collect()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TagValue::Ascii(s) => Some(s),
            _ => None,
        }
    }
}

fn ratio(n: f64, d: f64) -> f64 {
    if d == 0.0 { 0.0 } else { n / d }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, values: &[T]) -> fmt::Result {
            const SHOWN: usize = 16;
            for (i, v) in values.iter().take(SHOWN).enumerate() {
                if i > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{}", v)?;
            }
            if values.len() > SHOWN {
                write!(f, " ... ({} values)", values.len())?;
            }
            Ok(())
        }
        match self {
            TagValue::Byte(v) | TagValue::Undefined(v) => list(f, &v[..]),
            TagValue::Ascii(s) => write!(f, "\"{}\"", s),
            TagValue::Short(v) => list(f, &v[..]),
            TagValue::Long(v) => list(f, &v[..]),
            TagValue::Rational(v) => {
                let shown: Vec<String> = v.iter().map(|(n, d)| format!("{}/{}", n, d)).collect();
                list(f, &shown)
            }
            TagValue::SRational(v) => {
                let shown: Vec<String> = v.iter().map(|(n, d)| format!("{}/{}", n, d)).collect();
                list(f, &shown)
            }
        }
    }
}

/// Human-readable name of a tag this crate writes.
pub fn tag_name(tag: u16) -> Option<&'static str> {
    Some(match tag {
        NEW_SUBFILE_TYPE => "NewSubfileType",
        IMAGE_WIDTH => "ImageWidth",
        IMAGE_LENGTH => "ImageLength",
        BITS_PER_SAMPLE => "BitsPerSample",
        COMPRESSION => "Compression",
        PHOTOMETRIC_INTERPRETATION => "PhotometricInterpretation",
        MAKE => "Make",
        MODEL => "Model",
        STRIP_OFFSETS => "StripOffsets",
        ORIENTATION => "Orientation",
        SAMPLES_PER_PIXEL => "SamplesPerPixel",
        ROWS_PER_STRIP => "RowsPerStrip",
        STRIP_BYTE_COUNTS => "StripByteCounts",
        PLANAR_CONFIGURATION => "PlanarConfiguration",
        SOFTWARE => "Software",
        CFA_REPEAT_PATTERN_DIM => "CFARepeatPatternDim",
        CFA_PATTERN => "CFAPattern",
        EXPOSURE_TIME => "ExposureTime",
        ISO_SPEED_RATINGS => "ISOSpeedRatings",
        DNG_VERSION => "DNGVersion",
        DNG_BACKWARD_VERSION => "DNGBackwardVersion",
        UNIQUE_CAMERA_MODEL => "UniqueCameraModel",
        CFA_PLANE_COLOR => "CFAPlaneColor",
        CFA_LAYOUT => "CFALayout",
        BLACK_LEVEL_REPEAT_DIM => "BlackLevelRepeatDim",
        BLACK_LEVEL => "BlackLevel",
        WHITE_LEVEL => "WhiteLevel",
        COLOR_MATRIX_1 => "ColorMatrix1",
        AS_SHOT_NEUTRAL => "AsShotNeutral",
        CALIBRATION_ILLUMINANT_1 => "CalibrationIlluminant1",
        TIME_CODES => "TimeCodes",
        FRAME_RATE => "FrameRate",
        _ => return None,
    })
}

/// Every IFD0 field of one frame except StripOffsets, which is only known
/// once the strip has been placed in the file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DngTagSet {
    tags: BTreeMap<u16, TagValue>,
}

impl DngTagSet {
    pub fn for_frame(metadata: &FrameMetadata, layout: SampleLayout, software: &str) -> Self {
        let mut set = Self::default();
        let stored_bits = layout.stored_bits(metadata.bits_per_sample);

        set.insert(NEW_SUBFILE_TYPE, TagValue::Long(vec![0]));
        set.insert(IMAGE_WIDTH, TagValue::Long(vec![metadata.width]));
        set.insert(IMAGE_LENGTH, TagValue::Long(vec![metadata.height]));
        set.insert(BITS_PER_SAMPLE, TagValue::Short(vec![stored_bits]));
        set.insert(COMPRESSION, TagValue::Short(vec![COMPRESSION_NONE]));
        set.insert(PHOTOMETRIC_INTERPRETATION, TagValue::Short(vec![PHOTOMETRIC_CFA]));
        set.insert(ORIENTATION, TagValue::Short(vec![metadata.orientation.tiff_value()]));
        set.insert(SAMPLES_PER_PIXEL, TagValue::Short(vec![1]));
        set.insert(ROWS_PER_STRIP, TagValue::Long(vec![metadata.height]));
        set.insert(
            STRIP_BYTE_COUNTS,
            TagValue::Long(vec![strip_byte_count(metadata, layout) as u32]),
        );
        set.insert(PLANAR_CONFIGURATION, TagValue::Short(vec![1]));
        set.insert(SOFTWARE, TagValue::Ascii(ascii(software)));

        set.insert(CFA_REPEAT_PATTERN_DIM, TagValue::Short(vec![2, 2]));
        set.insert(CFA_PATTERN, TagValue::Byte(metadata.bayer_pattern.cfa_pattern().to_vec()));
        set.insert(CFA_PLANE_COLOR, TagValue::Byte(vec![0, 1, 2]));
        set.insert(CFA_LAYOUT, TagValue::Short(vec![1]));

        set.insert(DNG_VERSION, TagValue::Byte(vec![1, 4, 0, 0]));
        set.insert(DNG_BACKWARD_VERSION, TagValue::Byte(vec![1, 1, 0, 0]));
        set.insert(BLACK_LEVEL_REPEAT_DIM, TagValue::Short(vec![1, 1]));
        set.insert(BLACK_LEVEL, TagValue::Long(vec![metadata.black_level]));
        set.insert(WHITE_LEVEL, TagValue::Long(vec![metadata.white_level]));
        set.insert(COLOR_MATRIX_1, TagValue::SRational(color_matrix(metadata)));
        set.insert(AS_SHOT_NEUTRAL, TagValue::Rational(as_shot_neutral(metadata)));
        set.insert(
            CALIBRATION_ILLUMINANT_1,
            TagValue::Short(vec![metadata.calibration_illuminant]),
        );

        if let Some(make) = &metadata.camera_make {
            set.insert(MAKE, TagValue::Ascii(ascii(make)));
        }
        if let Some(model) = &metadata.camera_model {
            set.insert(MODEL, TagValue::Ascii(ascii(model)));
        }
        set.insert(UNIQUE_CAMERA_MODEL, TagValue::Ascii(unique_camera_model(metadata)));

        if let Some(exposure) = metadata.exposure_time.filter(|t| t.is_finite() && *t > 0.0) {
            set.insert(EXPOSURE_TIME, TagValue::Rational(vec![exposure_rational(exposure)]));
        }
        if let Some(iso) = metadata.iso_sensitivity {
            set.insert(ISO_SPEED_RATINGS, TagValue::Short(vec![iso.min(u32::from(u16::MAX)) as u16]));
        }
        if let Some(timecode) = metadata.capture_timecode {
            set.insert(TIME_CODES, TagValue::Byte(timecode.smpte_bytes().to_vec()));
        }
        if let Some(rate) = metadata.frame_rate.filter(|r| r.denominator > 0) {
            set.insert(
                FRAME_RATE,
                TagValue::SRational(vec![(
                    rate.numerator.min(i32::MAX as u32) as i32,
                    rate.denominator.min(i32::MAX as u32) as i32,
                )]),
            );
        }

        set
    }

    pub fn insert(&mut self, tag: u16, value: TagValue) {
        self.tags.insert(tag, value);
    }

    pub fn get(&self, tag: u16) -> Option<&TagValue> {
        self.tags.get(&tag)
    }

    /// Tags in ascending numeric order.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &TagValue)> {
        self.tags.iter().map(|(tag, value)| (*tag, value))
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

/// Size of the single image strip.
pub fn strip_byte_count(metadata: &FrameMetadata, layout: SampleLayout) -> usize {
    let bits = layout.stored_bits(metadata.bits_per_sample);
    let row_bytes = crate::dng_pipeline::common::bitpack::packed_row_bytes(metadata.width as usize, bits);
    row_bytes * metadata.height as usize
}

/// TIFF ASCII fields may only carry 7-bit characters.
fn ascii(s: &str) -> String {
    s.chars().map(|c| if c.is_ascii() && c != '\0' { c } else { '?' }).collect()
}

fn unique_camera_model(metadata: &FrameMetadata) -> String {
    let name = match (&metadata.camera_make, &metadata.camera_model) {
        (Some(make), Some(model)) if !model.starts_with(make.as_str()) => format!("{} {}", make, model),
        (_, Some(model)) => model.clone(),
        (Some(make), None) => make.clone(),
        (None, None) => "ProRes RAW".to_string(),
    };
    ascii(&name)
}

fn color_matrix(metadata: &FrameMetadata) -> Vec<(i32, i32)> {
    metadata
        .color_matrix
        .iter()
        .flatten()
        .map(|v| ((v * f64::from(FIXED_POINT_DENOMINATOR)).round() as i32, FIXED_POINT_DENOMINATOR))
        .collect()
}

/// Neutral as camera-space coordinates: the reciprocal gains, scaled so the
/// green channel is exactly 1.
fn as_shot_neutral(metadata: &FrameMetadata) -> Vec<(u32, u32)> {
    let green = metadata.white_balance_gains[1];
    let d = FIXED_POINT_DENOMINATOR as u32;
    metadata
        .white_balance_gains
        .iter()
        .map(|gain| ((green / gain * f64::from(d)).round().max(0.0) as u32, d))
        .collect()
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Exposure time in seconds as a reduced fraction at microsecond precision.
fn exposure_rational(seconds: f64) -> (u32, u32) {
    const MICROS: u64 = 1_000_000;
    let n = ((seconds * MICROS as f64).round() as u64).max(1);
    let g = gcd(n, MICROS);
    let (n, d) = (n / g, MICROS / g);
    (n.min(u64::from(u32::MAX)) as u32, d as u32)
}
