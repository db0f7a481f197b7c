//! Frame metadata types

use std::fmt;
use std::str::FromStr;

use crate::dng_pipeline::common::error::{ConversionError, Result};
use crate::dng_pipeline::metadata::timecode::Timecode;

/// EXIF LightSource value for D65, the DNG default calibration illuminant.
pub const ILLUMINANT_D65: u16 = 21;

pub const IDENTITY_MATRIX: [[f64; 3]; 3] = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

/// 2x2 color filter array layout, named from the top-left pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BayerPattern {
    #[default]
    Rggb,
    Bggr,
    Grbg,
    Gbrg,
}

impl BayerPattern {
    /// CFAPattern tag bytes (0 = red, 1 = green, 2 = blue), row-major.
    pub fn cfa_pattern(self) -> [u8; 4] {
        match self {
            BayerPattern::Rggb => [0, 1, 1, 2],
            BayerPattern::Bggr => [2, 1, 1, 0],
            BayerPattern::Grbg => [1, 0, 2, 1],
            BayerPattern::Gbrg => [1, 2, 0, 1],
        }
    }
}

impl FromStr for BayerPattern {
    type Err = String;

    fn from_str(pattern: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match pattern.to_ascii_lowercase().as_str() {
            "rggb" => Self::Rggb,
            "bggr" => Self::Bggr,
            "grbg" => Self::Grbg,
            "gbrg" => Self::Gbrg,
            _ => return Err(format!("Unknown Bayer pattern: {}", pattern)),
        })
    }
}

impl fmt::Display for BayerPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BayerPattern::Rggb => "RGGB",
            BayerPattern::Bggr => "BGGR",
            BayerPattern::Grbg => "GRBG",
            BayerPattern::Gbrg => "GBRG",
        };
        f.write_str(name)
    }
}

/// Display orientation, clockwise rotation needed to view the frame upright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    #[default]
    Normal,
    Rotate90,
    Rotate180,
    Rotate270,
}

impl Orientation {
    /// TIFF/EXIF Orientation value.
    pub fn tiff_value(self) -> u16 {
        match self {
            Orientation::Normal => 1,
            Orientation::Rotate90 => 6,
            Orientation::Rotate180 => 3,
            Orientation::Rotate270 => 8,
        }
    }

    /// Derives the rotation from the upper-left 2x2 of a QuickTime display
    /// matrix (`a b / c d`, any fixed-point scale). Anything that is not a
    /// pure quarter-turn maps to `Normal`.
    pub fn from_display_matrix(a: i32, b: i32, c: i32, d: i32) -> Self {
        match (a.signum(), b.signum(), c.signum(), d.signum()) {
            (0, 1, -1, 0) => Orientation::Rotate90,
            (-1, 0, 0, -1) => Orientation::Rotate180,
            (0, -1, 1, 0) => Orientation::Rotate270,
            _ => Orientation::Normal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRate {
    pub numerator: u32,
    pub denominator: u32,
}

impl FrameRate {
    pub fn new(numerator: u32, denominator: u32) -> Self {
        Self { numerator, denominator }
    }

    pub fn as_f64(&self) -> f64 {
        if self.denominator == 0 {
            0.0
        } else {
            f64::from(self.numerator) / f64::from(self.denominator)
        }
    }

    /// Whole frames per second used for timecode counting (29.97 -> 30).
    pub fn nominal(&self) -> u32 {
        self.as_f64().round() as u32
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3} fps", self.as_f64())
    }
}

/// Complete metadata for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameMetadata {
    pub width: u32,
    pub height: u32,
    pub bits_per_sample: u16,
    pub bayer_pattern: BayerPattern,
    /// XYZ to camera matrix, row-major (DNG ColorMatrix1 semantics).
    pub color_matrix: [[f64; 3]; 3],
    /// Multipliers applied to R, G, B to neutralise the scene illuminant.
    pub white_balance_gains: [f64; 3],
    pub black_level: u32,
    pub white_level: u32,
    pub iso_sensitivity: Option<u32>,
    /// Exposure time in seconds.
    pub exposure_time: Option<f64>,
    pub capture_timecode: Option<Timecode>,
    pub frame_rate: Option<FrameRate>,
    pub orientation: Orientation,
    pub calibration_illuminant: u16,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub frame_index: u64,
}

impl FrameMetadata {
    /// Metadata with the documented defaults for every optional field.
    pub fn new(width: u32, height: u32, bits_per_sample: u16) -> Self {
        let white_level = max_value_for_bits(bits_per_sample);
        Self {
            width,
            height,
            bits_per_sample,
            bayer_pattern: BayerPattern::default(),
            color_matrix: IDENTITY_MATRIX,
            white_balance_gains: [1.0, 1.0, 1.0],
            black_level: 0,
            white_level,
            iso_sensitivity: None,
            exposure_time: None,
            capture_timecode: None,
            frame_rate: None,
            orientation: Orientation::default(),
            calibration_illuminant: ILLUMINANT_D65,
            camera_make: None,
            camera_model: None,
            frame_index: 0,
        }
    }

    pub fn max_sample_value(&self) -> u32 {
        max_value_for_bits(self.bits_per_sample)
    }

    /// Bytes needed to hold one unpacked sample (`ceil(bits / 8)`).
    pub fn bytes_per_sample(&self) -> usize {
        usize::from(self.bits_per_sample).div_ceil(8)
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Byte size of the unpacked sensor buffer for this frame.
    pub fn expected_buffer_len(&self) -> usize {
        self.pixel_count() * self.bytes_per_sample()
    }

    pub fn with_frame_index(mut self, frame_index: u64) -> Self {
        self.frame_index = frame_index;
        self
    }

    /// Applies every field present in `overrides`, leaving the rest untouched.
    pub fn merged(mut self, overrides: &PartialFrameMetadata) -> Self {
        if let Some(pattern) = overrides.bayer_pattern {
            self.bayer_pattern = pattern;
        }
        if let Some(matrix) = overrides.color_matrix {
            self.color_matrix = matrix;
        }
        if let Some(gains) = overrides.white_balance_gains {
            self.white_balance_gains = gains;
        }
        if let Some(black) = overrides.black_level {
            self.black_level = black;
        }
        if let Some(white) = overrides.white_level {
            self.white_level = white;
        }
        if let Some(iso) = overrides.iso_sensitivity {
            self.iso_sensitivity = Some(iso);
        }
        if let Some(exposure) = overrides.exposure_time {
            self.exposure_time = Some(exposure);
        }
        if let Some(timecode) = overrides.capture_timecode {
            self.capture_timecode = Some(timecode);
        }
        if let Some(rate) = overrides.frame_rate {
            self.frame_rate = Some(rate);
        }
        if let Some(orientation) = overrides.orientation {
            self.orientation = orientation;
        }
        if let Some(illuminant) = overrides.calibration_illuminant {
            self.calibration_illuminant = illuminant;
        }
        if let Some(make) = &overrides.camera_make {
            self.camera_make = Some(make.clone());
        }
        if let Some(model) = &overrides.camera_model {
            self.camera_model = Some(model.clone());
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ConversionError::Metadata(format!(
                "invalid dimensions {}x{}",
                self.width, self.height
            )));
        }
        if !(1..=16).contains(&self.bits_per_sample) {
            return Err(ConversionError::Metadata(format!(
                "unsupported bit depth {}",
                self.bits_per_sample
            )));
        }
        if self.white_level > self.max_sample_value() {
            return Err(ConversionError::Metadata(format!(
                "white level {} exceeds {}-bit range",
                self.white_level, self.bits_per_sample
            )));
        }
        if self.black_level >= self.white_level {
            return Err(ConversionError::Metadata(format!(
                "black level {} is not below white level {}",
                self.black_level, self.white_level
            )));
        }
        if self.white_balance_gains.iter().any(|g| !g.is_finite() || *g <= 0.0) {
            return Err(ConversionError::Metadata(format!(
                "white balance gains must be positive, got {:?}",
                self.white_balance_gains
            )));
        }
        if self.color_matrix.iter().flatten().any(|v| !v.is_finite()) {
            return Err(ConversionError::Metadata("color matrix contains non-finite values".to_string()));
        }
        Ok(())
    }
}

fn max_value_for_bits(bits: u16) -> u32 {
    if bits == 0 || bits > 32 {
        0
    } else {
        ((1u64 << bits) - 1) as u32
    }
}

/// Per-frame metadata fields that override asset defaults when present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialFrameMetadata {
    pub bayer_pattern: Option<BayerPattern>,
    pub color_matrix: Option<[[f64; 3]; 3]>,
    pub white_balance_gains: Option<[f64; 3]>,
    pub black_level: Option<u32>,
    pub white_level: Option<u32>,
    pub iso_sensitivity: Option<u32>,
    pub exposure_time: Option<f64>,
    pub capture_timecode: Option<Timecode>,
    pub frame_rate: Option<FrameRate>,
    pub orientation: Option<Orientation>,
    pub calibration_illuminant: Option<u16>,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let meta = FrameMetadata::new(100, 50, 12);
        assert_eq!(meta.white_level, 4095);
        assert_eq!(meta.black_level, 0);
        assert_eq!(meta.color_matrix, IDENTITY_MATRIX);
        assert_eq!(meta.bytes_per_sample(), 2);
        assert_eq!(meta.expected_buffer_len(), 100 * 50 * 2);
        assert!(meta.validate().is_ok());
    }

    #[test]
    fn test_merge_overrides_only_present_fields() {
        let base = FrameMetadata::new(64, 32, 14);
        let overrides = PartialFrameMetadata {
            black_level: Some(512),
            iso_sensitivity: Some(800),
            ..Default::default()
        };
        let merged = base.clone().merged(&overrides);
        assert_eq!(merged.black_level, 512);
        assert_eq!(merged.iso_sensitivity, Some(800));
        assert_eq!(merged.white_level, base.white_level);
        assert_eq!(merged.bayer_pattern, base.bayer_pattern);
    }

    #[test]
    fn test_validate_rejects_black_above_white() {
        let mut meta = FrameMetadata::new(10, 10, 12);
        meta.black_level = 4095;
        assert!(matches!(meta.validate(), Err(ConversionError::Metadata(_))));
    }

    #[test]
    fn test_validate_rejects_white_outside_bit_depth() {
        let mut meta = FrameMetadata::new(10, 10, 10);
        meta.white_level = 4095;
        assert!(matches!(meta.validate(), Err(ConversionError::Metadata(_))));
    }

    #[test]
    fn test_orientation_from_matrix() {
        let one = 0x10000;
        assert_eq!(Orientation::from_display_matrix(one, 0, 0, one), Orientation::Normal);
        assert_eq!(Orientation::from_display_matrix(0, one, -one, 0), Orientation::Rotate90);
        assert_eq!(Orientation::from_display_matrix(-one, 0, 0, -one), Orientation::Rotate180);
        assert_eq!(Orientation::from_display_matrix(0, -one, one, 0), Orientation::Rotate270);
        assert_eq!(Orientation::Rotate90.tiff_value(), 6);
    }

    #[test]
    fn test_bayer_pattern_parsing() {
        assert_eq!("gbrg".parse::<BayerPattern>(), Ok(BayerPattern::Gbrg));
        assert_eq!("RGGB".parse::<BayerPattern>(), Ok(BayerPattern::Rggb));
        assert!("rgbw".parse::<BayerPattern>().is_err());
        assert_eq!(BayerPattern::Bggr.cfa_pattern(), [2, 1, 1, 0]);
    }

    #[test]
    fn test_frame_rate_nominal() {
        assert_eq!(FrameRate::new(30000, 1001).nominal(), 30);
        assert_eq!(FrameRate::new(24, 1).nominal(), 24);
        assert_eq!(FrameRate::new(1, 0).as_f64(), 0.0);
    }
}
