use tracing::debug;

use crate::dng_pipeline::asset::types::{AssetInfo, CompressedSample};
use crate::dng_pipeline::common::error::{ConversionError, Result};
use crate::dng_pipeline::metadata::timecode::Timecode;
use crate::dng_pipeline::metadata::types::{BayerPattern, FrameMetadata, FrameRate, PartialFrameMetadata};

/// Camera model reported when the asset carries none.
pub const DEFAULT_CAMERA_MODEL: &str = "ProRes RAW";

/// Derives frame metadata from container information.
#[derive(Debug, Clone)]
pub struct MetadataExtractor {
    bayer_pattern: BayerPattern,
    assume_bits_per_sample: Option<u16>,
    max_dimension: u32,
    validate_dimensions: bool,
    camera_model: Option<String>,
}

impl Default for MetadataExtractor {
    fn default() -> Self {
        Self {
            bayer_pattern: BayerPattern::default(),
            assume_bits_per_sample: None,
            max_dimension: 16_384,
            validate_dimensions: true,
            camera_model: None,
        }
    }
}

impl MetadataExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bayer_pattern(mut self, pattern: BayerPattern) -> Self {
        self.bayer_pattern = pattern;
        self
    }

    /// Bit depth used instead of the container's declared depth.
    pub fn with_assumed_bits_per_sample(mut self, bits: Option<u16>) -> Self {
        self.assume_bits_per_sample = bits;
        self
    }

    pub fn with_max_dimension(mut self, max_dimension: u32, enforce: bool) -> Self {
        self.max_dimension = max_dimension;
        self.validate_dimensions = enforce;
        self
    }

    /// Camera model used when the asset does not name one.
    pub fn with_camera_model(mut self, model: Option<String>) -> Self {
        self.camera_model = model;
        self
    }

    /// Metadata shared by every frame of the asset.
    pub fn asset_defaults(&self, info: &AssetInfo) -> Result<FrameMetadata> {
        if info.width == 0 || info.height == 0 {
            return Err(ConversionError::Metadata(format!(
                "asset reports invalid dimensions {}x{}",
                info.width, info.height
            )));
        }
        if self.validate_dimensions && (info.width > self.max_dimension || info.height > self.max_dimension) {
            return Err(ConversionError::Metadata(format!(
                "dimensions {}x{} exceed the {} pixel limit",
                info.width, info.height, self.max_dimension
            )));
        }

        let bits = self
            .assume_bits_per_sample
            .or(info.depth)
            .ok_or_else(|| ConversionError::Metadata("sensor bit depth is unknown".to_string()))?;
        if !(1..=16).contains(&bits) {
            return Err(ConversionError::Metadata(format!("unsupported bit depth {}", bits)));
        }

        let mut metadata = FrameMetadata::new(info.width, info.height, bits);
        metadata.bayer_pattern = self.bayer_pattern;
        metadata.orientation = info.orientation;
        metadata.frame_rate = info.frame_rate();
        metadata.camera_make = info.make().map(str::to_string);
        metadata.camera_model = info
            .model()
            .map(str::to_string)
            .or_else(|| self.camera_model.clone())
            .or_else(|| Some(DEFAULT_CAMERA_MODEL.to_string()));

        debug!(
            width = metadata.width,
            height = metadata.height,
            bits = metadata.bits_per_sample,
            pattern = %metadata.bayer_pattern,
            "Derived asset defaults"
        );
        Ok(metadata)
    }

    /// Container-derived refinements for one frame.
    pub fn per_frame_overrides(&self, sample: &CompressedSample, info: &AssetInfo) -> PartialFrameMetadata {
        let frame_rate = if sample.duration > 0 && info.timescale > 0 {
            Some(FrameRate::new(info.timescale, sample.duration))
        } else {
            info.frame_rate()
        };

        let capture_timecode = info.timecode.and_then(|tc| {
            let fps = match tc.frames_per_second {
                0 => frame_rate.map(|r| r.nominal())?,
                fps => fps,
            };
            (fps > 0).then(|| Timecode::from_frame_number(tc.start_frame + sample.index, fps, tc.drop_frame))
        });

        PartialFrameMetadata {
            frame_rate,
            capture_timecode,
            ..PartialFrameMetadata::default()
        }
    }

    /// Defaults merged with the frame's container refinements and validated.
    pub fn frame_metadata(&self, defaults: &FrameMetadata, sample: &CompressedSample, info: &AssetInfo) -> Result<FrameMetadata> {
        let metadata = defaults
            .clone()
            .merged(&self.per_frame_overrides(sample, info))
            .with_frame_index(sample.index);
        metadata.validate().map_err(|e| e.at_frame(sample.index))?;
        Ok(metadata)
    }
}
