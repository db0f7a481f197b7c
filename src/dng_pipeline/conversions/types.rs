//! DNG conversion configuration types

use crate::dng_pipeline::dng::{DEFAULT_SOFTWARE, SampleLayout, StandardDngWriter};
use crate::dng_pipeline::metadata::{BayerPattern, MetadataExtractor};

/// Configuration for ProRes RAW to DNG conversion
#[derive(Debug, Clone)]
pub struct ConversionConfig {
    /// How samples are stored in the DNG strip
    pub sample_layout: SampleLayout,
    /// CFA layout of the sensor, used when the stream does not state one
    pub bayer_pattern: BayerPattern,
    /// Sensor bit depth to assume instead of the container's declared depth
    pub assume_bits_per_sample: Option<u16>,
    /// Largest accepted frame width or height
    pub max_dimension: u32,
    /// Whether to enforce `max_dimension` before conversion
    pub validate_dimensions: bool,
    /// Camera model written when the asset carries none
    pub camera_model: Option<String>,
    /// Value of the DNG Software tag
    pub software: String,
    /// Output file prefix; defaults to the input file stem
    pub file_prefix: Option<String>,
    /// Minimum number of digits in the frame index of output names
    pub index_width: usize,
    /// Whether existing output files are replaced
    pub overwrite: bool,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            sample_layout: SampleLayout::Packed,
            bayer_pattern: BayerPattern::Rggb,
            assume_bits_per_sample: None,
            max_dimension: 16_384,
            validate_dimensions: true,
            camera_model: None,
            software: DEFAULT_SOFTWARE.to_string(),
            file_prefix: None,
            index_width: 6,
            overwrite: true,
        }
    }
}

impl ConversionConfig {
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder::default()
    }

    pub fn metadata_extractor(&self) -> MetadataExtractor {
        MetadataExtractor::new()
            .with_bayer_pattern(self.bayer_pattern)
            .with_assumed_bits_per_sample(self.assume_bits_per_sample)
            .with_max_dimension(self.max_dimension, self.validate_dimensions)
            .with_camera_model(self.camera_model.clone())
    }

    pub fn dng_writer(&self) -> StandardDngWriter {
        StandardDngWriter::new()
            .with_layout(self.sample_layout)
            .with_software(self.software.clone())
            .with_overwrite(self.overwrite)
    }
}

/// Builder for ConversionConfig
#[derive(Default)]
pub struct ConversionConfigBuilder {
    sample_layout: Option<SampleLayout>,
    bayer_pattern: Option<BayerPattern>,
    assume_bits_per_sample: Option<Option<u16>>,
    max_dimension: Option<u32>,
    validate_dimensions: Option<bool>,
    camera_model: Option<Option<String>>,
    software: Option<String>,
    file_prefix: Option<Option<String>>,
    index_width: Option<usize>,
    overwrite: Option<bool>,
}

impl ConversionConfigBuilder {
    pub fn sample_layout(mut self, layout: SampleLayout) -> Self {
        self.sample_layout = Some(layout);
        self
    }

    pub fn bayer_pattern(mut self, pattern: BayerPattern) -> Self {
        self.bayer_pattern = Some(pattern);
        self
    }

    pub fn assume_bits_per_sample(mut self, bits: Option<u16>) -> Self {
        self.assume_bits_per_sample = Some(bits);
        self
    }

    pub fn max_dimension(mut self, max: u32) -> Self {
        self.max_dimension = Some(max);
        self
    }

    pub fn validate_dimensions(mut self, validate: bool) -> Self {
        self.validate_dimensions = Some(validate);
        self
    }

    pub fn camera_model(mut self, model: Option<String>) -> Self {
        self.camera_model = Some(model);
        self
    }

    pub fn software(mut self, software: impl Into<String>) -> Self {
        self.software = Some(software.into());
        self
    }

    pub fn file_prefix(mut self, prefix: Option<String>) -> Self {
        self.file_prefix = Some(prefix);
        self
    }

    pub fn index_width(mut self, width: usize) -> Self {
        self.index_width = Some(width);
        self
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = Some(overwrite);
        self
    }

    pub fn build(self) -> ConversionConfig {
        let default = ConversionConfig::default();
        ConversionConfig {
            sample_layout: self.sample_layout.unwrap_or(default.sample_layout),
            bayer_pattern: self.bayer_pattern.unwrap_or(default.bayer_pattern),
            assume_bits_per_sample: self.assume_bits_per_sample.unwrap_or(default.assume_bits_per_sample),
            max_dimension: self.max_dimension.unwrap_or(default.max_dimension),
            validate_dimensions: self.validate_dimensions.unwrap_or(default.validate_dimensions),
            camera_model: self.camera_model.unwrap_or(default.camera_model),
            software: self.software.unwrap_or(default.software),
            file_prefix: self.file_prefix.unwrap_or(default.file_prefix),
            index_width: self.index_width.unwrap_or(default.index_width),
            overwrite: self.overwrite.unwrap_or(default.overwrite),
        }
    }
}
