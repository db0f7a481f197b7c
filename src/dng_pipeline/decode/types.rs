//! Decoded frame types

use crate::dng_pipeline::metadata::types::{FrameMetadata, PartialFrameMetadata};

/// How an engine arranged the samples it returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneLayout {
    /// One plane, rows of `stride` samples of which the first `width` are image data.
    RowMajor { stride: usize },
    /// Four half-resolution planes, one per CFA position, in pattern order
    /// (top-left, top-right, bottom-left, bottom-right).
    BayerPlanes,
}

/// Raw output of a decoding engine, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineFrame {
    pub width: u32,
    pub height: u32,
    pub bits_per_sample: u16,
    pub layout: PlaneLayout,
    pub samples: Vec<u16>,
    /// Refinements the bitstream carries (levels, white balance, ISO).
    pub metadata: PartialFrameMetadata,
}

impl EngineFrame {
    /// Tightly packed row-major frame without metadata refinements.
    pub fn row_major(width: u32, height: u32, bits_per_sample: u16, samples: Vec<u16>) -> Self {
        Self {
            width,
            height,
            bits_per_sample,
            layout: PlaneLayout::RowMajor { stride: width as usize },
            samples,
            metadata: PartialFrameMetadata::default(),
        }
    }
}

/// A validated sensor mosaic ready for encoding.
///
/// `pixels` is row-major with exactly `width * height` samples, each no
/// greater than `2^bits_per_sample - 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    pub metadata: FrameMetadata,
    pub pixels: Vec<u16>,
}

impl DecodedFrame {
    pub fn width(&self) -> u32 {
        self.metadata.width
    }

    pub fn height(&self) -> u32 {
        self.metadata.height
    }

    pub fn frame_index(&self) -> u64 {
        self.metadata.frame_index
    }

    pub fn row(&self, y: usize) -> &[u16] {
        let width = self.metadata.width as usize;
        &self.pixels[y * width..(y + 1) * width]
    }
}
