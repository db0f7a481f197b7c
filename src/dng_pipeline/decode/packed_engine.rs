//! Reference engine for uncompressed, bit-packed sensor payloads.

use tracing::trace;

use crate::dng_pipeline::asset::types::CompressedSample;
use crate::dng_pipeline::common::bitpack::{packed_row_bytes, unpack_msb};
use crate::dng_pipeline::decode::engine::{DecodingEngine, EngineError};
use crate::dng_pipeline::decode::types::EngineFrame;
use crate::dng_pipeline::metadata::types::FrameMetadata;

/// Decodes samples that hold the sensor mosaic as MSB-first packed values,
/// `bits_per_sample` bits each, every row starting on a byte boundary.
///
/// Real ProRes RAW bitstreams are entropy coded and need an external engine;
/// this one covers uncompressed captures and test material.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackedRawEngine;

impl PackedRawEngine {
    pub fn new() -> Self {
        Self
    }
}

impl DecodingEngine for PackedRawEngine {
    /// Unpacks one frame.
    ///
    /// # Arguments
    ///
    /// * `sample` - Compressed sample whose payload is exactly
    ///   `height * ceil(width * bits / 8)` bytes
    /// * `expected` - Asset-level frame description providing width, height and bit depth
    ///
    /// # Returns
    ///
    /// * `Ok(EngineFrame)` - Row-major frame with no metadata refinements
    /// * `Err(EngineError)` - The payload size does not match the expected geometry
    fn decode(&self, sample: &CompressedSample, expected: &FrameMetadata) -> Result<EngineFrame, EngineError> {
        let width = expected.width as usize;
        let height = expected.height as usize;
        let bits = expected.bits_per_sample;
        if !(1..=16).contains(&bits) {
            return Err(EngineError::new(format!("cannot unpack {}-bit samples", bits)));
        }

        let expected_len = packed_row_bytes(width, bits) * height;
        if sample.data.len() != expected_len {
            return Err(EngineError::new(format!(
                "payload is {} bytes, expected {} for {}x{} at {} bits",
                sample.data.len(),
                expected_len,
                width,
                height,
                bits
            )));
        }

        trace!(index = sample.index, bytes = sample.data.len(), "Unpacking sample");
        let samples = unpack_msb(&sample.data, bits, width);
        Ok(EngineFrame::row_major(expected.width, expected.height, bits, samples))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dng_pipeline::common::bitpack::pack_msb;

    fn sample(data: Vec<u8>) -> CompressedSample {
        CompressedSample {
            index: 0,
            data,
            decode_time: 0,
            duration: 1,
        }
    }

    #[test]
    fn test_unpacks_twelve_bit_frame() {
        let pixels: Vec<u16> = (0..12).map(|i| i * 300).collect();
        let expected = FrameMetadata::new(4, 3, 12);
        let frame = PackedRawEngine
            .decode(&sample(pack_msb(&pixels, 12, 4)), &expected)
            .unwrap();
        assert_eq!(frame.samples, pixels);
        assert_eq!((frame.width, frame.height, frame.bits_per_sample), (4, 3, 12));
    }

    #[test]
    fn test_rejects_wrong_payload_size() {
        let expected = FrameMetadata::new(4, 3, 12);
        let err = PackedRawEngine.decode(&sample(vec![0u8; 17]), &expected).unwrap_err();
        assert!(err.0.contains("expected 18"));
    }
}
