use tracing::{debug, instrument};

use crate::dng_pipeline::asset::types::CompressedSample;
use crate::dng_pipeline::common::error::{ConversionError, Result};
use crate::dng_pipeline::decode::engine::DecodingEngine;
use crate::dng_pipeline::decode::types::{DecodedFrame, EngineFrame, PlaneLayout};
use crate::dng_pipeline::metadata::types::FrameMetadata;

/// Runs an engine and checks its output against the frame metadata.
pub struct FrameDecoder<E: DecodingEngine> {
    engine: E,
}

impl<E: DecodingEngine> FrameDecoder<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Decodes `sample` into a row-major mosaic described by `metadata`.
    ///
    /// Refinements reported by the engine are merged into the returned
    /// frame's metadata, which is validated again after the merge.
    #[instrument(skip_all, fields(frame = metadata.frame_index))]
    pub fn decode(&self, sample: &CompressedSample, metadata: FrameMetadata) -> Result<DecodedFrame> {
        let frame_index = metadata.frame_index;
        let fail = |cause: String| ConversionError::Decode { frame_index, cause };

        let frame = self
            .engine
            .decode(sample, &metadata)
            .map_err(|e| fail(e.to_string()))?;

        if frame.width != metadata.width || frame.height != metadata.height {
            return Err(fail(format!(
                "engine produced {}x{}, expected {}x{}",
                frame.width, frame.height, metadata.width, metadata.height
            )));
        }
        if frame.bits_per_sample != metadata.bits_per_sample {
            return Err(fail(format!(
                "engine produced {}-bit samples, expected {}-bit",
                frame.bits_per_sample, metadata.bits_per_sample
            )));
        }

        let refinements = frame.metadata.clone();
        let pixels = reshape(frame).map_err(fail)?;

        let max = metadata.max_sample_value();
        if let Some((i, value)) = pixels.iter().enumerate().find(|(_, v)| u32::from(**v) > max) {
            let width = metadata.width as usize;
            return Err(fail(format!(
                "sample {} at ({}, {}) exceeds the {}-bit range",
                value,
                i % width,
                i / width,
                metadata.bits_per_sample
            )));
        }

        let metadata = metadata.merged(&refinements);
        metadata.validate().map_err(|e| e.at_frame(frame_index))?;

        debug!(pixels = pixels.len(), "Decoded frame");
        Ok(DecodedFrame { metadata, pixels })
    }
}

/// Rearranges engine output into a tight row-major buffer of `width * height`.
fn reshape(frame: EngineFrame) -> std::result::Result<Vec<u16>, String> {
    let width = frame.width as usize;
    let height = frame.height as usize;
    let pixel_count = width * height;

    match frame.layout {
        PlaneLayout::RowMajor { stride } => {
            if stride < width {
                return Err(format!("row stride {} is narrower than width {}", stride, width));
            }
            if frame.samples.len() != stride * height {
                return Err(format!(
                    "engine returned {} samples, expected {} ({} rows of {})",
                    frame.samples.len(),
                    stride * height,
                    height,
                    stride
                ));
            }
            if stride == width {
                return Ok(frame.samples);
            }
            let mut pixels = Vec::with_capacity(pixel_count);
            for row in frame.samples.chunks_exact(stride) {
                pixels.extend_from_slice(&row[..width]);
            }
            Ok(pixels)
        }
        PlaneLayout::BayerPlanes => {
            if width % 2 != 0 || height % 2 != 0 {
                return Err(format!("Bayer planes need even dimensions, got {}x{}", width, height));
            }
            if frame.samples.len() != pixel_count {
                return Err(format!(
                    "engine returned {} samples, expected {}",
                    frame.samples.len(),
                    pixel_count
                ));
            }
            let plane_width = width / 2;
            let plane_len = pixel_count / 4;
            let mut pixels = vec![0u16; pixel_count];
            for (plane, samples) in frame.samples.chunks_exact(plane_len).enumerate() {
                let (dy, dx) = (plane / 2, plane % 2);
                for (i, &value) in samples.iter().enumerate() {
                    let (py, px) = (i / plane_width, i % plane_width);
                    pixels[(2 * py + dy) * width + 2 * px + dx] = value;
                }
            }
            Ok(pixels)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dng_pipeline::decode::engine::EngineError;
    use crate::dng_pipeline::metadata::types::PartialFrameMetadata;

    struct FixedEngine(std::result::Result<EngineFrame, EngineError>);

    impl DecodingEngine for FixedEngine {
        fn decode(&self, _: &CompressedSample, _: &FrameMetadata) -> std::result::Result<EngineFrame, EngineError> {
            self.0.clone()
        }
    }

    fn sample() -> CompressedSample {
        CompressedSample {
            index: 4,
            data: Vec::new(),
            decode_time: 0,
            duration: 1,
        }
    }

    fn metadata(width: u32, height: u32) -> FrameMetadata {
        FrameMetadata::new(width, height, 12).with_frame_index(4)
    }

    #[test]
    fn test_row_padding_is_dropped() {
        let frame = EngineFrame {
            layout: PlaneLayout::RowMajor { stride: 3 },
            ..EngineFrame::row_major(2, 2, 12, vec![1, 2, 99, 3, 4, 99])
        };
        let decoder = FrameDecoder::new(FixedEngine(Ok(frame)));
        let decoded = decoder.decode(&sample(), metadata(2, 2)).unwrap();
        assert_eq!(decoded.pixels, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_bayer_planes_are_interleaved() {
        // R plane, G1 plane, G2 plane, B plane, each 2x1 for a 4x2 mosaic.
        let frame = EngineFrame {
            layout: PlaneLayout::BayerPlanes,
            ..EngineFrame::row_major(4, 2, 12, vec![10, 11, 20, 21, 30, 31, 40, 41])
        };
        let decoder = FrameDecoder::new(FixedEngine(Ok(frame)));
        let decoded = decoder.decode(&sample(), metadata(4, 2)).unwrap();
        assert_eq!(decoded.row(0), &[10, 20, 11, 21]);
        assert_eq!(decoded.row(1), &[30, 40, 31, 41]);
    }

    #[test]
    fn test_dimension_mismatch_is_decode_error() {
        let frame = EngineFrame::row_major(2, 2, 12, vec![0; 4]);
        let decoder = FrameDecoder::new(FixedEngine(Ok(frame)));
        let err = decoder.decode(&sample(), metadata(4, 2)).unwrap_err();
        assert!(matches!(err, ConversionError::Decode { frame_index: 4, .. }));
    }

    #[test]
    fn test_bit_depth_mismatch_is_decode_error() {
        let frame = EngineFrame::row_major(2, 2, 14, vec![0; 4]);
        let decoder = FrameDecoder::new(FixedEngine(Ok(frame)));
        assert!(decoder.decode(&sample(), metadata(2, 2)).is_err());
    }

    #[test]
    fn test_short_buffer_is_decode_error() {
        let frame = EngineFrame::row_major(2, 2, 12, vec![0; 3]);
        let decoder = FrameDecoder::new(FixedEngine(Ok(frame)));
        let err = decoder.decode(&sample(), metadata(2, 2)).unwrap_err();
        assert_eq!(err.frame_index(), Some(4));
    }

    #[test]
    fn test_out_of_range_sample_is_rejected() {
        let frame = EngineFrame::row_major(2, 2, 12, vec![0, 0, 4096, 0]);
        let decoder = FrameDecoder::new(FixedEngine(Ok(frame)));
        let err = decoder.decode(&sample(), metadata(2, 2)).unwrap_err();
        assert!(err.to_string().contains("(0, 1)"));
    }

    #[test]
    fn test_engine_error_carries_frame_index() {
        let decoder = FrameDecoder::new(FixedEngine(Err(EngineError::new("bad slice header"))));
        let err = decoder.decode(&sample(), metadata(2, 2)).unwrap_err();
        match err {
            ConversionError::Decode { frame_index, cause } => {
                assert_eq!(frame_index, 4);
                assert_eq!(cause, "bad slice header");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_engine_refinements_are_merged_and_validated() {
        let mut frame = EngineFrame::row_major(2, 2, 12, vec![0; 4]);
        frame.metadata = PartialFrameMetadata {
            black_level: Some(256),
            iso_sensitivity: Some(800),
            ..PartialFrameMetadata::default()
        };
        let decoder = FrameDecoder::new(FixedEngine(Ok(frame.clone())));
        let decoded = decoder.decode(&sample(), metadata(2, 2)).unwrap();
        assert_eq!(decoded.metadata.black_level, 256);
        assert_eq!(decoded.metadata.iso_sensitivity, Some(800));

        frame.metadata.black_level = Some(5000);
        let decoder = FrameDecoder::new(FixedEngine(Ok(frame)));
        assert!(matches!(
            decoder.decode(&sample(), metadata(2, 2)),
            Err(ConversionError::FrameMetadata { frame_index: 4, .. })
        ));
    }
}
