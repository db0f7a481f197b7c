use thiserror::Error;

use crate::dng_pipeline::asset::types::CompressedSample;
use crate::dng_pipeline::decode::types::EngineFrame;
use crate::dng_pipeline::metadata::types::FrameMetadata;

/// Failure reported by a decoding engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct EngineError(pub String);

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Bitstream decoder for one compressed frame.
///
/// `expected` carries the asset-level description of the frame so engines
/// that need the dimensions or bit depth up front do not have to re-derive
/// them. Engines must be safe to call from the conversion worker thread.
pub trait DecodingEngine: Send + Sync {
    fn decode(&self, sample: &CompressedSample, expected: &FrameMetadata) -> Result<EngineFrame, EngineError>;
}
