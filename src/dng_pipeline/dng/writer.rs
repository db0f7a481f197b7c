use std::path::Path;

use crate::dng_pipeline::common::error::Result;
use crate::dng_pipeline::decode::types::DecodedFrame;

/// Writes one decoded frame as a DNG file.
///
/// A failed write must leave no file at `output`.
pub trait DngWriter: Send + Sync {
    fn write(&self, frame: DecodedFrame, output: &Path) -> Result<()>;
}
