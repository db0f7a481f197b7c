use std::path::Path;

use crate::dng_pipeline::asset::types::{AssetInfo, CompressedSample};
use crate::dng_pipeline::common::error::Result;

/// An opened asset. Holds its file handle until dropped.
pub trait AssetReader: Send {
    fn info(&self) -> &AssetInfo;

    fn frame_count(&self) -> u64 {
        self.info().frame_count
    }

    /// Reads the compressed sample for frame `index` (`0..frame_count`).
    fn read_sample(&mut self, index: u64) -> Result<CompressedSample>;
}

pub trait AssetOpener: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn AssetReader>>;
}
