//! Source asset reading module
//!
//! This module opens RAW video containers and exposes their compressed
//! frame samples together with the container-level metadata.

mod mov;
mod mov_reader;
mod reader;
pub mod types;

#[cfg(test)]
pub(crate) mod test_fixtures;

pub use mov_reader::{MovAssetOpener, MovAssetReader};
pub use reader::{AssetOpener, AssetReader};
pub use types::{AssetInfo, CompressedSample, FourCc, TimecodeTrack};
