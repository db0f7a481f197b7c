//! Camera and sensor metadata module
//!
//! This module derives per-frame metadata from container information and
//! merges it with per-frame refinements.

mod extractor;
pub mod timecode;
pub mod types;

pub use extractor::MetadataExtractor;
pub use timecode::Timecode;
pub use types::{
    BayerPattern, FrameMetadata, FrameRate, ILLUMINANT_D65, Orientation, PartialFrameMetadata,
};
