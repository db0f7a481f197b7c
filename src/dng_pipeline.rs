//! ProRes RAW to DNG pipeline module
//!
//! This module converts ProRes RAW clips into CinemaDNG sequences, with
//! separate modules for asset reading, metadata extraction, frame decoding,
//! DNG writing, and conversion orchestration.

pub mod asset;
pub mod common;
pub mod conversions;
pub mod decode;
pub mod dng;
pub mod metadata;

pub use common::{
    ConversionError,
    Result,
};

pub use asset::{
    AssetInfo,
    AssetOpener,
    AssetReader,
    MovAssetOpener,
};

pub use decode::{
    DecodingEngine,
    FrameDecoder,
    PackedRawEngine,
};

pub use dng::{
    DngWriter,
    SampleLayout,
    StandardDngWriter,
};

pub use metadata::{
    BayerPattern,
    FrameMetadata,
    MetadataExtractor,
};

pub use conversions::{
    CancellationToken,
    ConversionConfig,
    ConversionConfigBuilder,
    ConversionHandle,
    ConversionQueue,
    ConversionStatus,
    Converter,
    JobOutcome,
    ProResRawToDngPipeline,
};
