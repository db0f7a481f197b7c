//! Frame decoding module
//!
//! This module turns compressed samples into validated, row-major sensor
//! mosaics. The bitstream decoder itself sits behind [`DecodingEngine`].

mod engine;
mod frame_decoder;
mod packed_engine;
pub mod types;

pub use engine::{DecodingEngine, EngineError};
pub use frame_decoder::FrameDecoder;
pub use packed_engine::PackedRawEngine;
pub use types::{DecodedFrame, EngineFrame, PlaneLayout};
