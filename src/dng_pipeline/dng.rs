//! DNG writing module
//!
//! This module encodes decoded sensor mosaics as single-IFD CinemaDNG
//! frames and names the files of a sequence.

mod naming;
pub mod reader;
mod standard_dng_writer;
pub mod tags;
pub mod types;
mod writer;

pub use naming::OutputNaming;
pub use reader::DngFile;
pub use standard_dng_writer::{DEFAULT_SOFTWARE, StandardDngWriter};
pub use tags::{DngTagSet, TagValue};
pub use types::SampleLayout;
pub use writer::DngWriter;
