//! Asset and sample types

use std::collections::BTreeMap;
use std::fmt;

use crate::dng_pipeline::metadata::{FrameRate, Orientation};

/// Metadata key for the camera manufacturer.
pub const KEY_MAKE: &str = "com.apple.quicktime.make";
/// Metadata key for the camera model.
pub const KEY_MODEL: &str = "com.apple.quicktime.model";
/// Metadata key for the recording software or firmware.
pub const KEY_SOFTWARE: &str = "com.apple.quicktime.software";

/// Four-character code used for atom types and codec identifiers.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCc(pub [u8; 4]);

impl FourCc {
    pub const PRORES_RAW: FourCc = FourCc(*b"aprn");
    pub const PRORES_RAW_HQ: FourCc = FourCc(*b"aprh");

    pub const fn new(code: &[u8; 4]) -> Self {
        Self(*code)
    }

    pub fn from_u32(value: u32) -> Self {
        Self(value.to_be_bytes())
    }

    pub fn is_prores_raw(&self) -> bool {
        *self == Self::PRORES_RAW || *self == Self::PRORES_RAW_HQ
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            let c = if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' };
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

impl fmt::Debug for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCc({})", self)
    }
}

/// Start point of the asset's timecode track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimecodeTrack {
    /// Frame counter of the first video frame.
    pub start_frame: u64,
    /// Nominal whole frames per second of the timecode.
    pub frames_per_second: u32,
    pub drop_frame: bool,
}

/// Container-level description of the selected video track.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetInfo {
    pub codec: FourCc,
    pub width: u32,
    pub height: u32,
    /// Sample depth declared by the container, when meaningful as a sensor depth.
    pub depth: Option<u16>,
    pub frame_count: u64,
    pub timescale: u32,
    /// Duration of the first sample in `timescale` units.
    pub frame_duration: Option<u32>,
    pub orientation: Orientation,
    pub timecode: Option<TimecodeTrack>,
    /// String metadata, keyed by reverse-DNS QuickTime keys.
    pub metadata: BTreeMap<String, String>,
}

impl AssetInfo {
    pub fn frame_rate(&self) -> Option<FrameRate> {
        match self.frame_duration {
            Some(duration) if duration > 0 && self.timescale > 0 => {
                Some(FrameRate::new(self.timescale, duration))
            }
            _ => None,
        }
    }

    pub fn make(&self) -> Option<&str> {
        self.metadata.get(KEY_MAKE).map(String::as_str)
    }

    pub fn model(&self) -> Option<&str> {
        self.metadata.get(KEY_MODEL).map(String::as_str)
    }
}

/// One compressed frame as stored in the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedSample {
    pub index: u64,
    pub data: Vec<u8>,
    /// Decode timestamp in track timescale units.
    pub decode_time: u64,
    pub duration: u32,
}
