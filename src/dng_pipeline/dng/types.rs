//! DNG output types

use std::fmt;
use std::str::FromStr;

/// How sensor samples are stored in the DNG strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleLayout {
    /// BitsPerSample equals the sensor depth; samples are MSB-first packed,
    /// each row padded to a whole byte.
    #[default]
    Packed,
    /// Every sample stored as a 16-bit word, values unchanged.
    Widened16,
}

impl SampleLayout {
    /// BitsPerSample written for a sensor of `sensor_bits`.
    pub fn stored_bits(self, sensor_bits: u16) -> u16 {
        match self {
            SampleLayout::Packed => sensor_bits,
            SampleLayout::Widened16 => 16,
        }
    }
}

impl FromStr for SampleLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "packed" => Ok(SampleLayout::Packed),
            "widened16" | "widened" | "16" => Ok(SampleLayout::Widened16),
            _ => Err(format!("unknown sample layout '{}'", s)),
        }
    }
}

impl fmt::Display for SampleLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleLayout::Packed => write!(f, "packed"),
            SampleLayout::Widened16 => write!(f, "widened16"),
        }
    }
}
