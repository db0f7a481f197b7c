//! SMPTE timecode arithmetic.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timecode {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
    pub frames: u8,
    pub drop_frame: bool,
}

/// Frames skipped per minute in drop-frame counting, or `None` when the
/// rate has no drop-frame form.
fn dropped_per_minute(fps: u32, drop_frame: bool) -> Option<u64> {
    (drop_frame && fps > 0 && fps % 30 == 0).then(|| u64::from(fps / 15))
}

impl Timecode {
    pub fn new(hours: u8, minutes: u8, seconds: u8, frames: u8, drop_frame: bool) -> Self {
        Self { hours, minutes, seconds, frames, drop_frame }
    }

    /// Converts a frame counter at `fps` nominal frames per second.
    ///
    /// Hours wrap at 24. `drop_frame` is honoured only for multiples of 30.
    pub fn from_frame_number(frame_number: u64, fps: u32, drop_frame: bool) -> Self {
        let fps = fps.max(1);
        let nominal = u64::from(fps);
        let mut frame = frame_number;

        let drop = dropped_per_minute(fps, drop_frame);
        if let Some(drop) = drop {
            let per_ten_minutes = nominal * 600 - drop * 9;
            let per_minute = nominal * 60 - drop;
            let tens = frame / per_ten_minutes;
            let rem = frame % per_ten_minutes;
            frame += drop * 9 * tens;
            if rem > drop {
                frame += drop * ((rem - drop) / per_minute);
            }
        }

        let total_seconds = frame / nominal;
        Self {
            hours: ((total_seconds / 3600) % 24) as u8,
            minutes: ((total_seconds / 60) % 60) as u8,
            seconds: (total_seconds % 60) as u8,
            frames: (frame % nominal) as u8,
            drop_frame: drop.is_some(),
        }
    }

    pub fn to_frame_number(&self, fps: u32) -> u64 {
        let nominal = u64::from(fps.max(1));
        let total_minutes = 60 * u64::from(self.hours) + u64::from(self.minutes);
        let frames = (total_minutes * 60 + u64::from(self.seconds)) * nominal + u64::from(self.frames);
        match dropped_per_minute(fps, self.drop_frame) {
            Some(drop) => frames - drop * (total_minutes - total_minutes / 10),
            None => frames,
        }
    }

    /// Timecode `frames` later, in the same counting mode.
    pub fn offset(&self, frames: u64, fps: u32) -> Self {
        Self::from_frame_number(self.to_frame_number(fps) + frames, fps, self.drop_frame)
    }

    /// SMPTE 12M time address in the 8-byte form of the DNG TimeCodes tag.
    ///
    /// Fields are BCD; bit 6 of the first byte is the drop-frame flag. The
    /// user-bit bytes are left zero.
    pub fn smpte_bytes(&self) -> [u8; 8] {
        fn bcd(value: u8) -> u8 {
            ((value / 10) << 4) | (value % 10)
        }
        let mut frames = bcd(self.frames) & 0x3F;
        if self.drop_frame {
            frames |= 0x40;
        }
        [
            frames,
            bcd(self.seconds) & 0x7F,
            bcd(self.minutes) & 0x7F,
            bcd(self.hours) & 0x3F,
            0,
            0,
            0,
            0,
        ]
    }
}

impl fmt::Display for Timecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sep = if self.drop_frame { ';' } else { ':' };
        write!(
            f,
            "{:02}:{:02}:{:02}{}{:02}",
            self.hours, self.minutes, self.seconds, sep, self.frames
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_drop_frame_counting() {
        assert_eq!(Timecode::from_frame_number(0, 24, false).to_string(), "00:00:00:00");
        assert_eq!(Timecode::from_frame_number(86_400, 24, false).to_string(), "01:00:00:00");
        assert_eq!(Timecode::from_frame_number(25, 25, false).to_string(), "00:00:01:00");
    }

    #[test]
    fn test_drop_frame_skips_first_two_frames_of_minute() {
        assert_eq!(Timecode::from_frame_number(1799, 30, true).to_string(), "00:00:59;29");
        assert_eq!(Timecode::from_frame_number(1800, 30, true).to_string(), "00:01:00;02");
        assert_eq!(Timecode::from_frame_number(17_982, 30, true).to_string(), "00:10:00;00");
    }

    #[test]
    fn test_drop_frame_round_trips() {
        for frame in [0u64, 1, 1799, 1800, 3597, 17_981, 17_982, 107_892, 1_000_000] {
            let tc = Timecode::from_frame_number(frame, 30, true);
            assert_eq!(tc.to_frame_number(30), frame, "frame {frame} -> {tc}");
        }
    }

    #[test]
    fn test_drop_frame_ignored_for_non_ntsc_rates() {
        let tc = Timecode::from_frame_number(1800, 25, true);
        assert!(!tc.drop_frame);
        assert_eq!(tc.to_string(), "00:01:12:00");
    }

    #[test]
    fn test_offset() {
        let start = Timecode::new(1, 0, 0, 0, false);
        assert_eq!(start.offset(30, 24).to_string(), "01:00:01:06");
    }

    #[test]
    fn test_smpte_bytes_are_bcd() {
        let tc = Timecode::new(12, 34, 56, 23, false);
        assert_eq!(tc.smpte_bytes(), [0x23, 0x56, 0x34, 0x12, 0, 0, 0, 0]);
        let df = Timecode::new(0, 1, 0, 2, true);
        assert_eq!(df.smpte_bytes()[0], 0x42);
    }
}
