use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use crate::dng_pipeline::asset::mov::{self, Movie, SampleLocation, Track, VideoSampleEntry};
use crate::dng_pipeline::asset::reader::{AssetOpener, AssetReader};
use crate::dng_pipeline::asset::types::{AssetInfo, CompressedSample, TimecodeTrack};
use crate::dng_pipeline::common::error::{ConversionError, Result};
use crate::dng_pipeline::metadata::Orientation;

/// Opens QuickTime (.mov) files holding a ProRes RAW video track.
#[derive(Debug, Clone, Copy, Default)]
pub struct MovAssetOpener;

impl MovAssetOpener {
    pub fn new() -> Self {
        Self
    }
}

impl AssetOpener for MovAssetOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn AssetReader>> {
        Ok(Box::new(MovAssetReader::open(path)?))
    }
}

/// Reads compressed samples from a parsed QuickTime file.
pub struct MovAssetReader {
    path: PathBuf,
    file: BufReader<File>,
    info: AssetInfo,
    samples: Vec<SampleLocation>,
}

impl MovAssetReader {
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn open(path: &Path) -> Result<Self> {
        let open_error = |reason: String| ConversionError::AssetOpen {
            path: path.to_path_buf(),
            reason,
        };

        let file = File::open(path).map_err(|e| open_error(e.to_string()))?;
        let mut file = BufReader::new(file);
        let movie = mov::parse_movie(&mut file).map_err(|e| open_error(e.to_string()))?;

        let track = movie
            .video_track()
            .ok_or_else(|| open_error("no video track".to_string()))?;
        let entry = track
            .video_entry
            .ok_or_else(|| open_error("video track has no sample description".to_string()))?;
        let info = describe(&movie, track, entry);

        if !info.codec.is_prores_raw() {
            warn!(codec = %info.codec, "Video track is not ProRes RAW");
        }
        info!(
            codec = %info.codec,
            width = info.width,
            height = info.height,
            frames = info.frame_count,
            "Opened asset"
        );

        Ok(Self {
            path: path.to_path_buf(),
            file,
            samples: track.samples.clone(),
            info,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn describe(movie: &Movie, track: &Track, entry: VideoSampleEntry) -> AssetInfo {
    let m = track.matrix;

    let timecode = movie.timecode_track().and_then(|tc| {
        let entry = tc.timecode_entry?;
        let start = tc.timecode_start?;
        let frames_per_second = if entry.frames_per_second > 0 {
            u32::from(entry.frames_per_second)
        } else if entry.frame_duration > 0 {
            (f64::from(entry.timescale) / f64::from(entry.frame_duration)).round() as u32
        } else {
            0
        };
        Some(TimecodeTrack {
            start_frame: u64::from(start),
            frames_per_second,
            drop_frame: entry.drop_frame(),
        })
    });

    AssetInfo {
        codec: entry.codec,
        width: u32::from(entry.width),
        height: u32::from(entry.height),
        depth: (1..=16).contains(&entry.depth).then_some(entry.depth),
        frame_count: track.samples.len() as u64,
        timescale: track.timescale,
        frame_duration: track.samples.first().map(|s| s.duration).filter(|d| *d > 0),
        orientation: Orientation::from_display_matrix(m[0], m[1], m[3], m[4]),
        timecode,
        metadata: movie.metadata.clone(),
    }
}

impl AssetReader for MovAssetReader {
    fn info(&self) -> &AssetInfo {
        &self.info
    }

    fn read_sample(&mut self, index: u64) -> Result<CompressedSample> {
        let location = usize::try_from(index)
            .ok()
            .and_then(|i| self.samples.get(i))
            .copied()
            .ok_or(ConversionError::FrameIndex {
                index,
                frame_count: self.info.frame_count,
            })?;

        let decode_error = |e: std::io::Error| ConversionError::Decode {
            frame_index: index,
            cause: format!("reading sample at offset {}: {}", location.offset, e),
        };

        self.file
            .seek(SeekFrom::Start(location.offset))
            .map_err(decode_error)?;
        let mut data = vec![0u8; location.size as usize];
        self.file.read_exact(&mut data).map_err(decode_error)?;

        debug!(index, size = location.size, "Read sample");
        Ok(CompressedSample {
            index,
            data,
            decode_time: location.decode_time,
            duration: location.duration,
        })
    }
}
