use std::path::Path;

use tracing::{debug, debug_span, error, info, instrument, warn};

use crate::dng_pipeline::{
    asset::{AssetOpener, MovAssetOpener},
    common::error::Result,
    common::timing::Timer,
    conversions::job::{ConversionJob, JobOutcome, JobState, JobSummary},
    conversions::progress::{CancellationToken, FrameProgress},
    conversions::types::ConversionConfig,
    decode::{DecodingEngine, FrameDecoder, PackedRawEngine},
    dng::{DngWriter, OutputNaming, StandardDngWriter},
    metadata::MetadataExtractor,
};

/// Converts one clip into a DNG sequence on the calling thread.
pub struct ProResRawToDngPipeline<O: AssetOpener, E: DecodingEngine, W: DngWriter> {
    opener: O,
    decoder: FrameDecoder<E>,
    writer: W,
    extractor: MetadataExtractor,
    config: ConversionConfig,
}

impl ProResRawToDngPipeline<MovAssetOpener, PackedRawEngine, StandardDngWriter> {
    pub fn new(config: ConversionConfig) -> Self {
        Self::with_custom(MovAssetOpener, PackedRawEngine, config.dng_writer(), config)
    }
}

/// How the frame loop ended when it did not fail.
enum Stopped {
    Finished,
    Cancelled,
}

impl<O: AssetOpener, E: DecodingEngine, W: DngWriter> ProResRawToDngPipeline<O, E, W> {
    pub fn with_custom(opener: O, engine: E, writer: W, config: ConversionConfig) -> Self {
        Self {
            opener,
            decoder: FrameDecoder::new(engine),
            writer,
            extractor: config.metadata_extractor(),
            config,
        }
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// Converts every frame of `input` into `output_dir`.
    ///
    /// `on_progress` receives the fraction of frames written after each
    /// frame; the last value of a completed job is exactly 1.0. `cancel` is
    /// checked before each frame is decoded and again before it is written.
    #[instrument(skip_all, fields(input = %input.display(), output = %output_dir.display()))]
    pub fn run(
        &self,
        input: &Path,
        output_dir: &Path,
        cancel: &CancellationToken,
        on_progress: &mut dyn FnMut(f64),
    ) -> JobOutcome {
        let mut job = ConversionJob::new(input, output_dir);
        let mut summary = JobSummary::default();

        if cancel.is_cancelled() {
            warn!("Conversion cancelled before start");
            job.transition(JobState::Cancelled);
            return JobOutcome::Cancelled(summary);
        }

        job.transition(JobState::Running);
        info!("Starting ProRes RAW to DNG conversion");

        let result = self.convert_frames(&mut job, &mut summary, cancel, on_progress);
        summary.frame_count = job.frame_count();
        summary.frames_written = job.frames_written();

        match result {
            Ok(Stopped::Finished) => {
                job.transition(JobState::Completed);
                info!(
                    frames = summary.frames_written,
                    elapsed_ms = summary.timings.total_duration().as_secs_f64() * 1000.0,
                    "Conversion complete"
                );
                debug!("Timings:\n{}", summary.timings.summary());
                JobOutcome::Completed(summary)
            }
            Ok(Stopped::Cancelled) => {
                job.transition(JobState::Cancelled);
                warn!(
                    written = summary.frames_written,
                    total = summary.frame_count,
                    "Conversion cancelled"
                );
                JobOutcome::Cancelled(summary)
            }
            Err(error) => {
                job.transition(JobState::Failed);
                error!(
                    written = summary.frames_written,
                    frame = ?error.frame_index(),
                    "Conversion failed: {}",
                    error
                );
                JobOutcome::Failed { error, summary }
            }
        }
    }

    fn convert_frames(
        &self,
        job: &mut ConversionJob,
        summary: &mut JobSummary,
        cancel: &CancellationToken,
        on_progress: &mut dyn FnMut(f64),
    ) -> Result<Stopped> {
        let timer = Timer::start("open_asset");
        let mut reader = self.opener.open(job.input_path())?;
        summary.timings.record(timer);

        let info = reader.info().clone();
        let defaults = self.extractor.asset_defaults(&info)?;
        let frame_count = reader.frame_count();
        job.set_frame_count(frame_count);

        std::fs::create_dir_all(job.output_dir())?;
        let naming = OutputNaming::for_input(
            job.input_path(),
            self.config.file_prefix.as_deref(),
            self.config.index_width,
            frame_count,
        );
        info!(
            frames = frame_count,
            width = defaults.width,
            height = defaults.height,
            bits = defaults.bits_per_sample,
            prefix = naming.prefix(),
            "Asset ready"
        );

        let mut progress = FrameProgress::new(frame_count);
        for index in 0..frame_count {
            if cancel.is_cancelled() {
                return Ok(Stopped::Cancelled);
            }
            let _span = debug_span!("frame", index).entered();

            let timer = Timer::start("read_sample");
            let sample = reader.read_sample(index)?;
            summary.timings.record(timer);

            let metadata = self.extractor.frame_metadata(&defaults, &sample, &info)?;

            let timer = Timer::start("decode");
            let frame = self.decoder.decode(&sample, metadata)?;
            summary.timings.record(timer);

            if cancel.is_cancelled() {
                debug!("Dropping decoded frame after cancellation");
                return Ok(Stopped::Cancelled);
            }

            let path = naming.path(job.output_dir(), index);
            let timer = Timer::start("write_dng");
            self.writer.write(frame, &path)?;
            summary.timings.record(timer);

            job.frame_written();
            summary.output_files.push(path);
            on_progress(progress.advance());
        }

        Ok(Stopped::Finished)
    }
}
