//! Conversion orchestration module
//!
//! This module drives whole-clip conversions: the synchronous per-job
//! pipeline, the background converter with progress and cancellation, and a
//! sequential queue of clips.

mod converter;
mod job;
mod pipeline;
pub mod progress;
mod queue;
pub mod types;


pub use converter::{ConversionHandle, Converter};
pub use job::{ConversionJob, JobOutcome, JobState, JobSummary};
pub use pipeline::ProResRawToDngPipeline;
pub use progress::{CancellationToken, JobEvent};
pub use queue::{ConversionQueue, ConversionStatus, QueueItem};
pub use types::{ConversionConfig, ConversionConfigBuilder};
