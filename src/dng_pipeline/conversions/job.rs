use std::path::{Path, PathBuf};

use crate::dng_pipeline::common::error::ConversionError;
use crate::dng_pipeline::common::timing::PipelineTimings;

/// Lifecycle of a conversion job. Completed, Failed and Cancelled are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed | JobState::Cancelled)
    }

    fn can_become(self, next: JobState) -> bool {
        match (self, next) {
            (JobState::Idle, JobState::Running) => true,
            // Cancelled before the first frame was even looked at.
            (JobState::Idle, JobState::Cancelled) => true,
            (JobState::Running, next) => next.is_terminal(),
            _ => false,
        }
    }
}

/// One conversion request and its progress counters.
#[derive(Debug, Clone)]
pub struct ConversionJob {
    input_path: PathBuf,
    output_dir: PathBuf,
    state: JobState,
    frame_count: u64,
    frames_written: u64,
}

impl ConversionJob {
    pub fn new(input_path: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            output_dir: output_dir.into(),
            state: JobState::Idle,
            frame_count: 0,
            frames_written: 0,
        }
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub(crate) fn set_frame_count(&mut self, frame_count: u64) {
        self.frame_count = frame_count;
    }

    pub(crate) fn frame_written(&mut self) {
        debug_assert!(self.frames_written < self.frame_count);
        self.frames_written += 1;
    }

    /// Moves the job to `next`.
    ///
    /// # Panics
    ///
    /// On a transition the state machine does not allow; callers own the
    /// job exclusively, so this signals a bug in the caller.
    pub(crate) fn transition(&mut self, next: JobState) {
        assert!(
            self.state.can_become(next),
            "illegal job transition {:?} -> {:?}",
            self.state,
            next
        );
        self.state = next;
    }
}

/// What a finished job produced.
#[derive(Debug, Clone, Default)]
pub struct JobSummary {
    pub frame_count: u64,
    pub frames_written: u64,
    /// Paths of the DNG files written, in frame order.
    pub output_files: Vec<PathBuf>,
    pub timings: PipelineTimings,
}

/// Terminal result of a conversion job.
#[derive(Debug)]
pub enum JobOutcome {
    Completed(JobSummary),
    Cancelled(JobSummary),
    Failed {
        error: ConversionError,
        summary: JobSummary,
    },
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Completed(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, JobOutcome::Cancelled(_))
    }

    pub fn error(&self) -> Option<&ConversionError> {
        match self {
            JobOutcome::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn summary(&self) -> &JobSummary {
        match self {
            JobOutcome::Completed(summary) | JobOutcome::Cancelled(summary) => summary,
            JobOutcome::Failed { summary, .. } => summary,
        }
    }

    pub fn state(&self) -> JobState {
        match self {
            JobOutcome::Completed(_) => JobState::Completed,
            JobOutcome::Cancelled(_) => JobState::Cancelled,
            JobOutcome::Failed { .. } => JobState::Failed,
        }
    }

    pub(crate) fn worker_lost(reason: impl Into<String>) -> Self {
        JobOutcome::Failed {
            error: ConversionError::Worker(reason.into()),
            summary: JobSummary::default(),
        }
    }
}
