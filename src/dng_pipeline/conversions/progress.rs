//! Progress reporting and cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::dng_pipeline::conversions::job::JobOutcome;

/// Cooperative cancellation flag shared between a job and its controller.
///
/// Clones observe the same flag. The pipeline checks it at frame boundaries
/// only; a frame that is being decoded or written is never interrupted.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Message sent from the conversion worker to the callback dispatcher.
#[derive(Debug)]
pub enum JobEvent {
    Progress(f64),
    Finished(JobOutcome),
}

/// Fraction of frames written, reported once per frame.
#[derive(Debug, Clone)]
pub(crate) struct FrameProgress {
    total: u64,
    written: u64,
}

impl FrameProgress {
    pub(crate) fn new(total: u64) -> Self {
        Self { total, written: 0 }
    }

    /// Records one written frame and returns the new fraction in `(0, 1]`.
    pub(crate) fn advance(&mut self) -> f64 {
        self.written = (self.written + 1).min(self.total);
        if self.written == self.total {
            1.0
        } else {
            self.written as f64 / self.total as f64
        }
    }
}
