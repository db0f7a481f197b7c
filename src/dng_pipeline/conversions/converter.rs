use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use crate::dng_pipeline::{
    asset::{AssetOpener, MovAssetOpener},
    common::error::{ConversionError, Result},
    conversions::job::JobOutcome,
    conversions::pipeline::ProResRawToDngPipeline,
    conversions::progress::{CancellationToken, JobEvent},
    conversions::types::ConversionConfig,
    decode::{DecodingEngine, PackedRawEngine},
    dng::{DngWriter, StandardDngWriter},
};

type JobSlot = Arc<Mutex<Option<CancellationToken>>>;

fn lock(slot: &JobSlot) -> MutexGuard<'_, Option<CancellationToken>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Frees the converter's job slot when the worker ends, including by panic.
struct SlotGuard(JobSlot);

impl Drop for SlotGuard {
    fn drop(&mut self) {
        lock(&self.0).take();
    }
}

/// Runs one conversion at a time on a background thread.
///
/// Progress and completion callbacks run on a dedicated dispatcher thread,
/// never on the caller's thread. Progress values arrive in order.
pub struct Converter<O: AssetOpener, E: DecodingEngine, W: DngWriter> {
    pipeline: Arc<ProResRawToDngPipeline<O, E, W>>,
    active: JobSlot,
}

impl Converter<MovAssetOpener, PackedRawEngine, StandardDngWriter> {
    pub fn new(config: ConversionConfig) -> Self {
        Self::with_pipeline(ProResRawToDngPipeline::new(config))
    }
}

impl<O: AssetOpener, E: DecodingEngine, W: DngWriter> Clone for Converter<O, E, W> {
    fn clone(&self) -> Self {
        Self {
            pipeline: Arc::clone(&self.pipeline),
            active: Arc::clone(&self.active),
        }
    }
}

impl<O, E, W> Converter<O, E, W>
where
    O: AssetOpener + 'static,
    E: DecodingEngine + 'static,
    W: DngWriter + 'static,
{
    pub fn with_pipeline(pipeline: ProResRawToDngPipeline<O, E, W>) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            active: Arc::new(Mutex::new(None)),
        }
    }

    /// Starts converting `input` into `output_dir`.
    ///
    /// Returns `Err(JobAlreadyRunning)` without touching the callbacks while
    /// another job holds the converter. Otherwise `on_complete` is called
    /// exactly once, after the last `on_progress` call.
    pub fn convert<P, C>(
        &self,
        input: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        on_progress: P,
        on_complete: C,
    ) -> Result<ConversionHandle>
    where
        P: FnMut(f64) + Send + 'static,
        C: FnOnce(&JobOutcome) + Send + 'static,
    {
        self.convert_with_token(input, output_dir, CancellationToken::new(), on_progress, on_complete)
    }

    /// Like [`convert`](Self::convert), but the job observes `token`. A token
    /// that is already cancelled yields `Cancelled` before the asset is opened.
    pub fn convert_with_token<P, C>(
        &self,
        input: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        token: CancellationToken,
        mut on_progress: P,
        on_complete: C,
    ) -> Result<ConversionHandle>
    where
        P: FnMut(f64) + Send + 'static,
        C: FnOnce(&JobOutcome) + Send + 'static,
    {
        let input = input.into();
        let output_dir = output_dir.into();

        {
            let mut slot = lock(&self.active);
            if slot.is_some() {
                warn!(input = %input.display(), "Rejected conversion: another job is running");
                return Err(ConversionError::JobAlreadyRunning);
            }
            *slot = Some(token.clone());
        }

        let (tx, rx) = mpsc::channel::<JobEvent>();

        let dispatcher = thread::Builder::new()
            .name("prawdec-dispatch".to_string())
            .spawn(move || {
                let outcome = loop {
                    match rx.recv() {
                        Ok(JobEvent::Progress(fraction)) => on_progress(fraction),
                        Ok(JobEvent::Finished(outcome)) => break outcome,
                        Err(_) => break JobOutcome::worker_lost("conversion worker exited without a result"),
                    }
                };
                on_complete(&outcome);
                outcome
            });
        let dispatcher = match dispatcher {
            Ok(handle) => handle,
            Err(e) => {
                lock(&self.active).take();
                return Err(ConversionError::Io(e));
            }
        };

        // From here on the dispatcher owns the callbacks; a worker that never
        // runs drops `tx` and is reported through `on_complete`.
        let guard = SlotGuard(Arc::clone(&self.active));
        let pipeline = Arc::clone(&self.pipeline);
        let worker_token = token.clone();
        let worker = thread::Builder::new()
            .name("prawdec-worker".to_string())
            .spawn(move || {
                info!(input = %input.display(), "Conversion worker started");
                let progress_tx = tx.clone();
                let mut report = |fraction: f64| {
                    let _ = progress_tx.send(JobEvent::Progress(fraction));
                };
                let outcome = pipeline.run(&input, &output_dir, &worker_token, &mut report);
                drop(guard);
                let _ = tx.send(JobEvent::Finished(outcome));
            });
        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Failed to spawn conversion worker: {}", e);
                None
            }
        };

        Ok(ConversionHandle {
            cancel: token,
            dispatcher,
            worker,
        })
    }

    /// Requests cancellation of the running job. Returns false when idle.
    pub fn cancel(&self) -> bool {
        match lock(&self.active).as_ref() {
            Some(token) => {
                debug!("Cancellation requested");
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        lock(&self.active).is_some()
    }
}

/// Handle to a started conversion.
pub struct ConversionHandle {
    cancel: CancellationToken,
    dispatcher: JoinHandle<JobOutcome>,
    worker: Option<JoinHandle<()>>,
}

impl ConversionHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// True once `on_complete` has returned.
    pub fn is_finished(&self) -> bool {
        self.dispatcher.is_finished()
    }

    /// Blocks until the job has finished and `on_complete` has run.
    pub fn wait(self) -> JobOutcome {
        let outcome = self
            .dispatcher
            .join()
            .unwrap_or_else(|_| JobOutcome::worker_lost("a conversion callback panicked"));
        if let Some(worker) = self.worker {
            let _ = worker.join();
        }
        outcome
    }
}
