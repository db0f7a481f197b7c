use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{info, warn};

use crate::dng_pipeline::{
    asset::AssetOpener,
    conversions::converter::Converter,
    conversions::job::JobOutcome,
    conversions::progress::CancellationToken,
    decode::DecodingEngine,
    dng::DngWriter,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionStatus {
    Pending,
    Converting,
    Completed,
    Failed(String),
    Cancelled,
}

impl fmt::Display for ConversionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionStatus::Pending => write!(f, "Pending"),
            ConversionStatus::Converting => write!(f, "Converting"),
            ConversionStatus::Completed => write!(f, "Completed"),
            ConversionStatus::Failed(reason) => write!(f, "Failed: {}", reason),
            ConversionStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl From<&JobOutcome> for ConversionStatus {
    fn from(outcome: &JobOutcome) -> Self {
        match outcome {
            JobOutcome::Completed(_) => ConversionStatus::Completed,
            JobOutcome::Cancelled(_) => ConversionStatus::Cancelled,
            JobOutcome::Failed { error, .. } => ConversionStatus::Failed(error.to_string()),
        }
    }
}

/// One clip waiting for, or done with, conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueItem {
    pub id: u64,
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub status: ConversionStatus,
    /// Fraction of frames written, in `[0, 1]`.
    pub progress: f64,
    pub frames_written: u64,
}

type Items = Arc<Mutex<Vec<QueueItem>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clips converted one after another through a single converter.
pub struct ConversionQueue<O: AssetOpener, E: DecodingEngine, W: DngWriter> {
    converter: Converter<O, E, W>,
    items: Items,
    next_id: AtomicU64,
    stop: Mutex<CancellationToken>,
    /// Token of the converting item, created when the item is claimed so a
    /// cancellation can land before its job starts.
    running: Mutex<Option<(u64, CancellationToken)>>,
}

impl<O, E, W> ConversionQueue<O, E, W>
where
    O: AssetOpener + 'static,
    E: DecodingEngine + 'static,
    W: DngWriter + 'static,
{
    pub fn new(converter: Converter<O, E, W>) -> Self {
        Self {
            converter,
            items: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(1),
            stop: Mutex::new(CancellationToken::new()),
            running: Mutex::new(None),
        }
    }

    /// Appends a pending clip and returns its id.
    pub fn add(&self, input: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.items).push(QueueItem {
            id,
            input: input.into(),
            output_dir: output_dir.into(),
            status: ConversionStatus::Pending,
            progress: 0.0,
            frames_written: 0,
        });
        id
    }

    /// Removes a clip that is not currently converting.
    pub fn remove(&self, id: u64) -> bool {
        let mut items = lock(&self.items);
        match items.iter().position(|item| item.id == id) {
            Some(i) if items[i].status != ConversionStatus::Converting => {
                items.remove(i);
                true
            }
            _ => false,
        }
    }

    /// Snapshot of every item in queue order.
    pub fn items(&self) -> Vec<QueueItem> {
        lock(&self.items).clone()
    }

    pub fn is_any_conversion_in_progress(&self) -> bool {
        lock(&self.items)
            .iter()
            .any(|item| item.status == ConversionStatus::Converting)
    }

    /// Cancels one clip: a converting clip stops at its next frame boundary,
    /// a pending one is skipped.
    pub fn cancel(&self, id: u64) -> bool {
        let mut items = lock(&self.items);
        let Some(item) = items.iter_mut().find(|item| item.id == id) else {
            return false;
        };
        match item.status {
            ConversionStatus::Converting => {
                if let Some((running_id, token)) = lock(&self.running).as_ref()
                    && *running_id == id
                {
                    token.cancel();
                }
                true
            }
            ConversionStatus::Pending => {
                item.status = ConversionStatus::Cancelled;
                true
            }
            _ => false,
        }
    }

    /// Cancels the running clip and every pending one.
    pub fn cancel_all(&self) {
        let mut items = lock(&self.items);
        lock(&self.stop).cancel();
        if let Some((_, token)) = lock(&self.running).as_ref() {
            token.cancel();
        }
        for item in items
            .iter_mut()
            .filter(|item| item.status == ConversionStatus::Pending)
        {
            item.status = ConversionStatus::Cancelled;
        }
        drop(items);
        warn!("Cancelled all queued conversions");
    }

    /// Converts every pending clip in order and returns the final items.
    ///
    /// `on_update` is called with a snapshot of an item whenever its status
    /// or progress changes, possibly from the converter's dispatcher thread.
    pub fn run<F>(&self, on_update: F) -> Vec<QueueItem>
    where
        F: Fn(&QueueItem) + Send + Sync + 'static,
    {
        let stop = {
            let mut stop = lock(&self.stop);
            *stop = CancellationToken::new();
            stop.clone()
        };
        let on_update = Arc::new(on_update);

        while !stop.is_cancelled() {
            let Some((claimed, token)) = self.claim_next_pending() else {
                break;
            };
            on_update(&claimed);
            let QueueItem { id, input, output_dir, .. } = claimed;
            info!(input = %input.display(), "Converting queued clip");

            let items = Arc::clone(&self.items);
            let notify = Arc::clone(&on_update);
            let started = self.converter.convert_with_token(
                input,
                output_dir,
                token,
                move |fraction| {
                    let snapshot = {
                        let mut items = lock(&items);
                        items.iter_mut().find(|item| item.id == id).map(|item| {
                            item.progress = fraction;
                            item.clone()
                        })
                    };
                    if let Some(item) = snapshot {
                        notify(&item);
                    }
                },
                |_| {},
            );

            let (status, frames_written) = match started {
                Ok(handle) => {
                    let outcome = handle.wait();
                    (ConversionStatus::from(&outcome), outcome.summary().frames_written)
                }
                Err(error) => (ConversionStatus::Failed(error.to_string()), 0),
            };
            lock(&self.running).take();
            self.update(id, &*on_update, |item| {
                if status == ConversionStatus::Completed {
                    item.progress = 1.0;
                }
                item.status = status;
                item.frames_written = frames_written;
            });
        }

        self.items()
    }

    /// Marks the first pending item as converting and registers its token,
    /// under the items lock that `cancel` and `cancel_all` also hold.
    fn claim_next_pending(&self) -> Option<(QueueItem, CancellationToken)> {
        let mut items = lock(&self.items);
        let item = items
            .iter_mut()
            .find(|item| item.status == ConversionStatus::Pending)?;
        item.status = ConversionStatus::Converting;
        item.progress = 0.0;
        let token = CancellationToken::new();
        *lock(&self.running) = Some((item.id, token.clone()));
        Some((item.clone(), token))
    }

    fn update(&self, id: u64, on_update: &dyn Fn(&QueueItem), change: impl FnOnce(&mut QueueItem)) {
        let snapshot = {
            let mut items = lock(&self.items);
            items.iter_mut().find(|item| item.id == id).map(|item| {
                change(item);
                item.clone()
            })
        };
        if let Some(item) = snapshot {
            on_update(&item);
        }
    }
}
