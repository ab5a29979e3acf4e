//! Pluggable transfer strategies driven by the queue's processing loop.
//!
//! The loop only knows the [`Transfer`] trait. [`SimulatedTransfer`] is the
//! stand-in used by the notebook widgets; a real transport implements the
//! same trait and reports progress through the same [`TransferTask`].
use crate::constants::{
    DEFAULT_MAX_STEP, DEFAULT_MIN_STEP, DEFAULT_TICK_MS, PROGRESS_COMPLETE,
};
use crate::queue::{EntryKey, QueueEntry, QueueEvent, QueueManager};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum TransferError {
    #[error("Transfer failed: {0}")]
    Failed(String),
    /// The entry was cleared, removed or paused while transferring.
    #[error("Queue entry no longer active")]
    Detached,
}

/// Downloads one queue entry, reporting progress as it goes.
#[allow(async_fn_in_trait)]
pub trait Transfer {
    /// Run the transfer to completion.
    ///
    /// Implementations should stop as soon as [`TransferTask::report`]
    /// returns an error.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Failed`] when the transfer fails and
    /// [`TransferError::Detached`] when the entry went away mid-transfer.
    async fn run(&self, task: &TransferTask<'_>) -> Result<(), TransferError>;
}

/// Suspends the calling task; supplied by the platform (browser timer, tokio).
#[allow(async_fn_in_trait)]
pub trait Sleeper {
    async fn sleep_ms(&self, ms: u32);
}

/// Handle given to a [`Transfer`] for the entry it is working on.
pub struct TransferTask<'a> {
    queue: &'a QueueManager,
    key: EntryKey,
    entry: QueueEntry,
    on_event: &'a dyn Fn(&QueueEvent),
}

impl<'a> TransferTask<'a> {
    pub(crate) fn new(
        queue: &'a QueueManager,
        key: EntryKey,
        entry: QueueEntry,
        on_event: &'a dyn Fn(&QueueEvent),
    ) -> Self {
        Self {
            queue,
            key,
            entry,
            on_event,
        }
    }

    /// The entry as it was when the transfer started.
    #[must_use]
    pub const fn entry(&self) -> &QueueEntry {
        &self.entry
    }

    /// Record progress (clamped to `0..=100`, never lowered).
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Detached`] if the entry has been cleared,
    /// removed or paused; the update is dropped in that case.
    pub fn report(&self, progress: f64) -> Result<f64, TransferError> {
        let updated = self
            .queue
            .apply_progress(self.key, progress)
            .ok_or(TransferError::Detached)?;
        let applied = updated.progress;
        (self.on_event)(&QueueEvent::Progress(updated));
        Ok(applied)
    }
}

/// Tuning for [`SimulatedTransfer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub tick_ms: u32,
    pub min_step: f64,
    pub max_step: f64,
    /// Probability in `0..=1` that any single tick faults.
    pub failure_rate: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_ms: DEFAULT_TICK_MS,
            min_step: DEFAULT_MIN_STEP,
            max_step: DEFAULT_MAX_STEP,
            failure_rate: 0.0,
        }
    }
}

impl SimulationConfig {
    /// Clamp into usable ranges: positive ordered steps, probability in `0..=1`.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.min_step = self.min_step.max(0.1);
        self.max_step = self.max_step.max(self.min_step);
        self.failure_rate = if self.failure_rate.is_finite() {
            self.failure_rate.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }
}

/// Fake download: bounded random progress steps on every sleeper tick.
pub struct SimulatedTransfer<S: Sleeper> {
    sleeper: S,
    config: SimulationConfig,
    rng: RefCell<ChaCha8Rng>,
}

impl<S: Sleeper> SimulatedTransfer<S> {
    #[must_use]
    pub fn new(sleeper: S, config: SimulationConfig, seed: u64) -> Self {
        Self {
            sleeper,
            config: config.normalized(),
            rng: RefCell::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &SimulationConfig {
        &self.config
    }

    fn roll(&self) -> (f64, bool) {
        let mut rng = self.rng.borrow_mut();
        let step = rng.gen_range(self.config.min_step..=self.config.max_step);
        let fault = rng.gen_bool(self.config.failure_rate);
        (step, fault)
    }
}

impl<S: Sleeper> Transfer for SimulatedTransfer<S> {
    async fn run(&self, task: &TransferTask<'_>) -> Result<(), TransferError> {
        let mut progress = 0.0_f64;
        loop {
            self.sleeper.sleep_ms(self.config.tick_ms).await;
            let (step, fault) = self.roll();
            if fault {
                return Err(TransferError::Failed(format!(
                    "simulated fault at {progress:.0}% of {}",
                    task.entry().display_name
                )));
            }
            progress = (progress + step).min(PROGRESS_COMPLETE);
            task.report(progress)?;
            if progress >= PROGRESS_COMPLETE {
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fixtures::two_items;
    use crate::queue::{QueueStatus, StartOutcome};
    use futures::executor::block_on;
    use std::cell::Cell;

    struct CountingSleeper(Cell<u32>);

    impl Sleeper for CountingSleeper {
        async fn sleep_ms(&self, _ms: u32) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn config_is_normalized() {
        let cfg = SimulationConfig {
            tick_ms: 10,
            min_step: -5.0,
            max_step: 0.0,
            failure_rate: 3.0,
        }
        .normalized();
        assert!((cfg.min_step - 0.1).abs() < f64::EPSILON);
        assert!(cfg.max_step >= cfg.min_step);
        assert!((cfg.failure_rate - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn simulated_progress_is_monotonic_and_completes() {
        let catalog = two_items();
        let queue = QueueManager::new();
        queue.enqueue(["a"], &catalog);
        let transfer = SimulatedTransfer::new(
            CountingSleeper(Cell::new(0)),
            SimulationConfig::default(),
            42,
        );
        let seen = RefCell::new(Vec::new());
        let outcome = block_on(queue.start(&transfer, |event| {
            if let QueueEvent::Progress(entry) = event {
                seen.borrow_mut().push(entry.progress);
            }
        }));
        assert!(matches!(outcome, StartOutcome::Finished(s) if s.completed == 1));
        let seen = seen.into_inner();
        assert!(!seen.is_empty());
        assert!(seen.windows(2).all(|pair| pair[0] <= pair[1]));
        assert!(seen.iter().all(|p| (0.0..=100.0).contains(p)));
        assert!(transfer.sleeper.0.get() as usize >= seen.len());
        let entry = queue.entry("a").unwrap();
        assert_eq!(entry.status, QueueStatus::Completed);
        assert!((entry.progress - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn certain_failure_marks_entry_error() {
        let catalog = two_items();
        let queue = QueueManager::new();
        queue.enqueue(["a", "b"], &catalog);
        let config = SimulationConfig {
            failure_rate: 1.0,
            ..SimulationConfig::default()
        };
        let transfer = SimulatedTransfer::new(CountingSleeper(Cell::new(0)), config, 1);
        let outcome = block_on(queue.start(&transfer, |_| {}));
        assert!(matches!(outcome, StartOutcome::Finished(s) if s.failed == 2));
        for entry in queue.entries() {
            assert_eq!(entry.status, QueueStatus::Error);
            assert!(entry.error.as_deref().unwrap_or("").contains("simulated fault"));
        }
    }

    #[test]
    fn same_seed_reproduces_progress() {
        let catalog = two_items();
        let run = |seed| {
            let queue = QueueManager::new();
            queue.enqueue(["a"], &catalog);
            let transfer = SimulatedTransfer::new(
                CountingSleeper(Cell::new(0)),
                SimulationConfig::default(),
                seed,
            );
            let seen = RefCell::new(Vec::new());
            block_on(queue.start(&transfer, |event| {
                seen.borrow_mut().push(event.entry().progress);
            }));
            seen.into_inner()
        };
        assert_eq!(run(9), run(9));
    }
}
