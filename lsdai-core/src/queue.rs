//! Download queue, entry state machine and the sequential processing loop.
//!
//! # State machine
//!
//! ```text
//! queued ──► downloading ──► completed
//!   ▲            │
//!   │            ├──────────► error ──(retry)──► queued
//!   │            ▼
//!   └─(resume)─ paused
//! ```
//!
//! Only the processing loop moves entries through `queued → downloading →
//! completed | error`. `paused`, resume and retry are user actions.
use crate::catalog::Catalog;
use crate::constants::PROGRESS_COMPLETE;
use crate::size::{DeclaredSize, format_gib};
use crate::transfer::{Transfer, TransferError, TransferTask};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Queued,
    Downloading,
    Completed,
    Error,
    Paused,
}

impl QueueStatus {
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Downloading)
                | (
                    Self::Downloading,
                    Self::Completed | Self::Error | Self::Paused
                )
                | (Self::Paused | Self::Error, Self::Queued)
        )
    }

    /// Resolved by the processing loop; nothing moves it further on its own.
    #[must_use]
    pub const fn is_resolved(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Downloading => "downloading",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Paused => "paused",
        }
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("No queue entry for {0}")]
    UnknownEntry(String),
    #[error("Cannot move {id} from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: QueueStatus,
        to: QueueStatus,
    },
}

/// Identifies one enqueue of an item. A cleared and re-added item gets a new key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct EntryKey(u64);

/// Snapshot of a catalog item committed to the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    #[serde(skip)]
    key: EntryKey,
    pub item_id: String,
    pub display_name: String,
    pub size: DeclaredSize,
    pub size_label: String,
    pub status: QueueStatus,
    pub progress: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueueEntry {
    #[must_use]
    pub const fn key(&self) -> EntryKey {
        self.key
    }

    /// Move to `next` if the state machine allows it.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::InvalidTransition`] for disallowed moves.
    pub fn transition(&mut self, next: QueueStatus) -> Result<(), QueueError> {
        if !self.status.can_transition_to(next) {
            return Err(QueueError::InvalidTransition {
                id: self.item_id.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        match next {
            QueueStatus::Queued => {
                self.progress = 0.0;
                self.error = None;
            }
            QueueStatus::Completed => self.progress = PROGRESS_COMPLETE,
            QueueStatus::Downloading | QueueStatus::Error | QueueStatus::Paused => {}
        }
        Ok(())
    }
}

/// Per-status totals for the queue header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueCounts {
    pub queued: usize,
    pub downloading: usize,
    pub completed: usize,
    pub error: usize,
    pub paused: usize,
}

/// Emitted by the processing loop after every state or progress change.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueEvent {
    Started(QueueEntry),
    Progress(QueueEntry),
    Completed(QueueEntry),
    Failed(QueueEntry),
}

impl QueueEvent {
    #[must_use]
    pub const fn entry(&self) -> &QueueEntry {
        match self {
            Self::Started(entry)
            | Self::Progress(entry)
            | Self::Completed(entry)
            | Self::Failed(entry) => entry,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub completed: usize,
    pub failed: usize,
    /// Entries removed, cleared or paused while the loop was handling them.
    pub detached: usize,
    /// Snapshot entries that were no longer queued when their turn came.
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    AlreadyRunning,
    Finished(RunSummary),
}

#[derive(Debug, Default)]
struct QueueInner {
    entries: RefCell<Vec<QueueEntry>>,
    processing: Cell<bool>,
    next_key: Cell<u64>,
}

struct ProcessingGuard<'a>(&'a Cell<bool>);

impl<'a> ProcessingGuard<'a> {
    fn acquire(flag: &'a Cell<bool>) -> Option<Self> {
        if flag.replace(true) {
            None
        } else {
            Some(Self(flag))
        }
    }
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Shared handle to the queue. Clones see the same entries, so a clone held
/// by the UI can clear or pause while another clone is running [`Self::start`].
#[derive(Debug, Clone, Default)]
pub struct QueueManager {
    inner: Rc<QueueInner>,
}

impl QueueManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a `queued` snapshot for each id not already in the queue.
    /// Returns how many entries were added.
    pub fn enqueue<'a>(&self, ids: impl IntoIterator<Item = &'a str>, catalog: &Catalog) -> usize {
        let mut entries = self.inner.entries.borrow_mut();
        let mut added = 0;
        for id in ids {
            if entries.iter().any(|entry| entry.item_id == id) {
                continue;
            }
            let Some(item) = catalog.get(id) else {
                log::warn!("not queueing unknown catalog id {id}");
                continue;
            };
            let key = EntryKey(self.inner.next_key.get());
            self.inner.next_key.set(key.0.wrapping_add(1));
            entries.push(QueueEntry {
                key,
                item_id: item.id.clone(),
                display_name: item.name.clone(),
                size: item.size.clone(),
                size_label: item.size.to_string(),
                status: QueueStatus::Queued,
                progress: 0.0,
                error: None,
            });
            added += 1;
        }
        added
    }

    /// Empty the queue, including entries mid-download.
    pub fn clear(&self) -> usize {
        let removed = std::mem::take(&mut *self.inner.entries.borrow_mut()).len();
        if removed > 0 && self.is_processing() {
            log::info!("queue cleared during processing; abandoning in-flight entry");
        }
        removed
    }

    pub fn remove(&self, id: &str) -> bool {
        let mut entries = self.inner.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|entry| entry.item_id != id);
        entries.len() != before
    }

    /// Hold a downloading entry. The loop abandons it on its next step.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry is unknown or not downloading.
    pub fn pause(&self, id: &str) -> Result<(), QueueError> {
        self.transition(id, QueueStatus::Paused)
    }

    /// Put a paused entry back in line for the next [`Self::start`].
    ///
    /// # Errors
    ///
    /// Returns an error if the entry is unknown or not paused.
    pub fn resume(&self, id: &str) -> Result<(), QueueError> {
        self.transition(id, QueueStatus::Queued)
    }

    /// Re-queue every failed entry. Returns how many were reset.
    pub fn retry_failed(&self) -> usize {
        let mut entries = self.inner.entries.borrow_mut();
        entries
            .iter_mut()
            .filter(|entry| entry.status == QueueStatus::Error)
            .filter_map(|entry| entry.transition(QueueStatus::Queued).ok())
            .count()
    }

    fn transition(&self, id: &str, next: QueueStatus) -> Result<(), QueueError> {
        let mut entries = self.inner.entries.borrow_mut();
        let entry = entries
            .iter_mut()
            .find(|entry| entry.item_id == id)
            .ok_or_else(|| QueueError::UnknownEntry(id.to_string()))?;
        entry.transition(next)
    }

    #[must_use]
    pub fn entries(&self) -> Vec<QueueEntry> {
        self.inner.entries.borrow().clone()
    }

    #[must_use]
    pub fn entry(&self, id: &str) -> Option<QueueEntry> {
        self.inner
            .entries
            .borrow()
            .iter()
            .find(|entry| entry.item_id == id)
            .cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.entries.borrow().is_empty()
    }

    #[must_use]
    pub fn is_processing(&self) -> bool {
        self.inner.processing.get()
    }

    /// Normalized size of every entry regardless of status, in gibibytes.
    #[must_use]
    pub fn total_gib(&self) -> f64 {
        self.inner
            .entries
            .borrow()
            .iter()
            .map(|entry| entry.size.gib())
            .sum()
    }

    #[must_use]
    pub fn total_label(&self) -> String {
        format_gib(self.total_gib())
    }

    #[must_use]
    pub fn counts(&self) -> QueueCounts {
        let mut counts = QueueCounts::default();
        for entry in self.inner.entries.borrow().iter() {
            match entry.status {
                QueueStatus::Queued => counts.queued += 1,
                QueueStatus::Downloading => counts.downloading += 1,
                QueueStatus::Completed => counts.completed += 1,
                QueueStatus::Error => counts.error += 1,
                QueueStatus::Paused => counts.paused += 1,
            }
        }
        counts
    }

    /// Process every currently queued entry, one at a time, in insertion order.
    ///
    /// A second call while a run is active returns
    /// [`StartOutcome::AlreadyRunning`] without touching the queue.
    pub async fn start<T, F>(&self, transfer: &T, on_event: F) -> StartOutcome
    where
        T: Transfer,
        F: Fn(&QueueEvent),
    {
        let Some(_guard) = ProcessingGuard::acquire(&self.inner.processing) else {
            log::debug!("queue already processing; ignoring start");
            return StartOutcome::AlreadyRunning;
        };

        let keys: Vec<EntryKey> = self
            .inner
            .entries
            .borrow()
            .iter()
            .filter(|entry| entry.status == QueueStatus::Queued)
            .map(|entry| entry.key)
            .collect();
        log::info!("processing {} queued entries", keys.len());

        let mut summary = RunSummary::default();
        for key in keys {
            let Some(started) = self.update(key, |entry| {
                entry.transition(QueueStatus::Downloading).ok()?;
                entry.progress = 0.0;
                Some(entry.clone())
            }) else {
                summary.skipped += 1;
                continue;
            };
            on_event(&QueueEvent::Started(started.clone()));

            let task = TransferTask::new(self, key, started, &on_event);
            match transfer.run(&task).await {
                Ok(()) => match self.resolve(key, QueueStatus::Completed, None) {
                    Some(done) => {
                        summary.completed += 1;
                        on_event(&QueueEvent::Completed(done));
                    }
                    None => summary.detached += 1,
                },
                Err(TransferError::Detached) => {
                    log::debug!("entry {} detached mid-transfer", task.entry().item_id);
                    summary.detached += 1;
                }
                Err(err) => {
                    let reason = err.to_string();
                    match self.resolve(key, QueueStatus::Error, Some(reason)) {
                        Some(failed) => {
                            log::warn!("download of {} failed: {err}", failed.display_name);
                            summary.failed += 1;
                            on_event(&QueueEvent::Failed(failed));
                        }
                        None => summary.detached += 1,
                    }
                }
            }
        }
        StartOutcome::Finished(summary)
    }

    fn update<R>(&self, key: EntryKey, apply: impl FnOnce(&mut QueueEntry) -> Option<R>) -> Option<R> {
        let mut entries = self.inner.entries.borrow_mut();
        entries
            .iter_mut()
            .find(|entry| entry.key == key)
            .and_then(apply)
    }

    /// Raise progress of a downloading entry. `None` once the entry is gone,
    /// paused, or otherwise no longer downloading.
    pub(crate) fn apply_progress(&self, key: EntryKey, progress: f64) -> Option<QueueEntry> {
        let progress = progress.clamp(0.0, PROGRESS_COMPLETE);
        self.update(key, |entry| {
            if entry.status != QueueStatus::Downloading {
                return None;
            }
            entry.progress = entry.progress.max(progress);
            Some(entry.clone())
        })
    }

    fn resolve(&self, key: EntryKey, next: QueueStatus, error: Option<String>) -> Option<QueueEntry> {
        self.update(key, |entry| {
            entry.transition(next).ok()?;
            entry.error = error;
            Some(entry.clone())
        })
    }
}
