//! Bounded priority queue feeding the worker pool.
//!
//! Jobs are ordered by plan priority (highest first) and, within one
//! priority, by enqueue sequence (FIFO). Capacity counts both queued jobs and
//! slots reserved by in-progress admissions, so an admitted job always has
//! room once its reservation and job row exist.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicUsize, Ordering};

use goldrush_core::error::CoreError;
use goldrush_core::types::DbId;
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;

/// Default queue bound when none is configured.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct QueueEntry {
    job_id: DbId,
    priority: i32,
    seq: u64,
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Max-heap: higher priority wins, then the lower sequence number.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

#[derive(Default)]
struct QueueState {
    heap: BinaryHeap<QueueEntry>,
    next_seq: u64,
}

impl QueueState {
    fn push(&mut self, job_id: DbId, priority: i32) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(QueueEntry {
            job_id,
            priority,
            seq,
        });
    }

    /// 1-based rank of the entry for `job_id`.
    fn rank(&self, job_id: DbId) -> Option<usize> {
        let target = self.heap.iter().find(|e| e.job_id == job_id)?;
        Some(self.heap.iter().filter(|e| *e > target).count() + 1)
    }
}

pub struct Dispatcher {
    state: Mutex<QueueState>,
    /// Slots handed out by [`Dispatcher::reserve_slot`] and not yet filled.
    reserved: AtomicUsize,
    notify: Notify,
    capacity: usize,
}

impl Dispatcher {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            reserved: AtomicUsize::new(0),
            notify: Notify::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of jobs currently waiting.
    pub async fn depth(&self) -> usize {
        self.state.lock().await.heap.len()
    }

    fn is_full(&self, state: &QueueState) -> bool {
        state.heap.len() + self.reserved.load(Ordering::Acquire) >= self.capacity
    }

    /// Claim room for one job before any credits are reserved.
    ///
    /// Fails fast with [`CoreError::QueueFull`]. Dropping the slot without
    /// pushing gives the room back.
    pub async fn reserve_slot(&self) -> Result<QueueSlot<'_>, CoreError> {
        let state = self.state.lock().await;
        if self.is_full(&state) {
            return Err(CoreError::QueueFull {
                capacity: self.capacity,
            });
        }
        self.reserved.fetch_add(1, Ordering::AcqRel);
        Ok(QueueSlot {
            dispatcher: self,
            filled: false,
        })
    }

    /// Add a job directly. Used by startup recovery.
    pub async fn enqueue(&self, job_id: DbId, priority: i32) -> Result<(), CoreError> {
        {
            let mut state = self.state.lock().await;
            if self.is_full(&state) {
                return Err(CoreError::QueueFull {
                    capacity: self.capacity,
                });
            }
            state.push(job_id, priority);
        }
        self.notify.notify_one();
        Ok(())
    }

    /// Pop the highest-ranked job, if any.
    pub async fn dequeue_next(&self) -> Option<DbId> {
        self.state.lock().await.heap.pop().map(|e| e.job_id)
    }

    /// Wait for the next job. Returns `None` once `cancel` fires.
    pub async fn next(&self, cancel: &CancellationToken) -> Option<DbId> {
        loop {
            let notified = self.notify.notified();
            if let Some(job_id) = self.dequeue_next().await {
                return Some(job_id);
            }
            tokio::select! {
                _ = cancel.cancelled() => return None,
                _ = notified => {}
            }
        }
    }

    /// Drop a queued job. Returns `false` if it was not in the queue.
    pub async fn remove(&self, job_id: DbId) -> bool {
        let mut state = self.state.lock().await;
        let before = state.heap.len();
        state.heap.retain(|e| e.job_id != job_id);
        state.heap.len() != before
    }

    /// Live 1-based rank of a queued job.
    pub async fn position(&self, job_id: DbId) -> Option<usize> {
        self.state.lock().await.rank(job_id)
    }

    /// Best (lowest) rank among `job_ids`.
    pub async fn best_position(&self, job_ids: &[DbId]) -> Option<usize> {
        let state = self.state.lock().await;
        job_ids.iter().filter_map(|id| state.rank(*id)).min()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

/// Room in the queue held for one admission.
pub struct QueueSlot<'a> {
    dispatcher: &'a Dispatcher,
    filled: bool,
}

impl std::fmt::Debug for QueueSlot<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueSlot")
            .field("filled", &self.filled)
            .finish_non_exhaustive()
    }
}

impl QueueSlot<'_> {
    /// Fill the slot with a job and wake one waiting worker.
    pub async fn push(mut self, job_id: DbId, priority: i32) {
        {
            let mut state = self.dispatcher.state.lock().await;
            state.push(job_id, priority);
            self.dispatcher.reserved.fetch_sub(1, Ordering::AcqRel);
            self.filled = true;
        }
        self.dispatcher.notify.notify_one();
    }
}

impl Drop for QueueSlot<'_> {
    fn drop(&mut self) {
        if !self.filled {
            self.dispatcher.reserved.fetch_sub(1, Ordering::AcqRel);
        }
    }
}
