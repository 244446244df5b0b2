//! Batch progress as a monotonic 0-100 value per batch
//!
//! Each batch gets its own [`BatchProgress`], registered under its id so
//! overlapping batches never share a bar. A batch runs one or more phases
//! (the first run, then at most one fallback run). Within a phase the value
//! is driven by attempts settling and by elapsed time against the model's
//! estimate, mapped into the phase's slice of the bar. The value never
//! decreases, stays at or below 99 while the batch is open and reaches 100
//! only when the batch is finished.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::{AppError, Result};

/// Share of a phase the time estimate may fill on its own
const TIME_SHARE: f64 = 95.0;

/// Highest value an open batch may report
pub const OPEN_CEILING: u8 = 99;

/// Finished batches kept for late pollers
const RETAINED_BATCHES: usize = 64;

/// Latest progress published to pollers and subscribers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub batch_id: Option<String>,
    pub percent: u8,
    pub settled: u32,
    pub total: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

struct Phase {
    total: u32,
    settled: HashSet<usize>,
    started: Instant,
    estimate: Duration,
    floor: u8,
    ceiling: u8,
}

struct PhaseState {
    phase: Option<Phase>,
    finished: bool,
}

/// Progress of one batch
pub struct BatchProgress {
    batch_id: String,
    state: Mutex<PhaseState>,
    snapshot: watch::Sender<ProgressSnapshot>,
}

impl BatchProgress {
    fn new(batch_id: &str) -> Self {
        let (snapshot, _) = watch::channel(ProgressSnapshot {
            batch_id: Some(batch_id.to_string()),
            ..ProgressSnapshot::default()
        });
        Self {
            batch_id: batch_id.to_string(),
            state: Mutex::new(PhaseState {
                phase: None,
                finished: false,
            }),
            snapshot,
        }
    }

    pub fn id(&self) -> &str {
        &self.batch_id
    }

    /// Start a phase of `total` attempts that fills the bar from its current
    /// value up to `ceiling`
    pub fn start_phase(&self, total: u32, estimate: Duration, ceiling: u8) {
        let mut state = self.state.lock();
        if state.finished {
            return;
        }
        let floor = self.snapshot.borrow().percent;
        state.phase = Some(Phase {
            total,
            settled: HashSet::new(),
            started: Instant::now(),
            estimate,
            floor,
            ceiling: ceiling.clamp(floor, OPEN_CEILING),
        });
        self.snapshot.send_modify(|s| {
            s.settled = 0;
            s.total = total;
        });
    }

    /// Record that attempt `index` of the current phase settled. Repeated or
    /// out-of-range indexes are ignored.
    pub fn settle(&self, index: usize) {
        let mut state = self.state.lock();
        if state.finished {
            return;
        }
        if let Some(phase) = state.phase.as_mut() {
            if index < phase.total as usize {
                phase.settled.insert(index);
            }
            self.publish(phase);
        }
    }

    /// Advance the time-based estimate
    pub fn tick(&self) {
        let state = self.state.lock();
        if state.finished {
            return;
        }
        if let Some(phase) = state.phase.as_ref() {
            self.publish(phase);
        }
    }

    /// Attach a user-facing message to the batch
    pub fn notice(&self, message: impl Into<String>) {
        let message = message.into();
        self.snapshot.send_modify(|s| s.notice = Some(message));
    }

    /// Close the batch at 100
    pub fn finish(&self) {
        let mut state = self.state.lock();
        state.finished = true;
        self.snapshot.send_modify(|s| s.percent = 100);
    }

    pub fn is_finished(&self) -> bool {
        self.state.lock().finished
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.snapshot.subscribe()
    }

    fn publish(&self, phase: &Phase) {
        let settled = phase.settled.len() as u32;
        let total = phase.total.max(1);

        let by_count = (settled * 100 / total).min(100);
        let by_time = if phase.estimate.is_zero() {
            0
        } else {
            let ratio = phase.started.elapsed().as_secs_f64() / phase.estimate.as_secs_f64();
            (ratio * TIME_SHARE).min(TIME_SHARE) as u32
        };
        let raw = by_count.max(by_time);
        let span = (phase.ceiling - phase.floor) as u32;
        let value = phase.floor + (raw * span / 100) as u8;

        self.snapshot.send_modify(|s| {
            s.percent = s.percent.max(value.min(OPEN_CEILING));
            s.settled = settled;
        });
    }
}

#[derive(Default)]
struct Batches {
    by_id: HashMap<String, Arc<BatchProgress>>,
    order: VecDeque<String>,
}

/// Registry of batch progress, keyed by batch id
#[derive(Default)]
pub struct ProgressReporter {
    batches: Mutex<Batches>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new batch at 0. An id still in flight is rejected.
    pub fn begin(&self, batch_id: &str) -> Result<Arc<BatchProgress>> {
        let mut guard = self.batches.lock();
        let batches = &mut *guard;

        if let Some(existing) = batches.by_id.get(batch_id) {
            if !existing.is_finished() {
                return Err(AppError::Validation(format!("Batch {} is already running", batch_id)));
            }
            batches.order.retain(|id| id != batch_id);
        }

        let progress = Arc::new(BatchProgress::new(batch_id));
        batches.by_id.insert(batch_id.to_string(), progress.clone());
        batches.order.push_back(batch_id.to_string());

        while batches.order.len() > RETAINED_BATCHES {
            let by_id = &batches.by_id;
            let Some(oldest) = batches
                .order
                .iter()
                .position(|id| by_id.get(id).map_or(true, |b| b.is_finished()))
            else {
                break;
            };
            if let Some(id) = batches.order.remove(oldest) {
                batches.by_id.remove(&id);
            }
        }

        Ok(progress)
    }

    pub fn get(&self, batch_id: &str) -> Option<Arc<BatchProgress>> {
        self.batches.lock().by_id.get(batch_id).cloned()
    }

    /// Snapshot of the most recently started batch
    pub fn latest(&self) -> ProgressSnapshot {
        let batches = self.batches.lock();
        batches
            .order
            .back()
            .and_then(|id| batches.by_id.get(id))
            .map(|b| b.snapshot())
            .unwrap_or_default()
    }
}
