//! Progress estimation for transfers whose completion is only partly observable
//!
//! ```text
//! Idle(0) ─▶ Transferring ─▶ Finalizing (synthetic, ≤ cap) ─▶ Complete(100)
//!               │                  │
//!               └────────┬─────────┘
//!                        ▼
//!                 Failed (reset to 0) ─restart─▶ Idle
//! ```
//!
//! Observed bytes map to `loaded/total * share`, where share is 100 for
//! uploads and `download_transfer_share` (80) for downloads; the remainder is
//! headroom for decryption. Without byte counts, a ticker task adds a fixed
//! step on a fixed interval up to the synthetic cap. The percentage never
//! decreases except on failure.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};

use zkdrop_core::config::ProgressConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Upload,
    Download,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Transferring,
    Finalizing,
    Complete,
    Failed,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Complete | Phase::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    pub phase: Phase,
    pub percent: f64,
}

/// Progress sink, called with every state change.
pub type ProgressFn = Arc<dyn Fn(ProgressSnapshot) + Send + Sync>;

/// The pure state machine. Every mutator returns the new snapshot, or `None`
/// when the call was a no-op because the estimator already finished.
#[derive(Debug, Clone)]
pub struct ProgressEstimator {
    direction: Direction,
    transfer_share: f64,
    tick_step: f64,
    synthetic_cap: f64,
    phase: Phase,
    percent: f64,
}

impl ProgressEstimator {
    pub fn new(direction: Direction, cfg: &ProgressConfig) -> Self {
        let transfer_share = match direction {
            Direction::Upload => 100.0,
            Direction::Download => cfg.download_transfer_share.clamp(0.0, 100.0),
        };
        Self {
            direction,
            transfer_share,
            tick_step: cfg.tick_step.max(0.0),
            synthetic_cap: cfg.synthetic_cap.clamp(0.0, 100.0),
            phase: Phase::Idle,
            percent: 0.0,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn percent(&self) -> f64 {
        self.percent
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            phase: self.phase,
            percent: self.percent,
        }
    }

    /// Back to `Idle` after a failure, for a user-initiated retry.
    pub fn restart(&mut self) -> Option<ProgressSnapshot> {
        if self.phase != Phase::Failed {
            return None;
        }
        self.phase = Phase::Idle;
        self.percent = 0.0;
        Some(self.snapshot())
    }

    pub fn start(&mut self) -> Option<ProgressSnapshot> {
        if self.phase != Phase::Idle {
            return None;
        }
        self.phase = Phase::Transferring;
        Some(self.snapshot())
    }

    /// Record a byte-level observation. `total == 0` carries no information.
    pub fn observe(&mut self, loaded: u64, total: u64) -> Option<ProgressSnapshot> {
        if self.phase.is_terminal() || total == 0 {
            return None;
        }
        if self.phase == Phase::Idle {
            self.phase = Phase::Transferring;
        }
        let ratio = (loaded as f64 / total as f64).clamp(0.0, 1.0);
        self.raise(ratio * self.transfer_share);
        Some(self.snapshot())
    }

    /// Network part done; what remains (decryption) is not observable.
    pub fn finalize(&mut self) -> Option<ProgressSnapshot> {
        if self.phase.is_terminal() {
            return None;
        }
        self.phase = Phase::Finalizing;
        Some(self.snapshot())
    }

    /// One synthetic step, never past the cap.
    pub fn tick(&mut self) -> Option<ProgressSnapshot> {
        if self.phase.is_terminal() {
            return None;
        }
        if self.phase == Phase::Idle {
            self.phase = Phase::Transferring;
        }
        if self.percent < self.synthetic_cap {
            self.percent = (self.percent + self.tick_step).min(self.synthetic_cap);
        }
        Some(self.snapshot())
    }

    pub fn complete(&mut self) -> Option<ProgressSnapshot> {
        if self.phase.is_terminal() {
            return None;
        }
        self.phase = Phase::Complete;
        self.percent = 100.0;
        Some(self.snapshot())
    }

    pub fn fail(&mut self) -> Option<ProgressSnapshot> {
        if self.phase.is_terminal() {
            return None;
        }
        self.phase = Phase::Failed;
        self.percent = 0.0;
        Some(self.snapshot())
    }

    fn raise(&mut self, target: f64) {
        if target > self.percent {
            self.percent = target.min(100.0);
        }
    }
}

/// Per-transfer progress handle: the estimator, its sink, and at most one
/// ticker task. Cloning shares the same state; transfers never share one.
#[derive(Clone)]
pub struct ProgressTracker {
    shared: Arc<Shared>,
}

struct Shared {
    estimator: Mutex<ProgressEstimator>,
    sink: Option<ProgressFn>,
    tick_interval: Duration,
    ticker: Mutex<Option<DropGuard>>,
}

impl ProgressTracker {
    pub fn new(direction: Direction, cfg: &ProgressConfig, sink: Option<ProgressFn>) -> Self {
        Self {
            shared: Arc::new(Shared {
                estimator: Mutex::new(ProgressEstimator::new(direction, cfg)),
                sink,
                tick_interval: cfg.tick_interval(),
                ticker: Mutex::new(None),
            }),
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        lock(&self.shared.estimator).snapshot()
    }

    pub fn start(&self) {
        self.apply(ProgressEstimator::start);
    }

    pub fn restart(&self) {
        self.apply(ProgressEstimator::restart);
    }

    pub fn observe(&self, loaded: u64, total: u64) {
        self.apply(|est| est.observe(loaded, total));
    }

    /// Byte callback from the transport. Unknown totals fall back to the ticker.
    pub fn observe_bytes(&self, loaded: u64, total: Option<u64>) {
        match total {
            Some(total) if total > 0 => self.observe(loaded, total),
            _ => self.start_ticker(),
        }
    }

    pub fn finalize(&self) {
        self.apply(ProgressEstimator::finalize);
        self.start_ticker();
    }

    pub fn complete(&self) {
        self.apply(ProgressEstimator::complete);
        self.stop_ticker();
    }

    pub fn fail(&self) {
        self.apply(ProgressEstimator::fail);
        self.stop_ticker();
    }

    pub fn is_ticking(&self) -> bool {
        lock(&self.shared.ticker).is_some()
    }

    /// Spawn the synthetic ticker unless one is running or the transfer has
    /// already finished. Must be called from within a tokio runtime.
    pub fn start_ticker(&self) {
        let mut ticker = lock(&self.shared.ticker);
        if ticker.is_some() || lock(&self.shared.estimator).phase().is_terminal() {
            return;
        }

        let token = CancellationToken::new();
        let cancelled = token.clone();
        let weak = Arc::downgrade(&self.shared);
        let period = self.shared.tick_interval;

        tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = interval.tick() => {
                        if cancelled.is_cancelled() || !tick_once(&weak) {
                            break;
                        }
                    }
                }
            }
            tracing::trace!("progress ticker stopped");
        });

        *ticker = Some(token.drop_guard());
    }

    pub fn stop_ticker(&self) {
        // Dropping the guard cancels the token.
        lock(&self.shared.ticker).take();
    }

    fn apply(&self, f: impl FnOnce(&mut ProgressEstimator) -> Option<ProgressSnapshot>) {
        apply(&self.shared, f);
    }
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("snapshot", &self.snapshot())
            .field("ticking", &self.is_ticking())
            .finish()
    }
}

/// Returns false once the tracker is gone or finished.
fn tick_once(weak: &Weak<Shared>) -> bool {
    let Some(shared) = weak.upgrade() else {
        return false;
    };
    apply(&shared, ProgressEstimator::tick)
}

/// Mutate and emit under the estimator lock, so a snapshot can never be
/// delivered after a later one.
fn apply(
    shared: &Shared,
    f: impl FnOnce(&mut ProgressEstimator) -> Option<ProgressSnapshot>,
) -> bool {
    let mut est = lock(&shared.estimator);
    match f(&mut est) {
        Some(snapshot) => {
            if let Some(sink) = &shared.sink {
                sink(snapshot);
            }
            true
        }
        None => false,
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
