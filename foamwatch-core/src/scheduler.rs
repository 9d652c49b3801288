use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running { next_due: Instant },
}

/// Cooperative refresh timer. Holds no callback and no thread: the owner's
/// loop calls [`RefreshScheduler::poll`] and runs the tick itself when it
/// returns `true`. Stopping only flips the state, so nothing can fire later.
#[derive(Debug, Clone)]
pub struct RefreshScheduler {
    interval: Duration,
    state: SchedulerState,
    ticks: u64,
}

impl RefreshScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            state: SchedulerState::Idle,
            ticks: 0,
        }
    }

    pub fn from_millis(interval_ms: u64) -> Self {
        Self::new(Duration::from_millis(interval_ms))
    }

    /// Starts ticking; the first tick is due immediately. Returns `false`
    /// when already running (the pending deadline is kept).
    pub fn start(&mut self, now: Instant) -> bool {
        match self.state {
            SchedulerState::Running { .. } => false,
            SchedulerState::Idle => {
                self.state = SchedulerState::Running { next_due: now };
                true
            }
        }
    }

    /// Returns `false` when already idle.
    pub fn stop(&mut self) -> bool {
        match self.state {
            SchedulerState::Idle => false,
            SchedulerState::Running { .. } => {
                self.state = SchedulerState::Idle;
                true
            }
        }
    }

    /// Returns `true` when a tick is due and re-arms for one interval later.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.state {
            SchedulerState::Running { next_due } if now >= next_due => {
                self.state = SchedulerState::Running {
                    next_due: now + self.interval,
                };
                self.ticks += 1;
                true
            }
            _ => false,
        }
    }

    /// Time left before the next tick, `None` when idle.
    pub fn time_until_next(&self, now: Instant) -> Option<Duration> {
        match self.state {
            SchedulerState::Idle => None,
            SchedulerState::Running { next_due } => Some(next_due.saturating_duration_since(now)),
        }
    }

    /// Takes effect when the next tick re-arms.
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, SchedulerState::Running { .. })
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}
