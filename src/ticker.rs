use std::time::{Duration, Instant};

/// Fixed-interval tick source for host loops.
///
/// Yields at most one tick per poll. A host that falls behind gets one tick
/// and a fresh schedule, never a burst of catch-up ticks.
#[derive(Debug, Clone)]
pub struct Ticker {
    interval: Duration,
    next_due: Option<Instant>,
}

impl Ticker {
    pub fn new(interval: Duration) -> Self {
        Self { interval, next_due: None }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
        self.next_due = None;
    }

    /// When the next tick is due; `None` means immediately
    pub fn next_deadline(&self) -> Option<Instant> {
        self.next_due
    }

    /// Whether a tick is due at `now`. Consumes the tick if so.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.next_due {
            Some(due) if now < due => false,
            Some(due) => {
                let mut next = due + self.interval;
                if next <= now {
                    next = now + self.interval;
                }
                self.next_due = Some(next);
                true
            }
            None => {
                self.next_due = Some(now + self.interval);
                true
            }
        }
    }
}
