use std::time::{Duration, Instant};

/// A simple debouncer that tracks when an action should be triggered
/// after a period of inactivity.
///
/// Time is passed in by the caller so the debouncer can be driven by any
/// [`Clock`](crate::utils::clock::Clock).
#[derive(Debug, Clone)]
pub struct Debouncer {
    /// The duration to wait after the last event before triggering
    delay: Duration,
    /// When the last event occurred
    last_event: Option<Instant>,
    /// Whether we have a pending trigger
    pending: bool,
}

impl Debouncer {
    /// Create a new debouncer with the specified delay in milliseconds
    pub fn new(delay_ms: u64) -> Self {
        Self::with_delay(Duration::from_millis(delay_ms))
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            last_event: None,
            pending: false,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Register that an event occurred, restarting the quiet period
    pub fn trigger(&mut self, now: Instant) {
        self.last_event = Some(now);
        self.pending = true;
    }

    /// Check if enough time has passed to execute the debounced action.
    /// Returns true exactly once per burst.
    pub fn should_execute(&mut self, now: Instant) -> bool {
        if !self.pending {
            return false;
        }

        if let Some(last) = self.last_event {
            if now.saturating_duration_since(last) >= self.delay {
                self.pending = false;
                self.last_event = None;
                return true;
            }
        }
        false
    }

    /// Get the time remaining before the action will trigger.
    /// Returns None if no action is pending
    pub fn time_remaining(&self, now: Instant) -> Option<Duration> {
        if !self.pending {
            return None;
        }

        self.last_event
            .map(|last| self.delay.saturating_sub(now.saturating_duration_since(last)))
    }

    /// Instant at which the pending action fires
    pub fn deadline(&self) -> Option<Instant> {
        if !self.pending {
            return None;
        }
        self.last_event.map(|last| last + self.delay)
    }

    /// Reset the debouncer, canceling any pending action
    pub fn reset(&mut self) {
        self.last_event = None;
        self.pending = false;
    }

    /// Check if there's a pending action
    pub fn is_pending(&self) -> bool {
        self.pending
    }
}
