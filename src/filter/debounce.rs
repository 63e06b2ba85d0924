use std::time::{Duration, Instant};

/// Reference quiescence window for search input.
pub const DEFAULT_SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Holds at most one pending value and releases it once input has been quiet for `window`.
///
/// Scheduling while a value is pending replaces it and restarts the window, so a burst of
/// keystrokes produces a single release carrying the last value. The caller drives time: it passes
/// `now` in and asks `next_deadline` how long it may sleep.
#[derive(Debug)]
pub struct Debouncer<T> {
    window: Duration,
    pending: Option<(Instant, T)>,
}

impl<T> Debouncer<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    /// Schedule `value` for release at `now + window`. Returns true if a pending value was
    /// superseded.
    pub fn schedule(&mut self, now: Instant, value: T) -> bool {
        self.pending.replace((now + self.window, value)).is_some()
    }

    /// Release the pending value if its deadline has passed. A value is released exactly once.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((deadline, _)) if now >= *deadline => self.pending.take().map(|(_, value)| value),
            _ => None,
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(deadline, _)| *deadline)
    }

    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|(_, value)| value)
    }
}
