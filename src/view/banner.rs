use std::time::{Duration, Instant};

pub const DEFAULT_BANNER_TTL: Duration = Duration::from_secs(5);

/// Transient user-visible message. Every recoverable failure is reported this way.
#[derive(Debug, Clone, PartialEq)]
pub struct Banner {
    pub message: String,
    pub shown_at: Instant,
    pub ttl: Duration,
}

impl Banner {
    pub fn new(message: impl Into<String>, shown_at: Instant, ttl: Duration) -> Self {
        Self {
            message: message.into(),
            shown_at,
            ttl,
        }
    }

    pub fn is_visible(&self, now: Instant) -> bool {
        now < self.dismissed_at()
    }

    pub fn dismissed_at(&self) -> Instant {
        self.shown_at + self.ttl
    }
}
