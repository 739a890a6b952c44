use std::time::Duration;

/// Default trailing window used for rate computation.
pub const WINDOW_SIZE: Duration = Duration::from_millis(10_000);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrackerConfig {
    pub window: Duration,
}

impl TrackerConfig {
    pub fn with_window(window: Duration) -> Self {
        Self { window }
    }

    pub(crate) fn window_ms(&self) -> u64 {
        u64::try_from(self.window.as_millis()).unwrap_or(u64::MAX)
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self { window: WINDOW_SIZE }
    }
}
