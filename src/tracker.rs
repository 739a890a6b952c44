use std::time::Duration;

use dashmap::DashMap;
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::config::TrackerConfig;
use crate::entry::{Entry, Snapshot};
use crate::error::TrackerError;

/// Per-key running totals with a trailing-window rate.
///
/// Keys are created on first touch (`add` or `get`) and never removed.
/// The map is sharded by key: every call holds its key's shard guard for the
/// whole lookup, prune and recompute, so calls on the same key are serialized
/// while keys in other shards proceed in parallel.
pub struct RateTracker<M, C = SystemClock> {
    entries: DashMap<String, Entry<M>>,
    window_ms: u64,
    clock: C,
}

impl<M> RateTracker<M> {
    pub fn new() -> Self {
        Self::with_config(TrackerConfig::default())
    }

    pub fn with_config(config: TrackerConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<M> Default for RateTracker<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M, C: Clock> RateTracker<M, C> {
    pub fn with_clock(config: TrackerConfig, clock: C) -> Self {
        Self {
            entries: DashMap::new(),
            window_ms: config.window_ms(),
            clock,
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// Record `amount` for `key` and replace its metadata. Amounts are not
    /// validated: negative or non-finite values flow into the total and rate.
    pub fn add(&self, key: &str, amount: f64, metadata: M) {
        let mut entry = self.entries.entry(key.to_string()).or_default();
        // read the clock under the guard so packets stay in timestamp order
        let now = self.clock.now_ms();
        entry.record(amount, metadata, now);
        self.refresh(key, &mut entry, now);
    }

    /// Strict variant of [`add`](Self::add). A rejected call leaves the
    /// tracker untouched, including not creating the key.
    pub fn try_add(&self, key: &str, amount: f64, metadata: M) -> Result<(), TrackerError> {
        if key.is_empty() {
            return Err(TrackerError::EmptyKey);
        }
        if !amount.is_finite() {
            return Err(TrackerError::NonFiniteAmount {
                key: key.to_string(),
                amount,
            });
        }
        if amount < 0.0 {
            return Err(TrackerError::NegativeAmount {
                key: key.to_string(),
                amount,
            });
        }
        self.add(key, amount, metadata);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Unlike `get`, this does not materialize the key.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn refresh(&self, key: &str, entry: &mut Entry<M>, now: u64) {
        let pruned = entry.refresh(now, self.window_ms);
        if pruned > 0 {
            debug!(key, pruned, remaining = entry.packets().len(), "Pruned stale packets");
        }
    }
}

impl<M: Clone, C: Clock> RateTracker<M, C> {
    /// Current total, freshly computed rate and metadata for `key`. An unseen
    /// key is created empty and reads as zero.
    pub fn get(&self, key: &str) -> Snapshot<M> {
        let mut entry = self.entries.entry(key.to_string()).or_default();
        let now = self.clock.now_ms();
        self.refresh(key, &mut entry, now);
        entry.snapshot()
    }

    /// Snapshot of every key, sorted by key. Rates are recomputed as of now.
    pub fn snapshots(&self) -> Vec<(String, Snapshot<M>)> {
        let mut out: Vec<(String, Snapshot<M>)> = self
            .entries
            .iter_mut()
            .map(|mut e| {
                let key = e.key().clone();
                let now = self.clock.now_ms();
                self.refresh(&key, e.value_mut(), now);
                (key, e.value().snapshot())
            })
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}
