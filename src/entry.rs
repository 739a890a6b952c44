use std::collections::VecDeque;

use serde::Serialize;

/// One recorded event: when it happened and how much it carried.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Packet {
    pub at_ms: u64,
    pub amount: f64,
}

/// Point-in-time view of a key, returned by reads.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Snapshot<M> {
    pub total: f64,
    /// Amount per second over the trailing window.
    pub rate: f64,
    pub metadata: Option<M>,
}

/// Per-key record. `total` is a running sum of everything ever added;
/// `packets` only feeds the rate and is pruned against the window.
#[derive(Debug)]
pub struct Entry<M> {
    total: f64,
    rate: f64,
    packets: VecDeque<Packet>,
    metadata: Option<M>,
}

// Manual impl so that `M` itself needs no `Default`.
impl<M> Default for Entry<M> {
    fn default() -> Self {
        Self {
            total: 0.0,
            rate: 0.0,
            packets: VecDeque::new(),
            metadata: None,
        }
    }
}

impl<M> Entry<M> {
    pub fn record(&mut self, amount: f64, metadata: M, now_ms: u64) {
        self.metadata = Some(metadata);
        self.total += amount;
        self.packets.push_back(Packet { at_ms: now_ms, amount });
    }

    /// Drop packets that fell out of the window and recompute the rate.
    /// Returns how many packets were pruned.
    pub fn refresh(&mut self, now_ms: u64, window_ms: u64) -> usize {
        let mut pruned = 0;
        while let Some(p) = self.packets.front() {
            if p.at_ms.saturating_add(window_ms) < now_ms {
                self.packets.pop_front();
                pruned += 1;
            } else {
                break;
            }
        }

        self.rate = match self.packets.front() {
            None => 0.0,
            Some(oldest) => {
                // floor at 1ms so a just-added packet can't divide by ~0
                let span_secs = now_ms.saturating_sub(oldest.at_ms).max(1) as f64 / 1000.0;
                let sum: f64 = self.packets.iter().map(|p| p.amount).sum();
                sum / span_secs
            }
        };
        pruned
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn packets(&self) -> &VecDeque<Packet> {
        &self.packets
    }

    pub fn metadata(&self) -> Option<&M> {
        self.metadata.as_ref()
    }
}

impl<M: Clone> Entry<M> {
    pub fn snapshot(&self) -> Snapshot<M> {
        Snapshot {
            total: self.total,
            rate: self.rate,
            metadata: self.metadata.clone(),
        }
    }
}
