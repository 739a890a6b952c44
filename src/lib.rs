//! Per-key running totals paired with a throughput rate over a trailing
//! time window.
//!
//! ```
//! use keyrate::RateTracker;
//!
//! let tracker = RateTracker::new();
//! tracker.add("conn-1", 1500.0, "10.0.0.7:443");
//! let snap = tracker.get("conn-1");
//! assert_eq!(snap.total, 1500.0);
//! assert_eq!(snap.metadata, Some("10.0.0.7:443"));
//! ```

pub mod clock;
pub mod config;
pub mod entry;
pub mod error;
pub mod tracker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{TrackerConfig, WINDOW_SIZE};
pub use entry::{Packet, Snapshot};
pub use error::TrackerError;
pub use tracker::RateTracker;
