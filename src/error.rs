use thiserror::Error;

/// Rejections raised by [`RateTracker::try_add`](crate::RateTracker::try_add).
/// The permissive `add` never produces these.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TrackerError {
    #[error("key must not be empty")]
    EmptyKey,
    #[error("amount {amount} for key {key:?} is negative")]
    NegativeAmount { key: String, amount: f64 },
    #[error("amount {amount} for key {key:?} is not a finite number")]
    NonFiniteAmount { key: String, amount: f64 },
}
