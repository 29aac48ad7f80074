//! Bounded exponential backoff with symmetric jitter.

// crates.io
use rand::Rng;
// self
use crate::{_prelude::*, config::BrokerConfig};

/// Retry delay policy for failed renewals.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
	/// Delay before the first retry.
	pub base: Duration,
	/// Upper bound for any delay, jitter included.
	pub cap: Duration,
	/// Relative jitter (`0.2` means ±20%).
	pub jitter: f64,
}
impl BackoffPolicy {
	/// Reads the policy from broker options.
	pub fn from_config(config: &BrokerConfig) -> Self {
		Self { base: config.backoff_base, cap: config.backoff_cap, jitter: config.backoff_jitter }
	}

	/// Delay before retry number `attempt` (1-based) with random jitter.
	pub fn delay(&self, attempt: u32) -> Duration {
		self.delay_with(attempt, rand::rng().random_range(-1.0..=1.0))
	}

	/// Delay before retry number `attempt` with jitter position `unit` in `[-1, 1]`.
	pub fn delay_with(&self, attempt: u32, unit: f64) -> Duration {
		let exponent = attempt.saturating_sub(1).min(30);
		let raw = self.base.checked_mul(1 << exponent).unwrap_or(self.cap).min(self.cap);
		let factor = 1. + self.jitter * unit.clamp(-1., 1.);

		(raw * factor).clamp(Duration::ZERO, self.cap)
	}
}
