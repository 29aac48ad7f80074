//! Wall-clock timestamps derived from tokio's monotonic clock.
//!
//! Lease timestamps are [`OffsetDateTime`] values, while timers are driven by
//! [`tokio::time`]. [`Clock`] anchors one to the other once, so a wall-clock jump never
//! shifts a renewal deadline and a paused tokio clock (in tests) pauses lease time too.

// crates.io
use tokio::time::Instant;
// self
use crate::_prelude::*;

/// Stand-in distance for deadlines the monotonic clock cannot represent.
pub const FAR_FUTURE: std::time::Duration = std::time::Duration::from_secs(86_400 * 365 * 30);

/// Monotonic clock producing [`OffsetDateTime`] readings.
#[derive(Clone, Copy, Debug)]
pub struct Clock {
	wall: OffsetDateTime,
	mono: Instant,
}
impl Clock {
	/// Anchors a new clock at the current instant.
	pub fn new() -> Self {
		Self { wall: OffsetDateTime::now_utc(), mono: Instant::now() }
	}

	/// Anchors a clock so that the current instant reads as `wall`.
	pub fn anchored_at(wall: OffsetDateTime) -> Self {
		Self { wall, mono: Instant::now() }
	}

	/// Current reading.
	pub fn now(&self) -> OffsetDateTime {
		self.wall + self.mono.elapsed()
	}

	/// Tokio deadline matching the wall-clock instant `at`; past instants map to now and
	/// instants beyond the monotonic range map to [`FAR_FUTURE`] from now.
	pub fn deadline(&self, at: OffsetDateTime) -> Instant {
		let now = Instant::now();

		now.checked_add(to_std(at - self.now())).unwrap_or(now + FAR_FUTURE)
	}
}
impl Default for Clock {
	fn default() -> Self {
		Self::new()
	}
}

/// Converts a signed duration into a std duration, clamping negatives to zero.
pub(crate) fn to_std(duration: Duration) -> std::time::Duration {
	std::time::Duration::try_from(duration).unwrap_or(std::time::Duration::ZERO)
}
