// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for broker activity.
#[derive(Debug, Default)]
pub struct BrokerMetrics {
	issued: AtomicU64,
	renewed: AtomicU64,
	rotated: AtomicU64,
	issue_failures: AtomicU64,
	revoked: AtomicU64,
	revoke_failures: AtomicU64,
	expired: AtomicU64,
	auth_refreshes: AtomicU64,
}
impl BrokerMetrics {
	/// Leases activated, whatever triggered the issuance.
	pub fn issued(&self) -> u64 {
		self.issued.load(Ordering::Relaxed)
	}

	/// Leases activated by the renewal timer.
	pub fn renewed(&self) -> u64 {
		self.renewed.load(Ordering::Relaxed)
	}

	/// Leases activated by `force_rotate`.
	pub fn rotated(&self) -> u64 {
		self.rotated.load(Ordering::Relaxed)
	}

	/// Issuance attempts that failed.
	pub fn issue_failures(&self) -> u64 {
		self.issue_failures.load(Ordering::Relaxed)
	}

	/// Leases the backend confirmed as revoked.
	pub fn revoked(&self) -> u64 {
		self.revoked.load(Ordering::Relaxed)
	}

	/// Revocation calls that failed.
	pub fn revoke_failures(&self) -> u64 {
		self.revoke_failures.load(Ordering::Relaxed)
	}

	/// Leases that reached hard expiry without a replacement.
	pub fn expired(&self) -> u64 {
		self.expired.load(Ordering::Relaxed)
	}

	/// Session refreshes forced by a backend rejecting the session token.
	pub fn auth_refreshes(&self) -> u64 {
		self.auth_refreshes.load(Ordering::Relaxed)
	}

	pub(crate) fn record_issued(&self) {
		self.issued.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_renewed(&self) {
		self.renewed.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_rotated(&self) {
		self.rotated.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_issue_failure(&self) {
		self.issue_failures.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_revoked(&self) {
		self.revoked.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_revoke_failure(&self) {
		self.revoke_failures.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_expired(&self) {
		self.expired.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_auth_refresh(&self) {
		self.auth_refreshes.fetch_add(1, Ordering::Relaxed);
	}
}
