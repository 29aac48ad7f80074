//! Optional observability helpers for broker operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` (default) to emit spans named `lease_broker.op` with the `op` and `role`
//!   fields, plus structured events for renewals, expiries, and revocation failures.
//! - Enable `metrics` to increment the `lease_broker_op_total` counter for every
//!   attempt/success/failure, labeled by `op` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Broker operations observed by spans and counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LeaseOp {
	/// Synchronous issuance on behalf of a consumer.
	Issue,
	/// Timer-driven re-issuance ahead of expiry.
	Renew,
	/// Administrative re-issuance.
	Rotate,
	/// Revocation of a retired lease.
	Revoke,
	/// Auth session handshake.
	AuthRefresh,
}
impl LeaseOp {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			LeaseOp::Issue => "issue",
			LeaseOp::Renew => "renew",
			LeaseOp::Rotate => "rotate",
			LeaseOp::Revoke => "revoke",
			LeaseOp::AuthRefresh => "auth_refresh",
		}
	}
}
impl Display for LeaseOp {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpOutcome {
	/// Entry to a broker operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl OpOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpOutcome::Attempt => "attempt",
			OpOutcome::Success => "success",
			OpOutcome::Failure => "failure",
		}
	}
}
impl Display for OpOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
