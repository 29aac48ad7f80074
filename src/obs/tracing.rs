// self
use crate::{
	_prelude::*,
	lease::{CredentialId, RoleName},
	obs::LeaseOp,
};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedOp<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedOp<F> = F;

/// A span builder used by broker operations.
#[derive(Clone, Debug)]
pub struct OpSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl OpSpan {
	/// Creates a new span tagged with the provided operation + role.
	pub fn new(op: LeaseOp, role: &str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("lease_broker.op", op = op.as_str(), role);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (op, role);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedOp<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// A lease became the role's current credential.
pub(crate) fn lease_activated(role: &RoleName, id: &CredentialId, expires_at: OffsetDateTime) {
	#[cfg(feature = "tracing")]
	tracing::info!(role = %role, credential_id = %id, %expires_at, "lease activated");
	#[cfg(not(feature = "tracing"))]
	let _ = (role, id, expires_at);
}

/// A renewal timer was armed.
pub(crate) fn renewal_scheduled(role: &RoleName, id: &CredentialId, at: OffsetDateTime) {
	#[cfg(feature = "tracing")]
	tracing::debug!(role = %role, credential_id = %id, renew_at = %at, "renewal scheduled");
	#[cfg(not(feature = "tracing"))]
	let _ = (role, id, at);
}

/// A renewal attempt failed and will be retried.
pub(crate) fn renewal_retry(role: &RoleName, attempt: u32, delay: Duration, error: &Error) {
	#[cfg(feature = "tracing")]
	tracing::warn!(
		role = %role,
		attempt,
		delay_ms = delay.whole_milliseconds() as u64,
		error = %error,
		"renewal failed, backing off"
	);
	#[cfg(not(feature = "tracing"))]
	let _ = (role, attempt, delay, error);
}

/// A lease reached its hard expiry without a replacement.
pub(crate) fn lease_expired(role: &RoleName, id: &CredentialId) {
	#[cfg(feature = "tracing")]
	tracing::error!(role = %role, credential_id = %id, "lease expired before renewal succeeded");
	#[cfg(not(feature = "tracing"))]
	let _ = (role, id);
}

/// Renewal for a role stopped because of a non-retryable failure.
pub(crate) fn role_halted(role: &RoleName, error: &Error) {
	#[cfg(feature = "tracing")]
	tracing::error!(role = %role, error = %error, "renewal halted for role");
	#[cfg(not(feature = "tracing"))]
	let _ = (role, error);
}

/// Best-effort revocation of a retired lease failed.
pub(crate) fn revocation_failed(role: &RoleName, id: &CredentialId, error: &Error) {
	#[cfg(feature = "tracing")]
	tracing::warn!(role = %role, credential_id = %id, error = %error, "lease revocation failed");
	#[cfg(not(feature = "tracing"))]
	let _ = (role, id, error);
}

/// The auth session was (re)established.
pub(crate) fn session_refreshed(role_id: &str, expires_at: OffsetDateTime) {
	#[cfg(feature = "tracing")]
	tracing::info!(role_id, %expires_at, "auth session refreshed");
	#[cfg(not(feature = "tracing"))]
	let _ = (role_id, expires_at);
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = OpSpan::new(LeaseOp::Issue, "audit-role");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}
}
