// self
use crate::{
	_prelude::*,
	broker::CredentialBroker,
	clock,
	error::{LeaseUnavailable, UnavailableReason},
	lease::{Credential, Lease, RoleName},
	obs::{self, LeaseOp, OpOutcome, OpSpan},
};

impl CredentialBroker {
	/// Returns the current credential of `role`, issuing one first when none is servable.
	///
	/// Waits at most [`BrokerConfig::request_timeout`](crate::BrokerConfig::request_timeout).
	pub async fn get_credential(&self, role: &RoleName) -> Result<Credential, LeaseUnavailable> {
		self.get_credential_with_timeout(role, self.config.request_timeout).await
	}

	/// Same as [`get_credential`](Self::get_credential) with an explicit timeout.
	///
	/// Concurrent callers for the same role share one issuance. A caller that times out stops
	/// waiting but does not cancel that issuance; its result still lands in the store for the
	/// next caller.
	pub async fn get_credential_with_timeout(
		&self,
		role: &RoleName,
		timeout: Duration,
	) -> Result<Credential, LeaseUnavailable> {
		self.admit(role)?;

		if let Some(lease) = self.store.get_servable(role, self.clock.now()) {
			return Ok(lease.credential());
		}

		let broker = self.clone();
		let owned = role.clone();
		let issuance = tokio::spawn(async move { broker.ensure_lease(&owned).await });

		match tokio::time::timeout(clock::to_std(timeout), issuance).await {
			Ok(Ok(Ok(lease))) => Ok(lease.credential()),
			Ok(Ok(Err(Error::LeaseUnavailable(e)))) => Err(e),
			Ok(Ok(Err(e))) => Err(LeaseUnavailable::from_error(role.clone(), &e)),
			Ok(Err(e)) => Err(LeaseUnavailable::new(
				role.clone(),
				UnavailableReason::Backend,
				e.to_string(),
			)),
			Err(_) => Err(LeaseUnavailable::new(
				role.clone(),
				UnavailableReason::Timeout,
				format!("no lease within {timeout}"),
			)),
		}
	}

	/// Returns a servable lease, issuing under the role's flow guard when needed.
	async fn ensure_lease(&self, role: &RoleName) -> Result<Lease> {
		const OP: LeaseOp = LeaseOp::Issue;

		let span = OpSpan::new(OP, role);
		let guard = self.flow_guard(role);

		obs::record_op_outcome(OP, OpOutcome::Attempt);

		let result = span
			.instrument(async {
				let _singleflight = guard.lock().await;

				// Another caller may have finished issuing while this one waited.
				if let Some(lease) = self.store.get_servable(role, self.clock.now()) {
					return Ok(lease);
				}
				if self.scheduler.is_shut_down() {
					return Err(LeaseUnavailable::shut_down(role).into());
				}

				self.issue_locked(role).await
			})
			.await;

		match &result {
			Ok(_) => obs::record_op_outcome(OP, OpOutcome::Success),
			Err(_) => {
				obs::record_op_outcome(OP, OpOutcome::Failure);
				self.metrics.record_issue_failure();
			},
		}

		result
	}
}
