// self
use crate::{
	_prelude::*,
	broker::CredentialBroker,
	error::{LeaseUnavailable, UnavailableReason},
	lease::{Lease, RoleName},
	obs::{self, LeaseOp, OpOutcome, OpSpan},
};

impl CredentialBroker {
	/// Issues a replacement lease for `role` regardless of the current one.
	///
	/// The current lease stays servable until the replacement is active and is then revoked in
	/// the background. A renewal in progress for the role is superseded. The issuance runs on
	/// its own task, so dropping the returned future never strands an issued credential.
	pub async fn force_rotate(&self, role: &RoleName) -> Result<Lease> {
		self.admit(role)?;

		let broker = self.clone();
		let owned = role.clone();

		match tokio::spawn(async move { broker.rotate(&owned).await }).await {
			Ok(result) => result,
			Err(e) => Err(LeaseUnavailable::new(
				role.clone(),
				UnavailableReason::Backend,
				e.to_string(),
			)
			.into()),
		}
	}

	/// Revokes the current lease of `role` ahead of its expiry.
	///
	/// The slot is cleared before the backend is called, so no consumer receives the lease
	/// afterwards; the next [`get_credential`](Self::get_credential) issues a new one. Returns the
	/// revoked lease, or `None` when the role had none. Backend failures are recorded in the
	/// role history and otherwise ignored.
	pub async fn revoke(&self, role: &RoleName) -> Result<Option<Lease>> {
		if !self.config.manages(role) {
			return Err(LeaseUnavailable::unmanaged(role).into());
		}

		let revoked = {
			let guard = self.flow_guard(role);
			let _singleflight = guard.lock().await;

			self.store.mark_revoked(role, self.clock.now())
		};
		let Some(revoked) = revoked else {
			return Ok(None);
		};

		self.scheduler.wake(role);
		self.revoke_with_backend(&revoked).await;

		Ok(Some(revoked))
	}

	async fn rotate(&self, role: &RoleName) -> Result<Lease> {
		const OP: LeaseOp = LeaseOp::Rotate;

		let span = OpSpan::new(OP, role);
		let guard = self.flow_guard(role);

		obs::record_op_outcome(OP, OpOutcome::Attempt);

		let result = span
			.instrument(async {
				let _singleflight = guard.lock().await;

				self.issue_locked(role).await
			})
			.await;

		match &result {
			Ok(_) => {
				obs::record_op_outcome(OP, OpOutcome::Success);
				self.metrics.record_rotated();
			},
			Err(_) => {
				obs::record_op_outcome(OP, OpOutcome::Failure);
				self.metrics.record_issue_failure();
			},
		}

		result
	}
}
