//! Per-role renewal loop driven by the scheduler's timer tasks.

// std
use std::pin;
// self
use crate::{
	_prelude::*,
	broker::CredentialBroker,
	lease::{Lease, LeaseState, RoleName},
	obs::{self, LeaseOp, OpOutcome, OpSpan},
	scheduler::{TimerHandle, TimerState},
};

/// How one renewal cycle ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RenewalOutcome {
	/// A replacement lease is active.
	Renewed,
	/// Another flow replaced or removed the lease first.
	Superseded,
	/// The lease reached its hard expiry.
	Expired,
	/// The backend lost the role; the lease was left to lapse and the timer stops.
	Halted,
}

impl CredentialBroker {
	/// Timer task body for `role`; runs until cancelled or halted.
	pub(super) async fn run_timer(self, role: RoleName, handle: TimerHandle) {
		loop {
			let Some(lease) = self.store.get(&role).filter(|lease| lease.state.is_live()) else {
				handle.set(TimerState::Idle);
				handle.wake.notified().await;

				continue;
			};
			let renew_at = lease.renew_at(self.config.renewal_fraction);

			handle.set(TimerState::Scheduled {
				credential_id: lease.credential_id.clone(),
				renew_at,
			});
			obs::renewal_scheduled(&role, &lease.credential_id, renew_at);

			tokio::select! {
				_ = tokio::time::sleep_until(self.clock.deadline(renew_at)) => {},
				_ = handle.wake.notified() => continue,
			}

			if self.renew(&role, &lease, &handle).await == RenewalOutcome::Halted {
				self.scheduler.retire(&role, &handle);

				return;
			}
		}
	}

	/// Replaces `lease`, retrying transient failures with backoff until its hard expiry.
	async fn renew(&self, role: &RoleName, lease: &Lease, handle: &TimerHandle) -> RenewalOutcome {
		const OP: LeaseOp = LeaseOp::Renew;

		if !self.is_current(role, lease) {
			return RenewalOutcome::Superseded;
		}

		self.store.transition(role, &lease.credential_id, LeaseState::Renewing);

		let mut attempt = 0;

		loop {
			handle.set(TimerState::Firing { credential_id: lease.credential_id.clone(), attempt });
			obs::record_op_outcome(OP, OpOutcome::Attempt);

			let result = OpSpan::new(OP, role).instrument(self.renew_once(role, lease)).await;
			let e = match result {
				Ok(Some(_)) => {
					obs::record_op_outcome(OP, OpOutcome::Success);
					self.metrics.record_renewed();

					return RenewalOutcome::Renewed;
				},
				Ok(None) => return RenewalOutcome::Superseded,
				Err(e) => e,
			};

			obs::record_op_outcome(OP, OpOutcome::Failure);
			self.metrics.record_issue_failure();

			if e.is_role_not_found() {
				obs::role_halted(role, &e);

				// Still serve the lease until it lapses, then retire the timer.
				return match self.expire(role, lease, handle).await {
					RenewalOutcome::Superseded => RenewalOutcome::Superseded,
					_ => RenewalOutcome::Halted,
				};
			}

			attempt += 1;
			handle.set(TimerState::Firing { credential_id: lease.credential_id.clone(), attempt });

			let delay = self.backoff.delay(attempt);
			let retry_at = self.clock.now() + delay;
			let exhausted = self.config.max_renewal_retries.is_some_and(|max| attempt > max);

			if exhausted || retry_at >= lease.expires_at() {
				return self.expire(role, lease, handle).await;
			}

			obs::renewal_retry(role, attempt, delay, &e);

			if !self.wait_or_superseded(role, lease, handle, retry_at).await {
				return RenewalOutcome::Superseded;
			}
		}
	}

	/// One issuance attempt under the role's flow guard; `Ok(None)` when `lease` is no longer
	/// current.
	async fn renew_once(&self, role: &RoleName, lease: &Lease) -> Result<Option<Lease>> {
		let guard = self.flow_guard(role);
		let _singleflight = guard.lock().await;

		if !self.is_current(role, lease) {
			return Ok(None);
		}

		self.issue_locked(role).await.map(Some)
	}

	/// Waits until `until`; returns `false` as soon as `lease` stops being current.
	async fn wait_or_superseded(
		&self,
		role: &RoleName,
		lease: &Lease,
		handle: &TimerHandle,
		until: OffsetDateTime,
	) -> bool {
		let mut sleep = pin::pin!(tokio::time::sleep_until(self.clock.deadline(until)));

		loop {
			tokio::select! {
				_ = &mut sleep => return self.is_current(role, lease),
				_ = handle.wake.notified() => if !self.is_current(role, lease) {
					return false;
				},
			}
		}
	}

	/// Waits for the hard expiry of `lease` and marks it expired unless it was replaced first.
	async fn expire(&self, role: &RoleName, lease: &Lease, handle: &TimerHandle) -> RenewalOutcome {
		if !self.wait_or_superseded(role, lease, handle, lease.expires_at()).await {
			return RenewalOutcome::Superseded;
		}

		let guard = self.flow_guard(role);
		let _singleflight = guard.lock().await;

		match self.store.transition(role, &lease.credential_id, LeaseState::Expired) {
			Some(_) => {
				self.metrics.record_expired();
				obs::lease_expired(role, &lease.credential_id);

				RenewalOutcome::Expired
			},
			None => RenewalOutcome::Superseded,
		}
	}

	fn is_current(&self, role: &RoleName, lease: &Lease) -> bool {
		self.store.get(role).is_some_and(|current| {
			current.credential_id == lease.credential_id && current.state.is_live()
		})
	}
}
