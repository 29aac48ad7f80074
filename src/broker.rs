//! Credential broker facade: single-flight issuance, renewal timers, rotation, and revocation.

mod credential;
mod metrics;
mod renewal;
mod rotate;

pub use metrics::BrokerMetrics;

// self
use crate::{
	_prelude::*,
	auth::{AuthHandshake, AuthProvider},
	backend::BackendClient,
	clock::Clock,
	config::BrokerConfig,
	error::{BackendError, LeaseUnavailable},
	lease::{Lease, LeaseState, RoleName},
	obs::{self, LeaseOp, OpOutcome, OpSpan},
	scheduler::{BackoffPolicy, RenewalScheduler, TimerState},
	store::{LeaseHistoryEntry, LeaseStore, RevocationOutcome},
};

/// Obtains, caches, renews, and revokes short-lived database credentials per role.
///
/// The broker owns the authoritative lease of every managed role. Consumers call
/// [`get_credential`](Self::get_credential) and receive value copies; they never hold
/// references into broker state. Issuance for a role runs under a per-role async guard so
/// concurrent callers, the renewal timer, and `force_rotate` never issue twice for the same
/// need, while unrelated roles proceed independently. Cloning is cheap and shares all state.
#[derive(Clone)]
pub struct CredentialBroker {
	config: Arc<BrokerConfig>,
	backend: Arc<dyn BackendClient>,
	auth: Arc<AuthProvider>,
	store: Arc<LeaseStore>,
	scheduler: Arc<RenewalScheduler>,
	metrics: Arc<BrokerMetrics>,
	backoff: BackoffPolicy,
	clock: Clock,
	flow_guards: Arc<Mutex<HashMap<RoleName, Arc<AsyncMutex<()>>>>>,
}
impl CredentialBroker {
	/// Creates a broker that authenticates through `handshake` and issues through `backend`.
	pub fn new(
		config: BrokerConfig,
		backend: Arc<dyn BackendClient>,
		handshake: Arc<dyn AuthHandshake>,
	) -> Result<Self> {
		Self::with_clock(config, backend, handshake, Clock::new())
	}

	/// Same as [`new`](Self::new) with an explicit clock.
	pub fn with_clock(
		config: BrokerConfig,
		backend: Arc<dyn BackendClient>,
		handshake: Arc<dyn AuthHandshake>,
		clock: Clock,
	) -> Result<Self> {
		config.validate()?;

		let auth = AuthProvider::new(handshake, config.session_refresh_margin, clock);

		Ok(Self {
			backend,
			auth: Arc::new(auth),
			store: Arc::new(LeaseStore::new(config.history_limit)),
			scheduler: Arc::new(RenewalScheduler::new()),
			metrics: Default::default(),
			backoff: BackoffPolicy::from_config(&config),
			clock,
			flow_guards: Default::default(),
			config: Arc::new(config),
		})
	}

	/// Options the broker was built with.
	pub fn config(&self) -> &BrokerConfig {
		&self.config
	}

	/// Activity counters.
	pub fn metrics(&self) -> &BrokerMetrics {
		&self.metrics
	}

	/// Session provider shared by every backend call.
	pub fn auth(&self) -> &AuthProvider {
		&self.auth
	}

	/// Clock used for every lease timestamp.
	pub fn clock(&self) -> Clock {
		self.clock
	}

	/// Snapshot of the current lease of `role`, in whatever state it is in.
	pub fn lease(&self, role: &RoleName) -> Option<Lease> {
		self.store.get(role)
	}

	/// Current lease of every role that has one.
	pub fn leases(&self) -> Vec<Lease> {
		self.store.snapshot()
	}

	/// Retired leases of `role`, oldest first.
	pub fn history(&self, role: &RoleName) -> Vec<LeaseHistoryEntry> {
		self.store.history(role)
	}

	/// Renewal timer state of `role`, or `None` when no timer is running.
	pub fn timer_state(&self, role: &RoleName) -> Option<TimerState> {
		self.scheduler.state(role)
	}

	/// Cancels every renewal timer; with `revoke_leases`, also revokes every current lease and
	/// waits for those revocations.
	pub async fn shutdown(&self, revoke_leases: bool) {
		self.scheduler.shutdown();

		if !revoke_leases {
			return;
		}

		for lease in self.store.snapshot() {
			let guard = self.flow_guard(&lease.role);
			let _singleflight = guard.lock().await;

			if let Some(revoked) = self.store.mark_revoked(&lease.role, self.clock.now()) {
				self.revoke_with_backend(&revoked).await;
			}
		}
	}

	/// Rejects roles outside the configuration and calls made after shutdown.
	fn admit(&self, role: &RoleName) -> Result<(), LeaseUnavailable> {
		if !self.config.manages(role) {
			return Err(LeaseUnavailable::unmanaged(role));
		}
		if self.scheduler.is_shut_down() {
			return Err(LeaseUnavailable::shut_down(role));
		}

		Ok(())
	}

	/// Returns (and creates on demand) the single-flight guard for a role.
	fn flow_guard(&self, role: &RoleName) -> Arc<AsyncMutex<()>> {
		let mut guards = self.flow_guards.lock();

		guards.entry(role.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
	}

	/// Issues and activates a new lease for `role`.
	///
	/// Callers must hold the role's flow guard.
	async fn issue_locked(&self, role: &RoleName) -> Result<Lease> {
		let session = self.auth.current_session().await?;
		let grant = match self.backend.issue(&session, role).await {
			Err(BackendError::AuthRejected { .. }) => {
				self.metrics.record_auth_refresh();

				let session = self.auth.refresh(&session).await?;

				self.backend.issue(&session, role).await?
			},
			result => result?,
		};
		let lease = Lease::from_grant(role.clone(), grant, self.clock.now())
			.map_err(BackendError::from)?;

		Ok(self.activate(role, lease))
	}

	/// Publishes `lease`, schedules its renewal, and retires the lease it replaced.
	///
	/// The replaced lease is revoked only after the new one is visible to readers.
	fn activate(&self, role: &RoleName, lease: Lease) -> Lease {
		let active = lease.with_state(LeaseState::Active);
		let previous = self.store.set(role, lease, self.clock.now());

		self.metrics.record_issued();
		obs::lease_activated(role, &active.credential_id, active.expires_at());

		if let Some(previous) = previous.filter(|previous| previous.state.is_live()) {
			let broker = self.clone();

			tokio::spawn(async move { broker.revoke_with_backend(&previous).await });
		}

		self.ensure_timer(role);

		active
	}

	/// Starts or wakes the renewal timer of `role`.
	fn ensure_timer(&self, role: &RoleName) {
		let broker = self.clone();
		let owned = role.clone();

		self.scheduler.ensure(role, move |handle| tokio::spawn(broker.run_timer(owned, handle)));
	}

	/// Best-effort backend revocation of a retired lease; the outcome lands in the role history.
	async fn revoke_with_backend(&self, lease: &Lease) -> bool {
		const OP: LeaseOp = LeaseOp::Revoke;

		let span = OpSpan::new(OP, &lease.role);

		obs::record_op_outcome(OP, OpOutcome::Attempt);

		let result = span
			.instrument(async {
				let session = self.auth.current_session().await?;

				match self.backend.revoke(&session, &lease.revocation_token).await {
					Err(BackendError::AuthRejected { .. }) => {
						self.metrics.record_auth_refresh();

						let session = self.auth.refresh(&session).await?;

						self.backend.revoke(&session, &lease.revocation_token).await?;
					},
					result => result?,
				}

				Ok::<_, Error>(())
			})
			.await;

		match result {
			Ok(()) => {
				obs::record_op_outcome(OP, OpOutcome::Success);
				self.metrics.record_revoked();
				self.store.record_revocation(
					&lease.role,
					&lease.credential_id,
					RevocationOutcome::Succeeded,
				);

				true
			},
			Err(e) => {
				obs::record_op_outcome(OP, OpOutcome::Failure);
				obs::revocation_failed(&lease.role, &lease.credential_id, &e);
				self.metrics.record_revoke_failure();
				self.store.record_revocation(
					&lease.role,
					&lease.credential_id,
					RevocationOutcome::Failed { reason: e.to_string() },
				);

				false
			},
		}
	}
}
impl Debug for CredentialBroker {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialBroker")
			.field("roles", &self.config.roles)
			.field("timers", &self.scheduler.roles())
			.field("auth", &self.auth)
			.finish()
	}
}
