//! Cached auth sessions with a process-wide single-flight refresh.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::{
	_prelude::*,
	auth::{AuthHandshake, AuthSession},
	clock::Clock,
	error::AuthError,
	obs::{self, LeaseOp, OpOutcome},
};

/// Supplies the session used to authorize every backend call.
///
/// Handshakes run under one async lock shared by all roles, so concurrent callers that find
/// the session stale wait for a single handshake instead of each consuming a secret id.
pub struct AuthProvider {
	handshake: Arc<dyn AuthHandshake>,
	cached: RwLock<Option<AuthSession>>,
	refresh_guard: AsyncMutex<()>,
	refresh_margin: Duration,
	clock: Clock,
	handshakes: AtomicU64,
}
impl AuthProvider {
	/// Creates a provider that refreshes sessions `refresh_margin` ahead of their expiry.
	pub fn new(handshake: Arc<dyn AuthHandshake>, refresh_margin: Duration, clock: Clock) -> Self {
		Self {
			handshake,
			cached: RwLock::new(None),
			refresh_guard: AsyncMutex::new(()),
			refresh_margin,
			clock,
			handshakes: AtomicU64::new(0),
		}
	}

	/// Returns the cached session, performing a handshake first if it is missing or stale.
	pub async fn current_session(&self) -> Result<AuthSession, AuthError> {
		if let Some(session) = self.fresh() {
			return Ok(session);
		}

		let _singleflight = self.refresh_guard.lock().await;

		if let Some(session) = self.fresh() {
			return Ok(session);
		}

		self.login_locked().await
	}

	/// Replaces a session the backend rejected.
	///
	/// If another caller already swapped `stale` for a fresh session, that session is returned
	/// without a new handshake.
	pub async fn refresh(&self, stale: &AuthSession) -> Result<AuthSession, AuthError> {
		let _singleflight = self.refresh_guard.lock().await;

		if let Some(session) = self.fresh().filter(|session| session.token != stale.token) {
			return Ok(session);
		}

		self.login_locked().await
	}

	/// Drops the cached session so the next call performs a handshake.
	pub fn invalidate(&self) {
		self.cached.write().take();
	}

	/// Number of handshakes performed so far.
	pub fn handshakes(&self) -> u64 {
		self.handshakes.load(Ordering::Relaxed)
	}

	fn fresh(&self) -> Option<AuthSession> {
		let now = self.clock.now();

		self.cached
			.read()
			.as_ref()
			.filter(|session| now < session.refresh_at(self.refresh_margin))
			.cloned()
	}

	async fn login_locked(&self) -> Result<AuthSession, AuthError> {
		obs::record_op_outcome(LeaseOp::AuthRefresh, OpOutcome::Attempt);
		self.handshakes.fetch_add(1, Ordering::Relaxed);

		let result = match self.handshake.login().await {
			Ok(grant) => AuthSession::from_grant(grant, self.clock.now()),
			Err(e) => Err(e),
		};

		match result {
			Ok(session) => {
				obs::record_op_outcome(LeaseOp::AuthRefresh, OpOutcome::Success);
				obs::session_refreshed(&session.role_id, session.expires_at);
				*self.cached.write() = Some(session.clone());

				Ok(session)
			},
			Err(e) => {
				obs::record_op_outcome(LeaseOp::AuthRefresh, OpOutcome::Failure);

				Err(e)
			},
		}
	}
}
impl Debug for AuthProvider {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthProvider")
			.field("session_cached", &self.cached.read().is_some())
			.field("refresh_margin", &self.refresh_margin)
			.field("handshakes", &self.handshakes())
			.finish()
	}
}
