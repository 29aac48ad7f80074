//! In-process [`BackendClient`] for local development and tests.
//!
//! Roles must be registered before they can be issued. Failures, latency, and token
//! rejections can be scripted, and every call is appended to an ordered event log.

// std
use std::collections::HashSet;
// crates.io
use rand::{Rng, distr::Alphanumeric};
// self
use crate::{
	_prelude::*,
	auth::AuthSession,
	backend::{BackendClient, BackendFuture},
	clock::{self, Clock},
	error::BackendError,
	lease::{CredentialId, LeaseGrant, RevocationToken, RoleName, Secret},
};

const SECRET_LEN: usize = 24;

/// Call recorded by [`MemoryBackend`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackendEvent {
	/// A credential was issued.
	Issued {
		/// Role it was issued under.
		role: RoleName,
		/// Identifier of the new credential.
		credential_id: CredentialId,
	},
	/// An issue call failed.
	IssueFailed {
		/// Role that was requested.
		role: RoleName,
		/// Returned error.
		error: BackendError,
	},
	/// A credential was revoked.
	Revoked {
		/// Revoked handle.
		token: RevocationToken,
	},
	/// A revoke call failed.
	RevokeFailed {
		/// Handle that was not revoked.
		token: RevocationToken,
		/// Returned error.
		error: BackendError,
	},
}

#[derive(Clone, Copy, Debug)]
struct RoleTerms {
	ttl: Duration,
	max_ttl: Duration,
}

#[derive(Clone, Debug)]
struct FailureScript {
	remaining: Option<u32>,
	error: BackendError,
}
impl FailureScript {
	fn consume(&mut self) -> Option<BackendError> {
		match self.remaining.as_mut() {
			None => Some(self.error.clone()),
			Some(0) => None,
			Some(n) => {
				*n -= 1;

				Some(self.error.clone())
			},
		}
	}
}

#[derive(Debug)]
struct BackendState {
	clock: Clock,
	roles: HashMap<RoleName, RoleTerms>,
	issue_failures: HashMap<RoleName, FailureScript>,
	revoke_failures: Option<FailureScript>,
	rejected_tokens: HashSet<String>,
	live: HashMap<RevocationToken, CredentialId>,
	latency: Duration,
	sequence: u64,
	issue_calls: HashMap<RoleName, u64>,
	revoke_calls: u64,
	events: Vec<BackendEvent>,
}
impl BackendState {
	fn check_session(&self, session: &AuthSession) -> Result<(), BackendError> {
		if self.rejected_tokens.contains(session.token.expose()) {
			return Err(BackendError::auth_rejected("token has been revoked"));
		}
		if session.is_expired_at(self.clock.now()) {
			return Err(BackendError::auth_rejected("token has expired"));
		}

		Ok(())
	}

	fn issue_now(
		&mut self,
		session: &AuthSession,
		role: &RoleName,
	) -> Result<LeaseGrant, BackendError> {
		*self.issue_calls.entry(role.clone()).or_default() += 1;

		let result = self.try_issue(session, role);

		match &result {
			Ok(grant) => self.events.push(BackendEvent::Issued {
				role: role.clone(),
				credential_id: grant.credential_id.clone(),
			}),
			Err(error) =>
				self.events.push(BackendEvent::IssueFailed { role: role.clone(), error: error.clone() }),
		}

		result
	}

	fn try_issue(
		&mut self,
		session: &AuthSession,
		role: &RoleName,
	) -> Result<LeaseGrant, BackendError> {
		self.check_session(session)?;

		let terms =
			*self.roles.get(role).ok_or_else(|| BackendError::RoleNotFound { role: role.clone() })?;

		if let Some(error) = self.issue_failures.get_mut(role).and_then(FailureScript::consume) {
			return Err(error);
		}

		self.sequence += 1;

		let seq = self.sequence;
		let credential_id = CredentialId::new(format!("{role}-{seq}"))
			.map_err(|e| BackendError::unavailable(e.to_string()))?;
		let revocation_token = RevocationToken::new(format!("database/creds/{role}/{seq}"))
			.map_err(|e| BackendError::unavailable(e.to_string()))?;

		self.live.insert(revocation_token.clone(), credential_id.clone());

		Ok(LeaseGrant {
			credential_id,
			username: format!("v-{}-{role}-{seq}", session.role_id),
			secret: Secret::new(random_secret()),
			ttl: terms.ttl,
			max_ttl: terms.max_ttl,
			revocation_token,
		})
	}

	fn revoke_now(
		&mut self,
		session: &AuthSession,
		token: &RevocationToken,
	) -> Result<(), BackendError> {
		self.revoke_calls += 1;

		let result = self.check_session(session).and_then(|()| {
			match self.revoke_failures.as_mut().and_then(FailureScript::consume) {
				Some(error) => Err(error),
				None => {
					self.live.remove(token);

					Ok(())
				},
			}
		});

		match &result {
			Ok(()) => self.events.push(BackendEvent::Revoked { token: token.clone() }),
			Err(error) => self
				.events
				.push(BackendEvent::RevokeFailed { token: token.clone(), error: error.clone() }),
		}

		result
	}
}

/// Thread-safe backend that keeps issued credentials in-process.
#[derive(Clone, Debug)]
pub struct MemoryBackend(Arc<Mutex<BackendState>>);
impl MemoryBackend {
	/// Creates an empty backend that judges session expiry with `clock`.
	pub fn new(clock: Clock) -> Self {
		Self(Arc::new(Mutex::new(BackendState {
			clock,
			roles: HashMap::new(),
			issue_failures: HashMap::new(),
			revoke_failures: None,
			rejected_tokens: HashSet::new(),
			live: HashMap::new(),
			latency: Duration::ZERO,
			sequence: 0,
			issue_calls: HashMap::new(),
			revoke_calls: 0,
			events: Vec::new(),
		})))
	}

	/// Registers `role`, issuing credentials valid for `ttl` capped at `max_ttl`.
	pub fn register_role(&self, role: RoleName, ttl: Duration, max_ttl: Duration) -> &Self {
		self.0.lock().roles.insert(role, RoleTerms { ttl, max_ttl });

		self
	}

	/// Removes `role`; later issue calls fail with [`BackendError::RoleNotFound`].
	pub fn remove_role(&self, role: &RoleName) -> &Self {
		self.0.lock().roles.remove(role);

		self
	}

	/// Fails the next `count` issue calls for `role` with `error`.
	pub fn fail_next_issues(&self, role: &RoleName, count: u32, error: BackendError) -> &Self {
		self.0
			.lock()
			.issue_failures
			.insert(role.clone(), FailureScript { remaining: Some(count), error });

		self
	}

	/// Fails every issue call for `role` with `error` until cleared.
	pub fn fail_all_issues(&self, role: &RoleName, error: BackendError) -> &Self {
		self.0.lock().issue_failures.insert(role.clone(), FailureScript { remaining: None, error });

		self
	}

	/// Removes any scripted issue failures for `role`.
	pub fn clear_issue_failures(&self, role: &RoleName) -> &Self {
		self.0.lock().issue_failures.remove(role);

		self
	}

	/// Fails the next `count` revoke calls with `error`.
	pub fn fail_next_revokes(&self, count: u32, error: BackendError) -> &Self {
		self.0.lock().revoke_failures = Some(FailureScript { remaining: Some(count), error });

		self
	}

	/// Rejects every call carrying `token` with [`BackendError::AuthRejected`].
	pub fn reject_token(&self, token: impl Into<String>) -> &Self {
		self.0.lock().rejected_tokens.insert(token.into());

		self
	}

	/// Delays every call by `latency`.
	pub fn set_latency(&self, latency: Duration) -> &Self {
		self.0.lock().latency = latency;

		self
	}

	/// Issue calls received for `role`, including failed ones.
	pub fn issue_calls(&self, role: &RoleName) -> u64 {
		self.0.lock().issue_calls.get(role).copied().unwrap_or_default()
	}

	/// Revoke calls received, including failed ones.
	pub fn revoke_calls(&self) -> u64 {
		self.0.lock().revoke_calls
	}

	/// Returns `true` while `token` refers to an issued, unrevoked credential.
	pub fn is_live(&self, token: &RevocationToken) -> bool {
		self.0.lock().live.contains_key(token)
	}

	/// Ordered log of every call.
	pub fn events(&self) -> Vec<BackendEvent> {
		self.0.lock().events.clone()
	}

	async fn delay(&self) {
		let latency = self.0.lock().latency;

		if latency.is_positive() {
			tokio::time::sleep(clock::to_std(latency)).await;
		}
	}
}
impl BackendClient for MemoryBackend {
	fn issue<'a>(
		&'a self,
		session: &'a AuthSession,
		role: &'a RoleName,
	) -> BackendFuture<'a, LeaseGrant> {
		Box::pin(async move {
			self.delay().await;
			self.0.lock().issue_now(session, role)
		})
	}

	fn revoke<'a>(
		&'a self,
		session: &'a AuthSession,
		token: &'a RevocationToken,
	) -> BackendFuture<'a, ()> {
		Box::pin(async move {
			self.delay().await;
			self.0.lock().revoke_now(session, token)
		})
	}
}

fn random_secret() -> String {
	rand::rng().sample_iter(Alphanumeric).take(SECRET_LEN).map(char::from).collect()
}
