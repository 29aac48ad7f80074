//! Auth sessions and the handshake contract that produces them.

// self
use crate::{_prelude::*, error::AuthError, lease::Secret};

/// Boxed future returned by [`AuthHandshake::login`].
pub type AuthFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, AuthError>> + 'a + Send>>;

/// Role-bound secret exchange producing a bearer token for the secrets backend.
///
/// Implementations may consume limited-use secrets on every call, so the broker only calls
/// [`login`](AuthHandshake::login) from inside [`AuthProvider`](crate::auth::AuthProvider)'s
/// single-flight section.
pub trait AuthHandshake
where
	Self: Send + Sync,
{
	/// Performs the handshake.
	fn login(&self) -> AuthFuture<'_, SessionGrant>;
}

/// Raw handshake result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionGrant {
	/// Identity the token was issued to.
	pub role_id: String,
	/// Bearer token.
	pub token: Secret,
	/// Validity of the token.
	pub ttl: Duration,
}

/// The broker's own access credential to the secrets backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthSession {
	/// Identity the token was issued to.
	pub role_id: String,
	/// Bearer token attached to every backend call.
	pub token: Secret,
	/// Instant the session was established.
	pub issued_at: OffsetDateTime,
	/// Instant the token stops being accepted.
	pub expires_at: OffsetDateTime,
}
impl AuthSession {
	/// Stamps a handshake result.
	pub fn from_grant(grant: SessionGrant, issued_at: OffsetDateTime) -> Result<Self, AuthError> {
		if !grant.ttl.is_positive() {
			return Err(AuthError::InvalidSession { reason: "token ttl must be positive" });
		}

		let expires_at = issued_at
			.checked_add(grant.ttl)
			.ok_or(AuthError::InvalidSession { reason: "token expiry is out of range" })?;

		Ok(Self { role_id: grant.role_id, token: grant.token, issued_at, expires_at })
	}

	/// Returns `true` once the token is no longer accepted.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires_at
	}

	/// Instant at which the session should be replaced, `margin` ahead of expiry but never
	/// earlier than half-way through its lifetime.
	pub fn refresh_at(&self, margin: Duration) -> OffsetDateTime {
		let lifetime = self.expires_at - self.issued_at;

		self.expires_at - margin.min(lifetime / 2)
	}
}

/// Handshake that hands out a pre-issued token, e.g. one injected by the host environment.
#[derive(Clone, Debug)]
pub struct StaticTokenHandshake {
	role_id: String,
	token: Secret,
	ttl: Duration,
}
impl StaticTokenHandshake {
	/// Creates a handshake returning `token` with a fixed `ttl` on every login.
	pub fn new(role_id: impl Into<String>, token: impl Into<String>, ttl: Duration) -> Self {
		Self { role_id: role_id.into(), token: Secret::new(token), ttl }
	}
}
impl AuthHandshake for StaticTokenHandshake {
	fn login(&self) -> AuthFuture<'_, SessionGrant> {
		let grant =
			SessionGrant { role_id: self.role_id.clone(), token: self.token.clone(), ttl: self.ttl };

		Box::pin(async move { Ok(grant) })
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn refresh_margin_is_bounded_by_half_the_lifetime() {
		let issued = macros::datetime!(2025-01-01 00:00 UTC);
		let grant = SessionGrant {
			role_id: "broker".into(),
			token: Secret::new("s.token"),
			ttl: Duration::minutes(10),
		};
		let session =
			AuthSession::from_grant(grant, issued).expect("Session fixture should be valid.");

		assert_eq!(session.refresh_at(Duration::seconds(30)), issued + Duration::seconds(570));
		assert_eq!(session.refresh_at(Duration::hours(1)), issued + Duration::minutes(5));
		assert!(session.is_expired_at(issued + Duration::minutes(10)));
	}

	#[test]
	fn non_positive_session_ttl_is_rejected() {
		let grant =
			SessionGrant { role_id: "broker".into(), token: Secret::new("s.token"), ttl: Duration::ZERO };

		assert!(matches!(
			AuthSession::from_grant(grant, macros::datetime!(2025-01-01 00:00 UTC)),
			Err(AuthError::InvalidSession { .. })
		));
	}

	#[test]
	fn session_expiry_must_fit_the_calendar() {
		let grant = SessionGrant {
			role_id: "broker".into(),
			token: Secret::new("s.token"),
			ttl: Duration::days(365 * 9000),
		};

		assert!(matches!(
			AuthSession::from_grant(grant, macros::datetime!(2025-01-01 00:00 UTC)),
			Err(AuthError::InvalidSession { reason: "token expiry is out of range" })
		));
	}

	#[tokio::test]
	async fn static_handshake_returns_its_token() {
		let handshake = StaticTokenHandshake::new("broker", "s.static", Duration::hours(1));
		let grant = handshake.login().await.expect("Static handshake should always succeed.");

		assert_eq!(grant.token.expose(), "s.static");
		assert_eq!(grant.ttl, Duration::hours(1));
	}
}
