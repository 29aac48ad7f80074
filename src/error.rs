//! Broker-level error types shared across the backend, auth, and broker layers.

// self
use crate::{_prelude::*, lease::RoleName};

/// Broker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Canonical broker error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Secrets backend failure.
	#[error(transparent)]
	Backend(#[from] BackendError),
	/// Authentication handshake failure.
	#[error(transparent)]
	Auth(#[from] AuthError),
	/// Consumer-facing failure to produce a credential.
	#[error(transparent)]
	LeaseUnavailable(#[from] LeaseUnavailable),
}
impl Error {
	/// Returns `true` when the failure is temporary and worth retrying with backoff.
	pub fn is_transient(&self) -> bool {
		match self {
			Self::Backend(e) => e.is_transient(),
			Self::Auth(AuthError::Handshake { .. }) => true,
			_ => false,
		}
	}

	/// Returns `true` when the backend refused the session token.
	pub fn is_auth_rejected(&self) -> bool {
		matches!(self, Self::Backend(BackendError::AuthRejected { .. }))
	}

	/// Returns `true` when the backend does not know the requested role.
	pub fn is_role_not_found(&self) -> bool {
		matches!(self, Self::Backend(BackendError::RoleNotFound { .. }))
	}
}

/// Configuration and validation failures raised by the broker.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Configuration document could not be parsed.
	#[error("Broker configuration is malformed at `{path}`.")]
	Parse {
		/// JSON path of the offending field.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: serde_json::Error,
	},
	/// Role or credential identifier failed validation.
	#[error(transparent)]
	InvalidIdentifier(#[from] crate::lease::IdentifierError),
	/// Renewal fraction must sit strictly between zero and one.
	#[error("Renewal fraction must be within (0, 1), got {value}.")]
	InvalidRenewalFraction {
		/// Rejected value.
		value: f64,
	},
	/// Backoff jitter must sit within [0, 1).
	#[error("Backoff jitter must be within [0, 1), got {value}.")]
	InvalidJitter {
		/// Rejected value.
		value: f64,
	},
	/// Backoff base/cap combination is unusable.
	#[error("Backoff settings are invalid: {reason}.")]
	InvalidBackoff {
		/// Human-readable explanation.
		reason: &'static str,
	},
	/// A duration option must be positive.
	#[error("The {option} option must be a positive duration.")]
	NonPositiveDuration {
		/// Option name.
		option: &'static str,
	},
	/// History trail must keep at least one entry.
	#[error("History limit must be greater than zero.")]
	InvalidHistoryLimit,
	/// At least one role must be managed.
	#[error("Broker configuration must name at least one role.")]
	NoRoles,
}
impl From<serde_path_to_error::Error<serde_json::Error>> for ConfigError {
	fn from(e: serde_path_to_error::Error<serde_json::Error>) -> Self {
		let path = e.path().to_string();

		Self::Parse { path, source: e.into_inner() }
	}
}

/// Failures reported by a [`BackendClient`](crate::backend::BackendClient).
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum BackendError {
	/// Temporary backend failure; retry with backoff.
	#[error("Secrets backend is unavailable: {message}.")]
	Unavailable {
		/// Backend-supplied message.
		message: String,
	},
	/// Session token was refused; refresh the session and retry once.
	#[error("Secrets backend rejected the session token: {message}.")]
	AuthRejected {
		/// Backend-supplied message.
		message: String,
	},
	/// The backend has no such role; not retried.
	#[error("Secrets backend does not know role `{role}`.")]
	RoleNotFound {
		/// Role that was requested.
		role: RoleName,
	},
	/// The backend answered with a grant the broker cannot use.
	#[error("Secrets backend returned a malformed grant.")]
	MalformedGrant(#[from] crate::lease::LeaseGrantError),
}
impl BackendError {
	/// Shorthand for [`BackendError::Unavailable`].
	pub fn unavailable(message: impl Into<String>) -> Self {
		Self::Unavailable { message: message.into() }
	}

	/// Shorthand for [`BackendError::AuthRejected`].
	pub fn auth_rejected(message: impl Into<String>) -> Self {
		Self::AuthRejected { message: message.into() }
	}

	/// Returns `true` for failures that should be retried with backoff.
	pub fn is_transient(&self) -> bool {
		matches!(self, Self::Unavailable { .. })
	}
}

/// Failures raised while obtaining an [`AuthSession`](crate::auth::AuthSession).
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum AuthError {
	/// The handshake could not be completed.
	#[error("Authentication handshake failed: {message}.")]
	Handshake {
		/// Handshake-supplied message.
		message: String,
	},
	/// The handshake produced an unusable session.
	#[error("Authentication handshake returned an invalid session: {reason}.")]
	InvalidSession {
		/// Human-readable explanation.
		reason: &'static str,
	},
}

/// Why [`LeaseUnavailable`] was raised.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnavailableReason {
	/// The caller's timeout elapsed before issuance completed.
	Timeout,
	/// The backend or auth layer failed to issue a lease.
	Backend,
	/// The backend does not know the role.
	RoleNotFound,
	/// The role is not managed by this broker.
	UnmanagedRole,
	/// The broker has been shut down.
	ShutDown,
}
impl UnavailableReason {
	/// Returns a stable label suitable for log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Timeout => "timeout",
			Self::Backend => "backend",
			Self::RoleNotFound => "role_not_found",
			Self::UnmanagedRole => "unmanaged_role",
			Self::ShutDown => "shut_down",
		}
	}
}
impl Display for UnavailableReason {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// The only failure consumers of [`CredentialBroker::get_credential`] observe.
///
/// It is temporary by contract: a later call may succeed.
///
/// [`CredentialBroker::get_credential`]: crate::broker::CredentialBroker::get_credential
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("No lease is available for role `{role}` ({reason}): {detail}.")]
pub struct LeaseUnavailable {
	/// Role the caller asked for.
	pub role: RoleName,
	/// Failure category.
	pub reason: UnavailableReason,
	/// Short explanation without secret material.
	pub detail: String,
}
impl LeaseUnavailable {
	/// Creates a new error for the provided role.
	pub fn new(role: RoleName, reason: UnavailableReason, detail: impl Into<String>) -> Self {
		Self { role, reason, detail: detail.into() }
	}

	pub(crate) fn unmanaged(role: &RoleName) -> Self {
		Self::new(
			role.clone(),
			UnavailableReason::UnmanagedRole,
			"role is not managed by this broker",
		)
	}

	pub(crate) fn shut_down(role: &RoleName) -> Self {
		Self::new(role.clone(), UnavailableReason::ShutDown, "broker has been shut down")
	}

	pub(crate) fn from_error(role: RoleName, error: &Error) -> Self {
		let reason = if error.is_role_not_found() {
			UnavailableReason::RoleNotFound
		} else {
			UnavailableReason::Backend
		};

		Self::new(role, reason, error.to_string())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn role() -> RoleName {
		RoleName::new("audit-role").expect("Role fixture should be valid.")
	}

	#[test]
	fn backend_errors_classify_transience() {
		let unavailable: Error = BackendError::unavailable("connection refused").into();
		let rejected: Error = BackendError::auth_rejected("token expired").into();
		let missing: Error = BackendError::RoleNotFound { role: role() }.into();

		assert!(unavailable.is_transient());
		assert!(!rejected.is_transient());
		assert!(rejected.is_auth_rejected());
		assert!(!missing.is_transient());
		assert!(missing.is_role_not_found());
	}

	#[test]
	fn lease_unavailable_maps_role_not_found() {
		let missing: Error = BackendError::RoleNotFound { role: role() }.into();
		let unavailable: Error = BackendError::unavailable("down").into();

		assert_eq!(
			LeaseUnavailable::from_error(role(), &missing).reason,
			UnavailableReason::RoleNotFound
		);
		assert_eq!(
			LeaseUnavailable::from_error(role(), &unavailable).reason,
			UnavailableReason::Backend
		);
	}

	#[test]
	fn parse_errors_keep_the_json_path() {
		let de = &mut serde_json::Deserializer::from_str("{\"roles\": [\"with space\"]}");
		let err: serde_path_to_error::Error<serde_json::Error> =
			serde_path_to_error::deserialize::<_, crate::config::BrokerConfig>(de)
				.expect_err("Whitespace in a role name should fail to deserialize.");
		let config_error = ConfigError::from(err);

		assert!(matches!(&config_error, ConfigError::Parse { path, .. } if path.starts_with("roles")));
		assert!(StdError::source(&config_error).is_some());
	}
}
