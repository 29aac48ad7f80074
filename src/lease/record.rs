//! Immutable lease records, backend grants, and consumer credential snapshots.

// self
use crate::{
	_prelude::*,
	lease::{CredentialId, RevocationToken, RoleName, Secret},
};

/// Lifecycle state of a lease.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LeaseState {
	/// Issued by the backend but not yet published to readers.
	Pending,
	/// Current credential for its role.
	Active,
	/// Still served while a replacement is being issued.
	Renewing,
	/// Hard expiry passed without a successful renewal.
	Expired,
	/// Explicitly revoked and removed from service.
	Revoked,
}
impl LeaseState {
	/// Returns a stable label suitable for log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Pending => "pending",
			Self::Active => "active",
			Self::Renewing => "renewing",
			Self::Expired => "expired",
			Self::Revoked => "revoked",
		}
	}

	/// Returns `true` for states that may still be handed to consumers.
	pub const fn is_live(self) -> bool {
		matches!(self, Self::Active | Self::Renewing)
	}

	/// Checks whether the lifecycle permits moving from `self` to `next`.
	pub const fn can_transition_to(self, next: Self) -> bool {
		matches!(
			(self, next),
			(Self::Pending, Self::Active)
				| (Self::Active, Self::Renewing)
				| (Self::Renewing, Self::Active)
				| (Self::Pending | Self::Active | Self::Renewing, Self::Expired | Self::Revoked)
		)
	}
}
impl Display for LeaseState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Validation failures for a [`LeaseGrant`].
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum LeaseGrantError {
	/// The backend returned a zero or negative ttl.
	#[error("Lease ttl must be positive.")]
	NonPositiveTtl,
	/// The backend returned a negative max ttl.
	#[error("Lease max ttl cannot be negative.")]
	NegativeMaxTtl,
	/// The backend returned an empty username.
	#[error("Lease username cannot be empty.")]
	EmptyUsername,
	/// The lease would expire beyond the last representable instant.
	#[error("Lease lifetime of {ttl} runs past the representable time range.")]
	ExpiryOutOfRange {
		/// Effective ttl of the rejected grant.
		ttl: Duration,
	},
}

/// Raw credential payload returned by a backend `issue` call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseGrant {
	/// Backend-assigned credential identifier.
	pub credential_id: CredentialId,
	/// Dynamic database principal.
	pub username: String,
	/// Secret for the principal.
	pub secret: Secret,
	/// Default validity of the credential.
	pub ttl: Duration,
	/// Absolute ceiling for the credential's lifetime; zero disables the ceiling.
	pub max_ttl: Duration,
	/// Handle used to revoke the credential early.
	pub revocation_token: RevocationToken,
}

/// One backend-issued credential plus its validity window.
///
/// A lease never changes after it is issued apart from its [`LeaseState`]; renewal always
/// produces a new lease with a new [`CredentialId`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
	/// Role the lease was issued under.
	pub role: RoleName,
	/// Backend-assigned credential identifier.
	pub credential_id: CredentialId,
	/// Dynamic database principal.
	pub username: String,
	/// Secret for the principal.
	pub secret: Secret,
	/// Instant the broker received the grant.
	pub issued_at: OffsetDateTime,
	/// Default validity of the credential.
	pub ttl: Duration,
	/// Absolute ceiling for the credential's lifetime; zero disables the ceiling.
	pub max_ttl: Duration,
	/// Handle used to revoke the credential early.
	pub revocation_token: RevocationToken,
	/// Lifecycle state.
	pub state: LeaseState,
}
impl Lease {
	/// Validates a backend grant and stamps it as a [`LeaseState::Pending`] lease.
	pub fn from_grant(
		role: RoleName,
		grant: LeaseGrant,
		issued_at: OffsetDateTime,
	) -> Result<Self, LeaseGrantError> {
		if !grant.ttl.is_positive() {
			return Err(LeaseGrantError::NonPositiveTtl);
		}
		if grant.max_ttl.is_negative() {
			return Err(LeaseGrantError::NegativeMaxTtl);
		}
		if grant.username.is_empty() {
			return Err(LeaseGrantError::EmptyUsername);
		}

		let ttl = clamp_ttl(grant.ttl, grant.max_ttl);

		// `expires_at` and `renew_at` add without checks from here on.
		if issued_at.checked_add(ttl).is_none() {
			return Err(LeaseGrantError::ExpiryOutOfRange { ttl });
		}

		Ok(Self {
			role,
			credential_id: grant.credential_id,
			username: grant.username,
			secret: grant.secret,
			issued_at,
			ttl: grant.ttl,
			max_ttl: grant.max_ttl,
			revocation_token: grant.revocation_token,
			state: LeaseState::Pending,
		})
	}

	/// Lifetime after clamping `ttl` to `max_ttl`.
	pub fn effective_ttl(&self) -> Duration {
		clamp_ttl(self.ttl, self.max_ttl)
	}

	/// Hard expiry instant.
	pub fn expires_at(&self) -> OffsetDateTime {
		self.issued_at + self.effective_ttl()
	}

	/// Instant at which a replacement should be requested.
	pub fn renew_at(&self, renewal_fraction: f64) -> OffsetDateTime {
		self.issued_at + self.effective_ttl() * renewal_fraction
	}

	/// Remaining validity at `instant`, clamped at zero.
	pub fn remaining_at(&self, instant: OffsetDateTime) -> Duration {
		(self.expires_at() - instant).max(Duration::ZERO)
	}

	/// Returns `true` when the lease is live and not past its hard expiry.
	pub fn is_servable_at(&self, instant: OffsetDateTime) -> bool {
		self.state.is_live() && instant < self.expires_at()
	}

	/// Returns a copy carrying a different state.
	pub fn with_state(&self, state: LeaseState) -> Self {
		Self { state, ..self.clone() }
	}

	/// Value snapshot handed to consumers.
	pub fn credential(&self) -> Credential {
		Credential {
			role: self.role.clone(),
			credential_id: self.credential_id.clone(),
			username: self.username.clone(),
			secret: self.secret.clone(),
			expires_at: self.expires_at(),
		}
	}
}

fn clamp_ttl(ttl: Duration, max_ttl: Duration) -> Duration {
	if max_ttl.is_positive() { ttl.min(max_ttl) } else { ttl }
}

/// Username/secret pair handed to consumers, detached from broker state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credential {
	/// Role the credential belongs to.
	pub role: RoleName,
	/// Backend-assigned credential identifier.
	pub credential_id: CredentialId,
	/// Dynamic database principal.
	pub username: String,
	/// Secret for the principal.
	pub secret: Secret,
	/// Hard expiry of the underlying lease.
	pub expires_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn grant(ttl: Duration, max_ttl: Duration) -> LeaseGrant {
		LeaseGrant {
			credential_id: CredentialId::new("cred-1").expect("Credential fixture should be valid."),
			username: "v-approle-audit-role-x1".into(),
			secret: Secret::new("A1a-secret"),
			ttl,
			max_ttl,
			revocation_token: RevocationToken::new("database/creds/audit-role/x1")
				.expect("Revocation fixture should be valid."),
		}
	}

	fn role() -> RoleName {
		RoleName::new("audit-role").expect("Role fixture should be valid.")
	}

	#[test]
	fn renewal_trigger_uses_fraction_of_ttl() {
		let issued = macros::datetime!(2025-01-01 00:00 UTC);
		let lease = Lease::from_grant(role(), grant(Duration::hours(1), Duration::hours(24)), issued)
			.expect("Grant fixture should be valid.");

		assert_eq!(lease.state, LeaseState::Pending);
		assert_eq!(lease.renew_at(0.6), issued + Duration::seconds(2160));
		assert_eq!(lease.expires_at(), macros::datetime!(2025-01-01 01:00 UTC));
	}

	#[test]
	fn max_ttl_caps_the_lifetime() {
		let issued = macros::datetime!(2025-01-01 00:00 UTC);
		let capped =
			Lease::from_grant(role(), grant(Duration::hours(1), Duration::minutes(30)), issued)
				.expect("Grant fixture should be valid.");
		let uncapped = Lease::from_grant(role(), grant(Duration::hours(1), Duration::ZERO), issued)
			.expect("Grant fixture should be valid.");

		assert_eq!(capped.effective_ttl(), Duration::minutes(30));
		assert_eq!(uncapped.effective_ttl(), Duration::hours(1));
	}

	#[test]
	fn invalid_grants_are_rejected() {
		let issued = macros::datetime!(2025-01-01 00:00 UTC);

		assert_eq!(
			Lease::from_grant(role(), grant(Duration::ZERO, Duration::ZERO), issued),
			Err(LeaseGrantError::NonPositiveTtl)
		);
		assert_eq!(
			Lease::from_grant(role(), grant(Duration::hours(1), Duration::seconds(-1)), issued),
			Err(LeaseGrantError::NegativeMaxTtl)
		);
	}

	#[test]
	fn lifetimes_past_the_calendar_are_rejected() {
		let issued = macros::datetime!(2025-01-01 00:00 UTC);
		let ttl = Duration::days(365 * 9000);

		assert_eq!(
			Lease::from_grant(role(), grant(ttl, Duration::ZERO), issued),
			Err(LeaseGrantError::ExpiryOutOfRange { ttl })
		);

		// A ceiling inside the range rescues the same ttl.
		let capped = Lease::from_grant(role(), grant(ttl, Duration::days(30)), issued)
			.expect("Capped grant should be valid.");

		assert_eq!(capped.expires_at(), issued + Duration::days(30));
		assert!(capped.renew_at(0.6) < capped.expires_at());
	}

	#[test]
	fn servability_follows_state_and_expiry() {
		let issued = macros::datetime!(2025-01-01 00:00 UTC);
		let lease = Lease::from_grant(role(), grant(Duration::hours(1), Duration::ZERO), issued)
			.expect("Grant fixture should be valid.");
		let during = macros::datetime!(2025-01-01 00:30 UTC);

		assert!(!lease.is_servable_at(during), "Pending leases must not be served.");
		assert!(lease.with_state(LeaseState::Active).is_servable_at(during));
		assert!(lease.with_state(LeaseState::Renewing).is_servable_at(during));
		assert!(
			!lease
				.with_state(LeaseState::Active)
				.is_servable_at(macros::datetime!(2025-01-01 01:00 UTC))
		);
		assert_eq!(lease.remaining_at(during), Duration::minutes(30));
	}

	#[test]
	fn transitions_follow_the_lifecycle() {
		assert!(LeaseState::Pending.can_transition_to(LeaseState::Active));
		assert!(LeaseState::Active.can_transition_to(LeaseState::Renewing));
		assert!(LeaseState::Renewing.can_transition_to(LeaseState::Expired));
		assert!(!LeaseState::Expired.can_transition_to(LeaseState::Active));
		assert!(!LeaseState::Revoked.can_transition_to(LeaseState::Renewing));
	}

	#[test]
	fn credential_debug_redacts_secret() {
		let issued = macros::datetime!(2025-01-01 00:00 UTC);
		let lease = Lease::from_grant(role(), grant(Duration::hours(1), Duration::ZERO), issued)
			.expect("Grant fixture should be valid.");
		let rendered = format!("{:?}", lease.credential());

		assert!(!rendered.contains("A1a-secret"));
		assert!(rendered.contains("<redacted>"));
	}
}
