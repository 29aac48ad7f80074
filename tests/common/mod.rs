//! Shared fixtures for broker integration tests.

#![allow(dead_code)]

// std
use std::sync::{
	Arc,
	atomic::{AtomicU32, Ordering},
};
// crates.io
use time::{Duration, OffsetDateTime, macros};
// self
use lease_broker::{
	BrokerConfig, CredentialBroker,
	auth::{AuthFuture, AuthHandshake, SessionGrant, StaticTokenHandshake},
	backend::MemoryBackend,
	clock::Clock,
	lease::{RoleName, Secret},
};

pub const LEASE_TTL: Duration = Duration::hours(1);

pub fn anchor() -> OffsetDateTime {
	macros::datetime!(2025-01-01 00:00 UTC)
}

pub fn role(name: &str) -> RoleName {
	RoleName::new(name).expect("Role fixture should be valid.")
}

pub fn audit_role() -> RoleName {
	role("audit-role")
}

/// Config managing `audit-role` with deterministic backoff.
pub fn config() -> BrokerConfig {
	BrokerConfig::builder()
		.role(audit_role())
		.backoff_jitter(0.0)
		.build()
		.expect("Broker config fixture should be valid.")
}

pub struct Rig {
	pub broker: CredentialBroker,
	pub backend: MemoryBackend,
	pub clock: Clock,
}

/// Broker over a [`MemoryBackend`] that knows every configured role with a one-hour ttl.
pub fn rig(config: BrokerConfig) -> Rig {
	rig_with_handshake(
		config,
		Arc::new(StaticTokenHandshake::new("lease-broker", "s.static", Duration::days(1))),
	)
}

pub fn rig_with_handshake(config: BrokerConfig, handshake: Arc<dyn AuthHandshake>) -> Rig {
	let clock = Clock::anchored_at(anchor());
	let backend = MemoryBackend::new(clock);

	for role in &config.roles {
		backend.register_role(role.clone(), LEASE_TTL, Duration::ZERO);
	}

	let broker = CredentialBroker::with_clock(config, Arc::new(backend.clone()), handshake, clock)
		.expect("Broker fixture should build.");

	Rig { broker, backend, clock }
}

/// Handshake minting `s.token-<n>` on the n-th login.
#[derive(Debug, Default)]
pub struct RotatingHandshake {
	logins: AtomicU32,
}
impl RotatingHandshake {
	pub fn token(n: u32) -> String {
		format!("s.token-{n}")
	}
}
impl AuthHandshake for RotatingHandshake {
	fn login(&self) -> AuthFuture<'_, SessionGrant> {
		let n = self.logins.fetch_add(1, Ordering::SeqCst) + 1;

		Box::pin(async move {
			Ok(SessionGrant {
				role_id: "lease-broker".into(),
				token: Secret::new(Self::token(n)),
				ttl: Duration::days(1),
			})
		})
	}
}

/// Advances paused tokio time by `duration`.
pub async fn advance(duration: Duration) {
	tokio::time::sleep(duration.try_into().expect("Advance duration should be positive.")).await;
}
