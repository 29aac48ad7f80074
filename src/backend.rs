//! Secrets backend contract and the built-in in-process backend.
//!
//! The broker never talks to a transport directly: it issues and revokes through
//! [`BackendClient`], attaching the current [`AuthSession`] to every call. Clients are
//! stateless from the broker's point of view; all lease bookkeeping lives in
//! [`LeaseStore`](crate::store::LeaseStore).

pub mod memory;

pub use memory::{BackendEvent, MemoryBackend};

// self
use crate::{
	_prelude::*,
	auth::AuthSession,
	error::BackendError,
	lease::{LeaseGrant, RevocationToken, RoleName},
};

/// Boxed future returned by [`BackendClient`] calls.
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, BackendError>> + 'a + Send>>;

/// Request/response surface of an external secrets authority.
pub trait BackendClient
where
	Self: Send + Sync,
{
	/// Requests a new credential for `role`.
	///
	/// Fails with [`BackendError::AuthRejected`] when `session` is expired or unknown, and with
	/// [`BackendError::RoleNotFound`] when the backend has no such role.
	fn issue<'a>(
		&'a self,
		session: &'a AuthSession,
		role: &'a RoleName,
	) -> BackendFuture<'a, LeaseGrant>;

	/// Revokes a previously issued credential. Callers treat failures as non-fatal.
	fn revoke<'a>(
		&'a self,
		session: &'a AuthSession,
		token: &'a RevocationToken,
	) -> BackendFuture<'a, ()>;
}
