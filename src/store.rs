//! In-memory lease slots: one current lease per role plus a bounded audit trail.
//!
//! Every mutation replaces a whole [`Lease`] value under the write lock, so readers either see
//! the previous lease or the fully constructed new one, never a partial update. A role owns a
//! single slot, which makes "at most one live lease per role" structural.

// self
use crate::{
	_prelude::*,
	lease::{CredentialId, Lease, LeaseState, RoleName},
};

/// Why a lease left its role's slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Retirement {
	/// A newer lease replaced it while it was still live.
	Superseded,
	/// It reached its hard expiry before being replaced.
	Expired,
	/// It was revoked explicitly.
	Revoked,
}

/// Result of revoking a retired lease with the backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RevocationOutcome {
	/// Revocation has been requested but not confirmed.
	Pending,
	/// The backend confirmed the revocation.
	Succeeded,
	/// The backend call failed; the lease will lapse at its own expiry.
	Failed {
		/// Failure summary without secret material.
		reason: String,
	},
	/// No revocation was attempted (e.g. the lease had already expired).
	Skipped,
}

/// Audit record for one retired lease.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseHistoryEntry {
	/// Identifier of the retired credential.
	pub credential_id: CredentialId,
	/// Issue instant of the retired lease.
	pub issued_at: OffsetDateTime,
	/// Instant the lease left its slot.
	pub retired_at: OffsetDateTime,
	/// Why it left.
	pub retirement: Retirement,
	/// Backend revocation result.
	pub revocation: RevocationOutcome,
}

#[derive(Debug, Default)]
struct RoleSlot {
	current: Option<Lease>,
	history: VecDeque<LeaseHistoryEntry>,
}
impl RoleSlot {
	fn retire(
		&mut self,
		lease: &Lease,
		retirement: Retirement,
		instant: OffsetDateTime,
		limit: usize,
	) {
		let revocation = match retirement {
			Retirement::Expired => RevocationOutcome::Skipped,
			Retirement::Superseded | Retirement::Revoked => RevocationOutcome::Pending,
		};

		self.history.push_back(LeaseHistoryEntry {
			credential_id: lease.credential_id.clone(),
			issued_at: lease.issued_at,
			retired_at: instant,
			retirement,
			revocation,
		});

		while self.history.len() > limit {
			self.history.pop_front();
		}
	}
}

/// Thread-safe map of role slots.
#[derive(Debug)]
pub struct LeaseStore {
	slots: RwLock<HashMap<RoleName, RoleSlot>>,
	history_limit: usize,
}
impl LeaseStore {
	/// Creates an empty store remembering up to `history_limit` retired leases per role.
	pub fn new(history_limit: usize) -> Self {
		Self { slots: Default::default(), history_limit: history_limit.max(1) }
	}

	/// Current lease of `role` in whatever state it is in, or `None` if the slot is empty.
	pub fn get(&self, role: &RoleName) -> Option<Lease> {
		self.slots.read().get(role).and_then(|slot| slot.current.clone())
	}

	/// Current lease of `role` if it may be handed to consumers at `instant`.
	pub fn get_servable(&self, role: &RoleName, instant: OffsetDateTime) -> Option<Lease> {
		self.get(role).filter(|lease| lease.is_servable_at(instant))
	}

	/// Publishes `lease` as the role's [`LeaseState::Active`] lease and returns the lease it
	/// replaced.
	///
	/// A replaced live lease is recorded as [`Retirement::Superseded`] with a pending
	/// revocation; a replaced expired lease is recorded as [`Retirement::Expired`].
	pub fn set(&self, role: &RoleName, lease: Lease, instant: OffsetDateTime) -> Option<Lease> {
		let active = lease.with_state(LeaseState::Active);
		let mut slots = self.slots.write();
		let slot = slots.entry(role.clone()).or_default();
		let previous = slot.current.replace(active);

		if let Some(previous) = previous.as_ref() {
			let retirement = if previous.state.is_live() {
				Retirement::Superseded
			} else {
				Retirement::Expired
			};

			slot.retire(previous, retirement, instant, self.history_limit);
		}

		previous
	}

	/// Moves the current lease to [`LeaseState::Revoked`] and clears the slot.
	pub fn mark_revoked(&self, role: &RoleName, instant: OffsetDateTime) -> Option<Lease> {
		let mut slots = self.slots.write();
		let slot = slots.get_mut(role)?;
		let current = slot.current.take()?;
		let revoked = current.with_state(LeaseState::Revoked);

		slot.retire(&revoked, Retirement::Revoked, instant, self.history_limit);

		Some(revoked)
	}

	/// Changes the state of the current lease if it is still `id` and the lifecycle permits
	/// the move; returns the updated lease.
	pub fn transition(&self, role: &RoleName, id: &CredentialId, to: LeaseState) -> Option<Lease> {
		let mut slots = self.slots.write();
		let current = slots.get_mut(role)?.current.as_mut()?;

		if &current.credential_id != id || !current.state.can_transition_to(to) {
			return None;
		}

		*current = current.with_state(to);

		Some(current.clone())
	}

	/// Fills in the revocation result for a retired lease.
	pub fn record_revocation(
		&self,
		role: &RoleName,
		id: &CredentialId,
		outcome: RevocationOutcome,
	) -> bool {
		let mut slots = self.slots.write();
		let Some(slot) = slots.get_mut(role) else {
			return false;
		};

		match slot.history.iter_mut().rev().find(|entry| &entry.credential_id == id) {
			Some(entry) => {
				entry.revocation = outcome;

				true
			},
			None => false,
		}
	}

	/// Retired leases of `role`, oldest first.
	pub fn history(&self, role: &RoleName) -> Vec<LeaseHistoryEntry> {
		self.slots
			.read()
			.get(role)
			.map(|slot| slot.history.iter().cloned().collect())
			.unwrap_or_default()
	}

	/// Current lease of every role that has one.
	pub fn snapshot(&self) -> Vec<Lease> {
		self.slots.read().values().filter_map(|slot| slot.current.clone()).collect()
	}
}
