//! Per-role renewal timers and retry backoff.
//!
//! Each role gets its own tokio task, so a slow or failing renewal for one role never delays
//! another. The registry here only owns the tasks and their observable state; the renewal
//! loop itself lives in [`broker`](crate::broker) because it re-issues through the broker.

pub mod backoff;

pub use backoff::BackoffPolicy;

// std
use std::sync::atomic::{AtomicBool, Ordering};
// crates.io
use tokio::{sync::Notify, task::JoinHandle};
// self
use crate::{
	_prelude::*,
	lease::{CredentialId, RoleName},
};

/// Observable state of a role's renewal timer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TimerState {
	/// No live lease to renew; waiting for one to be activated.
	Idle,
	/// Armed to fire at `renew_at`.
	Scheduled {
		/// Lease the timer will renew.
		credential_id: CredentialId,
		/// Trigger instant.
		renew_at: OffsetDateTime,
	},
	/// Renewal in progress.
	Firing {
		/// Lease being renewed.
		credential_id: CredentialId,
		/// Failed attempts so far.
		attempt: u32,
	},
}

/// Shared handles passed into a timer task.
#[derive(Clone, Debug)]
pub(crate) struct TimerHandle {
	pub(crate) wake: Arc<Notify>,
	pub(crate) state: Arc<Mutex<TimerState>>,
}
impl TimerHandle {
	pub(crate) fn set(&self, state: TimerState) {
		*self.state.lock() = state;
	}
}

#[derive(Debug)]
struct RoleTimer {
	task: JoinHandle<()>,
	handle: TimerHandle,
}

/// Registry of per-role renewal tasks.
#[derive(Debug, Default)]
pub struct RenewalScheduler {
	timers: Mutex<HashMap<RoleName, RoleTimer>>,
	shut_down: AtomicBool,
}
impl RenewalScheduler {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Wakes the timer of `role`, starting one through `spawn` if none is running.
	///
	/// Returns `false` once the scheduler has been shut down.
	pub(crate) fn ensure<F>(&self, role: &RoleName, spawn: F) -> bool
	where
		F: FnOnce(TimerHandle) -> JoinHandle<()>,
	{
		if self.is_shut_down() {
			return false;
		}

		let mut timers = self.timers.lock();

		if let Some(timer) = timers.get(role).filter(|timer| !timer.task.is_finished()) {
			timer.handle.wake.notify_one();

			return true;
		}

		let handle = TimerHandle {
			wake: Arc::new(Notify::new()),
			state: Arc::new(Mutex::new(TimerState::Idle)),
		};
		let task = spawn(handle.clone());

		timers.insert(role.clone(), RoleTimer { task, handle });

		true
	}

	/// Wakes the timer of `role` so it re-reads the current lease.
	pub fn wake(&self, role: &RoleName) {
		if let Some(timer) = self.timers.lock().get(role) {
			timer.handle.wake.notify_one();
		}
	}

	/// Current timer state of `role`, or `None` when no timer is running.
	pub fn state(&self, role: &RoleName) -> Option<TimerState> {
		self.timers
			.lock()
			.get(role)
			.filter(|timer| !timer.task.is_finished())
			.map(|timer| timer.handle.state.lock().clone())
	}

	/// Roles with a running timer.
	pub fn roles(&self) -> Vec<RoleName> {
		self.timers
			.lock()
			.iter()
			.filter(|(_, timer)| !timer.task.is_finished())
			.map(|(role, _)| role.clone())
			.collect()
	}

	/// Cancels the timer of `role`.
	pub fn cancel(&self, role: &RoleName) {
		if let Some(timer) = self.timers.lock().remove(role) {
			timer.task.abort();
		}
	}

	/// Cancels every timer and refuses to start new ones.
	pub fn shutdown(&self) {
		self.shut_down.store(true, Ordering::SeqCst);

		for (_, timer) in self.timers.lock().drain() {
			timer.task.abort();
		}
	}

	/// Returns `true` after [`shutdown`](Self::shutdown).
	pub fn is_shut_down(&self) -> bool {
		self.shut_down.load(Ordering::SeqCst)
	}

	/// Drops the registry entry of a timer that stopped on its own.
	pub(crate) fn retire(&self, role: &RoleName, handle: &TimerHandle) {
		let mut timers = self.timers.lock();

		if timers.get(role).is_some_and(|timer| Arc::ptr_eq(&timer.handle.wake, &handle.wake)) {
			timers.remove(role);
		}
	}
}
