mod common;

// crates.io
use time::Duration;
// self
use common::Rig;
use lease_broker::{
	BrokerConfig,
	backend::BackendEvent,
	error::{BackendError, UnavailableReason},
	lease::LeaseState,
	scheduler::TimerState,
	store::{RevocationOutcome, Retirement},
};

#[tokio::test(start_paused = true)]
async fn renewal_fires_at_the_configured_fraction() {
	let Rig { broker, backend, .. } = common::rig(common::config());
	let role = common::audit_role();
	let first = broker.get_credential(&role).await.expect("Initial issuance should succeed.");

	common::advance(Duration::seconds(2159)).await;

	assert_eq!(backend.issue_calls(&role), 1, "Renewal should not fire early.");

	common::advance(Duration::seconds(2)).await;

	let renewed = broker.lease(&role).expect("A renewed lease should be current.");

	assert_eq!(backend.issue_calls(&role), 2);
	assert_ne!(renewed.credential_id, first.credential_id);
	assert_eq!(renewed.state, LeaseState::Active);
	assert_eq!(renewed.issued_at, common::anchor() + Duration::seconds(2160));
	assert_eq!(broker.metrics().renewed(), 1);
	assert_eq!(
		broker.timer_state(&role),
		Some(TimerState::Scheduled {
			credential_id: renewed.credential_id.clone(),
			renew_at: common::anchor() + Duration::seconds(4320),
		})
	);

	let history = broker.history(&role);

	assert_eq!(history.len(), 1);
	assert_eq!(history[0].credential_id, first.credential_id);
	assert_eq!(history[0].retirement, Retirement::Superseded);
	assert_eq!(history[0].revocation, RevocationOutcome::Succeeded);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried_with_backoff() {
	let Rig { broker, backend, .. } = common::rig(common::config());
	let role = common::audit_role();

	broker.get_credential(&role).await.expect("Initial issuance should succeed.");

	let first = broker.lease(&role).expect("Issued lease should be current.");

	assert_eq!(first.state, LeaseState::Active);

	backend.fail_next_issues(&role, 3, BackendError::unavailable("sealed"));

	common::advance(Duration::seconds(2161)).await;

	let renewing = broker.lease(&role).expect("The old lease should stay current.");

	assert_eq!(renewing.credential_id, first.credential_id);
	assert_eq!(renewing.state, LeaseState::Renewing);
	assert_eq!(
		broker.timer_state(&role),
		Some(TimerState::Firing { credential_id: first.credential_id.clone(), attempt: 1 })
	);
	assert_eq!(
		broker.get_credential(&role).await.expect("Renewing leases should be served.").credential_id,
		first.credential_id
	);

	// Retries at +5s, +10s and +20s; the third retry succeeds at 2195s.
	common::advance(Duration::seconds(30)).await;

	assert_eq!(broker.lease(&role).map(|lease| lease.state), Some(LeaseState::Renewing));

	common::advance(Duration::seconds(5)).await;

	let renewed = broker.lease(&role).expect("A renewed lease should be current.");

	assert_ne!(renewed.credential_id, first.credential_id);
	assert_eq!(renewed.state, LeaseState::Active);
	assert_eq!(renewed.issued_at, common::anchor() + Duration::seconds(2195));
	assert_eq!(backend.issue_calls(&role), 5);
	assert_eq!(broker.metrics().issue_failures(), 3);

	let events = backend.events();
	let issued_at = events
		.iter()
		.position(|event| {
			matches!(event, BackendEvent::Issued { credential_id, .. } if *credential_id == renewed.credential_id)
		})
		.expect("Replacement issuance should be logged.");
	let revoked_at = events
		.iter()
		.position(|event| {
			matches!(event, BackendEvent::Revoked { token } if *token == first.revocation_token)
		})
		.expect("Old lease should be revoked.");

	assert!(issued_at < revoked_at, "Old lease should be revoked only after its replacement.");
	assert!(!backend.is_live(&first.revocation_token));
}

#[tokio::test(start_paused = true)]
async fn exhausted_renewal_expires_the_lease() {
	let Rig { broker, backend, .. } = common::rig(common::config());
	let role = common::audit_role();
	let first = broker.get_credential(&role).await.expect("Initial issuance should succeed.");

	backend.fail_all_issues(&role, BackendError::unavailable("sealed"));

	common::advance(Duration::seconds(3000)).await;

	assert_eq!(
		broker.get_credential(&role).await.expect("The old lease should still be served.").credential_id,
		first.credential_id
	);

	common::advance(Duration::seconds(601)).await;

	assert_eq!(broker.lease(&role).map(|lease| lease.state), Some(LeaseState::Expired));
	assert_eq!(broker.metrics().expired(), 1);
	assert_eq!(broker.timer_state(&role), Some(TimerState::Idle));

	let err = broker
		.get_credential(&role)
		.await
		.expect_err("Issuance should fail while the backend is down.");

	assert_eq!(err.reason, UnavailableReason::Backend);

	backend.clear_issue_failures(&role);

	let calls = backend.issue_calls(&role);
	let fresh = broker
		.get_credential(&role)
		.await
		.expect("The next call should issue synchronously.");

	assert_ne!(fresh.credential_id, first.credential_id);
	assert_eq!(backend.issue_calls(&role), calls + 1);

	let history = broker.history(&role);

	assert_eq!(history[0].retirement, Retirement::Expired);
	assert_eq!(history[0].revocation, RevocationOutcome::Skipped);
}

#[tokio::test(start_paused = true)]
async fn retry_limit_stops_attempts_early() {
	let config = BrokerConfig::builder()
		.role(common::audit_role())
		.backoff_jitter(0.0)
		.max_renewal_retries(2)
		.build()
		.expect("Broker config fixture should be valid.");
	let Rig { broker, backend, .. } = common::rig(config);
	let role = common::audit_role();

	broker.get_credential(&role).await.expect("Initial issuance should succeed.");
	backend.fail_all_issues(&role, BackendError::unavailable("sealed"));

	common::advance(Duration::seconds(3000)).await;

	assert_eq!(backend.issue_calls(&role), 4, "One attempt plus two retries are expected.");
	assert_eq!(broker.lease(&role).map(|lease| lease.state), Some(LeaseState::Renewing));

	common::advance(Duration::seconds(601)).await;

	assert_eq!(broker.lease(&role).map(|lease| lease.state), Some(LeaseState::Expired));
	assert_eq!(backend.issue_calls(&role), 4);
}

#[tokio::test(start_paused = true)]
async fn role_not_found_halts_only_that_role() {
	let other = common::role("report-role");
	let config = BrokerConfig::builder()
		.roles([common::audit_role(), other.clone()])
		.backoff_jitter(0.0)
		.build()
		.expect("Broker config fixture should be valid.");
	let Rig { broker, backend, .. } = common::rig(config);
	let role = common::audit_role();
	let first = broker.get_credential(&role).await.expect("Initial issuance should succeed.");

	broker.get_credential(&other).await.expect("Initial issuance should succeed.");
	backend.remove_role(&role);

	common::advance(Duration::seconds(2161)).await;

	assert_eq!(backend.issue_calls(&role), 2);
	assert_eq!(backend.issue_calls(&other), 2, "Other roles should keep renewing.");
	assert!(matches!(broker.timer_state(&other), Some(TimerState::Scheduled { .. })));
	assert_eq!(
		broker.timer_state(&role),
		Some(TimerState::Firing { credential_id: first.credential_id.clone(), attempt: 0 }),
		"The timer should wait out the lease instead of retrying."
	);
	assert_eq!(broker.lease(&role).map(|lease| lease.state), Some(LeaseState::Renewing));
	assert_eq!(
		broker.get_credential(&role).await.expect("The old lease should still be served.").credential_id,
		first.credential_id
	);

	common::advance(Duration::seconds(1440)).await;

	assert_eq!(broker.lease(&role).map(|lease| lease.state), Some(LeaseState::Expired));
	assert_eq!(broker.timer_state(&role), None, "Renewal should stop once the lease lapses.");
	assert_eq!(broker.metrics().expired(), 1);
	assert_eq!(backend.issue_calls(&role), 2, "Halted roles should not be retried in the background.");

	let err = broker
		.get_credential(&role)
		.await
		.expect_err("Issuance should fail once the lease has lapsed.");

	assert_eq!(err.reason, UnavailableReason::RoleNotFound);
	assert_eq!(backend.issue_calls(&role), 3);
}
