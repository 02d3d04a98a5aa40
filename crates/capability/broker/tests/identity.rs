mod support;

use domain::CouplingMode;
use kapua_broker::{BindDecision, DenyReason, ReservationChange};
use support::{broker, current_option, fixture, seed};

fn allowed(reservation: ReservationChange) -> BindDecision {
    BindDecision::Allow { reservation }
}

#[tokio::test]
async fn unknown_client_is_allowed() {
    let fx = fixture();
    let decision = fx
        .resolver
        .authorize_bind("1", "gw-new", "u-1", None)
        .await
        .expect("bind");
    assert_eq!(decision, allowed(ReservationChange::NewConnection));
}

#[tokio::test]
async fn open_mode_allows_any_user_without_reserving() {
    let fx = fixture();
    seed(&fx, "gw-01", CouplingMode::Open, None, false).await;
    let decision = fx
        .resolver
        .authorize_bind("1", "gw-01", "u-2", None)
        .await
        .expect("bind");
    assert_eq!(decision, allowed(ReservationChange::Unchanged));
    assert!(current_option(&fx, "gw-01").await.reserved_user_id.is_none());
}

#[tokio::test]
async fn open_mode_with_reservation_allows_other_user() {
    let fx = fixture();
    seed(&fx, "gw-01", CouplingMode::Open, Some("u-1"), false).await;
    let decision = fx
        .resolver
        .authorize_bind("1", "gw-01", "u-2", None)
        .await
        .expect("bind");
    assert_eq!(decision, allowed(ReservationChange::Unchanged));
    assert_eq!(
        current_option(&fx, "gw-01").await.reserved_user_id.as_deref(),
        Some("u-1")
    );
}

#[tokio::test]
async fn strict_mode_pins_first_user_then_rejects_others() {
    let fx = fixture();
    seed(&fx, "gw-01", CouplingMode::Strict, None, false).await;
    let first = fx
        .resolver
        .authorize_bind("1", "gw-01", "u-1", None)
        .await
        .expect("bind");
    assert_eq!(
        first,
        allowed(ReservationChange::Reserved {
            user_id: "u-1".to_string()
        })
    );
    let same = fx
        .resolver
        .authorize_bind("1", "gw-01", "u-1", None)
        .await
        .expect("bind");
    assert_eq!(same, allowed(ReservationChange::Unchanged));
    let other = fx
        .resolver
        .authorize_bind("1", "gw-01", "u-2", None)
        .await
        .expect("bind");
    assert_eq!(other, BindDecision::Deny(DenyReason::UserMismatch));
}

#[tokio::test]
async fn same_user_change_is_consumed_once() {
    let fx = fixture();
    seed(&fx, "gw-01", CouplingMode::SameUser, Some("u-1"), true).await;
    let moved = fx
        .resolver
        .authorize_bind("1", "gw-01", "u-2", None)
        .await
        .expect("bind");
    assert_eq!(
        moved,
        allowed(ReservationChange::Moved {
            from: "u-1".to_string(),
            to: "u-2".to_string()
        })
    );
    let option = current_option(&fx, "gw-01").await;
    assert_eq!(option.reserved_user_id.as_deref(), Some("u-2"));
    assert!(!option.allow_user_change);

    let again = fx
        .resolver
        .authorize_bind("1", "gw-01", "u-3", None)
        .await
        .expect("bind");
    assert_eq!(again, BindDecision::Deny(DenyReason::UserMismatch));
}

#[tokio::test]
async fn same_user_without_change_rejects_other_user() {
    let fx = fixture();
    seed(&fx, "gw-01", CouplingMode::SameUser, Some("u-1"), false).await;
    let decision = fx
        .resolver
        .authorize_bind("1", "gw-01", "u-2", None)
        .await
        .expect("bind");
    assert_eq!(decision, BindDecision::Deny(DenyReason::UserMismatch));
}

#[tokio::test]
async fn user_reserved_by_another_client_is_denied() {
    let fx = fixture();
    seed(&fx, "gw-01", CouplingMode::Strict, Some("u-1"), false).await;
    seed(&fx, "gw-02", CouplingMode::Strict, None, false).await;
    let decision = fx
        .resolver
        .authorize_bind("1", "gw-02", "u-1", None)
        .await
        .expect("bind");
    assert_eq!(decision, BindDecision::Deny(DenyReason::UserReservedElsewhere));
    assert!(current_option(&fx, "gw-02").await.reserved_user_id.is_none());
}

#[tokio::test]
async fn trust_key_must_match_and_be_unexpired() {
    let fx = fixture();
    let option = seed(&fx, "gw-01", CouplingMode::Open, None, false).await;
    fx.options
        .update_trust_key(&broker(), "1", &option.id, "s3cret", None)
        .await
        .expect("trust key");

    let wrong = fx
        .resolver
        .authorize_bind("1", "gw-01", "u-1", Some("guess"))
        .await
        .expect("bind");
    assert_eq!(wrong, BindDecision::Deny(DenyReason::TrustKeyInvalid));
    let right = fx
        .resolver
        .authorize_bind("1", "gw-01", "u-1", Some("s3cret"))
        .await
        .expect("bind");
    assert!(right.is_allowed());

    fx.options
        .update_trust_key(&broker(), "1", &option.id, "s3cret", Some(1))
        .await
        .expect("expire");
    let expired = fx
        .resolver
        .authorize_bind("1", "gw-01", "u-1", Some("s3cret"))
        .await
        .expect("bind");
    assert_eq!(expired, BindDecision::Deny(DenyReason::TrustKeyInvalid));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_binds_move_same_user_reservation_once() {
    let fx = fixture();
    let seeded = seed(&fx, "gw-01", CouplingMode::SameUser, Some("u-1"), true).await;
    let barrier = std::sync::Arc::new(tokio::sync::Barrier::new(2));

    let mut handles = Vec::new();
    for candidate in ["u-2", "u-3"] {
        let resolver = fx.resolver.clone();
        let barrier = barrier.clone();
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            let decision = resolver
                .authorize_bind("1", "gw-01", candidate, None)
                .await
                .expect("bind");
            (candidate, decision)
        }));
    }

    let mut moved_to = Vec::new();
    let mut mismatches = 0;
    for handle in handles {
        match handle.await.expect("join") {
            (candidate, BindDecision::Allow { reservation }) => {
                assert_eq!(
                    reservation,
                    ReservationChange::Moved {
                        from: "u-1".to_string(),
                        to: candidate.to_string()
                    }
                );
                moved_to.push(candidate);
            }
            (_, BindDecision::Deny(reason)) => {
                assert_eq!(reason, DenyReason::UserMismatch);
                mismatches += 1;
            }
        }
    }
    assert_eq!(moved_to.len(), 1);
    assert_eq!(mismatches, 1);

    let option = current_option(&fx, "gw-01").await;
    assert_eq!(option.reserved_user_id.as_deref(), Some(moved_to[0]));
    assert!(!option.allow_user_change);
    assert_eq!(option.audit.optlock, seeded.audit.optlock + 1);
}
