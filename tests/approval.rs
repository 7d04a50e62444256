mod common;

use campus_hub::{
    approval::{ApprovalKind, Decision},
    enrollment::ClubSubmission,
    error::AppError,
    models::{Role, Status},
    notify::HubEvent,
    registration::ActivitySubmission,
};
use common::Fixture;

fn club(name: &str) -> ClubSubmission {
    ClubSubmission {
        name: name.into(),
        ..ClubSubmission::default()
    }
}

#[tokio::test]
async fn promoted_authorities_can_review_and_members_cannot_promote() {
    let fx = Fixture::new().await;
    let (ann, bob, fay) = (
        fx.member("Ann").await,
        fx.member("Bob").await,
        fx.member("Fay").await,
    );
    let pending = fx.hub.create_club(&fay, club("Chess")).await.unwrap();

    assert!(matches!(
        fx.hub
            .approve(&ann, ApprovalKind::Club, pending.id, Decision::Approved)
            .await,
        Err(AppError::Forbidden(_))
    ));
    assert!(fx.hub.audit_status(&ann).await.unwrap().awaiting.is_empty());

    let ann = fx
        .hub
        .set_role(&fx.admin, &ann.token, Role::Authority)
        .await
        .unwrap();
    assert_eq!(ann.role, Role::Authority);

    let board = fx.hub.audit_status(&ann).await.unwrap();
    assert_eq!(board.awaiting.len(), 1);
    assert_eq!(board.awaiting[0].kind, ApprovalKind::Club);
    assert_eq!(board.awaiting[0].submitter_name.as_deref(), Some("Fay"));
    fx.hub
        .approve(&ann, ApprovalKind::Club, pending.id, Decision::Approved)
        .await
        .unwrap();

    assert!(matches!(
        fx.hub.set_role(&bob, &fay.token, Role::Authority).await,
        Err(AppError::Forbidden(_))
    ));
    // authorities are not super-authorities
    assert!(matches!(
        fx.hub.set_role(&ann, &bob.token, Role::Authority).await,
        Err(AppError::Forbidden(_))
    ));
    assert!(matches!(
        fx.hub.set_role(&fx.admin, "NOBODY00", Role::Authority).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn every_decision_notifies_its_subject() {
    let fx = Fixture::new().await;
    let (fay, gus) = (fx.member("Fay").await, fx.member("Gus").await);
    let chess = fx.hub.create_club(&fay, club("Chess")).await.unwrap();
    let go = fx.hub.create_club(&gus, club("Go")).await.unwrap();

    fx.decide(ApprovalKind::Club, chess.id, Decision::Approved)
        .await;
    fx.decide(ApprovalKind::Club, go.id, Decision::Rejected)
        .await;

    for user in [&fay, &gus] {
        let summary = fx.hub.notification_summary(user).await.unwrap();
        assert_eq!(summary.unread, 1);
        assert!(summary.has_pending_work);
        assert!(fx.events.events().contains(&HubEvent::for_user(user.token.clone())));
    }
}

#[tokio::test]
async fn owners_decide_on_their_own_requests() {
    let fx = Fixture::new().await;
    let (fay, gus, ann) = (
        fx.member("Fay").await,
        fx.member("Gus").await,
        fx.member("Ann").await,
    );
    let chess = fx.approved_club(&fay, "Chess", None).await;
    let request = fx.hub.submit_enrollment(&ann, chess.id).await.unwrap();

    assert!(matches!(
        fx.hub
            .approve(&gus, ApprovalKind::ClubJoin, request.id, Decision::Approved)
            .await,
        Err(AppError::Forbidden(_))
    ));
    let outcome = fx
        .hub
        .approve(&fay, ApprovalKind::ClubJoin, request.id, Decision::Approved)
        .await
        .unwrap();
    assert_eq!(outcome.status, Status::Approved);
    assert_eq!(outcome.payment_status, None);

    let activity = fx
        .approved_activity(
            &gus,
            ActivitySubmission {
                name: "Gala".into(),
                ..ActivitySubmission::default()
            },
        )
        .await;
    let signup = fx
        .hub
        .submit_registration(&ann, activity.id, Default::default(), None)
        .await
        .unwrap();
    assert!(matches!(
        fx.hub
            .approve(&fay, ApprovalKind::ActivityReg, signup.id, Decision::Rejected)
            .await,
        Err(AppError::Forbidden(_))
    ));
    fx.hub
        .approve(&gus, ApprovalKind::ActivityReg, signup.id, Decision::Rejected)
        .await
        .unwrap();
}

#[tokio::test]
async fn unknown_targets_are_not_found() {
    let fx = Fixture::new().await;
    for kind in [
        ApprovalKind::Club,
        ApprovalKind::Activity,
        ApprovalKind::ClubJoin,
        ApprovalKind::ActivityReg,
    ] {
        assert!(matches!(
            fx.hub.approve(&fx.admin, kind, 4_242, Decision::Approved).await,
            Err(AppError::NotFound(_))
        ));
    }
}

#[tokio::test]
async fn the_status_board_keeps_submission_history() {
    let fx = Fixture::new().await;
    let (fay, ann) = (fx.member("Fay").await, fx.member("Ann").await);
    let chess = fx.approved_club(&fay, "Chess", None).await;
    let request = fx.hub.submit_enrollment(&ann, chess.id).await.unwrap();

    let founder_board = fx.hub.audit_status(&fay).await.unwrap();
    assert_eq!(founder_board.awaiting.len(), 1);
    assert_eq!(founder_board.awaiting[0].kind, ApprovalKind::ClubJoin);
    assert_eq!(founder_board.awaiting[0].title, "Chess");
    assert_eq!(founder_board.submitted.len(), 2);

    fx.hub
        .approve(&fay, ApprovalKind::ClubJoin, request.id, Decision::Rejected)
        .await
        .unwrap();
    let member_board = fx.hub.audit_status(&ann).await.unwrap();
    assert!(member_board.awaiting.is_empty());
    assert_eq!(member_board.submitted.len(), 1);
    assert_eq!(member_board.submitted[0].status, Status::Rejected);
    assert!(fx.hub.audit_status(&fay).await.unwrap().awaiting.is_empty());
}
