mod common;

use campus_hub::{
    approval::{ApprovalKind, Decision},
    enrollment::ClubSubmission,
    error::AppError,
    models::FeedbackStatus,
    notify::HubEvent,
};
use common::Fixture;

#[tokio::test]
async fn pending_work_is_derived_on_every_call() {
    let fx = Fixture::new().await;
    let (fay, ann) = (fx.member("Fay").await, fx.member("Ann").await);
    assert!(!fx.hub.has_pending_work(&fx.admin).await.unwrap());
    assert!(!fx.hub.has_pending_work(&ann).await.unwrap());

    let pending = fx
        .hub
        .create_club(
            &fay,
            ClubSubmission {
                name: "Chess".into(),
                ..ClubSubmission::default()
            },
        )
        .await
        .unwrap();
    assert!(fx.hub.has_pending_work(&fx.admin).await.unwrap());
    // creations only push a hint to reviewers
    assert!(!fx.hub.has_pending_work(&fay).await.unwrap());
    assert!(fx.events.events().contains(&HubEvent::for_reviewers("new_audit")));

    fx.decide(ApprovalKind::Club, pending.id, Decision::Approved)
        .await;
    assert!(!fx.hub.has_pending_work(&fx.admin).await.unwrap());
    assert!(fx.hub.has_pending_work(&fay).await.unwrap());
    assert_eq!(fx.hub.mark_read(&fay).await.unwrap(), 1);
    assert!(!fx.hub.has_pending_work(&fay).await.unwrap());

    fx.hub.submit_enrollment(&ann, pending.id).await.unwrap();
    let summary = fx.hub.notification_summary(&fay).await.unwrap();
    assert_eq!(summary.unread, 1);
    fx.hub.mark_read(&fay).await.unwrap();
    // the join request still waits on Fay after she has read everything
    let summary = fx.hub.notification_summary(&fay).await.unwrap();
    assert_eq!(summary.unread, 0);
    assert!(summary.has_pending_work);
}

#[tokio::test]
async fn marking_read_twice_is_harmless() {
    let fx = Fixture::new().await;
    let ann = fx.member("Ann").await;
    assert_eq!(fx.hub.mark_read(&ann).await.unwrap(), 0);
    assert_eq!(fx.hub.mark_read(&ann).await.unwrap(), 0);
}

#[tokio::test]
async fn feedback_is_answered_by_authorities() {
    let fx = Fixture::new().await;
    let ann = fx.member("Ann").await;

    assert!(matches!(
        fx.hub.submit_feedback(&ann, "   ", vec![]).await,
        Err(AppError::BadRequest(_))
    ));
    let feedback = fx
        .hub
        .submit_feedback(&ann, "the lights are broken", vec!["photo.jpg".into(), " ".into()])
        .await
        .unwrap();
    assert_eq!(feedback.media, vec!["photo.jpg".to_string()]);
    assert_eq!(feedback.author_name, "Ann");
    assert!(fx.hub.has_pending_work(&fx.admin).await.unwrap());
    assert!(fx.events.events().contains(&HubEvent::for_reviewers("new_feedback")));

    assert!(matches!(
        fx.hub.all_feedback(&ann, None).await,
        Err(AppError::Forbidden(_))
    ));
    assert!(matches!(
        fx.hub.reply_feedback(&ann, feedback.id, "fixed").await,
        Err(AppError::Forbidden(_))
    ));
    assert!(matches!(
        fx.hub.reply_feedback(&fx.admin, 9_999, "fixed").await,
        Err(AppError::NotFound(_))
    ));

    let answered = fx
        .hub
        .reply_feedback(&fx.admin, feedback.id, "fixed on Monday")
        .await
        .unwrap();
    assert_eq!(answered.status, FeedbackStatus::Resolved);
    assert_eq!(answered.reply.as_deref(), Some("fixed on Monday"));

    assert_eq!(fx.hub.notification_summary(&ann).await.unwrap().unread, 1);
    assert!(!fx.hub.has_pending_work(&fx.admin).await.unwrap());
    assert_eq!(fx.hub.my_feedback(&ann).await.unwrap().len(), 1);
    let open = fx
        .hub
        .all_feedback(&fx.admin, Some(FeedbackStatus::Pending))
        .await
        .unwrap();
    assert!(open.is_empty());
}
