mod common;

use campus_hub::{error::AppError, models::Role, policy::Policy};
use common::Fixture;

#[tokio::test]
async fn names_are_unique_and_tokens_are_fresh() {
    let fx = Fixture::new().await;
    let ann = fx.member("Ann").await;
    assert_eq!(ann.role, Role::Member);
    assert_eq!(ann.token.len(), 8);

    assert!(matches!(
        fx.hub.register("Ann", "OTHER").await,
        Err(AppError::Conflict(_))
    ));
    assert!(matches!(
        fx.hub.register(" ", "NEE4").await,
        Err(AppError::BadRequest(_))
    ));
    let bob = fx.member("Bob").await;
    assert_ne!(ann.token, bob.token);
}

#[tokio::test]
async fn login_checks_every_detail() {
    let fx = Fixture::new().await;
    let ann = fx.member("Ann").await;

    let again = fx.hub.login(&ann.token, "Ann", "NEE4").await.unwrap();
    assert_eq!(again, ann);
    for (token, name, class) in [
        (ann.token.as_str(), "Ann", "NEE5"),
        (ann.token.as_str(), "Anne", "NEE4"),
        ("ZZZZ9999", "Ann", "NEE4"),
    ] {
        assert!(matches!(
            fx.hub.login(token, name, class).await,
            Err(AppError::Unauthorized(_))
        ));
    }
}

#[tokio::test]
async fn seeded_names_start_as_super_authorities() {
    let fx = Fixture::new().await;
    assert_eq!(fx.admin.role, Role::SuperAuthority);

    let mut policy = Policy::default();
    policy.seeds = campus_hub::policy::parse_seed_rules("root:STAFF").unwrap();
    let fx = Fixture::with_policy(policy).await;
    // "admin" is no longer a seed under this policy
    assert_eq!(fx.admin.role, Role::Member);
    assert_eq!(
        fx.hub.register("root", "STAFF").await.unwrap().role,
        Role::SuperAuthority
    );
    assert_eq!(fx.hub.register("root2", "STAFF").await.unwrap().role, Role::Member);
}

#[tokio::test]
async fn search_hides_tokens_from_members() {
    let fx = Fixture::new().await;
    let ann = fx.member("Annika").await;
    let fay = fx.member("Fay").await;
    fx.approved_club(&fay, "Annie Chess", None).await;

    let seen_by_member = fx.hub.search(&ann, "anni").await.unwrap();
    assert_eq!(seen_by_member.users.len(), 1);
    assert!(seen_by_member.users[0].token.is_none());
    assert_eq!(seen_by_member.clubs.len(), 1);

    let seen_by_admin = fx.hub.search(&fx.admin, "ANNI").await.unwrap();
    assert_eq!(seen_by_admin.users[0].token.as_deref(), Some(ann.token.as_str()));

    assert!(matches!(
        fx.hub.search(&ann, "  ").await,
        Err(AppError::BadRequest(_))
    ));
}
