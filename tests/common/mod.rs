#![allow(dead_code)]

use campus_hub::{
    approval::{ApprovalKind, Decision},
    enrollment::ClubSubmission,
    models::{Activity, Club, User},
    notify::{HubEvent, Publisher},
    policy::Policy,
    registration::ActivitySubmission,
    rotation::Clock,
    store::MemoryStore,
    Hub,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::{Arc, Mutex};

pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    pub fn set(&self, at: DateTime<Utc>) {
        *self.0.lock().unwrap() = at;
    }

    pub fn advance(&self, by: Duration) {
        *self.0.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

#[derive(Default)]
pub struct RecordingPublisher(Mutex<Vec<HubEvent>>);

impl RecordingPublisher {
    pub fn events(&self) -> Vec<HubEvent> {
        self.0.lock().unwrap().clone()
    }
}

impl Publisher for RecordingPublisher {
    fn publish(&self, event: HubEvent) {
        self.0.lock().unwrap().push(event);
    }
}

/// Tuesday 2024-01-02 12:00 at +08:00, inside the rotation window.
pub fn tuesday_noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 2, 4, 0, 0).unwrap()
}

pub struct Fixture {
    pub hub: Arc<Hub<MemoryStore>>,
    pub clock: Arc<ManualClock>,
    pub events: Arc<RecordingPublisher>,
    pub admin: User,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_policy(Policy::default()).await
    }

    pub async fn with_policy(policy: Policy) -> Self {
        let clock = Arc::new(ManualClock(Mutex::new(tuesday_noon())));
        let events = Arc::new(RecordingPublisher::default());
        let hub = Arc::new(Hub::new(MemoryStore::new(), events.clone(), clock.clone(), policy));
        let admin = hub.register("admin", "STAFF").await.unwrap();
        Self {
            hub,
            clock,
            events,
            admin,
        }
    }

    pub async fn member(&self, name: &str) -> User {
        self.hub.register(name, "NEE4").await.unwrap()
    }

    pub async fn decide(&self, kind: ApprovalKind, id: i32, decision: Decision) {
        self.hub
            .approve(&self.admin, kind, id, decision)
            .await
            .unwrap();
    }

    /// An approved club with no members at all, not even its founder.
    pub async fn empty_club(&self, founder: &User, name: &str, capacity: Option<i32>) -> Club {
        let club = self.approved_club(founder, name, capacity).await;
        self.hub.leave(founder).await.unwrap();
        club
    }

    pub async fn approved_club(&self, founder: &User, name: &str, capacity: Option<i32>) -> Club {
        let club = self
            .hub
            .create_club(
                founder,
                ClubSubmission {
                    name: name.into(),
                    capacity,
                    ..ClubSubmission::default()
                },
            )
            .await
            .unwrap();
        self.decide(ApprovalKind::Club, club.id, Decision::Approved)
            .await;
        club
    }

    pub async fn approved_activity(&self, organizer: &User, submission: ActivitySubmission) -> Activity {
        let activity = self
            .hub
            .create_activity(organizer, submission)
            .await
            .unwrap();
        self.decide(ApprovalKind::Activity, activity.id, Decision::Approved)
            .await;
        activity
    }
}
