//! Persistence seam for the workflow engine.
//!
//! Every engine operation runs as one closure over a [`Tx`]. A [`Store`]
//! decides how that closure is made atomic: the Postgres backend wraps it in a
//! database transaction and takes row locks through the `lock_*` calls, the
//! memory backend runs it against a private copy of the state that is only
//! published when the closure succeeds.

use crate::{
    error::AppResult,
    models::{
        Activity, Club, ClubEdit, Enrollment, Feedback, FeedbackStatus, NewActivity, NewClub,
        NewEnrollment, NewFeedback, NewNotification, NewRegistration, NewUser, Notification,
        Phase, Registration, Role, Status, User,
    },
};
use async_trait::async_trait;
use futures::future::BoxFuture;

mod memory;
mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

#[derive(Debug, Clone, Default)]
pub struct ClubFilter {
    pub status: Option<Status>,
    pub founder: Option<String>,
}

impl ClubFilter {
    pub fn with_status(status: Status) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn founded_by(founder: impl Into<String>) -> Self {
        Self {
            founder: Some(founder.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, club: &Club) -> bool {
        self.status.map_or(true, |s| club.status == s)
            && self.founder.as_ref().map_or(true, |f| &club.founder == f)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    pub status: Option<Status>,
    pub organizer: Option<String>,
}

impl ActivityFilter {
    pub fn with_status(status: Status) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn organized_by(organizer: impl Into<String>) -> Self {
        Self {
            organizer: Some(organizer.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, activity: &Activity) -> bool {
        self.status.map_or(true, |s| activity.status == s)
            && self
                .organizer
                .as_ref()
                .map_or(true, |o| &activity.organizer == o)
    }
}

/// Selects enrollments. `active` keeps only pending and approved rows.
#[derive(Debug, Clone, Default)]
pub struct EnrollmentFilter {
    pub user: Option<String>,
    pub clubs: Option<Vec<i32>>,
    pub status: Option<Status>,
    pub active: bool,
}

impl EnrollmentFilter {
    pub fn of_user(user: impl Into<String>) -> Self {
        Self {
            user: Some(user.into()),
            ..Self::default()
        }
    }

    pub fn in_club(club_id: i32) -> Self {
        Self::in_clubs(vec![club_id])
    }

    pub fn in_clubs(club_ids: Vec<i32>) -> Self {
        Self {
            clubs: Some(club_ids),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    pub fn active(mut self) -> Self {
        self.active = true;
        self
    }

    pub fn matches(&self, enrollment: &Enrollment) -> bool {
        self.user.as_ref().map_or(true, |u| &enrollment.user_token == u)
            && self
                .clubs
                .as_ref()
                .map_or(true, |ids| ids.contains(&enrollment.club_id))
            && self.status.map_or(true, |s| enrollment.status == s)
            && (!self.active || enrollment.status.is_active())
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegistrationFilter {
    pub user: Option<String>,
    pub activities: Option<Vec<i32>>,
    pub status: Option<Status>,
}

impl RegistrationFilter {
    pub fn of_user(user: impl Into<String>) -> Self {
        Self {
            user: Some(user.into()),
            ..Self::default()
        }
    }

    pub fn in_activity(activity_id: i32) -> Self {
        Self::in_activities(vec![activity_id])
    }

    pub fn in_activities(activity_ids: Vec<i32>) -> Self {
        Self {
            activities: Some(activity_ids),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    pub fn matches(&self, registration: &Registration) -> bool {
        self.user
            .as_ref()
            .map_or(true, |u| &registration.user_token == u)
            && self
                .activities
                .as_ref()
                .map_or(true, |ids| ids.contains(&registration.activity_id))
            && self.status.map_or(true, |s| registration.status == s)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FeedbackFilter {
    pub author: Option<String>,
    pub status: Option<FeedbackStatus>,
}

impl FeedbackFilter {
    pub fn matches(&self, feedback: &Feedback) -> bool {
        self.author.as_ref().map_or(true, |a| &feedback.author == a)
            && self.status.map_or(true, |s| feedback.status == s)
    }
}

/// One unit of work against the store.
///
/// Listing calls return rows in submission order.
#[async_trait]
pub trait Tx: Send {
    async fn insert_user(&mut self, user: NewUser) -> AppResult<Option<User>>;
    async fn user(&mut self, token: &str) -> AppResult<Option<User>>;
    /// Like [`Tx::user`], but holds the row until the unit of work ends.
    async fn lock_user(&mut self, token: &str) -> AppResult<Option<User>>;
    async fn users(&mut self, tokens: Vec<String>) -> AppResult<Vec<User>>;
    async fn search_users(&mut self, query: &str) -> AppResult<Vec<User>>;
    async fn set_role(&mut self, token: &str, role: Role) -> AppResult<Option<User>>;

    async fn insert_club(&mut self, club: NewClub) -> AppResult<Club>;
    async fn club(&mut self, id: i32) -> AppResult<Option<Club>>;
    async fn lock_club(&mut self, id: i32) -> AppResult<Option<Club>>;
    async fn clubs(&mut self, filter: ClubFilter) -> AppResult<Vec<Club>>;
    /// Whether a pending or approved club already uses `name`.
    async fn club_name_taken(&mut self, name: &str) -> AppResult<bool>;
    async fn update_club(&mut self, id: i32, edit: ClubEdit) -> AppResult<Club>;
    async fn set_club_status(&mut self, id: i32, status: Status) -> AppResult<()>;
    async fn delete_club(&mut self, id: i32) -> AppResult<()>;

    async fn insert_enrollment(&mut self, enrollment: NewEnrollment) -> AppResult<Enrollment>;
    async fn enrollment(&mut self, id: i32) -> AppResult<Option<Enrollment>>;
    async fn enrollments(&mut self, filter: EnrollmentFilter) -> AppResult<Vec<Enrollment>>;
    async fn count_enrollments(&mut self, filter: EnrollmentFilter) -> AppResult<i64>;
    /// Writes back the club and status of an existing enrollment.
    async fn update_enrollment(&mut self, enrollment: &Enrollment) -> AppResult<()>;
    async fn delete_enrollments(&mut self, filter: EnrollmentFilter) -> AppResult<usize>;

    async fn insert_activity(&mut self, activity: NewActivity) -> AppResult<Activity>;
    async fn activity(&mut self, id: i32) -> AppResult<Option<Activity>>;
    async fn lock_activity(&mut self, id: i32) -> AppResult<Option<Activity>>;
    async fn activities(&mut self, filter: ActivityFilter) -> AppResult<Vec<Activity>>;
    async fn set_activity_status(&mut self, id: i32, status: Status) -> AppResult<()>;
    async fn set_activity_phase(&mut self, id: i32, phase: Phase) -> AppResult<Activity>;
    async fn delete_activity(&mut self, id: i32) -> AppResult<()>;

    async fn insert_registration(
        &mut self,
        registration: NewRegistration,
    ) -> AppResult<Registration>;
    async fn registration(&mut self, id: i32) -> AppResult<Option<Registration>>;
    async fn registrations(&mut self, filter: RegistrationFilter)
        -> AppResult<Vec<Registration>>;
    async fn count_registrations(&mut self, filter: RegistrationFilter) -> AppResult<i64>;
    /// Writes back the status and payment status of an existing registration.
    async fn update_registration(&mut self, registration: &Registration) -> AppResult<()>;
    async fn delete_registrations(&mut self, filter: RegistrationFilter) -> AppResult<usize>;

    async fn insert_notification(
        &mut self,
        notification: NewNotification,
    ) -> AppResult<Notification>;
    async fn count_unread(&mut self, token: &str) -> AppResult<i64>;
    async fn mark_read(&mut self, token: &str) -> AppResult<usize>;

    async fn insert_feedback(&mut self, feedback: NewFeedback) -> AppResult<Feedback>;
    async fn feedback(&mut self, id: i32) -> AppResult<Option<Feedback>>;
    async fn feedbacks(&mut self, filter: FeedbackFilter) -> AppResult<Vec<Feedback>>;
    async fn reply_feedback(&mut self, id: i32, reply: String) -> AppResult<Feedback>;
}

/// Runs closures over a [`Tx`] as all-or-nothing units of work.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    async fn atomically<R, F>(&self, work: F) -> AppResult<R>
    where
        R: Send + 'static,
        F: for<'t> FnOnce(&'t mut dyn Tx) -> BoxFuture<'t, AppResult<R>> + Send + 'static;
}

/// The store selected at startup.
#[derive(Clone)]
pub enum Backend {
    Postgres(PgStore),
    Memory(MemoryStore),
}

#[async_trait]
impl Store for Backend {
    async fn atomically<R, F>(&self, work: F) -> AppResult<R>
    where
        R: Send + 'static,
        F: for<'t> FnOnce(&'t mut dyn Tx) -> BoxFuture<'t, AppResult<R>> + Send + 'static,
    {
        match self {
            Backend::Postgres(store) => store.atomically(work).await,
            Backend::Memory(store) => store.atomically(work).await,
        }
    }
}
