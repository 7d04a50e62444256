use super::{
    ActivityFilter, ClubFilter, EnrollmentFilter, FeedbackFilter, RegistrationFilter, Store, Tx,
};
use crate::{
    error::{AppError, AppResult},
    models::{
        Activity, Club, ClubEdit, Enrollment, Feedback, FeedbackStatus, NewActivity, NewClub,
        NewEnrollment, NewFeedback, NewNotification, NewRegistration, NewUser, Notification,
        Phase, Registration, Role, Status, User,
    },
};
use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Default)]
struct State {
    next_id: i32,
    users: Vec<User>,
    clubs: Vec<Club>,
    enrollments: Vec<Enrollment>,
    activities: Vec<Activity>,
    registrations: Vec<Registration>,
    notifications: Vec<Notification>,
    feedback: Vec<Feedback>,
}

impl State {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }
}

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

/// Process-local store. Units of work run one at a time against a copy of the
/// state, which replaces the shared state only when the unit succeeds.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn atomically<R, F>(&self, work: F) -> AppResult<R>
    where
        R: Send + 'static,
        F: for<'t> FnOnce(&'t mut dyn Tx) -> BoxFuture<'t, AppResult<R>> + Send + 'static,
    {
        let mut shared = self.state.lock().await;
        let mut tx = MemoryTx {
            state: shared.clone(),
            #[cfg(test)]
            locks: Vec::new(),
        };
        let out = work(&mut tx).await?;
        *shared = tx.state;
        Ok(out)
    }
}

struct MemoryTx {
    state: State,
    /// Rows in the order a unit of work asked to lock them.
    #[cfg(test)]
    locks: Vec<String>,
}

impl MemoryTx {
    /// Mirrors the partial unique index on live club names.
    fn live_name_clash(&self, name: &str, except: i32) -> bool {
        self.state
            .clubs
            .iter()
            .any(|c| c.id != except && c.name == name && c.status.is_active())
    }

    fn club_mut(&mut self, id: i32) -> AppResult<&mut Club> {
        self.state
            .clubs
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| AppError::not_found("the club does not exist"))
    }

    fn activity_mut(&mut self, id: i32) -> AppResult<&mut Activity> {
        self.state
            .activities
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| AppError::not_found("the activity does not exist"))
    }
}

#[async_trait]
impl Tx for MemoryTx {
    async fn insert_user(&mut self, user: NewUser) -> AppResult<Option<User>> {
        let taken = self
            .state
            .users
            .iter()
            .any(|u| u.name == user.name || u.token == user.token);
        if taken {
            return Ok(None);
        }
        let user = User {
            id: self.state.next_id(),
            token: user.token,
            name: user.name,
            class: user.class,
            role: user.role,
            created_at: now(),
        };
        self.state.users.push(user.clone());
        Ok(Some(user))
    }

    async fn user(&mut self, token: &str) -> AppResult<Option<User>> {
        Ok(self.state.users.iter().find(|u| u.token == token).cloned())
    }

    async fn lock_user(&mut self, token: &str) -> AppResult<Option<User>> {
        #[cfg(test)]
        self.locks.push(format!("user:{token}"));
        self.user(token).await
    }

    async fn users(&mut self, tokens: Vec<String>) -> AppResult<Vec<User>> {
        Ok(self
            .state
            .users
            .iter()
            .filter(|u| tokens.contains(&u.token))
            .cloned()
            .collect())
    }

    async fn search_users(&mut self, query: &str) -> AppResult<Vec<User>> {
        let query = query.to_lowercase();
        Ok(self
            .state
            .users
            .iter()
            .filter(|u| {
                u.name.to_lowercase().contains(&query) || u.token.to_lowercase().contains(&query)
            })
            .cloned()
            .collect())
    }

    async fn set_role(&mut self, token: &str, role: Role) -> AppResult<Option<User>> {
        Ok(self
            .state
            .users
            .iter_mut()
            .find(|u| u.token == token)
            .map(|u| {
                u.role = role;
                u.clone()
            }))
    }

    async fn insert_club(&mut self, club: NewClub) -> AppResult<Club> {
        if club.status.is_active() && self.club_name_taken(&club.name).await? {
            return Err(AppError::conflict("a club with this name already exists"));
        }
        let club = Club {
            id: self.state.next_id(),
            name: club.name,
            intro: club.intro,
            content: club.content,
            location: club.location,
            meet_time: club.meet_time,
            duration: club.duration,
            weeks: club.weeks,
            capacity: club.capacity,
            attachment: club.attachment,
            founder: club.founder,
            status: club.status,
            created_at: now(),
        };
        self.state.clubs.push(club.clone());
        Ok(club)
    }

    async fn club(&mut self, id: i32) -> AppResult<Option<Club>> {
        Ok(self.state.clubs.iter().find(|c| c.id == id).cloned())
    }

    async fn lock_club(&mut self, id: i32) -> AppResult<Option<Club>> {
        #[cfg(test)]
        self.locks.push(format!("club:{id}"));
        self.club(id).await
    }

    async fn clubs(&mut self, filter: ClubFilter) -> AppResult<Vec<Club>> {
        Ok(self
            .state
            .clubs
            .iter()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect())
    }

    async fn club_name_taken(&mut self, name: &str) -> AppResult<bool> {
        Ok(self
            .state
            .clubs
            .iter()
            .any(|c| c.name == name && c.status.is_active()))
    }

    async fn update_club(&mut self, id: i32, edit: ClubEdit) -> AppResult<Club> {
        let current = self.club_mut(id)?.clone();
        let name = edit.name.as_deref().unwrap_or(&current.name);
        if current.status.is_active() && self.live_name_clash(name, id) {
            return Err(AppError::conflict("a club with this name already exists"));
        }
        let club = self.club_mut(id)?;
        edit.apply_to(club);
        Ok(club.clone())
    }

    async fn set_club_status(&mut self, id: i32, status: Status) -> AppResult<()> {
        let name = self.club_mut(id)?.name.clone();
        if status.is_active() && self.live_name_clash(&name, id) {
            return Err(AppError::conflict("a club with this name already exists"));
        }
        self.club_mut(id)?.status = status;
        Ok(())
    }

    async fn delete_club(&mut self, id: i32) -> AppResult<()> {
        self.state.clubs.retain(|c| c.id != id);
        self.state.enrollments.retain(|e| e.club_id != id);
        Ok(())
    }

    async fn insert_enrollment(&mut self, enrollment: NewEnrollment) -> AppResult<Enrollment> {
        if enrollment.status.is_active() {
            let filter = EnrollmentFilter::of_user(enrollment.user_token.as_str()).active();
            if self.state.enrollments.iter().any(|e| filter.matches(e)) {
                return Err(AppError::conflict("already enrolled or pending"));
            }
        }
        let enrollment = Enrollment {
            id: self.state.next_id(),
            user_token: enrollment.user_token,
            club_id: enrollment.club_id,
            status: enrollment.status,
            created_at: now(),
        };
        self.state.enrollments.push(enrollment.clone());
        Ok(enrollment)
    }

    async fn enrollment(&mut self, id: i32) -> AppResult<Option<Enrollment>> {
        Ok(self.state.enrollments.iter().find(|e| e.id == id).cloned())
    }

    async fn enrollments(&mut self, filter: EnrollmentFilter) -> AppResult<Vec<Enrollment>> {
        Ok(self
            .state
            .enrollments
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect())
    }

    async fn count_enrollments(&mut self, filter: EnrollmentFilter) -> AppResult<i64> {
        Ok(self
            .state
            .enrollments
            .iter()
            .filter(|e| filter.matches(e))
            .count() as i64)
    }

    async fn update_enrollment(&mut self, enrollment: &Enrollment) -> AppResult<()> {
        let row = self
            .state
            .enrollments
            .iter_mut()
            .find(|e| e.id == enrollment.id)
            .ok_or_else(|| AppError::not_found("the enrollment does not exist"))?;
        row.club_id = enrollment.club_id;
        row.status = enrollment.status;
        Ok(())
    }

    async fn delete_enrollments(&mut self, filter: EnrollmentFilter) -> AppResult<usize> {
        let before = self.state.enrollments.len();
        self.state.enrollments.retain(|e| !filter.matches(e));
        Ok(before - self.state.enrollments.len())
    }

    async fn insert_activity(&mut self, activity: NewActivity) -> AppResult<Activity> {
        let activity = Activity {
            id: self.state.next_id(),
            name: activity.name,
            capacity: activity.capacity,
            held_at: activity.held_at,
            location: activity.location,
            description: activity.description,
            flow: activity.flow,
            requirements: activity.requirements,
            attachment: activity.attachment,
            organizer: activity.organizer,
            status: activity.status,
            phase: activity.phase,
            phase_preparation: activity.phase_preparation,
            phase_start: activity.phase_start,
            phase_in_progress: activity.phase_in_progress,
            phase_end: activity.phase_end,
            has_fee: activity.has_fee,
            fee_amount: activity.fee_amount,
            payment_qr_code: activity.payment_qr_code,
            created_at: now(),
        };
        self.state.activities.push(activity.clone());
        Ok(activity)
    }

    async fn activity(&mut self, id: i32) -> AppResult<Option<Activity>> {
        Ok(self.state.activities.iter().find(|a| a.id == id).cloned())
    }

    async fn lock_activity(&mut self, id: i32) -> AppResult<Option<Activity>> {
        #[cfg(test)]
        self.locks.push(format!("activity:{id}"));
        self.activity(id).await
    }

    async fn activities(&mut self, filter: ActivityFilter) -> AppResult<Vec<Activity>> {
        Ok(self
            .state
            .activities
            .iter()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect())
    }

    async fn set_activity_status(&mut self, id: i32, status: Status) -> AppResult<()> {
        self.activity_mut(id)?.status = status;
        Ok(())
    }

    async fn set_activity_phase(&mut self, id: i32, phase: Phase) -> AppResult<Activity> {
        let activity = self.activity_mut(id)?;
        activity.phase = phase;
        Ok(activity.clone())
    }

    async fn delete_activity(&mut self, id: i32) -> AppResult<()> {
        self.state.activities.retain(|a| a.id != id);
        self.state.registrations.retain(|r| r.activity_id != id);
        Ok(())
    }

    async fn insert_registration(
        &mut self,
        registration: NewRegistration,
    ) -> AppResult<Registration> {
        let registration = Registration {
            id: self.state.next_id(),
            activity_id: registration.activity_id,
            user_token: registration.user_token,
            name: registration.name,
            class: registration.class,
            contact: registration.contact,
            reason: registration.reason,
            status: registration.status,
            payment_status: registration.payment_status,
            payment_proof: registration.payment_proof,
            created_at: now(),
        };
        self.state.registrations.push(registration.clone());
        Ok(registration)
    }

    async fn registration(&mut self, id: i32) -> AppResult<Option<Registration>> {
        Ok(self.state.registrations.iter().find(|r| r.id == id).cloned())
    }

    async fn registrations(
        &mut self,
        filter: RegistrationFilter,
    ) -> AppResult<Vec<Registration>> {
        Ok(self
            .state
            .registrations
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn count_registrations(&mut self, filter: RegistrationFilter) -> AppResult<i64> {
        Ok(self
            .state
            .registrations
            .iter()
            .filter(|r| filter.matches(r))
            .count() as i64)
    }

    async fn update_registration(&mut self, registration: &Registration) -> AppResult<()> {
        let row = self
            .state
            .registrations
            .iter_mut()
            .find(|r| r.id == registration.id)
            .ok_or_else(|| AppError::not_found("the registration does not exist"))?;
        row.status = registration.status;
        row.payment_status = registration.payment_status;
        Ok(())
    }

    async fn delete_registrations(&mut self, filter: RegistrationFilter) -> AppResult<usize> {
        let before = self.state.registrations.len();
        self.state.registrations.retain(|r| !filter.matches(r));
        Ok(before - self.state.registrations.len())
    }

    async fn insert_notification(
        &mut self,
        notification: NewNotification,
    ) -> AppResult<Notification> {
        let notification = Notification {
            id: self.state.next_id(),
            user_token: notification.user_token,
            kind: notification.kind,
            related_id: notification.related_id,
            is_read: false,
            created_at: now(),
        };
        self.state.notifications.push(notification.clone());
        Ok(notification)
    }

    async fn count_unread(&mut self, token: &str) -> AppResult<i64> {
        Ok(self
            .state
            .notifications
            .iter()
            .filter(|n| n.user_token == token && !n.is_read)
            .count() as i64)
    }

    async fn mark_read(&mut self, token: &str) -> AppResult<usize> {
        let mut marked = 0;
        for n in self
            .state
            .notifications
            .iter_mut()
            .filter(|n| n.user_token == token && !n.is_read)
        {
            n.is_read = true;
            marked += 1;
        }
        Ok(marked)
    }

    async fn insert_feedback(&mut self, feedback: NewFeedback) -> AppResult<Feedback> {
        let feedback = Feedback {
            id: self.state.next_id(),
            author: feedback.author,
            author_name: feedback.author_name,
            author_class: feedback.author_class,
            content: feedback.content,
            media: feedback.media,
            status: FeedbackStatus::Pending,
            reply: None,
            created_at: now(),
        };
        self.state.feedback.push(feedback.clone());
        Ok(feedback)
    }

    async fn feedback(&mut self, id: i32) -> AppResult<Option<Feedback>> {
        Ok(self.state.feedback.iter().find(|f| f.id == id).cloned())
    }

    async fn feedbacks(&mut self, filter: FeedbackFilter) -> AppResult<Vec<Feedback>> {
        Ok(self
            .state
            .feedback
            .iter()
            .filter(|f| filter.matches(f))
            .cloned()
            .collect())
    }

    async fn reply_feedback(&mut self, id: i32, reply: String) -> AppResult<Feedback> {
        let feedback = self
            .state
            .feedback
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| AppError::not_found("the feedback does not exist"))?;
        feedback.reply = Some(reply);
        feedback.status = FeedbackStatus::Resolved;
        Ok(feedback.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::{ApprovalKind, ApprovalTarget};

    fn tx_with(state: State) -> MemoryTx {
        MemoryTx {
            state,
            locks: Vec::new(),
        }
    }

    fn user(token: &str) -> NewUser {
        NewUser {
            token: token.into(),
            name: token.into(),
            class: "NEE4".into(),
            role: Role::Member,
        }
    }

    fn club(founder: &str) -> NewClub {
        NewClub {
            name: "Chess".into(),
            intro: None,
            content: None,
            location: None,
            meet_time: None,
            duration: None,
            weeks: None,
            capacity: None,
            attachment: None,
            founder: founder.into(),
            status: Status::Pending,
        }
    }

    #[tokio::test]
    async fn live_club_names_stay_unique() {
        let mut tx = tx_with(State::default());
        let rejected = tx.insert_club(club("F0UNDER1")).await.unwrap();
        tx.set_club_status(rejected.id, Status::Rejected).await.unwrap();
        let live = tx.insert_club(club("F0UNDER2")).await.unwrap();

        assert!(matches!(
            tx.set_club_status(rejected.id, Status::Approved).await,
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            tx.set_club_status(rejected.id, Status::Pending).await,
            Err(AppError::Conflict(_))
        ));
        tx.set_club_status(live.id, Status::Approved).await.unwrap();

        let mut other = club("F0UNDER3");
        other.name = "Go".into();
        let go = tx.insert_club(other).await.unwrap();
        let rename = ClubEdit {
            name: Some("Chess".into()),
            ..ClubEdit::default()
        };
        assert!(matches!(
            tx.update_club(go.id, rename.clone()).await,
            Err(AppError::Conflict(_))
        ));
        // a rejected club may carry any name
        assert_eq!(tx.update_club(rejected.id, rename).await.unwrap().name, "Chess");
    }

    #[tokio::test]
    async fn decisions_lock_users_before_clubs() {
        let mut tx = tx_with(State::default());
        tx.insert_user(user("F0UNDER1")).await.unwrap();
        tx.insert_user(user("MEMBER01")).await.unwrap();
        let chess = tx.insert_club(club("F0UNDER1")).await.unwrap();
        tx.set_club_status(chess.id, Status::Approved).await.unwrap();
        let join = tx
            .insert_enrollment(new_enrollment("MEMBER01", chess.id))
            .await
            .unwrap();

        ApprovalTarget::load(&mut tx, ApprovalKind::Club, chess.id)
            .await
            .unwrap();
        assert_eq!(tx.locks, vec!["user:F0UNDER1".to_string(), format!("club:{}", chess.id)]);

        tx.locks.clear();
        ApprovalTarget::load(&mut tx, ApprovalKind::ClubJoin, join.id)
            .await
            .unwrap();
        assert_eq!(tx.locks, vec!["user:MEMBER01".to_string(), format!("club:{}", chess.id)]);
    }

    fn new_enrollment(user: &str, club_id: i32) -> NewEnrollment {
        NewEnrollment {
            user_token: user.into(),
            club_id,
            status: Status::Pending,
        }
    }

    #[tokio::test]
    async fn failed_units_leave_no_trace() {
        let store = MemoryStore::new();
        let result = store
            .atomically(|tx| {
                Box::pin(async move {
                    tx.insert_enrollment(new_enrollment("AAAA1111", 1)).await?;
                    Err::<(), _>(AppError::capacity_exceeded("full"))
                })
            })
            .await;
        assert!(matches!(result, Err(AppError::CapacityExceeded(_))));

        let count = store
            .atomically(|tx| {
                Box::pin(async move { tx.count_enrollments(EnrollmentFilter::default()).await })
            })
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn second_active_enrollment_is_refused() {
        let store = MemoryStore::new();
        let result = store
            .atomically(|tx| {
                Box::pin(async move {
                    tx.insert_enrollment(new_enrollment("AAAA1111", 1)).await?;
                    tx.insert_enrollment(new_enrollment("AAAA1111", 2)).await
                })
            })
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }
}
