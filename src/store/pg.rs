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
    schema::*,
    DbPool,
};
use async_trait::async_trait;
use diesel::{
    pg::Pg,
    prelude::*,
    result::{DatabaseErrorKind, Error as DieselError},
};
use diesel_async::{
    scoped_futures::ScopedFutureExt, AsyncConnection, AsyncPgConnection, RunQueryDsl,
};
use futures::future::BoxFuture;

/// Postgres store. A unit of work is one transaction on a pooled connection.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn atomically<R, F>(&self, work: F) -> AppResult<R>
    where
        R: Send + 'static,
        F: for<'t> FnOnce(&'t mut dyn Tx) -> BoxFuture<'t, AppResult<R>> + Send + 'static,
    {
        let mut pooled = self.pool.get().await?;
        let conn: &mut AsyncPgConnection = &mut pooled;

        conn.transaction(|conn| {
            async move {
                let mut tx = PgTx { conn };
                work(&mut tx).await
            }
            .scope_boxed()
        })
        .await
    }
}

struct PgTx<'c> {
    conn: &'c mut AsyncPgConnection,
}

/// Unique index violations are how Postgres reports a live duplicate.
fn conflict_on_unique(err: DieselError, message: &'static str) -> AppError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            AppError::conflict(message)
        }
        other => other.into(),
    }
}

fn club_query(filter: ClubFilter) -> clubs::BoxedQuery<'static, Pg> {
    let mut query = clubs::table.into_boxed();
    if let Some(status) = filter.status {
        query = query.filter(clubs::status.eq(status));
    }
    if let Some(founder) = filter.founder {
        query = query.filter(clubs::founder.eq(founder));
    }
    query
}

fn activity_query(filter: ActivityFilter) -> activities::BoxedQuery<'static, Pg> {
    let mut query = activities::table.into_boxed();
    if let Some(status) = filter.status {
        query = query.filter(activities::status.eq(status));
    }
    if let Some(organizer) = filter.organizer {
        query = query.filter(activities::organizer.eq(organizer));
    }
    query
}

fn enrollment_query(filter: EnrollmentFilter) -> enrollments::BoxedQuery<'static, Pg> {
    let mut query = enrollments::table.into_boxed();
    if let Some(user) = filter.user {
        query = query.filter(enrollments::user_token.eq(user));
    }
    if let Some(clubs) = filter.clubs {
        query = query.filter(enrollments::club_id.eq_any(clubs));
    }
    if let Some(status) = filter.status {
        query = query.filter(enrollments::status.eq(status));
    }
    if filter.active {
        query = query.filter(enrollments::status.ne(Status::Rejected));
    }
    query
}

fn registration_query(filter: RegistrationFilter) -> registrations::BoxedQuery<'static, Pg> {
    let mut query = registrations::table.into_boxed();
    if let Some(user) = filter.user {
        query = query.filter(registrations::user_token.eq(user));
    }
    if let Some(activities) = filter.activities {
        query = query.filter(registrations::activity_id.eq_any(activities));
    }
    if let Some(status) = filter.status {
        query = query.filter(registrations::status.eq(status));
    }
    query
}

fn feedback_query(filter: FeedbackFilter) -> feedback::BoxedQuery<'static, Pg> {
    let mut query = feedback::table.into_boxed();
    if let Some(author) = filter.author {
        query = query.filter(feedback::author.eq(author));
    }
    if let Some(status) = filter.status {
        query = query.filter(feedback::status.eq(status));
    }
    query
}

#[async_trait]
impl<'c> Tx for PgTx<'c> {
    async fn insert_user(&mut self, user: NewUser) -> AppResult<Option<User>> {
        Ok(diesel::insert_into(users::table)
            .values(user)
            .on_conflict_do_nothing()
            .get_result::<User>(self.conn)
            .await
            .optional()?)
    }

    async fn user(&mut self, token: &str) -> AppResult<Option<User>> {
        Ok(users::table
            .filter(users::token.eq(token))
            .first::<User>(self.conn)
            .await
            .optional()?)
    }

    async fn lock_user(&mut self, token: &str) -> AppResult<Option<User>> {
        Ok(users::table
            .filter(users::token.eq(token))
            .for_update()
            .first::<User>(self.conn)
            .await
            .optional()?)
    }

    async fn users(&mut self, tokens: Vec<String>) -> AppResult<Vec<User>> {
        Ok(users::table
            .filter(users::token.eq_any(tokens))
            .order(users::id.asc())
            .load::<User>(self.conn)
            .await?)
    }

    async fn search_users(&mut self, query: &str) -> AppResult<Vec<User>> {
        let pattern = format!("%{}%", query.replace('%', "\\%").replace('_', "\\_"));
        Ok(users::table
            .filter(
                users::name
                    .ilike(pattern.clone())
                    .or(users::token.ilike(pattern)),
            )
            .order(users::id.asc())
            .load::<User>(self.conn)
            .await?)
    }

    async fn set_role(&mut self, token: &str, role: Role) -> AppResult<Option<User>> {
        Ok(diesel::update(users::table.filter(users::token.eq(token)))
            .set(users::role.eq(role))
            .get_result::<User>(self.conn)
            .await
            .optional()?)
    }

    async fn insert_club(&mut self, club: NewClub) -> AppResult<Club> {
        diesel::insert_into(clubs::table)
            .values(club)
            .get_result::<Club>(self.conn)
            .await
            .map_err(|e| conflict_on_unique(e, "a club with this name already exists"))
    }

    async fn club(&mut self, id: i32) -> AppResult<Option<Club>> {
        Ok(clubs::table
            .find(id)
            .first::<Club>(self.conn)
            .await
            .optional()?)
    }

    async fn lock_club(&mut self, id: i32) -> AppResult<Option<Club>> {
        Ok(clubs::table
            .find(id)
            .for_update()
            .first::<Club>(self.conn)
            .await
            .optional()?)
    }

    async fn clubs(&mut self, filter: ClubFilter) -> AppResult<Vec<Club>> {
        Ok(club_query(filter)
            .order(clubs::id.asc())
            .load::<Club>(self.conn)
            .await?)
    }

    async fn club_name_taken(&mut self, name: &str) -> AppResult<bool> {
        let live = clubs::table
            .filter(clubs::name.eq(name))
            .filter(clubs::status.ne(Status::Rejected))
            .count()
            .get_result::<i64>(self.conn)
            .await?;
        Ok(live > 0)
    }

    async fn update_club(&mut self, id: i32, edit: ClubEdit) -> AppResult<Club> {
        diesel::update(clubs::table.find(id))
            .set(edit)
            .get_result::<Club>(self.conn)
            .await
            .map_err(|e| conflict_on_unique(e, "a club with this name already exists"))
    }

    async fn set_club_status(&mut self, id: i32, status: Status) -> AppResult<()> {
        diesel::update(clubs::table.find(id))
            .set(clubs::status.eq(status))
            .execute(self.conn)
            .await
            .map_err(|e| conflict_on_unique(e, "a club with this name already exists"))?;
        Ok(())
    }

    async fn delete_club(&mut self, id: i32) -> AppResult<()> {
        diesel::delete(enrollments::table.filter(enrollments::club_id.eq(id)))
            .execute(self.conn)
            .await?;
        diesel::delete(clubs::table.find(id))
            .execute(self.conn)
            .await?;
        Ok(())
    }

    async fn insert_enrollment(&mut self, enrollment: NewEnrollment) -> AppResult<Enrollment> {
        diesel::insert_into(enrollments::table)
            .values(enrollment)
            .get_result::<Enrollment>(self.conn)
            .await
            .map_err(|e| conflict_on_unique(e, "already enrolled or pending"))
    }

    async fn enrollment(&mut self, id: i32) -> AppResult<Option<Enrollment>> {
        Ok(enrollments::table
            .find(id)
            .first::<Enrollment>(self.conn)
            .await
            .optional()?)
    }

    async fn enrollments(&mut self, filter: EnrollmentFilter) -> AppResult<Vec<Enrollment>> {
        Ok(enrollment_query(filter)
            .order((enrollments::created_at.asc(), enrollments::id.asc()))
            .load::<Enrollment>(self.conn)
            .await?)
    }

    async fn count_enrollments(&mut self, filter: EnrollmentFilter) -> AppResult<i64> {
        Ok(enrollment_query(filter)
            .count()
            .get_result::<i64>(self.conn)
            .await?)
    }

    async fn update_enrollment(&mut self, enrollment: &Enrollment) -> AppResult<()> {
        diesel::update(enrollments::table.find(enrollment.id))
            .set((
                enrollments::club_id.eq(enrollment.club_id),
                enrollments::status.eq(enrollment.status),
            ))
            .execute(self.conn)
            .await
            .map_err(|e| conflict_on_unique(e, "already enrolled or pending"))?;
        Ok(())
    }

    async fn delete_enrollments(&mut self, filter: EnrollmentFilter) -> AppResult<usize> {
        let ids = enrollment_query(filter)
            .select(enrollments::id)
            .load::<i32>(self.conn)
            .await?;
        Ok(
            diesel::delete(enrollments::table.filter(enrollments::id.eq_any(ids)))
                .execute(self.conn)
                .await?,
        )
    }

    async fn insert_activity(&mut self, activity: NewActivity) -> AppResult<Activity> {
        Ok(diesel::insert_into(activities::table)
            .values(activity)
            .get_result::<Activity>(self.conn)
            .await?)
    }

    async fn activity(&mut self, id: i32) -> AppResult<Option<Activity>> {
        Ok(activities::table
            .find(id)
            .first::<Activity>(self.conn)
            .await
            .optional()?)
    }

    async fn lock_activity(&mut self, id: i32) -> AppResult<Option<Activity>> {
        Ok(activities::table
            .find(id)
            .for_update()
            .first::<Activity>(self.conn)
            .await
            .optional()?)
    }

    async fn activities(&mut self, filter: ActivityFilter) -> AppResult<Vec<Activity>> {
        Ok(activity_query(filter)
            .order(activities::id.asc())
            .load::<Activity>(self.conn)
            .await?)
    }

    async fn set_activity_status(&mut self, id: i32, status: Status) -> AppResult<()> {
        diesel::update(activities::table.find(id))
            .set(activities::status.eq(status))
            .execute(self.conn)
            .await?;
        Ok(())
    }

    async fn set_activity_phase(&mut self, id: i32, phase: Phase) -> AppResult<Activity> {
        Ok(diesel::update(activities::table.find(id))
            .set(activities::phase.eq(phase))
            .get_result::<Activity>(self.conn)
            .await?)
    }

    async fn delete_activity(&mut self, id: i32) -> AppResult<()> {
        diesel::delete(registrations::table.filter(registrations::activity_id.eq(id)))
            .execute(self.conn)
            .await?;
        diesel::delete(activities::table.find(id))
            .execute(self.conn)
            .await?;
        Ok(())
    }

    async fn insert_registration(
        &mut self,
        registration: NewRegistration,
    ) -> AppResult<Registration> {
        Ok(diesel::insert_into(registrations::table)
            .values(registration)
            .get_result::<Registration>(self.conn)
            .await?)
    }

    async fn registration(&mut self, id: i32) -> AppResult<Option<Registration>> {
        Ok(registrations::table
            .find(id)
            .first::<Registration>(self.conn)
            .await
            .optional()?)
    }

    async fn registrations(
        &mut self,
        filter: RegistrationFilter,
    ) -> AppResult<Vec<Registration>> {
        Ok(registration_query(filter)
            .order((registrations::created_at.asc(), registrations::id.asc()))
            .load::<Registration>(self.conn)
            .await?)
    }

    async fn count_registrations(&mut self, filter: RegistrationFilter) -> AppResult<i64> {
        Ok(registration_query(filter)
            .count()
            .get_result::<i64>(self.conn)
            .await?)
    }

    async fn update_registration(&mut self, registration: &Registration) -> AppResult<()> {
        diesel::update(registrations::table.find(registration.id))
            .set((
                registrations::status.eq(registration.status),
                registrations::payment_status.eq(registration.payment_status),
            ))
            .execute(self.conn)
            .await?;
        Ok(())
    }

    async fn delete_registrations(&mut self, filter: RegistrationFilter) -> AppResult<usize> {
        let ids = registration_query(filter)
            .select(registrations::id)
            .load::<i32>(self.conn)
            .await?;
        Ok(
            diesel::delete(registrations::table.filter(registrations::id.eq_any(ids)))
                .execute(self.conn)
                .await?,
        )
    }

    async fn insert_notification(
        &mut self,
        notification: NewNotification,
    ) -> AppResult<Notification> {
        Ok(diesel::insert_into(notifications::table)
            .values(notification)
            .get_result::<Notification>(self.conn)
            .await?)
    }

    async fn count_unread(&mut self, token: &str) -> AppResult<i64> {
        Ok(notifications::table
            .filter(notifications::user_token.eq(token))
            .filter(notifications::is_read.eq(false))
            .count()
            .get_result::<i64>(self.conn)
            .await?)
    }

    async fn mark_read(&mut self, token: &str) -> AppResult<usize> {
        Ok(diesel::update(
            notifications::table
                .filter(notifications::user_token.eq(token))
                .filter(notifications::is_read.eq(false)),
        )
        .set(notifications::is_read.eq(true))
        .execute(self.conn)
        .await?)
    }

    async fn insert_feedback(&mut self, new: NewFeedback) -> AppResult<Feedback> {
        Ok(diesel::insert_into(feedback::table)
            .values(new)
            .get_result::<Feedback>(self.conn)
            .await?)
    }

    async fn feedback(&mut self, id: i32) -> AppResult<Option<Feedback>> {
        Ok(feedback::table
            .find(id)
            .first::<Feedback>(self.conn)
            .await
            .optional()?)
    }

    async fn feedbacks(&mut self, filter: FeedbackFilter) -> AppResult<Vec<Feedback>> {
        Ok(feedback_query(filter)
            .order((feedback::created_at.asc(), feedback::id.asc()))
            .load::<Feedback>(self.conn)
            .await?)
    }

    async fn reply_feedback(&mut self, id: i32, reply: String) -> AppResult<Feedback> {
        Ok(diesel::update(feedback::table.find(id))
            .set((
                feedback::reply.eq(Some(reply)),
                feedback::status.eq(FeedbackStatus::Resolved),
            ))
            .get_result::<Feedback>(self.conn)
            .await?)
    }
}
