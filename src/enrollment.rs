//! Club lifecycle and the capacity-gated enrollment ledger.

use crate::{
    engine::{capacity, ensure_capacity, required, users_by_token, Hub},
    error::{AppError, AppResult},
    models::{Club, ClubEdit, Enrollment, NewClub, NewEnrollment, NotificationKind, Status, User},
    notify::HubEvent,
    store::{ClubFilter, EnrollmentFilter, Store, Tx},
};
use chrono::NaiveDateTime;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const CLUB_FULL: &str = "the club is full";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClubSubmission {
    pub name: String,
    pub intro: Option<String>,
    pub content: Option<String>,
    pub location: Option<String>,
    pub meet_time: Option<String>,
    pub duration: Option<String>,
    pub weeks: Option<i32>,
    pub capacity: Option<i32>,
    pub attachment: Option<String>,
}

/// An approved club with its live member count and founder details.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClubView {
    #[serde(flatten)]
    pub club: Club,
    pub member_count: i64,
    pub founder_name: Option<String>,
    pub founder_class: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub index: usize,
    #[serde(rename = "userId", skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub name: String,
    pub class: String,
    pub joined_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClubRoster {
    pub club: Club,
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DirectoryEntry {
    #[serde(flatten)]
    pub club: ClubView,
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MyEnrollment {
    pub enrollment: Enrollment,
    pub club: Club,
}

/// Numbers approved enrollments 1..N in join order.
fn members(
    enrollments: Vec<Enrollment>,
    users: &HashMap<String, User>,
    reveal_tokens: bool,
) -> Vec<Member> {
    enrollments
        .into_iter()
        .enumerate()
        .map(|(i, e)| {
            let user = users.get(&e.user_token);
            Member {
                index: i + 1,
                name: user.map(|u| u.name.clone()).unwrap_or_default(),
                class: user.map(|u| u.class.clone()).unwrap_or_default(),
                token: reveal_tokens.then_some(e.user_token),
                joined_at: e.created_at,
            }
        })
        .collect()
}

fn view(club: Club, member_count: i64, users: &HashMap<String, User>) -> ClubView {
    let founder = users.get(&club.founder);
    ClubView {
        founder_name: founder.map(|u| u.name.clone()),
        founder_class: founder.map(|u| u.class.clone()),
        member_count,
        club,
    }
}

/// The club a user may join: it exists and has been approved.
async fn open_club(tx: &mut dyn Tx, club_id: i32) -> AppResult<Club> {
    tx.lock_club(club_id)
        .await?
        .filter(|c| c.status == Status::Approved)
        .ok_or_else(|| AppError::not_found("the club does not exist"))
}

async fn approved_members(tx: &mut dyn Tx, club_id: i32) -> AppResult<i64> {
    tx.count_enrollments(EnrollmentFilter::in_club(club_id).with_status(Status::Approved))
        .await
}

impl<S: Store> Hub<S> {
    /// Files a new club for review. The name is re-checked here even if the
    /// caller already asked [`Hub::check_name_availability`].
    pub async fn create_club(&self, caller: &User, submission: ClubSubmission) -> AppResult<Club> {
        let club = NewClub {
            name: required("name", &submission.name)?,
            intro: submission.intro,
            content: submission.content,
            location: submission.location,
            meet_time: submission.meet_time,
            duration: submission.duration,
            weeks: submission.weeks,
            capacity: capacity(submission.capacity)?,
            attachment: submission.attachment,
            founder: caller.token.clone(),
            status: Status::Pending,
        };

        let club = self
            .store
            .atomically(move |tx| {
                Box::pin(async move {
                    if tx.club_name_taken(&club.name).await? {
                        return Err(AppError::conflict("a club with this name already exists"));
                    }
                    tx.insert_club(club).await
                })
            })
            .await?;

        tracing::info!(club_id = club.id, founder = %club.founder, "club submitted");
        self.publish(HubEvent::for_reviewers("new_audit"));
        Ok(club)
    }

    /// Advisory: whether no pending or approved club uses `name`.
    pub async fn check_name_availability(&self, name: &str) -> AppResult<bool> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Ok(false);
        }
        let taken = self
            .store
            .atomically(move |tx| Box::pin(async move { tx.club_name_taken(&name).await }))
            .await?;
        Ok(!taken)
    }

    pub async fn submit_enrollment(&self, caller: &User, club_id: i32) -> AppResult<Enrollment> {
        let token = caller.token.clone();
        let (enrollment, founder) = self
            .store
            .atomically(move |tx| {
                Box::pin(async move {
                    tx.lock_user(&token).await?;
                    let active = tx
                        .count_enrollments(EnrollmentFilter::of_user(token.as_str()).active())
                        .await?;
                    if active > 0 {
                        return Err(AppError::conflict("already enrolled or pending"));
                    }

                    let club = open_club(tx, club_id).await?;
                    ensure_capacity(club.capacity, approved_members(tx, club_id).await?, CLUB_FULL)?;

                    let enrollment = tx
                        .insert_enrollment(NewEnrollment {
                            user_token: token,
                            club_id,
                            status: Status::Pending,
                        })
                        .await?;
                    Ok::<_, AppError>((enrollment, club.founder))
                })
            })
            .await?;

        tracing::info!(user = %caller.token, club_id, "join requested");
        self.notify(&founder, NotificationKind::JoinRequest, club_id).await;
        Ok(enrollment)
    }

    /// Moves the caller's enrollment to another club and puts it back to
    /// pending. The old club's slot is released at once.
    pub async fn rotate(&self, caller: &User, club_id: i32) -> AppResult<Enrollment> {
        if !self.rotation_open() {
            return Err(AppError::forbidden("not in rotation window"));
        }

        let token = caller.token.clone();
        let (enrollment, founder) = self
            .store
            .atomically(move |tx| {
                Box::pin(async move {
                    tx.lock_user(&token).await?;
                    let mut current = tx.enrollments(EnrollmentFilter::of_user(token.as_str())).await?;
                    let pick = current
                        .iter()
                        .rposition(|e| e.status.is_active())
                        .or_else(|| current.len().checked_sub(1))
                        .ok_or_else(|| AppError::bad_request("you are not enrolled in any club"))?;
                    let mut enrollment = current.swap_remove(pick);

                    let club = open_club(tx, club_id).await?;
                    if enrollment.club_id == club_id && enrollment.status.is_active() {
                        return Err(AppError::bad_request("you are already in this club"));
                    }
                    ensure_capacity(club.capacity, approved_members(tx, club_id).await?, CLUB_FULL)?;

                    enrollment.club_id = club_id;
                    enrollment.status = Status::Pending;
                    tx.update_enrollment(&enrollment).await?;
                    Ok::<_, AppError>((enrollment, club.founder))
                })
            })
            .await?;

        tracing::info!(user = %caller.token, club_id, "rotation requested");
        self.notify(&founder, NotificationKind::JoinRequest, club_id).await;
        Ok(enrollment)
    }

    /// Drops every enrollment of the caller. Leaving twice is fine.
    pub async fn leave(&self, caller: &User) -> AppResult<usize> {
        let token = caller.token.clone();
        let removed = self
            .store
            .atomically(move |tx| {
                Box::pin(async move { tx.delete_enrollments(EnrollmentFilter::of_user(token)).await })
            })
            .await?;
        tracing::info!(user = %caller.token, removed, "left club");
        Ok(removed)
    }

    /// Only the founder may dissolve a club. Authorities are not exempt.
    pub async fn dissolve(&self, caller: &User, club_id: i32) -> AppResult<()> {
        let token = caller.token.clone();
        self.store
            .atomically(move |tx| {
                Box::pin(async move {
                    let club = tx
                        .lock_club(club_id)
                        .await?
                        .ok_or_else(|| AppError::not_found("the club does not exist"))?;
                    if club.founder != token {
                        return Err(AppError::forbidden("only the founder can dissolve the club"));
                    }
                    tx.delete_club(club_id).await
                })
            })
            .await?;

        tracing::info!(user = %caller.token, club_id, "club dissolved");
        self.publish(HubEvent::ClubDeleted { club_id });
        Ok(())
    }

    pub async fn edit_club(&self, caller: &User, club_id: i32, mut edit: ClubEdit) -> AppResult<Club> {
        if edit.is_empty() {
            return Err(AppError::bad_request("nothing to change"));
        }
        if let Some(name) = edit.name.as_deref() {
            edit.name = Some(required("name", name)?);
        }
        edit.capacity = capacity(edit.capacity)?;

        let token = caller.token.clone();
        let club = self
            .store
            .atomically(move |tx| {
                Box::pin(async move {
                    let club = tx
                        .lock_club(club_id)
                        .await?
                        .ok_or_else(|| AppError::not_found("the club does not exist"))?;
                    if club.founder != token {
                        return Err(AppError::forbidden("only the founder can edit the club"));
                    }
                    if let Some(name) = edit.name.as_deref() {
                        if name != club.name
                            && club.status.is_active()
                            && tx.club_name_taken(name).await?
                        {
                            return Err(AppError::conflict("a club with this name already exists"));
                        }
                    }
                    if let Some(limit) = edit.capacity {
                        if approved_members(tx, club_id).await? > i64::from(limit) {
                            return Err(AppError::bad_request(
                                "capacity cannot drop below the current member count",
                            ));
                        }
                    }
                    tx.update_club(club_id, edit).await
                })
            })
            .await?;

        tracing::info!(user = %caller.token, club_id, "club edited");
        Ok(club)
    }

    /// The caller's live enrollment, or their latest rejected one.
    pub async fn my_enrollment(&self, caller: &User) -> AppResult<Option<MyEnrollment>> {
        let token = caller.token.clone();
        self.store
            .atomically(move |tx| {
                Box::pin(async move {
                    let mut rows = tx.enrollments(EnrollmentFilter::of_user(token)).await?;
                    let pick = rows
                        .iter()
                        .rposition(|e| e.status.is_active())
                        .or_else(|| rows.len().checked_sub(1));
                    let enrollment = match pick {
                        Some(i) => rows.swap_remove(i),
                        None => return Ok(None),
                    };
                    let club = tx.club(enrollment.club_id).await?;
                    Ok::<_, AppError>(club.map(|club| MyEnrollment { enrollment, club }))
                })
            })
            .await
    }

    pub async fn approved_clubs(&self) -> AppResult<Vec<ClubView>> {
        Ok(self
            .club_directory()
            .await?
            .into_iter()
            .map(|entry| entry.club)
            .collect())
    }

    /// Approved clubs, each with its approved members in join order.
    pub async fn club_directory(&self) -> AppResult<Vec<DirectoryEntry>> {
        self.store
            .atomically(move |tx| {
                Box::pin(async move {
                    let clubs = tx.clubs(ClubFilter::with_status(Status::Approved)).await?;
                    let enrollments = tx
                        .enrollments(
                            EnrollmentFilter::in_clubs(clubs.iter().map(|c| c.id).collect())
                                .with_status(Status::Approved),
                        )
                        .await?;
                    let tokens = clubs
                        .iter()
                        .map(|c| c.founder.clone())
                        .chain(enrollments.iter().map(|e| e.user_token.clone()))
                        .collect::<Vec<_>>();
                    let users = users_by_token(tx, tokens).await?;

                    let mut by_club = enrollments
                        .into_iter()
                        .map(|e| (e.club_id, e))
                        .into_group_map();
                    Ok::<_, AppError>(
                        clubs
                            .into_iter()
                            .map(|club| {
                                let rows = by_club.remove(&club.id).unwrap_or_default();
                                let count = rows.len() as i64;
                                DirectoryEntry {
                                    members: members(rows, &users, false),
                                    club: view(club, count, &users),
                                }
                            })
                            .collect(),
                    )
                })
            })
            .await
    }

    /// Approved members of one club. Founder or authority only.
    pub async fn club_members(&self, caller: &User, club_id: i32) -> AppResult<ClubRoster> {
        let caller = caller.clone();
        self.store
            .atomically(move |tx| {
                Box::pin(async move {
                    let club = tx
                        .club(club_id)
                        .await?
                        .ok_or_else(|| AppError::not_found("the club does not exist"))?;
                    if club.founder != caller.token && !caller.role.is_authority() {
                        return Err(AppError::forbidden(
                            "only the founder or an authority can see the members",
                        ));
                    }
                    let rows = tx
                        .enrollments(EnrollmentFilter::in_club(club_id).with_status(Status::Approved))
                        .await?;
                    let users = users_by_token(tx, rows.iter().map(|e| e.user_token.clone())).await?;
                    Ok::<_, AppError>(ClubRoster {
                        members: members(rows, &users, true),
                        club,
                    })
                })
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn at(secs: i64) -> NaiveDateTime {
        NaiveDateTime::from_timestamp_opt(secs, 0).unwrap()
    }

    fn user(token: &str, name: &str) -> User {
        User {
            id: 0,
            token: token.into(),
            name: name.into(),
            class: "NEE4".into(),
            role: Role::Member,
            created_at: at(0),
        }
    }

    #[test]
    fn members_are_numbered_from_one_in_join_order() {
        let rows = vec![
            Enrollment {
                id: 9,
                user_token: "BBBB2222".into(),
                club_id: 1,
                status: Status::Approved,
                created_at: at(10),
            },
            Enrollment {
                id: 4,
                user_token: "AAAA1111".into(),
                club_id: 1,
                status: Status::Approved,
                created_at: at(20),
            },
        ];
        let users = [user("AAAA1111", "Ann"), user("BBBB2222", "Bo")]
            .into_iter()
            .map(|u| (u.token.clone(), u))
            .collect();

        let listed = members(rows, &users, false);
        assert_eq!(listed[0].index, 1);
        assert_eq!(listed[0].name, "Bo");
        assert_eq!(listed[1].index, 2);
        assert!(listed[1].token.is_none());
    }
}
