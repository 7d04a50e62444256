//! The approval router: the one place pending records become approved or rejected.

use crate::{
    engine::{ensure_capacity, users_by_token, Hub},
    error::{AppError, AppResult},
    models::{
        Activity, Club, Enrollment, NewEnrollment, NotificationKind, PaymentStatus, Registration,
        Status, User,
    },
    policy::UnpaidApproval,
    store::{ActivityFilter, ClubFilter, EnrollmentFilter, RegistrationFilter, Store, Tx},
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ApprovalKind {
    Club,
    Activity,
    ClubJoin,
    ActivityReg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approved,
    Rejected,
}

impl Decision {
    pub fn status(self) -> Status {
        match self {
            Decision::Approved => Status::Approved,
            Decision::Rejected => Status::Rejected,
        }
    }
}

/// A record that can be decided on, with whatever it needs from its parent.
#[derive(Debug, Clone)]
pub enum ApprovalTarget {
    Club(Club),
    Activity(Activity),
    Enrollment { enrollment: Enrollment, club: Club },
    Registration { registration: Registration, activity: Activity },
}

/// What a decision does to the store, worked out before anything is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideEffects {
    pub status: Status,
    /// New payment status for a registration, if it changes.
    pub payment_status: Option<PaymentStatus>,
    /// The record starts holding a capacity slot.
    pub takes_slot: bool,
    /// A rejected enrollment comes back to life.
    pub revives: bool,
    pub enroll_founder: bool,
    /// Receives the `status_update` notification.
    pub notify: String,
}

impl ApprovalTarget {
    /// Resolves `id` for `kind`, locking the rows the decision depends on.
    /// Users are locked before clubs, matching join and rotation, and the
    /// activity before its registration.
    pub async fn load(tx: &mut dyn Tx, kind: ApprovalKind, id: i32) -> AppResult<Self> {
        let target = match kind {
            ApprovalKind::Club => match tx.club(id).await? {
                Some(seen) => {
                    tx.lock_user(&seen.founder).await?;
                    tx.lock_club(id).await?.map(ApprovalTarget::Club)
                }
                None => None,
            },
            ApprovalKind::Activity => tx.lock_activity(id).await?.map(ApprovalTarget::Activity),
            ApprovalKind::ClubJoin => match tx.enrollment(id).await? {
                Some(seen) => {
                    tx.lock_user(&seen.user_token).await?;
                    match tx.enrollment(id).await? {
                        Some(enrollment) => tx
                            .lock_club(enrollment.club_id)
                            .await?
                            .map(|club| ApprovalTarget::Enrollment { enrollment, club }),
                        None => None,
                    }
                }
                None => None,
            },
            ApprovalKind::ActivityReg => match tx.registration(id).await? {
                Some(seen) => match tx.lock_activity(seen.activity_id).await? {
                    Some(activity) => tx
                        .registration(id)
                        .await?
                        .map(|registration| ApprovalTarget::Registration {
                            registration,
                            activity,
                        }),
                    None => None,
                },
                None => None,
            },
        };
        target.ok_or_else(|| AppError::not_found(format!("no {} with id {id}", kind.noun())))
    }

    pub fn kind(&self) -> ApprovalKind {
        match self {
            ApprovalTarget::Club(_) => ApprovalKind::Club,
            ApprovalTarget::Activity(_) => ApprovalKind::Activity,
            ApprovalTarget::Enrollment { .. } => ApprovalKind::ClubJoin,
            ApprovalTarget::Registration { .. } => ApprovalKind::ActivityReg,
        }
    }

    pub fn id(&self) -> i32 {
        match self {
            ApprovalTarget::Club(c) => c.id,
            ApprovalTarget::Activity(a) => a.id,
            ApprovalTarget::Enrollment { enrollment, .. } => enrollment.id,
            ApprovalTarget::Registration { registration, .. } => registration.id,
        }
    }

    pub fn status(&self) -> Status {
        match self {
            ApprovalTarget::Club(c) => c.status,
            ApprovalTarget::Activity(a) => a.status,
            ApprovalTarget::Enrollment { enrollment, .. } => enrollment.status,
            ApprovalTarget::Registration { registration, .. } => registration.status,
        }
    }

    /// The user the outcome is about.
    pub fn subject(&self) -> &str {
        match self {
            ApprovalTarget::Club(c) => &c.founder,
            ApprovalTarget::Activity(a) => &a.organizer,
            ApprovalTarget::Enrollment { enrollment, .. } => &enrollment.user_token,
            ApprovalTarget::Registration { registration, .. } => &registration.user_token,
        }
    }

    /// Creations are for authorities. Joins and registrations may also be
    /// decided by the club founder or the activity organizer.
    pub fn authorize(&self, caller: &User) -> AppResult<()> {
        let owner = match self {
            ApprovalTarget::Club(_) | ApprovalTarget::Activity(_) => None,
            ApprovalTarget::Enrollment { club, .. } => Some(&club.founder),
            ApprovalTarget::Registration { activity, .. } => Some(&activity.organizer),
        };
        if caller.role.is_authority() || owner == Some(&caller.token) {
            Ok(())
        } else {
            Err(AppError::forbidden("you cannot decide on this request"))
        }
    }

    pub fn apply(&self, decision: Decision, unpaid: UnpaidApproval) -> AppResult<SideEffects> {
        let approving = decision == Decision::Approved;
        let mut effects = SideEffects {
            status: decision.status(),
            payment_status: None,
            takes_slot: approving && self.status() != Status::Approved,
            revives: decision.status().is_active() && !self.status().is_active(),
            enroll_founder: false,
            notify: self.subject().to_string(),
        };

        match self {
            ApprovalTarget::Club(_) => {
                effects.takes_slot = false;
                effects.revives = false;
                effects.enroll_founder = approving;
            }
            ApprovalTarget::Activity(_) => {
                effects.takes_slot = false;
                effects.revives = false;
            }
            ApprovalTarget::Enrollment { .. } => {}
            ApprovalTarget::Registration {
                registration,
                activity,
            } => {
                effects.revives = false;
                if approving && activity.has_fee {
                    if registration.payment_proof.is_some() {
                        effects.payment_status = Some(PaymentStatus::Paid);
                    } else if unpaid == UnpaidApproval::Refuse {
                        return Err(AppError::payment_required(
                            "the registration has no payment proof",
                        ));
                    }
                }
            }
        }
        Ok(effects)
    }

    /// Writes `effects` inside the caller's unit of work.
    pub async fn persist(self, tx: &mut dyn Tx, effects: &SideEffects) -> AppResult<()> {
        match self {
            ApprovalTarget::Club(club) => {
                tx.set_club_status(club.id, effects.status).await?;
                if effects.enroll_founder {
                    enroll_founder(tx, &club).await?;
                }
            }
            ApprovalTarget::Activity(activity) => {
                tx.set_activity_status(activity.id, effects.status).await?;
            }
            ApprovalTarget::Enrollment {
                mut enrollment,
                club,
            } => {
                if effects.revives {
                    let others = tx
                        .count_enrollments(
                            EnrollmentFilter::of_user(enrollment.user_token.as_str()).active(),
                        )
                        .await?;
                    if others > 0 {
                        return Err(AppError::conflict(
                            "the user is already enrolled or pending elsewhere",
                        ));
                    }
                }
                if effects.takes_slot {
                    let approved = tx
                        .count_enrollments(
                            EnrollmentFilter::in_club(club.id).with_status(Status::Approved),
                        )
                        .await?;
                    ensure_capacity(club.capacity, approved, "the club is full")?;
                }
                enrollment.status = effects.status;
                tx.update_enrollment(&enrollment).await?;
            }
            ApprovalTarget::Registration {
                mut registration,
                activity,
            } => {
                if effects.takes_slot {
                    let approved = tx
                        .count_registrations(
                            RegistrationFilter::in_activity(activity.id)
                                .with_status(Status::Approved),
                        )
                        .await?;
                    ensure_capacity(activity.capacity, approved, "the activity is full")?;
                }
                registration.status = effects.status;
                if let Some(payment) = effects.payment_status {
                    registration.payment_status = payment;
                }
                tx.update_registration(&registration).await?;
            }
        }
        Ok(())
    }
}

impl ApprovalKind {
    fn noun(self) -> &'static str {
        match self {
            ApprovalKind::Club => "club",
            ApprovalKind::Activity => "activity",
            ApprovalKind::ClubJoin => "join request",
            ApprovalKind::ActivityReg => "registration",
        }
    }
}

/// The founder always ends up an approved member of their approved club.
/// An enrollment they hold elsewhere is moved over rather than duplicated.
/// The founder's row is already locked by [`ApprovalTarget::load`].
async fn enroll_founder(tx: &mut dyn Tx, club: &Club) -> AppResult<()> {
    let mut held = tx
        .enrollments(EnrollmentFilter::of_user(club.founder.as_str()).active())
        .await?;
    match held.pop() {
        Some(mut enrollment) => {
            enrollment.club_id = club.id;
            enrollment.status = Status::Approved;
            tx.update_enrollment(&enrollment).await
        }
        None => tx
            .insert_enrollment(NewEnrollment {
                user_token: club.founder.clone(),
                club_id: club.id,
                status: Status::Approved,
            })
            .await
            .map(drop),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    pub kind: ApprovalKind,
    pub id: i32,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<PaymentStatus>,
}

/// One line of the status board.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditItem {
    pub kind: ApprovalKind,
    pub id: i32,
    pub title: String,
    pub status: Status,
    #[serde(rename = "userId")]
    pub submitted_by: String,
    pub submitter_name: Option<String>,
    pub submitted_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditStatus {
    /// Pending items the caller may decide on.
    pub awaiting: Vec<AuditItem>,
    /// Everything the caller submitted, whatever its outcome.
    pub submitted: Vec<AuditItem>,
}

impl<S: Store> Hub<S> {
    /// Decides on one pending record. The subject of the record is notified
    /// either way once the decision is committed.
    pub async fn approve(
        &self,
        caller: &User,
        kind: ApprovalKind,
        id: i32,
        decision: Decision,
    ) -> AppResult<Outcome> {
        let who = caller.clone();
        let unpaid = self.policy.unpaid_approval;
        let (outcome, subject) = self
            .store
            .atomically(move |tx| {
                Box::pin(async move {
                    let target = ApprovalTarget::load(tx, kind, id).await?;
                    target.authorize(&who)?;
                    let effects = target.apply(decision, unpaid)?;
                    target.persist(tx, &effects).await?;
                    Ok::<_, AppError>((
                        Outcome {
                            kind,
                            id,
                            status: effects.status,
                            payment_status: effects.payment_status,
                        },
                        effects.notify,
                    ))
                })
            })
            .await?;

        tracing::info!(
            user = %caller.token,
            kind = kind.noun(),
            id,
            status = %outcome.status,
            "decision recorded"
        );
        self.notify(&subject, NotificationKind::StatusUpdate, id).await;
        Ok(outcome)
    }

    /// Items awaiting the caller's decision plus the history of their own submissions.
    pub async fn audit_status(&self, caller: &User) -> AppResult<AuditStatus> {
        let caller = caller.clone();
        self.store
            .atomically(move |tx| {
                Box::pin(async move {
                    let clubs = tx.clubs(ClubFilter::default()).await?;
                    let activities = tx.activities(ActivityFilter::default()).await?;
                    let club_names: HashMap<i32, String> =
                        clubs.iter().map(|c| (c.id, c.name.clone())).collect();
                    let activity_names: HashMap<i32, String> =
                        activities.iter().map(|a| (a.id, a.name.clone())).collect();

                    let owned_clubs = clubs
                        .iter()
                        .filter(|c| c.founder == caller.token)
                        .map(|c| c.id)
                        .collect::<Vec<_>>();
                    let owned_activities = activities
                        .iter()
                        .filter(|a| a.organizer == caller.token)
                        .map(|a| a.id)
                        .collect::<Vec<_>>();
                    let joins = tx
                        .enrollments(
                            EnrollmentFilter::in_clubs(owned_clubs).with_status(Status::Pending),
                        )
                        .await?;
                    let signups = tx
                        .registrations(
                            RegistrationFilter::in_activities(owned_activities)
                                .with_status(Status::Pending),
                        )
                        .await?;
                    let my_joins = tx
                        .enrollments(EnrollmentFilter::of_user(caller.token.as_str()))
                        .await?;
                    let my_signups = tx
                        .registrations(RegistrationFilter::of_user(caller.token.as_str()))
                        .await?;

                    let board = Board {
                        club_names: &club_names,
                        activity_names: &activity_names,
                    };
                    let mut awaiting = Vec::new();
                    if caller.role.is_authority() {
                        awaiting.extend(
                            clubs
                                .iter()
                                .filter(|c| c.status == Status::Pending)
                                .map(|c| board.club(c)),
                        );
                        awaiting.extend(
                            activities
                                .iter()
                                .filter(|a| a.status == Status::Pending)
                                .map(|a| board.activity(a)),
                        );
                    }
                    awaiting.extend(joins.iter().map(|e| board.enrollment(e)));
                    awaiting.extend(signups.iter().map(|r| board.registration(r)));

                    let mut submitted = Vec::new();
                    submitted.extend(
                        clubs
                            .iter()
                            .filter(|c| c.founder == caller.token)
                            .map(|c| board.club(c)),
                    );
                    submitted.extend(
                        activities
                            .iter()
                            .filter(|a| a.organizer == caller.token)
                            .map(|a| board.activity(a)),
                    );
                    submitted.extend(my_joins.iter().map(|e| board.enrollment(e)));
                    submitted.extend(my_signups.iter().map(|r| board.registration(r)));

                    let users = users_by_token(
                        tx,
                        awaiting
                            .iter()
                            .chain(submitted.iter())
                            .map(|item| item.submitted_by.clone())
                            .collect::<Vec<_>>(),
                    )
                    .await?;
                    for item in awaiting.iter_mut().chain(submitted.iter_mut()) {
                        item.submitter_name =
                            users.get(&item.submitted_by).map(|u| u.name.clone());
                    }
                    awaiting.sort_by_key(|item| item.submitted_at);
                    submitted.sort_by_key(|item| item.submitted_at);

                    Ok::<_, AppError>(AuditStatus {
                        awaiting,
                        submitted,
                    })
                })
            })
            .await
    }
}

struct Board<'a> {
    club_names: &'a HashMap<i32, String>,
    activity_names: &'a HashMap<i32, String>,
}

impl Board<'_> {
    fn item(
        kind: ApprovalKind,
        id: i32,
        title: String,
        status: Status,
        by: &str,
        at: NaiveDateTime,
    ) -> AuditItem {
        AuditItem {
            kind,
            id,
            title,
            status,
            submitted_by: by.to_string(),
            submitter_name: None,
            submitted_at: at,
        }
    }

    fn club(&self, c: &Club) -> AuditItem {
        let title = c.name.clone();
        Self::item(ApprovalKind::Club, c.id, title, c.status, &c.founder, c.created_at)
    }

    fn activity(&self, a: &Activity) -> AuditItem {
        let title = a.name.clone();
        Self::item(ApprovalKind::Activity, a.id, title, a.status, &a.organizer, a.created_at)
    }

    fn enrollment(&self, e: &Enrollment) -> AuditItem {
        let title = self.club_names.get(&e.club_id).cloned().unwrap_or_default();
        Self::item(ApprovalKind::ClubJoin, e.id, title, e.status, &e.user_token, e.created_at)
    }

    fn registration(&self, r: &Registration) -> AuditItem {
        let title = self
            .activity_names
            .get(&r.activity_id)
            .cloned()
            .unwrap_or_default();
        Self::item(ApprovalKind::ActivityReg, r.id, title, r.status, &r.user_token, r.created_at)
    }
}
