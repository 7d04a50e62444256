//! Activities, their phase and the registration ledger.

use crate::{
    engine::{capacity, ensure_capacity, required, users_by_token, Hub},
    error::{AppError, AppResult},
    models::{
        Activity, NewActivity, NewRegistration, NotificationKind, PaymentStatus, Phase,
        Registration, Status, User,
    },
    notify::HubEvent,
    store::{ActivityFilter, RegistrationFilter, Store, Tx},
};
use chrono::NaiveDateTime;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

const ACTIVITY_FULL: &str = "the activity is full";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySubmission {
    pub name: String,
    pub capacity: Option<i32>,
    pub held_at: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub flow: Option<String>,
    pub requirements: Option<String>,
    pub attachment: Option<String>,
    pub phase_preparation: Option<String>,
    pub phase_start: Option<String>,
    pub phase_in_progress: Option<String>,
    pub phase_end: Option<String>,
    #[serde(default)]
    pub has_fee: bool,
    pub fee_amount: Option<String>,
    pub payment_qr_code: Option<String>,
}

/// Applicant details copied onto the registration. Missing name and class
/// fall back to the caller's own.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Applicant {
    pub name: Option<String>,
    pub class: Option<String>,
    pub contact: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityView {
    #[serde(flatten)]
    pub activity: Activity,
    pub registrant_count: i64,
    pub approved_count: i64,
    pub organizer_name: Option<String>,
    pub organizer_class: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub index: usize,
    #[serde(rename = "userId")]
    pub token: String,
    pub name: String,
    pub class: String,
    pub contact: Option<String>,
    pub reason: Option<String>,
    pub payment_status: PaymentStatus,
    pub payment_proof: Option<String>,
    pub registered_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityRoster {
    pub activity: Activity,
    pub participants: Vec<Participant>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Approved registrations numbered 1..N in submission order.
pub fn participants(registrations: Vec<Registration>) -> Vec<Participant> {
    registrations
        .into_iter()
        .filter(|r| r.status == Status::Approved)
        .enumerate()
        .map(|(i, r)| Participant {
            index: i + 1,
            token: r.user_token,
            name: r.name,
            class: r.class,
            contact: r.contact,
            reason: r.reason,
            payment_status: r.payment_status,
            payment_proof: r.payment_proof,
            registered_at: r.created_at,
        })
        .collect()
}

/// Loads an activity the caller may manage: its organizer or any authority.
async fn managed_activity(tx: &mut dyn Tx, caller: &User, activity_id: i32) -> AppResult<Activity> {
    let activity = tx
        .lock_activity(activity_id)
        .await?
        .ok_or_else(|| AppError::not_found("the activity does not exist"))?;
    if activity.organizer != caller.token && !caller.role.is_authority() {
        return Err(AppError::forbidden(
            "only the organizer or an authority can manage this activity",
        ));
    }
    Ok(activity)
}

impl<S: Store> Hub<S> {
    pub async fn create_activity(
        &self,
        caller: &User,
        submission: ActivitySubmission,
    ) -> AppResult<Activity> {
        let payment_qr_code = non_blank(submission.payment_qr_code);
        if submission.has_fee && payment_qr_code.is_none() {
            return Err(AppError::bad_request(
                "an activity with a fee needs a payment QR code",
            ));
        }
        let activity = NewActivity {
            name: required("name", &submission.name)?,
            capacity: capacity(submission.capacity)?,
            held_at: submission.held_at,
            location: submission.location,
            description: submission.description,
            flow: submission.flow,
            requirements: submission.requirements,
            attachment: submission.attachment,
            organizer: caller.token.clone(),
            status: Status::Pending,
            phase: Phase::default(),
            phase_preparation: submission.phase_preparation,
            phase_start: submission.phase_start,
            phase_in_progress: submission.phase_in_progress,
            phase_end: submission.phase_end,
            has_fee: submission.has_fee,
            fee_amount: submission.fee_amount.filter(|_| submission.has_fee),
            payment_qr_code: payment_qr_code.filter(|_| submission.has_fee),
        };

        let activity = self
            .store
            .atomically(move |tx| Box::pin(async move { tx.insert_activity(activity).await }))
            .await?;

        tracing::info!(activity_id = activity.id, organizer = %activity.organizer, "activity submitted");
        self.publish(HubEvent::for_reviewers("new_audit"));
        Ok(activity)
    }

    /// Signs the caller up for an approved activity. The same user may sign
    /// up more than once; every pending row competes for the same capacity.
    pub async fn submit_registration(
        &self,
        caller: &User,
        activity_id: i32,
        applicant: Applicant,
        payment_proof: Option<String>,
    ) -> AppResult<Registration> {
        let payment_proof = non_blank(payment_proof);
        let row = NewRegistration {
            activity_id,
            user_token: caller.token.clone(),
            name: non_blank(applicant.name).unwrap_or_else(|| caller.name.clone()),
            class: non_blank(applicant.class).unwrap_or_else(|| caller.class.clone()),
            contact: non_blank(applicant.contact),
            reason: non_blank(applicant.reason),
            status: Status::Pending,
            payment_status: if payment_proof.is_some() {
                PaymentStatus::PendingVerification
            } else {
                PaymentStatus::Unpaid
            },
            payment_proof,
        };

        let (registration, organizer) = self
            .store
            .atomically(move |tx| {
                Box::pin(async move {
                    let activity = tx
                        .lock_activity(activity_id)
                        .await?
                        .filter(|a| a.status == Status::Approved)
                        .ok_or_else(|| AppError::not_found("the activity does not exist"))?;
                    let approved = tx
                        .count_registrations(
                            RegistrationFilter::in_activity(activity_id).with_status(Status::Approved),
                        )
                        .await?;
                    ensure_capacity(activity.capacity, approved, ACTIVITY_FULL)?;

                    let mut row = row;
                    if activity.has_fee {
                        if row.payment_proof.is_none() {
                            return Err(AppError::payment_required(
                                "this activity needs a payment proof",
                            ));
                        }
                    } else {
                        row.payment_status = PaymentStatus::Unpaid;
                    }

                    let registration = tx.insert_registration(row).await?;
                    Ok::<_, AppError>((registration, activity.organizer))
                })
            })
            .await?;

        tracing::info!(
            user = %caller.token,
            activity_id,
            payment = %registration.payment_status,
            "registration submitted"
        );
        self.notify(&organizer, NotificationKind::RegistrationRequest, activity_id)
            .await;
        Ok(registration)
    }

    /// Any phase may follow any other.
    pub async fn set_phase(&self, caller: &User, activity_id: i32, phase: Phase) -> AppResult<Activity> {
        let who = caller.clone();
        let activity = self
            .store
            .atomically(move |tx| {
                Box::pin(async move {
                    managed_activity(tx, &who, activity_id).await?;
                    tx.set_activity_phase(activity_id, phase).await
                })
            })
            .await?;

        tracing::info!(user = %caller.token, activity_id, phase = %phase, "phase changed");
        self.publish(HubEvent::ActivityPhaseUpdated { activity_id, phase });
        Ok(activity)
    }

    pub async fn activity_roster(&self, caller: &User, activity_id: i32) -> AppResult<ActivityRoster> {
        let who = caller.clone();
        self.store
            .atomically(move |tx| {
                Box::pin(async move {
                    let activity = managed_activity(tx, &who, activity_id).await?;
                    let rows = tx
                        .registrations(RegistrationFilter::in_activity(activity_id))
                        .await?;
                    Ok::<_, AppError>(ActivityRoster {
                        participants: participants(rows),
                        activity,
                    })
                })
            })
            .await
    }

    /// Organizers and authorities alike may delete. Registrations go with it.
    pub async fn delete_activity(&self, caller: &User, activity_id: i32) -> AppResult<()> {
        let who = caller.clone();
        self.store
            .atomically(move |tx| {
                Box::pin(async move {
                    managed_activity(tx, &who, activity_id).await?;
                    tx.delete_activity(activity_id).await
                })
            })
            .await?;

        tracing::info!(user = %caller.token, activity_id, "activity deleted");
        self.publish(HubEvent::ActivityDeleted { activity_id });
        Ok(())
    }

    pub async fn approved_activities(&self) -> AppResult<Vec<ActivityView>> {
        self.store
            .atomically(move |tx| {
                Box::pin(async move {
                    let activities = tx
                        .activities(ActivityFilter::with_status(Status::Approved))
                        .await?;
                    let registrations = tx
                        .registrations(RegistrationFilter::in_activities(
                            activities.iter().map(|a| a.id).collect(),
                        ))
                        .await?;
                    let users =
                        users_by_token(tx, activities.iter().map(|a| a.organizer.clone())).await?;

                    let mut by_activity = registrations
                        .into_iter()
                        .filter(|r| r.status.is_active())
                        .map(|r| (r.activity_id, r.status))
                        .into_group_map();
                    Ok::<_, AppError>(
                        activities
                            .into_iter()
                            .map(|activity| {
                                let statuses = by_activity.remove(&activity.id).unwrap_or_default();
                                let organizer = users.get(&activity.organizer);
                                ActivityView {
                                    registrant_count: statuses.len() as i64,
                                    approved_count: statuses
                                        .iter()
                                        .filter(|s| **s == Status::Approved)
                                        .count() as i64,
                                    organizer_name: organizer.map(|u| u.name.clone()),
                                    organizer_class: organizer.map(|u| u.class.clone()),
                                    activity,
                                }
                            })
                            .collect(),
                    )
                })
            })
            .await
    }
}
