//! Notification fan-out: durable unread markers plus a best-effort live push.

use crate::{
    engine::Hub,
    error::{AppError, AppResult},
    models::{FeedbackStatus, NewNotification, NotificationKind, Phase, Status, User},
    store::{
        ActivityFilter, ClubFilter, EnrollmentFilter, FeedbackFilter, RegistrationFilter, Store,
    },
};
use serde::Serialize;
use tokio::sync::broadcast;

/// Events pushed to live listeners. Listeners filter by their own identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HubEvent {
    /// Something changed for `user_id`, or for reviewers when it is absent.
    NotificationUpdate {
        #[serde(rename = "userId", skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<&'static str>,
    },
    ActivityPhaseUpdated {
        #[serde(rename = "activityId")]
        activity_id: i32,
        phase: Phase,
    },
    ActivityDeleted {
        #[serde(rename = "activityId")]
        activity_id: i32,
    },
    ClubDeleted {
        #[serde(rename = "clubId")]
        club_id: i32,
    },
}

impl HubEvent {
    pub fn name(&self) -> &'static str {
        match self {
            HubEvent::NotificationUpdate { .. } => "notification_update",
            HubEvent::ActivityPhaseUpdated { .. } => "activity_phase_updated",
            HubEvent::ActivityDeleted { .. } => "activity_deleted",
            HubEvent::ClubDeleted { .. } => "club_deleted",
        }
    }

    pub fn for_user(user: impl Into<String>) -> Self {
        HubEvent::NotificationUpdate {
            user_id: Some(user.into()),
            reason: None,
        }
    }

    pub fn for_reviewers(reason: &'static str) -> Self {
        HubEvent::NotificationUpdate {
            user_id: None,
            reason: Some(reason),
        }
    }
}

/// Fire-and-forget emitter. Implementations must not block.
pub trait Publisher: Send + Sync {
    fn publish(&self, event: HubEvent);
}

/// In-process broadcast; receivers that fall behind lose the oldest events.
#[derive(Clone)]
pub struct BroadcastPublisher {
    tx: broadcast::Sender<HubEvent>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HubEvent> {
        self.tx.subscribe()
    }
}

impl Publisher for BroadcastPublisher {
    fn publish(&self, event: HubEvent) {
        // no subscribers is not an error
        let _ = self.tx.send(event);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSummary {
    pub unread: i64,
    pub has_pending_work: bool,
}

impl<S: Store> Hub<S> {
    /// Records an unread marker for `user` and pushes a hint. Never fails the caller.
    pub async fn notify(&self, user: &str, kind: NotificationKind, related_id: impl ToString) {
        let row = NewNotification {
            user_token: user.to_string(),
            kind,
            related_id: related_id.to_string(),
        };
        let recorded = self
            .store
            .atomically(move |tx| Box::pin(async move { tx.insert_notification(row).await }))
            .await;
        if let Err(err) = recorded {
            tracing::warn!(user, kind = %kind, error = %err, "failed to record notification");
        }
        self.publisher.publish(HubEvent::for_user(user));
    }

    pub(crate) fn publish(&self, event: HubEvent) {
        tracing::debug!(event = event.name(), "publishing");
        self.publisher.publish(event);
    }

    pub async fn mark_read(&self, caller: &User) -> AppResult<usize> {
        let token = caller.token.clone();
        self.store
            .atomically(move |tx| Box::pin(async move { tx.mark_read(&token).await }))
            .await
    }

    /// Whether `caller` has anything to look at: unread notifications, global
    /// submissions awaiting review (authorities only) or pending requests
    /// against the clubs and activities they own. Always computed fresh.
    pub async fn has_pending_work(&self, caller: &User) -> AppResult<bool> {
        Ok(self.notification_summary(caller).await?.has_pending_work)
    }

    pub async fn notification_summary(&self, caller: &User) -> AppResult<NotificationSummary> {
        let caller = caller.clone();
        self.store
            .atomically(move |tx| {
                Box::pin(async move {
                    let unread = tx.count_unread(&caller.token).await?;
                    if unread > 0 {
                        return Ok(NotificationSummary {
                            unread,
                            has_pending_work: true,
                        });
                    }

                    let mut pending = false;
                    if caller.role.is_authority() {
                        pending = !tx
                            .clubs(ClubFilter::with_status(Status::Pending))
                            .await?
                            .is_empty()
                            || !tx
                                .activities(ActivityFilter::with_status(Status::Pending))
                                .await?
                                .is_empty()
                            || !tx
                                .feedbacks(FeedbackFilter {
                                    status: Some(FeedbackStatus::Pending),
                                    ..FeedbackFilter::default()
                                })
                                .await?
                                .is_empty();
                    }

                    if !pending {
                        let owned: Vec<i32> = tx
                            .activities(ActivityFilter::organized_by(caller.token.as_str()))
                            .await?
                            .into_iter()
                            .map(|a| a.id)
                            .collect();
                        if !owned.is_empty() {
                            pending = tx
                                .count_registrations(
                                    RegistrationFilter::in_activities(owned)
                                        .with_status(Status::Pending),
                                )
                                .await?
                                > 0;
                        }
                    }

                    if !pending {
                        let founded: Vec<i32> = tx
                            .clubs(ClubFilter::founded_by(caller.token.as_str()))
                            .await?
                            .into_iter()
                            .map(|c| c.id)
                            .collect();
                        if !founded.is_empty() {
                            pending = tx
                                .count_enrollments(
                                    EnrollmentFilter::in_clubs(founded).with_status(Status::Pending),
                                )
                                .await?
                                > 0;
                        }
                    }

                    Ok::<_, AppError>(NotificationSummary {
                        unread,
                        has_pending_work: pending,
                    })
                })
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_their_name_as_tag() {
        let json = serde_json::to_value(HubEvent::ActivityPhaseUpdated {
            activity_id: 7,
            phase: Phase::InProgress,
        })
        .unwrap();
        assert_eq!(json["event"], "activity_phase_updated");
        assert_eq!(json["activityId"], 7);
        assert_eq!(json["phase"], "in_progress");
    }

    #[test]
    fn reviewer_hints_carry_no_user() {
        let json = serde_json::to_value(HubEvent::for_reviewers("new_audit")).unwrap();
        assert_eq!(json["event"], "notification_update");
        assert!(json.get("userId").is_none());
        assert_eq!(json["reason"], "new_audit");
    }

    #[tokio::test]
    async fn broadcast_reaches_current_subscribers_only() {
        let publisher = BroadcastPublisher::new(8);
        publisher.publish(HubEvent::ClubDeleted { club_id: 1 });
        let mut rx = publisher.subscribe();
        publisher.publish(HubEvent::ClubDeleted { club_id: 2 });
        assert_eq!(rx.recv().await.unwrap(), HubEvent::ClubDeleted { club_id: 2 });
    }
}
