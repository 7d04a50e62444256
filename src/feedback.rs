use crate::{
    engine::{required, Hub},
    error::{AppError, AppResult},
    models::{Feedback, FeedbackStatus, NewFeedback, NotificationKind, User},
    notify::HubEvent,
    store::{FeedbackFilter, Store},
};

impl<S: Store> Hub<S> {
    pub async fn submit_feedback(
        &self,
        caller: &User,
        content: &str,
        media: Vec<String>,
    ) -> AppResult<Feedback> {
        let row = NewFeedback {
            author: caller.token.clone(),
            author_name: caller.name.clone(),
            author_class: caller.class.clone(),
            content: required("content", content)?,
            media: media
                .into_iter()
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect(),
        };
        let feedback = self
            .store
            .atomically(move |tx| Box::pin(async move { tx.insert_feedback(row).await }))
            .await?;

        tracing::info!(user = %caller.token, feedback_id = feedback.id, "feedback submitted");
        self.publish(HubEvent::for_reviewers("new_feedback"));
        Ok(feedback)
    }

    pub async fn my_feedback(&self, caller: &User) -> AppResult<Vec<Feedback>> {
        let filter = FeedbackFilter {
            author: Some(caller.token.clone()),
            ..FeedbackFilter::default()
        };
        self.store
            .atomically(move |tx| Box::pin(async move { tx.feedbacks(filter).await }))
            .await
    }

    /// Everything submitted, optionally narrowed to one status. Authorities only.
    pub async fn all_feedback(
        &self,
        caller: &User,
        status: Option<FeedbackStatus>,
    ) -> AppResult<Vec<Feedback>> {
        if !caller.role.is_authority() {
            return Err(AppError::forbidden("only an authority can read all feedback"));
        }
        let filter = FeedbackFilter {
            status,
            ..FeedbackFilter::default()
        };
        self.store
            .atomically(move |tx| Box::pin(async move { tx.feedbacks(filter).await }))
            .await
    }

    pub async fn reply_feedback(&self, caller: &User, id: i32, reply: &str) -> AppResult<Feedback> {
        if !caller.role.is_authority() {
            return Err(AppError::forbidden("only an authority can reply to feedback"));
        }
        let reply = required("reply", reply)?;
        let feedback = self
            .store
            .atomically(move |tx| {
                Box::pin(async move {
                    if tx.feedback(id).await?.is_none() {
                        return Err(AppError::not_found("the feedback does not exist"));
                    }
                    tx.reply_feedback(id, reply).await
                })
            })
            .await?;

        tracing::info!(user = %caller.token, feedback_id = id, "feedback answered");
        self.notify(&feedback.author, NotificationKind::FeedbackReply, id)
            .await;
        Ok(feedback)
    }
}
