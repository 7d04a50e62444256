use crate::{
    error::{AppError, AppResult},
    models::User,
    notify::Publisher,
    policy::Policy,
    rotation::Clock,
    store::{Backend, Store, Tx},
};
use std::{collections::HashMap, sync::Arc};

/// The workflow engine. Operations live next to the ledger they drive
/// (`directory`, `enrollment`, `registration`, `approval`, `notify`, `feedback`)
/// and all take the caller as an explicit, already resolved [`crate::models::User`].
pub struct Hub<S = Backend> {
    pub(crate) store: S,
    pub(crate) publisher: Arc<dyn Publisher>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) policy: Policy,
}

impl<S: Store> Hub<S> {
    pub fn new(
        store: S,
        publisher: Arc<dyn Publisher>,
        clock: Arc<dyn Clock>,
        policy: Policy,
    ) -> Self {
        Self {
            store,
            publisher,
            clock,
            policy,
        }
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn rotation_open(&self) -> bool {
        self.policy.rotation.is_open(self.clock.now())
    }
}

/// Loads the users behind `tokens`, keyed by token. Unknown tokens are skipped.
pub(crate) async fn users_by_token(
    tx: &mut dyn Tx,
    tokens: impl IntoIterator<Item = String>,
) -> AppResult<HashMap<String, User>> {
    let mut tokens: Vec<String> = tokens.into_iter().collect();
    tokens.sort();
    tokens.dedup();
    Ok(tx
        .users(tokens)
        .await?
        .into_iter()
        .map(|u| (u.token.clone(), u))
        .collect())
}

/// Rejects blank required text fields.
pub(crate) fn required(field: &'static str, value: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::bad_request(format!(
            "{field} is required"
        )));
    }
    Ok(value.to_string())
}

/// Capacities, when present, are positive.
pub(crate) fn capacity(value: Option<i32>) -> AppResult<Option<i32>> {
    match value {
        Some(c) if c <= 0 => Err(AppError::bad_request(
            "capacity must be a positive number",
        )),
        other => Ok(other),
    }
}

/// Fails once `approved` has reached `capacity`. No capacity means unlimited.
pub(crate) fn ensure_capacity(
    capacity: Option<i32>,
    approved: i64,
    full: &'static str,
) -> AppResult<()> {
    match capacity {
        Some(limit) if approved >= i64::from(limit) => {
            Err(AppError::capacity_exceeded(full))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_counts_only_up_to_the_limit() {
        assert!(ensure_capacity(None, 1_000, "full").is_ok());
        assert!(ensure_capacity(Some(2), 1, "full").is_ok());
        assert!(matches!(
            ensure_capacity(Some(2), 2, "full"),
            Err(AppError::CapacityExceeded(_))
        ));
    }

    #[test]
    fn blank_fields_and_empty_capacities_are_bad_requests() {
        assert!(matches!(required("name", "  "), Err(AppError::BadRequest(_))));
        assert_eq!(required("name", " Chess ").unwrap(), "Chess");
        assert!(matches!(capacity(Some(0)), Err(AppError::BadRequest(_))));
        assert_eq!(capacity(Some(3)).unwrap(), Some(3));
        assert_eq!(capacity(None).unwrap(), None);
    }
}
