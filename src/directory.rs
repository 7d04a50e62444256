//! Identity directory: registration, login and role management.

use crate::{
    engine::{required, Hub},
    error::{AppError, AppResult},
    models::{Activity, Club, NewUser, Role, Status, User},
    store::{ActivityFilter, ClubFilter, Store},
};
use nanoid::nanoid;
use serde::Serialize;

const TOKEN_ALPHABET: [char; 32] = [
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'J', 'K', 'L', 'M', 'N', 'P', 'Q', 'R', 'S', 'T', 'U',
    'V', 'W', 'X', 'Y', 'Z', '2', '3', '4', '5', '6', '7', '8', '9',
];

/// A fresh external user token: eight characters, no look-alike glyphs.
pub fn new_token() -> String {
    nanoid!(8, &TOKEN_ALPHABET)
}

/// A user as other users see them. The token is only shown to authorities.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCard {
    pub name: String,
    pub class: String,
    pub role: Role,
    #[serde(rename = "userId")]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub users: Vec<UserCard>,
    pub clubs: Vec<Club>,
    pub activities: Vec<Activity>,
}

impl<S: Store> Hub<S> {
    pub async fn register(&self, name: &str, class: &str) -> AppResult<User> {
        let name = required("name", name)?;
        let class = required("class", class)?;
        let role = if self.policy.is_seeded(&name, &class) {
            Role::SuperAuthority
        } else {
            Role::Member
        };
        let user = NewUser {
            token: new_token(),
            name,
            class,
            role,
        };

        let created = self
            .store
            .atomically(move |tx| Box::pin(async move { tx.insert_user(user).await }))
            .await?
            .ok_or_else(|| AppError::conflict("this name has already been registered"))?;

        tracing::info!(user = %created.token, role = %created.role, "registered");
        Ok(created)
    }

    /// Resolves a token and checks the name and class stored with it.
    pub async fn login(&self, token: &str, name: &str, class: &str) -> AppResult<User> {
        let user = self.user(token.trim()).await?;
        match user {
            Some(user) if user.name == name.trim() && user.class == class.trim() => Ok(user),
            _ => Err(AppError::unauthorized("the details do not match any user")),
        }
    }

    pub async fn user(&self, token: &str) -> AppResult<Option<User>> {
        let token = token.to_string();
        self.store
            .atomically(move |tx| Box::pin(async move { tx.user(&token).await }))
            .await
    }

    pub async fn set_role(&self, operator: &User, target: &str, role: Role) -> AppResult<User> {
        if operator.role != Role::SuperAuthority {
            return Err(AppError::forbidden(
                "only a super-authority can change roles",
            ));
        }
        let target = target.to_string();
        let updated = self
            .store
            .atomically(move |tx| Box::pin(async move { tx.set_role(&target, role).await }))
            .await?
            .ok_or_else(|| AppError::not_found("the user does not exist"))?;

        tracing::info!(operator = %operator.token, user = %updated.token, role = %role, "role changed");
        Ok(updated)
    }

    /// Case-insensitive lookup across users and approved clubs and activities.
    pub async fn search(&self, caller: &User, query: &str) -> AppResult<SearchResults> {
        let query = query.trim().to_string();
        if query.is_empty() {
            return Err(AppError::bad_request("the search query is empty"));
        }
        let reveal_tokens = caller.role.is_authority();

        self.store
            .atomically(move |tx| {
                Box::pin(async move {
                    let needle = query.to_lowercase();
                    let users = tx
                        .search_users(&query)
                        .await?
                        .into_iter()
                        .map(|u| UserCard {
                            token: reveal_tokens.then(|| u.token.clone()),
                            name: u.name,
                            class: u.class,
                            role: u.role,
                        })
                        .collect();
                    let clubs = tx
                        .clubs(ClubFilter::with_status(Status::Approved))
                        .await?
                        .into_iter()
                        .filter(|c| c.name.to_lowercase().contains(&needle))
                        .collect();
                    let activities = tx
                        .activities(ActivityFilter::with_status(Status::Approved))
                        .await?
                        .into_iter()
                        .filter(|a| a.name.to_lowercase().contains(&needle))
                        .collect();

                    Ok::<_, AppError>(SearchResults {
                        users,
                        clubs,
                        activities,
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
    fn tokens_are_eight_unambiguous_characters() {
        for _ in 0..64 {
            let token = new_token();
            assert_eq!(token.chars().count(), 8);
            assert!(token.chars().all(|c| TOKEN_ALPHABET.contains(&c)));
        }
    }
}
