use crate::{
    error::{AppError, AppResult},
    models::User,
    AppState,
};
use async_trait::async_trait;
use axum::{
    extract::{FromRequest, RequestParts, TypedHeader},
    headers::{authorization::Bearer, Authorization},
    Extension,
};
use jsonwebtoken::{
    errors::Result as JwtResult, DecodingKey, EncodingKey, Header, TokenData, Validation,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    session: Duration,
}

impl Keys {
    /// Fails when `secret` is not valid base64.
    pub fn from_base64_secret(secret: &str, session: Duration) -> JwtResult<Self> {
        Ok(Keys {
            encoding: EncodingKey::from_base64_secret(secret)?,
            decoding: DecodingKey::from_base64_secret(secret)?,
            session,
        })
    }

    pub fn generate_jwt(&self, user: &User) -> JwtResult<String> {
        jsonwebtoken::encode(
            &Header::default(),
            &Claims {
                sub: user.token.clone(),
                exp: jsonwebtoken::get_current_timestamp() + self.session.as_secs(),
            },
            &self.encoding,
        )
    }

    pub fn validate_jwt(&self, token: &str) -> JwtResult<TokenData<Claims>> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &Validation::default())
    }
}

/// Session claims. The subject is the user's external token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: u64,
}

/// The authenticated user behind `Authorization: Bearer <jwt>`, loaded once per request.
pub struct Caller(pub User);

#[async_trait]
impl<B: Send> FromRequest<B> for Caller {
    type Rejection = AppError;

    async fn from_request(req: &mut RequestParts<B>) -> AppResult<Self> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request(req)
                .await
                .map_err(|_| AppError::unauthorized("sign in first"))?;
        let Extension(state) = Extension::<AppState>::from_request(req).await?;

        let claims = state
            .keys
            .validate_jwt(bearer.token())
            .map_err(|_| AppError::unauthorized("the session is invalid or has expired"))?
            .claims;
        let user = state
            .hub
            .user(&claims.sub)
            .await?
            .ok_or_else(|| AppError::unauthorized("the session user does not exist"))?;
        Ok(Caller(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use chrono::NaiveDateTime;

    // base64 of "a test secret that is long enough"
    const SECRET: &str = "YSB0ZXN0IHNlY3JldCB0aGF0IGlzIGxvbmcgZW5vdWdo";

    fn user() -> User {
        User {
            id: 1,
            token: "AAAA1111".into(),
            name: "Ann".into(),
            class: "NEE4".into(),
            role: Role::Member,
            created_at: NaiveDateTime::from_timestamp_opt(0, 0).unwrap(),
        }
    }

    #[test]
    fn tokens_carry_the_user_token() {
        let keys = Keys::from_base64_secret(SECRET, Duration::from_secs(3600)).unwrap();
        let jwt = keys.generate_jwt(&user()).unwrap();
        assert_eq!(keys.validate_jwt(&jwt).unwrap().claims.sub, "AAAA1111");
    }

    #[test]
    fn expired_and_foreign_tokens_are_rejected() {
        let keys = Keys::from_base64_secret(SECRET, Duration::from_secs(3600)).unwrap();
        let expired = jsonwebtoken::encode(
            &Header::default(),
            &Claims {
                sub: "AAAA1111".into(),
                exp: jsonwebtoken::get_current_timestamp() - 3600,
            },
            &keys.encoding,
        )
        .unwrap();
        assert!(keys.validate_jwt(&expired).is_err());

        let other = Keys::from_base64_secret("b3RoZXIgc2VjcmV0", Duration::from_secs(3600)).unwrap();
        let foreign = other.generate_jwt(&user()).unwrap();
        assert!(keys.validate_jwt(&foreign).is_err());
    }

    #[test]
    fn secrets_must_be_base64() {
        assert!(Keys::from_base64_secret("not base64!", Duration::from_secs(1)).is_err());
    }
}
