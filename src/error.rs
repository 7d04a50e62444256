use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::{borrow::Cow, fmt};

#[derive(Debug)]
pub enum AppError {
    NotFound(Cow<'static, str>),
    Conflict(Cow<'static, str>),
    Forbidden(Cow<'static, str>),
    CapacityExceeded(Cow<'static, str>),
    PaymentRequired(Cow<'static, str>),
    BadRequest(Cow<'static, str>),
    Unauthorized(Cow<'static, str>),
    InternalServerError(anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn not_found(s: impl Into<Cow<'static, str>>) -> AppError {
        AppError::NotFound(s.into())
    }

    pub fn conflict(s: impl Into<Cow<'static, str>>) -> AppError {
        AppError::Conflict(s.into())
    }

    pub fn forbidden(s: impl Into<Cow<'static, str>>) -> AppError {
        AppError::Forbidden(s.into())
    }

    pub fn capacity_exceeded(s: impl Into<Cow<'static, str>>) -> AppError {
        AppError::CapacityExceeded(s.into())
    }

    pub fn payment_required(s: impl Into<Cow<'static, str>>) -> AppError {
        AppError::PaymentRequired(s.into())
    }

    pub fn bad_request(s: impl Into<Cow<'static, str>>) -> AppError {
        AppError::BadRequest(s.into())
    }

    pub fn unauthorized(s: impl Into<Cow<'static, str>>) -> AppError {
        AppError::Unauthorized(s.into())
    }

    /// Machine readable tag sent next to the message.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::Forbidden(_) => "forbidden",
            AppError::CapacityExceeded(_) => "capacity_exceeded",
            AppError::PaymentRequired(_) => "payment_required",
            AppError::BadRequest(_) => "bad_request",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::InternalServerError(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::CapacityExceeded(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::PaymentRequired(_) => StatusCode::PAYMENT_REQUIRED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::NotFound(s)
            | AppError::Conflict(s)
            | AppError::Forbidden(s)
            | AppError::CapacityExceeded(s)
            | AppError::PaymentRequired(s)
            | AppError::BadRequest(s)
            | AppError::Unauthorized(s) => f.write_str(s),
            AppError::InternalServerError(err) => write!(f, "internal error: {err}"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct AppErrorResponse {
            status: u16,
            kind: &'static str,
            message: Cow<'static, str>,
        }

        let code = self.status();
        let kind = self.kind();
        let message = match self {
            AppError::InternalServerError(err) => {
                tracing::error!(error = ?err, "request failed");
                Cow::Borrowed("Internal Server Error")
            }
            AppError::NotFound(s)
            | AppError::Conflict(s)
            | AppError::Forbidden(s)
            | AppError::CapacityExceeded(s)
            | AppError::PaymentRequired(s)
            | AppError::BadRequest(s)
            | AppError::Unauthorized(s) => s,
        };

        (
            code,
            Json(AppErrorResponse {
                status: code.as_u16(),
                kind,
                message,
            }),
        )
            .into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(e: E) -> AppError {
        AppError::InternalServerError(e.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_errors_keep_their_reason() {
        let err = AppError::capacity_exceeded("the club is full");
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.kind(), "capacity_exceeded");
        assert_eq!(err.to_string(), "the club is full");
    }

    #[test]
    fn foreign_errors_become_internal() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let err: AppError = io.into();
        assert!(matches!(err, AppError::InternalServerError(_)));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn internal_errors_are_masked_in_responses() {
        let response = AppError::from(anyhow::anyhow!("secret detail")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
