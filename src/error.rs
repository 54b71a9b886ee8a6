use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{error, warn};

/// Internal cause of a rejected login attempt. Logged for operators,
/// never serialized into a response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    MissingFields,
    UnknownEmail,
    NoPasswordSet,
    WrongPassword,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::MissingFields => "missing email or password",
            RejectReason::UnknownEmail => "no user for email",
            RejectReason::NoPasswordSet => "account has no password set",
            RejectReason::WrongPassword => "password mismatch",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Every credentials rejection collapses to the same external message.
    /// The reason stays internal so the response cannot be used to probe
    /// which accounts exist.
    #[error("invalid credentials")]
    InvalidCredentials(RejectReason),

    /// The credential store could not be reached or failed mid-query.
    /// Retryable, and deliberately distinct from a bad-credentials reply.
    #[error("credential store unavailable")]
    Store(#[from] sqlx::Error),

    /// An upstream OAuth provider rejected or failed the exchange.
    #[error("provider error: {0}")]
    Provider(String),

    #[error("invalid request: {0}")]
    BadRequest(String),

    #[error("email already registered")]
    EmailTaken,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AuthError::InvalidCredentials(reason) => {
                warn!(reason = reason.as_str(), "login rejected");
                (StatusCode::UNAUTHORIZED, "Invalid credentials".to_string())
            }
            AuthError::Store(e) => {
                error!(error = %e, "credential store unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Service unavailable".to_string(),
                )
            }
            AuthError::Provider(msg) => {
                error!(error = %msg, "oauth provider failure");
                (StatusCode::BAD_GATEWAY, "Provider error".to_string())
            }
            AuthError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AuthError::EmailTaken => (
                StatusCode::CONFLICT,
                "Email already registered".to_string(),
            ),
            AuthError::Internal(e) => {
                error!(error = %e, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_rejections_share_one_external_message() {
        for reason in [
            RejectReason::MissingFields,
            RejectReason::UnknownEmail,
            RejectReason::NoPasswordSet,
            RejectReason::WrongPassword,
        ] {
            let resp = AuthError::InvalidCredentials(reason).into_response();
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn store_failure_is_not_unauthorized() {
        let resp = AuthError::Store(sqlx::Error::PoolClosed).into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
