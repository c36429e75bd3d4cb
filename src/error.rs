use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    status: u16,
}

/// Errors from token handling and the guard's strict entry points.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Token could not be parsed from the request.")]
    TokenMissing,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token has expired and can no longer be refreshed")]
    RefreshExpired,

    #[error("Token is not yet valid")]
    TokenNotYetValid,

    #[error("Invalid issuer")]
    InvalidIssuer,

    #[error("Invalid audience")]
    InvalidAudience,

    #[error("The token has been blacklisted")]
    TokenBlacklisted,

    #[error("Token subject does not match the expected principal type")]
    SubjectMismatch,

    #[error("No principal found for subject {0:?}")]
    PrincipalNotFound(String),

    /// Raised by every `*_or_fail` entry point, whatever the underlying cause.
    #[error("An error occurred attempting to retrieve the authenticated user.")]
    UserNotDefined,

    #[error("Invalid subject: {0}")]
    InvalidSubject(String),

    #[error("Could not create token: {0}")]
    Encoding(String),

    #[error("You must have the blacklist enabled to invalidate a token.")]
    BlacklistDisabled,

    #[error("Extension [{0}] is not registered")]
    ExtensionNotFound(String),

    #[error("Auth not configured: {0}")]
    ConfigError(String),
}

/// Why a lenient lookup found no principal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthFailure {
    #[error("no token in the request")]
    NoToken,

    /// Decoding failed or the subject model did not match.
    #[error("token rejected: {0}")]
    InvalidToken(AuthError),

    #[error("no principal matches subject {0:?}")]
    PrincipalNotFound(String),
}

/// The specific error behind a failure, for callers that want to report it.
impl From<AuthFailure> for AuthError {
    fn from(failure: AuthFailure) -> Self {
        match failure {
            AuthFailure::NoToken => AuthError::TokenMissing,
            AuthFailure::InvalidToken(e) => e,
            AuthFailure::PrincipalNotFound(sub) => AuthError::PrincipalNotFound(sub),
        }
    }
}

impl AuthError {
    /// Status an HTTP layer should answer with.
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::ConfigError(_) | AuthError::Encoding(_) | AuthError::ExtensionNotFound(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AuthError::BlacklistDisabled => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = ErrorBody {
            error: self.to_string(),
            status: status.as_u16(),
        };

        (status, axum::Json(body)).into_response()
    }
}
