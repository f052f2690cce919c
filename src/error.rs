use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Failure raised by a repository implementation.
///
/// `NotFound` and `Conflict` are only produced by conditional mutations
/// (`update_with_*`, `mark_used`); lookups report a missing row as
/// `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,

    #[error("conflicting concurrent update")]
    Conflict,

    #[error("database failure")]
    Database(#[from] sqlx::Error),

    #[error("stored record is not decodable")]
    Encoding(#[from] serde_json::Error),

    #[error("{0}")]
    Backend(String),
}

/// A single footprint check that did not hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityViolation {
    /// The `r` cookie presented by the browser does not carry the request
    /// id recorded when the challenge was created.
    RequestChain,
    /// The `Referer` header does not originate from the provider the
    /// browser was sent to.
    Referer,
    /// An OAuth-significant query parameter changed between the recorded
    /// request and the returning one.
    Parameter(&'static str),
}

impl std::fmt::Display for IntegrityViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntegrityViolation::RequestChain => write!(f, "request id does not match"),
            IntegrityViolation::Referer => write!(f, "referer does not match redirect origin"),
            IntegrityViolation::Parameter(name) => {
                write!(f, "request parameter {name:?} does not match")
            }
        }
    }
}

/// Failure raised by footprint validation.
///
/// `Violation` is the tamper signal and maps to `access_denied` without
/// leaking its detail; everything else is infrastructural and maps to
/// `server_error`.
#[derive(Debug, thiserror::Error)]
pub enum IntegrityError {
    #[error("footprint violation: {0}")]
    Violation(IntegrityViolation),

    #[error("footprint url is not parseable")]
    Url(#[from] url::ParseError),
}

/// Failure raised by the authorization broker, already collapsed onto the
/// OAuth 2.0 canonical error codes the authorization endpoint may emit.
#[derive(Debug, thiserror::Error)]
pub enum AuthorizeError {
    #[error("access denied")]
    AccessDenied,

    #[error("malformed authorization request")]
    InvalidRequest,

    #[error("authorization backend failure")]
    ServerError(#[source] anyhow::Error),
}

impl AuthorizeError {
    /// OAuth 2.0 error code for the redirect back to the client.
    pub fn oauth_code(&self) -> &'static str {
        match self {
            AuthorizeError::AccessDenied => "access_denied",
            AuthorizeError::InvalidRequest => "invalid_request",
            AuthorizeError::ServerError(_) => "server_error",
        }
    }
}

impl From<RepositoryError> for AuthorizeError {
    fn from(err: RepositoryError) -> Self {
        AuthorizeError::ServerError(err.into())
    }
}

/// Failure raised by the admin RPC services.
///
/// These never translate into OAuth codes; the handlers serialize them
/// into the `error` field of the RPC response body.
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("challenge not found")]
    NotFound,

    #[error("challenge already resolved")]
    Conflict,

    #[error("storage failure")]
    Storage(#[source] anyhow::Error),
}

impl From<RepositoryError> for AdminError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => AdminError::NotFound,
            RepositoryError::Conflict => AdminError::Conflict,
            err => AdminError::Storage(err.into()),
        }
    }
}

/// Failure raised by the token endpoint, per RFC 6749 §5.2.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("client authentication failed")]
    InvalidClient,

    #[error("{0}")]
    InvalidGrant(String),

    #[error("unsupported grant type")]
    UnsupportedGrantType,

    #[error("token backend failure")]
    ServerError(#[source] anyhow::Error),
}

impl TokenError {
    pub fn code(&self) -> &'static str {
        match self {
            TokenError::InvalidRequest(_) => "invalid_request",
            TokenError::InvalidClient => "invalid_client",
            TokenError::InvalidGrant(_) => "invalid_grant",
            TokenError::UnsupportedGrantType => "unsupported_grant_type",
            TokenError::ServerError(_) => "server_error",
        }
    }
}

impl From<RepositoryError> for TokenError {
    fn from(err: RepositoryError) -> Self {
        TokenError::ServerError(err.into())
    }
}

/// Error body emitted by the token endpoint.
#[derive(Serialize)]
pub struct OAuthErrorBody {
    pub error: String,
    pub error_description: String,
}

impl IntoResponse for TokenError {
    fn into_response(self) -> Response {
        let status = match &self {
            TokenError::InvalidClient => StatusCode::UNAUTHORIZED,
            TokenError::ServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        };

        let body = Json(OAuthErrorBody {
            error: self.code().to_string(),
            error_description: self.to_string(),
        });

        (status, body).into_response()
    }
}
