use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

pub type AppResult<T> = Result<T, AppError>;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("missing credentials")]
    MissingCredentials,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("invalid token")]
    InvalidToken,
    #[error("token expired")]
    ExpiredToken,
    /// The token decoded fine but the subject no longer exists or was
    /// deactivated. Rendered identically to `InvalidToken` so callers cannot
    /// probe which identifiers once existed.
    #[error("invalid token")]
    PrincipalNotFound,
    #[error("no access to company {0}")]
    TenantAccessDenied(String),
    #[error("no active company resolved for this request")]
    NoTenantContext,
    #[error("insufficient permission for {action} on {resource}")]
    Forbidden { resource: String, action: String },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("database error")]
    Database(#[from] sqlx::Error),
    #[error("internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn forbidden(resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self::Forbidden {
            resource: resource.into(),
            action: action.into(),
        }
    }

    pub fn tenant_access_denied(company_id: impl ToString) -> Self {
        Self::TenantAccessDenied(company_id.to_string())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::MissingCredentials
            | AppError::InvalidCredentials
            | AppError::InvalidToken
            | AppError::ExpiredToken
            | AppError::PrincipalNotFound => StatusCode::UNAUTHORIZED,
            AppError::TenantAccessDenied(_) | AppError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AppError::NoTenantContext | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Configuration(_) | AppError::Database(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let error = match &self {
            AppError::MissingCredentials => "missing_credentials",
            AppError::InvalidCredentials => "invalid_credentials",
            // PrincipalNotFound is deliberately indistinguishable from a bad token.
            AppError::InvalidToken | AppError::PrincipalNotFound => "invalid_token",
            AppError::ExpiredToken => "expired_token",
            AppError::TenantAccessDenied(_) => "tenant_access_denied",
            AppError::NoTenantContext => "no_tenant_context",
            AppError::Forbidden { .. } => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::BadRequest(_) => "bad_request",
            AppError::Configuration(_) => "configuration",
            AppError::Database(_) => "database",
            AppError::Internal(_) => "internal",
        };

        let message = match &self {
            // Infrastructure failures stay generic on the wire; details go to logs.
            AppError::Database(err) => {
                tracing::error!(error = %err, "database error");
                "internal server error".to_string()
            }
            AppError::PrincipalNotFound => "invalid token".to_string(),
            other => other.to_string(),
        };

        let payload = ErrorResponse {
            error: error.to_string(),
            message,
        };

        (status, Json(payload)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value.to_string())
    }
}
