use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::authz::Role;
use crate::errors::AppError;
use crate::models::company::Company;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    /// Home company; the default active company when a token carries none.
    pub company_id: Option<Uuid>,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub role: String,
    pub company_id: Option<Uuid>,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbUser> for User {
    type Error = AppError;

    fn try_from(value: DbUser) -> Result<Self, Self::Error> {
        // The role column is CHECK-constrained; a value outside the closed
        // set means the store is corrupted, which we surface rather than
        // treating the user as silently permissionless.
        let role: Role = value
            .role
            .parse()
            .map_err(|err| AppError::internal(format!("user {}: {err}", value.id)))?;

        Ok(User {
            id: value.id,
            username: value.username,
            email: value.email,
            full_name: value.full_name,
            role,
            company_id: value.company_id,
            is_active: value.is_active,
            last_login: value.last_login,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[schema(example = "driver_khalid")]
    pub username: String,
    #[schema(example = "khalid@example.com")]
    pub email: String,
    #[schema(example = "Khalid Al-Omari")]
    pub full_name: String,
    #[schema(example = "S3cureP@ssw0rd")]
    pub password: String,
    /// Home company for the new user.
    pub company_id: Option<Uuid>,
    /// Defaults to `driver` when omitted.
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "driver_khalid")]
    pub username: String,
    #[schema(example = "S3cureP@ssw0rd")]
    pub password: String,
}

/// Advisory role -> resource -> actions map returned to clients for UI
/// gating. The server-side guard remains the enforcement point.
pub type PermissionMap = BTreeMap<String, Vec<String>>;

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<Company>,
    #[schema(value_type = Object)]
    pub permissions: PermissionMap,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub user: User,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<Company>,
    #[schema(value_type = Object)]
    pub permissions: PermissionMap,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SwitchCompanyRequest {
    pub company_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SwitchCompanyResponse {
    pub token: String,
    pub company: Company,
}
