use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::Role;
use crate::context::CurrentUser;
use crate::directory::{fetch_company, fetch_memberships};
use crate::errors::{AppError, AppResult};
use crate::events::{self, AuditEvent, Severity};
use crate::models::company::Company;
use crate::models::user::{
    AuthResponse, DbUser, LoginRequest, MeResponse, RegisterRequest, SwitchCompanyRequest,
    SwitchCompanyResponse, User,
};
use crate::utils::{hash_password, utc_now, verify_password};

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    message: String,
}

#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = AuthResponse),
        (status = 409, description = "Username or email already in use")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    ensure_identity_available(&state.pool, &payload.username, &payload.email).await?;

    if let Some(company_id) = payload.company_id {
        // Home company must exist before we hang a user off it.
        fetch_company(&state.pool, company_id)
            .await
            .map_err(|_| AppError::bad_request("home company does not exist"))?;
    }

    let password_hash = hash_password(&payload.password)?;
    let role = payload.role.unwrap_or(Role::Driver);
    let now = utc_now();
    let user_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO users (id, username, email, full_name, password_hash, role, company_id, is_active, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?, ?)",
    )
    .bind(user_id)
    .bind(&payload.username)
    .bind(&payload.email)
    .bind(&payload.full_name)
    .bind(password_hash)
    .bind(role.as_str())
    .bind(payload.company_id)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let db_user = fetch_user_by_id(&state.pool, user_id).await?;
    let user: User = db_user.try_into()?;

    let token = state.tokens.issue(user.id, user.company_id)?;
    let company = match user.company_id {
        Some(id) => Some(fetch_company(&state.pool, id).await?),
        None => None,
    };

    events::record(
        &state.events,
        AuditEvent::new("auth.registered")
            .actor(user.id)
            .company(user.company_id)
            .detail(serde_json::json!({"username": user.username, "role": user.role.as_str()})),
    );

    let permissions = state.permissions.grants_for(user.role);
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user,
            company,
            permissions,
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let db_user = sqlx::query_as::<_, DbUser>(
        "SELECT id, username, email, full_name, password_hash, role, company_id, is_active, last_login, created_at, updated_at \
         FROM users WHERE username = ? AND is_active = 1",
    )
    .bind(&payload.username)
    .fetch_optional(&state.pool)
    .await?;

    let Some(db_user) = db_user else {
        record_failed_login(&state, &payload.username, &headers);
        return Err(AppError::InvalidCredentials);
    };

    if !verify_password(&payload.password, &db_user.password_hash)? {
        record_failed_login(&state, &payload.username, &headers);
        return Err(AppError::InvalidCredentials);
    }

    let user: User = db_user.try_into()?;

    // Default the active company to home, or the first explicit membership.
    let company_id = match user.company_id {
        Some(id) => Some(id),
        None => fetch_memberships(&state.pool, user.id).await?.into_iter().next(),
    };

    let token = state.tokens.issue(user.id, company_id)?;
    let company = match company_id {
        Some(id) => Some(fetch_company(&state.pool, id).await?),
        None => None,
    };

    sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
        .bind(utc_now())
        .bind(user.id)
        .execute(&state.pool)
        .await?;

    events::record(
        &state.events,
        AuditEvent::new("auth.login").actor(user.id).company(company_id),
    );

    let permissions = state.permissions.grants_for(user.role);
    Ok(Json(AuthResponse {
        token,
        user,
        company,
        permissions,
    }))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    responses((status = 200, description = "Current user with active company and permissions", body = MeResponse))
)]
pub async fn me(State(state): State<AppState>, auth: CurrentUser) -> AppResult<Json<MeResponse>> {
    let company = match auth.company_id {
        Some(id) => Some(fetch_company(&state.pool, id).await?),
        None => None,
    };

    let permissions = state.permissions.grants_for(auth.role());
    Ok(Json(MeResponse {
        user: auth.user,
        company,
        permissions,
    }))
}

#[utoipa::path(
    post,
    path = "/auth/switch-company",
    tag = "Auth",
    request_body = SwitchCompanyRequest,
    responses(
        (status = 200, description = "Token re-issued for the requested company", body = SwitchCompanyResponse),
        (status = 403, description = "No access to the requested company")
    )
)]
pub async fn switch_company(
    State(state): State<AppState>,
    auth: CurrentUser,
    Json(payload): Json<SwitchCompanyRequest>,
) -> AppResult<Json<SwitchCompanyResponse>> {
    if !auth.can_access(payload.company_id) {
        events::record(
            &state.events,
            AuditEvent::new("auth.tenant_switch_denied")
                .actor(auth.id())
                .company(Some(payload.company_id))
                .severity(Severity::Critical),
        );
        return Err(AppError::tenant_access_denied(payload.company_id));
    }

    let company = fetch_company(&state.pool, payload.company_id).await?;

    // The previous token stays valid until its own expiry; switching only
    // issues a new one scoped to the requested company.
    let token = state.tokens.issue(auth.id(), Some(company.id))?;

    events::record(
        &state.events,
        AuditEvent::new("auth.tenant_switch")
            .actor(auth.id())
            .company(Some(company.id)),
    );

    Ok(Json(SwitchCompanyResponse { token, company }))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "Auth",
    responses((status = 200, description = "Logout acknowledged"))
)]
pub async fn logout(_auth: CurrentUser) -> AppResult<Json<MessageResponse>> {
    // Tokens are stateless; there is no server-side session to tear down and
    // no revocation list, so this is an acknowledgement only.
    Ok(Json(MessageResponse {
        message: "Logged out".to_string(),
    }))
}

fn record_failed_login(state: &AppState, username: &str, headers: &HeaderMap) {
    let ip = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.split(',').next().unwrap_or(s).trim().to_string());

    events::record(
        &state.events,
        AuditEvent::new("auth.login_failed")
            .severity(Severity::Critical)
            .detail(serde_json::json!({"username": username, "ip": ip})),
    );
}

async fn ensure_identity_available(pool: &SqlitePool, username: &str, email: &str) -> AppResult<()> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE username = ? OR email = ?")
            .bind(username)
            .bind(email)
            .fetch_one(pool)
            .await?;

    if count > 0 {
        return Err(AppError::conflict("username or email already in use"));
    }

    Ok(())
}

async fn fetch_user_by_id(pool: &SqlitePool, user_id: Uuid) -> AppResult<DbUser> {
    sqlx::query_as::<_, DbUser>(
        "SELECT id, username, email, full_name, password_hash, role, company_id, is_active, last_login, created_at, updated_at \
         FROM users WHERE id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("user not found"))
}
