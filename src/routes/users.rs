use axum::extract::{Path, State};
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{action, resource, Scope};
use crate::context::CurrentUser;
use crate::errors::{AppError, AppResult};
use crate::models::user::{DbUser, User};

#[utoipa::path(
    get,
    path = "/users",
    tag = "Users",
    responses((status = 200, description = "Users in the active company", body = [User]))
)]
pub async fn list_users(State(state): State<AppState>, auth: CurrentUser) -> AppResult<Json<Vec<User>>> {
    let scope = auth.require(&state, resource::USERS, action::READ)?;
    // require() already refused requests without an active company.
    let company_id = auth.company_id.ok_or(AppError::NoTenantContext)?;

    let users = match scope {
        // A narrowed grant only ever shows the caller their own record.
        Scope::Own => vec![auth.user.clone()],
        Scope::Company => {
            let rows = sqlx::query_as::<_, DbUser>(
                "SELECT id, username, email, full_name, password_hash, role, company_id, is_active, last_login, created_at, updated_at \
                 FROM users \
                 WHERE is_active = 1 AND (company_id = ? OR id IN (SELECT user_id FROM user_companies WHERE company_id = ?)) \
                 ORDER BY username",
            )
            .bind(company_id)
            .bind(company_id)
            .fetch_all(&state.pool)
            .await?;

            rows.into_iter().map(User::try_from).collect::<Result<_, _>>()?
        }
    };

    Ok(Json(users))
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    responses((status = 200, description = "User detail", body = User))
)]
pub async fn get_user(
    State(state): State<AppState>,
    auth: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<User>> {
    let scope = auth.require(&state, resource::USERS, action::READ)?;
    let company_id = auth.company_id.ok_or(AppError::NoTenantContext)?;

    match scope {
        Scope::Own => {
            // Answer "not found" rather than "forbidden" so a narrowed caller
            // cannot enumerate other users' ids.
            if id != auth.id() {
                return Err(AppError::not_found("user not found"));
            }
            Ok(Json(auth.user.clone()))
        }
        Scope::Company => {
            let row = sqlx::query_as::<_, DbUser>(
                "SELECT id, username, email, full_name, password_hash, role, company_id, is_active, last_login, created_at, updated_at \
                 FROM users \
                 WHERE id = ? AND is_active = 1 AND (company_id = ? OR id IN (SELECT user_id FROM user_companies WHERE company_id = ?))",
            )
            .bind(id)
            .bind(company_id)
            .bind(company_id)
            .fetch_optional(&state.pool)
            .await?
            .ok_or_else(|| AppError::not_found("user not found"))?;

            Ok(Json(row.try_into()?))
        }
    }
}
