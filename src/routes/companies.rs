use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{action, resource};
use crate::context::CurrentUser;
use crate::directory::fetch_company;
use crate::errors::{AppError, AppResult};
use crate::models::company::{Company, CompanyCreateRequest, DbCompany};
use crate::utils::utc_now;

#[utoipa::path(
    get,
    path = "/companies",
    tag = "Companies",
    responses((status = 200, description = "Companies the caller may act in", body = [Company]))
)]
pub async fn list_companies(
    State(state): State<AppState>,
    auth: CurrentUser,
) -> AppResult<Json<Vec<Company>>> {
    // Superadmins see the whole directory; everyone else only the companies
    // they can switch into. The accessible set is the narrowing here, so no
    // table lookup is needed.
    let companies = if auth.role().is_superadmin() {
        sqlx::query_as::<_, DbCompany>(
            "SELECT id, name, name_en, status, created_at, updated_at FROM companies ORDER BY name",
        )
        .fetch_all(&state.pool)
        .await?
    } else {
        let mut ids: Vec<Uuid> = auth.memberships.clone();
        if let Some(home) = auth.user.company_id {
            if !ids.contains(&home) {
                ids.push(home);
            }
        }
        if ids.is_empty() {
            return Ok(Json(Vec::new()));
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT id, name, name_en, status, created_at, updated_at FROM companies WHERE id IN ({placeholders}) ORDER BY name",
        );
        let mut query = sqlx::query_as::<_, DbCompany>(&sql);
        for id in &ids {
            query = query.bind(id);
        }
        query.fetch_all(&state.pool).await?
    };

    let companies: Vec<Company> = companies
        .into_iter()
        .map(Company::try_from)
        .collect::<Result<_, _>>()?;

    Ok(Json(companies))
}

#[utoipa::path(
    post,
    path = "/companies",
    tag = "Companies",
    request_body = CompanyCreateRequest,
    responses(
        (status = 201, description = "Company created", body = Company),
        (status = 403, description = "Insufficient permission")
    )
)]
pub async fn create_company(
    State(state): State<AppState>,
    auth: CurrentUser,
    Json(payload): Json<CompanyCreateRequest>,
) -> AppResult<(StatusCode, Json<Company>)> {
    auth.require(&state, resource::COMPANIES, action::CREATE)?;

    let now = utc_now();
    let company_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO companies (id, name, name_en, status, created_at, updated_at) VALUES (?, ?, ?, 'TRIAL', ?, ?)",
    )
    .bind(company_id)
    .bind(&payload.name)
    .bind(&payload.name_en)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let company = fetch_company(&state.pool, company_id).await?;
    Ok((StatusCode::CREATED, Json(company)))
}

#[utoipa::path(
    get,
    path = "/companies/{id}",
    tag = "Companies",
    params(("id" = Uuid, Path, description = "Company id")),
    responses(
        (status = 200, description = "Company detail", body = Company),
        (status = 403, description = "No access to this company")
    )
)]
pub async fn get_company(
    State(state): State<AppState>,
    auth: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Company>> {
    if !auth.can_access(id) {
        return Err(AppError::tenant_access_denied(id));
    }

    let company = fetch_company(&state.pool, id).await?;
    Ok(Json(company))
}
