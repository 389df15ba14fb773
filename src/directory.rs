//! Tenant directory: company lookup and the membership predicate.
//!
//! The predicate here is the single source of truth for "may this user act
//! inside that company"; the context resolver and the switch-company flow
//! both go through it.

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::authz::Role;
use crate::errors::{AppError, AppResult};
use crate::models::company::{Company, DbCompany};

/// True iff the user may act within `company_id`: superadmins everywhere,
/// everyone else in their home company or an explicit membership.
pub fn can_access_company(
    role: Role,
    home_company: Option<Uuid>,
    memberships: &[Uuid],
    company_id: Uuid,
) -> bool {
    role.is_superadmin() || home_company == Some(company_id) || memberships.contains(&company_id)
}

pub async fn fetch_company(pool: &SqlitePool, company_id: Uuid) -> AppResult<Company> {
    sqlx::query_as::<_, DbCompany>(
        "SELECT id, name, name_en, status, created_at, updated_at FROM companies WHERE id = ?",
    )
    .bind(company_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("company not found"))?
    .try_into()
}

/// Companies a user may switch into, beyond their home company.
pub async fn fetch_memberships(pool: &SqlitePool, user_id: Uuid) -> AppResult<Vec<Uuid>> {
    let rows: Vec<(Uuid,)> =
        sqlx::query_as("SELECT company_id FROM user_companies WHERE user_id = ?")
            .bind(user_id)
            .fetch_all(pool)
            .await?;

    Ok(rows.into_iter().map(|(id,)| id).collect())
}
