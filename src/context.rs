//! Per-request context resolution.
//!
//! Every protected handler takes a [`CurrentUser`] argument; extraction walks
//! the request from bearer token to a fully resolved principal:
//! token -> claims -> live user record -> active company. Any failure along
//! the way rejects the request before the handler body runs. The user record
//! is fetched exactly once, so the whole pipeline sees one consistent
//! snapshot of role and company.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{authorize, Decision, Role, Scope};
use crate::directory::{can_access_company, fetch_memberships};
use crate::errors::AppError;
use crate::events::{self, AuditEvent, Severity};
use crate::models::user::{DbUser, User};
use crate::utils::utc_now;

/// The resolved principal plus active company for one request.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    /// Companies the user holds explicit membership in (home not included).
    pub memberships: Vec<Uuid>,
    /// Active company for this request, if one resolved.
    pub company_id: Option<Uuid>,
}

impl CurrentUser {
    pub fn id(&self) -> Uuid {
        self.user.id
    }

    pub fn role(&self) -> Role {
        self.user.role
    }

    pub fn can_access(&self, company_id: Uuid) -> bool {
        can_access_company(self.role(), self.user.company_id, &self.memberships, company_id)
    }

    /// Authorize `action` on `resource` for this request, logging and
    /// auditing denials. Handlers call this before touching the store.
    pub fn require(
        &self,
        state: &AppState,
        resource: &str,
        action: &str,
    ) -> Result<Scope, AppError> {
        let decision = authorize(&state.permissions, self.role(), self.company_id, resource, action);

        if let Decision::Deny(reason) = &decision {
            tracing::warn!(
                user_id = %self.id(),
                role = %self.role(),
                resource = %resource,
                action = %action,
                reason = ?reason,
                "authorization denied"
            );
            events::record(
                &state.events,
                AuditEvent::new("auth.denied")
                    .actor(self.id())
                    .company(self.company_id)
                    .detail(serde_json::json!({
                        "resource": resource,
                        "action": action,
                        "role": self.role().as_str(),
                    })),
            );
        }

        decision.require()
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(AppError::MissingCredentials)?;

        let claims = state.tokens.decode(token)?;

        // Re-check liveness on every request; a token outlives neither a
        // deleted nor a deactivated user.
        let user = fetch_live_user(&state.pool, claims.sub)
            .await?
            .ok_or(AppError::PrincipalNotFound)?;
        let user: User = user.try_into()?;

        let memberships = fetch_memberships(&state.pool, user.id).await?;

        let company_id = match claims.company_id {
            Some(claimed) => {
                // The claim was legitimate at issue time, but access may have
                // been revoked since.
                if !can_access_company(user.role, user.company_id, &memberships, claimed) {
                    events::record(
                        &state.events,
                        AuditEvent::new("auth.stale_tenant_claim")
                            .actor(user.id)
                            .company(Some(claimed))
                            .severity(Severity::Critical),
                    );
                    return Err(AppError::tenant_access_denied(claimed));
                }
                Some(claimed)
            }
            None => user.company_id,
        };

        touch_last_seen(state.pool.clone(), user.id);

        Ok(CurrentUser {
            user,
            memberships,
            company_id,
        })
    }
}

pub async fn fetch_live_user(pool: &SqlitePool, user_id: Uuid) -> Result<Option<DbUser>, AppError> {
    let user = sqlx::query_as::<_, DbUser>(
        "SELECT id, username, email, full_name, password_hash, role, company_id, is_active, last_login, created_at, updated_at \
         FROM users WHERE id = ? AND is_active = 1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

/// Fire-and-forget last-seen update; must never block or fail the request.
fn touch_last_seen(pool: SqlitePool, user_id: Uuid) {
    tokio::spawn(async move {
        let result = sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
            .bind(utc_now())
            .bind(user_id)
            .execute(&pool)
            .await;

        if let Err(err) = result {
            tracing::debug!(user_id = %user_id, error = %err, "last-seen update failed");
        }
    });
}
