use uuid::Uuid;

use crate::errors::AppError;

use super::role::Role;
use super::table::PermissionTable;
use super::is_tenant_scoped;

/// How far an allowed request may reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Everything in the active company.
    Company,
    /// Only records owned by or assigned to the requesting user. The handler
    /// must narrow its query accordingly; the guard does not filter data.
    Own,
}

/// Why a request was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    /// Tenant-scoped resource with no active company on the request.
    NoTenantContext,
    /// No matching grant in the permission table.
    MissingPermission { resource: String, action: String },
}

/// Outcome of an authorization check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow(Scope),
    Deny(DenyReason),
}

impl Decision {
    /// Convert the decision into the handler-facing result, so a denial can
    /// terminate the request with `?` before any side effects run.
    pub fn require(self) -> Result<Scope, AppError> {
        match self {
            Decision::Allow(scope) => Ok(scope),
            Decision::Deny(DenyReason::NoTenantContext) => Err(AppError::NoTenantContext),
            Decision::Deny(DenyReason::MissingPermission { resource, action }) => {
                Err(AppError::Forbidden { resource, action })
            }
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow(_))
    }
}

/// The per-request authorization gate.
///
/// `company` is the already-validated active company attached by the context
/// resolver; the guard only reasons about role capability, not membership.
/// A tenant-scoped resource with no active company is refused outright,
/// whatever the role - even a superadmin must resolve a company before
/// touching company data.
pub fn authorize(
    table: &PermissionTable,
    role: Role,
    company: Option<Uuid>,
    resource: &str,
    action: &str,
) -> Decision {
    if is_tenant_scoped(resource) && company.is_none() {
        return Decision::Deny(DenyReason::NoTenantContext);
    }

    if role.is_superadmin() {
        return Decision::Allow(Scope::Company);
    }

    if let Some(actions) = table.allowed_actions(role, resource) {
        if actions.contains(action) {
            return Decision::Allow(Scope::Company);
        }
        // A grant for "{action}_own" or "{action}_assigned" allows the
        // request but narrows it to the caller's own records.
        if actions.contains(&format!("{action}_own"))
            || actions.contains(&format!("{action}_assigned"))
        {
            return Decision::Allow(Scope::Own);
        }
    }

    Decision::Deny(DenyReason::MissingPermission {
        resource: resource.to_string(),
        action: action.to_string(),
    })
}
