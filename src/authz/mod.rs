//! Authorization module - role model, permission table and request guard
//!
//! The pieces fit together per request as:
//! 1. the context resolver ([`crate::context::CurrentUser`]) attaches the
//!    principal and their active company,
//! 2. [`authorize`] combines role, resource and action against the immutable
//!    [`PermissionTable`],
//! 3. the handler acts on the returned [`Scope`] (full tenant scope vs
//!    own-records-only).
//!
//! Deny-by-default: anything the table does not explicitly grant is denied.

mod guard;
mod role;
mod table;

pub use guard::{authorize, Decision, DenyReason, Scope};
pub use role::{Role, UnknownRole};
pub use table::PermissionTable;

/// Resource names subject to authorization.
pub mod resource {
    pub const COMPANIES: &str = "companies";
    pub const USERS: &str = "users";
    pub const EQUIPMENT: &str = "equipment";
    pub const PRODUCTION: &str = "production";
    pub const EXPENSES: &str = "expenses";
    pub const INVOICES: &str = "invoices";
    pub const ATTENDANCE: &str = "attendance";
    pub const COSTING_CENTERS: &str = "costing_centers";
    pub const VEHICLE_LOCATIONS: &str = "vehicle_locations";
    pub const SALARIES: &str = "salaries";
    pub const DASHBOARD: &str = "dashboard";
    pub const REPORTS: &str = "reports";
}

/// Action verbs requested against resources.
pub mod action {
    pub const CREATE: &str = "create";
    pub const READ: &str = "read";
    pub const UPDATE: &str = "update";
    pub const DELETE: &str = "delete";
    pub const EXPORT: &str = "export";
}

/// Whether a resource only makes sense inside a resolved company.
///
/// `companies` is the single cross-tenant resource (the tenant directory
/// itself); everything else requires an active company on the request.
pub fn is_tenant_scoped(resource: &str) -> bool {
    resource != resource::COMPANIES
}
