use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::role::Role;
use super::{action, resource};

/// Immutable role -> resource -> actions mapping.
///
/// Built once at startup and shared read-only behind an `Arc` in `AppState`;
/// changing permissions means constructing a new table and swapping the
/// pointer, never mutating in place. Lookups for unknown role/resource pairs
/// return nothing rather than erroring (deny-by-default).
///
/// Actions suffixed `_own` or `_assigned` grant the base action narrowed to
/// the caller's own records; the guard surfaces that as [`super::Scope::Own`].
#[derive(Debug, Clone)]
pub struct PermissionTable {
    grants: HashMap<Role, BTreeMap<String, BTreeSet<String>>>,
}

impl PermissionTable {
    /// The built-in production table.
    pub fn builtin() -> Self {
        let mut grants = HashMap::new();
        for role in Role::ALL {
            let mut by_resource = BTreeMap::new();
            for (res, actions) in role_grants(role) {
                let set: BTreeSet<String> = actions.iter().map(|a| a.to_string()).collect();
                by_resource.insert(res.to_string(), set);
            }
            grants.insert(role, by_resource);
        }
        Self { grants }
    }

    /// Build a table from explicit grants. Used by tests and by any future
    /// externally-loaded policy source.
    pub fn from_grants<I, R, A>(entries: I) -> Self
    where
        I: IntoIterator<Item = (Role, R)>,
        R: IntoIterator<Item = (&'static str, A)>,
        A: IntoIterator<Item = &'static str>,
    {
        let mut grants: HashMap<Role, BTreeMap<String, BTreeSet<String>>> = HashMap::new();
        for (role, resources) in entries {
            let by_resource = grants.entry(role).or_default();
            for (res, actions) in resources {
                let set = by_resource.entry(res.to_string()).or_default();
                set.extend(actions.into_iter().map(|a| a.to_string()));
            }
        }
        Self { grants }
    }

    pub fn allowed_actions(&self, role: Role, resource: &str) -> Option<&BTreeSet<String>> {
        self.grants.get(&role)?.get(resource)
    }

    /// Plain membership test, with the superadmin bypass.
    ///
    /// Own-scoped variants do not satisfy this check; callers that can honor
    /// scope narrowing should go through [`super::authorize`] instead.
    pub fn is_allowed(&self, role: Role, resource: &str, action: &str) -> bool {
        if role.is_superadmin() {
            return true;
        }
        self.allowed_actions(role, resource)
            .map_or(false, |actions| actions.contains(action))
    }

    /// Grants for one role, cloned into a deterministic shape for API
    /// responses. Advisory only: clients use this for UI gating, the guard
    /// remains the enforcement point.
    pub fn grants_for(&self, role: Role) -> BTreeMap<String, Vec<String>> {
        self.grants
            .get(&role)
            .map(|by_resource| {
                by_resource
                    .iter()
                    .map(|(res, actions)| (res.clone(), actions.iter().cloned().collect()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

type Grants = &'static [(&'static str, &'static [&'static str])];

const CRUD: &[&str] = &[action::CREATE, action::READ, action::UPDATE, action::DELETE];

/// Declarative grants per role. The match is exhaustive so adding a role
/// forces a decision about its permissions.
fn role_grants(role: Role) -> Grants {
    match role {
        Role::Superadmin => &[
            // Listed for advisory display; authorization itself bypasses the
            // table for superadmins.
            (resource::COMPANIES, CRUD),
            (resource::USERS, CRUD),
            (resource::EQUIPMENT, CRUD),
            (resource::PRODUCTION, CRUD),
            (resource::EXPENSES, CRUD),
            (resource::INVOICES, CRUD),
            (resource::ATTENDANCE, CRUD),
            (resource::COSTING_CENTERS, CRUD),
            (resource::VEHICLE_LOCATIONS, CRUD),
            (resource::SALARIES, CRUD),
            (resource::DASHBOARD, &[action::READ]),
            (resource::REPORTS, &[action::READ, action::EXPORT]),
        ],
        Role::Owner => &[
            (resource::USERS, CRUD),
            (resource::EQUIPMENT, CRUD),
            (resource::PRODUCTION, CRUD),
            (resource::EXPENSES, CRUD),
            (resource::INVOICES, CRUD),
            (resource::ATTENDANCE, CRUD),
            (resource::COSTING_CENTERS, CRUD),
            (resource::VEHICLE_LOCATIONS, CRUD),
            (resource::SALARIES, CRUD),
            (resource::DASHBOARD, &[action::READ]),
            (resource::REPORTS, &[action::READ, action::EXPORT]),
        ],
        Role::Manager => &[
            (resource::USERS, &[action::READ]),
            (resource::EQUIPMENT, &[action::CREATE, action::READ, action::UPDATE]),
            (resource::PRODUCTION, &[action::CREATE, action::READ, action::UPDATE]),
            (resource::EXPENSES, &[action::READ]),
            (resource::INVOICES, &[action::READ]),
            (resource::ATTENDANCE, &[action::CREATE, action::READ, action::UPDATE]),
            (resource::COSTING_CENTERS, &[action::READ]),
            (resource::VEHICLE_LOCATIONS, &[action::READ, action::UPDATE]),
            (resource::SALARIES, &[action::READ]),
            (resource::DASHBOARD, &[action::READ]),
            (resource::REPORTS, &[action::READ, action::EXPORT]),
        ],
        Role::Accountant => &[
            (resource::USERS, &[action::READ]),
            (resource::PRODUCTION, &[action::READ]),
            (resource::EXPENSES, CRUD),
            (resource::INVOICES, CRUD),
            (resource::ATTENDANCE, &[action::CREATE, action::READ]),
            (resource::COSTING_CENTERS, &[action::READ]),
            (resource::SALARIES, &[action::CREATE, action::READ, action::UPDATE]),
            (resource::DASHBOARD, &[action::READ]),
            (resource::REPORTS, &[action::READ, action::EXPORT]),
        ],
        Role::Foreman => &[
            (resource::USERS, &[action::READ]),
            (resource::EQUIPMENT, &[action::READ, action::UPDATE]),
            (resource::PRODUCTION, &[action::CREATE, action::READ, action::UPDATE]),
            (resource::EXPENSES, &[action::READ]),
            (resource::INVOICES, &[action::READ]),
            (resource::ATTENDANCE, &[action::CREATE, action::READ, action::UPDATE]),
            (resource::COSTING_CENTERS, &[action::READ]),
            (resource::VEHICLE_LOCATIONS, &[action::READ]),
            (resource::DASHBOARD, &[action::READ]),
            (resource::REPORTS, &[action::READ]),
        ],
        Role::Driver => &[
            (resource::USERS, &["read_own"]),
            (resource::EQUIPMENT, &[action::READ]),
            (resource::PRODUCTION, &[action::READ]),
            (resource::ATTENDANCE, &[action::CREATE, "read_own"]),
            (resource::VEHICLE_LOCATIONS, &[action::READ, action::UPDATE]),
            (resource::SALARIES, &["read_own"]),
            (resource::DASHBOARD, &[action::READ]),
        ],
        Role::Guard => &[
            (resource::USERS, &["read_own"]),
            (resource::ATTENDANCE, &[action::CREATE, action::READ]),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_resource_grants_nothing() {
        let table = PermissionTable::builtin();
        assert!(table.allowed_actions(Role::Owner, "spaceships").is_none());
        assert!(!table.is_allowed(Role::Owner, "spaceships", "read"));
    }

    #[test]
    fn superadmin_is_always_allowed() {
        let table = PermissionTable::from_grants(Vec::<(Role, Vec<(&str, Vec<&str>)>)>::new());
        assert!(table.is_allowed(Role::Superadmin, "spaceships", "launch"));
    }

    #[test]
    fn guard_cannot_touch_invoices() {
        let table = PermissionTable::builtin();
        assert!(!table.is_allowed(Role::Guard, resource::INVOICES, action::READ));
    }

    #[test]
    fn own_scoped_grant_does_not_satisfy_plain_check() {
        let table = PermissionTable::builtin();
        assert!(!table.is_allowed(Role::Driver, resource::SALARIES, action::READ));
    }

    #[test]
    fn every_role_has_advisory_grants() {
        let table = PermissionTable::builtin();
        for role in Role::ALL {
            assert!(!table.grants_for(role).is_empty(), "no grants for {role}");
        }
    }
}
