use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The closed set of roles a user can hold.
///
/// Roles are a sum type rather than free-form strings so that the permission
/// table and the guard are exhaustive over them at compile time. A record
/// with a role outside this set is a data error, not a silently-denied user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Platform-level administrator; bypasses the permission table entirely.
    Superadmin,
    /// Company owner, full access within their companies.
    Owner,
    /// Operations manager.
    Manager,
    /// Financial operations.
    Accountant,
    /// Production supervisor.
    Foreman,
    /// Field worker (vehicle operator).
    Driver,
    /// Site security personnel.
    Guard,
}

impl Role {
    pub const ALL: [Role; 7] = [
        Role::Superadmin,
        Role::Owner,
        Role::Manager,
        Role::Accountant,
        Role::Foreman,
        Role::Driver,
        Role::Guard,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Superadmin => "superadmin",
            Role::Owner => "owner",
            Role::Manager => "manager",
            Role::Accountant => "accountant",
            Role::Foreman => "foreman",
            Role::Driver => "driver",
            Role::Guard => "guard",
        }
    }

    pub fn is_superadmin(&self) -> bool {
        matches!(self, Role::Superadmin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "superadmin" => Ok(Role::Superadmin),
            "owner" => Ok(Role::Owner),
            "manager" => Ok(Role::Manager),
            "accountant" => Ok(Role::Accountant),
            "foreman" => Ok(Role::Foreman),
            "driver" => Ok(Role::Driver),
            "guard" => Ok(Role::Guard),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_str() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!("intern".parse::<Role>().is_err());
    }
}
