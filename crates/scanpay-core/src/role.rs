//! # Roles and Capabilities
//!
//! The backend reports a free-form role string per staff account. It is
//! parsed exactly once, into [`Role`], and the kiosk gates features on
//! [`Capabilities`] instead of comparing strings.
//!
//! ```text
//! ┌──────────────────┬──────────┬──────────┬───────────────────┐
//! │ Role             │ scan     │ checkout │ manage inventory  │
//! ├──────────────────┼──────────┼──────────┼───────────────────┤
//! │ Admin            │    ✓     │    ✓     │        ✓          │
//! │ StoreManager     │    ✓     │    ✓     │        ✓          │
//! │ SecurityStaff    │    ✓     │    ✓     │                   │
//! │ Staff / Other    │          │          │                   │
//! └──────────────────┴──────────┴──────────┴───────────────────┘
//! ```

use serde::{Deserialize, Serialize};

/// Staff role of the signed-in account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    StoreManager,
    SecurityStaff,
    Staff,
    /// A role the kiosk does not know; grants nothing.
    Other(String),
}

impl Role {
    /// Parses a backend role name.
    ///
    /// Accepts `"Store Manager"`, `"store_manager"` and `"store-manager"`
    /// alike. `is_admin` wins over whatever the role string says.
    pub fn parse(raw: &str, is_admin: bool) -> Self {
        if is_admin {
            return Role::Admin;
        }

        let normalized: String = raw
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == ' ' || c == '-' { '_' } else { c })
            .collect();

        match normalized.as_str() {
            "admin" | "administrator" => Role::Admin,
            "store_manager" | "manager" => Role::StoreManager,
            "security_staff" | "security" => Role::SecurityStaff,
            "staff" | "cashier" | "" => Role::Staff,
            _ => Role::Other(raw.trim().to_string()),
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        match self {
            Role::Admin | Role::StoreManager => Capabilities {
                can_scan: true,
                can_checkout: true,
                can_manage_inventory: true,
            },
            Role::SecurityStaff => Capabilities {
                can_scan: true,
                can_checkout: true,
                can_manage_inventory: false,
            },
            Role::Staff | Role::Other(_) => Capabilities::default(),
        }
    }
}

/// What a session is allowed to do at the kiosk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub can_scan: bool,
    pub can_checkout: bool,
    pub can_manage_inventory: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_spellings() {
        assert_eq!(Role::parse("store manager", false), Role::StoreManager);
        assert_eq!(Role::parse("Store_Manager", false), Role::StoreManager);
        assert_eq!(Role::parse("security staff", false), Role::SecurityStaff);
        assert_eq!(Role::parse("admin", false), Role::Admin);
        assert_eq!(Role::parse("", false), Role::Staff);
    }

    #[test]
    fn test_is_admin_overrides_role() {
        assert_eq!(Role::parse("staff", true), Role::Admin);
    }

    #[test]
    fn test_unknown_role_grants_nothing() {
        let role = Role::parse("janitor", false);
        assert_eq!(role, Role::Other("janitor".to_string()));
        assert_eq!(role.capabilities(), Capabilities::default());
    }

    #[test]
    fn test_security_staff_cannot_manage_inventory() {
        let caps = Role::SecurityStaff.capabilities();
        assert!(caps.can_checkout);
        assert!(caps.can_scan);
        assert!(!caps.can_manage_inventory);
    }
}
