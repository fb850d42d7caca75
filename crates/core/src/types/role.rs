//! Account roles.

use serde::{Deserialize, Serialize};

/// Role attached to a user session.
///
/// Serialized exactly as the credential exchange returns it (`"Admin"`,
/// `"Customer"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Role {
    /// Store administrator with access to product management.
    Admin,
    /// Regular shopper.
    #[default]
    Customer,
}

impl Role {
    /// Whether this role grants administrative access.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Admin => write!(f, "Admin"),
            Self::Customer => write!(f, "Customer"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Admin" | "admin" => Ok(Self::Admin),
            "Customer" | "customer" => Ok(Self::Customer),
            _ => Err(format!("invalid role: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_role_roundtrip_names() {
        assert_eq!("Admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("customer".parse::<Role>().unwrap(), Role::Customer);
        assert!("root".parse::<Role>().is_err());
        assert_eq!(Role::Admin.to_string(), "Admin");
    }

    #[test]
    fn test_serde_uses_variant_names() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"Admin\"");
        let role: Role = serde_json::from_str("\"Customer\"").unwrap();
        assert_eq!(role, Role::Customer);
    }

    #[test]
    fn test_only_admin_is_admin() {
        assert!(Role::Admin.is_admin());
        assert!(!Role::Customer.is_admin());
    }
}
