use serde::{Deserialize, Serialize};

/// Account role. The variant order is the privilege order, so `<`/`>`
/// comparisons mean "less/more privileged".
///
/// Older deployments named the top role `ceo`; it is accepted on input and
/// treated as `admin` everywhere.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
pub enum Role {
    User,
    Senior,
    #[serde(alias = "ceo")]
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Senior => write!(f, "senior"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_are_totally_ordered() {
        assert!(Role::User < Role::Senior);
        assert!(Role::Senior < Role::Admin);
    }

    #[test]
    fn ceo_is_accepted_as_admin() {
        let role: Role = serde_json::from_str("\"ceo\"").unwrap();
        assert_eq!(role, Role::Admin);
        let role: Role = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(role, Role::Admin);
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Senior).unwrap(), "\"senior\"");
    }
}
