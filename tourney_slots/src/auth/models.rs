//! Caller identity models.

use serde::{Deserialize, Serialize};

/// User ID type
pub type UserId = i64;

/// Role of an authenticated caller.
///
/// Replaces overlapping `is_admin`/`is_player`/`is_superuser` flags with a
/// single closed set, so a caller is exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Signs up for tournaments and pays for a team slot
    Participant,
    /// Reviews and confirms payments
    Operator,
    /// Operator with full administrative rights
    SuperOperator,
}

impl Role {
    /// Whether this role may run operator-only transitions
    pub fn is_operator(self) -> bool {
        matches!(self, Role::Operator | Role::SuperOperator)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Participant => write!(f, "participant"),
            Role::Operator => write!(f, "operator"),
            Role::SuperOperator => write!(f, "super_operator"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "participant" => Ok(Role::Participant),
            "operator" => Ok(Role::Operator),
            "super_operator" | "superoperator" => Ok(Role::SuperOperator),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Authenticated caller handed to the reservation engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
}

impl Actor {
    /// Participant caller
    pub fn participant(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::Participant,
        }
    }

    /// Operator caller
    pub fn operator(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::Operator,
        }
    }

    /// Super operator caller
    pub fn super_operator(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::SuperOperator,
        }
    }

    pub fn is_operator(&self) -> bool {
        self.role.is_operator()
    }
}
