/// Shared types used across the codebase

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Per-classroom role, stored against a (user id, context key) pair.
///
/// `Student` is the least-privileged role and the default whenever no row exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Student,
    Representative,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Representative => "representative",
            Role::Admin => "admin",
        }
    }

    /// Whether this role may create, update or delete classroom data.
    pub fn can_write(&self) -> bool {
        matches!(self, Role::Representative | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "representative" => Ok(Role::Representative),
            "admin" => Ok(Role::Admin),
            other => Err(UnknownVariant::new("role", other)),
        }
    }
}

/// Lifecycle of an assignment as shown to students.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentStatus {
    #[default]
    Upcoming,
    Overdue,
    Completed,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Upcoming => "upcoming",
            AssignmentStatus::Overdue => "overdue",
            AssignmentStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssignmentStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upcoming" => Ok(AssignmentStatus::Upcoming),
            "overdue" => Ok(AssignmentStatus::Overdue),
            "completed" => Ok(AssignmentStatus::Completed),
            other => Err(UnknownVariant::new("assignment status", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_privileged_roles_can_write() {
        assert!(!Role::Student.can_write());
        assert!(Role::Representative.can_write());
        assert!(Role::Admin.can_write());
    }

    #[test]
    fn role_defaults_to_student() {
        assert_eq!(Role::default(), Role::Student);
    }

    #[test]
    fn parses_stored_values() {
        assert_eq!("representative".parse::<Role>(), Ok(Role::Representative));
        assert!("moderator".parse::<Role>().is_err());
        assert_eq!("overdue".parse::<AssignmentStatus>(), Ok(AssignmentStatus::Overdue));
    }
}
