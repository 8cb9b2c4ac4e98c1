//! Access Policy
//!
//! Single place deciding whether a role may perform an action on a collection.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// Portal role of the acting user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Teacher,
    Student,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Teacher => write!(f, "teacher"),
            Role::Student => write!(f, "student"),
        }
    }
}

impl FromStr for Role {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "teacher" => Ok(Role::Teacher),
            "student" => Ok(Role::Student),
            other => Err(SyncError::InvalidRequest(format!(
                "Unknown role '{}'. Must be \"student\" or \"teacher\"",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Read => write!(f, "read"),
            Action::Create => write!(f, "create"),
            Action::Update => write!(f, "update"),
            Action::Delete => write!(f, "delete"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(String),
}

// == Access Policy ==
/// Role-based rules for document access.
///
/// Teachers may do anything. Students may read everything and write only to
/// the configured student-writable collections.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    student_writable: HashSet<String>,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::new(["todos"])
    }
}

impl AccessPolicy {
    pub fn new<I, S>(student_writable: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            student_writable: student_writable.into_iter().map(Into::into).collect(),
        }
    }

    pub fn authorize(&self, role: Role, action: Action, collection: &str) -> Decision {
        match (role, action) {
            (Role::Teacher, _) | (_, Action::Read) => Decision::Allow,
            (Role::Student, _) if self.student_writable.contains(collection) => Decision::Allow,
            (Role::Student, action) => Decision::Deny(format!(
                "{} may not {} documents in '{}'",
                role, action, collection
            )),
        }
    }

    /// Like [`authorize`](Self::authorize) but turns a denial into `SyncError::Forbidden`.
    pub fn check(&self, role: Role, action: Action, collection: &str) -> Result<()> {
        match self.authorize(role, action, collection) {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(SyncError::Forbidden(reason)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_teacher_may_do_anything() {
        let policy = AccessPolicy::default();
        for action in [Action::Read, Action::Create, Action::Update, Action::Delete] {
            assert_eq!(policy.authorize(Role::Teacher, action, "lessons"), Decision::Allow);
        }
    }

    #[test]
    fn test_student_reads_everything_writes_todos_only() {
        let policy = AccessPolicy::default();

        assert_eq!(policy.authorize(Role::Student, Action::Read, "exams"), Decision::Allow);
        assert_eq!(policy.authorize(Role::Student, Action::Create, "todos"), Decision::Allow);
        assert!(matches!(
            policy.authorize(Role::Student, Action::Create, "videos"),
            Decision::Deny(_)
        ));
        assert!(matches!(
            policy.check(Role::Student, Action::Delete, "notes"),
            Err(SyncError::Forbidden(_))
        ));
    }

    #[test]
    fn test_custom_student_collections() {
        let policy = AccessPolicy::new(["todos", "submissions"]);
        assert!(policy.check(Role::Student, Action::Update, "submissions").is_ok());
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("Teacher".parse::<Role>().unwrap(), Role::Teacher);
        assert_eq!(" student ".parse::<Role>().unwrap(), Role::Student);
        assert!("admin".parse::<Role>().is_err());
    }
}
