//! # Core Type Definitions
//!
//! This module contains all core types for the Attest compliance engine:
//! - Identities (`Role`, `User`, `Account`)
//! - Policy documents (`PolicyName`, `PolicyInfo`)
//! - Ledger rows (`TrainingStatus`, `TrainingAssignment`, `DashboardCounts`)
//! - Audit trail rows (`AuditEntry`)
//! - Error types (`AttestError`)
//!
//! ## Text Formats
//!
//! Roles and statuses are stored and serialized with their display names
//! (`"Admin"`, `"Pending"`, ...) so rows written by earlier deployments
//! read back unchanged.

use crate::access::Action;
use crate::primitives::{MAX_POLICY_NAME_LENGTH, POLICY_EXTENSION};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// ROLES & IDENTITIES
// =============================================================================

/// Role of a user. Determines which pages and actions are available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Editor,
    Analyst,
}

impl Role {
    /// All roles, most privileged first.
    pub const ALL: [Role; 3] = [Role::Admin, Role::Editor, Role::Analyst];

    /// Display name, also the stored form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "Admin",
            Self::Editor => "Editor",
            Self::Analyst => "Analyst",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AttestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Admin" => Ok(Self::Admin),
            "Editor" => Ok(Self::Editor),
            "Analyst" => Ok(Self::Analyst),
            other => Err(AttestError::InvalidRecord(format!("unknown role '{}'", other))),
        }
    }
}

/// An authenticated identity: who is acting and with which role.
///
/// Carries no credentials, so it is safe to hand to handlers and responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub role: Role,
}

impl User {
    #[must_use]
    pub fn new(name: impl Into<String>, role: Role) -> Self {
        Self {
            name: name.into(),
            role,
        }
    }
}

/// A row of the identity table: name, plain-text password and role.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub name: String,
    pub password: String,
    pub role: Role,
}

impl Account {
    #[must_use]
    pub fn new(name: impl Into<String>, password: impl Into<String>, role: Role) -> Self {
        Self {
            name: name.into(),
            password: password.into(),
            role,
        }
    }

    /// The identity this account authenticates as.
    #[must_use]
    pub fn user(&self) -> User {
        User::new(self.name.clone(), self.role)
    }
}

// Passwords never reach logs.
impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("name", &self.name)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// POLICY DOCUMENTS
// =============================================================================

/// Name of a policy document (its blob name in the container).
///
/// A valid name is non-empty, at most `MAX_POLICY_NAME_LENGTH` bytes,
/// has no path separators or control characters, and ends in `.txt`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PolicyName(String);

impl PolicyName {
    /// Validate and wrap a policy name.
    pub fn parse(name: impl Into<String>) -> Result<Self, AttestError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(AttestError::InvalidPolicyName(
                "policy name is empty".to_string(),
            ));
        }
        if name.len() > MAX_POLICY_NAME_LENGTH {
            return Err(AttestError::InvalidPolicyName(format!(
                "policy name length {} exceeds maximum {} bytes",
                name.len(),
                MAX_POLICY_NAME_LENGTH
            )));
        }
        if name.contains(['/', '\\']) || name.chars().any(char::is_control) {
            return Err(AttestError::InvalidPolicyName(format!(
                "policy name '{}' contains path separators or control characters",
                name.escape_default()
            )));
        }
        if !name.ends_with(POLICY_EXTENSION) || name.len() == POLICY_EXTENSION.len() {
            return Err(AttestError::InvalidPolicyName(format!(
                "policy name '{}' must end in {}",
                name, POLICY_EXTENSION
            )));
        }
        Ok(Self(name))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PolicyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PolicyName {
    type Error = AttestError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<PolicyName> for String {
    fn from(name: PolicyName) -> Self {
        name.0
    }
}

/// A listing entry for a stored policy document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyInfo {
    pub name: String,
    pub last_modified: DateTime<Utc>,
}

// =============================================================================
// TRAINING LEDGER
// =============================================================================

/// Completion state of a training assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrainingStatus {
    Pending,
    Completed,
}

impl TrainingStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Completed => "Completed",
        }
    }
}

impl fmt::Display for TrainingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrainingStatus {
    type Err = AttestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Completed" => Ok(Self::Completed),
            other => Err(AttestError::InvalidRecord(format!(
                "unknown training status '{}'",
                other
            ))),
        }
    }
}

/// One row of the training ledger.
///
/// `due_date` is always the date of `assigned_at` plus `DUE_PERIOD_DAYS`.
/// `score` is 0 until the status is `Completed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingAssignment {
    pub id: i64,
    pub user: String,
    pub role: Role,
    pub module: String,
    pub status: TrainingStatus,
    pub assigned_at: NaiveDateTime,
    pub due_date: NaiveDate,
    pub score: u8,
}

impl TrainingAssignment {
    /// Pending past its due date, as of `today`.
    #[must_use]
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status == TrainingStatus::Pending && self.due_date < today
    }
}

/// Aggregate ledger counts shown on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DashboardCounts {
    pub pending: u64,
    pub completed: u64,
    pub overdue: u64,
}

// =============================================================================
// AUDIT TRAIL
// =============================================================================

/// An immutable, timestamped line of the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub entry: String,
    pub timestamp: NaiveDateTime,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Attest core.
#[derive(Debug, Error)]
pub enum AttestError {
    /// Username/password pair did not match the identity table.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The role is not allowed to perform the action.
    #[error("Role {role} is not permitted to {action}")]
    Forbidden { role: Role, action: Action },

    /// The named user is not in the identity table.
    #[error("Unknown user: {0}")]
    UnknownUser(String),

    /// A policy name failed validation.
    #[error("Invalid policy name: {0}")]
    InvalidPolicyName(String),

    /// A policy document body failed validation.
    #[error("Invalid policy content: {0}")]
    InvalidPolicyContent(String),

    /// The policy document does not exist in the store.
    #[error("Policy not found: {0}")]
    PolicyNotFound(String),

    /// No pending assignment matches the user and module.
    #[error("No pending assignment of {module} for {user}")]
    AssignmentNotFound { user: String, module: String },

    /// A quiz submission was malformed.
    #[error("Invalid quiz submission: {0}")]
    InvalidQuizSubmission(String),

    /// The object store failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The summarization model failed.
    #[error("Summary error: {0}")]
    Summary(String),

    /// The relational database failed.
    #[error("Database error: {0}")]
    Database(String),

    /// A schema migration failed or the schema is unsupported.
    #[error("Migration error: {0}")]
    Migration(String),

    /// A stored row could not be decoded.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// The configuration file or environment is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An I/O error outside the stores (sockets, local files).
    #[error("I/O error: {0}")]
    IoError(String),
}

impl From<rusqlite::Error> for AttestError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(e.to_string())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_display() {
        for role in Role::ALL {
            assert_eq!(role.to_string().parse::<Role>().expect("parse"), role);
        }
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn policy_name_accepts_txt() {
        let name = PolicyName::parse("kyc_policy.txt").expect("valid");
        assert_eq!(name.as_str(), "kyc_policy.txt");
    }

    #[test]
    fn policy_name_rejects_bad_names() {
        for bad in ["", "   ", ".txt", "policy.pdf", "../etc/passwd.txt", "a\\b.txt", "a\nb.txt"] {
            assert!(
                matches!(PolicyName::parse(bad), Err(AttestError::InvalidPolicyName(_))),
                "{:?} should be rejected",
                bad
            );
        }
        let long = format!("{}.txt", "p".repeat(MAX_POLICY_NAME_LENGTH));
        assert!(PolicyName::parse(long).is_err());
    }

    #[test]
    fn policy_name_deserialize_validates() {
        let ok: PolicyName = serde_json::from_str("\"aml.txt\"").expect("valid");
        assert_eq!(ok.as_str(), "aml.txt");
        assert!(serde_json::from_str::<PolicyName>("\"aml.docx\"").is_err());
    }

    #[test]
    fn account_debug_hides_password() {
        let account = Account::new("admin", "admin123", Role::Admin);
        let debug = format!("{:?}", account);
        assert!(debug.contains("admin"));
        assert!(!debug.contains("admin123"));
    }

    #[test]
    fn overdue_requires_pending_and_past_due() {
        let assigned_at = NaiveDate::from_ymd_opt(2024, 3, 1)
            .and_then(|d| d.and_hms_opt(9, 0, 0))
            .expect("datetime");
        let mut row = TrainingAssignment {
            id: 1,
            user: "analyst".to_string(),
            role: Role::Analyst,
            module: "aml.txt".to_string(),
            status: TrainingStatus::Pending,
            assigned_at,
            due_date: NaiveDate::from_ymd_opt(2024, 3, 8).expect("date"),
            score: 0,
        };
        let due = row.due_date;
        assert!(!row.is_overdue(due));
        assert!(row.is_overdue(due.succ_opt().expect("next day")));

        row.status = TrainingStatus::Completed;
        assert!(!row.is_overdue(due.succ_opt().expect("next day")));
    }
}
