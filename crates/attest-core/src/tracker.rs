//! # Tracker
//!
//! The facade the outer surfaces talk to. It combines the relational
//! database (ledger and audit trail) with the identity provider and applies
//! the access policy before every state change.
//!
//! Each state-changing operation writes its ledger rows and its audit entry
//! in one SQLite transaction, so a failure leaves neither behind.
//!
//! The policy store is not owned here: callers perform blob operations
//! themselves and report them through `record_policy_change`.

use crate::access::Action;
use crate::audit::AuditLog;
use crate::identity::IdentityProvider;
use crate::ledger::TrainingLedger;
use crate::quiz::{Quiz, QuizOutcome};
use crate::storage::{Database, MigrationReport};
use crate::{
    AttestError, AuditEntry, DashboardCounts, PolicyName, TrainingAssignment, User,
};
use chrono::{NaiveDate, NaiveDateTime};
use std::path::Path;
use std::sync::Arc;

// =============================================================================
// POLICY CHANGES
// =============================================================================

/// A state change of the policy store, as recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyChange {
    Uploaded,
    Edited,
    Deleted,
}

impl PolicyChange {
    /// The permission required to make this change.
    #[must_use]
    pub const fn action(self) -> Action {
        match self {
            Self::Uploaded => Action::UploadPolicy,
            Self::Edited => Action::EditPolicy,
            Self::Deleted => Action::DeletePolicy,
        }
    }

    /// Audit trail text for a change to `name`.
    #[must_use]
    pub fn audit_text(self, name: &PolicyName) -> String {
        let verb = match self {
            Self::Uploaded => "Uploaded",
            Self::Edited => "Edited",
            Self::Deleted => "Deleted",
        };
        format!("{} policy: {}", verb, name)
    }
}

/// Result of a quiz submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizSubmission {
    pub outcome: QuizOutcome,
    /// Ledger rows moved to Completed (0 on a failed attempt).
    pub completed: usize,
}

// =============================================================================
// TRACKER
// =============================================================================

/// Ledger, audit trail and identities behind one handle.
pub struct Tracker {
    db: Database,
    identities: Arc<dyn IdentityProvider>,
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("db", &self.db)
            .finish_non_exhaustive()
    }
}

impl Tracker {
    #[must_use]
    pub fn new(db: Database, identities: Arc<dyn IdentityProvider>) -> Self {
        Self { db, identities }
    }

    /// Open (and migrate) the database file at `path`.
    pub fn open(
        path: impl AsRef<Path>,
        identities: Arc<dyn IdentityProvider>,
    ) -> Result<Self, AttestError> {
        Ok(Self::new(Database::open(path)?, identities))
    }

    /// A tracker over a private in-memory database.
    pub fn in_memory(identities: Arc<dyn IdentityProvider>) -> Result<Self, AttestError> {
        Ok(Self::new(Database::open_in_memory()?, identities))
    }

    #[must_use]
    pub fn migration_report(&self) -> &MigrationReport {
        self.db.migration_report()
    }

    // -------------------------------------------------------------------------
    // Identities
    // -------------------------------------------------------------------------

    /// Check credentials against the identity provider.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<User, AttestError> {
        self.identities.authenticate(username, password)
    }

    #[must_use]
    pub fn user(&self, username: &str) -> Option<User> {
        self.identities.user(username)
    }

    #[must_use]
    pub fn users(&self) -> Vec<User> {
        self.identities.users()
    }

    // -------------------------------------------------------------------------
    // Policy changes
    // -------------------------------------------------------------------------

    /// Record a completed policy store change in the audit trail.
    ///
    /// Fails with `Forbidden` if `actor` may not make the change; callers
    /// check with `authorize` before touching the store.
    pub fn record_policy_change(
        &mut self,
        actor: &User,
        change: PolicyChange,
        name: &PolicyName,
        now: NaiveDateTime,
    ) -> Result<AuditEntry, AttestError> {
        actor.role.ensure(change.action())?;
        AuditLog::append(self.db.conn(), change.audit_text(name), now)
    }

    /// Fail with `Forbidden` unless `actor` may perform `action`.
    pub fn authorize(actor: &User, action: Action) -> Result<(), AttestError> {
        actor.role.ensure(action)
    }

    // -------------------------------------------------------------------------
    // Training ledger
    // -------------------------------------------------------------------------

    /// Assign `module` to `assignee`.
    ///
    /// The assignee must be a known identity. The module's existence in the
    /// policy store is checked by the caller.
    pub fn assign_training(
        &mut self,
        actor: &User,
        assignee: &str,
        module: &PolicyName,
        now: NaiveDateTime,
    ) -> Result<TrainingAssignment, AttestError> {
        actor.role.ensure(Action::AssignTraining)?;
        let assignee = self
            .identities
            .user(assignee)
            .ok_or_else(|| AttestError::UnknownUser(assignee.to_string()))?;

        let tx = self.db.conn_mut().transaction()?;
        let row = TrainingLedger::assign(&tx, &assignee, module, now)?;
        AuditLog::append(
            &tx,
            format!("Assigned {} to {}", module, assignee.name),
            now,
        )?;
        tx.commit()?;
        Ok(row)
    }

    /// Every assignment of `user`, oldest first.
    pub fn assignments_for(&self, user: &str) -> Result<Vec<TrainingAssignment>, AttestError> {
        TrainingLedger::for_user(self.db.conn(), user)
    }

    /// Every assignment, oldest first.
    pub fn assignments(&self) -> Result<Vec<TrainingAssignment>, AttestError> {
        TrainingLedger::all(self.db.conn())
    }

    /// Pending / completed / overdue counts as of `today`.
    pub fn dashboard(&self, today: NaiveDate) -> Result<DashboardCounts, AttestError> {
        TrainingLedger::counts(self.db.conn(), today)
    }

    // -------------------------------------------------------------------------
    // Quiz
    // -------------------------------------------------------------------------

    /// The quiz `actor` has to pass for `module`.
    ///
    /// Requires a Pending assignment of the module to the actor.
    pub fn quiz(&self, actor: &User, module: &PolicyName) -> Result<Quiz, AttestError> {
        self.ensure_pending(actor, module)?;
        Ok(Quiz::for_module(module.as_str()))
    }

    /// Grade `answers` for `actor`'s Pending assignment of `module`.
    ///
    /// A pass completes the Pending rows and appends one audit entry in a
    /// single transaction. A fail writes nothing.
    pub fn submit_quiz(
        &mut self,
        actor: &User,
        module: &PolicyName,
        answers: &[usize],
        now: NaiveDateTime,
    ) -> Result<QuizSubmission, AttestError> {
        self.ensure_pending(actor, module)?;
        let outcome = Quiz::for_module(module.as_str()).grade(answers)?;
        if !outcome.passed {
            return Ok(QuizSubmission {
                outcome,
                completed: 0,
            });
        }

        let tx = self.db.conn_mut().transaction()?;
        let completed = TrainingLedger::complete(&tx, &actor.name, module.as_str(), outcome.score)?;
        AuditLog::append(
            &tx,
            format!(
                "{} completed {} with score {}/{}",
                actor.name, module, outcome.score, outcome.total
            ),
            now,
        )?;
        tx.commit()?;
        Ok(QuizSubmission { outcome, completed })
    }

    fn ensure_pending(&self, actor: &User, module: &PolicyName) -> Result<(), AttestError> {
        if TrainingLedger::pending(self.db.conn(), &actor.name, module.as_str())?.is_empty() {
            return Err(AttestError::AssignmentNotFound {
                user: actor.name.clone(),
                module: module.to_string(),
            });
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Audit trail
    // -------------------------------------------------------------------------

    /// Append a free-text entry.
    pub fn record(
        &mut self,
        entry: impl Into<String>,
        now: NaiveDateTime,
    ) -> Result<AuditEntry, AttestError> {
        AuditLog::append(self.db.conn(), entry, now)
    }

    /// The full trail, newest first.
    pub fn audit_trail(&self) -> Result<Vec<AuditEntry>, AttestError> {
        AuditLog::list(self.db.conn())
    }
}
