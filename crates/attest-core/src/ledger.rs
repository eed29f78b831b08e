//! # Training Ledger
//!
//! Row-level operations on `training_status`. Rows are created Pending,
//! move to Completed once, and are never deleted.
//!
//! All functions take a plain `&Connection` so they compose inside a
//! caller-owned transaction.

use crate::primitives::{DATE_FORMAT, DUE_PERIOD_DAYS, TIMESTAMP_FORMAT};
use crate::{AttestError, DashboardCounts, PolicyName, TrainingAssignment, TrainingStatus, User};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use rusqlite::{Connection, Row, params};

const SELECT_COLUMNS: &str =
    "SELECT rowid, user, role, module, status, timestamp, due_date, score FROM training_status";

/// Stateless accessor for the `training_status` table.
pub struct TrainingLedger;

/// Columns as stored, before validation.
struct RawAssignment {
    id: i64,
    user: String,
    role: String,
    module: String,
    status: String,
    timestamp: String,
    due_date: String,
    score: Option<i64>,
}

impl RawAssignment {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user: row.get(1)?,
            role: row.get(2)?,
            module: row.get(3)?,
            status: row.get(4)?,
            timestamp: row.get(5)?,
            due_date: row.get(6)?,
            score: row.get(7)?,
        })
    }

    fn decode(self) -> Result<TrainingAssignment, AttestError> {
        let assigned_at = parse_timestamp(&self.timestamp)?;
        let due_date = NaiveDate::parse_from_str(&self.due_date, DATE_FORMAT).map_err(|e| {
            AttestError::InvalidRecord(format!("due date '{}': {}", self.due_date, e))
        })?;
        let score = u8::try_from(self.score.unwrap_or(0))
            .map_err(|_| AttestError::InvalidRecord(format!("score {:?}", self.score)))?;
        Ok(TrainingAssignment {
            id: self.id,
            user: self.user,
            role: self.role.parse()?,
            module: self.module,
            status: self.status.parse()?,
            assigned_at,
            due_date,
            score,
        })
    }
}

/// Parse a stored ISO-8601 timestamp, with or without fractional seconds.
pub(crate) fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, AttestError> {
    raw.parse::<NaiveDateTime>()
        .map_err(|e| AttestError::InvalidRecord(format!("timestamp '{}': {}", raw, e)))
}

pub(crate) fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Due date for an assignment made at `assigned_at`.
pub fn due_date_for(assigned_at: NaiveDateTime) -> Result<NaiveDate, AttestError> {
    assigned_at
        .date()
        .checked_add_signed(TimeDelta::days(DUE_PERIOD_DAYS))
        .ok_or_else(|| AttestError::InvalidRecord(format!("due date overflow for {}", assigned_at)))
}

impl TrainingLedger {
    /// Insert one Pending row for `assignee` and `module`.
    ///
    /// The stored role is the assignee's role; the score starts at 0.
    pub fn assign(
        conn: &Connection,
        assignee: &User,
        module: &PolicyName,
        now: NaiveDateTime,
    ) -> Result<TrainingAssignment, AttestError> {
        let due_date = due_date_for(now)?;
        conn.execute(
            "INSERT INTO training_status (user, role, module, status, timestamp, due_date, score)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)",
            params![
                assignee.name,
                assignee.role.as_str(),
                module.as_str(),
                TrainingStatus::Pending.as_str(),
                format_timestamp(now),
                due_date.format(DATE_FORMAT).to_string(),
            ],
        )?;
        Ok(TrainingAssignment {
            id: conn.last_insert_rowid(),
            user: assignee.name.clone(),
            role: assignee.role,
            module: module.as_str().to_string(),
            status: TrainingStatus::Pending,
            assigned_at: now,
            due_date,
            score: 0,
        })
    }

    /// Every row assigned to `user`, oldest first.
    pub fn for_user(conn: &Connection, user: &str) -> Result<Vec<TrainingAssignment>, AttestError> {
        Self::select(
            conn,
            &format!("{} WHERE user = ?1 ORDER BY timestamp, rowid", SELECT_COLUMNS),
            params![user],
        )
    }

    /// Every row, oldest first.
    pub fn all(conn: &Connection) -> Result<Vec<TrainingAssignment>, AttestError> {
        Self::select(
            conn,
            &format!("{} ORDER BY timestamp, rowid", SELECT_COLUMNS),
            params![],
        )
    }

    /// Pending rows for one user and module.
    pub fn pending(
        conn: &Connection,
        user: &str,
        module: &str,
    ) -> Result<Vec<TrainingAssignment>, AttestError> {
        Self::select(
            conn,
            &format!(
                "{} WHERE user = ?1 AND module = ?2 AND status = ?3 ORDER BY timestamp, rowid",
                SELECT_COLUMNS
            ),
            params![user, module, TrainingStatus::Pending.as_str()],
        )
    }

    /// Pending, completed and overdue counts as of `today`.
    ///
    /// Overdue means Pending with a due date strictly before `today`.
    pub fn counts(conn: &Connection, today: NaiveDate) -> Result<DashboardCounts, AttestError> {
        let count = |sql: &str, args: &[&dyn rusqlite::ToSql]| -> Result<u64, AttestError> {
            let n: i64 = conn.query_row(sql, args, |row| row.get(0))?;
            Ok(u64::try_from(n).unwrap_or(0))
        };
        let pending = TrainingStatus::Pending.as_str();
        let completed = TrainingStatus::Completed.as_str();
        let today = today.format(DATE_FORMAT).to_string();

        Ok(DashboardCounts {
            pending: count(
                "SELECT COUNT(*) FROM training_status WHERE status = ?1",
                params![pending],
            )?,
            completed: count(
                "SELECT COUNT(*) FROM training_status WHERE status = ?1",
                params![completed],
            )?,
            overdue: count(
                "SELECT COUNT(*) FROM training_status WHERE status = ?1 AND due_date < ?2",
                params![pending, today],
            )?,
        })
    }

    /// Mark the Pending rows of `user`/`module` Completed with `score`.
    ///
    /// Returns the number of rows updated; zero rows is `AssignmentNotFound`.
    pub fn complete(
        conn: &Connection,
        user: &str,
        module: &str,
        score: u8,
    ) -> Result<usize, AttestError> {
        let updated = conn.execute(
            "UPDATE training_status SET status = ?1, score = ?2
             WHERE user = ?3 AND module = ?4 AND status = ?5",
            params![
                TrainingStatus::Completed.as_str(),
                score,
                user,
                module,
                TrainingStatus::Pending.as_str(),
            ],
        )?;
        if updated == 0 {
            return Err(AttestError::AssignmentNotFound {
                user: user.to_string(),
                module: module.to_string(),
            });
        }
        Ok(updated)
    }

    fn select(
        conn: &Connection,
        sql: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<TrainingAssignment>, AttestError> {
        let mut stmt = conn.prepare(sql)?;
        let raw = stmt
            .query_map(args, RawAssignment::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        raw.into_iter().map(RawAssignment::decode).collect()
    }
}
