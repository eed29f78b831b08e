//! # Access Policy
//!
//! Which pages each role sees and which actions it may perform.
//!
//! | Action            | Admin | Editor | Analyst |
//! |-------------------|:-----:|:------:|:-------:|
//! | view / summarize  |   x   |   x    |    x    |
//! | upload / edit     |   x   |   x    |         |
//! | assign training   |   x   |   x    |         |
//! | delete policy     |   x   |        |         |
//! | view roadmap      |   x   |        |         |

use crate::{AttestError, Role};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A page of the application menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Page {
    Dashboard,
    UploadPolicies,
    SummaryAndTraining,
    UserPortal,
    AuditLog,
    VisionRoadmap,
}

impl Page {
    /// Menu order.
    pub const ALL: [Page; 6] = [
        Page::Dashboard,
        Page::UploadPolicies,
        Page::SummaryAndTraining,
        Page::UserPortal,
        Page::AuditLog,
        Page::VisionRoadmap,
    ];

    /// Menu label.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Dashboard => "Dashboard",
            Self::UploadPolicies => "Upload Policies",
            Self::SummaryAndTraining => "AI Summary & Training",
            Self::UserPortal => "User Portal",
            Self::AuditLog => "Audit Log",
            Self::VisionRoadmap => "Vision & Roadmap",
        }
    }

    /// The action a role needs to open this page.
    #[must_use]
    pub const fn required_action(self) -> Action {
        match self {
            Self::UploadPolicies => Action::UploadPolicy,
            Self::VisionRoadmap => Action::ViewRoadmap,
            Self::Dashboard | Self::SummaryAndTraining | Self::UserPortal | Self::AuditLog => {
                Action::ViewPolicies
            }
        }
    }
}

/// A permission-checked operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    ViewPolicies,
    UploadPolicy,
    EditPolicy,
    DeletePolicy,
    AssignTraining,
    ViewRoadmap,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ViewPolicies => "view policies",
            Self::UploadPolicy => "upload policies",
            Self::EditPolicy => "edit policies",
            Self::DeletePolicy => "delete policies",
            Self::AssignTraining => "assign training",
            Self::ViewRoadmap => "view the roadmap",
        })
    }
}

impl Role {
    /// Whether this role may perform `action`.
    #[must_use]
    pub const fn can(self, action: Action) -> bool {
        match action {
            Action::ViewPolicies => true,
            Action::UploadPolicy | Action::EditPolicy | Action::AssignTraining => {
                matches!(self, Role::Admin | Role::Editor)
            }
            Action::DeletePolicy | Action::ViewRoadmap => matches!(self, Role::Admin),
        }
    }

    /// Fail with `AttestError::Forbidden` unless this role may perform `action`.
    pub fn ensure(self, action: Action) -> Result<(), AttestError> {
        if self.can(action) {
            Ok(())
        } else {
            Err(AttestError::Forbidden { role: self, action })
        }
    }

    /// Pages shown in this role's menu, in menu order.
    #[must_use]
    pub fn menu(self) -> Vec<Page> {
        Page::ALL
            .into_iter()
            .filter(|page| self.can(page.required_action()))
            .collect()
    }
}
