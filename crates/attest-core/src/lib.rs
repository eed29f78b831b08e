//! # attest-core
//!
//! The compliance engine for Attest - THE LOGIC.
//!
//! This crate records who was asked to read which policy, whether they
//! passed the quiz, and every state change in an append-only audit trail.
//!
//! ## Layout
//!
//! - `types`: identities, policy names, ledger rows, the error enum
//! - `access`: role → menu and role → action tables
//! - `identity`: the credential table behind `IdentityProvider`
//! - `ledger` / `audit`: row-level access to the SQLite tables
//! - `quiz`: the fixed three-question scorer
//! - `policy` / `summary`: the seams for object stores and summarization models
//! - `storage`: the SQLite handle, its migrations and the redb policy container
//! - `tracker`: the facade tying the above together
//!
//! ## Architectural Constraints
//!
//! - NO async, NO network dependencies (pure Rust)
//! - Remote stores and models are implemented by the app crate
//! - Every fallible operation returns `AttestError`; nothing panics

// =============================================================================
// MODULES
// =============================================================================

pub mod access;
pub mod audit;
pub mod identity;
pub mod ledger;
pub mod policy;
pub mod primitives;
pub mod quiz;
pub mod roadmap;
pub mod storage;
pub mod summary;
pub mod tracker;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Account, AttestError, AuditEntry, DashboardCounts, PolicyInfo, PolicyName, Role,
    TrainingAssignment, TrainingStatus, User,
};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use access::{Action, Page};
pub use audit::AuditLog;
pub use identity::{IdentityProvider, StaticIdentityProvider};
pub use ledger::{TrainingLedger, due_date_for};
pub use policy::{MemoryPolicyStore, PolicyStore, require_existing, validate_content};
pub use quiz::{Question, QuestionView, Quiz, QuizOutcome};
pub use roadmap::{ROADMAP, RoadmapPhase};
pub use summary::{
    LeadSentenceSummarizer, Summarizer, Summary, SummaryParams, summarize_or_placeholder,
    truncate_chars,
};
pub use tracker::{PolicyChange, QuizSubmission, Tracker};

// =============================================================================
// RE-EXPORTS: Storage
// =============================================================================

pub use storage::{Database, LATEST_VERSION, MigrationReport, RedbPolicyStore};
