//! # Fixed Parameters
//!
//! Compiled-in constants for the Attest core. These are not configurable at
//! runtime: changing one changes observable behavior of the ledger or quiz.

/// Days between assignment and due date.
///
/// - `due_date = date(assigned_at) + DUE_PERIOD_DAYS`
pub const DUE_PERIOD_DAYS: i64 = 7;

/// Number of questions in every quiz.
pub const QUIZ_QUESTION_COUNT: usize = 3;

/// Percentage of correct answers required to pass.
///
/// Applied with integer arithmetic, so the threshold rounds down:
/// 80% of 3 questions is 2 correct answers.
pub const QUIZ_PASS_PERCENT: usize = 80;

/// Minimum number of correct answers required to pass.
pub const QUIZ_PASS_SCORE: u8 = (QUIZ_QUESTION_COUNT * QUIZ_PASS_PERCENT / 100) as u8;

/// Required file extension for policy documents.
pub const POLICY_EXTENSION: &str = ".txt";

/// Maximum length of a policy name in bytes.
pub const MAX_POLICY_NAME_LENGTH: usize = 255;

/// Maximum size of a policy document body (2 MiB).
pub const MAX_POLICY_BYTES: usize = 2 * 1024 * 1024;

/// Lower bound of the summary length window, in tokens.
pub const SUMMARY_MIN_TOKENS: usize = 30;

/// Upper bound of the summary length window, in tokens.
pub const SUMMARY_MAX_TOKENS: usize = 120;

/// Longest document prefix sent to a summarization model, in characters.
pub const MAX_SUMMARY_INPUT_CHARS: usize = 4000;

/// Prefix of the placeholder used when summarization fails.
pub const SUMMARY_ERROR_PREFIX: &str = "Error generating summary";

/// Storage format for assignment and audit timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Storage format for due dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";
