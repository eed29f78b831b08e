//! # Summarizer
//!
//! Document summaries come from a model behind the `Summarizer` trait.
//! Failures never propagate: `summarize_or_placeholder` substitutes an error
//! string as the summary. There is no retry and no fallback model.

use crate::AttestError;
use crate::primitives::{
    MAX_SUMMARY_INPUT_CHARS, SUMMARY_ERROR_PREFIX, SUMMARY_MAX_TOKENS, SUMMARY_MIN_TOKENS,
};
use serde::{Deserialize, Serialize};

/// Fixed generation parameters sent to every model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryParams {
    pub min_length: usize,
    pub max_length: usize,
    /// Always `false`: greedy decoding.
    pub do_sample: bool,
}

impl Default for SummaryParams {
    fn default() -> Self {
        Self {
            min_length: SUMMARY_MIN_TOKENS,
            max_length: SUMMARY_MAX_TOKENS,
            do_sample: false,
        }
    }
}

/// A text-summarization model.
///
/// Implementations are blocking; async callers run them on a blocking thread.
pub trait Summarizer: Send + Sync {
    /// Short backend label for logs.
    fn backend(&self) -> &'static str;

    /// Summarize `text` within the token window of `params`.
    fn summarize(&self, text: &str, params: &SummaryParams) -> Result<String, AttestError>;
}

/// A summary as displayed: either the model output or the error placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub text: String,
    pub failed: bool,
}

/// Run `summarizer`, replacing any failure with a placeholder summary.
pub fn summarize_or_placeholder(summarizer: &dyn Summarizer, text: &str) -> Summary {
    let result = if text.trim().is_empty() {
        Err(AttestError::Summary("document is empty".to_string()))
    } else {
        summarizer.summarize(truncate_chars(text, MAX_SUMMARY_INPUT_CHARS), &SummaryParams::default())
    };
    match result {
        Ok(text) => Summary {
            text,
            failed: false,
        },
        Err(e) => Summary {
            text: format!("{}: {}", SUMMARY_ERROR_PREFIX, e),
            failed: true,
        },
    }
}

/// The longest prefix of `text` with at most `max_chars` characters.
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

/// Local extractive summarizer: the document's leading sentences.
///
/// Takes whole sentences until at least `min_length` words are collected,
/// never exceeding `max_length` words. A sentence that would overflow the
/// window is cut at `max_length` words.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeadSentenceSummarizer;

impl LeadSentenceSummarizer {
    fn sentences(text: &str) -> Vec<Vec<&str>> {
        let mut sentences = Vec::new();
        let mut current = Vec::new();
        for word in text.split_whitespace() {
            current.push(word);
            if word.ends_with(['.', '!', '?']) {
                sentences.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            sentences.push(current);
        }
        sentences
    }
}

impl Summarizer for LeadSentenceSummarizer {
    fn backend(&self) -> &'static str {
        "lead"
    }

    fn summarize(&self, text: &str, params: &SummaryParams) -> Result<String, AttestError> {
        let mut words: Vec<&str> = Vec::new();
        for sentence in Self::sentences(text) {
            if words.len() >= params.min_length {
                break;
            }
            if words.len() + sentence.len() > params.max_length {
                let room = params.max_length.saturating_sub(words.len());
                words.extend(sentence.into_iter().take(room));
                break;
            }
            words.extend(sentence);
        }
        if words.is_empty() {
            return Err(AttestError::Summary("no text to summarize".to_string()));
        }
        Ok(words.join(" "))
    }
}
