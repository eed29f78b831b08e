//! # HTTP Inference Summarizer
//!
//! Calls a hosted summarization model:
//!
//! ```text
//! POST <url>
//! {"inputs": "...", "parameters": {"min_length": 30, "max_length": 120, "do_sample": false}}
//!
//! 200 [{"summary_text": "..."}]
//! ```

use super::block_on;
use attest_core::{AttestError, Summarizer, SummaryParams};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    parameters: &'a SummaryParams,
}

#[derive(Debug, Deserialize)]
struct InferenceOutput {
    summary_text: String,
}

/// Summaries from a remote inference endpoint.
pub struct InferenceSummarizer {
    http: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl std::fmt::Debug for InferenceSummarizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceSummarizer")
            .field("url", &self.url)
            .field("authenticated", &self.token.is_some())
            .finish_non_exhaustive()
    }
}

impl InferenceSummarizer {
    pub fn new(url: String, token: Option<String>, timeout: Duration) -> Result<Self, AttestError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AttestError::Summary(e.to_string()))?;
        Ok(Self { http, url, token })
    }

    async fn summarize_async(
        &self,
        text: &str,
        params: &SummaryParams,
    ) -> Result<String, AttestError> {
        let mut request = self.http.post(&self.url).json(&InferenceRequest {
            inputs: text,
            parameters: params,
        });
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AttestError::Summary(format!("cannot reach {}: {}", self.url, e)))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AttestError::Summary(format!(
                "model returned {}: {}",
                status,
                body.trim()
            )));
        }
        let body = response
            .text()
            .await
            .map_err(|e| AttestError::Summary(e.to_string()))?;
        parse_output(&body)
    }
}

/// Extract the first `summary_text` from a response body.
pub fn parse_output(body: &str) -> Result<String, AttestError> {
    let outputs: Vec<InferenceOutput> = serde_json::from_str(body)
        .map_err(|e| AttestError::Summary(format!("unexpected response: {}", e)))?;
    outputs
        .into_iter()
        .next()
        .map(|o| o.summary_text.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AttestError::Summary("model returned no summary".to_string()))
}

impl Summarizer for InferenceSummarizer {
    fn backend(&self) -> &'static str {
        "inference"
    }

    fn summarize(&self, text: &str, params: &SummaryParams) -> Result<String, AttestError> {
        block_on(self.summarize_async(text, params), AttestError::Summary)?
    }
}
