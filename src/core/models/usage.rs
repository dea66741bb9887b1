use serde::{Deserialize, Serialize};
use std::ops::AddAssign;

/// One record of a day's usage response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageEntry {
    pub snapshot_id: String,
    /// Prompt (input) tokens billed
    #[serde(rename = "n_context_tokens_total")]
    pub prompt_tokens: u64,
    /// Completion (output) tokens billed
    #[serde(rename = "n_generated_tokens_total")]
    pub completion_tokens: u64,
}

/// Body of `GET /v1/usage?date=...`. Only `data` is read.
#[derive(Debug, Deserialize)]
pub struct UsageResponse {
    pub data: Vec<UsageEntry>,
}

/// All entries fetched for one calendar day.
#[derive(Debug, Clone)]
pub struct DayUsage {
    /// The date as sent to the server, formatted with the user's encoding
    pub label: String,
    pub entries: Vec<UsageEntry>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenPair {
    #[serde(rename = "prompt_tokens")]
    pub prompt: u64,
    #[serde(rename = "completion_tokens")]
    pub completion: u64,
}

impl TokenPair {
    pub fn new(prompt: u64, completion: u64) -> Self {
        Self { prompt, completion }
    }
}

impl AddAssign for TokenPair {
    fn add_assign(&mut self, rhs: Self) {
        self.prompt += rhs.prompt;
        self.completion += rhs.completion;
    }
}

impl From<&UsageEntry> for TokenPair {
    fn from(entry: &UsageEntry) -> Self {
        Self::new(entry.prompt_tokens, entry.completion_tokens)
    }
}
