use crate::core::error::{Result, UsageError};

pub const API_KEY_VAR: &str = "OPENAI_API_KEY";

/// Read the OpenAI API key from the environment.
pub fn read_api_key() -> Result<String> {
    read_key_from(API_KEY_VAR)
}

fn read_key_from(var: &'static str) -> Result<String> {
    match std::env::var(var) {
        Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
        _ => Err(UsageError::MissingCredential(var)),
    }
}
