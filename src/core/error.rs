use thiserror::Error;

#[derive(Error, Debug)]
pub enum UsageError {
    #[error("Invalid date '{input}'. Expected format: {encoding}")]
    DateFormat { input: String, encoding: String },
    #[error("Environment variable {0} is not defined")]
    MissingCredential(&'static str),
    #[error("Still rate limited for {date} after {attempts} attempts")]
    RateLimitExhausted { date: String, attempts: u32 },
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP {status} for {date}: {body}")]
    Status {
        date: String,
        status: u16,
        body: String,
    },
    #[error("Malformed usage response for {date}: {source}")]
    Decode {
        date: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Endpoint must use HTTPS, got: {0}")]
    InsecureEndpoint(String),
    #[error("Failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, UsageError>;
