pub mod aggregate;
pub mod auth;
pub mod config;
pub mod dates;
pub mod error;
pub mod export;
pub mod fetcher;
pub mod formatter;
pub mod models;
#[cfg(test)]
pub mod test_env;
