use std::path::PathBuf;

use anyhow::{Context, Result};

/// Runtime configuration for the authorizer.
#[derive(Clone, Debug)]
pub struct AuthorizerConfig {
    /// Filesystem path of the sled delegation store
    pub db_path: PathBuf,
    /// Deny evaluations with no delegation on file
    pub strict: bool,
}

impl AuthorizerConfig {
    /// Read configuration from `ADP_DB` and `ADP_STRICT`.
    pub fn from_env() -> Result<Self> {
        let db_path = std::env::var("ADP_DB").context("ADP_DB is required")?;

        let strict = std::env::var("ADP_STRICT")
            .map(|value| {
                let value = value.to_ascii_lowercase();
                !(value.is_empty() || value == "0" || value == "false")
            })
            .unwrap_or(false);

        Ok(AuthorizerConfig {
            db_path: PathBuf::from(db_path),
            strict,
        })
    }
}
