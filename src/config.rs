//! Startup configuration resolved from the environment.
//!
//! Configuration is loaded exactly once at process start via
//! [`Settings::from_env`] and passed by reference into the components that
//! need it. There is no global singleton and no import-time validation;
//! construction either returns a validated `Settings` or an error.

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Environment variable naming the backend base URL.
pub const BASE_URL_VAR: &str = "RAGLINE_BASE_URL";
/// Environment variable carrying the backend API key.
pub const API_KEY_VAR: &str = "RAGLINE_API_KEY";
/// Environment variable naming the flow/model id for the responses endpoint.
pub const FLOW_ID_VAR: &str = "RAGLINE_FLOW_ID";
/// Optional API key for the secondary image-generation provider.
pub const EVERART_API_KEY_VAR: &str = "EVERART_API_KEY";
/// Optional vector-database endpoint.
pub const ASTRA_DB_ENDPOINT_VAR: &str = "ASTRA_DB_ENDPOINT";
/// Optional vector-database application token.
pub const ASTRA_DB_TOKEN_VAR: &str = "ASTRA_DB_APPLICATION_TOKEN";

/// Base URL used when RAGLINE_BASE_URL is not set.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Resolved process configuration.
///
/// All values are passthrough configuration for the backend and secondary
/// services; validation is presence plus a URL sanity parse on the base URL.
#[derive(Clone, Debug)]
pub struct Settings {
    /// Backend base URL.
    pub base_url: String,
    /// Backend API key, if already provisioned.
    pub api_key: Option<String>,
    /// Flow/model id for the OpenAI-compatible responses endpoint.
    pub flow_id: Option<String>,
    /// Image-generation provider key (passthrough, unused by this crate).
    pub everart_api_key: Option<String>,
    /// Vector-database endpoint (passthrough, unused by this crate).
    pub astra_db_endpoint: Option<String>,
    /// Vector-database token (passthrough, unused by this crate).
    pub astra_db_token: Option<String>,
    /// Path of the `.env` file that was loaded, if one was found.
    env_path: Option<PathBuf>,
}

impl Settings {
    /// Loads settings from the environment, reading a `.env` file first if
    /// one exists in the current directory or any parent.
    pub fn from_env() -> Result<Self> {
        let env_path = dotenvy::dotenv().ok();
        Self::from_vars(env_path)
    }

    fn from_vars(env_path: Option<PathBuf>) -> Result<Self> {
        let base_url = env::var(BASE_URL_VAR).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        if base_url.is_empty() {
            return Err(Error::configuration(
                "backend base URL must not be empty",
                Some(BASE_URL_VAR.to_string()),
            ));
        }
        url::Url::parse(&base_url).map_err(|err| {
            Error::configuration(
                format!("backend base URL is not a valid URL: {err}"),
                Some(BASE_URL_VAR.to_string()),
            )
        })?;

        Ok(Settings {
            base_url,
            api_key: non_empty_var(API_KEY_VAR),
            flow_id: non_empty_var(FLOW_ID_VAR),
            everart_api_key: non_empty_var(EVERART_API_KEY_VAR),
            astra_db_endpoint: non_empty_var(ASTRA_DB_ENDPOINT_VAR),
            astra_db_token: non_empty_var(ASTRA_DB_TOKEN_VAR),
            env_path,
        })
    }

    /// Returns the API key or a configuration error naming the variable.
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            Error::configuration(
                "API key must be set in the environment or .env file",
                Some(API_KEY_VAR.to_string()),
            )
        })
    }

    /// Path of the `.env` file loaded at startup, if any. Used to persist an
    /// auto-provisioned API key back to the same file.
    pub fn env_path(&self) -> Option<&Path> {
        self.env_path.as_deref()
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Settings(")?;
        writeln!(f, "  base_url={},", self.base_url)?;
        writeln!(f, "  api_key={},", redact(&self.api_key))?;
        writeln!(f, "  flow_id={},", describe(&self.flow_id))?;
        writeln!(f, "  everart_api_key={},", redact(&self.everart_api_key))?;
        writeln!(f, "  astra_db_endpoint={},", redact(&self.astra_db_endpoint))?;
        writeln!(f, "  astra_db_token={}", redact(&self.astra_db_token))?;
        write!(f, ")")
    }
}

fn redact(value: &Option<String>) -> &'static str {
    if value.is_some() { "***" } else { "NOT SET" }
}

fn describe(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("NOT SET")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_redacts_secrets() {
        let settings = Settings {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: Some("sk-secret".to_string()),
            flow_id: None,
            everart_api_key: None,
            astra_db_endpoint: Some("https://db.example.com".to_string()),
            astra_db_token: Some("token".to_string()),
            env_path: None,
        };
        let shown = settings.to_string();
        assert!(!shown.contains("sk-secret"));
        assert!(!shown.contains("token"));
        assert!(shown.contains("***"));
        assert!(shown.contains(DEFAULT_BASE_URL));
    }

    #[test]
    fn require_api_key_names_the_variable() {
        let settings = Settings {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            flow_id: None,
            everart_api_key: None,
            astra_db_endpoint: None,
            astra_db_token: None,
            env_path: None,
        };
        let err = settings.require_api_key().unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains(API_KEY_VAR));
    }
}
