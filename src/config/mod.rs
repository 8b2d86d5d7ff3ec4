//! Application settings.
//!
//! Every field has a default, so a partial JSON document or a bare
//! environment is enough:
//!
//! ```
//! use weft::Config;
//!
//! let config = Config::from_json(r#"{ "development": true }"#).unwrap();
//! assert!(config.development);
//! assert_eq!(config.write_buffer, 4096);
//! ```

use serde::Deserialize;
use thiserror::Error;

/// Default template flush threshold in bytes.
pub const DEFAULT_WRITE_BUFFER: usize = 4096;

/// Default cap on a buffered request (8 MiB).
pub const DEFAULT_MAX_REQUEST_SIZE: usize = 8 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid value {value:?} for {var}")]
    Env { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Reveal fault details (private messages, error chains) in responses.
    pub development: bool,
    /// Honor `X-Forwarded-Proto` and `X-Forwarded-Host`.
    pub trust_proxy: bool,
    /// Bytes of template output buffered before a write to the client.
    pub write_buffer: usize,
    /// Largest request head plus body accepted before answering 413.
    pub max_request_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            development: false,
            trust_proxy: false,
            write_buffer: DEFAULT_WRITE_BUFFER,
            max_request_size: DEFAULT_MAX_REQUEST_SIZE,
        }
    }
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads settings from the process environment:
    ///
    /// | Variable                | Field              |
    /// |-------------------------|--------------------|
    /// | `WEFT_ENV`              | `development` when `development` |
    /// | `WEFT_TRUST_PROXY`      | `trust_proxy`      |
    /// | `WEFT_WRITE_BUFFER`     | `write_buffer`     |
    /// | `WEFT_MAX_REQUEST_SIZE` | `max_request_size` |
    ///
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(env) = lookup("WEFT_ENV") {
            config.development = env.eq_ignore_ascii_case("development");
        }
        if let Some(value) = lookup("WEFT_TRUST_PROXY") {
            config.trust_proxy = parse_flag("WEFT_TRUST_PROXY", value)?;
        }
        if let Some(value) = lookup("WEFT_WRITE_BUFFER") {
            config.write_buffer = parse_size("WEFT_WRITE_BUFFER", value)?;
        }
        if let Some(value) = lookup("WEFT_MAX_REQUEST_SIZE") {
            config.max_request_size = parse_size("WEFT_MAX_REQUEST_SIZE", value)?;
        }

        Ok(config)
    }
}

fn parse_flag(var: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::Env { var, value }),
    }
}

fn parse_size(var: &'static str, value: String) -> Result<usize, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Env { var, value })
}
