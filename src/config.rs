//! Environment-driven configuration

use crate::engine::{default_model, SamplingParams};
use crate::session::SessionConfig;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_ENGINE_URL: &str = "http://127.0.0.1:8080/v1";
pub const STARTUP_PERSONA_NAME: &str = "宝宝";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

/// A variable was set but could not be parsed
#[derive(Debug, Error)]
#[error("invalid value {value:?} for {var}: {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub reason: String,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Base URL of the `OpenAI`-compatible engine server
    pub engine_url: String,
    pub engine_api_key: Option<String>,
    /// Model id loaded at startup
    pub model: String,
    pub persona_name: String,
    /// Transcript files imported as training data, in order
    pub training_files: Vec<PathBuf>,
    pub sampling: SamplingParams,
    pub load_timeout: Option<Duration>,
    pub request_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engine_url: DEFAULT_ENGINE_URL.to_string(),
            engine_api_key: None,
            model: default_model().id.to_string(),
            persona_name: STARTUP_PERSONA_NAME.to_string(),
            training_files: Vec::new(),
            sampling: SamplingParams::default(),
            load_timeout: Some(SessionConfig::DEFAULT_LOAD_TIMEOUT),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl AppConfig {
    /// Read configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] naming the first variable that is set but
    /// malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source. Blank values count as unset.
    ///
    /// # Errors
    ///
    /// Same as [`Self::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let load_timeout = match parse::<u64>(&get, "PERSONA_LOAD_TIMEOUT_SECS")? {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => defaults.load_timeout,
        };

        Ok(Self {
            engine_url: get("PERSONA_ENGINE_URL").unwrap_or(defaults.engine_url),
            engine_api_key: get("PERSONA_ENGINE_API_KEY"),
            model: get("PERSONA_MODEL")
                .map(|m| m.trim().to_string())
                .unwrap_or(defaults.model),
            persona_name: get("PERSONA_NAME").unwrap_or(defaults.persona_name),
            training_files: get("PERSONA_TRAINING_FILES")
                .map(|paths| std::env::split_paths(&paths).collect())
                .unwrap_or_default(),
            sampling: SamplingParams {
                temperature: parse_temperature(&get)?.unwrap_or(defaults.sampling.temperature),
                max_tokens: parse(&get, "PERSONA_MAX_TOKENS")?
                    .unwrap_or(defaults.sampling.max_tokens),
            },
            load_timeout,
            request_timeout: parse(&get, "PERSONA_REQUEST_TIMEOUT_SECS")?
                .map_or(defaults.request_timeout, Duration::from_secs),
        })
    }

    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            sampling: self.sampling,
            load_timeout: self.load_timeout,
        }
    }
}

fn parse_temperature(get: &impl Fn(&str) -> Option<String>) -> Result<Option<f32>, ConfigError> {
    const VAR: &str = "PERSONA_TEMPERATURE";
    match parse::<f32>(get, VAR)? {
        Some(t) if !t.is_finite() || t < 0.0 => Err(ConfigError {
            var: VAR,
            value: t.to_string(),
            reason: "must be a finite, non-negative number".to_string(),
        }),
        temperature => Ok(temperature),
    }
}

fn parse<T>(get: &impl Fn(&str) -> Option<String>, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get(var)
        .map(|value| {
            value.trim().parse().map_err(|e: T::Err| ConfigError {
                var,
                reason: e.to_string(),
                value,
            })
        })
        .transpose()
}
