use std::env;
use std::time::Duration;

use crate::errors::RelayError;

const DEFAULT_API_TIMEOUT_SECS: u64 = 60;
const DEFAULT_STREAM_UPDATE_INTERVAL_MS: u64 = 1000;
const DEFAULT_STREAM_COMMAND_NAME: &str = "stream";
const DEFAULT_ELYSIA_COMMAND_NAME: &str = "elysia";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub discord_token: String,
    pub guild_id: Option<u64>,
    pub api_endpoint: String,
    pub api_key: String,
    pub api_timeout: Duration,
    pub stream_api_endpoint: Option<String>,
    pub stream_command_name: String,
    pub elysia_api_endpoint: Option<String>,
    pub elysia_api_key: String,
    pub elysia_command_name: String,
    pub stream_update_interval: Duration,
    pub unregister_commands_on_shutdown: bool,
}

impl AppConfig {
    /// Reads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `RelayError::ConfigError` when a required key is missing or a value is malformed.
    pub fn from_env() -> Result<Self, RelayError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. Blank values count as unset.
    ///
    /// # Errors
    ///
    /// Returns `RelayError::ConfigError` when a required key is missing or a value is malformed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RelayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require = |key: &str| {
            get(key).ok_or_else(|| RelayError::ConfigError(format!("{key} is required")))
        };

        let guild_id = get("DISCORD_GUILD_ID")
            .map(|raw| {
                raw.parse::<u64>().map_err(|e| {
                    RelayError::ConfigError(format!("DISCORD_GUILD_ID: {}", e))
                })
            })
            .transpose()?;

        let api_timeout_secs = parse_u64(
            "API_TIMEOUT",
            get("API_TIMEOUT"),
            DEFAULT_API_TIMEOUT_SECS,
        )?;
        let stream_interval_ms = parse_u64(
            "STREAM_UPDATE_INTERVAL_MS",
            get("STREAM_UPDATE_INTERVAL_MS"),
            DEFAULT_STREAM_UPDATE_INTERVAL_MS,
        )?;
        if stream_interval_ms == 0 {
            return Err(RelayError::ConfigError(
                "STREAM_UPDATE_INTERVAL_MS must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            discord_token: require("DISCORD_TOKEN")?,
            guild_id,
            api_endpoint: require("API_ENDPOINT")?,
            api_key: get("API_KEY").unwrap_or_default(),
            api_timeout: Duration::from_secs(api_timeout_secs),
            stream_api_endpoint: get("STREAM_API_ENDPOINT"),
            stream_command_name: get("STREAM_COMMAND_NAME")
                .unwrap_or_else(|| DEFAULT_STREAM_COMMAND_NAME.to_string()),
            elysia_api_endpoint: get("ELYSIA_API_ENDPOINT"),
            elysia_api_key: get("ELYSIA_API_KEY").unwrap_or_default(),
            elysia_command_name: get("ELYSIA_COMMAND_NAME")
                .unwrap_or_else(|| DEFAULT_ELYSIA_COMMAND_NAME.to_string()),
            stream_update_interval: Duration::from_millis(stream_interval_ms),
            unregister_commands_on_shutdown: parse_bool(
                "UNREGISTER_COMMANDS_ON_SHUTDOWN",
                get("UNREGISTER_COMMANDS_ON_SHUTDOWN"),
                true,
            )?,
        })
    }
}

fn parse_u64(key: &str, raw: Option<String>, default: u64) -> Result<u64, RelayError> {
    match raw {
        None => Ok(default),
        Some(v) => v
            .parse::<u64>()
            .map_err(|e| RelayError::ConfigError(format!("{key}: {e}"))),
    }
}

fn parse_bool(key: &str, raw: Option<String>, default: bool) -> Result<bool, RelayError> {
    let Some(v) = raw else {
        return Ok(default);
    };
    match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(RelayError::ConfigError(format!(
            "{key}: expected a boolean, got '{other}'"
        ))),
    }
}
