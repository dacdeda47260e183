//! Chat hub configuration.
//!
//! Configuration is loaded from environment variables. All sensitive
//! fields are redacted in Debug output.

use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default HTTP/WebSocket bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default public room. Every registered session receives its frames.
pub const DEFAULT_PUBLIC_ROOM: &str = "general";

/// Default maximum inbound frame size in bytes (64 KiB).
pub const DEFAULT_MAX_FRAME_BYTES: usize = 64 * 1024;

/// Default maximum content length in characters before truncation.
pub const DEFAULT_MAX_CONTENT_CHARS: usize = 4000;

/// Default per-connection outbound mailbox size.
pub const DEFAULT_OUTBOUND_BUFFER: usize = 256;

/// Default period of the scheduled-delivery and expiry sweeps.
pub const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 5;

/// Chat hub configuration.
#[derive(Clone)]
pub struct Config {
    /// HTTP/WebSocket bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Unique identifier for this hub instance, used in logs.
    pub hub_id: String,

    /// HS256 secret used to verify identity tokens.
    pub jwt_secret: SecretString,

    /// Tolerance for `iat` claims in the future.
    pub jwt_clock_skew: Duration,

    /// Room id of the public, open-to-all room.
    pub public_room: String,

    /// Inbound frames larger than this are dropped before parsing.
    pub max_frame_bytes: usize,

    /// Content text longer than this is truncated.
    pub max_content_chars: usize,

    /// Outbound mailbox capacity per connection.
    pub outbound_buffer: usize,

    /// Period of the background sweeps.
    pub sweep_interval: Duration,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("hub_id", &self.hub_id)
            .field("jwt_secret", &"[REDACTED]")
            .field("jwt_clock_skew", &self.jwt_clock_skew)
            .field("public_room", &self.public_room)
            .field("max_frame_bytes", &self.max_frame_bytes)
            .field("max_content_chars", &self.max_content_chars)
            .field("outbound_buffer", &self.outbound_buffer)
            .field("sweep_interval", &self.sweep_interval)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let jwt_secret = vars
            .get("HUB_JWT_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("HUB_JWT_SECRET".to_string()))?;
        let jwt_secret = SecretString::from(jwt_secret.clone());

        let bind_address = vars
            .get("HUB_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let hub_id = vars
            .get("HUB_ID")
            .cloned()
            .unwrap_or_else(|| format!("hub-{}", uuid::Uuid::new_v4()));

        let jwt_clock_skew = match vars.get("JWT_CLOCK_SKEW_SECONDS") {
            Some(value) => {
                let seconds: u64 = value.parse().map_err(|e| {
                    ConfigError::InvalidValue(format!(
                        "JWT_CLOCK_SKEW_SECONDS must be a positive integer: {e}"
                    ))
                })?;
                if seconds == 0 || seconds > MAX_CLOCK_SKEW.as_secs() {
                    return Err(ConfigError::InvalidValue(format!(
                        "JWT_CLOCK_SKEW_SECONDS must be between 1 and {}, got {seconds}",
                        MAX_CLOCK_SKEW.as_secs()
                    )));
                }
                Duration::from_secs(seconds)
            }
            None => DEFAULT_CLOCK_SKEW,
        };

        let public_room = vars
            .get("HUB_PUBLIC_ROOM")
            .filter(|s| !s.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| DEFAULT_PUBLIC_ROOM.to_string());

        let max_frame_bytes =
            parse_positive(vars, "HUB_MAX_FRAME_BYTES", DEFAULT_MAX_FRAME_BYTES)?;
        let max_content_chars =
            parse_positive(vars, "HUB_MAX_CONTENT_CHARS", DEFAULT_MAX_CONTENT_CHARS)?;
        let outbound_buffer = parse_positive(vars, "HUB_OUTBOUND_BUFFER", DEFAULT_OUTBOUND_BUFFER)?;
        let sweep_interval_seconds = parse_positive(
            vars,
            "HUB_SWEEP_INTERVAL_SECONDS",
            DEFAULT_SWEEP_INTERVAL_SECONDS,
        )?;

        Ok(Config {
            bind_address,
            hub_id,
            jwt_secret,
            jwt_clock_skew,
            public_room,
            max_frame_bytes,
            max_content_chars,
            outbound_buffer,
            sweep_interval: Duration::from_secs(sweep_interval_seconds),
        })
    }
}

fn parse_positive<T>(
    vars: &HashMap<String, String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    match vars.get(key) {
        Some(value) => match value.parse::<T>() {
            Ok(parsed) if parsed > T::default() => Ok(parsed),
            _ => Err(ConfigError::InvalidValue(format!(
                "{key} must be a positive integer, got '{value}'"
            ))),
        },
        None => Ok(default),
    }
}
