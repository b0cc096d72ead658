//! Room Coordinator configuration.
//!
//! Configuration is loaded from `RC_*` environment variables. Every field
//! has a default; a variable that is present but unparsable is an error.

use crate::admission::{AdmissionPolicy, HostDeparturePolicy, HostlessPolicy};

use common::config::{LogFormat, ObservabilityConfig};
use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default signaling (HTTP + WebSocket) bind address.
pub const DEFAULT_SIGNALING_BIND_ADDRESS: &str = "0.0.0.0:3000";

/// Default health endpoint bind address.
pub const DEFAULT_HEALTH_BIND_ADDRESS: &str = "0.0.0.0:8081";

/// Default pending-entry timeout in seconds. Zero disables expiry.
pub const DEFAULT_PENDING_ENTRY_TIMEOUT_SECONDS: u64 = 120;

pub const DEFAULT_MAX_ROOMS: usize = 1000;

pub const DEFAULT_MAX_PARTICIPANTS_PER_ROOM: usize = 50;

/// Default maximum chat text length in characters.
pub const DEFAULT_MAX_CHAT_LENGTH: usize = 2000;

/// Default maximum WebSocket frame size in bytes.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Default idle timeout for a socket that sends nothing.
pub const DEFAULT_IDLE_TIMEOUT_SECONDS: u64 = 300;

/// Default instance ID prefix.
pub const DEFAULT_INSTANCE_ID_PREFIX: &str = "rc";

/// Room Coordinator configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Signaling server bind address (default: "0.0.0.0:3000").
    pub signaling_bind_address: String,

    /// Health endpoint bind address (default: "0.0.0.0:8081").
    pub health_bind_address: String,

    /// Unique identifier for this instance, used in logs.
    pub instance_id: String,

    pub hostless_policy: HostlessPolicy,

    pub host_departure_policy: HostDeparturePolicy,

    /// `None` when `RC_PENDING_ENTRY_TIMEOUT_SECONDS=0`.
    pub pending_entry_timeout: Option<Duration>,

    /// Maximum concurrently live rooms.
    pub max_rooms: usize,

    /// Maximum members per room.
    pub max_participants_per_room: usize,

    pub max_chat_length: usize,

    /// Largest WebSocket message accepted, in bytes.
    pub max_message_size: usize,

    /// Close a socket after this long without any client frame.
    pub idle_timeout: Duration,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid configuration value for {var}: {reason}")]
    InvalidValue { var: &'static str, reason: String },
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// `ConfigError::InvalidValue` for any variable that fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    ///
    /// # Errors
    ///
    /// `ConfigError::InvalidValue` for any variable that fails to parse.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let signaling_bind_address = vars
            .get("RC_SIGNALING_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_SIGNALING_BIND_ADDRESS.to_string());

        let health_bind_address = vars
            .get("RC_HEALTH_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_HEALTH_BIND_ADDRESS.to_string());

        let hostless_policy =
            parse_var(vars, "RC_HOSTLESS_POLICY")?.unwrap_or(HostlessPolicy::Grant);

        let host_departure_policy = parse_var(vars, "RC_HOST_DEPARTURE_POLICY")?
            .unwrap_or(HostDeparturePolicy::Hostless);

        let pending_seconds: u64 = parse_var(vars, "RC_PENDING_ENTRY_TIMEOUT_SECONDS")?
            .unwrap_or(DEFAULT_PENDING_ENTRY_TIMEOUT_SECONDS);
        let pending_entry_timeout =
            (pending_seconds > 0).then(|| Duration::from_secs(pending_seconds));

        let max_rooms = parse_positive(vars, "RC_MAX_ROOMS", DEFAULT_MAX_ROOMS)?;
        let max_participants_per_room = parse_positive(
            vars,
            "RC_MAX_PARTICIPANTS_PER_ROOM",
            DEFAULT_MAX_PARTICIPANTS_PER_ROOM,
        )?;
        let max_chat_length =
            parse_positive(vars, "RC_MAX_CHAT_LENGTH", DEFAULT_MAX_CHAT_LENGTH)?;
        let max_message_size =
            parse_positive(vars, "RC_MAX_MESSAGE_SIZE", DEFAULT_MAX_MESSAGE_SIZE)?;

        let idle_seconds: u64 = parse_positive(
            vars,
            "RC_IDLE_TIMEOUT_SECONDS",
            DEFAULT_IDLE_TIMEOUT_SECONDS,
        )?;
        let idle_timeout = Duration::from_secs(idle_seconds);

        if let Some(raw) = vars.get("RC_LOG_FORMAT") {
            if LogFormat::parse(raw).is_none() {
                return Err(ConfigError::InvalidValue {
                    var: "RC_LOG_FORMAT",
                    reason: format!("expected text or json, got {raw:?}"),
                });
            }
        }
        let observability = ObservabilityConfig::from_vars(vars, "RC");

        let instance_id = vars.get("RC_INSTANCE_ID").cloned().unwrap_or_else(|| {
            let hostname = vars
                .get("HOSTNAME")
                .cloned()
                .unwrap_or_else(|| "unknown".to_string());
            let uuid_suffix = uuid::Uuid::new_v4().to_string();
            let short_suffix = uuid_suffix.get(..8).unwrap_or("00000000");
            format!("{DEFAULT_INSTANCE_ID_PREFIX}-{hostname}-{short_suffix}")
        });

        Ok(Config {
            signaling_bind_address,
            health_bind_address,
            instance_id,
            hostless_policy,
            host_departure_policy,
            pending_entry_timeout,
            max_rooms,
            max_participants_per_room,
            max_chat_length,
            max_message_size,
            idle_timeout,
            observability,
        })
    }

    /// Admission settings applied to every room.
    #[must_use]
    pub fn admission_policy(&self) -> AdmissionPolicy {
        AdmissionPolicy {
            hostless: self.hostless_policy,
            host_departure: self.host_departure_policy,
            pending_timeout: self.pending_entry_timeout,
            max_participants: self.max_participants_per_room,
        }
    }
}

fn parse_var<T>(vars: &HashMap<String, String>, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    vars.get(var)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| ConfigError::InvalidValue {
                var,
                reason: e.to_string(),
            })
        })
        .transpose()
}

fn parse_positive<T>(
    vars: &HashMap<String, String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Default,
    T::Err: std::fmt::Display,
{
    match parse_var(vars, var)? {
        Some(value) if value <= T::default() => Err(ConfigError::InvalidValue {
            var,
            reason: "must be greater than zero".to_string(),
        }),
        Some(value) => Ok(value),
        None => Ok(default),
    }
}
