//! Environment-driven configuration.
// region:    --- Imports
use crate::auction::model::Tick;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
// endregion: --- Imports

// region:    --- Config
/// Engine behavior independent of the storage backend.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Unknown bidders get a placeholder user instead of `UnknownReference`.
    pub auto_register_bidders: bool,
    pub initial_clock: Tick,
    /// Capacity of the committed-write broadcast channel.
    pub event_buffer: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            auto_register_bidders: true,
            initial_clock: 0,
            event_buffer: 1024,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Absent means the in-memory store.
    pub database_url: Option<String>,
    pub bind_addr: SocketAddr,
    pub max_connections: u32,
    pub reset_database: bool,
    pub engine: EngineConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            max_connections: 5,
            reset_database: false,
            engine: EngineConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let engine = EngineConfig {
            auto_register_bidders: parse_or(
                &lookup,
                "AUTO_REGISTER_BIDDERS",
                defaults.engine.auto_register_bidders,
            )?,
            initial_clock: parse_or(&lookup, "CLOCK_START", defaults.engine.initial_clock)?,
            event_buffer: parse_or(&lookup, "EVENT_BUFFER", defaults.engine.event_buffer)?,
        };
        if engine.event_buffer == 0 {
            return Err(ConfigError::Invalid {
                key: "EVENT_BUFFER",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            bind_addr: parse_or(&lookup, "BIND_ADDR", defaults.bind_addr)?,
            max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", defaults.max_connections)?,
            reset_database: parse_or(&lookup, "RESET_DATABASE", defaults.reset_database)?,
            engine,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}
// endregion: --- Config

// region:    --- ConfigError
#[derive(Debug)]
pub enum ConfigError {
    Invalid { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Invalid { key, value } => write!(f, "invalid value for {key}: {value:?}"),
        }
    }
}

impl std::error::Error for ConfigError {}
// endregion: --- ConfigError
