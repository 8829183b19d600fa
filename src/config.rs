//! Runtime configuration
//!
//! The bind address comes from the first command line argument, then
//! `ROOM_CHAT_ADDR`. Everything else is read from `ROOM_CHAT_*`
//! environment variables with defaults suitable for local use.

use std::env;
use std::time::Duration;

use crate::error::AppError;
use crate::names::NameScheme;

/// Default server address
pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";

/// Default per-client outbound channel capacity
pub const DEFAULT_OUTBOUND_BUFFER: usize = 32;

const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_millis(1000);
const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone)]
pub struct Config {
    /// Address the listener binds to
    pub addr: String,
    /// Display name generation scheme
    pub name_scheme: NameScheme,
    /// Capacity of each client's outbound channel
    pub outbound_buffer: usize,
    /// How long a broadcast waits on a full client channel
    pub send_timeout: Duration,
    /// How long a single socket write may take
    pub write_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            name_scheme: NameScheme::default(),
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }
}

impl Config {
    /// Load from process arguments and environment
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(env::args().nth(1), |key| env::var(key).ok())
    }

    /// Load from an explicit address argument and variable lookup
    pub fn from_lookup<F>(arg_addr: Option<String>, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let addr = arg_addr
            .or_else(|| lookup("ROOM_CHAT_ADDR"))
            .unwrap_or(defaults.addr);

        let name_scheme = match lookup("ROOM_CHAT_NAME_SCHEME") {
            Some(value) => value.parse()?,
            None => defaults.name_scheme,
        };

        let outbound_buffer = match lookup("ROOM_CHAT_OUTBOUND_BUFFER") {
            Some(value) => match value.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(AppError::Config(format!(
                        "ROOM_CHAT_OUTBOUND_BUFFER must be a positive integer, got '{}'",
                        value
                    )))
                }
            },
            None => defaults.outbound_buffer,
        };

        let send_timeout = parse_millis(&lookup, "ROOM_CHAT_SEND_TIMEOUT_MS")?
            .unwrap_or(defaults.send_timeout);
        let write_timeout = parse_millis(&lookup, "ROOM_CHAT_WRITE_TIMEOUT_MS")?
            .unwrap_or(defaults.write_timeout);

        Ok(Self {
            addr,
            name_scheme,
            outbound_buffer,
            send_timeout,
            write_timeout,
        })
    }
}

fn parse_millis<F>(lookup: &F, key: &str) -> Result<Option<Duration>, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| {
            value
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| AppError::Config(format!("{} must be milliseconds, got '{}'", key, value)))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(None, lookup(&[])).unwrap();
        assert_eq!(config.addr, DEFAULT_ADDR);
        assert_eq!(config.name_scheme, NameScheme::Creature);
        assert_eq!(config.outbound_buffer, DEFAULT_OUTBOUND_BUFFER);
    }

    #[test]
    fn test_argument_wins_over_env() {
        let config = Config::from_lookup(
            Some("0.0.0.0:9000".to_string()),
            lookup(&[("ROOM_CHAT_ADDR", "127.0.0.1:1")]),
        )
        .unwrap();
        assert_eq!(config.addr, "0.0.0.0:9000");
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::from_lookup(
            None,
            lookup(&[
                ("ROOM_CHAT_NAME_SCHEME", "counter"),
                ("ROOM_CHAT_SEND_TIMEOUT_MS", "250"),
                ("ROOM_CHAT_OUTBOUND_BUFFER", "8"),
            ]),
        )
        .unwrap();
        assert_eq!(config.name_scheme, NameScheme::Counter);
        assert_eq!(config.send_timeout, Duration::from_millis(250));
        assert_eq!(config.outbound_buffer, 8);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            Config::from_lookup(None, lookup(&[("ROOM_CHAT_OUTBOUND_BUFFER", "0")])),
            Err(AppError::Config(_))
        ));
        assert!(matches!(
            Config::from_lookup(None, lookup(&[("ROOM_CHAT_WRITE_TIMEOUT_MS", "soon")])),
            Err(AppError::Config(_))
        ));
    }
}
