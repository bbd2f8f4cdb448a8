use crate::errors::ConfigError;
use crate::models::DEFAULT_GOAL;
use chrono::Duration;
use std::{env, fmt::Display, path::PathBuf, str::FromStr};
use tracing::info;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_path: PathBuf,
    pub default_goal: u32,
    pub session_ttl: Duration,
    pub max_failed_logins: u32,
    pub lockout: Duration,
    pub expose_tokens: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            data_path: PathBuf::from("data/state.json"),
            default_goal: DEFAULT_GOAL,
            session_ttl: Duration::days(7),
            max_failed_logins: 5,
            lockout: Duration::seconds(60),
            expose_tokens: false,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let ttl_secs: i64 = try_load(&lookup, "APP_SESSION_TTL_SECS", defaults.session_ttl.num_seconds())?;
        let lockout_secs: i64 = try_load(&lookup, "APP_LOCKOUT_SECS", defaults.lockout.num_seconds())?;
        let default_goal: u32 = try_load(&lookup, "APP_DEFAULT_GOAL", defaults.default_goal)?;
        if default_goal == 0 {
            return Err(ConfigError::Invalid {
                key: "APP_DEFAULT_GOAL",
                reason: "goal must be at least 1".into(),
            });
        }

        Ok(Self {
            port: try_load(&lookup, "PORT", defaults.port)?,
            data_path: lookup("APP_DATA_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_path),
            default_goal,
            session_ttl: Duration::seconds(ttl_secs.max(1)),
            max_failed_logins: try_load(&lookup, "APP_MAX_FAILED_LOGINS", defaults.max_failed_logins)?,
            lockout: Duration::seconds(lockout_secs.max(0)),
            expose_tokens: lookup("APP_EXPOSE_TOKENS")
                .map(|value| matches!(value.trim(), "1" | "true" | "yes"))
                .unwrap_or(false),
        })
    }
}

fn try_load<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr + Display,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
        None => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_set() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.data_path, PathBuf::from("data/state.json"));
        assert_eq!(config.default_goal, 8);
        assert!(!config.expose_tokens);
    }

    #[test]
    fn reads_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("PORT", "9000"),
            ("APP_DATA_PATH", "/tmp/water.json"),
            ("APP_MAX_FAILED_LOGINS", "3"),
            ("APP_EXPOSE_TOKENS", "true"),
        ]))
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.data_path, PathBuf::from("/tmp/water.json"));
        assert_eq!(config.max_failed_logins, 3);
        assert!(config.expose_tokens);
    }

    #[test]
    fn rejects_garbage_port() {
        let err = Config::from_lookup(lookup_from(&[("PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn rejects_zero_goal() {
        assert!(Config::from_lookup(lookup_from(&[("APP_DEFAULT_GOAL", "0")])).is_err());
    }
}
