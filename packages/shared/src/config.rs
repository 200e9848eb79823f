use std::{env, fmt::Display, str::FromStr};

use chrono::Duration;
use thiserror::Error;
use tracing::info;

use crate::services::eligibility::DEFAULT_COOLDOWN_SECS;

const DEFAULT_TOKEN_TTL_HOURS: &str = "24";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} environment variable must be set")]
    Missing(String),
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: String, reason: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub users_table: String,
    pub votes_table: String,
    pub jwt_secret: String,
    pub vote_cooldown: Duration,
    pub token_ttl: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup so tests never touch
    /// the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let cooldown_secs: i64 = parse_or_default(
            &lookup,
            "VOTE_COOLDOWN_SECS",
            &DEFAULT_COOLDOWN_SECS.to_string(),
        )?;
        let token_ttl_hours: i64 =
            parse_or_default(&lookup, "TOKEN_TTL_HOURS", DEFAULT_TOKEN_TTL_HOURS)?;

        if cooldown_secs < 0 {
            return Err(ConfigError::Invalid {
                name: "VOTE_COOLDOWN_SECS".to_string(),
                reason: "cooldown cannot be negative".to_string(),
            });
        }
        if token_ttl_hours <= 0 {
            return Err(ConfigError::Invalid {
                name: "TOKEN_TTL_HOURS".to_string(),
                reason: "token lifetime must be positive".to_string(),
            });
        }

        Ok(AppConfig {
            users_table: required(&lookup, "USERS_TABLE")?,
            votes_table: required(&lookup, "VOTES_TABLE")?,
            jwt_secret: required(&lookup, "JWT_SECRET")?,
            vote_cooldown: Duration::seconds(cooldown_secs),
            token_ttl: Duration::hours(token_ttl_hours),
        })
    }
}

fn required<F>(lookup: &F, key: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ConfigError::Missing(key.to_string()))
}

fn parse_or_default<F, T>(lookup: &F, key: &str, default: &str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    let raw = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
        name: key.to_string(),
        reason: e.to_string(),
    })
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

    const REQUIRED: [(&str, &str); 3] = [
        ("USERS_TABLE", "users"),
        ("VOTES_TABLE", "votes"),
        ("JWT_SECRET", "secret"),
    ];

    #[test]
    fn test_defaults_applied() {
        let config = AppConfig::from_lookup(lookup_from(&REQUIRED)).unwrap();

        assert_eq!(config.users_table, "users");
        assert_eq!(config.votes_table, "votes");
        assert_eq!(config.vote_cooldown, Duration::seconds(DEFAULT_COOLDOWN_SECS));
        assert_eq!(config.vote_cooldown, Duration::hours(1));
        assert_eq!(config.token_ttl, Duration::hours(24));
    }

    #[test]
    fn test_missing_secret_is_reported() {
        let result = AppConfig::from_lookup(lookup_from(&REQUIRED[..2]));
        assert_eq!(
            result.unwrap_err(),
            ConfigError::Missing("JWT_SECRET".to_string())
        );
    }

    #[test]
    fn test_overrides_and_invalid_numbers() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("VOTE_COOLDOWN_SECS", "60"));
        let config = AppConfig::from_lookup(lookup_from(&pairs)).unwrap();
        assert_eq!(config.vote_cooldown, Duration::seconds(60));

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("TOKEN_TTL_HOURS", "soon"));
        let result = AppConfig::from_lookup(lookup_from(&pairs));
        assert!(
            matches!(result, Err(ConfigError::Invalid { name, .. }) if name == "TOKEN_TTL_HOURS")
        );
    }
}
