use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::{env, fmt::Display, str::FromStr};

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,
    pub db_max_connections: u32,
    pub run_migrations: bool,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_register_per_min: u32,
    pub rate_refresh_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    // Logging
    pub log_dir: String,
    pub log_level: tracing::Level,
}

fn required(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

fn parsed_or<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    raw.parse::<T>()
        .map_err(|e| anyhow::anyhow!("{key}: invalid value '{raw}': {e}"))
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            access_token_ttl: parsed_or("ACCESS_TOKEN_TTL", "900")?, // 15 min
            refresh_token_ttl: parsed_or("REFRESH_TOKEN_TTL", "604800")?, // 7 days
            db_max_connections: parsed_or("DB_MAX_CONNECTIONS", "10")?,
            run_migrations: parsed_or("RUN_MIGRATIONS", "true")?,

            rate_login_per_min: parsed_or("RATE_LOGIN_PER_MIN", "60")?,
            rate_register_per_min: parsed_or("RATE_REGISTER_PER_MIN", "30")?,
            rate_refresh_per_min: parsed_or("RATE_REFRESH_PER_MIN", "30")?,
            rate_protected_per_min: parsed_or("RATE_PROTECTED_PER_MIN", "1000")?,

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),

            log_dir: env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()),
            log_level: parsed_or("LOG_LEVEL", "debug")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_default_when_unset() {
        let ttl: usize = parsed_or("EMS_TEST_UNSET_TTL", "900").unwrap();
        assert_eq!(ttl, 900);
    }

    #[test]
    fn rejects_malformed_values() {
        let err = parsed_or::<u32>("EMS_TEST_UNSET_RATE", "lots").unwrap_err();
        assert!(err.to_string().contains("EMS_TEST_UNSET_RATE"));
    }

    #[test]
    fn parses_log_level() {
        let level: tracing::Level = parsed_or("EMS_TEST_UNSET_LEVEL", "info").unwrap();
        assert_eq!(level, tracing::Level::INFO);
    }
}
