use anyhow::Context;
use std::env;
use std::str::FromStr;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub db_max_connections: u32,

    // Rate limiting
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    // Display-name cache in front of the employee table
    pub name_cache_ttl_secs: u64,
    pub name_cache_capacity: u64,

    pub log_dir: String,
    pub log_level: String,
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key).with_context(|| format!("{} must be set", key))
}

fn or_default<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{} has an invalid value: {}", key, raw)),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick
    /// up a `.env` file.
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            db_max_connections: or_default("DB_MAX_CONNECTIONS", 10)?,
            rate_protected_per_min: or_default("RATE_PROTECTED_PER_MIN", 1000)?,
            api_prefix: or_default("API_PREFIX", "/api".to_string())?,
            name_cache_ttl_secs: or_default("NAME_CACHE_TTL_SECS", 300)?, // 5 min
            name_cache_capacity: or_default("NAME_CACHE_CAPACITY", 10_000)?,
            log_dir: or_default("LOG_DIR", "logs".to_string())?,
            log_level: or_default("LOG_LEVEL", "debug".to_string())?,
        })
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            database_url: String::new(),
            jwt_secret: crate::auth::jwt::testing::SECRET.to_string(),
            server_addr: "127.0.0.1:0".to_string(),
            db_max_connections: 1,
            rate_protected_per_min: 1000,
            api_prefix: "/api".to_string(),
            name_cache_ttl_secs: 300,
            name_cache_capacity: 100,
            log_dir: "logs".to_string(),
            log_level: "debug".to_string(),
        }
    }
}
