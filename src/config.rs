use std::env;
use thiserror::Error;

/// Fallback signing secret for local runs. Never accepted in production.
const LOCAL_JWT_SECRET: &str = "postboard-local-development-secret";

/// Token lifetime used when `JWT_EXPIRY_SECS` is not set (100 hours).
pub const DEFAULT_JWT_EXPIRY_SECS: u64 = 360_000;

/// Longest accepted token lifetime (10 years).
pub const MAX_JWT_EXPIRY_SECS: u64 = 315_360_000;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";

/// AppConfig
///
/// Holds the application's entire configuration state. Loaded once at startup and
/// pulled into handlers and extractors through `FromRef`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Postgres connection string. `None` selects the in-memory store (local only).
    pub database_url: Option<String>,
    // HS256 secret used to sign and verify session tokens.
    pub jwt_secret: String,
    // Lifetime of issued tokens, in seconds.
    pub jwt_expiry_secs: u64,
    // Address the HTTP listener binds to.
    pub bind_addr: String,
    // Runtime environment marker. Controls log format and secret fallbacks.
    pub env: Env,
}

/// Env
///
/// Runtime context. Production demands every secret explicitly; local runs fall back
/// to development defaults.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set in production")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value:?}")]
    Invalid { name: &'static str, value: String },
}

impl Default for AppConfig {
    /// Test configuration: local mode, in-memory store, fixed secret.
    fn default() -> Self {
        Self {
            database_url: None,
            jwt_secret: "super-secure-test-secret-value-local".to_string(),
            jwt_expiry_secs: DEFAULT_JWT_EXPIRY_SECS,
            bind_addr: "127.0.0.1:0".to_string(),
            env: Env::Local,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables. Call `dotenv` first if a
    /// `.env` file should be honoured.
    ///
    /// # Errors
    /// Returns `ConfigError::Missing` when a production-mandatory variable is absent and
    /// `ConfigError::Invalid` when `JWT_EXPIRY_SECS` is not an integer between 1 and
    /// `MAX_JWT_EXPIRY_SECS`.
    pub fn load() -> Result<Self, ConfigError> {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let jwt_secret = match (env::var("JWT_SECRET"), &env) {
            (Ok(secret), _) if !secret.is_empty() => secret,
            (_, Env::Production) => return Err(ConfigError::Missing("JWT_SECRET")),
            (_, Env::Local) => LOCAL_JWT_SECRET.to_string(),
        };

        let database_url = env::var("DATABASE_URL").ok().filter(|url| !url.is_empty());
        if env == Env::Production && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let jwt_expiry_secs = match env::var("JWT_EXPIRY_SECS") {
            Ok(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|secs| (1..=MAX_JWT_EXPIRY_SECS).contains(secs))
                .ok_or(ConfigError::Invalid {
                    name: "JWT_EXPIRY_SECS",
                    value: raw,
                })?,
            Err(_) => DEFAULT_JWT_EXPIRY_SECS,
        };

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());

        Ok(Self {
            database_url,
            jwt_secret,
            jwt_expiry_secs,
            bind_addr,
            env,
        })
    }
}
