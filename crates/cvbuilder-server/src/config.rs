//! Server configuration.
//!
//! Settings come from the process environment, optionally seeded from a
//! `.env` file by `main`. Every value except `JWT_SECRET` in production has a
//! default suitable for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::Duration;
use cvbuilder_core::parse_ttl;
use cvbuilder_core::token::{DEFAULT_ACCESS_TTL, DEFAULT_REFRESH_TTL};
use tracing::warn;

/// Signing secret used when `JWT_SECRET` is unset outside production.
const DEV_JWT_SECRET: &str = "cvbuilder-dev-secret-change-me";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";

/// Upper bound for either token lifetime.
pub const MAX_TOKEN_TTL_DAYS: i64 = 365;

/// Requests per client IP per window on `/api`.
pub const DEFAULT_RATE_LIMIT_MAX: usize = 100;
pub const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 15 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" | "test" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => bail!("Unknown APP_ENV '{}' (expected development or production)", other),
        }
    }

    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

#[derive(Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub environment: Environment,
    pub jwt_secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    /// JSON snapshot for the user store; in-memory only when unset.
    pub data_file: Option<PathBuf>,
    /// Browser origin allowed to call the API with credentials.
    pub cors_origin: Option<String>,
    /// Base of the public share URLs handed out to users.
    pub frontend_url: String,
    pub rate_limit_max: usize,
    pub rate_limit_window: std::time::Duration,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("environment", &self.environment)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("data_file", &self.data_file)
            .field("cors_origin", &self.cors_origin)
            .field("frontend_url", &self.frontend_url)
            .field("rate_limit_max", &self.rate_limit_max)
            .field("rate_limit_window", &self.rate_limit_window)
            .finish_non_exhaustive()
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (the environment in production, a map in
    /// tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let environment = match get("APP_ENV") {
            Some(value) => Environment::parse(&value)?,
            None => Environment::Development,
        };

        let jwt_secret = match get("JWT_SECRET") {
            Some(secret) => secret,
            None if environment.is_production() => {
                bail!("JWT_SECRET must be set in production")
            }
            None => {
                warn!("JWT_SECRET not set, using the development secret");
                DEV_JWT_SECRET.to_string()
            }
        };

        let access_ttl = parse_ttl(&get("JWT_ACCESS_EXPIRY").unwrap_or_else(|| DEFAULT_ACCESS_TTL.into()))
            .context("Invalid JWT_ACCESS_EXPIRY")?;
        let refresh_ttl = parse_ttl(&get("JWT_REFRESH_EXPIRY").unwrap_or_else(|| DEFAULT_REFRESH_TTL.into()))
            .context("Invalid JWT_REFRESH_EXPIRY")?;
        let max_ttl = Duration::days(MAX_TOKEN_TTL_DAYS);
        if refresh_ttl > max_ttl {
            bail!("JWT_REFRESH_EXPIRY must not exceed {} days", MAX_TOKEN_TTL_DAYS);
        }
        if access_ttl >= refresh_ttl {
            bail!("JWT_ACCESS_EXPIRY must be shorter than JWT_REFRESH_EXPIRY");
        }

        let port = match get("PORT") {
            Some(port) => port.trim().parse().with_context(|| format!("Invalid PORT '{}'", port))?,
            None => DEFAULT_PORT,
        };

        let rate_limit_max = match get("RATE_LIMIT_MAX") {
            Some(max) => max
                .trim()
                .parse()
                .with_context(|| format!("Invalid RATE_LIMIT_MAX '{}'", max))?,
            None => DEFAULT_RATE_LIMIT_MAX,
        };
        let rate_limit_window_secs: u64 = match get("RATE_LIMIT_WINDOW_SECS") {
            Some(secs) => secs
                .trim()
                .parse()
                .with_context(|| format!("Invalid RATE_LIMIT_WINDOW_SECS '{}'", secs))?,
            None => DEFAULT_RATE_LIMIT_WINDOW_SECS,
        };
        if rate_limit_max == 0 || rate_limit_window_secs == 0 {
            bail!("RATE_LIMIT_MAX and RATE_LIMIT_WINDOW_SECS must be positive");
        }

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            environment,
            jwt_secret,
            access_ttl,
            refresh_ttl,
            data_file: get("CV_DATA_FILE").map(PathBuf::from),
            cors_origin: get("CORS_ORIGIN"),
            frontend_url: get("FRONTEND_URL").unwrap_or_else(|| DEFAULT_FRONTEND_URL.to_string()),
            rate_limit_max,
            rate_limit_window: std::time::Duration::from_secs(rate_limit_window_secs),
        })
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid bind address {}:{}", self.host, self.port))
    }

    /// Refresh cookies are only marked `Secure` in production so local HTTP
    /// development keeps working.
    pub fn secure_cookies(&self) -> bool {
        self.environment.is_production()
    }
}
