//! Deployment configuration.
//!
//! Loaded once at startup and immutable afterwards. Misconfigurations that
//! would weaken authentication in production are fatal here, before any
//! socket is bound.

use std::net::SocketAddr;

use thiserror::Error;
use tracing::{info, warn};

use gatehouse_auth::{StrategyKind, TokenIssuer};

/// Signing secret used outside production when `JWT_SECRET` is unset.
pub const DEFAULT_JWT_SECRET: &str = "dev-secret-key-change-in-production";

const DEFAULT_DEV_AUTH_TOKEN: &str = "dev";
const DEFAULT_DEV_AUTH_EMAIL: &str = "admin@local";
const DEFAULT_JWT_EXPIRES_IN_SECS: i64 = 3600;
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("DEV_AUTH_ENABLED=true is not allowed when APP_ENV=production")]
    DevAuthInProduction,

    #[error("JWT_SECRET must be set to a non-default value when APP_ENV=production")]
    MissingJwtSecret,

    #[error("DATABASE_URL must be set when APP_ENV=production")]
    MissingDatabase,

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Profile {
    Development,
    Production,
}

impl Profile {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }
}

/// Shared-secret strategy parameters. Present only when the strategy is on.
#[derive(Clone)]
pub struct DevAuthSettings {
    pub token: String,
    pub operator_email: String,
}

impl core::fmt::Debug for DevAuthSettings {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DevAuthSettings")
            .field("token", &"[REDACTED]")
            .field("operator_email", &self.operator_email)
            .finish()
    }
}

#[derive(Clone)]
pub struct Settings {
    pub profile: Profile,
    pub dev_auth: Option<DevAuthSettings>,
    pub debug: bool,
    pub jwt_secret: String,
    pub jwt_expires_in: chrono::Duration,
    pub bind_addr: SocketAddr,
    pub database_url: Option<String>,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let profile = match get("APP_ENV") {
            Some(v) if v.eq_ignore_ascii_case("production") => Profile::Production,
            _ => Profile::Development,
        };

        let dev_auth_enabled = match get("DEV_AUTH_ENABLED") {
            Some(v) => parse_bool("DEV_AUTH_ENABLED", &v)?,
            None => !profile.is_production(),
        };
        if profile.is_production() && dev_auth_enabled {
            return Err(ConfigError::DevAuthInProduction);
        }

        let jwt_secret = match get("JWT_SECRET") {
            Some(secret) if secret != DEFAULT_JWT_SECRET => secret,
            _ if profile.is_production() => return Err(ConfigError::MissingJwtSecret),
            _ => DEFAULT_JWT_SECRET.to_string(),
        };

        let database_url = get("DATABASE_URL");
        if profile.is_production() && database_url.is_none() {
            return Err(ConfigError::MissingDatabase);
        }

        let dev_auth = dev_auth_enabled.then(|| DevAuthSettings {
            token: get("DEV_AUTH_TOKEN").unwrap_or_else(|| DEFAULT_DEV_AUTH_TOKEN.to_string()),
            operator_email: get("DEV_AUTH_EMAIL")
                .unwrap_or_else(|| DEFAULT_DEV_AUTH_EMAIL.to_string()),
        });

        let debug = match get("DEBUG") {
            Some(v) => parse_bool("DEBUG", &v)?,
            None => false,
        };

        let expires_in = match get("JWT_EXPIRES_IN") {
            Some(v) => v.parse::<i64>().ok().filter(|secs| *secs > 0).ok_or_else(|| {
                ConfigError::Invalid {
                    key: "JWT_EXPIRES_IN",
                    reason: format!("expected a positive number of seconds, got '{v}'"),
                }
            })?,
            None => DEFAULT_JWT_EXPIRES_IN_SECS,
        };

        let bind_raw = get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw.parse().map_err(|e| ConfigError::Invalid {
            key: "BIND_ADDR",
            reason: format!("{e}"),
        })?;

        Ok(Self {
            profile,
            dev_auth,
            debug,
            jwt_secret,
            jwt_expires_in: chrono::Duration::seconds(expires_in),
            bind_addr,
            database_url,
        })
    }

    pub fn strategy_kind(&self) -> StrategyKind {
        if self.dev_auth.is_some() {
            StrategyKind::SharedSecret
        } else {
            StrategyKind::Token
        }
    }

    /// Issuer for bearer tokens accepted by the token-signature strategy.
    pub fn token_issuer(&self) -> TokenIssuer {
        TokenIssuer::new(self.jwt_secret.as_bytes(), self.jwt_expires_in)
    }

    /// Log the resolved configuration without secrets.
    pub fn log_summary(&self) {
        info!(
            profile = self.profile.as_str(),
            strategy = ?self.strategy_kind(),
            debug = self.debug,
            bind_addr = %self.bind_addr,
            database = self.database_url.is_some(),
            "configuration loaded"
        );
        if let Some(dev) = &self.dev_auth {
            warn!(
                secret_len = dev.token.len(),
                operator_email = %dev.operator_email,
                "shared-secret authentication is ENABLED; never use this in production"
            );
        }
        if self.jwt_secret == DEFAULT_JWT_SECRET {
            warn!("JWT_SECRET not set; using insecure dev default");
        }
    }
}

impl core::fmt::Debug for Settings {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Settings")
            .field("profile", &self.profile)
            .field("dev_auth", &self.dev_auth)
            .field("debug", &self.debug)
            .field("jwt_secret", &"[REDACTED]")
            .field("jwt_expires_in", &self.jwt_expires_in)
            .field("bind_addr", &self.bind_addr)
            .field("database_url", &self.database_url.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            reason: format!("expected a boolean, got '{raw}'"),
        }),
    }
}
