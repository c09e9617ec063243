use std::{env, fmt::Display, str::FromStr};

use tracing::{error, info, warn};

use crate::errors::{Error, Result};

pub const MEMORY_DATABASE: &str = "memory";

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub port: u16,

    // ? persistence
    pub database_url: String,
    pub db_user: String,
    pub db_pass: String,
    pub db_namespace: String,
    pub db_name: String,

    // ? sessions
    pub jwt_secret: String,
    pub jwt_ttl_secs: i64,

    pub public_base_url: String,
    pub upload_dir: String,

    // ? billing
    pub stripe_secret_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,

    pub default_max_invitations: u32,
    pub rate_limit: bool,
    pub admin_bootstrap_email: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read on its own so the subscriber is installed before the rest loads.
    pub fn log_level() -> Result<tracing::Level> {
        try_load(&|key: &str| env::var(key).ok(), "LOG_LEVEL", "info")
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url: String = try_load(&lookup, "DATABASE_URL", MEMORY_DATABASE)?;
        // ! only the throwaway memory backend may run on the development secret
        let jwt_secret = match optional(&lookup, "JWT_SECRET") {
            Some(secret) => secret,
            None if database_url == MEMORY_DATABASE => {
                warn!("JWT_SECRET not set, using an insecure development secret");
                "development-secret".to_string()
            }
            None => {
                error!("JWT_SECRET must be set when DATABASE_URL is {database_url}");
                return Err(Error::Config("JWT_SECRET is required".to_string()));
            }
        };

        Ok(Self {
            bind_addr: try_load(&lookup, "BIND_ADDR", "127.0.0.1")?,
            port: try_load(&lookup, "PORT", "3587")?,
            database_url,
            db_user: try_load(&lookup, "DB_USER", "root")?,
            db_pass: try_load(&lookup, "DB_PASS", "secret")?,
            db_namespace: try_load(&lookup, "DB_NAMESPACE", "survey")?,
            db_name: try_load(&lookup, "DB_NAME", "survey")?,
            jwt_secret,
            jwt_ttl_secs: try_load(&lookup, "JWT_TTL_SECS", "86400")?,
            public_base_url: try_load::<String, _>(
                &lookup,
                "PUBLIC_BASE_URL",
                "http://localhost:3587",
            )?
            .trim_end_matches('/')
            .to_string(),
            upload_dir: try_load(&lookup, "UPLOAD_DIR", "./uploads")?,
            stripe_secret_key: optional(&lookup, "STRIPE_SECRET_KEY"),
            stripe_webhook_secret: optional(&lookup, "STRIPE_WEBHOOK_SECRET"),
            default_max_invitations: try_load(&lookup, "DEFAULT_MAX_INVITATIONS", "5")?,
            rate_limit: try_load(&lookup, "RATE_LIMIT", "true")?,
            admin_bootstrap_email: optional(&lookup, "ADMIN_BOOTSTRAP_EMAIL")
                .map(|email| email.to_lowercase()),
        })
    }

    pub fn invitation_url(&self, code: &str) -> String {
        format!("{}/signup?invite={}", self.public_base_url, code)
    }

    pub fn public_survey_url(&self, share_url: &str) -> String {
        format!("{}/s/{}", self.public_base_url, share_url)
    }
}

fn optional<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|value| !value.trim().is_empty())
}

fn try_load<T, F>(lookup: &F, key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
            Error::Config(format!("invalid {key}: {e}"))
        })
}

#[cfg(test)]
pub fn test_config() -> Config {
    Config {
        bind_addr: "127.0.0.1".to_string(),
        port: 0,
        database_url: MEMORY_DATABASE.to_string(),
        db_user: String::new(),
        db_pass: String::new(),
        db_namespace: String::new(),
        db_name: String::new(),
        jwt_secret: "test-secret".to_string(),
        jwt_ttl_secs: 3600,
        public_base_url: "https://surveys.test".to_string(),
        upload_dir: String::new(),
        stripe_secret_key: None,
        stripe_webhook_secret: Some("whsec_test".to_string()),
        default_max_invitations: 2,
        rate_limit: false,
        admin_bootstrap_email: None,
    }
}
