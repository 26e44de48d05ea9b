// src/config.rs

use std::{env, fmt, str::FromStr};

use dotenvy::dotenv;

/// Origins allowed to call the API when `CORS_ORIGINS` is not set.
pub const DEFAULT_ALLOWED_ORIGINS: [&str; 3] = [
    "http://localhost:3000",
    "https://meeraamir.github.io",
    "https://competitive-exam-management-system.netlify.app",
];

/// Which `ExamStore` implementation backs the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    /// In-memory store seeded with demo content. Nothing survives a restart.
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "pg" => Ok(StoreBackend::Postgres),
            "memory" | "mock" => Ok(StoreBackend::Memory),
            other => Err(ConfigError::Invalid {
                key: "EXAM_STORE",
                value: other.to_string(),
            }),
        }
    }
}

/// Product decisions around submissions.
#[derive(Debug, Clone)]
pub struct ExamPolicy {
    /// Include each question's correct option in the submission response.
    pub reveal_answers_after_submit: bool,
    /// Whether a learner may submit the same exam more than once.
    pub allow_retakes: bool,
    /// A second submission for the same learner/exam inside this window is a conflict.
    pub resubmit_window_secs: u64,
}

impl Default for ExamPolicy {
    fn default() -> Self {
        Self {
            reveal_answers_after_submit: false,
            allow_retakes: true,
            resubmit_window_secs: 30,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub store: StoreBackend,
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    pub exam_policy: ExamPolicy,
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "{} must be set", key),
            ConfigError::Invalid { key, value } => write!(f, "invalid value for {}: {:?}", key, value),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let store = match lookup("EXAM_STORE") {
            Some(raw) => raw.parse()?,
            None => StoreBackend::Postgres,
        };

        let database_url = lookup("DATABASE_URL");
        if store == StoreBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let jwt_secret = lookup("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let rust_log = lookup("RUST_LOG").unwrap_or_else(|| "info".to_string());

        let allowed_origins = match lookup("CORS_ORIGINS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect(),
            None => DEFAULT_ALLOWED_ORIGINS.iter().map(|o| o.to_string()).collect(),
        };

        let defaults = ExamPolicy::default();
        let exam_policy = ExamPolicy {
            reveal_answers_after_submit: parse_or(
                &lookup,
                "REVEAL_ANSWERS_AFTER_SUBMIT",
                defaults.reveal_answers_after_submit,
            )?,
            allow_retakes: parse_or(&lookup, "ALLOW_RETAKES", defaults.allow_retakes)?,
            resubmit_window_secs: parse_or(
                &lookup,
                "RESUBMIT_WINDOW_SECS",
                defaults.resubmit_window_secs,
            )?,
        };

        Ok(Self {
            store,
            database_url,
            jwt_secret,
            jwt_expiration: parse_or(&lookup, "JWT_EXPIRATION", 86_400)?,
            rust_log,
            port: parse_or(&lookup, "PORT", 5000)?,
            allowed_origins,
            admin_username: lookup("ADMIN_USERNAME"),
            admin_password: lookup("ADMIN_PASSWORD"),
            exam_policy,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => Ok(default),
    }
}
