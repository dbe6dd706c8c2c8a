//! Runtime Configuration
//! Mission: Read every knob from the environment once, validate it, hand out typed values

use crate::{
    auth::{
        password::{MAX_COST, MIN_COST},
        session_store::SessionPolicy,
    },
    edges::counters::CounterPairing,
};
use anyhow::{bail, Result};
use chrono::Duration;
use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Staging,
    Production,
}

impl Environment {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "development" => Some(Environment::Development),
            "test" => Some(Environment::Test),
            "staging" => Some(Environment::Staging),
            "production" => Some(Environment::Production),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub environment: Environment,
    pub log_level: String,
    pub bcrypt_cost: u32,
    pub session_policy: SessionPolicy,
    pub counter_pairing: CounterPairing,
    pub allowed_origins: Vec<String>,
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(8080);

        let database_path =
            env::var("DATABASE_PATH").unwrap_or_else(|_| "./hackspark.db".to_string());

        let environment_raw =
            env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
        let Some(environment) = Environment::parse(&environment_raw) else {
            bail!("invalid environment: {environment_raw}");
        };

        let log_level = env::var("LOG_LEVEL")
            .unwrap_or_else(|_| "info".to_string())
            .to_lowercase();
        if !LOG_LEVELS.contains(&log_level.as_str()) {
            bail!("invalid log level: {log_level}");
        }

        let bcrypt_cost = env::var("BCRYPT_COST")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(10)
            .clamp(MIN_COST, MAX_COST);

        let ttl_hours = env::var("SESSION_TTL_HOURS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|&v| v > 0)
            .unwrap_or(24);
        let remember_days = env::var("SESSION_REMEMBER_TTL_DAYS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|&v| v > 0)
            .unwrap_or(30);
        let session_policy = SessionPolicy {
            default_ttl: Duration::hours(ttl_hours),
            remember_ttl: Duration::days(remember_days),
        };

        let pairing_raw =
            env::var("COUNTER_PAIRING").unwrap_or_else(|_| "best_effort".to_string());
        let Some(counter_pairing) = CounterPairing::parse(&pairing_raw) else {
            bail!("invalid counter pairing: {pairing_raw}");
        };

        let allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            port,
            database_path,
            environment,
            log_level,
            bcrypt_cost,
            session_policy,
            counter_pairing,
            allowed_origins,
        })
    }

    /// Settings for tests: in-memory database, cheapest bcrypt cost.
    pub fn for_tests() -> Self {
        Self {
            port: 0,
            database_path: ":memory:".to_string(),
            environment: Environment::Test,
            log_level: "debug".to_string(),
            bcrypt_cost: MIN_COST,
            session_policy: SessionPolicy::default(),
            counter_pairing: CounterPairing::BestEffort,
            allowed_origins: vec!["*".to_string()],
        }
    }
}
