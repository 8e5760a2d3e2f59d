use std::env;
use std::time::Duration;

use crate::error::Error;

const DEFAULT_DB: &str = "projetdb";
const DEFAULT_COLLECTION: &str = "utilisateurs";
const DEFAULT_MAX_ATTEMPTS: u32 = 30;
const DEFAULT_RETRY_INTERVAL_MS: u64 = 2000;

/// Connection and polling settings for one report run.
#[derive(Debug, Clone)]
pub struct ReportOptions {
    /// mongodb style connection string. `mongodb://<user>:<password>@host.domain`
    pub connection_str: String,
    /// the name of the mongodb database
    pub db: String,
    /// the name of the mongodb collection
    pub collection: String,
    /// readiness retry budget
    pub max_attempts: u32,
    /// fixed delay between readiness attempts
    pub interval: Duration,
}

impl ReportOptions {
    /// Reads `LISTINGS_MONGO_URI` (required) plus the optional
    /// `LISTINGS_DB`, `LISTINGS_COLLECTION`, `LISTINGS_MAX_ATTEMPTS` and
    /// `LISTINGS_RETRY_INTERVAL_MS` variables.
    pub fn from_env() -> Result<Self, Error> {
        let connection_str = env::var("LISTINGS_MONGO_URI")
            .map_err(|_| Error::Config("LISTINGS_MONGO_URI is not set".to_string()))?;

        let db = env::var("LISTINGS_DB").unwrap_or_else(|_| DEFAULT_DB.to_string());
        let collection =
            env::var("LISTINGS_COLLECTION").unwrap_or_else(|_| DEFAULT_COLLECTION.to_string());

        let max_attempts = parse_var("LISTINGS_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?;
        if max_attempts == 0 {
            return Err(Error::Config(
                "LISTINGS_MAX_ATTEMPTS must be greater than zero".to_string(),
            ));
        }
        let interval_ms = parse_var("LISTINGS_RETRY_INTERVAL_MS", DEFAULT_RETRY_INTERVAL_MS)?;

        Ok(ReportOptions {
            connection_str,
            db,
            collection,
            max_attempts,
            interval: Duration::from_millis(interval_ms),
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, Error> {
    match env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|_| Error::Config(format!("{} is not a valid number: `{}`", name, raw))),
        Err(_) => Ok(default),
    }
}
