use std::path::PathBuf;

use crate::adapters::insights::default_insert_url;
use crate::adapters::kasa_cloud::DEFAULT_API_URL;
use crate::app::AppError;
use crate::domain::period::ReportKind;

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct KasaConfig {
    pub username: String,
    pub password: String,
    pub api_url: String,
}

#[derive(Debug, Clone)]
pub struct NewRelicConfig {
    pub account_id: String,
    pub insert_api_key: String,
    pub insert_api_url: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub test_mode: bool,
    pub devices_like: String,
    pub report_kind: ReportKind,
    /// Offset supplied for a cadence that does not use one.
    pub ignored_offset: Option<String>,
    pub kasa: KasaConfig,
    pub newrelic: NewRelicConfig,
    pub http_timeout_secs: u64,
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone)]
pub struct ListingConfig {
    pub devices_like: Option<String>,
    pub kasa: KasaConfig,
    pub http_timeout_secs: u64,
}

pub fn load_dotenv() -> Option<PathBuf> {
    dotenvy::dotenv().ok()
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let devices_like = required(&lookup, "DEVICES_LIKE")?;

        let cadence = required(&lookup, "MEASURE_CADENCE")?;
        let offset = optional(&lookup, "MEASURE_OFFSET");
        let report_kind =
            ReportKind::from_cadence(&cadence, offset.as_deref()).map_err(AppError::config)?;
        let ignored_offset = match report_kind {
            ReportKind::Current => offset,
            _ => None,
        };

        Ok(Self {
            test_mode: optional(&lookup, "RUN_MODE").is_some_and(|mode| mode == "test"),
            devices_like,
            report_kind,
            ignored_offset,
            kasa: KasaConfig::from_lookup(&lookup)?,
            newrelic: NewRelicConfig::from_lookup(&lookup)?,
            http_timeout_secs: parse_or_default(
                &lookup,
                "HTTP_TIMEOUT_SECS",
                DEFAULT_HTTP_TIMEOUT_SECS,
            )?,
            retry_delay_ms: parse_or_default(&lookup, "RETRY_DELAY_MS", 0_u64)?,
        })
    }
}

impl ListingConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            devices_like: optional(&lookup, "DEVICES_LIKE"),
            kasa: KasaConfig::from_lookup(&lookup)?,
            http_timeout_secs: parse_or_default(
                &lookup,
                "HTTP_TIMEOUT_SECS",
                DEFAULT_HTTP_TIMEOUT_SECS,
            )?,
        })
    }
}

impl KasaConfig {
    fn from_lookup<F>(lookup: &F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            username: required(lookup, "TPLINK_KASA_USERNAME")?,
            password: required(lookup, "TPLINK_KASA_PASSWORD")?,
            api_url: optional(lookup, "TPLINK_KASA_API_URL")
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        })
    }
}

impl NewRelicConfig {
    fn from_lookup<F>(lookup: &F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let account_id = required(lookup, "NEWRELIC_ACCOUNT_ID")?;
        let insert_api_url = optional(lookup, "NEWRELIC_INSIGHTS_INSERT_API_URL")
            .unwrap_or_else(|| default_insert_url(&account_id));

        Ok(Self {
            insert_api_key: required(lookup, "NEWRELIC_INSIGHTS_INSERT_API_KEY")?,
            account_id,
            insert_api_url,
        })
    }
}

fn optional<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required<F>(lookup: &F, key: &str) -> Result<String, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    optional(lookup, key).ok_or_else(|| AppError::config(format!("{key} is required")))
}

fn parse_or_default<T, F>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr + Copy,
    F: Fn(&str) -> Option<String>,
{
    match optional(lookup, key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| AppError::config(format!("{key} must be a valid number"))),
        None => Ok(default),
    }
}
