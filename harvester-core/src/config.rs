use harvester_scanner::{ErrorKind, S3Settings, TransferPolicy};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set when dummy mode is off")]
    Missing(&'static str),

    #[error("{name} has an invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::ConfigurationError
    }
}

/// Where documents get written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    S3 {
        region: String,
        endpoint_url: Option<String>,
        access_key_id: Option<String>,
        secret_access_key: Option<String>,
    },
    /// Local directory standing in for S3.
    Emulated { root: PathBuf },
}

impl StorageConfig {
    pub fn s3_settings(&self) -> Option<S3Settings> {
        match self {
            StorageConfig::S3 {
                region,
                endpoint_url,
                access_key_id,
                secret_access_key,
            } => Some(S3Settings {
                region: Some(region.clone()),
                endpoint_url: endpoint_url.clone(),
                access_key_id: access_key_id.clone(),
                secret_access_key: secret_access_key.clone(),
            }),
            StorageConfig::Emulated { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub headless: bool,
}

/// Process configuration, read once at start-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub dummy_mode: bool,
    pub host: String,
    pub port: u16,
    pub navigation_timeout: Duration,
    pub navigation_retries: u32,
    pub transfer: TransferPolicy,
    pub request_deadline: Duration,
    /// Absent only in dummy mode.
    pub engine: Option<EngineConfig>,
    pub storage: StorageConfig,
}

impl Config {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let dummy_mode = match get("HARVESTER_DUMMY_MODE") {
            Some(value) => parse_bool("HARVESTER_DUMMY_MODE", &value)?,
            None => match get("DEBUG") {
                Some(value) => parse_bool("DEBUG", &value)?,
                None => false,
            },
        };

        let transfer = TransferPolicy {
            parallelism: parse_or("HARVESTER_TRANSFER_PARALLELISM", get("HARVESTER_TRANSFER_PARALLELISM"), 4usize)?,
            attempt_timeout: Duration::from_secs(parse_or(
                "HARVESTER_TRANSFER_TIMEOUT_SECS",
                get("HARVESTER_TRANSFER_TIMEOUT_SECS"),
                30u64,
            )?),
            max_attempts: parse_or("HARVESTER_TRANSFER_MAX_ATTEMPTS", get("HARVESTER_TRANSFER_MAX_ATTEMPTS"), 3u32)?,
            backoff_base: Duration::from_millis(parse_or(
                "HARVESTER_TRANSFER_BACKOFF_MS",
                get("HARVESTER_TRANSFER_BACKOFF_MS"),
                500u64,
            )?),
        };
        if transfer.parallelism == 0 {
            return Err(invalid("HARVESTER_TRANSFER_PARALLELISM", "0", "must be at least 1"));
        }
        if transfer.max_attempts == 0 {
            return Err(invalid("HARVESTER_TRANSFER_MAX_ATTEMPTS", "0", "must be at least 1"));
        }

        let headless = match get("HEADLESS") {
            Some(value) => parse_bool("HEADLESS", &value)?,
            None => true,
        };
        let engine = match get("HARVESTER_AUTOMATION_URL") {
            Some(endpoint) => {
                url::Url::parse(&endpoint)
                    .map_err(|e| invalid("HARVESTER_AUTOMATION_URL", &endpoint, &e.to_string()))?;
                Some(EngineConfig {
                    endpoint,
                    api_key: get("HARVESTER_AUTOMATION_KEY").or_else(|| get("GEMINI_API_KEY")),
                    headless,
                })
            }
            None if dummy_mode => None,
            None => return Err(ConfigError::Missing("HARVESTER_AUTOMATION_URL")),
        };

        let storage = match get("HARVESTER_S3_EMULATE_ROOT") {
            Some(root) => StorageConfig::Emulated {
                root: PathBuf::from(root),
            },
            None => {
                let access_key_id = get("AWS_ACCESS_KEY_ID");
                let secret_access_key = get("AWS_SECRET_ACCESS_KEY");
                if !dummy_mode {
                    if access_key_id.is_none() {
                        return Err(ConfigError::Missing("AWS_ACCESS_KEY_ID"));
                    }
                    if secret_access_key.is_none() {
                        return Err(ConfigError::Missing("AWS_SECRET_ACCESS_KEY"));
                    }
                }
                StorageConfig::S3 {
                    region: get("AWS_REGION").unwrap_or_else(|| "us-east-1".to_string()),
                    endpoint_url: get("HARVESTER_S3_ENDPOINT"),
                    access_key_id,
                    secret_access_key,
                }
            }
        };

        Ok(Self {
            dummy_mode,
            host: get("HARVESTER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or("PORT", get("PORT"), 8000u16)?,
            navigation_timeout: Duration::from_secs(parse_or(
                "HARVESTER_NAVIGATION_TIMEOUT_SECS",
                get("HARVESTER_NAVIGATION_TIMEOUT_SECS"),
                300u64,
            )?),
            navigation_retries: parse_or("HARVESTER_NAVIGATION_RETRIES", get("HARVESTER_NAVIGATION_RETRIES"), 1u32)?,
            transfer,
            request_deadline: Duration::from_secs(parse_or(
                "HARVESTER_REQUEST_DEADLINE_SECS",
                get("HARVESTER_REQUEST_DEADLINE_SECS"),
                900u64,
            )?),
            engine,
            storage,
        })
    }
}

fn invalid(name: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        name,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_or<T>(name: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw
            .parse()
            .map_err(|e: T::Err| invalid(name, &raw, &e.to_string())),
        None => Ok(default),
    }
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(name, value, "expected true or false")),
    }
}
