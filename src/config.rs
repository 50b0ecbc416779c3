use std::{env, net::SocketAddr, str::FromStr, time::Duration};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid environment variable format for {0}: {1}")]
    InvalidVar(String, String),
}

/// Where meme, bid and duel records live.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    DynamoDb,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dynamodb" | "dynamo" => Ok(StorageBackend::DynamoDb),
            "memory" | "in-memory" => Ok(StorageBackend::Memory),
            other => Err(format!("unknown storage backend '{}'", other)),
        }
    }
}

/// Service-originated notifications emitted unless removed from the allowlist.
pub const DEFAULT_ALLOWED_EVENTS: [&str; 4] = [
    "bid_received",
    "bid_placed",
    "leaderboard_update",
    "leaderboard_changed",
];

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub storage_backend: StorageBackend,
    pub aws_region: String,
    // Optional endpoint for LocalStack / DynamoDB Local
    pub localstack_endpoint: Option<String>,
    pub table_prefix: String,
    pub jwt_secret: String,
    pub jwt_expires_in: Duration,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub leaderboard_cache_ttl: Duration,
    pub cache_ttl: Duration,
    pub cors_origin: Option<String>,
    pub allowed_events: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 3000)),
            storage_backend: StorageBackend::Memory,
            aws_region: "ca-central-1".to_string(),
            localstack_endpoint: None,
            table_prefix: String::new(),
            jwt_secret: "memehustle-dev-secret".to_string(),
            jwt_expires_in: Duration::from_secs(7 * 24 * 60 * 60),
            gemini_api_key: None,
            gemini_model: "gemini-2.0-flash".to_string(),
            gemini_base_url: "https://generativelanguage.googleapis.com".to_string(),
            leaderboard_cache_ttl: Duration::from_secs(60),
            cache_ttl: Duration::from_secs(300),
            cors_origin: None,
            allowed_events: DEFAULT_ALLOWED_EVENTS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let bind_address = match (env::var("BIND_ADDRESS"), env::var("PORT")) {
            (Ok(addr), _) => SocketAddr::from_str(&addr)
                .map_err(|e| ConfigError::InvalidVar("BIND_ADDRESS".into(), e.to_string()))?,
            (Err(_), Ok(port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|e| ConfigError::InvalidVar("PORT".into(), e.to_string()))?;
                SocketAddr::from(([0, 0, 0, 0], port))
            }
            _ => defaults.bind_address,
        };

        let storage_backend = match env::var("STORAGE_BACKEND") {
            Ok(raw) => raw
                .parse()
                .map_err(|e| ConfigError::InvalidVar("STORAGE_BACKEND".into(), e))?,
            Err(_) => StorageBackend::DynamoDb,
        };

        let jwt_secret =
            env::var("JWT_SECRET").map_err(|_| ConfigError::MissingVar("JWT_SECRET".into()))?;

        let jwt_expires_in = match env::var("JWT_EXPIRES_IN") {
            Ok(raw) => parse_duration(&raw)
                .map_err(|e| ConfigError::InvalidVar("JWT_EXPIRES_IN".into(), e))?,
            Err(_) => defaults.jwt_expires_in,
        };

        let allowed_events = env::var("REALTIME_ALLOWED_EVENTS")
            .map(|raw| {
                raw.split(',')
                    .map(|e| e.trim().to_string())
                    .filter(|e| !e.is_empty())
                    .collect()
            })
            .unwrap_or(defaults.allowed_events);

        Ok(Config {
            bind_address,
            storage_backend,
            aws_region: env::var("AWS_DEFAULT_REGION").unwrap_or(defaults.aws_region),
            localstack_endpoint: env::var("AWS_ENDPOINT_URL").ok(),
            table_prefix: env::var("TABLE_PREFIX").unwrap_or_default(),
            jwt_secret,
            jwt_expires_in,
            gemini_api_key: env::var("GEMINI_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            gemini_model: env::var("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            gemini_base_url: env::var("GEMINI_BASE_URL").unwrap_or(defaults.gemini_base_url),
            leaderboard_cache_ttl: seconds_var("LEADERBOARD_CACHE_TTL", defaults.leaderboard_cache_ttl)?,
            cache_ttl: seconds_var("CACHE_TTL", defaults.cache_ttl)?,
            cors_origin: env::var("CORS_ORIGIN").ok(),
            allowed_events,
        })
    }

    pub fn table_name(&self, base: &str) -> String {
        format!("{}{}", self.table_prefix, base)
    }
}

fn seconds_var(key: &str, default: Duration) -> Result<Duration, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| ConfigError::InvalidVar(key.into(), e.to_string())),
        Err(_) => Ok(default),
    }
}

/// Parses `45`, `45s`, `30m`, `12h` or `7d`.
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let raw = raw.trim();
    let split = raw.find(|c: char| !c.is_ascii_digit()).unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);
    let amount: u64 = digits
        .parse()
        .map_err(|_| format!("'{}' is not a duration", raw))?;
    let multiplier = match unit {
        "" | "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        other => return Err(format!("unknown duration unit '{}'", other)),
    };
    let secs = amount
        .checked_mul(multiplier)
        .ok_or_else(|| format!("'{}' is too long a duration", raw))?;
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_durations_with_units() {
        assert_eq!(parse_duration("45").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_duration("30m").unwrap(), Duration::from_secs(1800));
        assert_eq!(parse_duration("12h").unwrap(), Duration::from_secs(43_200));
        assert_eq!(parse_duration("7d").unwrap(), Duration::from_secs(604_800));
        assert!(parse_duration("7w").is_err());
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("300000000000000000d").is_err());
    }

    #[test]
    fn storage_backend_from_str() {
        assert_eq!("DynamoDB".parse::<StorageBackend>().unwrap(), StorageBackend::DynamoDb);
        assert_eq!("memory".parse::<StorageBackend>().unwrap(), StorageBackend::Memory);
        assert!("postgres".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn table_names_use_prefix() {
        let config = Config {
            table_prefix: "dev_".to_string(),
            ..Config::default()
        };
        assert_eq!(config.table_name("memes"), "dev_memes");
    }
}
