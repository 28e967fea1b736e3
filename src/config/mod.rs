//! Configuration management
//!
//! Configuration is read from `config.yml` and may be overridden by
//! `CONDUIT_*` environment variables. Missing values fall back to defaults.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
    /// Listing/pagination limits
    #[serde(default)]
    pub listing: ListingConfig,
    /// Bounds on calls to identity and follow-graph collaborators
    #[serde(default)]
    pub collaborators: CollaboratorConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Storage driver (sqlite or memory)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL, ignored by the memory driver
    #[serde(default = "default_database_url")]
    pub url: String,
    /// Users, tokens and follows loaded by the memory driver at startup
    #[serde(default)]
    pub seed: SeedConfig,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
            seed: SeedConfig::default(),
        }
    }
}

fn default_database_url() -> String {
    "data/conduit.db".to_string()
}

/// Storage driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// Process-local store, lost on restart
    Memory,
}

/// Initial identities for the in-memory store
///
/// ```yaml
/// database:
///   driver: memory
///   seed:
///     users:
///       - username: alice
///         tokens: ["alice-token"]
///       - username: bob
///     follows:
///       - { follower: bob, author: alice }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedConfig {
    #[serde(default)]
    pub users: Vec<SeedUser>,
    #[serde(default)]
    pub follows: Vec<SeedFollow>,
    /// Lifetime of every seeded session token
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: u64,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            users: Vec::new(),
            follows: Vec::new(),
            token_ttl_hours: default_token_ttl_hours(),
        }
    }
}

impl SeedConfig {
    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.follows.is_empty()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.token_ttl_hours == 0 || self.token_ttl_hours > MAX_TOKEN_TTL_HOURS {
            return Err(ConfigError::ValidationError(format!(
                "database.seed.token_ttl_hours must be between 1 and {}",
                MAX_TOKEN_TTL_HOURS
            )));
        }

        let mut usernames = std::collections::HashSet::new();
        for user in &self.users {
            if user.username.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "database.seed.users: username must not be blank".into(),
                ));
            }
            if !usernames.insert(user.username.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "database.seed.users: duplicate username '{}'",
                    user.username
                )));
            }
        }

        for follow in &self.follows {
            for name in [&follow.follower, &follow.author] {
                if !usernames.contains(name.as_str()) {
                    return Err(ConfigError::ValidationError(format!(
                        "database.seed.follows: unknown user '{}'",
                        name
                    )));
                }
            }
        }
        Ok(())
    }
}

/// A seeded user and the session tokens that authenticate as them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedUser {
    pub username: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub tokens: Vec<String>,
}

/// `follower` follows `author`, both by username
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedFollow {
    pub follower: String,
    pub author: String,
}

/// About a century
pub const MAX_TOKEN_TTL_HOURS: u64 = 876_000;

fn default_token_ttl_hours() -> u64 {
    720
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache TTL in seconds
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
    /// Maximum number of cached entries
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl(),
            max_capacity: default_max_capacity(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

fn default_ttl() -> u64 {
    300
}

fn default_max_capacity() -> u64 {
    10_000
}

/// Pagination limits for article listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingConfig {
    /// Page size used when the request gives none
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    /// Largest page size a request may ask for
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
        }
    }
}

fn default_limit() -> usize {
    20
}

fn default_max_limit() -> usize {
    100
}

/// Timeouts for external collaborators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollaboratorConfig {
    /// Upper bound on a single identity or follow-graph lookup
    #[serde(default = "default_lookup_timeout_ms")]
    pub lookup_timeout_ms: u64,
}

impl Default for CollaboratorConfig {
    fn default() -> Self {
        Self {
            lookup_timeout_ms: default_lookup_timeout_ms(),
        }
    }
}

impl CollaboratorConfig {
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }
}

fn default_lookup_timeout_ms() -> u64 {
    2000
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist or is empty, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            })?;

        Ok(config)
    }

    /// Load configuration from file, apply environment overrides and validate.
    ///
    /// Recognised variables:
    /// - CONDUIT_SERVER_HOST
    /// - CONDUIT_SERVER_PORT
    /// - CONDUIT_SERVER_CORS_ORIGIN
    /// - CONDUIT_DATABASE_DRIVER
    /// - CONDUIT_DATABASE_URL
    /// - CONDUIT_CACHE_TTL_SECONDS
    /// - CONDUIT_LISTING_DEFAULT_LIMIT
    /// - CONDUIT_LISTING_MAX_LIMIT
    /// - CONDUIT_LOOKUP_TIMEOUT_MS
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Reject combinations the services cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listing.max_limit == 0 {
            return Err(ConfigError::ValidationError(
                "listing.max_limit must be greater than zero".into(),
            ));
        }
        if self.listing.default_limit == 0 || self.listing.default_limit > self.listing.max_limit {
            return Err(ConfigError::ValidationError(format!(
                "listing.default_limit must be between 1 and {}",
                self.listing.max_limit
            )));
        }
        if self.collaborators.lookup_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "collaborators.lookup_timeout_ms must be greater than zero".into(),
            ));
        }
        self.database.seed.validate()
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("CONDUIT_SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = env_parsed::<u16>("CONDUIT_SERVER_PORT") {
            self.server.port = port;
        }
        if let Ok(cors_origin) = std::env::var("CONDUIT_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = cors_origin;
        }

        if let Ok(driver) = std::env::var("CONDUIT_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "memory" => self.database.driver = DatabaseDriver::Memory,
                _ => {}
            }
        }
        if let Ok(url) = std::env::var("CONDUIT_DATABASE_URL") {
            self.database.url = url;
        }

        if let Some(ttl) = env_parsed::<u64>("CONDUIT_CACHE_TTL_SECONDS") {
            self.cache.ttl_seconds = ttl;
        }

        if let Some(limit) = env_parsed::<usize>("CONDUIT_LISTING_DEFAULT_LIMIT") {
            self.listing.default_limit = limit;
        }
        if let Some(limit) = env_parsed::<usize>("CONDUIT_LISTING_MAX_LIMIT") {
            self.listing.max_limit = limit;
        }

        if let Some(timeout) = env_parsed::<u64>("CONDUIT_LOOKUP_TIMEOUT_MS") {
            self.collaborators.lookup_timeout_ms = timeout;
        }
    }
}

/// Read an environment variable, ignoring it when unset or unparsable.
fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Config tests that touch the process environment share this lock.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
const ENV_KEYS: &[&str] = &[
    "CONDUIT_SERVER_HOST",
    "CONDUIT_SERVER_PORT",
    "CONDUIT_SERVER_CORS_ORIGIN",
    "CONDUIT_DATABASE_DRIVER",
    "CONDUIT_DATABASE_URL",
    "CONDUIT_CACHE_TTL_SECONDS",
    "CONDUIT_LISTING_DEFAULT_LIMIT",
    "CONDUIT_LISTING_MAX_LIMIT",
    "CONDUIT_LOOKUP_TIMEOUT_MS",
];

#[cfg(test)]
fn clear_env() {
    for key in ENV_KEYS {
        std::env::remove_var(key);
    }
}
