//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All optional:
//! - `TASFIYA_HOST` - Bind address (default: 127.0.0.1)
//! - `TASFIYA_PORT` - Listen port (default: 3000)
//! - `TASFIYA_BASE_URL` - Public URL; `https` enables secure cookies
//!   (default: `http://localhost:3000`)
//! - `TASFIYA_DATABASE_URL` - `PostgreSQL` connection string, falling back to
//!   `DATABASE_URL`. When neither is set the server runs on in-memory storage.
//! - `TASFIYA_CORS_ORIGINS` - Comma-separated allowed origins
//! - `AUCTION_EXTEND_WINDOW_SECS` - Auto-extend window (default: 120)
//! - `AUCTION_SWEEP_INTERVAL_SECS` - Auction closer interval (default: 30)
//! - `SETTINGS_CACHE_TTL_SECS` - Public settings cache TTL (default: 60)
//! - `SMS_API_URL`, `SMS_API_KEY`, `SMS_SENDER_ID` - SMS provider; all three
//!   or none
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT` - Error tracking

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "insert",
    "put-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL
    pub base_url: String,
    /// `PostgreSQL` URL; `None` selects in-memory storage
    pub database_url: Option<SecretString>,
    /// Allowed CORS origins; empty disables the CORS layer
    pub cors_origins: Vec<String>,
    pub auction: AuctionConfig,
    /// TTL of the cached settings snapshot
    pub settings_cache_ttl: Duration,
    /// SMS provider; `None` logs messages instead of sending them
    pub sms: Option<SmsConfig>,
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
}

/// Auction timing.
#[derive(Debug, Clone, Copy)]
pub struct AuctionConfig {
    /// Bids landing this close to the end push it out by the same amount
    pub extend_window: Duration,
    /// How often the closer looks for expired auctions
    pub sweep_interval: Duration,
}

/// SMS provider configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct SmsConfig {
    pub api_url: Url,
    pub api_key: SecretString,
    pub sender_id: String,
}

impl std::fmt::Debug for SmsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmsConfig")
            .field("api_url", &self.api_url.as_str())
            .field("api_key", &"[REDACTED]")
            .field("sender_id", &self.sender_id)
            .finish()
    }
}

impl Default for ServerConfig {
    /// Local development defaults: in-memory storage, no SMS, no Sentry.
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 3000,
            base_url: "http://localhost:3000".to_owned(),
            database_url: None,
            cors_origins: Vec::new(),
            auction: AuctionConfig {
                extend_window: Duration::from_secs(120),
                sweep_interval: Duration::from_secs(30),
            },
            settings_cache_ttl: Duration::from_secs(60),
            sms: None,
            sentry_dsn: None,
            sentry_environment: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is malformed, the SMS settings are
    /// incomplete, or the SMS API key fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = get_parsed_or_default("TASFIYA_HOST", IpAddr::V4(Ipv4Addr::LOCALHOST))?;
        let port = get_parsed_or_default("TASFIYA_PORT", 3000_u16)?;
        let base_url = get_env_or_default("TASFIYA_BASE_URL", "http://localhost:3000");
        Url::parse(&base_url)
            .map_err(|e| ConfigError::InvalidEnvVar("TASFIYA_BASE_URL".to_owned(), e.to_string()))?;

        let database_url = get_optional_env("TASFIYA_DATABASE_URL")
            .or_else(|| get_optional_env("DATABASE_URL"))
            .map(SecretString::from);

        let cors_origins = get_optional_env("TASFIYA_CORS_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();

        let auction = AuctionConfig {
            extend_window: Duration::from_secs(get_parsed_or_default(
                "AUCTION_EXTEND_WINDOW_SECS",
                120_u64,
            )?),
            sweep_interval: Duration::from_secs(
                get_parsed_or_default("AUCTION_SWEEP_INTERVAL_SECS", 30_u64)?.max(1),
            ),
        };
        let settings_cache_ttl =
            Duration::from_secs(get_parsed_or_default("SETTINGS_CACHE_TTL_SECS", 60_u64)?);

        Ok(Self {
            host,
            port,
            base_url,
            database_url,
            cors_origins,
            auction,
            settings_cache_ttl,
            sms: SmsConfig::from_env()?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Session cookies are marked `Secure` when served over https.
    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl SmsConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(api_url) = get_optional_env("SMS_API_URL") else {
            return Ok(None);
        };
        let api_url = Url::parse(&api_url)
            .map_err(|e| ConfigError::InvalidEnvVar("SMS_API_URL".to_owned(), e.to_string()))?;
        Ok(Some(Self {
            api_url,
            api_key: get_validated_secret("SMS_API_KEY")?,
            sender_id: get_required_env("SMS_SENDER_ID")?,
        }))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_owned()))
}

/// Get an optional environment variable, treating blank as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_owned())
}

fn get_parsed_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_owned(), e.to_string()))
    })
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // Lengths are far below f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Reject placeholders and low-entropy values.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_owned(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_owned(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1})"
            ),
        ));
    }

    Ok(())
}

fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

/// Expose the database URL only to the pool constructor.
#[must_use]
pub fn database_url_redacted(url: &SecretString) -> String {
    Url::parse(url.expose_secret()).map_or_else(
        |_| "[unparseable]".to_owned(),
        |mut u| {
            if u.password().is_some() {
                let _ = u.set_password(Some("****"));
            }
            u.to_string()
        },
    )
}
