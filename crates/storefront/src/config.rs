//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All variables are optional.
//!
//! - `TECHLAND_CART_KEY` - Store key for the cart record (default: `techland_cart`)
//! - `TECHLAND_SESSION_KEY` - Store key for the local session record (default: `userSession`)
//! - `TECHLAND_STORAGE_QUOTA_BYTES` - Per-profile storage quota (default: 5242880)
//! - `TECHLAND_STORAGE_DISABLED` - Treat the storage medium as disabled (default: false)
//! - `TECHLAND_PROFILE_PATH` - JSON file backing the browser profile (default: memory only)
//! - `TECHLAND_PROVIDER_NAME` - OAuth provider label (default: `google`)
//! - `TECHLAND_LOGIN_PATH` - Where to navigate after logout (default: `/login`)
//! - `TECHLAND_AUTH_URL` - Credential login endpoint (default: none, credential login disabled)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;

use thiserror::Error;

const DEFAULT_CART_KEY: &str = "techland_cart";
const DEFAULT_SESSION_KEY: &str = "userSession";
const DEFAULT_QUOTA_BYTES: usize = 5 * 1024 * 1024;
const DEFAULT_PROVIDER_NAME: &str = "google";
const DEFAULT_LOGIN_PATH: &str = "/login";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Client state configuration.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Persisted store configuration
    pub storage: StorageConfig,
    /// Identity resolver configuration
    pub identity: IdentityConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Persisted store configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Key holding the serialized cart
    pub cart_key: String,
    /// Key holding the serialized local session
    pub session_key: String,
    /// Maximum bytes of keys plus values a profile may hold
    pub quota_bytes: usize,
    /// Whether the medium starts out disabled
    pub disabled: bool,
    /// File backing the profile, if any
    pub profile_path: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            cart_key: DEFAULT_CART_KEY.to_string(),
            session_key: DEFAULT_SESSION_KEY.to_string(),
            quota_bytes: DEFAULT_QUOTA_BYTES,
            disabled: false,
            profile_path: None,
        }
    }
}

/// Identity resolver configuration.
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    /// Provider label, used to synthesize the provider user id
    pub provider_name: String,
    /// Path callers navigate to after logout
    pub login_path: String,
    /// Credential exchange endpoint, if credential login is available
    pub auth_url: Option<String>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            provider_name: DEFAULT_PROVIDER_NAME.to_string(),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            auth_url: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` for unparseable numbers or booleans,
    /// and `ConfigError::MissingEnvVar` when a key variable is set but empty.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let storage = StorageConfig {
            cart_key: non_empty_or_default(&lookup, "TECHLAND_CART_KEY", DEFAULT_CART_KEY)?,
            session_key: non_empty_or_default(
                &lookup,
                "TECHLAND_SESSION_KEY",
                DEFAULT_SESSION_KEY,
            )?,
            quota_bytes: match lookup("TECHLAND_STORAGE_QUOTA_BYTES") {
                Some(raw) => raw.trim().parse::<usize>().map_err(|e| {
                    ConfigError::InvalidEnvVar(
                        "TECHLAND_STORAGE_QUOTA_BYTES".to_string(),
                        e.to_string(),
                    )
                })?,
                None => DEFAULT_QUOTA_BYTES,
            },
            disabled: match lookup("TECHLAND_STORAGE_DISABLED") {
                Some(raw) => parse_bool("TECHLAND_STORAGE_DISABLED", &raw)?,
                None => false,
            },
            profile_path: lookup("TECHLAND_PROFILE_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
        };

        if storage.cart_key == storage.session_key {
            return Err(ConfigError::InvalidEnvVar(
                "TECHLAND_SESSION_KEY".to_string(),
                "must differ from TECHLAND_CART_KEY".to_string(),
            ));
        }

        let identity = IdentityConfig {
            provider_name: non_empty_or_default(
                &lookup,
                "TECHLAND_PROVIDER_NAME",
                DEFAULT_PROVIDER_NAME,
            )?,
            login_path: non_empty_or_default(&lookup, "TECHLAND_LOGIN_PATH", DEFAULT_LOGIN_PATH)?,
            auth_url: lookup("TECHLAND_AUTH_URL")
                .map(|url| url.trim().to_string())
                .filter(|url| !url.is_empty()),
        };

        Ok(Self {
            storage,
            identity,
            sentry_dsn: lookup("SENTRY_DSN"),
            sentry_environment: lookup("SENTRY_ENVIRONMENT"),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a variable that must not be blank when set, with a default value.
fn non_empty_or_default(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: &str,
) -> Result<String, ConfigError> {
    match lookup(key) {
        Some(value) if value.trim().is_empty() => Err(ConfigError::MissingEnvVar(key.to_string())),
        Some(value) => Ok(value.trim().to_string()),
        None => Ok(default.to_string()),
    }
}

/// Parse a boolean flag.
fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("expected a boolean, got '{other}'"),
        )),
    }
}
