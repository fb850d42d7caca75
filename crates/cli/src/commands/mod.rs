//! Command implementations.
//!
//! A [`Shell`] is one tab opened on the configured profile. Commands print
//! their results on stdout; logs go to stderr.

mod cart;
mod session;
mod store;

use thiserror::Error;

use techland_storefront::config::{ClientConfig, ConfigError};
use techland_storefront::error::ClientError;
use techland_storefront::identity::{IdentityError, WatchProvider};
use techland_storefront::state::StorefrontContext;
use techland_storefront::store::{BrowserProfile, StoreError};

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// The client state layer failed.
    #[error("{0}")]
    Client(#[from] ClientError),

    /// Credential login needs an endpoint.
    #[error("credential login is not configured; set TECHLAND_AUTH_URL")]
    LoginUnavailable,
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self::Client(err.into())
    }
}

impl From<StoreError> for CliError {
    fn from(err: StoreError) -> Self {
        Self::Client(err.into())
    }
}

impl From<IdentityError> for CliError {
    fn from(err: IdentityError) -> Self {
        Self::Client(err.into())
    }
}

/// One tab on the configured profile.
///
/// There is no OAuth provider in a terminal, so the tab's provider reports
/// no session and only the local session path is reachable.
pub struct Shell {
    config: ClientConfig,
    profile: BrowserProfile,
    tab: StorefrontContext<WatchProvider>,
}

impl Shell {
    /// Open the profile and a tab on it.
    ///
    /// # Errors
    ///
    /// Returns `CliError` if the profile file exists but cannot be read.
    pub fn open(config: ClientConfig) -> Result<Self, CliError> {
        let profile = BrowserProfile::open(&config.storage)?;
        let tab = StorefrontContext::open(&profile, &config, WatchProvider::signed_out());
        Ok(Self {
            config,
            profile,
            tab,
        })
    }
}
