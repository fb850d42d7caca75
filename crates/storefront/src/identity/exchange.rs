//! HTTP credential exchange.
//!
//! Posts `{username, password}` as JSON to the shop's login endpoint and maps
//! the response status onto [`AuthFailure`]:
//!
//! | Status | Result |
//! |---|---|
//! | 200 | session from the `user` object |
//! | 400 | `MissingFields` |
//! | 401 | `InvalidCredentials` |
//! | 403 | `AccountInactive` |
//! | other | `Unavailable` |

use chrono::Utc;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use techland_core::{Role, UserSession};

use super::credentials::CredentialExchange;
use super::error::AuthFailure;

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    user: LoginUser,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginUser {
    id: String,
    username: String,
    name: String,
    #[serde(default)]
    email: String,
    role: String,
    #[serde(default = "default_active")]
    is_active: bool,
}

const fn default_active() -> bool {
    true
}

impl LoginUser {
    fn into_session(self) -> Result<UserSession, AuthFailure> {
        let role: Role = self
            .role
            .parse()
            .map_err(|_| AuthFailure::Unavailable(format!("unknown role '{}'", self.role)))?;
        let session = UserSession::new(
            self.id,
            self.username,
            self.name,
            self.email,
            role,
            Utc::now(),
        );
        Ok(if self.is_active {
            session
        } else {
            session.inactive()
        })
    }
}

/// Map a non-success status to the failure it reports.
fn failure_for(status: StatusCode) -> AuthFailure {
    match status {
        StatusCode::BAD_REQUEST => AuthFailure::MissingFields,
        StatusCode::UNAUTHORIZED => AuthFailure::InvalidCredentials,
        StatusCode::FORBIDDEN => AuthFailure::AccountInactive,
        other => AuthFailure::Unavailable(format!("login endpoint returned {other}")),
    }
}

/// Credential exchange backed by the shop's login endpoint.
#[derive(Debug, Clone)]
pub struct HttpCredentialExchange {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpCredentialExchange {
    /// Create an exchange posting to `endpoint`.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    /// The login endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl CredentialExchange for HttpCredentialExchange {
    async fn submit_credentials(
        &self,
        identifier: &str,
        secret: &SecretString,
    ) -> Result<UserSession, AuthFailure> {
        let body = LoginRequest {
            username: identifier,
            password: secret.expose_secret(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthFailure::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(status = status.as_u16(), "Login endpoint refused credentials");
            return Err(failure_for(status));
        }

        let login: LoginResponse = response
            .json()
            .await
            .map_err(|e| AuthFailure::Unavailable(format!("unreadable login response: {e}")))?;
        login.user.into_session()
    }
}
