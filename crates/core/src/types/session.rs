//! Authenticated identities.
//!
//! A session can originate from the OAuth provider or from the shop's own
//! credential exchange. Both are collapsed into one [`UserSession`] before
//! anyone outside the identity resolver sees them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::UserId;
use super::role::Role;

/// Fallback username and display name for provider identities without a name.
pub const DEFAULT_PROVIDER_USERNAME: &str = "User";

/// One authenticated identity, regardless of where it came from.
///
/// The role is fixed at construction and cannot be changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSession {
    /// Stable identifier for this identity.
    pub id: UserId,
    /// Login name.
    pub username: String,
    /// Name shown in the UI.
    pub display_name: String,
    /// Contact email; may be empty for provider identities without one.
    pub email: String,
    role: Role,
    /// Whether the account is active.
    pub active: bool,
    /// When this session was issued.
    pub issued_at: DateTime<Utc>,
}

impl UserSession {
    /// Create an active session issued at `issued_at`.
    #[must_use]
    pub fn new(
        id: impl Into<UserId>,
        username: impl Into<String>,
        display_name: impl Into<String>,
        email: impl Into<String>,
        role: Role,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            display_name: display_name.into(),
            email: email.into(),
            role,
            active: true,
            issued_at,
        }
    }

    /// Mark the session's account as inactive.
    #[must_use]
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// The role granted to this session.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Whether this session has administrative access.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Identity reported by the OAuth provider.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProviderIdentity {
    /// Display name, if the provider shared one.
    pub name: Option<String>,
    /// Email, if the provider shared one.
    pub email: Option<String>,
}

impl ProviderIdentity {
    /// Create a provider identity with both fields present.
    #[must_use]
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            email: Some(email.into()),
        }
    }
}

/// Where a session came from.
///
/// Only the identity resolver looks inside this; everyone else receives the
/// normalized [`UserSession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionSource {
    /// Backed by the OAuth provider's own session.
    Provider(ProviderIdentity),
    /// Issued by the credential exchange and persisted locally.
    Local(UserSession),
}

impl SessionSource {
    /// Collapse the source into a normalized session.
    ///
    /// Provider identities always become `Customer` sessions with the id
    /// `"{provider}-user"`; `issued_at` is used as their issue time. Local
    /// sessions are returned as stored.
    #[must_use]
    pub fn normalize(self, provider: &str, issued_at: DateTime<Utc>) -> UserSession {
        match self {
            Self::Provider(identity) => {
                let name = identity
                    .name
                    .filter(|name| !name.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_PROVIDER_USERNAME.to_owned());
                UserSession::new(
                    provider_user_id(provider),
                    name.clone(),
                    name,
                    identity.email.unwrap_or_default(),
                    Role::Customer,
                    issued_at,
                )
            }
            Self::Local(session) => session,
        }
    }
}

/// Conventional id for the user behind a provider session.
#[must_use]
pub fn provider_user_id(provider: &str) -> UserId {
    UserId::new(format!("{provider}-user"))
}
