//! Session commands.

use techland_storefront::identity::{AuthState, CredentialForm, HttpCredentialExchange};

use super::{CliError, Shell};

impl Shell {
    /// Log in through the configured credential endpoint.
    ///
    /// # Errors
    ///
    /// Returns `CliError::LoginUnavailable` without an endpoint, or the
    /// identity error if the login is refused.
    #[allow(clippy::print_stdout)]
    pub async fn session_login(&self, username: String, password: String) -> Result<(), CliError> {
        let endpoint = self
            .config
            .identity
            .auth_url
            .as_deref()
            .ok_or(CliError::LoginUnavailable)?;
        let exchange = HttpCredentialExchange::new(endpoint);

        let session = self
            .tab
            .identity()
            .login_with_credentials(&exchange, &CredentialForm::new(username, password))
            .await?;

        println!("Logged in as {} ({})", session.display_name, session.role());
        Ok(())
    }

    /// Log out of the current session.
    ///
    /// # Errors
    ///
    /// Returns the identity error if the logout fails.
    #[allow(clippy::print_stdout)]
    pub async fn session_logout(&self) -> Result<(), CliError> {
        let was_authenticated = self.tab.identity().is_authenticated();
        let redirect = self.tab.identity().logout().await?;

        if was_authenticated {
            println!("Logged out; continue at {redirect}");
        } else {
            println!("No active session");
        }
        Ok(())
    }

    /// Print the current user.
    #[allow(clippy::print_stdout)]
    pub fn session_show(&self) {
        let identity = self.tab.identity();
        let Some(user) = identity.current_user() else {
            println!("Not logged in");
            return;
        };

        let source = match identity.state() {
            AuthState::Provider => "provider",
            AuthState::Local => "local",
            AuthState::Unauthenticated => "none",
        };
        println!("User:     {} ({})", user.display_name, user.username);
        println!("Id:       {}", user.id);
        println!("Email:    {}", user.email);
        println!("Role:     {}", user.role());
        println!("Source:   {source}");
        println!("Since:    {}", user.issued_at.to_rfc3339());
    }
}
