//! Application state shared by every command.
//!
//! [`AppState`] is cheap to clone; every clone talks to the same backend,
//! session and in-flight registry.

use std::sync::Arc;

use tracing::info;

use bizmatch_shared::AccountId;

use crate::backend::Backend;
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::inflight::InFlightGuard;
use crate::local::LocalServer;
use crate::retry::RetryingBackend;
use crate::session::SessionContext;

#[derive(Clone)]
pub struct AppState {
    /// Backend wrapped in the retry / session guard.
    pub backend: Arc<dyn Backend>,

    /// Who is signed in; observers subscribe for the sign-in redirect.
    pub session: SessionContext,

    /// Deduplicates connect / respond / block / favorite actions.
    pub inflight: InFlightGuard,

    pub config: ClientConfig,
}

impl AppState {
    /// Wrap `backend` in [`RetryingBackend`] using the retry settings from
    /// `config`.
    pub fn new<B: Backend>(backend: B, config: ClientConfig) -> Self {
        let session = SessionContext::new();
        let backend = RetryingBackend::new(
            backend,
            config.retry.clone(),
            session.clone(),
            &config.sign_in_route,
        );
        Self {
            backend: Arc::new(backend),
            session,
            inflight: InFlightGuard::new(),
            config,
        }
    }

    /// State for `account` signed in to a [`LocalServer`].
    pub async fn local(
        server: &LocalServer,
        account: AccountId,
        config: ClientConfig,
    ) -> Result<Self> {
        let app = Self::new(server.sign_in(account), config);
        app.restore_session().await?;
        Ok(app)
    }

    /// Ask the backend who is signed in and publish it on the session.
    pub async fn restore_session(&self) -> Result<Option<AccountId>> {
        let user = self.backend.current_user().await?;
        match user {
            Some(account) => {
                info!(account = %account.short(), "Session restored");
                self.session.signed_in(account);
            }
            None => self.session.signed_out(),
        }
        Ok(user)
    }

    pub async fn sign_out(&self) -> Result<()> {
        self.backend.sign_out().await?;
        info!("Signed out");
        Ok(())
    }

    /// The signed-in account; fails for anonymous or expired sessions.
    pub(crate) async fn require_user(&self) -> Result<AccountId> {
        self.backend
            .current_user()
            .await?
            .ok_or(ClientError::NotAuthenticated)
    }

    /// The signed-in account, or `None` for anonymous browsing.
    pub(crate) async fn viewer(&self) -> Result<Option<AccountId>> {
        Ok(self.backend.current_user().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionState;
    use chrono::{Duration, Utc};

    fn register(server: &LocalServer) -> AccountId {
        let account = bizmatch_store::Account {
            id: AccountId::new(),
            company_name: "Acme".into(),
            industry: "Retail".into(),
            location: "Berlin, Germany".into(),
            description: String::new(),
            contact_email: "acme@example.com".into(),
            contact_phone: "+49 30 1234".into(),
            avatar_url: None,
            created_at: Utc::now(),
        };
        server.register(&account).unwrap();
        account.id
    }

    #[tokio::test]
    async fn restores_and_expires_session() {
        let server = LocalServer::in_memory().unwrap();
        let id = register(&server);

        let app = AppState::local(&server, id, ClientConfig::default())
            .await
            .unwrap();
        assert_eq!(app.session.account(), Some(id));
        assert_eq!(app.require_user().await, Ok(id));

        let expired = AppState::new(
            server.sign_in_for(id, Duration::seconds(-1)),
            ClientConfig::default(),
        );
        assert_eq!(expired.require_user().await, Err(ClientError::SessionExpired));
        assert_eq!(
            expired.session.current(),
            SessionState::Expired {
                redirect: "/sign-in".into()
            }
        );
        // The forced sign-out dropped the credential.
        assert_eq!(expired.viewer().await, Ok(None));
    }
}
