//! The one piece of state shared across the client: who is signed in.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use bizmatch_shared::AccountId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum SessionState {
    Anonymous,
    SignedIn { account: AccountId },
    /// The backend rejected the credential; the UI should navigate to
    /// `redirect`.
    Expired { redirect: String },
}

/// Cloneable handle to the session. Observers hold a
/// [`watch::Receiver`] and drop it to unsubscribe.
#[derive(Clone)]
pub struct SessionContext {
    tx: Arc<watch::Sender<SessionState>>,
}

impl SessionContext {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(SessionState::Anonymous);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> SessionState {
        self.tx.borrow().clone()
    }

    pub fn account(&self) -> Option<AccountId> {
        match *self.tx.borrow() {
            SessionState::SignedIn { account } => Some(account),
            _ => None,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    pub fn signed_in(&self, account: AccountId) {
        self.tx.send_replace(SessionState::SignedIn { account });
    }

    pub fn signed_out(&self) {
        self.tx.send_replace(SessionState::Anonymous);
    }

    /// Publish the redirect once; repeated expiries do not re-notify.
    pub fn expire(&self, redirect: &str) {
        self.tx.send_if_modified(|state| {
            if matches!(state, SessionState::Expired { .. }) {
                return false;
            }
            *state = SessionState::Expired {
                redirect: redirect.to_string(),
            };
            true
        });
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}
