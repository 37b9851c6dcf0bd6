//! Rejects a second identical action while the first is still outstanding.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tracing::debug;
use uuid::Uuid;

use bizmatch_shared::AccountId;

use crate::error::{ClientError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Connect,
    Respond,
    Block,
    Unblock,
    Favorite,
}

type Key = (AccountId, Uuid, Action);

#[derive(Clone, Default)]
pub struct InFlightGuard {
    active: Arc<Mutex<HashSet<Key>>>,
}

impl InFlightGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim (`actor`, `target`, `action`). The claim is released when the
    /// returned ticket is dropped.
    pub fn begin(&self, actor: AccountId, target: Uuid, action: Action) -> Result<InFlightTicket> {
        let key = (actor, target, action);
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if !active.insert(key) {
            debug!(actor = %actor.short(), %target, ?action, "Duplicate request rejected");
            return Err(ClientError::DuplicateRequest);
        }
        Ok(InFlightTicket {
            active: Arc::clone(&self.active),
            key,
        })
    }

    pub fn is_active(&self, actor: AccountId, target: Uuid, action: Action) -> bool {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&(actor, target, action))
    }
}

pub struct InFlightTicket {
    active: Arc<Mutex<HashSet<Key>>>,
    key: Key,
}

impl Drop for InFlightTicket {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_is_rejected_until_released() {
        let guard = InFlightGuard::new();
        let actor = AccountId::new();
        let target = Uuid::new_v4();

        let ticket = guard.begin(actor, target, Action::Connect).unwrap();
        assert_eq!(
            guard.begin(actor, target, Action::Connect).err(),
            Some(ClientError::DuplicateRequest)
        );
        // Different action on the same target is independent.
        let _block = guard.begin(actor, target, Action::Block).unwrap();

        drop(ticket);
        assert!(!guard.is_active(actor, target, Action::Connect));
        assert!(guard.begin(actor, target, Action::Connect).is_ok());
    }
}
