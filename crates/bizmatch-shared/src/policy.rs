//! Connection / blocking state machine for an unordered pair of accounts.
//!
//! The policy is pure: it looks at the rows that currently exist between two
//! accounts (at most one connection, zero to two blocks) and decides whether
//! an action is legal and which writes it needs. Callers apply the returned
//! plan against the backend.

use serde::{Deserialize, Serialize};

use crate::error::{PolicyError, ValidationError};
use crate::types::{AccountId, ConnectionId, ConnectionResponse, ConnectionStatus};
use crate::constants::MAX_INTRO_MESSAGE_LEN;

/// The connection row between a pair, reduced to what the policy needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionFact {
    pub id: ConnectionId,
    pub requester: AccountId,
    pub recipient: AccountId,
    pub status: ConnectionStatus,
}

/// A block row, reduced to its direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockFact {
    pub blocker: AccountId,
    pub blocked: AccountId,
}

/// Derived relationship between two accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum PairState {
    None,
    Pending {
        requester: AccountId,
        recipient: AccountId,
    },
    Accepted,
    Declined {
        requester: AccountId,
        recipient: AccountId,
    },
    Blocked {
        blocker: AccountId,
        blocked: AccountId,
    },
}

impl PairState {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked { .. })
    }
}

/// How a request should be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPlan {
    /// Insert a fresh pending row.
    Create,
    /// Overwrite the declined row in place with status pending.
    Reopen(ConnectionId),
}

/// Writes needed to block `blocked` on behalf of `blocker`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPlan {
    pub blocker: AccountId,
    pub blocked: AccountId,
    /// False when the same block already exists.
    pub create_block: bool,
    pub remove_connection: Option<ConnectionId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnblockPlan {
    pub blocker: AccountId,
    pub blocked: AccountId,
    /// The other account still blocks the actor after this removal.
    pub still_blocked: bool,
}

/// Everything stored between two accounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pair {
    a: AccountId,
    b: AccountId,
    connection: Option<ConnectionFact>,
    blocks: Vec<BlockFact>,
}

impl Pair {
    pub fn new(
        a: AccountId,
        b: AccountId,
        connection: Option<ConnectionFact>,
        blocks: Vec<BlockFact>,
    ) -> Self {
        let involves = |x: AccountId, y: AccountId| (x == a && y == b) || (x == b && y == a);
        let connection = connection.filter(|c| involves(c.requester, c.recipient));
        let blocks = blocks
            .into_iter()
            .filter(|blk| involves(blk.blocker, blk.blocked))
            .collect();
        Self {
            a,
            b,
            connection,
            blocks,
        }
    }

    pub fn connection(&self) -> Option<&ConnectionFact> {
        self.connection.as_ref()
    }

    pub fn blocks(&self) -> &[BlockFact] {
        &self.blocks
    }

    /// Blocks win over any connection row that may still be present.
    pub fn state(&self) -> PairState {
        if let Some(block) = self.blocks.first() {
            return PairState::Blocked {
                blocker: block.blocker,
                blocked: block.blocked,
            };
        }
        match self.connection {
            None => PairState::None,
            Some(c) => match c.status {
                ConnectionStatus::Pending => PairState::Pending {
                    requester: c.requester,
                    recipient: c.recipient,
                },
                ConnectionStatus::Accepted => PairState::Accepted,
                ConnectionStatus::Declined => PairState::Declined {
                    requester: c.requester,
                    recipient: c.recipient,
                },
            },
        }
    }

    fn other(&self, actor: AccountId) -> Result<AccountId, PolicyError> {
        if actor == self.a {
            Ok(self.b)
        } else if actor == self.b {
            Ok(self.a)
        } else {
            Err(PolicyError::NotParticipant)
        }
    }

    /// `none -> pending`, or `declined -> pending` for the original requester.
    pub fn request(&self, actor: AccountId) -> Result<RequestPlan, PolicyError> {
        if self.a == self.b {
            return Err(PolicyError::SelfConnection);
        }
        self.other(actor)?;
        match self.state() {
            PairState::Blocked { blocker, blocked } => Err(PolicyError::Blocked { blocker, blocked }),
            PairState::None => Ok(RequestPlan::Create),
            PairState::Pending { .. } => Err(PolicyError::AlreadyPending),
            PairState::Accepted => Err(PolicyError::AlreadyConnected),
            PairState::Declined { requester, .. } => {
                if requester != actor {
                    return Err(PolicyError::NotOriginalRequester);
                }
                let id = self.connection.map(|c| c.id).ok_or(PolicyError::NoConnection)?;
                Ok(RequestPlan::Reopen(id))
            }
        }
    }

    /// `pending -> accepted | declined`, recipient only.
    pub fn respond(
        &self,
        actor: AccountId,
        response: ConnectionResponse,
    ) -> Result<ConnectionStatus, PolicyError> {
        self.other(actor)?;
        if let PairState::Blocked { blocker, blocked } = self.state() {
            return Err(PolicyError::Blocked { blocker, blocked });
        }
        let connection = self.connection.ok_or(PolicyError::NoConnection)?;
        if connection.status != ConnectionStatus::Pending {
            return Err(PolicyError::NotPending(connection.status));
        }
        if connection.recipient != actor {
            return Err(PolicyError::NotRecipient);
        }
        Ok(response.resulting_status())
    }

    /// Either party may block. Re-blocking is a no-op on the block row but
    /// still removes any connection that survived.
    pub fn block(&self, actor: AccountId) -> Result<BlockPlan, PolicyError> {
        let target = self.other(actor)?;
        if actor == target {
            return Err(PolicyError::SelfConnection);
        }
        let exists = self
            .blocks
            .iter()
            .any(|b| b.blocker == actor && b.blocked == target);
        Ok(BlockPlan {
            blocker: actor,
            blocked: target,
            create_block: !exists,
            remove_connection: self.connection.map(|c| c.id),
        })
    }

    /// `blocked -> none`. Prior connection history is not restored.
    pub fn unblock(&self, actor: AccountId) -> Result<UnblockPlan, PolicyError> {
        let target = self.other(actor)?;
        if !self
            .blocks
            .iter()
            .any(|b| b.blocker == actor && b.blocked == target)
        {
            return Err(PolicyError::NotBlocked);
        }
        let still_blocked = self
            .blocks
            .iter()
            .any(|b| b.blocker == target && b.blocked == actor);
        Ok(UnblockPlan {
            blocker: actor,
            blocked: target,
            still_blocked,
        })
    }

    pub fn can_message(&self, actor: AccountId) -> Result<(), PolicyError> {
        self.other(actor)?;
        match self.state() {
            PairState::Accepted => Ok(()),
            PairState::Blocked { blocker, blocked } => Err(PolicyError::Blocked { blocker, blocked }),
            _ => Err(PolicyError::NotConnected),
        }
    }
}

/// Trim and check an introduction message.
pub fn validate_intro_message(message: &str) -> Result<&str, ValidationError> {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("Introduction message"));
    }
    if trimmed.chars().count() > MAX_INTRO_MESSAGE_LEN {
        return Err(ValidationError::TooLong {
            field: "Introduction message",
            max: MAX_INTRO_MESSAGE_LEN,
        });
    }
    Ok(trimmed)
}

/// Budgets are optional, non-negative and ordered.
pub fn validate_budget(min: Option<f64>, max: Option<f64>) -> Result<(), ValidationError> {
    let invalid = |v: Option<f64>| v.is_some_and(|v| v < 0.0 || !v.is_finite());
    if invalid(min) || invalid(max) {
        return Err(ValidationError::InvalidBudget);
    }
    if let (Some(min), Some(max)) = (min, max) {
        if min > max {
            return Err(ValidationError::InvalidBudget);
        }
    }
    Ok(())
}
