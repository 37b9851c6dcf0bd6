use thiserror::Error;

use crate::types::{AccountId, ConnectionStatus};

/// A state transition the connection policy refuses.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("You cannot connect with yourself")]
    SelfConnection,

    #[error("Interaction is blocked between these accounts")]
    Blocked {
        blocker: AccountId,
        blocked: AccountId,
    },

    #[error("A connection request is already pending")]
    AlreadyPending,

    #[error("You are already connected")]
    AlreadyConnected,

    #[error("Only the recipient can respond to a connection request")]
    NotRecipient,

    #[error("Only the original requester can send the request again")]
    NotOriginalRequester,

    #[error("Connection is {0}, not pending")]
    NotPending(ConnectionStatus),

    #[error("You are not part of this connection")]
    NotParticipant,

    #[error("There is no connection between these accounts")]
    NoConnection,

    #[error("You have not blocked this account")]
    NotBlocked,

    #[error("Messaging requires an accepted connection")]
    NotConnected,
}

/// Interaction attempted on an account's own opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelfAction {
    Favorite,
    Connect,
    Message,
}

impl std::fmt::Display for SelfAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Favorite => f.write_str("You cannot favorite your own opportunity"),
            Self::Connect => f.write_str("You cannot connect with your own opportunity"),
            Self::Message => f.write_str("You cannot message your own opportunity"),
        }
    }
}

/// Input rejected before any backend call is made.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    EmptyField(&'static str),

    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("{0}")]
    SelfAction(SelfAction),

    #[error("Minimum budget cannot exceed maximum budget")]
    InvalidBudget,
}

/// Unknown text value for one of the stored enums.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {kind}: {value:?}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_action_messages_are_descriptive() {
        assert_eq!(
            ValidationError::SelfAction(SelfAction::Favorite).to_string(),
            "You cannot favorite your own opportunity"
        );
        assert_eq!(
            ValidationError::SelfAction(SelfAction::Connect).to_string(),
            "You cannot connect with your own opportunity"
        );
    }
}
