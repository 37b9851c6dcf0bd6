use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ParseEnumError;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Identity of a registered business. Immutable after creation.
    AccountId
);
uuid_id!(OpportunityId);
uuid_id!(ConnectionId);
uuid_id!(MessageId);
uuid_id!(
    /// Groups the messages of one conversation.
    ThreadId
);
uuid_id!(NotificationId);
uuid_id!(
    /// A posted lead request.
    RequirementId
);
uuid_id!(CategoryId);

impl AccountId {
    /// First eight characters of the id, for log lines.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

/// Canonical key of an unordered pair of accounts: the smaller id first.
pub fn pair_key(a: AccountId, b: AccountId) -> (AccountId, AccountId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(ParseEnumError {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

text_enum!(
    /// Stored status of a connection row.
    ConnectionStatus {
        Pending => "pending",
        Accepted => "accepted",
        Declined => "declined",
    }
);

text_enum!(
    /// Direction of an opportunity listing.
    OpportunityKind {
        Buying => "buying",
        Selling => "selling",
    }
);

text_enum!(ContactPreference {
    Email => "email",
    Phone => "phone",
});

text_enum!(NotificationCategory {
    Message => "message",
    Connection => "connection",
    Opportunity => "opportunity",
    System => "system",
    Alert => "alert",
});

text_enum!(NotificationPriority {
    Low => "low",
    Medium => "medium",
    High => "high",
    Urgent => "urgent",
});

text_enum!(
    /// Recipient's answer to a pending connection request.
    ConnectionResponse {
        Accept => "accept",
        Decline => "decline",
    }
);

text_enum!(
    /// Lifecycle of a posted lead request.
    RequirementStatus {
        Open => "open",
        InProgress => "in-progress",
        Closed => "closed",
    }
);

text_enum!(Theme {
    Light => "light",
    Dark => "dark",
    System => "system",
});

text_enum!(TimeFormat {
    TwelveHour => "12h",
    TwentyFourHour => "24h",
});

text_enum!(ProfileVisibility {
    Public => "public",
    Connections => "connections",
    Private => "private",
});

impl ConnectionResponse {
    pub fn resulting_status(self) -> ConnectionStatus {
        match self {
            Self::Accept => ConnectionStatus::Accepted,
            Self::Decline => ConnectionStatus::Declined,
        }
    }
}
