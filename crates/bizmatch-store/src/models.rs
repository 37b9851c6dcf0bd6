//! Domain model structs persisted in the local SQLite database.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to a UI layer.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use bizmatch_shared::policy::{BlockFact, ConnectionFact};
use bizmatch_shared::visibility::ListingFacts;
use bizmatch_shared::{
    AccountId, CategoryId, ConnectionId, ConnectionStatus, ContactPreference, MessageId,
    NotificationCategory, NotificationId, NotificationPriority, OpportunityId, OpportunityKind,
    ProfileVisibility, RequirementId, RequirementStatus, ThreadId, Theme, TimeFormat,
};

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

/// A registered business and its public profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub id: AccountId,
    pub company_name: String,
    pub industry: String,
    pub location: String,
    pub description: String,
    pub contact_email: String,
    pub contact_phone: String,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The profile fields shown next to a connection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileSummary {
    pub company_name: String,
    pub industry: String,
    pub location: String,
    pub description: String,
}

impl From<&Account> for ProfileSummary {
    fn from(a: &Account) -> Self {
        Self {
            company_name: a.company_name.clone(),
            industry: a.industry.clone(),
            location: a.location.clone(),
            description: a.description.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Opportunity
// ---------------------------------------------------------------------------

/// A buy or sell listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Opportunity {
    pub id: OpportunityId,
    pub owner_id: AccountId,
    pub kind: OpportunityKind,
    pub business_name: String,
    pub industry: String,
    pub description: String,
    pub contact_email: String,
    pub contact_phone: String,
    /// "City, Country".
    pub location: String,
    pub company_size: Option<String>,
    pub timeline: Option<String>,
    pub budget_min: Option<f64>,
    pub budget_max: Option<f64>,
    pub requirements: Option<String>,
    pub preferred_contact: ContactPreference,
    /// Hide `business_name` from viewers who are not connected to the owner.
    pub name_private: bool,
    pub created_at: DateTime<Utc>,
}

impl Opportunity {
    pub fn listing_facts(&self) -> ListingFacts<'_> {
        ListingFacts {
            owner: self.owner_id,
            business_name: &self.business_name,
            name_private: self.name_private,
            contact_email: &self.contact_email,
            contact_phone: &self.contact_phone,
        }
    }
}

/// Column an opportunity listing can be sorted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunitySort {
    #[default]
    Date,
    BusinessName,
    Industry,
    Location,
}

impl OpportunitySort {
    pub(crate) fn column(self) -> &'static str {
        match self {
            Self::Date => "created_at",
            Self::BusinessName => "business_name",
            Self::Industry => "industry",
            Self::Location => "location",
        }
    }
}

/// Filter and ordering for the public opportunity board.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OpportunityQuery {
    pub kind: Option<OpportunityKind>,
    /// Case-insensitive match on business name or description.
    pub search: Option<String>,
    pub industries: Vec<String>,
    pub locations: Vec<String>,
    pub sort: OpportunitySort,
    pub ascending: bool,
}

// ---------------------------------------------------------------------------
// Requirement
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndustryCategory {
    pub id: CategoryId,
    pub name: String,
}

/// A lead request: what a business is looking for, filed under categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Requirement {
    pub id: RequirementId,
    pub owner_id: AccountId,
    pub title: String,
    pub description: String,
    pub target_customer: Option<String>,
    pub budget_min: Option<f64>,
    pub budget_max: Option<f64>,
    pub deadline: Option<NaiveDate>,
    pub status: RequirementStatus,
    /// Ordered by name.
    pub categories: Vec<IndustryCategory>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// A request between two accounts; symmetric once accepted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Connection {
    pub id: ConnectionId,
    pub requester_id: AccountId,
    pub recipient_id: AccountId,
    pub status: ConnectionStatus,
    pub request_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Connection {
    pub fn fact(&self) -> ConnectionFact {
        ConnectionFact {
            id: self.id,
            requester: self.requester_id,
            recipient: self.recipient_id,
            status: self.status,
        }
    }

    /// The other side of the connection, if `account` is part of it.
    pub fn counterpart(&self, account: AccountId) -> Option<AccountId> {
        if self.requester_id == account {
            Some(self.recipient_id)
        } else if self.recipient_id == account {
            Some(self.requester_id)
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Block
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Block {
    pub blocker_id: AccountId,
    pub blocked_id: AccountId,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Block {
    pub fn fact(&self) -> BlockFact {
        BlockFact {
            blocker: self.blocker_id,
            blocked: self.blocked_id,
        }
    }
}

/// Result of the atomic block operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockOutcome {
    pub block_created: bool,
    pub connection_removed: bool,
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub thread_id: ThreadId,
    pub sender_id: AccountId,
    pub recipient_id: AccountId,
    pub content: String,
    pub is_read: bool,
    pub reply_to_id: Option<MessageId>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: NotificationId,
    pub owner_id: AccountId,
    pub category: NotificationCategory,
    pub priority: NotificationPriority,
    pub title: String,
    pub body: String,
    pub metadata: serde_json::Value,
    pub action_url: Option<String>,
    pub related_id: Option<String>,
    pub read: bool,
    pub archived: bool,
    pub group_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Favorite
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Favorite {
    pub user_id: AccountId,
    pub opportunity_id: OpportunityId,
    pub is_favorite: bool,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmailNotifications {
    pub messages: bool,
    pub connections: bool,
    pub opportunities: bool,
    pub system: bool,
    pub marketing: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PushNotifications {
    pub messages: bool,
    pub connections: bool,
    pub opportunities: bool,
    pub system: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrivacySettings {
    pub profile_visibility: ProfileVisibility,
    pub show_email: bool,
    pub show_phone: bool,
    pub allow_messages: bool,
}

/// Per-account preferences.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Settings {
    pub user_id: AccountId,
    pub theme: Theme,
    pub language: String,
    pub timezone: String,
    pub date_format: String,
    pub time_format: TimeFormat,
    pub currency: String,
    pub email_notifications: EmailNotifications,
    pub push_notifications: PushNotifications,
    pub privacy: PrivacySettings,
    pub updated_at: DateTime<Utc>,
}

impl Settings {
    /// The preferences a new account starts with.
    pub fn defaults_for(user_id: AccountId) -> Self {
        Self {
            user_id,
            theme: Theme::Light,
            language: "en".to_string(),
            timezone: "UTC".to_string(),
            date_format: "MM/DD/YYYY".to_string(),
            time_format: TimeFormat::TwelveHour,
            currency: "USD".to_string(),
            email_notifications: EmailNotifications {
                messages: true,
                connections: true,
                opportunities: true,
                system: true,
                marketing: false,
            },
            push_notifications: PushNotifications {
                messages: true,
                connections: true,
                opportunities: true,
                system: true,
            },
            privacy: PrivacySettings {
                profile_visibility: ProfileVisibility::Public,
                show_email: true,
                show_phone: true,
                allow_messages: true,
            },
            updated_at: Utc::now(),
        }
    }
}
