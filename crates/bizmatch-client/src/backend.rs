//! The seam between domain operations and the hosted store.
//!
//! Every query runs under the identity of the signed-in account, the way a
//! row-level-security backend scopes them: methods without an account
//! argument act on "my" rows. Single-row fetches return `Ok(None)` or
//! [`BackendError::NoRows`] depending on the implementation;
//! [`RetryingBackend`](crate::retry::RetryingBackend) normalizes the latter.

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::warn;

use bizmatch_shared::{
    AccountId, ConnectionId, ConnectionStatus, MessageId, NotificationId, OpportunityId,
    RequirementId, RequirementStatus, ThreadId,
};
use bizmatch_store::{
    Account, Block, BlockOutcome, Connection, Favorite, IndustryCategory, Message, Notification,
    Opportunity, OpportunityQuery, Requirement, Settings,
};

use crate::error::BackendResult;

#[async_trait]
pub trait Backend: Send + Sync + 'static {
    // -- session -----------------------------------------------------------

    /// The signed-in account, `None` for an anonymous session.
    async fn current_user(&self) -> BackendResult<Option<AccountId>>;
    async fn sign_out(&self) -> BackendResult<()>;

    // -- accounts ----------------------------------------------------------

    async fn get_account(&self, id: AccountId) -> BackendResult<Option<Account>>;
    /// Overwrite my profile fields. `account.id` must be mine.
    async fn update_my_profile(&self, account: &Account) -> BackendResult<bool>;

    // -- opportunities -----------------------------------------------------

    async fn insert_opportunity(&self, opportunity: &Opportunity) -> BackendResult<()>;
    async fn get_opportunity(&self, id: OpportunityId) -> BackendResult<Option<Opportunity>>;
    async fn list_opportunities(&self, query: &OpportunityQuery)
        -> BackendResult<Vec<Opportunity>>;
    async fn list_my_opportunities(&self) -> BackendResult<Vec<Opportunity>>;
    async fn set_opportunity_name_private(
        &self,
        id: OpportunityId,
        private: bool,
    ) -> BackendResult<bool>;
    async fn delete_opportunity(&self, id: OpportunityId) -> BackendResult<bool>;

    // -- requirements ------------------------------------------------------

    async fn list_industry_categories(&self) -> BackendResult<Vec<IndustryCategory>>;
    async fn insert_requirement(&self, requirement: &Requirement) -> BackendResult<()>;
    async fn get_requirement(&self, id: RequirementId) -> BackendResult<Option<Requirement>>;
    /// Newest first; `None` lists all.
    async fn list_requirements(&self, limit: Option<u32>) -> BackendResult<Vec<Requirement>>;
    async fn set_requirement_status(
        &self,
        id: RequirementId,
        status: RequirementStatus,
    ) -> BackendResult<bool>;
    /// Owners of open requests filed under the `industry` category.
    async fn requirement_owners_in(&self, industry: &str) -> BackendResult<Vec<AccountId>>;

    // -- connections -------------------------------------------------------

    async fn get_connection(&self, id: ConnectionId) -> BackendResult<Option<Connection>>;
    async fn find_connection_with(&self, other: AccountId) -> BackendResult<Option<Connection>>;
    async fn list_connections(&self) -> BackendResult<Vec<Connection>>;
    /// Returns `false` without writing when either side blocks the other.
    async fn insert_connection(&self, connection: &Connection) -> BackendResult<bool>;
    /// Only a pending row is answered; `false` otherwise.
    async fn update_connection_status(
        &self,
        id: ConnectionId,
        status: ConnectionStatus,
    ) -> BackendResult<bool>;
    /// Overwrite a declined row as pending with a new message, unless the
    /// pair is blocked.
    async fn reopen_connection(&self, id: ConnectionId, message: &str) -> BackendResult<bool>;

    // -- blocks ------------------------------------------------------------

    /// Blocks in either direction between me and `other`.
    async fn blocks_with(&self, other: AccountId) -> BackendResult<Vec<Block>>;
    async fn list_my_blocks(&self) -> BackendResult<Vec<Block>>;
    /// Insert the block (if missing) and delete the pair's connection in one
    /// transaction. With `expected_connection`, fails without writing when
    /// that row does not join the pair.
    async fn block_and_disconnect(
        &self,
        blocked: AccountId,
        expected_connection: Option<ConnectionId>,
        reason: Option<&str>,
    ) -> BackendResult<BlockOutcome>;
    async fn delete_block(&self, blocked: AccountId) -> BackendResult<bool>;

    // -- messages ----------------------------------------------------------

    async fn insert_message(&self, message: &Message) -> BackendResult<()>;
    async fn thread_id_with(&self, other: AccountId) -> BackendResult<Option<ThreadId>>;
    async fn thread_with(&self, other: AccountId) -> BackendResult<Vec<Message>>;
    async fn inbox(&self, limit: u32, offset: u32) -> BackendResult<Vec<Message>>;
    async fn search_messages(&self, term: &str, limit: u32) -> BackendResult<Vec<Message>>;
    async fn unread_message_count(&self) -> BackendResult<u32>;
    async fn mark_message_read(&self, id: MessageId) -> BackendResult<bool>;

    // -- notifications -----------------------------------------------------

    async fn insert_notification(&self, notification: &Notification) -> BackendResult<()>;
    async fn list_notifications(&self) -> BackendResult<Vec<Notification>>;
    async fn mark_notification_read(&self, id: NotificationId) -> BackendResult<bool>;
    async fn mark_all_notifications_read(&self) -> BackendResult<usize>;
    async fn archive_notification(&self, id: NotificationId) -> BackendResult<bool>;

    // -- favorites & settings ---------------------------------------------

    async fn get_favorite(&self, opportunity: OpportunityId) -> BackendResult<Option<Favorite>>;
    async fn upsert_favorite(
        &self,
        opportunity: OpportunityId,
        is_favorite: bool,
    ) -> BackendResult<Favorite>;
    async fn get_settings(&self) -> BackendResult<Option<Settings>>;
    async fn upsert_settings(&self, settings: &Settings) -> BackendResult<()>;

    // -- realtime ----------------------------------------------------------

    /// Change feed for `table`, narrowed by `filter`. Drop the returned
    /// handle to unsubscribe.
    fn subscribe(&self, table: Table, filter: ChangeFilter) -> Subscription;
}

/// Tables that publish change events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Accounts,
    Opportunities,
    Requirements,
    Connections,
    BlockedUsers,
    Messages,
    Notifications,
    FavoriteOpportunities,
    Settings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A row changed. `accounts` lists the accounts the row belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    pub accounts: Vec<AccountId>,
}

impl ChangeEvent {
    pub fn new(table: Table, kind: ChangeKind, accounts: impl Into<Vec<AccountId>>) -> Self {
        Self {
            table,
            kind,
            accounts: accounts.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeFilter {
    All,
    /// Only rows that involve this account.
    Account(AccountId),
    /// Only rows that involve both accounts.
    Pair(AccountId, AccountId),
}

impl ChangeFilter {
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        match self {
            ChangeFilter::All => true,
            ChangeFilter::Account(id) => event.accounts.contains(id),
            ChangeFilter::Pair(a, b) => event.accounts.contains(a) && event.accounts.contains(b),
        }
    }
}

/// Receiving half of a change feed.
pub struct Subscription {
    table: Table,
    filter: ChangeFilter,
    rx: broadcast::Receiver<ChangeEvent>,
}

impl Subscription {
    pub fn new(table: Table, filter: ChangeFilter, rx: broadcast::Receiver<ChangeEvent>) -> Self {
        Self { table, filter, rx }
    }

    pub fn table(&self) -> Table {
        self.table
    }

    /// Wait for the next matching event. Returns `None` once the feed is
    /// closed. A lagging receiver yields a synthetic update so the caller
    /// re-fetches instead of missing changes.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.table == self.table && self.filter.matches(&event) => {
                    return Some(event)
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(table = ?self.table, skipped, "Change feed lagged, forcing refresh");
                    return Some(ChangeEvent::new(self.table, ChangeKind::Update, Vec::new()));
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
