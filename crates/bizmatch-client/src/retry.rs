//! Retry and session guard wrapped around every backend call.
//!
//! * transient (network) failures are retried with exponential backoff;
//! * an auth failure signs the user out and publishes the sign-in redirect
//!   on the [`SessionContext`], without retrying;
//! * "no rows" on a single-row fetch becomes `Ok(None)`;
//! * anything else is returned as-is.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use bizmatch_shared::{
    AccountId, ConnectionId, ConnectionStatus, MessageId, NotificationId, OpportunityId,
    RequirementId, RequirementStatus, ThreadId,
};
use bizmatch_store::{
    Account, Block, BlockOutcome, Connection, Favorite, IndustryCategory, Message, Notification,
    Opportunity, OpportunityQuery, Requirement, Settings,
};

use crate::backend::{Backend, ChangeFilter, Subscription, Table};
use crate::error::{BackendError, BackendResult};
use crate::session::SessionContext;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_ms: 1_000,
        }
    }
}

impl RetryPolicy {
    /// Delay after the `attempt`-th failure (1-based): base, 2*base, 4*base...
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
        Duration::from_millis(self.base_backoff_ms.saturating_mul(factor))
    }
}

/// Run `call` until it succeeds, fails non-transiently, or the attempt
/// bound is reached.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    op: &'static str,
    mut call: F,
) -> BackendResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = BackendResult<T>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    op,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transient backend failure, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// [`Backend`] decorator applying the retry and session rules.
pub struct RetryingBackend<B> {
    inner: B,
    policy: RetryPolicy,
    session: SessionContext,
    sign_in_route: String,
}

impl<B: Backend> RetryingBackend<B> {
    pub fn new(inner: B, policy: RetryPolicy, session: SessionContext, sign_in_route: &str) -> Self {
        Self {
            inner,
            policy,
            session,
            sign_in_route: sign_in_route.to_string(),
        }
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    async fn call<T, F, Fut>(&self, op: &'static str, call: F) -> BackendResult<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = BackendResult<T>> + Send,
        T: Send,
    {
        match with_retry(&self.policy, op, call).await {
            Err(e) if e.is_auth() => {
                self.force_sign_out(op, &e).await;
                Err(e)
            }
            other => other,
        }
    }

    async fn single<T, F, Fut>(&self, op: &'static str, call: F) -> BackendResult<Option<T>>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = BackendResult<Option<T>>> + Send,
        T: Send,
    {
        match self.call(op, call).await {
            Err(BackendError::NoRows) => {
                debug!(op, "No rows, returning empty result");
                Ok(None)
            }
            other => other,
        }
    }

    async fn force_sign_out(&self, op: &'static str, error: &BackendError) {
        warn!(op, error = %error, redirect = %self.sign_in_route, "Session rejected, signing out");
        if let Err(e) = self.inner.sign_out().await {
            warn!(error = %e, "Sign-out after session rejection failed");
        }
        self.session.expire(&self.sign_in_route);
    }
}

#[async_trait]
impl<B: Backend> Backend for RetryingBackend<B> {
    async fn current_user(&self) -> BackendResult<Option<AccountId>> {
        self.call("current_user", move || self.inner.current_user()).await
    }

    async fn sign_out(&self) -> BackendResult<()> {
        let result = self.inner.sign_out().await;
        self.session.signed_out();
        result
    }

    async fn get_account(&self, id: AccountId) -> BackendResult<Option<Account>> {
        self.single("get_account", move || self.inner.get_account(id)).await
    }

    async fn update_my_profile(&self, account: &Account) -> BackendResult<bool> {
        self.call("update_my_profile", move || self.inner.update_my_profile(account))
            .await
    }

    async fn insert_opportunity(&self, opportunity: &Opportunity) -> BackendResult<()> {
        self.call("insert_opportunity", move || self.inner.insert_opportunity(opportunity))
            .await
    }

    async fn get_opportunity(&self, id: OpportunityId) -> BackendResult<Option<Opportunity>> {
        self.single("get_opportunity", move || self.inner.get_opportunity(id))
            .await
    }

    async fn list_opportunities(
        &self,
        query: &OpportunityQuery,
    ) -> BackendResult<Vec<Opportunity>> {
        self.call("list_opportunities", move || self.inner.list_opportunities(query))
            .await
    }

    async fn list_my_opportunities(&self) -> BackendResult<Vec<Opportunity>> {
        self.call("list_my_opportunities", move || self.inner.list_my_opportunities())
            .await
    }

    async fn set_opportunity_name_private(
        &self,
        id: OpportunityId,
        private: bool,
    ) -> BackendResult<bool> {
        self.call("set_opportunity_name_private", move || {
            self.inner.set_opportunity_name_private(id, private)
        })
        .await
    }

    async fn delete_opportunity(&self, id: OpportunityId) -> BackendResult<bool> {
        self.call("delete_opportunity", move || self.inner.delete_opportunity(id))
            .await
    }

    async fn list_industry_categories(&self) -> BackendResult<Vec<IndustryCategory>> {
        self.call("list_industry_categories", move || {
            self.inner.list_industry_categories()
        })
        .await
    }

    async fn insert_requirement(&self, requirement: &Requirement) -> BackendResult<()> {
        self.call("insert_requirement", move || self.inner.insert_requirement(requirement))
            .await
    }

    async fn get_requirement(&self, id: RequirementId) -> BackendResult<Option<Requirement>> {
        self.single("get_requirement", move || self.inner.get_requirement(id))
            .await
    }

    async fn list_requirements(&self, limit: Option<u32>) -> BackendResult<Vec<Requirement>> {
        self.call("list_requirements", move || self.inner.list_requirements(limit))
            .await
    }

    async fn set_requirement_status(
        &self,
        id: RequirementId,
        status: RequirementStatus,
    ) -> BackendResult<bool> {
        self.call("set_requirement_status", move || {
            self.inner.set_requirement_status(id, status)
        })
        .await
    }

    async fn requirement_owners_in(&self, industry: &str) -> BackendResult<Vec<AccountId>> {
        self.call("requirement_owners_in", move || {
            self.inner.requirement_owners_in(industry)
        })
        .await
    }

    async fn get_connection(&self, id: ConnectionId) -> BackendResult<Option<Connection>> {
        self.single("get_connection", move || self.inner.get_connection(id))
            .await
    }

    async fn find_connection_with(&self, other: AccountId) -> BackendResult<Option<Connection>> {
        self.single("find_connection_with", move || self.inner.find_connection_with(other))
            .await
    }

    async fn list_connections(&self) -> BackendResult<Vec<Connection>> {
        self.call("list_connections", move || self.inner.list_connections())
            .await
    }

    async fn insert_connection(&self, connection: &Connection) -> BackendResult<bool> {
        self.call("insert_connection", move || self.inner.insert_connection(connection))
            .await
    }

    async fn update_connection_status(
        &self,
        id: ConnectionId,
        status: ConnectionStatus,
    ) -> BackendResult<bool> {
        self.call("update_connection_status", move || {
            self.inner.update_connection_status(id, status)
        })
        .await
    }

    async fn reopen_connection(&self, id: ConnectionId, message: &str) -> BackendResult<bool> {
        self.call("reopen_connection", move || self.inner.reopen_connection(id, message))
            .await
    }

    async fn blocks_with(&self, other: AccountId) -> BackendResult<Vec<Block>> {
        self.call("blocks_with", move || self.inner.blocks_with(other))
            .await
    }

    async fn list_my_blocks(&self) -> BackendResult<Vec<Block>> {
        self.call("list_my_blocks", move || self.inner.list_my_blocks())
            .await
    }

    async fn block_and_disconnect(
        &self,
        blocked: AccountId,
        expected_connection: Option<ConnectionId>,
        reason: Option<&str>,
    ) -> BackendResult<BlockOutcome> {
        self.call("block_and_disconnect", move || {
            self.inner
                .block_and_disconnect(blocked, expected_connection, reason)
        })
        .await
    }

    async fn delete_block(&self, blocked: AccountId) -> BackendResult<bool> {
        self.call("delete_block", move || self.inner.delete_block(blocked))
            .await
    }

    async fn insert_message(&self, message: &Message) -> BackendResult<()> {
        self.call("insert_message", move || self.inner.insert_message(message))
            .await
    }

    async fn thread_id_with(&self, other: AccountId) -> BackendResult<Option<ThreadId>> {
        self.single("thread_id_with", move || self.inner.thread_id_with(other))
            .await
    }

    async fn thread_with(&self, other: AccountId) -> BackendResult<Vec<Message>> {
        self.call("thread_with", move || self.inner.thread_with(other))
            .await
    }

    async fn inbox(&self, limit: u32, offset: u32) -> BackendResult<Vec<Message>> {
        self.call("inbox", move || self.inner.inbox(limit, offset)).await
    }

    async fn search_messages(&self, term: &str, limit: u32) -> BackendResult<Vec<Message>> {
        self.call("search_messages", move || self.inner.search_messages(term, limit))
            .await
    }

    async fn unread_message_count(&self) -> BackendResult<u32> {
        self.call("unread_message_count", move || self.inner.unread_message_count())
            .await
    }

    async fn mark_message_read(&self, id: MessageId) -> BackendResult<bool> {
        self.call("mark_message_read", move || self.inner.mark_message_read(id))
            .await
    }

    async fn insert_notification(&self, notification: &Notification) -> BackendResult<()> {
        self.call("insert_notification", move || {
            self.inner.insert_notification(notification)
        })
        .await
    }

    async fn list_notifications(&self) -> BackendResult<Vec<Notification>> {
        self.call("list_notifications", move || self.inner.list_notifications())
            .await
    }

    async fn mark_notification_read(&self, id: NotificationId) -> BackendResult<bool> {
        self.call("mark_notification_read", move || {
            self.inner.mark_notification_read(id)
        })
        .await
    }

    async fn mark_all_notifications_read(&self) -> BackendResult<usize> {
        self.call("mark_all_notifications_read", move || {
            self.inner.mark_all_notifications_read()
        })
        .await
    }

    async fn archive_notification(&self, id: NotificationId) -> BackendResult<bool> {
        self.call("archive_notification", move || self.inner.archive_notification(id))
            .await
    }

    async fn get_favorite(&self, opportunity: OpportunityId) -> BackendResult<Option<Favorite>> {
        self.single("get_favorite", move || self.inner.get_favorite(opportunity))
            .await
    }

    async fn upsert_favorite(
        &self,
        opportunity: OpportunityId,
        is_favorite: bool,
    ) -> BackendResult<Favorite> {
        self.call("upsert_favorite", move || {
            self.inner.upsert_favorite(opportunity, is_favorite)
        })
        .await
    }

    async fn get_settings(&self) -> BackendResult<Option<Settings>> {
        self.single("get_settings", move || self.inner.get_settings())
            .await
    }

    async fn upsert_settings(&self, settings: &Settings) -> BackendResult<()> {
        self.call("upsert_settings", move || self.inner.upsert_settings(settings))
            .await
    }

    fn subscribe(&self, table: Table, filter: ChangeFilter) -> Subscription {
        self.inner.subscribe(table, filter)
    }
}
