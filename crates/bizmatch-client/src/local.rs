//! In-process backend over the SQLite store.
//!
//! [`LocalServer`] owns the database and the change feed; each
//! [`LocalBackend`] handle carries one session and applies the same
//! ownership rules a hosted backend enforces with row-level security.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::broadcast;
use tracing::{debug, info};

use bizmatch_shared::{
    AccountId, ConnectionId, ConnectionStatus, MessageId, NotificationId, OpportunityId,
    RequirementId, RequirementStatus, ThreadId,
};
use bizmatch_store::{
    Account, Block, BlockOutcome, Connection, Database, Favorite, IndustryCategory, Message,
    Notification, Opportunity, OpportunityQuery, Requirement, Settings, StoreError,
};

use crate::backend::{Backend, ChangeEvent, ChangeFilter, ChangeKind, Subscription, Table};
use crate::config::ClientConfig;
use crate::error::{BackendError, BackendResult};

const CHANGE_FEED_CAPACITY: usize = 256;

/// Lifetime of a session handed out by [`LocalServer::sign_in`].
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 1;

struct Shared {
    db: Mutex<Database>,
    changes: broadcast::Sender<ChangeEvent>,
    faults: Mutex<VecDeque<BackendError>>,
    calls: AtomicUsize,
}

impl Shared {
    fn db(&self) -> BackendResult<MutexGuard<'_, Database>> {
        self.db.lock().map_err(|e| BackendError::Rejected {
            status: 500,
            message: format!("Lock poisoned: {e}"),
        })
    }

    fn emit(&self, table: Table, kind: ChangeKind, accounts: impl Into<Vec<AccountId>>) {
        // No receivers is not an error.
        let _ = self.changes.send(ChangeEvent::new(table, kind, accounts));
    }

    fn next_fault(&self) -> Option<BackendError> {
        self.faults.lock().ok().and_then(|mut q| q.pop_front())
    }
}

/// Owner of the local database and change feed.
#[derive(Clone)]
pub struct LocalServer {
    shared: Arc<Shared>,
}

impl LocalServer {
    pub fn new(db: Database) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                db: Mutex::new(db),
                changes,
                faults: Mutex::new(VecDeque::new()),
                calls: AtomicUsize::new(0),
            }),
        }
    }

    /// Open the database named by `config`, or the platform default.
    pub fn open(config: &ClientConfig) -> Result<Self, StoreError> {
        let db = match config.db_path {
            Some(ref path) => Database::open_at(path)?,
            None => Database::new()?,
        };
        info!(path = ?db.path(), "Local backend ready");
        Ok(Self::new(db))
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    /// Sign-up: create the account row.
    pub fn register(&self, account: &Account) -> BackendResult<()> {
        self.shared.db()?.insert_account(account)?;
        self.shared
            .emit(Table::Accounts, ChangeKind::Insert, vec![account.id]);
        info!(account = %account.id.short(), "Account registered");
        Ok(())
    }

    pub fn sign_in(&self, account: AccountId) -> LocalBackend {
        self.sign_in_for(account, Duration::hours(DEFAULT_SESSION_TTL_HOURS))
    }

    /// Session that expires after `ttl`; a zero or negative `ttl` yields an
    /// already-expired session.
    pub fn sign_in_for(&self, account: AccountId, ttl: Duration) -> LocalBackend {
        debug!(account = %account.short(), "Session opened");
        LocalBackend {
            shared: Arc::clone(&self.shared),
            session: Mutex::new(Some(LocalSession {
                account,
                expires_at: Utc::now() + ttl,
            })),
        }
    }

    pub fn anonymous(&self) -> LocalBackend {
        LocalBackend {
            shared: Arc::clone(&self.shared),
            session: Mutex::new(None),
        }
    }

    /// Fail the next calls, in order, with `errors`. Lets callers exercise
    /// retry and sign-out paths against a real store.
    pub fn inject_failures(&self, errors: impl IntoIterator<Item = BackendError>) {
        if let Ok(mut faults) = self.shared.faults.lock() {
            faults.extend(errors);
        }
    }

    /// Number of backend calls served so far, including failed ones.
    pub fn call_count(&self) -> usize {
        self.shared.calls.load(Ordering::SeqCst)
    }

    /// Direct read access to the store.
    pub fn with_db<T>(&self, f: impl FnOnce(&Database) -> T) -> BackendResult<T> {
        let db = self.shared.db()?;
        Ok(f(&db))
    }
}

#[derive(Debug, Clone, Copy)]
struct LocalSession {
    account: AccountId,
    expires_at: DateTime<Utc>,
}

/// A client's view of the [`LocalServer`], scoped to one session.
pub struct LocalBackend {
    shared: Arc<Shared>,
    session: Mutex<Option<LocalSession>>,
}

impl LocalBackend {
    /// Count the call, apply injected failures and check the session.
    fn enter(&self, op: &'static str) -> BackendResult<Option<AccountId>> {
        self.shared.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.shared.next_fault() {
            debug!(op, error = %err, "Injected failure");
            return Err(err);
        }
        let session = *self.session.lock().map_err(|e| BackendError::Rejected {
            status: 500,
            message: format!("Lock poisoned: {e}"),
        })?;
        match session {
            None => Ok(None),
            Some(s) if s.expires_at <= Utc::now() => {
                Err(BackendError::Unauthorized("JWT expired".into()))
            }
            Some(s) => Ok(Some(s.account)),
        }
    }

    /// Like [`enter`](Self::enter) but requires a signed-in account.
    fn user(&self, op: &'static str) -> BackendResult<AccountId> {
        self.enter(op)?
            .ok_or_else(|| BackendError::forbidden("row-level security: no signed-in account"))
    }

    fn participant_of(&self, me: AccountId, connection: &Connection) -> BackendResult<()> {
        if connection.counterpart(me).is_some() {
            Ok(())
        } else {
            Err(BackendError::forbidden(
                "row-level security: not a party to this connection",
            ))
        }
    }
}

fn single<T>(result: Result<T, StoreError>) -> BackendResult<Option<T>> {
    result.map(Some).map_err(BackendError::from)
}

#[async_trait]
impl Backend for LocalBackend {
    async fn current_user(&self) -> BackendResult<Option<AccountId>> {
        self.enter("current_user")
    }

    async fn sign_out(&self) -> BackendResult<()> {
        let mut session = self.session.lock().map_err(|e| BackendError::Rejected {
            status: 500,
            message: format!("Lock poisoned: {e}"),
        })?;
        if let Some(s) = session.take() {
            debug!(account = %s.account.short(), "Session closed");
        }
        Ok(())
    }

    async fn get_account(&self, id: AccountId) -> BackendResult<Option<Account>> {
        self.enter("get_account")?;
        single(self.shared.db()?.get_account(id))
    }

    async fn update_my_profile(&self, account: &Account) -> BackendResult<bool> {
        let me = self.user("update_my_profile")?;
        if account.id != me {
            return Err(BackendError::forbidden(
                "row-level security: profile belongs to another account",
            ));
        }
        let updated = self.shared.db()?.update_account_profile(account)?;
        if updated {
            self.shared
                .emit(Table::Accounts, ChangeKind::Update, vec![me]);
        }
        Ok(updated)
    }

    async fn insert_opportunity(&self, opportunity: &Opportunity) -> BackendResult<()> {
        let me = self.user("insert_opportunity")?;
        if opportunity.owner_id != me {
            return Err(BackendError::forbidden(
                "row-level security: owner must be the signed-in account",
            ));
        }
        self.shared.db()?.insert_opportunity(opportunity)?;
        self.shared
            .emit(Table::Opportunities, ChangeKind::Insert, vec![me]);
        Ok(())
    }

    async fn get_opportunity(&self, id: OpportunityId) -> BackendResult<Option<Opportunity>> {
        self.enter("get_opportunity")?;
        single(self.shared.db()?.get_opportunity(id))
    }

    async fn list_opportunities(
        &self,
        query: &OpportunityQuery,
    ) -> BackendResult<Vec<Opportunity>> {
        self.enter("list_opportunities")?;
        Ok(self.shared.db()?.list_opportunities(query)?)
    }

    async fn list_my_opportunities(&self) -> BackendResult<Vec<Opportunity>> {
        let me = self.user("list_my_opportunities")?;
        Ok(self.shared.db()?.list_opportunities_for_owner(me)?)
    }

    async fn set_opportunity_name_private(
        &self,
        id: OpportunityId,
        private: bool,
    ) -> BackendResult<bool> {
        let me = self.user("set_opportunity_name_private")?;
        let updated = self
            .shared
            .db()?
            .set_opportunity_name_private(id, me, private)?;
        if updated {
            self.shared
                .emit(Table::Opportunities, ChangeKind::Update, vec![me]);
        }
        Ok(updated)
    }

    async fn delete_opportunity(&self, id: OpportunityId) -> BackendResult<bool> {
        let me = self.user("delete_opportunity")?;
        let deleted = self.shared.db()?.delete_opportunity(id, me)?;
        if deleted {
            self.shared
                .emit(Table::Opportunities, ChangeKind::Delete, vec![me]);
        }
        Ok(deleted)
    }

    async fn list_industry_categories(&self) -> BackendResult<Vec<IndustryCategory>> {
        self.enter("list_industry_categories")?;
        Ok(self.shared.db()?.list_industry_categories()?)
    }

    async fn insert_requirement(&self, requirement: &Requirement) -> BackendResult<()> {
        let me = self.user("insert_requirement")?;
        if requirement.owner_id != me {
            return Err(BackendError::forbidden(
                "row-level security: owner must be the signed-in account",
            ));
        }
        self.shared.db()?.insert_requirement(requirement)?;
        self.shared
            .emit(Table::Requirements, ChangeKind::Insert, vec![me]);
        Ok(())
    }

    async fn get_requirement(&self, id: RequirementId) -> BackendResult<Option<Requirement>> {
        self.enter("get_requirement")?;
        single(self.shared.db()?.get_requirement(id))
    }

    async fn list_requirements(&self, limit: Option<u32>) -> BackendResult<Vec<Requirement>> {
        self.enter("list_requirements")?;
        Ok(self.shared.db()?.list_requirements(limit)?)
    }

    async fn set_requirement_status(
        &self,
        id: RequirementId,
        status: RequirementStatus,
    ) -> BackendResult<bool> {
        let me = self.user("set_requirement_status")?;
        let updated = self.shared.db()?.set_requirement_status(id, me, status)?;
        if updated {
            self.shared
                .emit(Table::Requirements, ChangeKind::Update, vec![me]);
        }
        Ok(updated)
    }

    async fn requirement_owners_in(&self, industry: &str) -> BackendResult<Vec<AccountId>> {
        self.enter("requirement_owners_in")?;
        Ok(self.shared.db()?.open_requirement_owners_in(industry)?)
    }

    async fn get_connection(&self, id: ConnectionId) -> BackendResult<Option<Connection>> {
        let me = self.user("get_connection")?;
        let connection = self.shared.db()?.get_connection(id)?;
        // Rows of other pairs are invisible, as with RLS.
        if connection.counterpart(me).is_none() {
            return Err(BackendError::NoRows);
        }
        Ok(Some(connection))
    }

    async fn find_connection_with(&self, other: AccountId) -> BackendResult<Option<Connection>> {
        let me = self.user("find_connection_with")?;
        Ok(self.shared.db()?.find_connection_between(me, other)?)
    }

    async fn list_connections(&self) -> BackendResult<Vec<Connection>> {
        let me = self.user("list_connections")?;
        Ok(self.shared.db()?.list_connections_for(me)?)
    }

    async fn insert_connection(&self, connection: &Connection) -> BackendResult<bool> {
        let me = self.user("insert_connection")?;
        if connection.requester_id != me {
            return Err(BackendError::forbidden(
                "row-level security: requester must be the signed-in account",
            ));
        }
        let inserted = self.shared.db()?.insert_connection(connection)?;
        if inserted {
            self.shared.emit(
                Table::Connections,
                ChangeKind::Insert,
                vec![connection.requester_id, connection.recipient_id],
            );
        }
        Ok(inserted)
    }

    async fn update_connection_status(
        &self,
        id: ConnectionId,
        status: ConnectionStatus,
    ) -> BackendResult<bool> {
        let me = self.user("update_connection_status")?;
        let db = self.shared.db()?;
        let connection = db.get_connection(id)?;
        self.participant_of(me, &connection)?;
        let updated = db.update_connection_status(id, status, Utc::now())?;
        drop(db);
        if updated {
            self.shared.emit(
                Table::Connections,
                ChangeKind::Update,
                vec![connection.requester_id, connection.recipient_id],
            );
        }
        Ok(updated)
    }

    async fn reopen_connection(&self, id: ConnectionId, message: &str) -> BackendResult<bool> {
        let me = self.user("reopen_connection")?;
        let db = self.shared.db()?;
        let connection = db.get_connection(id)?;
        self.participant_of(me, &connection)?;
        let reopened = db.reopen_declined_connection(id, message, Utc::now())?;
        drop(db);
        if reopened {
            self.shared.emit(
                Table::Connections,
                ChangeKind::Update,
                vec![connection.requester_id, connection.recipient_id],
            );
        }
        Ok(reopened)
    }

    async fn blocks_with(&self, other: AccountId) -> BackendResult<Vec<Block>> {
        let me = self.user("blocks_with")?;
        Ok(self.shared.db()?.blocks_between(me, other)?)
    }

    async fn list_my_blocks(&self) -> BackendResult<Vec<Block>> {
        let me = self.user("list_my_blocks")?;
        Ok(self.shared.db()?.list_blocks_by(me)?)
    }

    async fn block_and_disconnect(
        &self,
        blocked: AccountId,
        expected_connection: Option<ConnectionId>,
        reason: Option<&str>,
    ) -> BackendResult<BlockOutcome> {
        let me = self.user("block_and_disconnect")?;
        let outcome = self
            .shared
            .db()?
            .block_and_disconnect(me, blocked, expected_connection, reason)?;
        if outcome.block_created {
            self.shared
                .emit(Table::BlockedUsers, ChangeKind::Insert, vec![me, blocked]);
        }
        if outcome.connection_removed {
            self.shared
                .emit(Table::Connections, ChangeKind::Delete, vec![me, blocked]);
        }
        Ok(outcome)
    }

    async fn delete_block(&self, blocked: AccountId) -> BackendResult<bool> {
        let me = self.user("delete_block")?;
        let deleted = self.shared.db()?.delete_block(me, blocked)?;
        if deleted {
            self.shared
                .emit(Table::BlockedUsers, ChangeKind::Delete, vec![me, blocked]);
        }
        Ok(deleted)
    }

    async fn insert_message(&self, message: &Message) -> BackendResult<()> {
        let me = self.user("insert_message")?;
        if message.sender_id != me {
            return Err(BackendError::forbidden(
                "row-level security: sender must be the signed-in account",
            ));
        }
        self.shared.db()?.insert_message(message)?;
        self.shared.emit(
            Table::Messages,
            ChangeKind::Insert,
            vec![message.sender_id, message.recipient_id],
        );
        Ok(())
    }

    async fn thread_id_with(&self, other: AccountId) -> BackendResult<Option<ThreadId>> {
        let me = self.user("thread_id_with")?;
        Ok(self.shared.db()?.thread_id_between(me, other)?)
    }

    async fn thread_with(&self, other: AccountId) -> BackendResult<Vec<Message>> {
        let me = self.user("thread_with")?;
        Ok(self.shared.db()?.get_thread_between(me, other)?)
    }

    async fn inbox(&self, limit: u32, offset: u32) -> BackendResult<Vec<Message>> {
        let me = self.user("inbox")?;
        Ok(self.shared.db()?.get_inbox(me, limit, offset)?)
    }

    async fn search_messages(&self, term: &str, limit: u32) -> BackendResult<Vec<Message>> {
        let me = self.user("search_messages")?;
        Ok(self.shared.db()?.search_messages(me, term, limit)?)
    }

    async fn unread_message_count(&self) -> BackendResult<u32> {
        let me = self.user("unread_message_count")?;
        Ok(self.shared.db()?.count_unread_messages(me)?)
    }

    async fn mark_message_read(&self, id: MessageId) -> BackendResult<bool> {
        let me = self.user("mark_message_read")?;
        let updated = self.shared.db()?.mark_message_read(id, me)?;
        if updated {
            self.shared
                .emit(Table::Messages, ChangeKind::Update, vec![me]);
        }
        Ok(updated)
    }

    async fn insert_notification(&self, notification: &Notification) -> BackendResult<()> {
        self.user("insert_notification")?;
        self.shared.db()?.insert_notification(notification)?;
        self.shared.emit(
            Table::Notifications,
            ChangeKind::Insert,
            vec![notification.owner_id],
        );
        Ok(())
    }

    async fn list_notifications(&self) -> BackendResult<Vec<Notification>> {
        let me = self.user("list_notifications")?;
        Ok(self.shared.db()?.list_notifications(me)?)
    }

    async fn mark_notification_read(&self, id: NotificationId) -> BackendResult<bool> {
        let me = self.user("mark_notification_read")?;
        let updated = self.shared.db()?.mark_notification_read(id, me)?;
        if updated {
            self.shared
                .emit(Table::Notifications, ChangeKind::Update, vec![me]);
        }
        Ok(updated)
    }

    async fn mark_all_notifications_read(&self) -> BackendResult<usize> {
        let me = self.user("mark_all_notifications_read")?;
        let n = self.shared.db()?.mark_all_notifications_read(me)?;
        if n > 0 {
            self.shared
                .emit(Table::Notifications, ChangeKind::Update, vec![me]);
        }
        Ok(n)
    }

    async fn archive_notification(&self, id: NotificationId) -> BackendResult<bool> {
        let me = self.user("archive_notification")?;
        let archived = self.shared.db()?.archive_notification(id, me)?;
        if archived {
            self.shared
                .emit(Table::Notifications, ChangeKind::Update, vec![me]);
        }
        Ok(archived)
    }

    async fn get_favorite(&self, opportunity: OpportunityId) -> BackendResult<Option<Favorite>> {
        let me = self.user("get_favorite")?;
        Ok(self.shared.db()?.get_favorite(me, opportunity)?)
    }

    async fn upsert_favorite(
        &self,
        opportunity: OpportunityId,
        is_favorite: bool,
    ) -> BackendResult<Favorite> {
        let me = self.user("upsert_favorite")?;
        let favorite = self
            .shared
            .db()?
            .upsert_favorite(me, opportunity, is_favorite, Utc::now())?;
        self.shared
            .emit(Table::FavoriteOpportunities, ChangeKind::Update, vec![me]);
        Ok(favorite)
    }

    async fn get_settings(&self) -> BackendResult<Option<Settings>> {
        let me = self.user("get_settings")?;
        Ok(self.shared.db()?.get_settings(me)?)
    }

    async fn upsert_settings(&self, settings: &Settings) -> BackendResult<()> {
        let me = self.user("upsert_settings")?;
        if settings.user_id != me {
            return Err(BackendError::forbidden(
                "row-level security: settings belong to another account",
            ));
        }
        self.shared.db()?.upsert_settings(settings)?;
        self.shared
            .emit(Table::Settings, ChangeKind::Update, vec![me]);
        Ok(())
    }

    fn subscribe(&self, table: Table, filter: ChangeFilter) -> Subscription {
        Subscription::new(table, filter, self.shared.changes.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(server: &LocalServer, name: &str) -> AccountId {
        let account = Account {
            id: AccountId::new(),
            company_name: name.to_string(),
            industry: "Manufacturing".into(),
            location: "Lyon, France".into(),
            description: String::new(),
            contact_email: format!("{}@example.com", name.to_lowercase()),
            contact_phone: "+33 1 23 45 67 89".into(),
            avatar_url: None,
            created_at: Utc::now(),
        };
        server.register(&account).unwrap();
        account.id
    }

    #[tokio::test]
    async fn expired_session_is_unauthorized() {
        let server = LocalServer::in_memory().unwrap();
        let a = account(&server, "Acme");
        let backend = server.sign_in_for(a, Duration::seconds(-1));
        assert!(matches!(
            backend.current_user().await,
            Err(BackendError::Unauthorized(_))
        ));
        assert_eq!(server.anonymous().current_user().await, Ok(None));
    }

    #[tokio::test]
    async fn missing_single_row_reports_no_rows() {
        let server = LocalServer::in_memory().unwrap();
        let backend = server.anonymous();
        assert_eq!(
            backend.get_opportunity(OpportunityId::new()).await,
            Err(BackendError::NoRows)
        );
    }

    #[tokio::test]
    async fn writes_are_scoped_to_the_session() {
        let server = LocalServer::in_memory().unwrap();
        let a = account(&server, "Acme");
        let b = account(&server, "Beta");
        let backend = server.sign_in(a);

        let now = Utc::now();
        let forged = Connection {
            id: ConnectionId::new(),
            requester_id: b,
            recipient_id: a,
            status: ConnectionStatus::Pending,
            request_message: Some("hello".into()),
            created_at: now,
            updated_at: now,
        };
        let err = backend.insert_connection(&forged).await.unwrap_err();
        assert!(matches!(err, BackendError::Rejected { status: 403, .. }));

        let err = server
            .anonymous()
            .list_connections()
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Rejected { status: 403, .. }));
    }

    #[tokio::test]
    async fn injected_failures_come_first() {
        let server = LocalServer::in_memory().unwrap();
        server.inject_failures([BackendError::Network("offline".into())]);
        let backend = server.anonymous();
        assert!(backend.current_user().await.is_err());
        assert!(backend.current_user().await.is_ok());
        assert_eq!(server.call_count(), 2);
    }

    #[tokio::test]
    async fn writes_publish_change_events() {
        let server = LocalServer::in_memory().unwrap();
        let a = account(&server, "Acme");
        let b = account(&server, "Beta");
        let backend = server.sign_in(a);
        let mut sub = backend.subscribe(Table::Connections, ChangeFilter::Account(b));

        let now = Utc::now();
        let request = Connection {
            id: ConnectionId::new(),
            requester_id: a,
            recipient_id: b,
            status: ConnectionStatus::Pending,
            request_message: Some("hello".into()),
            created_at: now,
            updated_at: now,
        };
        assert!(backend.insert_connection(&request).await.unwrap());
        let event = sub.next().await.unwrap();
        assert_eq!(event.kind, ChangeKind::Insert);
    }

    #[tokio::test]
    async fn request_into_a_block_is_refused_silently() {
        let server = LocalServer::in_memory().unwrap();
        let a = account(&server, "Acme");
        let b = account(&server, "Beta");
        server
            .sign_in(b)
            .block_and_disconnect(a, None, None)
            .await
            .unwrap();

        let backend = server.sign_in(a);
        let mut sub = backend.subscribe(Table::Connections, ChangeFilter::All);
        let now = Utc::now();
        let request = Connection {
            id: ConnectionId::new(),
            requester_id: a,
            recipient_id: b,
            status: ConnectionStatus::Pending,
            request_message: Some("hello".into()),
            created_at: now,
            updated_at: now,
        };
        assert!(!backend.insert_connection(&request).await.unwrap());
        assert!(backend.find_connection_with(b).await.unwrap().is_none());

        // Nothing was published for the refused write.
        assert!(tokio::time::timeout(std::time::Duration::from_millis(50), sub.next())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn profile_updates_are_scoped_to_the_session() {
        let server = LocalServer::in_memory().unwrap();
        let a = account(&server, "Acme");
        let b = account(&server, "Beta");
        let backend = server.sign_in(a);

        let mut theirs = backend.get_account(b).await.unwrap().unwrap();
        theirs.company_name = "Hijacked".into();
        let err = backend.update_my_profile(&theirs).await.unwrap_err();
        assert!(matches!(err, BackendError::Rejected { status: 403, .. }));

        let mut mine = backend.get_account(a).await.unwrap().unwrap();
        mine.company_name = "Acme Holdings".into();
        assert!(backend.update_my_profile(&mine).await.unwrap());
        assert_eq!(
            backend.get_account(a).await.unwrap().unwrap().company_name,
            "Acme Holdings"
        );
    }
}
