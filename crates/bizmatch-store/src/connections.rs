//! CRUD operations for [`Connection`] records.
//!
//! At most one row exists per unordered pair of accounts; the
//! `(pair_lo, pair_hi)` unique index enforces it even under concurrent
//! inserts.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use bizmatch_shared::{pair_key, AccountId, ConnectionId, ConnectionStatus};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Connection;
use crate::sql;

const COLUMNS: &str =
    "id, requester_id, recipient_id, status, request_message, created_at, updated_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new connection row. Fails with [`StoreError::Conflict`] if the
    /// pair already has one; returns `false` without writing if either
    /// account blocks the other.
    pub fn insert_connection(&self, connection: &Connection) -> Result<bool> {
        let (lo, hi) = pair_key(connection.requester_id, connection.recipient_id);
        let inserted = self
            .conn()
            .execute(
                "INSERT INTO connections
                   (id, requester_id, recipient_id, pair_lo, pair_hi, status, request_message,
                    created_at, updated_at)
                 SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9
                 WHERE NOT EXISTS (
                     SELECT 1 FROM blocked_users
                     WHERE (blocker_id = ?2 AND blocked_id = ?3)
                        OR (blocker_id = ?3 AND blocked_id = ?2)
                 )",
                params![
                    connection.id.to_string(),
                    connection.requester_id.to_string(),
                    connection.recipient_id.to_string(),
                    lo.to_string(),
                    hi.to_string(),
                    connection.status.as_str(),
                    connection.request_message,
                    sql::ts_text(&connection.created_at),
                    sql::ts_text(&connection.updated_at),
                ],
            )
            .map_err(StoreError::from_write)?;
        Ok(inserted > 0)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_connection(&self, id: ConnectionId) -> Result<Connection> {
        self.conn()
            .query_row(
                &format!("SELECT {COLUMNS} FROM connections WHERE id = ?1"),
                params![id.to_string()],
                row_to_connection,
            )
            .map_err(StoreError::from_single)
    }

    /// The connection between `a` and `b`, in either direction.
    pub fn find_connection_between(&self, a: AccountId, b: AccountId) -> Result<Option<Connection>> {
        let (lo, hi) = pair_key(a, b);
        let found = self
            .conn()
            .query_row(
                &format!("SELECT {COLUMNS} FROM connections WHERE pair_lo = ?1 AND pair_hi = ?2"),
                params![lo.to_string(), hi.to_string()],
                row_to_connection,
            )
            .optional()?;
        Ok(found)
    }

    /// Every connection `account` takes part in, newest first.
    pub fn list_connections_for(&self, account: AccountId) -> Result<Vec<Connection>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {COLUMNS} FROM connections
             WHERE requester_id = ?1 OR recipient_id = ?1
             ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt.query_map(params![account.to_string()], row_to_connection)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Resolve a pending connection. Returns `false` if the row is gone or
    /// no longer pending, so an answer is applied at most once.
    pub fn update_connection_status(
        &self,
        id: ConnectionId,
        status: ConnectionStatus,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE connections SET status = ?1, updated_at = ?2
             WHERE id = ?3 AND status = 'pending'",
            params![status.as_str(), sql::ts_text(&at), id.to_string()],
        )?;
        Ok(affected > 0)
    }

    /// Overwrite a declined row in place as a fresh pending request.
    ///
    /// Only matches while the row is still `declined` and neither account
    /// blocks the other.
    pub fn reopen_declined_connection(
        &self,
        id: ConnectionId,
        message: &str,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE connections
             SET status = 'pending', request_message = ?1, updated_at = ?2
             WHERE id = ?3 AND status = 'declined'
               AND NOT EXISTS (
                   SELECT 1 FROM blocked_users b
                   WHERE (b.blocker_id = connections.requester_id
                          AND b.blocked_id = connections.recipient_id)
                      OR (b.blocker_id = connections.recipient_id
                          AND b.blocked_id = connections.requester_id)
               )",
            params![message, sql::ts_text(&at), id.to_string()],
        )?;
        Ok(affected > 0)
    }
}

pub(crate) fn row_to_connection(row: &rusqlite::Row<'_>) -> rusqlite::Result<Connection> {
    Ok(Connection {
        id: sql::id(row, 0, ConnectionId)?,
        requester_id: sql::id(row, 1, AccountId)?,
        recipient_id: sql::id(row, 2, AccountId)?,
        status: sql::text_enum(row, 3)?,
        request_message: row.get(4)?,
        created_at: sql::timestamp(row, 5)?,
        updated_at: sql::timestamp(row, 6)?,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::accounts::tests::account;

    pub(crate) fn pending(db: &Database, requester: AccountId, recipient: AccountId) -> Connection {
        let now = Utc::now();
        let c = Connection {
            id: ConnectionId::new(),
            requester_id: requester,
            recipient_id: recipient,
            status: ConnectionStatus::Pending,
            request_message: Some("Interested in partnering.".to_string()),
            created_at: now,
            updated_at: now,
        };
        assert!(db.insert_connection(&c).unwrap());
        c
    }

    #[test]
    fn one_row_per_unordered_pair() {
        let db = Database::open_in_memory().unwrap();
        let a = account(&db, "A").id;
        let b = account(&db, "B").id;
        pending(&db, a, b);

        let now = Utc::now();
        let reverse = Connection {
            id: ConnectionId::new(),
            requester_id: b,
            recipient_id: a,
            status: ConnectionStatus::Pending,
            request_message: None,
            created_at: now,
            updated_at: now,
        };
        assert!(matches!(
            db.insert_connection(&reverse),
            Err(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn find_between_ignores_direction() {
        let db = Database::open_in_memory().unwrap();
        let a = account(&db, "A").id;
        let b = account(&db, "B").id;
        let c = pending(&db, a, b);
        assert_eq!(db.find_connection_between(b, a).unwrap().unwrap().id, c.id);
        assert!(db
            .find_connection_between(a, account(&db, "C").id)
            .unwrap()
            .is_none());
    }

    #[test]
    fn reopen_only_touches_declined_rows() {
        let db = Database::open_in_memory().unwrap();
        let a = account(&db, "A").id;
        let b = account(&db, "B").id;
        let c = pending(&db, a, b);

        assert!(!db.reopen_declined_connection(c.id, "again", Utc::now()).unwrap());

        db.update_connection_status(c.id, ConnectionStatus::Declined, Utc::now())
            .unwrap();
        assert!(db.reopen_declined_connection(c.id, "again", Utc::now()).unwrap());

        let reloaded = db.get_connection(c.id).unwrap();
        assert_eq!(reloaded.status, ConnectionStatus::Pending);
        assert_eq!(reloaded.request_message.as_deref(), Some("again"));
        assert_eq!(db.list_connections_for(a).unwrap().len(), 1);
    }

    #[test]
    fn request_after_block_is_not_written() {
        let mut db = Database::open_in_memory().unwrap();
        let a = account(&db, "A").id;
        let b = account(&db, "B").id;
        db.block_and_disconnect(b, a, None, None).unwrap();

        let now = Utc::now();
        let late = Connection {
            id: ConnectionId::new(),
            requester_id: a,
            recipient_id: b,
            status: ConnectionStatus::Pending,
            request_message: Some("hello".to_string()),
            created_at: now,
            updated_at: now,
        };
        assert!(!db.insert_connection(&late).unwrap());
        assert!(db.find_connection_between(a, b).unwrap().is_none());
        assert_eq!(db.blocks_between(a, b).unwrap().len(), 1);
    }

    #[test]
    fn declined_row_is_not_reopened_across_a_block() {
        let db = Database::open_in_memory().unwrap();
        let a = account(&db, "A").id;
        let b = account(&db, "B").id;
        let c = pending(&db, a, b);
        db.update_connection_status(c.id, ConnectionStatus::Declined, Utc::now())
            .unwrap();
        // Block row written without touching the connection.
        db.conn()
            .execute(
                "INSERT INTO blocked_users (blocker_id, blocked_id, reason, created_at)
                 VALUES (?1, ?2, NULL, ?3)",
                params![b.to_string(), a.to_string(), sql::ts_text(&Utc::now())],
            )
            .unwrap();

        assert!(!db.reopen_declined_connection(c.id, "again", Utc::now()).unwrap());
        assert_eq!(db.get_connection(c.id).unwrap().status, ConnectionStatus::Declined);
    }

    #[test]
    fn a_pending_row_is_answered_once() {
        let db = Database::open_in_memory().unwrap();
        let a = account(&db, "A").id;
        let b = account(&db, "B").id;
        let c = pending(&db, a, b);

        assert!(db
            .update_connection_status(c.id, ConnectionStatus::Accepted, Utc::now())
            .unwrap());
        assert!(!db
            .update_connection_status(c.id, ConnectionStatus::Declined, Utc::now())
            .unwrap());
        assert_eq!(db.get_connection(c.id).unwrap().status, ConnectionStatus::Accepted);
    }
}
