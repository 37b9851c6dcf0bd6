use rusqlite::{params, OptionalExtension};

use bizmatch_shared::{AccountId, MessageId, ThreadId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Message;
use crate::sql;

const COLUMNS: &str =
    "id, thread_id, sender_id, recipient_id, content, is_read, reply_to_id, created_at";

impl Database {
    pub fn insert_message(&self, message: &Message) -> Result<()> {
        self.conn()
            .execute(
                &format!("INSERT INTO messages ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
                params![
                    message.id.to_string(),
                    message.thread_id.to_string(),
                    message.sender_id.to_string(),
                    message.recipient_id.to_string(),
                    message.content,
                    message.is_read,
                    message.reply_to_id.map(|id| id.to_string()),
                    sql::ts_text(&message.created_at),
                ],
            )
            .map_err(StoreError::from_write)?;
        Ok(())
    }

    /// Conversation between `a` and `b`, oldest first.
    pub fn get_thread_between(&self, a: AccountId, b: AccountId) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {COLUMNS} FROM messages
             WHERE (sender_id = ?1 AND recipient_id = ?2) OR (sender_id = ?2 AND recipient_id = ?1)
             ORDER BY created_at ASC, rowid ASC"
        ))?;
        let rows = stmt.query_map(params![a.to_string(), b.to_string()], row_to_message)?;
        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    /// Thread id of the most recent message between `a` and `b`, if any.
    pub fn thread_id_between(&self, a: AccountId, b: AccountId) -> Result<Option<ThreadId>> {
        let found = self
            .conn()
            .query_row(
                "SELECT thread_id FROM messages
                 WHERE (sender_id = ?1 AND recipient_id = ?2) OR (sender_id = ?2 AND recipient_id = ?1)
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT 1",
                params![a.to_string(), b.to_string()],
                |row| sql::id(row, 0, ThreadId),
            )
            .optional()?;
        Ok(found)
    }

    /// Messages sent or received by `account`, newest first.
    pub fn get_inbox(&self, account: AccountId, limit: u32, offset: u32) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {COLUMNS} FROM messages
             WHERE sender_id = ?1 OR recipient_id = ?1
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?2 OFFSET ?3"
        ))?;
        let rows = stmt.query_map(params![account.to_string(), limit, offset], row_to_message)?;
        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    /// Messages of `account` whose text contains `term`, case-insensitively,
    /// newest first.
    pub fn search_messages(
        &self,
        account: AccountId,
        term: &str,
        limit: u32,
    ) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {COLUMNS} FROM messages
             WHERE (sender_id = ?1 OR recipient_id = ?1)
               AND LOWER(content) LIKE ?2 ESCAPE '\\'
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?3"
        ))?;
        let rows = stmt.query_map(
            params![account.to_string(), sql::contains_pattern(term), limit],
            row_to_message,
        )?;
        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    /// Mark a message read. Only its recipient can do so.
    pub fn mark_message_read(&self, id: MessageId, recipient: AccountId) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE messages SET is_read = 1 WHERE id = ?1 AND recipient_id = ?2",
            params![id.to_string(), recipient.to_string()],
        )?;
        Ok(affected > 0)
    }

    pub fn count_unread_messages(&self, recipient: AccountId) -> Result<u32> {
        let n: u32 = self.conn().query_row(
            "SELECT COUNT(*) FROM messages WHERE recipient_id = ?1 AND is_read = 0",
            params![recipient.to_string()],
            |row| row.get(0),
        )?;
        Ok(n)
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: sql::id(row, 0, MessageId)?,
        thread_id: sql::id(row, 1, ThreadId)?,
        sender_id: sql::id(row, 2, AccountId)?,
        recipient_id: sql::id(row, 3, AccountId)?,
        content: row.get(4)?,
        is_read: row.get(5)?,
        reply_to_id: sql::opt_id(row, 6, MessageId)?,
        created_at: sql::timestamp(row, 7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::tests::account;
    use chrono::{Duration, Utc};

    fn send(db: &Database, from: AccountId, to: AccountId, text: &str, age_secs: i64) -> Message {
        let thread_id = db
            .thread_id_between(from, to)
            .unwrap()
            .unwrap_or_default();
        let m = Message {
            id: MessageId::new(),
            thread_id,
            sender_id: from,
            recipient_id: to,
            content: text.to_string(),
            is_read: false,
            reply_to_id: None,
            created_at: Utc::now() - Duration::seconds(age_secs),
        };
        db.insert_message(&m).unwrap();
        m
    }

    #[test]
    fn thread_is_oldest_first_and_shares_an_id() {
        let db = Database::open_in_memory().unwrap();
        let a = account(&db, "A").id;
        let b = account(&db, "B").id;
        let first = send(&db, a, b, "hello", 20);
        let second = send(&db, b, a, "hi back", 10);

        let thread = db.get_thread_between(b, a).unwrap();
        assert_eq!(thread.len(), 2);
        assert_eq!(thread[0].content, "hello");
        assert_eq!(first.thread_id, second.thread_id);
    }

    #[test]
    fn inbox_is_newest_first() {
        let db = Database::open_in_memory().unwrap();
        let a = account(&db, "A").id;
        let b = account(&db, "B").id;
        let c = account(&db, "C").id;
        send(&db, b, a, "older", 60);
        send(&db, c, a, "newer", 5);
        let inbox = db.get_inbox(a, 50, 0).unwrap();
        assert_eq!(inbox[0].content, "newer");
        assert_eq!(inbox.len(), 2);
    }

    #[test]
    fn only_recipient_marks_read() {
        let db = Database::open_in_memory().unwrap();
        let a = account(&db, "A").id;
        let b = account(&db, "B").id;
        let m = send(&db, a, b, "ping", 1);
        assert_eq!(db.count_unread_messages(b).unwrap(), 1);
        assert!(!db.mark_message_read(m.id, a).unwrap());
        assert!(db.mark_message_read(m.id, b).unwrap());
        assert_eq!(db.count_unread_messages(b).unwrap(), 0);
        assert!(db.get_inbox(b, 10, 0).unwrap()[0].is_read);
    }

    #[test]
    fn search_matches_literally_and_stays_in_my_messages() {
        let db = Database::open_in_memory().unwrap();
        let a = account(&db, "A").id;
        let b = account(&db, "B").id;
        let c = account(&db, "C").id;
        send(&db, a, b, "Quote: 100% steel", 30);
        send(&db, b, a, "Steel prices are up", 20);
        send(&db, b, a, "unrelated", 10);
        send(&db, b, c, "steel for someone else", 5);

        let hits = db.search_messages(a, "STEEL", 10).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].content, "Steel prices are up");

        // `%` is matched as a character, not a wildcard.
        let hits = db.search_messages(a, "0% s", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(db.search_messages(a, "%%", 10).unwrap().is_empty());
        assert_eq!(db.search_messages(a, "steel", 1).unwrap().len(), 1);
    }
}
