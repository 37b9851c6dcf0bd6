//! Notification rows: appended by side effects, then marked read or
//! archived by their owner.

use rusqlite::params;

use bizmatch_shared::{AccountId, NotificationId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Notification;
use crate::sql;

const COLUMNS: &str = "id, owner_id, category, priority, title, body, metadata, action_url, \
                       related_id, read, archived, group_id, created_at";

impl Database {
    pub fn insert_notification(&self, n: &Notification) -> Result<()> {
        let metadata = serde_json::to_string(&n.metadata)?;
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO notifications ({COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
                ),
                params![
                    n.id.to_string(),
                    n.owner_id.to_string(),
                    n.category.as_str(),
                    n.priority.as_str(),
                    n.title,
                    n.body,
                    metadata,
                    n.action_url,
                    n.related_id,
                    n.read,
                    n.archived,
                    n.group_id,
                    sql::ts_text(&n.created_at),
                ],
            )
            .map_err(StoreError::from_write)?;
        Ok(())
    }

    /// Non-archived notifications of `owner`, newest first.
    pub fn list_notifications(&self, owner: AccountId) -> Result<Vec<Notification>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {COLUMNS} FROM notifications
             WHERE owner_id = ?1 AND archived = 0
             ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt.query_map(params![owner.to_string()], row_to_notification)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn mark_notification_read(&self, id: NotificationId, owner: AccountId) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE notifications SET read = 1 WHERE id = ?1 AND owner_id = ?2",
            params![id.to_string(), owner.to_string()],
        )?;
        Ok(affected > 0)
    }

    /// Returns the number of rows that flipped to read.
    pub fn mark_all_notifications_read(&self, owner: AccountId) -> Result<usize> {
        let affected = self.conn().execute(
            "UPDATE notifications SET read = 1 WHERE owner_id = ?1 AND read = 0",
            params![owner.to_string()],
        )?;
        Ok(affected)
    }

    pub fn archive_notification(&self, id: NotificationId, owner: AccountId) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE notifications SET archived = 1 WHERE id = ?1 AND owner_id = ?2",
            params![id.to_string(), owner.to_string()],
        )?;
        Ok(affected > 0)
    }
}

fn row_to_notification(row: &rusqlite::Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: sql::id(row, 0, NotificationId)?,
        owner_id: sql::id(row, 1, AccountId)?,
        category: sql::text_enum(row, 2)?,
        priority: sql::text_enum(row, 3)?,
        title: row.get(4)?,
        body: row.get(5)?,
        metadata: sql::json(row, 6)?,
        action_url: row.get(7)?,
        related_id: row.get(8)?,
        read: row.get(9)?,
        archived: row.get(10)?,
        group_id: row.get(11)?,
        created_at: sql::timestamp(row, 12)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::tests::account;
    use bizmatch_shared::{NotificationCategory, NotificationPriority};
    use chrono::Utc;

    fn notify(db: &Database, owner: AccountId, title: &str) -> Notification {
        let n = Notification {
            id: NotificationId::new(),
            owner_id: owner,
            category: NotificationCategory::System,
            priority: NotificationPriority::Low,
            title: title.to_string(),
            body: "body".to_string(),
            metadata: serde_json::json!({ "source": "test" }),
            action_url: None,
            related_id: None,
            read: false,
            archived: false,
            group_id: None,
            created_at: Utc::now(),
        };
        db.insert_notification(&n).unwrap();
        n
    }

    #[test]
    fn archived_rows_are_hidden() {
        let db = Database::open_in_memory().unwrap();
        let a = account(&db, "A").id;
        let keep = notify(&db, a, "keep");
        let gone = notify(&db, a, "gone");
        assert!(db.archive_notification(gone.id, a).unwrap());

        let listed = db.list_notifications(a).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, keep.id);
        assert_eq!(listed[0].metadata["source"], "test");
    }

    #[test]
    fn mark_all_read_counts_changes() {
        let db = Database::open_in_memory().unwrap();
        let a = account(&db, "A").id;
        let b = account(&db, "B").id;
        let first = notify(&db, a, "one");
        notify(&db, a, "two");
        notify(&db, b, "other owner");

        assert!(!db.mark_notification_read(first.id, b).unwrap());
        assert!(db.mark_notification_read(first.id, a).unwrap());
        assert_eq!(db.mark_all_notifications_read(a).unwrap(), 1);
        assert!(db.list_notifications(a).unwrap().iter().all(|n| n.read));
        assert!(!db.list_notifications(b).unwrap()[0].read);
    }
}
