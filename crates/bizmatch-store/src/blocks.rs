//! Block records and the atomic block-and-disconnect operation.

use chrono::Utc;
use rusqlite::params;

use bizmatch_shared::{pair_key, AccountId, ConnectionId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Block, BlockOutcome};
use crate::sql;

const COLUMNS: &str = "blocker_id, blocked_id, reason, created_at";

impl Database {
    /// Blocks between `a` and `b` in either direction.
    pub fn blocks_between(&self, a: AccountId, b: AccountId) -> Result<Vec<Block>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {COLUMNS} FROM blocked_users
             WHERE (blocker_id = ?1 AND blocked_id = ?2) OR (blocker_id = ?2 AND blocked_id = ?1)
             ORDER BY created_at ASC"
        ))?;
        let rows = stmt.query_map(params![a.to_string(), b.to_string()], row_to_block)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Accounts blocked by `blocker`, newest first.
    pub fn list_blocks_by(&self, blocker: AccountId) -> Result<Vec<Block>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {COLUMNS} FROM blocked_users WHERE blocker_id = ?1 ORDER BY created_at DESC"
        ))?;
        let rows = stmt.query_map(params![blocker.to_string()], row_to_block)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Remove the block from `blocker` to `blocked`. Returns `true` if a row
    /// was deleted. The pair's former connection is not restored.
    pub fn delete_block(&self, blocker: AccountId, blocked: AccountId) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM blocked_users WHERE blocker_id = ?1 AND blocked_id = ?2",
            params![blocker.to_string(), blocked.to_string()],
        )?;
        Ok(affected > 0)
    }

    /// Block `blocked` on behalf of `blocker` and delete any connection
    /// between them, in one transaction.
    ///
    /// The block insert is skipped when the same block already exists. When
    /// `expected_connection` is given it must be the pair's connection row,
    /// otherwise the whole operation is rolled back with
    /// [`StoreError::ConnectionMismatch`].
    pub fn block_and_disconnect(
        &mut self,
        blocker: AccountId,
        blocked: AccountId,
        expected_connection: Option<ConnectionId>,
        reason: Option<&str>,
    ) -> Result<BlockOutcome> {
        let (lo, hi) = pair_key(blocker, blocked);
        let tx = self.conn_mut().transaction()?;

        let inserted = tx
            .execute(
                "INSERT OR IGNORE INTO blocked_users (blocker_id, blocked_id, reason, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    blocker.to_string(),
                    blocked.to_string(),
                    reason,
                    sql::ts_text(&Utc::now()),
                ],
            )
            .map_err(StoreError::from_write)?;

        let removed = match expected_connection {
            Some(id) => {
                let n = tx.execute(
                    "DELETE FROM connections WHERE id = ?1 AND pair_lo = ?2 AND pair_hi = ?3",
                    params![id.to_string(), lo.to_string(), hi.to_string()],
                )?;
                if n == 0 {
                    // Dropping `tx` rolls the block insert back.
                    return Err(StoreError::ConnectionMismatch);
                }
                n
            }
            None => tx.execute(
                "DELETE FROM connections WHERE pair_lo = ?1 AND pair_hi = ?2",
                params![lo.to_string(), hi.to_string()],
            )?,
        };

        tx.commit()?;

        tracing::debug!(
            blocker = %blocker,
            blocked = %blocked,
            block_created = inserted > 0,
            connection_removed = removed > 0,
            "block applied"
        );

        Ok(BlockOutcome {
            block_created: inserted > 0,
            connection_removed: removed > 0,
        })
    }
}

fn row_to_block(row: &rusqlite::Row<'_>) -> rusqlite::Result<Block> {
    Ok(Block {
        blocker_id: sql::id(row, 0, AccountId)?,
        blocked_id: sql::id(row, 1, AccountId)?,
        reason: row.get(2)?,
        created_at: sql::timestamp(row, 3)?,
    })
}
