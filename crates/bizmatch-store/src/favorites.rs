use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use bizmatch_shared::{AccountId, OpportunityId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Favorite;
use crate::sql;

impl Database {
    /// Insert or update the favorite flag for (`user`, `opportunity`).
    pub fn upsert_favorite(
        &self,
        user: AccountId,
        opportunity: OpportunityId,
        is_favorite: bool,
        at: DateTime<Utc>,
    ) -> Result<Favorite> {
        self.conn()
            .execute(
                "INSERT INTO favorite_opportunities (user_id, opportunity_id, is_favorite, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (user_id, opportunity_id)
                 DO UPDATE SET is_favorite = excluded.is_favorite, updated_at = excluded.updated_at",
                params![user.to_string(), opportunity.to_string(), is_favorite, sql::ts_text(&at)],
            )
            .map_err(StoreError::from_write)?;
        Ok(Favorite {
            user_id: user,
            opportunity_id: opportunity,
            is_favorite,
            updated_at: at,
        })
    }

    pub fn get_favorite(
        &self,
        user: AccountId,
        opportunity: OpportunityId,
    ) -> Result<Option<Favorite>> {
        let found = self
            .conn()
            .query_row(
                "SELECT user_id, opportunity_id, is_favorite, updated_at
                 FROM favorite_opportunities WHERE user_id = ?1 AND opportunity_id = ?2",
                params![user.to_string(), opportunity.to_string()],
                |row| {
                    Ok(Favorite {
                        user_id: sql::id(row, 0, AccountId)?,
                        opportunity_id: sql::id(row, 1, OpportunityId)?,
                        is_favorite: row.get(2)?,
                        updated_at: sql::timestamp(row, 3)?,
                    })
                },
            )
            .optional()?;
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::tests::account;
    use crate::opportunities::tests::listing;
    use bizmatch_shared::OpportunityKind;

    #[test]
    fn upsert_flips_a_single_row() {
        let db = Database::open_in_memory().unwrap();
        let owner = account(&db, "Owner").id;
        let viewer = account(&db, "Viewer").id;
        let opp = listing(&db, owner, OpportunityKind::Buying, "Deal", "Retail", 1);

        assert!(db.get_favorite(viewer, opp.id).unwrap().is_none());
        db.upsert_favorite(viewer, opp.id, true, Utc::now()).unwrap();
        db.upsert_favorite(viewer, opp.id, false, Utc::now()).unwrap();

        let fav = db.get_favorite(viewer, opp.id).unwrap().unwrap();
        assert!(!fav.is_favorite);
        let n: u32 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM favorite_opportunities", [], |r| r.get(0))
            .unwrap();
        assert_eq!(n, 1);
    }
}
