//! CRUD operations and board queries for [`Opportunity`] records.

use rusqlite::params;
use rusqlite::types::Value;

use bizmatch_shared::{AccountId, OpportunityId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Opportunity, OpportunityQuery};
use crate::sql;

const COLUMNS: &str = "id, owner_id, kind, business_name, industry, description, contact_email, \
                       contact_phone, location, company_size, timeline, budget_min, budget_max, \
                       requirements, preferred_contact, name_private, created_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    pub fn insert_opportunity(&self, opp: &Opportunity) -> Result<()> {
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO opportunities ({COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)"
                ),
                params![
                    opp.id.to_string(),
                    opp.owner_id.to_string(),
                    opp.kind.as_str(),
                    opp.business_name,
                    opp.industry,
                    opp.description,
                    opp.contact_email,
                    opp.contact_phone,
                    opp.location,
                    opp.company_size,
                    opp.timeline,
                    opp.budget_min,
                    opp.budget_max,
                    opp.requirements,
                    opp.preferred_contact.as_str(),
                    opp.name_private,
                    sql::ts_text(&opp.created_at),
                ],
            )
            .map_err(StoreError::from_write)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_opportunity(&self, id: OpportunityId) -> Result<Opportunity> {
        self.conn()
            .query_row(
                &format!("SELECT {COLUMNS} FROM opportunities WHERE id = ?1"),
                params![id.to_string()],
                row_to_opportunity,
            )
            .map_err(StoreError::from_single)
    }

    /// Listings posted by `owner`, newest first.
    pub fn list_opportunities_for_owner(&self, owner: AccountId) -> Result<Vec<Opportunity>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {COLUMNS} FROM opportunities
             WHERE owner_id = ?1
             ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt.query_map(params![owner.to_string()], row_to_opportunity)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// The public board, filtered and sorted per `query`.
    pub fn list_opportunities(&self, query: &OpportunityQuery) -> Result<Vec<Opportunity>> {
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(kind) = query.kind {
            values.push(Value::Text(kind.as_str().to_string()));
            clauses.push(format!("kind = ?{}", values.len()));
        }

        if let Some(term) = query.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            values.push(Value::Text(sql::contains_pattern(term)));
            let n = values.len();
            clauses.push(format!(
                "(LOWER(business_name) LIKE ?{n} ESCAPE '\\' OR LOWER(description) LIKE ?{n} ESCAPE '\\')"
            ));
        }

        for (column, list) in [("industry", &query.industries), ("location", &query.locations)] {
            if list.is_empty() {
                continue;
            }
            let mut placeholders = Vec::with_capacity(list.len());
            for item in list {
                values.push(Value::Text(item.clone()));
                placeholders.push(format!("?{}", values.len()));
            }
            clauses.push(format!("{column} IN ({})", placeholders.join(", ")));
        }

        let filter = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        let direction = if query.ascending { "ASC" } else { "DESC" };

        let mut stmt = self.conn().prepare(&format!(
            "SELECT {COLUMNS} FROM opportunities {filter}
             ORDER BY {} {direction}, rowid {direction}",
            query.sort.column()
        ))?;
        let rows = stmt.query_map(rusqlite::params_from_iter(values), row_to_opportunity)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    // ------------------------------------------------------------------
    // Update / Delete
    // ------------------------------------------------------------------

    /// Toggle name privacy. Only matches when `owner` owns the listing.
    pub fn set_opportunity_name_private(
        &self,
        id: OpportunityId,
        owner: AccountId,
        private: bool,
    ) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE opportunities SET name_private = ?1 WHERE id = ?2 AND owner_id = ?3",
            params![private, id.to_string(), owner.to_string()],
        )?;
        Ok(affected > 0)
    }

    /// Delete a listing owned by `owner`. Returns `true` if a row was deleted.
    pub fn delete_opportunity(&self, id: OpportunityId, owner: AccountId) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM opportunities WHERE id = ?1 AND owner_id = ?2",
            params![id.to_string(), owner.to_string()],
        )?;
        Ok(affected > 0)
    }
}

fn row_to_opportunity(row: &rusqlite::Row<'_>) -> rusqlite::Result<Opportunity> {
    Ok(Opportunity {
        id: sql::id(row, 0, OpportunityId)?,
        owner_id: sql::id(row, 1, AccountId)?,
        kind: sql::text_enum(row, 2)?,
        business_name: row.get(3)?,
        industry: row.get(4)?,
        description: row.get(5)?,
        contact_email: row.get(6)?,
        contact_phone: row.get(7)?,
        location: row.get(8)?,
        company_size: row.get(9)?,
        timeline: row.get(10)?,
        budget_min: row.get(11)?,
        budget_max: row.get(12)?,
        requirements: row.get(13)?,
        preferred_contact: sql::text_enum(row, 14)?,
        name_private: row.get(15)?,
        created_at: sql::timestamp(row, 16)?,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::accounts::tests::account;
    use crate::models::OpportunitySort;
    use bizmatch_shared::{ContactPreference, OpportunityKind};
    use chrono::{Duration, Utc};

    pub(crate) fn listing(
        db: &Database,
        owner: AccountId,
        kind: OpportunityKind,
        name: &str,
        industry: &str,
        age_minutes: i64,
    ) -> Opportunity {
        let opp = Opportunity {
            id: OpportunityId::new(),
            owner_id: owner,
            kind,
            business_name: name.to_string(),
            industry: industry.to_string(),
            description: format!("{name} is looking for partners"),
            contact_email: "deals@example.test".to_string(),
            contact_phone: "+1 555 0100".to_string(),
            location: "Austin, United States".to_string(),
            company_size: Some("11-50".to_string()),
            timeline: None,
            budget_min: Some(10_000.0),
            budget_max: None,
            requirements: None,
            preferred_contact: ContactPreference::Email,
            name_private: false,
            created_at: Utc::now() - Duration::minutes(age_minutes),
        };
        db.insert_opportunity(&opp).unwrap();
        opp
    }

    #[test]
    fn board_filters_by_kind_and_search() {
        let db = Database::open_in_memory().unwrap();
        let owner = account(&db, "Owner").id;
        listing(&db, owner, OpportunityKind::Buying, "Steel Buyers", "Manufacturing", 3);
        listing(&db, owner, OpportunityKind::Selling, "Steel Sellers", "Manufacturing", 2);
        listing(&db, owner, OpportunityKind::Buying, "Cloud Co", "Technology", 1);

        let query = OpportunityQuery {
            kind: Some(OpportunityKind::Buying),
            search: Some("STEEL".to_string()),
            ..Default::default()
        };
        let found = db.list_opportunities(&query).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].business_name, "Steel Buyers");
    }

    #[test]
    fn board_sorts_newest_first_by_default() {
        let db = Database::open_in_memory().unwrap();
        let owner = account(&db, "Owner").id;
        listing(&db, owner, OpportunityKind::Buying, "Old", "Technology", 30);
        listing(&db, owner, OpportunityKind::Buying, "New", "Technology", 1);

        let found = db.list_opportunities(&OpportunityQuery::default()).unwrap();
        let names: Vec<_> = found.iter().map(|o| o.business_name.as_str()).collect();
        assert_eq!(names, ["New", "Old"]);

        let by_name = OpportunityQuery {
            sort: OpportunitySort::BusinessName,
            ascending: true,
            ..Default::default()
        };
        let found = db.list_opportunities(&by_name).unwrap();
        assert_eq!(found[0].business_name, "New");
    }

    #[test]
    fn board_filters_by_industry_list() {
        let db = Database::open_in_memory().unwrap();
        let owner = account(&db, "Owner").id;
        listing(&db, owner, OpportunityKind::Buying, "A", "Technology", 1);
        listing(&db, owner, OpportunityKind::Buying, "B", "Healthcare", 1);
        listing(&db, owner, OpportunityKind::Buying, "C", "Retail", 1);

        let query = OpportunityQuery {
            industries: vec!["Technology".to_string(), "Retail".to_string()],
            sort: OpportunitySort::BusinessName,
            ascending: true,
            ..Default::default()
        };
        let names: Vec<_> = db
            .list_opportunities(&query)
            .unwrap()
            .into_iter()
            .map(|o| o.business_name)
            .collect();
        assert_eq!(names, ["A", "C"]);
    }

    #[test]
    fn like_wildcards_in_search_are_literal() {
        let db = Database::open_in_memory().unwrap();
        let owner = account(&db, "Owner").id;
        listing(&db, owner, OpportunityKind::Buying, "100% Cotton", "Textiles", 1);
        listing(&db, owner, OpportunityKind::Buying, "Plain", "Textiles", 1);

        let query = OpportunityQuery {
            search: Some("0%".to_string()),
            ..Default::default()
        };
        assert_eq!(db.list_opportunities(&query).unwrap().len(), 1);
    }

    #[test]
    fn only_owner_can_delete_or_toggle_privacy() {
        let db = Database::open_in_memory().unwrap();
        let owner = account(&db, "Owner").id;
        let other = account(&db, "Other").id;
        let opp = listing(&db, owner, OpportunityKind::Selling, "Mine", "Retail", 1);

        assert!(!db.set_opportunity_name_private(opp.id, other, true).unwrap());
        assert!(db.set_opportunity_name_private(opp.id, owner, true).unwrap());
        assert!(db.get_opportunity(opp.id).unwrap().name_private);

        assert!(!db.delete_opportunity(opp.id, other).unwrap());
        assert!(db.delete_opportunity(opp.id, owner).unwrap());
        assert!(matches!(db.get_opportunity(opp.id), Err(StoreError::NotFound)));
    }
}
