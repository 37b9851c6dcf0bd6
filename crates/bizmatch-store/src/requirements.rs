//! Lead requests and the industry categories they are filed under.

use rusqlite::params;

use bizmatch_shared::{AccountId, CategoryId, RequirementId, RequirementStatus};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{IndustryCategory, Requirement};
use crate::sql;

const COLUMNS: &str = "id, owner_id, title, description, target_customer, budget_min, \
                       budget_max, deadline, status, created_at";

impl Database {
    /// All categories, by name.
    pub fn list_industry_categories(&self) -> Result<Vec<IndustryCategory>> {
        let mut stmt = self
            .conn()
            .prepare("SELECT id, name FROM industry_categories ORDER BY name ASC")?;
        let rows = stmt.query_map([], row_to_category)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Insert the request and its category links in one transaction. An
    /// unknown category id rolls the whole write back as a conflict.
    pub fn insert_requirement(&mut self, requirement: &Requirement) -> Result<()> {
        let tx = self.conn_mut().transaction()?;
        tx.execute(
            &format!("INSERT INTO requirements ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"),
            params![
                requirement.id.to_string(),
                requirement.owner_id.to_string(),
                requirement.title,
                requirement.description,
                requirement.target_customer,
                requirement.budget_min,
                requirement.budget_max,
                requirement
                    .deadline
                    .map(|d| d.format(sql::DATE_FORMAT).to_string()),
                requirement.status.as_str(),
                sql::ts_text(&requirement.created_at),
            ],
        )
        .map_err(StoreError::from_write)?;
        for category in &requirement.categories {
            tx.execute(
                "INSERT OR IGNORE INTO requirement_categories (requirement_id, category_id)
                 VALUES (?1, ?2)",
                params![requirement.id.to_string(), category.id.to_string()],
            )
            .map_err(StoreError::from_write)?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn get_requirement(&self, id: RequirementId) -> Result<Requirement> {
        let mut requirement = self
            .conn()
            .query_row(
                &format!("SELECT {COLUMNS} FROM requirements WHERE id = ?1"),
                params![id.to_string()],
                row_to_requirement,
            )
            .map_err(StoreError::from_single)?;
        requirement.categories = self.categories_of(id)?;
        Ok(requirement)
    }

    /// Newest first, with their categories. `limit` of `None` returns all.
    pub fn list_requirements(&self, limit: Option<u32>) -> Result<Vec<Requirement>> {
        // SQLite treats a negative LIMIT as "no limit".
        let limit = limit.map_or(-1, i64::from);
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {COLUMNS} FROM requirements
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?1"
        ))?;
        let rows = stmt.query_map(params![limit], row_to_requirement)?;
        let mut out = Vec::new();
        for row in rows {
            let mut requirement = row?;
            requirement.categories = self.categories_of(requirement.id)?;
            out.push(requirement);
        }
        Ok(out)
    }

    /// Change the status of a request owned by `owner`.
    pub fn set_requirement_status(
        &self,
        id: RequirementId,
        owner: AccountId,
        status: RequirementStatus,
    ) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE requirements SET status = ?1 WHERE id = ?2 AND owner_id = ?3",
            params![status.as_str(), id.to_string(), owner.to_string()],
        )?;
        Ok(affected > 0)
    }

    /// Owners of open requests filed under the category named `industry`,
    /// compared case-insensitively.
    pub fn open_requirement_owners_in(&self, industry: &str) -> Result<Vec<AccountId>> {
        let mut stmt = self.conn().prepare(
            "SELECT DISTINCT r.owner_id
             FROM requirements r
             JOIN requirement_categories rc ON rc.requirement_id = r.id
             JOIN industry_categories c ON c.id = rc.category_id
             WHERE r.status = 'open' AND LOWER(c.name) = LOWER(?1)
             ORDER BY r.owner_id",
        )?;
        let rows = stmt.query_map(params![industry.trim()], |row| sql::id(row, 0, AccountId))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn categories_of(&self, requirement: RequirementId) -> Result<Vec<IndustryCategory>> {
        let mut stmt = self.conn().prepare(
            "SELECT c.id, c.name
             FROM requirement_categories rc
             JOIN industry_categories c ON c.id = rc.category_id
             WHERE rc.requirement_id = ?1
             ORDER BY c.name ASC",
        )?;
        let rows = stmt.query_map(params![requirement.to_string()], row_to_category)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

fn row_to_category(row: &rusqlite::Row<'_>) -> rusqlite::Result<IndustryCategory> {
    Ok(IndustryCategory {
        id: sql::id(row, 0, CategoryId)?,
        name: row.get(1)?,
    })
}

fn row_to_requirement(row: &rusqlite::Row<'_>) -> rusqlite::Result<Requirement> {
    Ok(Requirement {
        id: sql::id(row, 0, RequirementId)?,
        owner_id: sql::id(row, 1, AccountId)?,
        title: row.get(2)?,
        description: row.get(3)?,
        target_customer: row.get(4)?,
        budget_min: row.get(5)?,
        budget_max: row.get(6)?,
        deadline: sql::opt_date(row, 7)?,
        status: sql::text_enum(row, 8)?,
        categories: Vec::new(),
        created_at: sql::timestamp(row, 9)?,
    })
}
