//! CRUD operations for [`Account`] records.

use rusqlite::params;

use bizmatch_shared::AccountId;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Account;
use crate::sql;

const COLUMNS: &str = "id, company_name, industry, location, description, contact_email, \
                       contact_phone, avatar_url, created_at";

impl Database {
    /// Register a new account. The id is immutable from here on.
    pub fn insert_account(&self, account: &Account) -> Result<()> {
        self.conn()
            .execute(
                &format!("INSERT INTO accounts ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
                params![
                    account.id.to_string(),
                    account.company_name,
                    account.industry,
                    account.location,
                    account.description,
                    account.contact_email,
                    account.contact_phone,
                    account.avatar_url,
                    sql::ts_text(&account.created_at),
                ],
            )
            .map_err(StoreError::from_write)?;
        Ok(())
    }

    pub fn get_account(&self, id: AccountId) -> Result<Account> {
        self.conn()
            .query_row(
                &format!("SELECT {COLUMNS} FROM accounts WHERE id = ?1"),
                params![id.to_string()],
                row_to_account,
            )
            .map_err(StoreError::from_single)
    }

    /// Update the mutable profile fields. The id and creation time are kept.
    pub fn update_account_profile(&self, account: &Account) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE accounts
             SET company_name = ?1, industry = ?2, location = ?3, description = ?4,
                 contact_email = ?5, contact_phone = ?6, avatar_url = ?7
             WHERE id = ?8",
            params![
                account.company_name,
                account.industry,
                account.location,
                account.description,
                account.contact_email,
                account.contact_phone,
                account.avatar_url,
                account.id.to_string(),
            ],
        )?;
        Ok(affected > 0)
    }
}

pub(crate) fn row_to_account(row: &rusqlite::Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: sql::id(row, 0, AccountId)?,
        company_name: row.get(1)?,
        industry: row.get(2)?,
        location: row.get(3)?,
        description: row.get(4)?,
        contact_email: row.get(5)?,
        contact_phone: row.get(6)?,
        avatar_url: row.get(7)?,
        created_at: sql::timestamp(row, 8)?,
    })
}
