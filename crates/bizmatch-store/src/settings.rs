use rusqlite::{params, OptionalExtension};

use bizmatch_shared::AccountId;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Settings;
use crate::sql;

impl Database {
    pub fn get_settings(&self, user: AccountId) -> Result<Option<Settings>> {
        let found = self
            .conn()
            .query_row(
                "SELECT user_id, theme, language, timezone, date_format, time_format, currency,
                        email_notifications, push_notifications, privacy, updated_at
                 FROM settings WHERE user_id = ?1",
                params![user.to_string()],
                |row| {
                    Ok(Settings {
                        user_id: sql::id(row, 0, AccountId)?,
                        theme: sql::text_enum(row, 1)?,
                        language: row.get(2)?,
                        timezone: row.get(3)?,
                        date_format: row.get(4)?,
                        time_format: sql::text_enum(row, 5)?,
                        currency: row.get(6)?,
                        email_notifications: sql::json(row, 7)?,
                        push_notifications: sql::json(row, 8)?,
                        privacy: sql::json(row, 9)?,
                        updated_at: sql::timestamp(row, 10)?,
                    })
                },
            )
            .optional()?;
        Ok(found)
    }

    pub fn upsert_settings(&self, s: &Settings) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO settings
                   (user_id, theme, language, timezone, date_format, time_format, currency,
                    email_notifications, push_notifications, privacy, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 ON CONFLICT (user_id) DO UPDATE SET
                   theme = excluded.theme,
                   language = excluded.language,
                   timezone = excluded.timezone,
                   date_format = excluded.date_format,
                   time_format = excluded.time_format,
                   currency = excluded.currency,
                   email_notifications = excluded.email_notifications,
                   push_notifications = excluded.push_notifications,
                   privacy = excluded.privacy,
                   updated_at = excluded.updated_at",
                params![
                    s.user_id.to_string(),
                    s.theme.as_str(),
                    s.language,
                    s.timezone,
                    s.date_format,
                    s.time_format.as_str(),
                    s.currency,
                    serde_json::to_string(&s.email_notifications)?,
                    serde_json::to_string(&s.push_notifications)?,
                    serde_json::to_string(&s.privacy)?,
                    sql::ts_text(&s.updated_at),
                ],
            )
            .map_err(StoreError::from_write)?;
        Ok(())
    }
}
