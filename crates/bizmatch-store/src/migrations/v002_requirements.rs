//! v002 -- Lead requests.
//!
//! Adds `industry_categories` (seeded), `requirements` and the
//! `requirement_categories` join table.

use rusqlite::{params, Connection};
use uuid::Uuid;

use bizmatch_shared::constants::INDUSTRY_CATEGORIES;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS industry_categories (
    id   TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS requirements (
    id              TEXT PRIMARY KEY NOT NULL,
    owner_id        TEXT NOT NULL,
    title           TEXT NOT NULL,
    description     TEXT NOT NULL,
    target_customer TEXT,
    budget_min      REAL,
    budget_max      REAL,
    deadline        TEXT,                      -- YYYY-MM-DD
    status          TEXT NOT NULL,             -- open | in-progress | closed
    created_at      TEXT NOT NULL,

    FOREIGN KEY (owner_id) REFERENCES accounts(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_requirements_ts ON requirements(created_at DESC);

CREATE TABLE IF NOT EXISTS requirement_categories (
    requirement_id TEXT NOT NULL,
    category_id    TEXT NOT NULL,

    PRIMARY KEY (requirement_id, category_id),
    FOREIGN KEY (requirement_id) REFERENCES requirements(id) ON DELETE CASCADE,
    FOREIGN KEY (category_id) REFERENCES industry_categories(id) ON DELETE CASCADE
);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)?;
    let mut seed =
        conn.prepare("INSERT OR IGNORE INTO industry_categories (id, name) VALUES (?1, ?2)")?;
    for name in INDUSTRY_CATEGORIES {
        seed.execute(params![Uuid::new_v4().to_string(), name])?;
    }
    Ok(())
}
