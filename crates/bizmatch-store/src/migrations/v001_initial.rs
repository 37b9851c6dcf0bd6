//! v001 -- Initial schema creation.
//!
//! Creates the core tables: `accounts`, `opportunities`, `connections`,
//! `blocked_users`, `messages`, `notifications`, `favorite_opportunities`
//! and `settings`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Accounts
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS accounts (
    id            TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    company_name  TEXT NOT NULL,
    industry      TEXT NOT NULL DEFAULT '',
    location      TEXT NOT NULL DEFAULT '',
    description   TEXT NOT NULL DEFAULT '',
    contact_email TEXT NOT NULL DEFAULT '',
    contact_phone TEXT NOT NULL DEFAULT '',
    avatar_url    TEXT,
    created_at    TEXT NOT NULL                -- RFC-3339
);

-- ----------------------------------------------------------------
-- Opportunities
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS opportunities (
    id                TEXT PRIMARY KEY NOT NULL,
    owner_id          TEXT NOT NULL,
    kind              TEXT NOT NULL,           -- buying | selling
    business_name     TEXT NOT NULL,
    industry          TEXT NOT NULL,
    description       TEXT NOT NULL,
    contact_email     TEXT NOT NULL,
    contact_phone     TEXT NOT NULL,
    location          TEXT NOT NULL,
    company_size      TEXT,
    timeline          TEXT,
    budget_min        REAL,
    budget_max        REAL,
    requirements      TEXT,
    preferred_contact TEXT NOT NULL,           -- email | phone
    name_private      INTEGER NOT NULL DEFAULT 0,
    created_at        TEXT NOT NULL,

    FOREIGN KEY (owner_id) REFERENCES accounts(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_opportunities_owner ON opportunities(owner_id);
CREATE INDEX IF NOT EXISTS idx_opportunities_kind_ts
    ON opportunities(kind, created_at DESC);

-- ----------------------------------------------------------------
-- Connections (one live row per unordered pair)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS connections (
    id              TEXT PRIMARY KEY NOT NULL,
    requester_id    TEXT NOT NULL,
    recipient_id    TEXT NOT NULL,
    pair_lo         TEXT NOT NULL,             -- min(requester, recipient)
    pair_hi         TEXT NOT NULL,             -- max(requester, recipient)
    status          TEXT NOT NULL,             -- pending | accepted | declined
    request_message TEXT,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL,

    UNIQUE (pair_lo, pair_hi),
    CHECK (requester_id <> recipient_id),
    FOREIGN KEY (requester_id) REFERENCES accounts(id) ON DELETE CASCADE,
    FOREIGN KEY (recipient_id) REFERENCES accounts(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_connections_requester ON connections(requester_id);
CREATE INDEX IF NOT EXISTS idx_connections_recipient ON connections(recipient_id);

-- ----------------------------------------------------------------
-- Blocks
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS blocked_users (
    blocker_id TEXT NOT NULL,
    blocked_id TEXT NOT NULL,
    reason     TEXT,
    created_at TEXT NOT NULL,

    PRIMARY KEY (blocker_id, blocked_id),
    FOREIGN KEY (blocker_id) REFERENCES accounts(id) ON DELETE CASCADE,
    FOREIGN KEY (blocked_id) REFERENCES accounts(id) ON DELETE CASCADE
);

-- ----------------------------------------------------------------
-- Messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    id           TEXT PRIMARY KEY NOT NULL,
    thread_id    TEXT NOT NULL,
    sender_id    TEXT NOT NULL,
    recipient_id TEXT NOT NULL,
    content      TEXT NOT NULL,
    is_read      INTEGER NOT NULL DEFAULT 0,
    reply_to_id  TEXT,
    created_at   TEXT NOT NULL,

    FOREIGN KEY (sender_id) REFERENCES accounts(id) ON DELETE CASCADE,
    FOREIGN KEY (recipient_id) REFERENCES accounts(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_messages_recipient_ts
    ON messages(recipient_id, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_messages_sender_ts
    ON messages(sender_id, created_at DESC);

-- ----------------------------------------------------------------
-- Notifications
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS notifications (
    id         TEXT PRIMARY KEY NOT NULL,
    owner_id   TEXT NOT NULL,
    category   TEXT NOT NULL,
    priority   TEXT NOT NULL,
    title      TEXT NOT NULL,
    body       TEXT NOT NULL,
    metadata   TEXT NOT NULL DEFAULT 'null',  -- JSON
    action_url TEXT,
    related_id TEXT,
    read       INTEGER NOT NULL DEFAULT 0,
    archived   INTEGER NOT NULL DEFAULT 0,
    group_id   TEXT,
    created_at TEXT NOT NULL,

    FOREIGN KEY (owner_id) REFERENCES accounts(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_notifications_owner_ts
    ON notifications(owner_id, created_at DESC);

-- ----------------------------------------------------------------
-- Favorites
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS favorite_opportunities (
    user_id        TEXT NOT NULL,
    opportunity_id TEXT NOT NULL,
    is_favorite    INTEGER NOT NULL,
    updated_at     TEXT NOT NULL,

    PRIMARY KEY (user_id, opportunity_id),
    FOREIGN KEY (user_id) REFERENCES accounts(id) ON DELETE CASCADE,
    FOREIGN KEY (opportunity_id) REFERENCES opportunities(id) ON DELETE CASCADE
);

-- ----------------------------------------------------------------
-- Settings
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS settings (
    user_id             TEXT PRIMARY KEY NOT NULL,
    theme               TEXT NOT NULL,
    language            TEXT NOT NULL,
    timezone            TEXT NOT NULL,
    date_format         TEXT NOT NULL,
    time_format         TEXT NOT NULL,
    currency            TEXT NOT NULL,
    email_notifications TEXT NOT NULL,        -- JSON
    push_notifications  TEXT NOT NULL,        -- JSON
    privacy             TEXT NOT NULL,        -- JSON
    updated_at          TEXT NOT NULL,

    FOREIGN KEY (user_id) REFERENCES accounts(id) ON DELETE CASCADE
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
