//! SQL schema fragments for each generation of the votebox store.
//!
//! Table names carry the generation prefix exactly as earlier deployments
//! created them, so an existing file is recognised by its marker table. All
//! statements are guarded with `IF NOT EXISTS` and may be re-run.

/// Normalised layout introduced by v1. Created by the v0 -> v1 step.
pub const V1_TABLES: &str = "
CREATE TABLE IF NOT EXISTS v1_jokes (
    id      INTEGER PRIMARY KEY NOT NULL,
    text    TEXT,
    format  TEXT,                   -- 'html' | 'markdown'
    user    INTEGER
);

CREATE TABLE IF NOT EXISTS v1_users (
    id         INTEGER PRIMARY KEY NOT NULL,
    identifier TEXT
);

CREATE TABLE IF NOT EXISTS v1_votes (
    id    INTEGER PRIMARY KEY NOT NULL,
    joke  INTEGER,
    user  INTEGER,
    type  TEXT                      -- 'up' | 'down' | 'report' | 'delete'
);
";

/// Role-aware users of v1a. Entries and votes are renamed, not rebuilt.
pub const V1A_USERS: &str = "
CREATE TABLE IF NOT EXISTS v1a_users (
    id         INTEGER PRIMARY KEY NOT NULL,
    identifier TEXT,
    role       TEXT DEFAULT 'guest',  -- 'guest' | 'user' | 'super'
    password   TEXT DEFAULT '',
    salt       TEXT DEFAULT ''
);
";

/// Timestamped entries of v1c.
pub const V1C_JOKES: &str = "
CREATE TABLE IF NOT EXISTS v1c_jokes (
    id      INTEGER PRIMARY KEY NOT NULL,
    text    TEXT,
    format  TEXT,                   -- 'html' | 'prettytext'
    user    INTEGER,
    created TIMESTAMP               -- RFC 3339 UTC
);
";

/// The remaining v1c tables, for stores created from scratch.
pub const V1C_TABLES: &str = "
CREATE TABLE IF NOT EXISTS v1c_votes (
    id    INTEGER PRIMARY KEY NOT NULL,
    joke  INTEGER,
    user  INTEGER,
    type  TEXT                      -- 'up' | 'down' | 'delete'
);

CREATE TABLE IF NOT EXISTS v1c_users (
    id         INTEGER PRIMARY KEY NOT NULL,
    identifier TEXT,
    role       TEXT DEFAULT 'guest',
    password   TEXT DEFAULT '',
    salt       TEXT DEFAULT ''
);
";

/// Lookup indexes on the latest generation. The vote ledger is read per
/// (entry, user) pair on every vote.
pub const V1C_INDEXES: &str = "
CREATE INDEX IF NOT EXISTS v1c_votes_joke_user_idx  ON v1c_votes(joke, user);
CREATE INDEX IF NOT EXISTS v1c_users_identifier_idx ON v1c_users(identifier);
";
