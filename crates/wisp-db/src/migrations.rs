use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            username    TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- view_token holds the literal word token for ordinary messages and
        -- the sha256 digest of the secret for sealed ones; the UNIQUE
        -- constraint is the authoritative backstop behind the allocator's
        -- pre-check.
        CREATE TABLE IF NOT EXISTS messages (
            id          TEXT PRIMARY KEY,
            creator_id  TEXT NOT NULL REFERENCES users(id),
            content     TEXT NOT NULL,
            view_token  TEXT NOT NULL UNIQUE,
            secret      INTEGER NOT NULL DEFAULT 0,
            expires_at  TEXT NOT NULL,
            viewed_at   TEXT,
            response    TEXT,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_messages_creator
            ON messages(creator_id, created_at);

        CREATE INDEX IF NOT EXISTS idx_messages_expires
            ON messages(expires_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
