use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                role        TEXT NOT NULL UNIQUE CHECK (role IN ('admin', 'client')),
                created_at  TEXT NOT NULL
            );

            CREATE TABLE devices (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id),
                fingerprint TEXT NOT NULL,
                user_agent  TEXT,
                ip_hash     TEXT,
                is_active   INTEGER NOT NULL DEFAULT 0,
                revoked_at  TEXT,
                created_at  TEXT NOT NULL,
                last_seen   TEXT NOT NULL,
                UNIQUE(user_id, fingerprint)
            );

            CREATE TABLE memories (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id),
                sender_role TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_memories_user ON memories(user_id, created_at);

            CREATE TABLE reactions (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id),
                emoji       TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_reactions_user ON reactions(user_id, created_at);

            CREATE TABLE messages (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id),
                content     TEXT NOT NULL,
                type        TEXT NOT NULL CHECK (type IN ('ai', 'quick_reply', 'reaction')),
                emoji       TEXT,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_messages_user ON messages(user_id, created_at);

            CREATE TABLE daily_notifications (
                id            TEXT PRIMARY KEY,
                user_id       TEXT NOT NULL REFERENCES users(id),
                content       TEXT NOT NULL,
                sent_at       TEXT NOT NULL,
                emotion_level INTEGER NOT NULL
            );

            CREATE INDEX idx_daily_user ON daily_notifications(user_id, sent_at);

            CREATE TABLE notification_schedules (
                id          TEXT PRIMARY KEY,
                time        TEXT NOT NULL,
                is_active   INTEGER NOT NULL DEFAULT 1,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE push_subscriptions (
                user_id     TEXT NOT NULL REFERENCES users(id),
                endpoint    TEXT NOT NULL,
                p256dh      TEXT NOT NULL,
                auth        TEXT NOT NULL,
                user_agent  TEXT,
                is_active   INTEGER NOT NULL DEFAULT 1,
                updated_at  TEXT NOT NULL,
                PRIMARY KEY (user_id, endpoint)
            );

            CREATE TABLE notification_logs (
                id                INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id           TEXT NOT NULL,
                notification_type TEXT NOT NULL,
                sent_at           TEXT NOT NULL
            );

            CREATE INDEX idx_notification_logs_user ON notification_logs(user_id, sent_at);

            CREATE TABLE notification_preferences (
                user_id         TEXT PRIMARY KEY REFERENCES users(id),
                enable_memory   INTEGER NOT NULL DEFAULT 1,
                enable_message  INTEGER NOT NULL DEFAULT 1,
                enable_reaction INTEGER NOT NULL DEFAULT 1,
                enable_daily    INTEGER NOT NULL DEFAULT 1,
                silent_start    INTEGER,
                silent_end      INTEGER,
                updated_at      TEXT NOT NULL
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
