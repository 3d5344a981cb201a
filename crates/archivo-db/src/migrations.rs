use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (users, family relations)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id              TEXT PRIMARY KEY,
                username        TEXT NOT NULL UNIQUE,
                password        TEXT NOT NULL,
                display_name    TEXT NOT NULL,
                email           TEXT,
                date_of_birth   TEXT,
                created_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE family_relations (
                id              TEXT PRIMARY KEY,
                from_user_id    TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                to_user_id      TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                relation_type   TEXT NOT NULL,
                created_at      TEXT NOT NULL DEFAULT (datetime('now')),
                CHECK (from_user_id <> to_user_id)
            );

            -- At most one edge per unordered pair of users
            CREATE UNIQUE INDEX idx_family_relations_pair
                ON family_relations(min(from_user_id, to_user_id), max(from_user_id, to_user_id));

            CREATE INDEX idx_family_relations_from ON family_relations(from_user_id);
            CREATE INDEX idx_family_relations_to ON family_relations(to_user_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (albums, media, tags)");
        conn.execute_batch(
            "
            CREATE TABLE albums (
                id              TEXT PRIMARY KEY,
                owner_id        TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                name            TEXT NOT NULL,
                description     TEXT,
                created_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE album_members (
                album_id        TEXT NOT NULL REFERENCES albums(id) ON DELETE CASCADE,
                user_id         TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at      TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (album_id, user_id)
            );

            CREATE TABLE media_items (
                id              TEXT PRIMARY KEY,
                owner_id        TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                kind            TEXT NOT NULL,
                title           TEXT NOT NULL,
                description     TEXT,
                content_type    TEXT NOT NULL,
                size            INTEGER NOT NULL,
                sha256          TEXT NOT NULL,
                album_id        TEXT REFERENCES albums(id) ON DELETE SET NULL,
                created_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_media_owner ON media_items(owner_id, created_at);
            CREATE INDEX idx_media_album ON media_items(album_id);

            CREATE TABLE media_tags (
                media_id        TEXT NOT NULL REFERENCES media_items(id) ON DELETE CASCADE,
                user_id         TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at      TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (media_id, user_id)
            );

            CREATE INDEX idx_media_tags_user ON media_tags(user_id);

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, 2);
    }
}
