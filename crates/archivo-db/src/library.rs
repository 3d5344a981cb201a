use crate::models::{AlbumRow, MediaRow};
use crate::queries::{as_params, placeholders};
use crate::Database;
use anyhow::Result;
use rusqlite::{OptionalExtension, Row};

const MEDIA_COLUMNS: &str =
    "m.id, m.owner_id, m.kind, m.title, m.description, m.content_type, m.size, m.sha256, m.album_id, m.created_at";
const ALBUM_COLUMNS: &str = "a.id, a.owner_id, a.name, a.description, a.created_at";

impl Database {
    // -- Media --

    pub fn insert_media(&self, media: &MediaRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO media_items (id, owner_id, kind, title, description, content_type, size, sha256, album_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    media.id,
                    media.owner_id,
                    media.kind,
                    media.title,
                    media.description,
                    media.content_type,
                    media.size,
                    media.sha256,
                    media.album_id,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_media(&self, id: &str) -> Result<Option<MediaRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {MEDIA_COLUMNS} FROM media_items m WHERE m.id = ?1");
            Ok(conn.query_row(&sql, [id], media_from_row).optional()?)
        })
    }

    /// Media the user owns or is tagged in, newest first.
    pub fn list_media_for_user(&self, user_id: &str) -> Result<Vec<MediaRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {MEDIA_COLUMNS} FROM media_items m
                 WHERE m.owner_id = ?1
                    OR EXISTS (SELECT 1 FROM media_tags t WHERE t.media_id = m.id AND t.user_id = ?1)
                 ORDER BY m.created_at DESC, m.rowid DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], media_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn list_album_media(&self, album_id: &str) -> Result<Vec<MediaRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {MEDIA_COLUMNS} FROM media_items m
                 WHERE m.album_id = ?1
                 ORDER BY m.created_at DESC, m.rowid DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([album_id], media_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Owner, tagged users, and owner/members of the media's album.
    pub fn media_visible_to(&self, media_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let visible: bool = conn.query_row(
                "SELECT EXISTS (
                    SELECT 1 FROM media_items m
                    LEFT JOIN albums a ON a.id = m.album_id
                    WHERE m.id = ?1 AND (
                        m.owner_id = ?2
                        OR a.owner_id = ?2
                        OR EXISTS (SELECT 1 FROM media_tags t WHERE t.media_id = m.id AND t.user_id = ?2)
                        OR EXISTS (SELECT 1 FROM album_members am WHERE am.album_id = m.album_id AND am.user_id = ?2)
                    )
                 )",
                [media_id, user_id],
                |row| row.get(0),
            )?;
            Ok(visible)
        })
    }

    pub fn set_media_album(&self, media_id: &str, album_id: Option<&str>) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE media_items SET album_id = ?2 WHERE id = ?1",
                rusqlite::params![media_id, album_id],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn delete_media(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM media_items WHERE id = ?1", [id])?;
            Ok(deleted > 0)
        })
    }

    /// Returns false if the tag was already there.
    pub fn tag_user(&self, media_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO media_tags (media_id, user_id) VALUES (?1, ?2)",
                [media_id, user_id],
            )?;
            Ok(inserted > 0)
        })
    }

    pub fn untag_user(&self, media_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM media_tags WHERE media_id = ?1 AND user_id = ?2",
                [media_id, user_id],
            )?;
            Ok(deleted > 0)
        })
    }

    /// Batch-fetch `(media_id, user_id)` tag pairs.
    pub fn get_tags_for_media(&self, media_ids: &[String]) -> Result<Vec<(String, String)>> {
        if media_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT media_id, user_id FROM media_tags WHERE media_id IN ({}) ORDER BY created_at, rowid",
                placeholders(media_ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(as_params(media_ids).as_slice(), |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Albums --

    pub fn create_album(&self, album: &AlbumRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO albums (id, owner_id, name, description) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![album.id, album.owner_id, album.name, album.description],
            )?;
            Ok(())
        })
    }

    pub fn get_album(&self, id: &str) -> Result<Option<AlbumRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {ALBUM_COLUMNS} FROM albums a WHERE a.id = ?1");
            Ok(conn.query_row(&sql, [id], album_from_row).optional()?)
        })
    }

    /// Albums the user owns or belongs to, newest first.
    pub fn list_albums_for_user(&self, user_id: &str) -> Result<Vec<AlbumRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {ALBUM_COLUMNS} FROM albums a
                 WHERE a.owner_id = ?1
                    OR EXISTS (SELECT 1 FROM album_members am WHERE am.album_id = a.id AND am.user_id = ?1)
                 ORDER BY a.created_at DESC, a.rowid DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], album_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Media rows keep existing; their album reference is cleared.
    pub fn delete_album(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM albums WHERE id = ?1", [id])?;
            Ok(deleted > 0)
        })
    }

    /// Returns false if the user was already a member.
    pub fn add_album_member(&self, album_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO album_members (album_id, user_id) VALUES (?1, ?2)",
                [album_id, user_id],
            )?;
            Ok(inserted > 0)
        })
    }

    pub fn remove_album_member(&self, album_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM album_members WHERE album_id = ?1 AND user_id = ?2",
                [album_id, user_id],
            )?;
            Ok(deleted > 0)
        })
    }

    /// Member user ids in join order. The owner is not listed.
    pub fn get_album_member_ids(&self, album_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id FROM album_members WHERE album_id = ?1 ORDER BY created_at, rowid",
            )?;
            let rows = stmt
                .query_map([album_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(rows)
        })
    }

    pub fn is_album_member(&self, album_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let member: bool = conn.query_row(
                "SELECT EXISTS (
                    SELECT 1 FROM albums WHERE id = ?1 AND owner_id = ?2
                    UNION ALL
                    SELECT 1 FROM album_members WHERE album_id = ?1 AND user_id = ?2
                 )",
                [album_id, user_id],
                |row| row.get(0),
            )?;
            Ok(member)
        })
    }
}

fn media_from_row(row: &Row<'_>) -> rusqlite::Result<MediaRow> {
    Ok(MediaRow {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        kind: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        content_type: row.get(5)?,
        size: row.get(6)?,
        sha256: row.get(7)?,
        album_id: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn album_from_row(row: &Row<'_>) -> rusqlite::Result<AlbumRow> {
    Ok(AlbumRow {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        created_at: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn user(db: &Database, username: &str) -> String {
        let id = Uuid::new_v4().to_string();
        db.create_user(&id, username, "hash", username, None, None).unwrap();
        id
    }

    fn media(db: &Database, owner: &str, album_id: Option<&str>) -> String {
        let id = Uuid::new_v4().to_string();
        db.insert_media(&MediaRow {
            id: id.clone(),
            owner_id: owner.into(),
            kind: "photo".into(),
            title: "beach".into(),
            description: None,
            content_type: "image/jpeg".into(),
            size: 3,
            sha256: "00".into(),
            album_id: album_id.map(str::to_string),
            created_at: String::new(),
        })
        .unwrap();
        id
    }

    fn album(db: &Database, owner: &str) -> String {
        let id = Uuid::new_v4().to_string();
        db.create_album(&AlbumRow {
            id: id.clone(),
            owner_id: owner.into(),
            name: "Summer".into(),
            description: None,
            created_at: String::new(),
        })
        .unwrap();
        id
    }

    #[test]
    fn tagged_media_is_listed_and_visible() {
        let db = Database::open_in_memory().unwrap();
        let (owner, tagged, stranger) = (user(&db, "olga"), user(&db, "tom"), user(&db, "sam"));
        let m = media(&db, &owner, None);

        assert!(db.tag_user(&m, &tagged).unwrap());
        assert!(!db.tag_user(&m, &tagged).unwrap());

        assert_eq!(db.list_media_for_user(&tagged).unwrap().len(), 1);
        assert!(db.media_visible_to(&m, &tagged).unwrap());
        assert!(!db.media_visible_to(&m, &stranger).unwrap());

        assert!(db.untag_user(&m, &tagged).unwrap());
        assert!(db.list_media_for_user(&tagged).unwrap().is_empty());
    }

    #[test]
    fn album_members_see_album_media() {
        let db = Database::open_in_memory().unwrap();
        let (owner, member, uploader) = (user(&db, "olga"), user(&db, "mia"), user(&db, "uma"));
        let a = album(&db, &owner);
        let m = media(&db, &uploader, Some(&a));

        assert!(db.media_visible_to(&m, &owner).unwrap());
        assert!(!db.media_visible_to(&m, &member).unwrap());

        db.add_album_member(&a, &member).unwrap();
        assert!(db.media_visible_to(&m, &member).unwrap());
        assert!(db.is_album_member(&a, &member).unwrap());
        assert!(db.is_album_member(&a, &owner).unwrap());
        assert_eq!(db.list_albums_for_user(&member).unwrap().len(), 1);
        assert_eq!(db.get_album_member_ids(&a).unwrap(), vec![member.clone()]);

        assert!(db.remove_album_member(&a, &member).unwrap());
        assert!(!db.is_album_member(&a, &member).unwrap());
    }

    #[test]
    fn deleting_album_keeps_media() {
        let db = Database::open_in_memory().unwrap();
        let owner = user(&db, "olga");
        let a = album(&db, &owner);
        let m = media(&db, &owner, Some(&a));

        assert!(db.delete_album(&a).unwrap());
        let row = db.get_media(&m).unwrap().unwrap();
        assert!(row.album_id.is_none());
    }

    #[test]
    fn tags_are_fetched_in_batch() {
        let db = Database::open_in_memory().unwrap();
        let (owner, t1, t2) = (user(&db, "olga"), user(&db, "tom"), user(&db, "tia"));
        let m1 = media(&db, &owner, None);
        let m2 = media(&db, &owner, None);
        db.tag_user(&m1, &t1).unwrap();
        db.tag_user(&m2, &t2).unwrap();

        let tags = db.get_tags_for_media(&[m1.clone(), m2.clone()]).unwrap();
        assert_eq!(tags, vec![(m1, t1), (m2, t2)]);
    }
}
