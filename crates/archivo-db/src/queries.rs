use crate::models::{RelationRow, UserRow};
use crate::Database;
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, ToSql};
use tracing::info;

const USER_COLUMNS: &str = "id, username, password, display_name, email, date_of_birth, created_at";
const RELATION_COLUMNS: &str = "id, from_user_id, to_user_id, relation_type, created_at";

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        username: &str,
        password_hash: &str,
        display_name: &str,
        email: Option<&str>,
        date_of_birth: Option<&str>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, password, display_name, email, date_of_birth)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![id, username, password_hash, display_name, email, date_of_birth],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1");
            Ok(conn.query_row(&sql, [username], user_from_row).optional()?)
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    /// Batch-fetch users; ids that do not exist are skipped.
    pub fn get_users_by_ids(&self, ids: &[String]) -> Result<Vec<UserRow>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {USER_COLUMNS} FROM users WHERE id IN ({})",
                placeholders(ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(as_params(ids).as_slice(), user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Case-insensitive substring match on username or display name.
    pub fn search_users(&self, needle: &str, limit: u32) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let pattern = format!("%{}%", needle.replace('%', "\\%").replace('_', "\\_"));
            let sql = format!(
                "SELECT {USER_COLUMNS} FROM users
                 WHERE username LIKE ?1 ESCAPE '\\' OR display_name LIKE ?1 ESCAPE '\\'
                 ORDER BY display_name, username
                 LIMIT ?2"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![pattern, limit], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// `None` leaves a column untouched.
    pub fn update_profile(
        &self,
        id: &str,
        display_name: Option<&str>,
        email: Option<&str>,
        date_of_birth: Option<&str>,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET
                    display_name = COALESCE(?2, display_name),
                    email = COALESCE(?3, email),
                    date_of_birth = COALESCE(?4, date_of_birth)
                 WHERE id = ?1",
                rusqlite::params![id, display_name, email, date_of_birth],
            )?;
            Ok(changed > 0)
        })
    }

    /// Hard delete. Relations, tags, memberships and owned media rows go
    /// with the user through ON DELETE CASCADE.
    pub fn delete_user(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
            if deleted > 0 {
                info!("Deleted user {}", id);
            }
            Ok(deleted > 0)
        })
    }

    // -- Family relations --

    /// Insert a batch of edges atomically; the first failure rolls back all.
    pub fn insert_relations(&self, rows: &[(String, String, String, String)]) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO family_relations (id, from_user_id, to_user_id, relation_type)
                     VALUES (?1, ?2, ?3, ?4)",
                )?;
                for (id, from, to, kind) in rows {
                    stmt.execute(rusqlite::params![id, from, to, kind])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_relation(&self, id: &str) -> Result<Option<RelationRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {RELATION_COLUMNS} FROM family_relations WHERE id = ?1");
            Ok(conn.query_row(&sql, [id], relation_from_row).optional()?)
        })
    }

    /// The edge joining `a` and `b` in either direction, if any.
    pub fn relation_between(&self, a: &str, b: &str) -> Result<Option<RelationRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {RELATION_COLUMNS} FROM family_relations
                 WHERE (from_user_id = ?1 AND to_user_id = ?2)
                    OR (from_user_id = ?2 AND to_user_id = ?1)"
            );
            Ok(conn.query_row(&sql, [a, b], relation_from_row).optional()?)
        })
    }

    pub fn delete_relation(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM family_relations WHERE id = ?1", [id])?;
            Ok(deleted > 0)
        })
    }

    /// Every edge where the user is either endpoint, oldest first.
    pub fn list_relations_for_user(&self, user_id: &str) -> Result<Vec<RelationRow>> {
        self.list_relations_for_users(&[user_id.to_string()])
    }

    /// Every edge touching any of `user_ids`, each listed once.
    pub fn list_relations_for_users(&self, user_ids: &[String]) -> Result<Vec<RelationRow>> {
        if user_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let marks = placeholders(user_ids.len());
            let sql = format!(
                "SELECT {RELATION_COLUMNS} FROM family_relations
                 WHERE from_user_id IN ({marks}) OR to_user_id IN ({marks})
                 ORDER BY created_at, rowid"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(as_params(user_ids).as_slice(), relation_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

pub(crate) fn query_user_by_id(conn: &Connection, id: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
    Ok(conn.query_row(&sql, [id], user_from_row).optional()?)
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        password: row.get(2)?,
        display_name: row.get(3)?,
        email: row.get(4)?,
        date_of_birth: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn relation_from_row(row: &Row<'_>) -> rusqlite::Result<RelationRow> {
    Ok(RelationRow {
        id: row.get(0)?,
        from_user_id: row.get(1)?,
        to_user_id: row.get(2)?,
        relation_type: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// `?1, ?2, ... ?n` for an IN list.
pub(crate) fn placeholders(n: usize) -> String {
    (1..=n).map(|i| format!("?{}", i)).collect::<Vec<_>>().join(", ")
}

pub(crate) fn as_params(values: &[String]) -> Vec<&dyn ToSql> {
    values.iter().map(|v| v as &dyn ToSql).collect()
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

    fn relate(db: &Database, from: &str, to: &str, kind: &str) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        db.insert_relations(&[(id.clone(), from.into(), to.into(), kind.into())])?;
        Ok(id)
    }

    #[test]
    fn list_returns_edges_from_both_endpoints_only() {
        let db = Database::open_in_memory().unwrap();
        let (a, b, c, d) = (user(&db, "anna"), user(&db, "ben"), user(&db, "cora"), user(&db, "dan"));

        let ab = relate(&db, &a, &b, "parent").unwrap();
        let ca = relate(&db, &c, &a, "sibling").unwrap();
        let bd = relate(&db, &b, &d, "spouse").unwrap();

        let ids: Vec<String> = db.list_relations_for_user(&a).unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![ab.clone(), ca]);

        let ids: Vec<String> = db.list_relations_for_user(&d).unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![bd]);
    }

    #[test]
    fn delete_removes_exactly_one_edge() {
        let db = Database::open_in_memory().unwrap();
        let (a, b, c) = (user(&db, "anna"), user(&db, "ben"), user(&db, "cora"));
        let ab = relate(&db, &a, &b, "parent").unwrap();
        let ac = relate(&db, &a, &c, "sibling").unwrap();

        assert!(db.delete_relation(&ab).unwrap());
        assert!(!db.delete_relation(&ab).unwrap());

        assert!(db.list_relations_for_user(&b).unwrap().is_empty());
        let remaining: Vec<String> = db.list_relations_for_user(&a).unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(remaining, vec![ac]);
    }

    #[test]
    fn second_edge_between_same_pair_is_a_constraint_violation() {
        let db = Database::open_in_memory().unwrap();
        let (a, b) = (user(&db, "anna"), user(&db, "ben"));
        relate(&db, &a, &b, "parent").unwrap();

        let err = relate(&db, &b, &a, "parent").unwrap_err();
        assert!(crate::is_constraint_violation(&err));
        assert!(db.relation_between(&b, &a).unwrap().is_some());
    }

    #[test]
    fn self_relation_is_rejected_by_schema() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "anna");
        let err = relate(&db, &a, &a, "sibling").unwrap_err();
        assert!(crate::is_constraint_violation(&err));
    }

    #[test]
    fn batch_insert_is_atomic() {
        let db = Database::open_in_memory().unwrap();
        let (a, b, c) = (user(&db, "anna"), user(&db, "ben"), user(&db, "cora"));
        relate(&db, &a, &c, "sibling").unwrap();

        let batch = vec![
            (Uuid::new_v4().to_string(), a.clone(), b.clone(), "parent".to_string()),
            (Uuid::new_v4().to_string(), c.clone(), a.clone(), "sibling".to_string()),
        ];
        assert!(db.insert_relations(&batch).is_err());
        assert!(db.relation_between(&a, &b).unwrap().is_none());
    }

    #[test]
    fn deleting_a_user_cascades_to_relations() {
        let db = Database::open_in_memory().unwrap();
        let (a, b) = (user(&db, "anna"), user(&db, "ben"));
        relate(&db, &a, &b, "spouse").unwrap();

        assert!(db.delete_user(&a).unwrap());
        assert!(db.list_relations_for_user(&b).unwrap().is_empty());
        assert!(db.get_user_by_id(&a).unwrap().is_none());
    }

    #[test]
    fn update_profile_keeps_absent_fields() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "anna");
        db.update_profile(&a, None, Some("anna@example.org"), Some("1990-02-03")).unwrap();
        db.update_profile(&a, Some("Anna B."), None, None).unwrap();

        let row = db.get_user_by_id(&a).unwrap().unwrap();
        assert_eq!(row.display_name, "Anna B.");
        assert_eq!(row.email.as_deref(), Some("anna@example.org"));
        assert_eq!(row.date_of_birth.as_deref(), Some("1990-02-03"));
    }

    #[test]
    fn search_matches_username_and_display_name() {
        let db = Database::open_in_memory().unwrap();
        let id = Uuid::new_v4().to_string();
        db.create_user(&id, "gran", "hash", "Margaret Hale", None, None).unwrap();
        user(&db, "ben");

        assert_eq!(db.search_users("marg", 10).unwrap().len(), 1);
        assert_eq!(db.search_users("GRA", 10).unwrap().len(), 1);
        assert_eq!(db.search_users("%", 10).unwrap().len(), 0);
        assert_eq!(db.search_users("", 10).unwrap().len(), 2);
    }
}
