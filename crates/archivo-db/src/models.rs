//! Database row types — these map directly to SQLite rows.
//! Distinct from archivo-types API models to keep the DB layer independent.

use anyhow::{Context, Result};
use archivo_family::{Edge, RelationType};
use chrono::{DateTime, NaiveDateTime, Utc};
use uuid::Uuid;

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub display_name: String,
    pub email: Option<String>,
    pub date_of_birth: Option<String>,
    pub created_at: String,
}

pub struct RelationRow {
    pub id: String,
    pub from_user_id: String,
    pub to_user_id: String,
    pub relation_type: String,
    pub created_at: String,
}

impl RelationRow {
    /// Decode into the family model. Fails on ids or tokens that did not
    /// come from this application.
    pub fn edge(&self) -> Result<Edge> {
        Ok(Edge {
            id: parse_id(&self.id)?,
            from_user_id: parse_id(&self.from_user_id)?,
            to_user_id: parse_id(&self.to_user_id)?,
            relation_type: self
                .relation_type
                .parse::<RelationType>()
                .with_context(|| format!("relation {}", self.id))?,
        })
    }
}

pub struct MediaRow {
    pub id: String,
    pub owner_id: String,
    pub kind: String,
    pub title: String,
    pub description: Option<String>,
    pub content_type: String,
    pub size: i64,
    pub sha256: String,
    pub album_id: Option<String>,
    pub created_at: String,
}

pub struct AlbumRow {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: String,
}

pub fn parse_id(raw: &str) -> Result<Uuid> {
    raw.parse::<Uuid>().with_context(|| format!("corrupt id {:?}", raw))
}

/// SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>().or_else(|_| {
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
            .map(|ndt| ndt.and_utc())
            .with_context(|| format!("corrupt timestamp {:?}", raw))
    })
}
